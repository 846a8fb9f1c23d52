use thiserror::Error;

use crate::dualsense::TransportError;

/// Errors surfaced by discovery, the report codec and device sessions.
///
/// Every error is scoped to a single device session; none of them is fatal
/// to the process.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no DualSense controller found")]
    DeviceNotFound,

    /// The output report length is zero or not one of the two framings.
    #[error("unsupported output report length {0}")]
    UnknownFraming(usize),

    #[error("failed to open {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: TransportError,
    },

    #[error("output report write failed: {0}")]
    WriteFailed(#[from] WriteError),

    #[error("input report too short: {0} bytes")]
    ShortReport(usize),

    /// The read path never opens the device; retry after a short delay.
    #[error("device handle is not open")]
    NotReady,

    #[error("input report read failed: {0}")]
    Read(#[source] TransportError),

    #[error("HID enumeration failed: {0}")]
    Transport(#[from] TransportError),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("short write ({written} of {expected} bytes)")]
    Short { written: usize, expected: usize },

    #[error(transparent)]
    Transport(TransportError),
}

impl Error {
    /// Platform error code carried by open and write failures, if any.
    pub fn os_code(&self) -> Option<i32> {
        match self {
            Self::OpenFailed { source, .. } => source.os_code(),
            Self::WriteFailed(WriteError::Transport(source)) => source.os_code(),
            Self::Read(source) | Self::Transport(source) => source.os_code(),
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
