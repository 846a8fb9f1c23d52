//! The HID capability the rest of the crate is written against.
//!
//! A backend enumerates HID interfaces and opens them by path; an opened
//! handle reads input reports and writes output reports. [`super::hid`]
//! provides the hidapi implementation and [`super::mock`] an in-memory one.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Windows `ERROR_INVALID_HANDLE`.
pub const OS_ERROR_INVALID_HANDLE: i32 = 6;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("device not present: {0}")]
    NotFound(String),

    #[error("device disconnected")]
    Disconnected,

    #[error("platform error {code}: {message}")]
    Os { code: i32, message: String },

    #[error(transparent)]
    Hid(#[from] hidapi::HidError),
}

impl TransportError {
    pub fn os_code(&self) -> Option<i32> {
        match self {
            Self::Os { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether the handle that produced this error can no longer be used.
    pub fn invalidates_handle(&self) -> bool {
        match self {
            Self::NotFound(_) | Self::Disconnected => true,
            Self::Os { code, .. } => *code == OS_ERROR_INVALID_HANDLE,
            Self::Hid(_) => false,
        }
    }
}

/// One HID interface as reported by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HidInterface {
    pub vendor_id: u16,
    pub product_id: u16,
    pub path: String,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub product_name: Option<String>,
    /// `None` when the transport has no notion of interfaces (Bluetooth).
    pub interface_number: Option<i32>,
    pub usage_page: u16,
    pub usage: u16,
    /// Zero when the platform cannot tell.
    pub max_input_report_len: usize,
    /// Zero when the platform cannot tell.
    pub max_output_report_len: usize,
}

impl HidInterface {
    pub fn new(vendor_id: u16, product_id: u16, path: impl Into<String>) -> Self {
        Self {
            vendor_id,
            product_id,
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_interface_number(mut self, interface_number: i32) -> Self {
        self.interface_number = Some(interface_number);
        self
    }

    pub fn with_report_lengths(mut self, input: usize, output: usize) -> Self {
        self.max_input_report_len = input;
        self.max_output_report_len = output;
        self
    }

    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial_number = Some(serial.into());
        self
    }

    pub fn with_product_name(mut self, name: impl Into<String>) -> Self {
        self.product_name = Some(name.into());
        self
    }

    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id == vendor_id && self.product_id == product_id
    }
}

pub trait HidBackend: Send + Sync + 'static {
    type Handle: HidHandle;

    /// Lists every HID interface currently present. Each call re-enumerates.
    fn enumerate(&self) -> impl Future<Output = Result<Vec<HidInterface>, TransportError>> + Send;

    /// Opens the interface at `path` for reading and writing.
    fn open(&self, path: &str) -> impl Future<Output = Result<Self::Handle, TransportError>> + Send;
}

/// An open device. Dropping the handle releases the OS resource.
pub trait HidHandle: Send + Sync + 'static {
    fn can_write(&self) -> bool;

    /// Reads one input report into `buf`.
    ///
    /// Returns `Ok(0)` when no report arrived within `timeout`.
    fn read_input_report(
        &self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> impl Future<Output = Result<usize, TransportError>> + Send;

    /// Writes one output report and returns the number of bytes written.
    fn write_output_report(
        &self,
        buf: &[u8],
    ) -> impl Future<Output = Result<usize, TransportError>> + Send;
}
