//! Finds usable DualSense controllers among the enumerated HID interfaces.

use std::pin::pin;

use futures_lite::{Stream, StreamExt, stream};
use tracing::{debug, info};

use super::DualSenseConnectionType;
use super::constants::{DS_DATA_INTERFACE, KNOWN_PIDS, SONY_VID};
use super::transport::{HidBackend, HidHandle, HidInterface};
use crate::error::{Error, Result};

/// A controller accepted at discovery time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceIdentity {
    device_path: String,
    serial_number: String,
    max_output_report_len: usize,
    connection_type: DualSenseConnectionType,
}

impl DeviceIdentity {
    /// Fails with [`Error::UnknownFraming`] unless `max_output_report_len`
    /// is 48 or 78. Without a serial the path-derived one is used.
    pub fn new(
        device_path: impl Into<String>,
        serial_number: Option<&str>,
        max_output_report_len: usize,
    ) -> Result<Self> {
        let connection_type = DualSenseConnectionType::from_output_report_len(max_output_report_len)
            .ok_or(Error::UnknownFraming(max_output_report_len))?;
        let device_path = device_path.into();
        let serial_number = match serial_number {
            Some(serial) if !serial.trim().is_empty() => serial.to_owned(),
            _ => derive_serial(&device_path),
        };
        Ok(Self {
            device_path,
            serial_number,
            max_output_report_len,
            connection_type,
        })
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    pub fn max_output_report_len(&self) -> usize {
        self.max_output_report_len
    }

    pub fn connection_type(&self) -> DualSenseConnectionType {
        self.connection_type
    }

    pub fn is_wireless(&self) -> bool {
        self.connection_type.is_wireless()
    }
}

/// `DS-` plus six digits, stable for a given path across runs.
pub fn derive_serial(device_path: &str) -> String {
    // FNV-1a, 64 bit
    let hash = device_path
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325u64, |hash, byte| {
            (hash ^ byte as u64).wrapping_mul(0x0000_0100_0000_01b3)
        });
    format!("DS-{:06}", hash % 1_000_000)
}

fn is_data_interface(iface: &HidInterface) -> bool {
    iface.vendor_id == SONY_VID
        && KNOWN_PIDS.contains(&iface.product_id)
        && iface
            .interface_number
            .is_none_or(|n| n == DS_DATA_INTERFACE)
}

async fn probe<B: HidBackend>(backend: &B, iface: HidInterface) -> Option<DeviceIdentity> {
    let path = iface.path.as_str();
    if iface.max_output_report_len == 0 {
        debug!(path, "skipping interface without output report length");
        return None;
    }
    let identity = match DeviceIdentity::new(
        path,
        iface.serial_number.as_deref(),
        iface.max_output_report_len,
    ) {
        Ok(identity) => identity,
        Err(error) => {
            debug!(path, %error, "skipping interface");
            return None;
        }
    };
    match backend.open(path).await {
        Ok(handle) if handle.can_write() => {
            info!(
                path,
                serial = identity.serial_number(),
                len = identity.max_output_report_len(),
                "found DualSense"
            );
            Some(identity)
        }
        Ok(_) => {
            debug!(path, "skipping interface not open for write");
            None
        }
        Err(error) => {
            debug!(path, %error, "skipping interface that cannot be opened");
            None
        }
    }
}

/// Enumerates once, then lazily probes each candidate for write access.
///
/// The probe opens the interface and asks [`HidHandle::can_write`]. hidapi
/// always opens read/write, so with [`super::hid::HidapiBackend`] this
/// amounts to "the open succeeded".
///
/// Calling again re-enumerates; nothing is cached between calls.
pub async fn find_controllers<B: HidBackend>(
    backend: &B,
) -> Result<impl Stream<Item = DeviceIdentity> + '_> {
    let interfaces = backend.enumerate().await?;
    debug!(count = interfaces.len(), "looking for DualSense interfaces");
    Ok(stream::iter(interfaces)
        .filter(is_data_interface)
        .then(move |iface| probe(backend, iface))
        .filter_map(|identity| identity))
}

pub async fn find_first_controller<B: HidBackend>(backend: &B) -> Result<DeviceIdentity> {
    let mut controllers = pin!(find_controllers(backend).await?);
    controllers.next().await.ok_or(Error::DeviceNotFound)
}
