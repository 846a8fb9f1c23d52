//! [`HidBackend`] over the system hidapi library.
//!
//! hidapi is blocking, so every call is moved onto smol's blocking pool.

use std::ffi::CString;
use std::sync::Arc;
use std::time::Duration;

use hidapi::{BusType, DeviceInfo, HidApi, HidDevice, HidError};
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::DualSenseConnectionType;
use super::transport::{HidBackend, HidHandle, HidInterface, TransportError};

/// Linux `ENODEV`, reported by hidraw once the device is unplugged.
const ENODEV: i32 = 19;

#[derive(Clone)]
pub struct HidapiBackend {
    api: Arc<Mutex<HidApi>>,
}

impl HidapiBackend {
    pub fn new() -> Result<Self, TransportError> {
        let api = HidApi::new()?;
        Ok(Self {
            api: Arc::new(Mutex::new(api)),
        })
    }
}

impl HidBackend for HidapiBackend {
    type Handle = HidapiHandle;

    async fn enumerate(&self) -> Result<Vec<HidInterface>, TransportError> {
        let api = self.api.clone();
        smol::unblock(move || {
            let mut api = api.lock();
            api.refresh_devices()?;
            let interfaces = api.device_list().map(to_interface).collect::<Vec<_>>();
            debug!(count = interfaces.len(), "enumerated HID interfaces");
            Ok(interfaces)
        })
        .await
    }

    async fn open(&self, path: &str) -> Result<HidapiHandle, TransportError> {
        let api = self.api.clone();
        let c_path = CString::new(path).map_err(|_| TransportError::NotFound(path.to_owned()))?;
        let dev = smol::unblock(move || api.lock().open_path(&c_path)).await?;
        debug!(path, "opened HID device");
        Ok(HidapiHandle {
            dev: Arc::new(Mutex::new(dev)),
        })
    }
}

pub struct HidapiHandle {
    dev: Arc<Mutex<HidDevice>>,
}

impl HidHandle for HidapiHandle {
    fn can_write(&self) -> bool {
        // hidapi always opens read/write; failures surface at open time.
        true
    }

    async fn read_input_report(
        &self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        let dev = self.dev.clone();
        let len = buf.len();
        let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as i32;
        let (data, size) = smol::unblock(move || {
            let mut data = vec![0u8; len];
            let size = dev.lock().read_timeout(&mut data, timeout_ms)?;
            Ok::<_, HidError>((data, size))
        })
        .await
        .map_err(classify)?;
        buf[..size].copy_from_slice(&data[..size]);
        trace!(size, "read input report");
        Ok(size)
    }

    async fn write_output_report(&self, buf: &[u8]) -> Result<usize, TransportError> {
        let dev = self.dev.clone();
        let data = buf.to_vec();
        smol::unblock(move || dev.lock().write(&data))
            .await
            .map_err(classify)
    }
}

fn to_interface(info: &DeviceInfo) -> HidInterface {
    let (input_len, output_len) = match info.bus_type() {
        BusType::Usb => connection_lengths(DualSenseConnectionType::USB),
        BusType::Bluetooth => connection_lengths(DualSenseConnectionType::BT),
        _ => (0, 0),
    };
    HidInterface {
        vendor_id: info.vendor_id(),
        product_id: info.product_id(),
        path: info.path().to_string_lossy().into_owned(),
        serial_number: info
            .serial_number()
            .filter(|s| !s.is_empty())
            .map(str::to_owned),
        manufacturer: info.manufacturer_string().map(str::to_owned),
        product_name: info.product_string().map(str::to_owned),
        interface_number: match info.interface_number() {
            -1 => None,
            n => Some(n),
        },
        usage_page: info.usage_page(),
        usage: info.usage(),
        max_input_report_len: input_len,
        max_output_report_len: output_len,
    }
}

fn connection_lengths(connection_type: DualSenseConnectionType) -> (usize, usize) {
    (
        connection_type.input_report_len(),
        connection_type.output_report_len(),
    )
}

fn classify(err: HidError) -> TransportError {
    let code = match &err {
        HidError::IoError { error } => error.raw_os_error(),
        _ => None,
    };
    match code {
        Some(ENODEV) => TransportError::Disconnected,
        Some(code) => TransportError::Os {
            code,
            message: err.to_string(),
        },
        None => TransportError::Hid(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unplugged_io_errors_are_disconnects() {
        let err = HidError::IoError {
            error: std::io::Error::from_raw_os_error(ENODEV),
        };
        assert!(matches!(classify(err), TransportError::Disconnected));
    }

    #[test]
    fn other_io_errors_keep_their_code() {
        let err = HidError::IoError {
            error: std::io::Error::from_raw_os_error(6),
        };
        let err = classify(err);
        assert_eq!(err.os_code(), Some(6));
        assert!(err.invalidates_handle());
    }

    #[test]
    fn library_errors_pass_through() {
        let err = classify(HidError::HidApiError {
            message: "boom".into(),
        });
        assert!(matches!(err, TransportError::Hid(_)));
        assert!(!err.invalidates_handle());
    }
}
