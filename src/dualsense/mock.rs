//! In-memory [`HidBackend`] for exercising the stack without hardware.
//!
//! A [`MockDevice`] is a cheap handle to shared state: clone it before
//! adding it to a [`MockBackend`] to keep queueing reads and inspecting
//! writes from the test.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_io::Timer;
use parking_lot::Mutex;

use super::constants::{DS_DATA_INTERFACE, DUALSENSE_PID, SONY_VID};
use super::transport::{HidBackend, HidHandle, HidInterface, TransportError};
use super::DualSenseConnectionType;

pub enum MockRead {
    Report(Vec<u8>),
    Error(TransportError),
}

pub enum MockWrite {
    /// Accept only the first `n` bytes.
    Short(usize),
    Fail(TransportError),
}

#[derive(Default)]
struct MockDeviceState {
    reads: VecDeque<MockRead>,
    write_results: VecDeque<MockWrite>,
    writes: Vec<Vec<u8>>,
    open_error: Option<i32>,
    read_only: bool,
    disconnected: bool,
    open_count: usize,
    live_handles: usize,
}

#[derive(Clone)]
pub struct MockDevice {
    interface: HidInterface,
    state: Arc<Mutex<MockDeviceState>>,
}

impl MockDevice {
    pub fn new(interface: HidInterface) -> Self {
        Self {
            interface,
            state: Arc::new(Mutex::new(MockDeviceState::default())),
        }
    }

    /// A DualSense data interface on the given framing.
    pub fn dualsense(path: &str, connection_type: DualSenseConnectionType) -> Self {
        let mut interface = HidInterface::new(SONY_VID, DUALSENSE_PID, path)
            .with_product_name("DualSense Wireless Controller")
            .with_report_lengths(
                connection_type.input_report_len(),
                connection_type.output_report_len(),
            );
        if connection_type == DualSenseConnectionType::USB {
            interface = interface.with_interface_number(DS_DATA_INTERFACE);
        }
        Self::new(interface)
    }

    pub fn interface(&self) -> &HidInterface {
        &self.interface
    }

    pub fn queue_report(&self, data: impl Into<Vec<u8>>) {
        self.state.lock().reads.push_back(MockRead::Report(data.into()));
    }

    pub fn queue_read_error(&self, err: TransportError) {
        self.state.lock().reads.push_back(MockRead::Error(err));
    }

    /// Overrides the outcome of the next write only.
    pub fn queue_write_result(&self, result: MockWrite) {
        self.state.lock().write_results.push_back(result);
    }

    /// Every subsequent open fails with platform error `code`, until cleared.
    pub fn fail_open(&self, code: Option<i32>) {
        self.state.lock().open_error = code;
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.state.lock().read_only = read_only;
    }

    pub fn disconnect(&self) {
        self.state.lock().disconnected = true;
    }

    pub fn reconnect(&self) {
        self.state.lock().disconnected = false;
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().writes.clone()
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().open_count
    }

    /// Handles opened and not yet dropped.
    pub fn live_handles(&self) -> usize {
        self.state.lock().live_handles
    }

    pub fn pending_reads(&self) -> usize {
        self.state.lock().reads.len()
    }
}

#[derive(Clone, Default)]
pub struct MockBackend {
    devices: Arc<Mutex<Vec<MockDevice>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(self, device: MockDevice) -> Self {
        self.add_device(device);
        self
    }

    pub fn add_device(&self, device: MockDevice) {
        self.devices.lock().push(device);
    }

    fn find(&self, path: &str) -> Option<MockDevice> {
        self.devices
            .lock()
            .iter()
            .find(|d| d.interface.path == path)
            .cloned()
    }
}

impl HidBackend for MockBackend {
    type Handle = MockHandle;

    async fn enumerate(&self) -> Result<Vec<HidInterface>, TransportError> {
        Ok(self
            .devices
            .lock()
            .iter()
            .filter(|d| !d.state.lock().disconnected)
            .map(|d| d.interface.clone())
            .collect())
    }

    async fn open(&self, path: &str) -> Result<MockHandle, TransportError> {
        let device = self
            .find(path)
            .ok_or_else(|| TransportError::NotFound(path.to_owned()))?;
        let mut state = device.state.lock();
        if state.disconnected {
            return Err(TransportError::NotFound(path.to_owned()));
        }
        if let Some(code) = state.open_error {
            return Err(TransportError::Os {
                code,
                message: "access denied".into(),
            });
        }
        state.open_count += 1;
        state.live_handles += 1;
        let writable = !state.read_only;
        drop(state);
        Ok(MockHandle {
            state: device.state.clone(),
            writable,
        })
    }
}

pub struct MockHandle {
    state: Arc<Mutex<MockDeviceState>>,
    writable: bool,
}

impl HidHandle for MockHandle {
    fn can_write(&self) -> bool {
        self.writable
    }

    async fn read_input_report(
        &self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        let next = {
            let mut state = self.state.lock();
            if state.disconnected {
                return Err(TransportError::Disconnected);
            }
            state.reads.pop_front()
        };
        match next {
            Some(MockRead::Report(data)) => {
                let len = data.len().min(buf.len());
                buf[..len].copy_from_slice(&data[..len]);
                Ok(len)
            }
            Some(MockRead::Error(err)) => Err(err),
            None => {
                Timer::after(timeout).await;
                Ok(0)
            }
        }
    }

    async fn write_output_report(&self, buf: &[u8]) -> Result<usize, TransportError> {
        let mut state = self.state.lock();
        if state.disconnected {
            return Err(TransportError::Disconnected);
        }
        match state.write_results.pop_front() {
            Some(MockWrite::Fail(err)) => Err(err),
            Some(MockWrite::Short(n)) => {
                let n = n.min(buf.len());
                state.writes.push(buf[..n].to_vec());
                Ok(n)
            }
            None => {
                state.writes.push(buf.to_vec());
                Ok(buf.len())
            }
        }
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.live_handles = state.live_handles.saturating_sub(1);
    }
}
