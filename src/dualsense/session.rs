//! One open controller and the discipline around its handle.

use std::sync::Arc;

use smol::lock::Mutex;
use tracing::{debug, warn};

use super::DualSenseConnectionType;
use super::constants::{DS_INPUT_REPORT_BT_HEADER_SIZE, DS_INPUT_REPORT_BT_SIZE};
use super::locator::DeviceIdentity;
use super::proto::{RawInputReport, encode_trigger_effect};
use super::transport::{HidBackend, HidHandle};
use crate::config::SessionConfig;
use crate::error::{Error, Result, WriteError};
use crate::settings::TriggerSettings;

enum HandleState<H> {
    Unopened,
    Open(Arc<H>),
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unopened,
    Open,
    Closed,
}

/// Owns the handle of one physical controller.
///
/// Open and close transitions happen under a single async mutex. Reads
/// clone the handle under that mutex and release it before doing I/O, so a
/// write never waits on a pending read and `close` never frees a handle out
/// from under one.
pub struct DeviceSession<B: HidBackend> {
    backend: Arc<B>,
    identity: DeviceIdentity,
    config: SessionConfig,
    handle: Mutex<HandleState<B::Handle>>,
}

impl<B: HidBackend> DeviceSession<B> {
    pub fn new(backend: Arc<B>, identity: DeviceIdentity) -> Self {
        Self::with_config(backend, identity, SessionConfig::default())
    }

    pub fn with_config(backend: Arc<B>, identity: DeviceIdentity, config: SessionConfig) -> Self {
        Self {
            backend,
            identity,
            config,
            handle: Mutex::new(HandleState::Unopened),
        }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub async fn state(&self) -> SessionState {
        match &*self.handle.lock().await {
            HandleState::Unopened => SessionState::Unopened,
            HandleState::Open(_) => SessionState::Open,
            HandleState::Closed => SessionState::Closed,
        }
    }

    /// Returns the open handle, opening the device first if needed.
    pub async fn ensure_open(&self) -> Result<Arc<B::Handle>> {
        let mut state = self.handle.lock().await;
        let (handle, _) = self.open_locked(&mut state).await?;
        Ok(handle)
    }

    async fn open_locked(
        &self,
        state: &mut HandleState<B::Handle>,
    ) -> Result<(Arc<B::Handle>, bool)> {
        if let HandleState::Open(handle) = state {
            return Ok((handle.clone(), false));
        }
        let path = self.identity.device_path();
        let handle = self
            .backend
            .open(path)
            .await
            .map_err(|source| Error::OpenFailed {
                path: path.to_owned(),
                source,
            })?;
        debug!(path, serial = self.identity.serial_number(), "session opened");
        let handle = Arc::new(handle);
        *state = HandleState::Open(handle.clone());
        Ok((handle, true))
    }

    /// Writes the trigger effects for `settings` to the controller.
    ///
    /// A write only succeeds if the full report went out. On failure the
    /// handle is dropped when it was opened by this call or the platform
    /// reports it invalid, so the next call starts clean.
    pub async fn apply_effects(&self, settings: &TriggerSettings) -> Result<()> {
        let report = encode_trigger_effect(settings, self.identity.max_output_report_len())?;

        let mut state = self.handle.lock().await;
        let (handle, opened_now) = self.open_locked(&mut state).await?;
        let err = match handle.write_output_report(&report).await {
            Ok(written) if written == report.len() => {
                debug!(
                    path = self.identity.device_path(),
                    left = settings.left,
                    right = settings.right,
                    "applied trigger effects"
                );
                return Ok(());
            }
            Ok(written) => WriteError::Short {
                written,
                expected: report.len(),
            },
            Err(source) => WriteError::Transport(source),
        };

        let invalid = matches!(&err, WriteError::Transport(source) if source.invalidates_handle());
        if opened_now || invalid {
            warn!(path = self.identity.device_path(), error = %err, "dropping handle after failed write");
            *state = HandleState::Unopened;
        }
        Err(err.into())
    }

    /// Reads one input report. Never opens the device.
    ///
    /// Returns [`Error::NotReady`] while the handle is not open and an empty
    /// report when nothing arrived within the read timeout. On a Bluetooth
    /// session a full-length report has its extra header byte stripped, so
    /// callers always see the USB layout.
    pub async fn read_input_report(&self) -> Result<RawInputReport> {
        let handle = match &*self.handle.lock().await {
            HandleState::Open(handle) => handle.clone(),
            _ => return Err(Error::NotReady),
        };

        let mut report = RawInputReport::empty();
        match handle
            .read_input_report(report.buffer_mut(), self.config.read_timeout())
            .await
        {
            Ok(size) => {
                report.set_len(size);
                if self.identity.connection_type() == DualSenseConnectionType::BT
                    && size == DS_INPUT_REPORT_BT_SIZE
                {
                    report.strip_front(DS_INPUT_REPORT_BT_HEADER_SIZE);
                }
                Ok(report)
            }
            Err(source) => {
                if source.invalidates_handle() {
                    self.forget(&handle).await;
                }
                Err(Error::Read(source))
            }
        }
    }

    /// Drops `handle` if it is still the current one.
    async fn forget(&self, handle: &Arc<B::Handle>) {
        let mut state = self.handle.lock().await;
        let current = matches!(&*state, HandleState::Open(current) if Arc::ptr_eq(current, handle));
        if current {
            debug!(path = self.identity.device_path(), "dropping invalidated handle");
            *state = HandleState::Unopened;
        }
    }

    /// Releases the handle if held. Safe to call repeatedly.
    pub async fn close(&self) {
        let mut state = self.handle.lock().await;
        if let HandleState::Open(_) = &*state {
            debug!(path = self.identity.device_path(), "session closed");
        }
        *state = HandleState::Closed;
    }
}
