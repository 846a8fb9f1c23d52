//! Background input loop for one [`DeviceSession`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_io::Timer;
use futures_lite::FutureExt;
use smol::Task;
use tracing::{debug, info, warn};

use crate::config::PollerConfig;
use crate::dualsense::{DeviceSession, HidBackend, InputState, decode_input_report};
use crate::error::{Error, Result};

type ChangeHandler = Arc<dyn Fn(InputState) + Send + Sync + 'static>;

struct Running {
    stop: Arc<AtomicBool>,
    task: Task<()>,
}

/// Reads input reports in the background and publishes decoded changes.
///
/// Read failures never reach subscribers; the loop backs off and keeps
/// going until [`InputPoller::stop`].
pub struct InputPoller<B: HidBackend> {
    session: Arc<DeviceSession<B>>,
    config: PollerConfig,
    handlers: Vec<ChangeHandler>,
    running: Option<Running>,
}

impl<B: HidBackend> InputPoller<B> {
    pub fn new(session: Arc<DeviceSession<B>>) -> Self {
        Self::with_config(session, PollerConfig::default())
    }

    pub fn with_config(session: Arc<DeviceSession<B>>, config: PollerConfig) -> Self {
        Self {
            session,
            config,
            handlers: Vec::new(),
            running: None,
        }
    }

    pub fn session(&self) -> &Arc<DeviceSession<B>> {
        &self.session
    }

    /// Registers a subscriber. Takes effect on the next [`InputPoller::start`].
    pub fn on_change<F>(&mut self, handler: F)
    where
        F: Fn(InputState) + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(handler));
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Opens the session and spawns the read loop. No-op when running.
    pub async fn start(&mut self) -> Result<()> {
        if self.running.is_some() {
            return Ok(());
        }
        self.session.ensure_open().await?;

        let stop = Arc::new(AtomicBool::new(false));
        let task = smol::spawn(poll_loop(
            self.session.clone(),
            self.config,
            self.handlers.clone(),
            stop.clone(),
        ));
        info!(path = self.session.identity().device_path(), "input poller started");
        self.running = Some(Running { stop, task });
        Ok(())
    }

    /// Stops the loop and closes the session.
    ///
    /// Waits up to the stop timeout for the current iteration, then cancels
    /// the task. No subscriber runs once this returns.
    pub async fn stop(&mut self) {
        let Some(Running { stop, mut task }) = self.running.take() else {
            return;
        };
        stop.store(true, Ordering::Release);

        let timeout = self.config.stop_timeout();
        let finished = async {
            (&mut task).await;
            true
        }
        .or(async {
            Timer::after(timeout).await;
            false
        })
        .await;
        if !finished {
            warn!(?timeout, "input poller did not stop in time, cancelling");
            task.cancel().await;
        }

        self.session.close().await;
        info!(path = self.session.identity().device_path(), "input poller stopped");
    }
}

/// Dropping a running poller cancels its task and closes the session on a
/// detached task. Use [`InputPoller::stop`] to wait for both.
impl<B: HidBackend> Drop for InputPoller<B> {
    fn drop(&mut self) {
        let Some(Running { stop, task }) = self.running.take() else {
            return;
        };
        stop.store(true, Ordering::Release);
        drop(task);
        let session = self.session.clone();
        smol::spawn(async move { session.close().await }).detach();
    }
}

async fn poll_loop<B: HidBackend>(
    session: Arc<DeviceSession<B>>,
    config: PollerConfig,
    handlers: Vec<ChangeHandler>,
    stop: Arc<AtomicBool>,
) {
    let mut last: Option<InputState> = None;
    let mut backoff = config.error_backoff();

    while !stop.load(Ordering::Acquire) {
        let report = match session.read_input_report().await {
            Ok(report) => {
                backoff = config.error_backoff();
                report
            }
            Err(Error::NotReady) => {
                Timer::after(config.idle_delay()).await;
                continue;
            }
            Err(error) => {
                warn!(%error, ?backoff, "input report read failed");
                Timer::after(backoff).await;
                backoff = next_backoff(backoff, config.max_error_backoff());
                continue;
            }
        };
        if report.is_empty() {
            Timer::after(config.idle_delay()).await;
            continue;
        }

        let state = match decode_input_report(report.as_bytes()) {
            Ok(state) => state,
            Err(error) => {
                debug!(%error, ?report, "skipping input report");
                continue;
            }
        };
        if last == Some(state) {
            continue;
        }
        last = Some(state);
        for handler in &handlers {
            handler(state);
        }
    }
}

fn next_backoff(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use parking_lot::Mutex;

    use super::*;
    use crate::config::SessionConfig;
    use crate::settings::TriggerSettings;
    use crate::dualsense::mock::{MockBackend, MockDevice};
    use crate::dualsense::{
        DeviceIdentity, DualSenseConnectionType, SessionState, StickState, TransportError,
    };

    fn setup() -> (MockDevice, InputPoller<MockBackend>, Arc<Mutex<Vec<InputState>>>) {
        setup_with(
            SessionConfig { read_timeout_ms: 5 },
            PollerConfig {
                error_backoff_ms: 1,
                max_error_backoff_ms: 4,
                ..Default::default()
            },
        )
    }

    fn setup_with(
        session_config: SessionConfig,
        poller_config: PollerConfig,
    ) -> (MockDevice, InputPoller<MockBackend>, Arc<Mutex<Vec<InputState>>>) {
        let device = MockDevice::dualsense("usb", DualSenseConnectionType::USB);
        let backend = Arc::new(MockBackend::new().with_device(device.clone()));
        let identity = DeviceIdentity::new("usb", None, 48).unwrap();
        let session = DeviceSession::with_config(backend, identity, session_config);
        let mut poller = InputPoller::with_config(Arc::new(session), poller_config);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        poller.on_change(move |state| sink.lock().push(state));
        (device, poller, seen)
    }

    fn report(x: u8, l2: u8) -> Vec<u8> {
        let mut raw = vec![0u8; 64];
        raw[0] = 0x01;
        raw[1] = x;
        raw[2] = 128;
        raw[3] = 128;
        raw[4] = 128;
        raw[5] = l2;
        raw
    }

    async fn drain(device: &MockDevice) {
        for _ in 0..400 {
            if device.pending_reads() == 0 {
                break;
            }
            Timer::after(Duration::from_millis(5)).await;
        }
        assert_eq!(device.pending_reads(), 0);
    }

    #[test]
    fn stop_right_after_start_closes_session() {
        smol::block_on(async {
            let (device, mut poller, _) = setup();
            poller.start().await.unwrap();
            assert!(poller.is_running());

            let begin = Instant::now();
            poller.stop().await;
            assert!(begin.elapsed() < Duration::from_millis(500) + Duration::from_millis(250));
            assert!(!poller.is_running());
            assert_eq!(poller.session().state().await, SessionState::Closed);
            assert_eq!(device.live_handles(), 0);
        });
    }

    #[test]
    fn stop_cancels_a_read_that_outlasts_the_timeout() {
        smol::block_on(async {
            let (device, mut poller, seen) = setup_with(
                SessionConfig {
                    read_timeout_ms: 3000,
                },
                PollerConfig {
                    stop_timeout_ms: 100,
                    ..Default::default()
                },
            );
            poller.start().await.unwrap();
            // let the loop enter its long read
            Timer::after(Duration::from_millis(20)).await;

            let begin = Instant::now();
            poller
                .session()
                .apply_effects(&TriggerSettings::new(0, 100))
                .await
                .unwrap();
            assert!(begin.elapsed() < Duration::from_millis(500));
            assert_eq!(device.writes().len(), 1);

            let begin = Instant::now();
            poller.stop().await;
            let elapsed = begin.elapsed();
            assert!(elapsed >= Duration::from_millis(100));
            assert!(elapsed < Duration::from_millis(1000));
            assert_eq!(poller.session().state().await, SessionState::Closed);
            assert_eq!(device.live_handles(), 0);
            assert!(seen.lock().is_empty());
        });
    }

    #[test]
    fn dropping_a_running_poller_closes_the_session() {
        smol::block_on(async {
            let (device, mut poller, _) = setup();
            poller.start().await.unwrap();
            let session = poller.session().clone();
            drop(poller);

            for _ in 0..200 {
                if session.state().await == SessionState::Closed && device.live_handles() == 0 {
                    break;
                }
                Timer::after(Duration::from_millis(5)).await;
            }
            assert_eq!(session.state().await, SessionState::Closed);
            assert_eq!(device.live_handles(), 0);
        });
    }

    #[test]
    fn dropping_an_idle_poller_leaves_the_session_alone() {
        smol::block_on(async {
            let (device, poller, _) = setup();
            let session = poller.session().clone();
            session.ensure_open().await.unwrap();
            drop(poller);
            Timer::after(Duration::from_millis(20)).await;
            assert_eq!(session.state().await, SessionState::Open);
            assert_eq!(device.live_handles(), 1);
        });
    }

    #[test]
    fn identical_states_are_published_once() {
        smol::block_on(async {
            let (device, mut poller, seen) = setup();
            device.queue_report(report(200, 10));
            device.queue_report(report(200, 10));
            device.queue_report(report(200, 10));
            device.queue_report(report(128, 10));
            poller.start().await.unwrap();
            drain(&device).await;
            poller.stop().await;

            let seen = seen.lock();
            assert_eq!(seen.len(), 2);
            assert_eq!(seen[0].left_stick.x, 57);
            assert_eq!(seen[0].triggers.left, 10);
            assert_eq!(seen[1].left_stick, StickState::CENTER);
        });
    }

    #[test]
    fn keeps_polling_after_read_errors() {
        smol::block_on(async {
            let (device, mut poller, seen) = setup();
            for _ in 0..4 {
                device.queue_read_error(TransportError::Os {
                    code: 31,
                    message: "device not functioning".into(),
                });
            }
            device.queue_report(report(255, 0));
            poller.start().await.unwrap();
            drain(&device).await;
            poller.stop().await;

            assert_eq!(seen.lock().len(), 1);
            assert_eq!(seen.lock()[0].left_stick.x, 100);
        });
    }

    #[test]
    fn undecodable_reports_are_skipped() {
        smol::block_on(async {
            let (device, mut poller, seen) = setup();
            device.queue_report(vec![0x01, 1, 2]);
            device.queue_report(report(0, 0));
            poller.start().await.unwrap();
            drain(&device).await;
            poller.stop().await;

            assert_eq!(seen.lock().len(), 1);
            assert_eq!(seen.lock()[0].left_stick.x, -100);
        });
    }

    #[test]
    fn nothing_is_published_after_stop() {
        smol::block_on(async {
            let (device, mut poller, seen) = setup();
            poller.start().await.unwrap();
            poller.stop().await;

            device.queue_report(report(255, 255));
            Timer::after(Duration::from_millis(30)).await;
            assert!(seen.lock().is_empty());
            assert_eq!(device.pending_reads(), 1);
        });
    }

    #[test]
    fn start_is_idempotent_and_restartable() {
        smol::block_on(async {
            let (device, mut poller, _) = setup();
            poller.start().await.unwrap();
            poller.start().await.unwrap();
            assert_eq!(device.open_count(), 1);
            poller.stop().await;
            poller.stop().await;

            poller.start().await.unwrap();
            assert_eq!(device.open_count(), 2);
            poller.stop().await;
        });
    }

    #[test]
    fn start_surfaces_open_failure() {
        smol::block_on(async {
            let (device, mut poller, _) = setup();
            device.fail_open(Some(5));
            assert!(matches!(
                poller.start().await,
                Err(Error::OpenFailed { .. })
            ));
            assert!(!poller.is_running());
        });
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let max = Duration::from_millis(1000);
        let mut backoff = Duration::from_millis(10);
        let mut steps = Vec::new();
        for _ in 0..8 {
            backoff = next_backoff(backoff, max);
            steps.push(backoff.as_millis());
        }
        assert_eq!(steps, [20, 40, 80, 160, 320, 640, 1000, 1000]);
    }
}
