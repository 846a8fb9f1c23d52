use std::sync::Arc;
use std::time::Duration;

use async_io::Timer;
use parking_lot::Mutex;

use dualsense_triggers::TriggerSettings;
use dualsense_triggers::dualsense::mock::{MockBackend, MockDevice};
use dualsense_triggers::dualsense::{
    DeviceSession, DualSenseConnectionType, SessionState, StickState, find_controllers,
};
use dualsense_triggers::poller::InputPoller;
use futures_lite::StreamExt;

#[test]
fn discover_apply_and_poll() {
    smol::block_on(async {
        let device = MockDevice::dualsense("usb-port-1", DualSenseConnectionType::USB);
        let backend = Arc::new(MockBackend::new().with_device(device.clone()));

        let found: Vec<_> = find_controllers(backend.as_ref()).await.unwrap().collect().await;
        assert_eq!(found.len(), 1);
        let identity = found.into_iter().next().unwrap();
        assert_eq!(identity.max_output_report_len(), 48);
        assert!(!identity.is_wireless());
        assert!(identity.serial_number().starts_with("DS-"));

        let session = Arc::new(DeviceSession::new(backend.clone(), identity));
        session
            .apply_effects(&TriggerSettings::new(0, 100))
            .await
            .unwrap();

        let writes = device.writes();
        assert_eq!(writes.len(), 1);
        let report = &writes[0];
        assert_eq!(report.len(), 48);
        assert_eq!(report[11], 0x00);
        assert_eq!(&report[22..25], &[0x01, 255, 0x00]);

        let mut raw = vec![0u8; 64];
        raw[0] = 0x01;
        raw[1] = 255;
        raw[2] = 0;
        raw[3] = 128;
        raw[4] = 128;
        raw[5] = 30;
        raw[6] = 200;
        device.queue_report(raw.clone());
        device.queue_report(raw);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut poller = InputPoller::new(session.clone());
        let sink = seen.clone();
        poller.on_change(move |state| sink.lock().push(state));
        poller.start().await.unwrap();

        for _ in 0..200 {
            if device.pending_reads() == 0 {
                break;
            }
            Timer::after(Duration::from_millis(5)).await;
        }
        poller.stop().await;

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].left_stick, StickState::new(100, 100));
        assert_eq!(seen[0].right_stick, StickState::CENTER);
        assert_eq!(seen[0].triggers.left, 30);
        assert_eq!(seen[0].triggers.right, 200);

        assert_eq!(session.state().await, SessionState::Closed);
        assert_eq!(device.live_handles(), 0);
        assert_eq!(device.open_count(), 2);
    });
}
