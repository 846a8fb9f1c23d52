//! DualSense discovery, input polling and adaptive trigger resistance.
//!
//! [`dualsense::find_controllers`] yields usable controllers, a
//! [`dualsense::DeviceSession`] writes trigger effects and reads input
//! reports for one of them, and an [`poller::InputPoller`] turns those reads
//! into change notifications.

pub mod config;
pub mod diagnostics;
pub mod dualsense;
pub mod error;
pub mod poller;
pub mod settings;

pub use config::Config;
pub use error::{Error, Result};
pub use poller::InputPoller;
pub use settings::{ControllerProfile, DeadzoneSettings, DeadzoneShape, TriggerSettings};
