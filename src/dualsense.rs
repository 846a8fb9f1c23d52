pub mod constants;
pub mod hid;
pub mod locator;
pub mod mock;
pub mod proto;
pub mod session;
pub mod transport;

use constants::{
    DS_INPUT_REPORT_BT_SIZE, DS_INPUT_REPORT_USB_SIZE, DS_OUTPUT_REPORT_BT_SIZE,
    DS_OUTPUT_REPORT_USB_SIZE,
};

pub use locator::{DeviceIdentity, find_controllers, find_first_controller};
pub use proto::{
    InputState, RawInputReport, StickState, TriggerState, decode_input_report,
    encode_trigger_effect,
};
pub use session::{DeviceSession, SessionState};
pub use transport::{HidBackend, HidHandle, HidInterface, TransportError};

/// Report framing negotiated with the controller.
///
/// The controller speaks a 48-byte output report over USB and a 78-byte one
/// over Bluetooth; any other length is not a usable DualSense interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DualSenseConnectionType {
    USB,
    BT,
}

impl DualSenseConnectionType {
    pub fn from_output_report_len(len: usize) -> Option<Self> {
        match len {
            DS_OUTPUT_REPORT_USB_SIZE => Some(Self::USB),
            DS_OUTPUT_REPORT_BT_SIZE => Some(Self::BT),
            _ => None,
        }
    }

    pub fn from_input_report_len(len: usize) -> Option<Self> {
        match len {
            DS_INPUT_REPORT_USB_SIZE => Some(Self::USB),
            DS_INPUT_REPORT_BT_SIZE => Some(Self::BT),
            _ => None,
        }
    }

    pub fn output_report_len(&self) -> usize {
        match self {
            Self::USB => DS_OUTPUT_REPORT_USB_SIZE,
            Self::BT => DS_OUTPUT_REPORT_BT_SIZE,
        }
    }

    pub fn input_report_len(&self) -> usize {
        match self {
            Self::USB => DS_INPUT_REPORT_USB_SIZE,
            Self::BT => DS_INPUT_REPORT_BT_SIZE,
        }
    }

    pub fn is_wireless(&self) -> bool {
        matches!(self, Self::BT)
    }
}

impl std::fmt::Display for DualSenseConnectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::USB => write!(f, "USB"),
            Self::BT => write!(f, "BT"),
        }
    }
}
