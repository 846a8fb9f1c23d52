pub const SONY_VID: u16 = 0x054C;
pub const DUALSENSE_PID: u16 = 0x0CE6;
pub const DUALSENSE_EDGE_PID: u16 = 0x0DF2;

/// Product ids accepted by the locator.
pub const KNOWN_PIDS: [u16; 2] = [DUALSENSE_PID, DUALSENSE_EDGE_PID];

/// Wider set only used for the "could be DualSense" diagnostic verdict.
pub const CANDIDATE_PIDS: [u16; 4] = [DUALSENSE_PID, DUALSENSE_EDGE_PID, 0x0CE7, 0x0CE9];

/// The USB composite device exposes audio on 0..=2; reports travel on 3.
pub const DS_DATA_INTERFACE: i32 = 3;

pub const DS_INPUT_REPORT_USB_SIZE: usize = 64;
/// A full Bluetooth input report carries one header byte ahead of the USB
/// layout.
pub const DS_INPUT_REPORT_BT_HEADER_SIZE: usize = 1;
pub const DS_INPUT_REPORT_BT_SIZE: usize = 78;

pub const DS_OUTPUT_REPORT_USB: u8 = 0x02;
pub const DS_OUTPUT_REPORT_USB_SIZE: usize = 48;
pub const DS_OUTPUT_REPORT_BT: u8 = 0x31;
pub const DS_OUTPUT_REPORT_BT_SIZE: usize = 78;
pub const DS_OUTPUT_TAG_BT: u8 = 0x02;

pub const DS_OUTPUT_VALID_FLAG0_RUMBLE: u8 = 0x01;
pub const DS_OUTPUT_VALID_FLAG0_MIC_LED: u8 = 0x02;
pub const DS_OUTPUT_VALID_FLAG0_TRIGGERS: u8 = 0x04;
pub const DS_OUTPUT_VALID_FLAG0_BT_ALL: u8 = 0xFF;

pub const DS_OUTPUT_USB_LEFT_TRIGGER: usize = 11;
pub const DS_OUTPUT_USB_RIGHT_TRIGGER: usize = 22;
pub const DS_OUTPUT_BT_LEFT_TRIGGER: usize = 22;
pub const DS_OUTPUT_BT_RIGHT_TRIGGER: usize = DS_OUTPUT_BT_LEFT_TRIGGER + 7;

pub const DS_TRIGGER_EFFECT_OFF: u8 = 0x00;
pub const DS_TRIGGER_EFFECT_CONTINUOUS: u8 = 0x01;

/// Smallest input report the decoder accepts.
pub const DS_INPUT_REPORT_MIN_SIZE: usize = 8;

pub const DS_STICK_CENTER: i32 = 128;
/// Converted stick values below this magnitude are sensor noise.
pub const DS_STICK_NOISE_FLOOR: i32 = 5;

pub const MAX_RIGIDITY: u8 = 100;
