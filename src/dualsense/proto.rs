//! DualSense report layouts and the pure codec over them.
//!
//! Nothing in here performs I/O or logging.

use static_assertions::const_assert_eq;
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

use super::DualSenseConnectionType;
use super::constants::{
    DS_INPUT_REPORT_BT_SIZE, DS_INPUT_REPORT_MIN_SIZE,
    DS_OUTPUT_BT_LEFT_TRIGGER, DS_OUTPUT_BT_RIGHT_TRIGGER, DS_OUTPUT_REPORT_BT,
    DS_OUTPUT_REPORT_BT_SIZE, DS_OUTPUT_REPORT_USB, DS_OUTPUT_REPORT_USB_SIZE, DS_OUTPUT_TAG_BT,
    DS_OUTPUT_USB_LEFT_TRIGGER, DS_OUTPUT_USB_RIGHT_TRIGGER, DS_OUTPUT_VALID_FLAG0_BT_ALL,
    DS_OUTPUT_VALID_FLAG0_MIC_LED, DS_OUTPUT_VALID_FLAG0_RUMBLE, DS_OUTPUT_VALID_FLAG0_TRIGGERS,
    DS_STICK_CENTER, DS_STICK_NOISE_FLOOR, DS_TRIGGER_EFFECT_CONTINUOUS, DS_TRIGGER_EFFECT_OFF,
    MAX_RIGIDITY,
};
use crate::error::{Error, Result};
use crate::settings::TriggerSettings;

/// `[mode, strength, start position]` as the firmware expects it.
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct TriggerEffect {
    pub mode: u8,
    pub strength: u8,
    pub start_position: u8,
}

impl TriggerEffect {
    /// Maps a rigidity percentage to a continuous resistance effect.
    ///
    /// Zero turns resistance off. The strength byte is
    /// `round_half_up(rigidity * 2.55)`, computed in integers.
    pub fn from_rigidity(rigidity: u8) -> Self {
        let rigidity = rigidity.min(MAX_RIGIDITY);
        if rigidity == 0 {
            return Self {
                mode: DS_TRIGGER_EFFECT_OFF,
                strength: 0,
                start_position: 0,
            };
        }
        let strength = (rigidity as u32 * 255 + 50) / 100;
        Self {
            mode: DS_TRIGGER_EFFECT_CONTINUOUS,
            strength: strength.min(u8::MAX as u32) as u8,
            start_position: 0,
        }
    }
}

#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Debug)]
#[repr(C)]
struct DualSenseOutputReportUSB {
    report_id: u8,
    valid_flag0: u8,
    valid_flag1: u8,
    reserved: [u8; 8],
    left_trigger: TriggerEffect,
    left_trigger_params: [u8; 8],
    right_trigger: TriggerEffect,
    right_trigger_params: [u8; 8],
    reserved2: [u8; 15],
}

#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Debug)]
#[repr(C)]
struct DualSenseOutputReportBT {
    report_id: u8,
    tag: u8,
    valid_flag0: u8,
    valid_flag1: u8,
    reserved: [u8; 18],
    left_trigger: TriggerEffect,
    left_trigger_params: [u8; 4],
    right_trigger: TriggerEffect,
    reserved2: [u8; 46],
}

const_assert_eq!(size_of::<TriggerEffect>(), 3);
const_assert_eq!(size_of::<DualSenseOutputReportUSB>(), DS_OUTPUT_REPORT_USB_SIZE);
const_assert_eq!(size_of::<DualSenseOutputReportBT>(), DS_OUTPUT_REPORT_BT_SIZE);
const_assert_eq!(
    core::mem::offset_of!(DualSenseOutputReportUSB, left_trigger),
    DS_OUTPUT_USB_LEFT_TRIGGER
);
const_assert_eq!(
    core::mem::offset_of!(DualSenseOutputReportUSB, right_trigger),
    DS_OUTPUT_USB_RIGHT_TRIGGER
);
const_assert_eq!(
    core::mem::offset_of!(DualSenseOutputReportBT, left_trigger),
    DS_OUTPUT_BT_LEFT_TRIGGER
);
const_assert_eq!(
    core::mem::offset_of!(DualSenseOutputReportBT, right_trigger),
    DS_OUTPUT_BT_RIGHT_TRIGGER
);

/// Builds the trigger-effect output report for the given framing length.
///
/// Only 48 (USB) and 78 (Bluetooth) are accepted; anything else fails with
/// [`Error::UnknownFraming`] instead of producing a guessed layout.
pub fn encode_trigger_effect(settings: &TriggerSettings, framing_len: usize) -> Result<Vec<u8>> {
    let connection_type = DualSenseConnectionType::from_output_report_len(framing_len)
        .ok_or(Error::UnknownFraming(framing_len))?;
    let left = TriggerEffect::from_rigidity(settings.left);
    let right = TriggerEffect::from_rigidity(settings.right);

    let bytes = match connection_type {
        DualSenseConnectionType::USB => {
            let mut report = DualSenseOutputReportUSB::new_zeroed();
            report.report_id = DS_OUTPUT_REPORT_USB;
            report.valid_flag0 = DS_OUTPUT_VALID_FLAG0_RUMBLE
                | DS_OUTPUT_VALID_FLAG0_MIC_LED
                | DS_OUTPUT_VALID_FLAG0_TRIGGERS;
            report.left_trigger = left;
            report.right_trigger = right;
            report.as_bytes().to_vec()
        }
        DualSenseConnectionType::BT => {
            let mut report = DualSenseOutputReportBT::new_zeroed();
            report.report_id = DS_OUTPUT_REPORT_BT;
            report.tag = DS_OUTPUT_TAG_BT;
            report.valid_flag0 = DS_OUTPUT_VALID_FLAG0_BT_ALL;
            report.valid_flag1 = DS_OUTPUT_VALID_FLAG0_TRIGGERS;
            report.left_trigger = left;
            report.right_trigger = right;
            report.as_bytes().to_vec()
        }
    };
    Ok(bytes)
}

/// First eight bytes of a USB input report, or of a Bluetooth one once its
/// extra header byte is stripped.
#[derive(FromBytes, KnownLayout, Immutable, Debug, Clone, Copy)]
#[repr(C)]
struct DualSenseInputReportHead {
    report_id: u8,
    x: u8,
    y: u8,
    rx: u8,
    ry: u8,
    z: u8,
    rz: u8,
    seq_number: u8,
}

const_assert_eq!(size_of::<DualSenseInputReportHead>(), DS_INPUT_REPORT_MIN_SIZE);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StickState {
    /// -100 (left) ..= 100 (right)
    pub x: i32,
    /// -100 (down) ..= 100 (up)
    pub y: i32,
}

impl StickState {
    pub const CENTER: Self = Self { x: 0, y: 0 };

    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TriggerState {
    pub left: u8,
    pub right: u8,
}

/// Everything one input report decodes to. Replaced wholesale per report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct InputState {
    pub left_stick: StickState,
    pub right_stick: StickState,
    pub triggers: TriggerState,
}

/// Bytes of one input report as read from the device.
#[derive(Clone)]
pub struct RawInputReport {
    data: [u8; DS_INPUT_REPORT_BT_SIZE],
    len: usize,
}

impl RawInputReport {
    pub const CAPACITY: usize = DS_INPUT_REPORT_BT_SIZE;

    pub fn empty() -> Self {
        Self {
            data: [0u8; DS_INPUT_REPORT_BT_SIZE],
            len: 0,
        }
    }

    /// Copies at most [`Self::CAPACITY`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut report = Self::empty();
        let len = bytes.len().min(Self::CAPACITY);
        report.data[..len].copy_from_slice(&bytes[..len]);
        report.len = len;
        report
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub(crate) fn set_len(&mut self, len: usize) {
        self.len = len.min(Self::CAPACITY);
    }

    /// Drops the first `n` bytes, shifting the rest to the front.
    pub(crate) fn strip_front(&mut self, n: usize) {
        let n = n.min(self.len);
        self.data.copy_within(n..self.len, 0);
        self.len -= n;
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl std::fmt::Debug for RawInputReport {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "RawInputReport({:02X?})", self.as_bytes())
    }
}

/// Decodes stick and trigger positions from an input report.
///
/// Offsets are fixed to the USB layout (X at 1, Y at 2, L2 at 5, R2 at 6)
/// whatever the report id. Bluetooth framing is normalised by the session
/// before decoding.
pub fn decode_input_report(raw: &[u8]) -> Result<InputState> {
    let (head, _) = DualSenseInputReportHead::read_from_prefix(raw)
        .map_err(|_| Error::ShortReport(raw.len()))?;

    Ok(InputState {
        left_stick: StickState {
            x: stick_axis(head.x),
            y: -stick_axis(head.y),
        },
        right_stick: StickState {
            x: stick_axis(head.rx),
            y: -stick_axis(head.ry),
        },
        triggers: TriggerState {
            left: head.z,
            right: head.rz,
        },
    })
}

/// 0..=255 with 128 at rest to -100..=100, snapping noise to zero.
fn stick_axis(raw: u8) -> i32 {
    let offset = (raw as i32 - DS_STICK_CENTER) as f64;
    let value = ((offset / 127.0) * 100.0).round() as i32;
    if value.abs() < DS_STICK_NOISE_FLOOR {
        0
    } else {
        value.clamp(-100, 100)
    }
}
