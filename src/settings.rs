//! User-facing controller settings and the profile lookup seam.
//!
//! Profiles are stored elsewhere; this crate only reads them through
//! [`ProfileSource`] to seed initial values.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::dualsense::StickState;
use crate::dualsense::constants::MAX_RIGIDITY;

/// Adaptive trigger resistance, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerSettings {
    pub left: u8,
    pub right: u8,
}

impl TriggerSettings {
    /// Out-of-range values are clamped to `0..=100`, never rejected.
    pub fn new(left: i32, right: i32) -> Self {
        Self {
            left: clamp_percent(left),
            right: clamp_percent(right),
        }
    }

    pub fn set_left(&mut self, rigidity: i32) {
        self.left = clamp_percent(rigidity);
    }

    pub fn set_right(&mut self, rigidity: i32) {
        self.right = clamp_percent(rigidity);
    }

    pub fn clamped(self) -> Self {
        Self::new(self.left as i32, self.right as i32)
    }
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self {
            left: 50,
            right: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeadzoneShape {
    #[default]
    Circle,
    Square,
    Cross,
}

/// Host-side stick deadzone. Never transmitted to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadzoneSettings {
    pub shape: DeadzoneShape,
    pub radius_percent: u8,
}

impl DeadzoneSettings {
    pub fn new(shape: DeadzoneShape, radius_percent: i32) -> Self {
        Self {
            shape,
            radius_percent: clamp_percent(radius_percent),
        }
    }

    /// Whether `stick` falls inside the deadzone.
    ///
    /// The radius is in stick units, so 100% covers the whole travel.
    pub fn contains(&self, stick: StickState) -> bool {
        let r = self.radius_percent.min(MAX_RIGIDITY) as i32;
        let (x, y) = (stick.x.abs(), stick.y.abs());
        match self.shape {
            DeadzoneShape::Circle => x * x + y * y < r * r,
            DeadzoneShape::Square => x < r && y < r,
            DeadzoneShape::Cross => {
                let bar = r / 3;
                (x < bar && y < r) || (y < bar && x < r)
            }
        }
    }

    pub fn apply(&self, stick: StickState) -> StickState {
        if self.contains(stick) {
            StickState::CENTER
        } else {
            stick
        }
    }
}

impl Default for DeadzoneSettings {
    fn default() -> Self {
        Self {
            shape: DeadzoneShape::Circle,
            radius_percent: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerProfile {
    pub trigger: TriggerSettings,
    pub deadzone: DeadzoneSettings,
}

/// Persisted profiles, keyed by controller serial number.
pub trait ProfileSource {
    fn profile(&self, serial_number: &str) -> Option<ControllerProfile>;
}

impl ProfileSource for HashMap<String, ControllerProfile> {
    fn profile(&self, serial_number: &str) -> Option<ControllerProfile> {
        self.get(serial_number).copied()
    }
}

/// The stored profile for `serial_number`, or `defaults` when none exists.
pub fn resolve_profile(
    source: &impl ProfileSource,
    serial_number: &str,
    defaults: ControllerProfile,
) -> ControllerProfile {
    match source.profile(serial_number) {
        Some(profile) => ControllerProfile {
            trigger: profile.trigger.clamped(),
            deadzone: DeadzoneSettings::new(
                profile.deadzone.shape,
                profile.deadzone.radius_percent as i32,
            ),
        },
        None => defaults,
    }
}

fn clamp_percent(value: i32) -> u8 {
    value.clamp(0, MAX_RIGIDITY as i32) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rigidity_is_clamped() {
        assert_eq!(TriggerSettings::new(-5, 250), TriggerSettings { left: 0, right: 100 });
        let mut settings = TriggerSettings::default();
        settings.set_left(101);
        settings.set_right(-1);
        assert_eq!(settings, TriggerSettings { left: 100, right: 0 });
        assert_eq!(TriggerSettings { left: 180, right: 20 }.clamped().left, 100);
    }

    #[test]
    fn circle_deadzone() {
        let dz = DeadzoneSettings::new(DeadzoneShape::Circle, 10);
        assert!(dz.contains(StickState::new(6, 7)));
        assert!(!dz.contains(StickState::new(8, 8)));
        assert_eq!(dz.apply(StickState::new(-3, 4)), StickState::CENTER);
        assert_eq!(dz.apply(StickState::new(50, 0)), StickState::new(50, 0));
    }

    #[test]
    fn square_deadzone() {
        let dz = DeadzoneSettings::new(DeadzoneShape::Square, 10);
        assert!(dz.contains(StickState::new(9, -9)));
        assert!(!dz.contains(StickState::new(10, 0)));
    }

    #[test]
    fn cross_deadzone() {
        let dz = DeadzoneSettings::new(DeadzoneShape::Cross, 30);
        assert!(dz.contains(StickState::new(5, 25)));
        assert!(dz.contains(StickState::new(-25, 5)));
        assert!(!dz.contains(StickState::new(20, 20)));
    }

    #[test]
    fn zero_radius_contains_nothing() {
        for shape in [DeadzoneShape::Circle, DeadzoneShape::Square, DeadzoneShape::Cross] {
            assert!(!DeadzoneSettings::new(shape, 0).contains(StickState::CENTER));
        }
    }

    #[test]
    fn profiles_fall_back_to_defaults() {
        let mut profiles = HashMap::new();
        profiles.insert(
            "DS-000001".to_string(),
            ControllerProfile {
                trigger: TriggerSettings::new(80, 20),
                deadzone: DeadzoneSettings::new(DeadzoneShape::Square, 15),
            },
        );
        let defaults = ControllerProfile::default();

        let found = resolve_profile(&profiles, "DS-000001", defaults);
        assert_eq!(found.trigger, TriggerSettings::new(80, 20));
        assert_eq!(found.deadzone.shape, DeadzoneShape::Square);

        let missing = resolve_profile(&profiles, "DS-999999", defaults);
        assert_eq!(missing, defaults);
        assert_eq!(missing.trigger, TriggerSettings::new(50, 50));
        assert_eq!(missing.deadzone.radius_percent, 10);
    }
}
