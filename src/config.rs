//! Runtime tunables, loaded from TOML.
//!
//! ```toml
//! auto_apply = true
//!
//! [session]
//! read_timeout_ms = 100
//!
//! [poller]
//! idle_delay_ms = 1
//! error_backoff_ms = 10
//! max_error_backoff_ms = 1000
//! stop_timeout_ms = 500
//!
//! [defaults.trigger]
//! left = 50
//! right = 50
//!
//! [defaults.deadzone]
//! shape = "Circle"
//! radius_percent = 10
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::settings::ControllerProfile;

pub const DEFAULT_CONFIG_FILE: &str = "dualsense-triggers.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub session: SessionConfig,
    pub poller: PollerConfig,
    /// Seed used for controllers without a stored profile.
    pub defaults: ControllerProfile,
    /// Push trigger effects as soon as a controller is found.
    pub auto_apply: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            poller: PollerConfig::default(),
            defaults: ControllerProfile::default(),
            auto_apply: true,
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml_str(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub read_timeout_ms: u64,
}

impl SessionConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Wait after an empty read or a not-yet-open handle.
    pub idle_delay_ms: u64,
    /// First wait after a hard read error; doubles per consecutive error.
    pub error_backoff_ms: u64,
    pub max_error_backoff_ms: u64,
    pub stop_timeout_ms: u64,
}

impl PollerConfig {
    pub fn idle_delay(&self) -> Duration {
        Duration::from_millis(self.idle_delay_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn max_error_backoff(&self) -> Duration {
        Duration::from_millis(self.max_error_backoff_ms.max(self.error_backoff_ms))
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            idle_delay_ms: 1,
            error_backoff_ms: 10,
            max_error_backoff_ms: 1000,
            stop_timeout_ms: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::settings::DeadzoneShape;

    #[test]
    fn empty_document_yields_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.auto_apply);
        assert_eq!(config.session.read_timeout(), Duration::from_millis(100));
        assert_eq!(config.poller.stop_timeout(), Duration::from_millis(500));
        assert_eq!(config.defaults.trigger.left, 50);
        assert_eq!(config.defaults.deadzone.shape, DeadzoneShape::Circle);
    }

    #[test]
    fn partial_tables_keep_remaining_defaults() {
        let config = Config::from_toml_str(
            r#"
            auto_apply = false

            [poller]
            error_backoff_ms = 20

            [defaults.deadzone]
            shape = "Cross"
            "#,
        )
        .unwrap();
        assert!(!config.auto_apply);
        assert_eq!(config.poller.error_backoff_ms, 20);
        assert_eq!(config.poller.idle_delay_ms, 1);
        assert_eq!(config.defaults.deadzone.shape, DeadzoneShape::Cross);
        assert_eq!(config.defaults.deadzone.radius_percent, 10);
    }

    #[test]
    fn backoff_cap_never_below_initial() {
        let poller = PollerConfig {
            error_backoff_ms: 50,
            max_error_backoff_ms: 5,
            ..Default::default()
        };
        assert_eq!(poller.max_error_backoff(), Duration::from_millis(50));
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        assert!(matches!(
            Config::from_toml_str("poller = 3"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load_or_default("/nonexistent/dualsense-triggers.toml").unwrap();
        assert_eq!(config, Config::default());
        assert!(matches!(
            Config::load("/nonexistent/dualsense-triggers.toml"),
            Err(Error::Io(_))
        ));
    }
}
