//! Static configuration loaded once at startup
//!
//! This configuration is read-only after the daemon starts.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::types::{Capabilities, ClimatePreset, SwingMode};
use crate::unit::{DefaultUnit, UnitConfig};

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A duration that must be positive is zero
    #[error("'{0}' must be greater than zero")]
    ZeroDuration(&'static str),
    /// The per-tick read budget does not fit inside the polling interval
    #[error("response_timeout_ms ({response_ms}) must be shorter than interval_ms ({interval_ms})")]
    ResponseTimeoutTooLong { response_ms: u64, interval_ms: u64 },
    /// The frame stall timeout does not fit inside the read budget
    #[error("frame_timeout_ms ({frame_ms}) must be shorter than response_timeout_ms ({response_ms})")]
    FrameTimeoutTooLong { frame_ms: u64, response_ms: u64 },
    /// A retry or failure threshold is zero
    #[error("'{0}' must be at least 1")]
    ZeroThreshold(&'static str),
    /// An accessory binding was given an empty name
    #[error("Accessory '{0}' has an empty name")]
    EmptyAccessoryName(&'static str),
    /// The external sensor scale would zero every reading
    #[error("Sensor scale must be a finite non-zero number, got {0}")]
    InvalidSensorScale(String),
}

/// Device identity and serial port
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Identifier used in logs
    pub id: String,
    /// Serial device path (e.g. "/dev/ttyUSB0"); may be given on the command line instead
    pub port: Option<String>,
    /// Log every frame sent and received
    pub debug_uart: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            id: "gree_ac".to_string(),
            port: None,
            debug_uart: false,
        }
    }
}

/// Polling cycle timing and thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Interval between polling cycles in milliseconds
    pub interval_ms: u64,
    /// How long one cycle waits for the unit's report, in milliseconds
    pub response_timeout_ms: u64,
    /// Inter-byte stall after which a partial frame is discarded, in milliseconds
    pub frame_timeout_ms: u64,
    /// Consecutive failed cycles before the unit is reported unavailable
    pub max_consecutive_failures: u32,
    /// Unacknowledged cycles before a pending command is dropped
    pub max_command_retries: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            response_timeout_ms: 400,
            frame_timeout_ms: DefaultUnit::DEFAULT_FRAME_TIMEOUT_MS,
            max_consecutive_failures: 5,
            max_command_retries: 3,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }
}

/// Capability sets offered to callers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimateConfig {
    /// Presets callers may select; `none` is always available
    pub supported_presets: Option<Vec<ClimatePreset>>,
    /// Swing modes callers may select; all four when unset
    pub supported_swing_modes: Option<Vec<SwingMode>>,
}

impl ClimateConfig {
    /// Resolve the configured lists into capability sets
    pub fn capabilities(&self) -> Capabilities {
        let presets = self.supported_presets.clone().unwrap_or_default();
        let swing_modes = self
            .supported_swing_modes
            .clone()
            .unwrap_or_else(|| SwingMode::ALL.to_vec());
        Capabilities::new(presets, swing_modes)
    }
}

/// External current-temperature sensor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// File holding a single numeric reading (e.g. a 1-wire or hwmon sysfs file)
    pub path: PathBuf,
    /// Factor applied to the raw reading to obtain °C (0.001 for millidegrees)
    #[serde(default = "default_sensor_scale")]
    pub scale: f32,
}

fn default_sensor_scale() -> f32 {
    1.0
}

/// Optional accessory proxies. Each slot holds the proxy's display name;
/// an absent slot means the proxy is never created.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessoryBindings {
    pub horizontal_swing_select: Option<String>,
    pub vertical_swing_select: Option<String>,
    pub display_select: Option<String>,
    pub plasma_switch: Option<String>,
    pub sleep_switch: Option<String>,
    pub xfan_switch: Option<String>,
}

impl AccessoryBindings {
    /// Slot name and binding for every slot
    pub fn slots(&self) -> [(&'static str, Option<&str>); 6] {
        [
            ("horizontal_swing_select", self.horizontal_swing_select.as_deref()),
            ("vertical_swing_select", self.vertical_swing_select.as_deref()),
            ("display_select", self.display_select.as_deref()),
            ("plasma_switch", self.plasma_switch.as_deref()),
            ("sleep_switch", self.sleep_switch.as_deref()),
            ("xfan_switch", self.xfan_switch.as_deref()),
        ]
    }
}

/// Static configuration for the Gree daemon.
///
/// Located at `~/.config/gree-ac/config.toml` by default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticConfig {
    pub device: DeviceConfig,
    pub polling: PollingConfig,
    pub climate: ClimateConfig,
    pub sensor: Option<SensorConfig>,
    pub accessories: AccessoryBindings,
}

impl StaticConfig {
    /// Parse StaticConfig from TOML string.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize StaticConfig to TOML string.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Check timing relationships and thresholds
    ///
    /// # Errors
    ///
    /// Returns every violation found, not just the first.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        let polling = &self.polling;

        if polling.interval_ms == 0 {
            errors.push(ValidationError::ZeroDuration("interval_ms"));
        }
        if polling.response_timeout_ms == 0 {
            errors.push(ValidationError::ZeroDuration("response_timeout_ms"));
        }
        if polling.frame_timeout_ms == 0 {
            errors.push(ValidationError::ZeroDuration("frame_timeout_ms"));
        }
        if polling.response_timeout_ms >= polling.interval_ms {
            errors.push(ValidationError::ResponseTimeoutTooLong {
                response_ms: polling.response_timeout_ms,
                interval_ms: polling.interval_ms,
            });
        }
        if polling.frame_timeout_ms >= polling.response_timeout_ms {
            errors.push(ValidationError::FrameTimeoutTooLong {
                frame_ms: polling.frame_timeout_ms,
                response_ms: polling.response_timeout_ms,
            });
        }
        if polling.max_consecutive_failures == 0 {
            errors.push(ValidationError::ZeroThreshold("max_consecutive_failures"));
        }
        if polling.max_command_retries == 0 {
            errors.push(ValidationError::ZeroThreshold("max_command_retries"));
        }

        for (slot, name) in self.accessories.slots() {
            if matches!(name, Some(n) if n.trim().is_empty()) {
                errors.push(ValidationError::EmptyAccessoryName(slot));
            }
        }

        if let Some(sensor) = &self.sensor {
            if !sensor.scale.is_finite() || sensor.scale == 0.0 {
                errors.push(ValidationError::InvalidSensorScale(sensor.scale.to_string()));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_static_config() {
        let config = StaticConfig::default();
        assert_eq!(config.device.id, "gree_ac");
        assert_eq!(config.polling.interval_ms, 1000);
        assert_eq!(config.polling.max_command_retries, 3);
        assert!(config.sensor.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_static_config_serialization() {
        let config = StaticConfig::default();
        let toml_str = config.to_toml().unwrap();

        assert!(toml_str.contains("[device]"));
        assert!(toml_str.contains("[polling]"));
        assert!(toml_str.contains("interval_ms = 1000"));
    }

    #[test]
    fn test_static_config_deserialization() {
        let toml_str = r#"
            [device]
            id = "bedroom"
            port = "/dev/ttyUSB1"

            [polling]
            interval_ms = 2000

            [climate]
            supported_presets = ["boost"]
            supported_swing_modes = ["off", "vertical"]

            [sensor]
            path = "/sys/bus/w1/devices/28-0000/temperature"
            scale = 0.001

            [accessories]
            plasma_switch = "Plasma"
            display_select = "Display"
        "#;

        let config = StaticConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.device.id, "bedroom");
        assert_eq!(config.device.port.as_deref(), Some("/dev/ttyUSB1"));
        assert_eq!(config.polling.interval_ms, 2000);
        assert_eq!(config.polling.response_timeout_ms, 400);

        let caps = config.climate.capabilities();
        assert!(caps.supports_preset(ClimatePreset::Boost));
        assert!(caps.supports_preset(ClimatePreset::None));
        assert!(caps.supports_swing_mode(SwingMode::Vertical));
        assert!(!caps.supports_swing_mode(SwingMode::Both));

        let sensor = config.sensor.unwrap();
        assert_eq!(sensor.scale, 0.001);

        assert_eq!(config.accessories.plasma_switch.as_deref(), Some("Plasma"));
        assert!(config.accessories.sleep_switch.is_none());
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = StaticConfig::from_toml("").unwrap();
        assert_eq!(config.polling.frame_timeout_ms, 100);
        assert!(config.climate.supported_presets.is_none());
        assert_eq!(config.climate.capabilities(), Capabilities::default());
    }

    #[test]
    fn test_unknown_preset_rejected() {
        let toml_str = r#"
            [climate]
            supported_presets = ["eco"]
        "#;
        assert!(StaticConfig::from_toml(toml_str).is_err());
    }

    #[test]
    fn test_validate_timing() {
        let mut config = StaticConfig::default();
        config.polling.response_timeout_ms = 1500;
        config.polling.max_command_retries = 0;

        let errors = config.validate().unwrap_err();
        assert!(errors.contains(&ValidationError::ResponseTimeoutTooLong {
            response_ms: 1500,
            interval_ms: 1000,
        }));
        assert!(errors.contains(&ValidationError::ZeroThreshold("max_command_retries")));
    }

    #[test]
    fn test_validate_frame_timeout() {
        let mut config = StaticConfig::default();
        config.polling.frame_timeout_ms = 400;

        let errors = config.validate().unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::FrameTimeoutTooLong {
                frame_ms: 400,
                response_ms: 400,
            }]
        );
    }

    #[test]
    fn test_validate_accessory_names_and_sensor() {
        let mut config = StaticConfig::default();
        config.accessories.sleep_switch = Some("  ".to_string());
        config.sensor = Some(SensorConfig {
            path: PathBuf::from("/tmp/t"),
            scale: 0.0,
        });

        let errors = config.validate().unwrap_err();
        assert!(errors.contains(&ValidationError::EmptyAccessoryName("sleep_switch")));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidSensorScale(_))));
    }
}
