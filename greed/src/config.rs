//! Configuration loading for the daemon
//!
//! Reads the static TOML configuration, creating it with defaults when the
//! file is missing, and rejects configurations whose timings cannot work.

use gree_core::{GreeError, Result, StaticConfig};
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

/// Load and validate the static configuration.
///
/// If the file doesn't exist, it is created with defaults.
pub(crate) async fn load(config_path: &Path) -> Result<StaticConfig> {
    info!("Loading configuration from: {}", config_path.display());

    let config = if config_path.exists() {
        let content = fs::read_to_string(config_path).await.map_err(|e| {
            GreeError::Config(format!(
                "Failed to read config file '{}': {}",
                config_path.display(),
                e
            ))
        })?;
        StaticConfig::from_toml(&content).map_err(|e| {
            GreeError::Config(format!(
                "Failed to parse config file '{}': {}",
                config_path.display(),
                e
            ))
        })?
    } else {
        create_default(config_path).await?
    };

    if let Err(errors) = config.validate() {
        let details = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(GreeError::Config(format!(
            "Invalid configuration in '{}': {}",
            config_path.display(),
            details
        )));
    }

    Ok(config)
}

async fn create_default(path: &Path) -> Result<StaticConfig> {
    info!(
        "Config not found at {}. Creating with defaults.",
        path.display()
    );

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(|e| {
            GreeError::Config(format!(
                "Failed to create config directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    let config = StaticConfig::default();
    let toml_str = config
        .to_toml()
        .map_err(|e| GreeError::Serialization(e.to_string()))?;
    fs::write(path, toml_str).await.map_err(|e| {
        GreeError::Config(format!(
            "Failed to write config file '{}': {}",
            path.display(),
            e
        ))
    })?;
    debug!("Default configuration written to {}", path.display());

    Ok(config)
}

/// Log the effective configuration and which accessories are bound
pub(crate) fn log_summary(config: &StaticConfig) {
    let device = &config.device;
    let polling = &config.polling;
    info!(
        "Device '{}': port={}, debug_uart={}",
        device.id,
        device.port.as_deref().unwrap_or("<none>"),
        device.debug_uart
    );
    info!(
        "Polling: interval={}ms, response_timeout={}ms, frame_timeout={}ms, max_failures={}, max_retries={}",
        polling.interval_ms,
        polling.response_timeout_ms,
        polling.frame_timeout_ms,
        polling.max_consecutive_failures,
        polling.max_command_retries
    );

    let capabilities = config.climate.capabilities();
    info!(
        "Climate: presets={:?}, swing_modes={:?}",
        capabilities.supported_presets(),
        capabilities.supported_swing_modes()
    );

    match &config.sensor {
        Some(sensor) => info!(
            "External sensor: {} (scale {})",
            sensor.path.display(),
            sensor.scale
        ),
        None => debug!("No external sensor configured"),
    }

    for (slot, name) in config.accessories.slots() {
        match name {
            Some(name) => info!("  Accessory {}: '{}'", slot, name),
            None => debug!("  Accessory {}: not bound", slot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_missing_config_created_with_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let config = assert_ok!(load(&path).await);
        assert_eq!(config.device.id, "gree_ac");
        assert!(path.exists());

        let written = fs::read_to_string(&path).await.unwrap();
        assert!(written.contains("[polling]"));
    }

    #[tokio::test]
    async fn test_existing_config_loaded() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[device]
id = "living_room"
port = "/dev/ttyS1"

[polling]
interval_ms = 2000

[accessories]
plasma_switch = "Plasma"
"#,
        )
        .await
        .unwrap();

        let config = load(&path).await.unwrap();
        assert_eq!(config.device.id, "living_room");
        assert_eq!(config.device.port.as_deref(), Some("/dev/ttyS1"));
        assert_eq!(config.polling.interval_ms, 2000);
        assert_eq!(config.polling.response_timeout_ms, 400);
        assert_eq!(config.accessories.plasma_switch.as_deref(), Some("Plasma"));
        assert!(config.accessories.sleep_switch.is_none());
    }

    #[tokio::test]
    async fn test_invalid_timing_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            "[polling]\ninterval_ms = 300\nresponse_timeout_ms = 400\n",
        )
        .await
        .unwrap();

        let err = assert_err!(load(&path).await);
        assert!(matches!(err, GreeError::Config(_)));
        assert!(err.to_string().contains("response_timeout_ms"));
    }

    #[tokio::test]
    async fn test_malformed_toml_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[device\nid = ").await.unwrap();

        assert!(matches!(load(&path).await, Err(GreeError::Config(_))));
    }
}
