//! File-backed room temperature source
//!
//! Reads a single number from a file such as a hwmon or 1-wire sysfs entry
//! and scales it to °C. Any failure yields `None` and the unit's own sensor
//! is used for that cycle.

use async_trait::async_trait;
use gree_core::config::SensorConfig;
use gree_core::{GreeError, Result};
use gree_hardware::TemperatureSource;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, warn};

pub(crate) struct FileSensor {
    path: PathBuf,
    scale: f32,
    failing: bool,
}

impl FileSensor {
    pub(crate) fn new(config: &SensorConfig) -> Self {
        Self {
            path: config.path.clone(),
            scale: config.scale,
            failing: false,
        }
    }

    async fn read(&self) -> Result<f32> {
        let content = fs::read_to_string(&self.path).await?;
        let raw: f32 = content.trim().parse().map_err(|e| {
            GreeError::InvalidInput(format!("Bad sensor reading '{}': {}", content.trim(), e))
        })?;
        let celsius = raw * self.scale;
        if celsius.is_finite() {
            Ok(celsius)
        } else {
            Err(GreeError::InvalidInput(format!(
                "Non-finite sensor reading {}",
                celsius
            )))
        }
    }
}

#[async_trait]
impl TemperatureSource for FileSensor {
    async fn read_celsius(&mut self) -> Option<f32> {
        match self.read().await {
            Ok(celsius) => {
                if self.failing {
                    debug!("Sensor {} readable again", self.path.display());
                    self.failing = false;
                }
                Some(celsius)
            }
            Err(e) => {
                // Warn on the first failure only; the file may be gone for a while
                if !self.failing {
                    warn!(
                        "Sensor {} unreadable, using unit temperature: {}",
                        self.path.display(),
                        e
                    );
                    self.failing = true;
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sensor(path: PathBuf, scale: f32) -> FileSensor {
        FileSensor::new(&SensorConfig { path, scale })
    }

    #[tokio::test]
    async fn test_reads_scaled_value() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("temp1_input");
        fs::write(&path, "23500\n").await.unwrap();

        let mut sensor = sensor(path, 0.001);
        let celsius = sensor.read_celsius().await.unwrap();
        assert!((celsius - 23.5).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_missing_file_falls_back() {
        let temp_dir = TempDir::new().unwrap();
        let mut sensor = sensor(temp_dir.path().join("absent"), 1.0);
        assert!(matches!(sensor.read().await, Err(GreeError::Io(_))));
        assert_eq!(sensor.read_celsius().await, None);
        assert!(sensor.failing);
    }

    #[tokio::test]
    async fn test_garbage_falls_back_then_recovers() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("temp");
        fs::write(&path, "n/a").await.unwrap();

        let mut sensor = sensor(path.clone(), 1.0);
        assert!(matches!(sensor.read().await, Err(GreeError::InvalidInput(_))));
        assert_eq!(sensor.read_celsius().await, None);

        fs::write(&path, "21").await.unwrap();
        assert_eq!(sensor.read_celsius().await, Some(21.0));
        assert!(!sensor.failing);
    }
}
