use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use air_brakes_flight_core::FlightConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// a live flight is aborted when the IMU is silent for this long
    pub sensor_timeout_ms: u64,
    /// records buffered between the control loop and the log writer
    pub log_queue_capacity: usize,
    pub flight: FlightConfig,
    pub servo: ServoConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            sensor_timeout_ms: 100,
            log_queue_capacity: 1024,
            flight: FlightConfig::default(),
            servo: ServoConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServoConfig {
    pub baud_rate: u32,
    /// servo position at 0% extension
    pub min_position: i32,
    /// servo position at 100% extension
    pub max_position: i32,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115200,
            min_position: 0,
            max_position: 900,
        }
    }
}

impl CliConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = toml::from_str(&config_str)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, config_str)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: CliConfig = toml::from_str(
            r#"
            [flight]
            target_apogee_m = 1500.0

            [flight.controller]
            gain = 0.004

            [flight.apogee_model]
            kind = "rk2"
            "#,
        )
        .unwrap();

        assert_eq!(config.flight.target_apogee_m, Some(1500.0));
        assert_eq!(config.flight.controller.gain, 0.004);
        assert_eq!(
            config.flight.apogee_model.kind,
            air_brakes_flight_core::ApogeeModelKind::Rk2
        );
        assert_eq!(
            config.flight.controller.tolerance_m,
            FlightConfig::default().controller.tolerance_m
        );
        assert_eq!(config.servo, ServoConfig::default());
        assert!(config.flight.validate().is_ok());
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("flight.toml");

        let mut config = CliConfig::default();
        config.flight.target_apogee_m = Some(2100.0);
        config.servo.max_position = 1200;
        config.save(&path).unwrap();

        assert_eq!(CliConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn unreadable_config_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let error = CliConfig::load(&path).unwrap_err();
        assert!(format!("{error:#}").contains("missing.toml"));
    }
}
