// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the proofbox project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Temperature sensor configuration section

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Temperature sensor selection and parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SensorConfig {
    /// Sensor driver
    #[serde(rename = "type", default)]
    pub driver: SensorDriver,

    /// Unit the controller works in (setpoint and readings must agree)
    #[serde(default)]
    pub unit: TemperatureUnit,

    /// Initial enclosure temperature for the simulated driver, in Celsius
    #[serde(default = "default_start_temp")]
    pub start_temp_celsius: f64,

    /// Per-read temperature drift for the simulated driver, in Celsius
    #[serde(default)]
    pub drift_per_read: f64,

    /// Peak read noise for the simulated driver, in Celsius
    #[serde(default = "default_noise")]
    pub noise: f64,
}

/// Sensor driver enumeration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorDriver {
    /// First-order simulated enclosure, for development and tests
    #[default]
    Simulated,
}

/// Temperature unit the controller operates in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureUnit {
    Celsius,
    #[default]
    Fahrenheit,
}

fn default_start_temp() -> f64 {
    21.0
}

fn default_noise() -> f64 {
    0.05
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            driver: SensorDriver::Simulated,
            unit: TemperatureUnit::Fahrenheit,
            start_temp_celsius: default_start_temp(),
            drift_per_read: 0.0,
            noise: default_noise(),
        }
    }
}

impl SensorConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if !self.start_temp_celsius.is_finite() || !self.drift_per_read.is_finite() {
            return Err(ConfigError::Invalid(
                "sensor temperatures must be finite".into(),
            ));
        }
        if !self.noise.is_finite() || self.noise < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "sensor.noise must be non-negative, got {}",
                self.noise
            )));
        }
        Ok(())
    }
}
