// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the proofbox project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management
//!
//! The whole configuration lives in one YAML file with a section per concern.
//! Parsing and validation happen at a single boundary ([`Config::from_file`]):
//! unknown fields are rejected by serde, the control tunables are required
//! (a missing field is a parse error, never a silent default), and value
//! ranges are checked before a `Config` is handed to the rest of the system,
//! so downstream code never validates at point of use.
//!
//! The file is also the hot-reload source: the daemon polls its modification
//! stamp (see [`Config::file_stamp`]) and re-reads the whole file when it
//! changes. A failed re-read never replaces the last good configuration.

pub mod control;
pub mod display;
pub mod sensor;
pub mod transport;

pub use control::ControlConfig;
pub use display::DisplayConfig;
pub use sensor::{SensorConfig, TemperatureUnit};
pub use transport::{TransportConfig, TransportDriver};

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::SystemTime;
use thiserror::Error;

/// Errors produced at the configuration parse/validate boundary
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("cannot read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid YAML for the expected schema
    #[error("cannot parse configuration: {0}")]
    Parse(#[from] serde_yml::Error),

    /// A field carries a value outside its allowed range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Root configuration, one struct per file section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Control loop tuning and timing. Required: every tunable must be
    /// spelled out in the file.
    pub control: ControlConfig,

    /// Temperature sensor selection
    #[serde(default)]
    pub sensor: SensorConfig,

    /// Local display settings
    #[serde(default)]
    pub display: DisplayConfig,

    /// Relay and telemetry transport settings
    #[serde(default)]
    pub transport: TransportConfig,

    /// Configuration hot-reload settings
    #[serde(default)]
    pub reload: ReloadConfig,
}

/// Settings for the configuration file watcher
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReloadConfig {
    /// Enable polling the configuration file for changes
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Poll interval in seconds
    #[serde(default = "default_reload_interval")]
    pub interval_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_reload_interval() -> u64 {
    30
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_reload_interval(),
        }
    }
}

impl Config {
    /// Load and validate a configuration file
    ///
    /// This is the single parse/validate boundary: a `Config` returned from
    /// here is safe to use without further checks.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that the serde schema cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.control.validate()?;
        self.sensor.validate()?;
        if self.reload.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "reload.interval_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Change token of the configuration source (file modification stamp)
    pub fn file_stamp<P: AsRef<Path>>(path: P) -> Result<SystemTime, ConfigError> {
        Ok(std::fs::metadata(path)?.modified()?)
    }
}
