// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the proofbox project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Relay and telemetry transport configuration section
//!
//! The transport carries two kinds of messages on separate topics: relay
//! On/Off commands for the smart plug and the per-tick telemetry payload.
//! Topic names live in the control section because they are part of the
//! controller's snapshot; this section only selects and parameterizes the
//! driver.

use serde::{Deserialize, Serialize};

/// Message-bus transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    /// Transport driver
    #[serde(rename = "type", default)]
    pub driver: TransportDriver,

    /// Connection URL for the redis driver
    #[serde(default = "default_url")]
    pub url: String,
}

/// Transport driver enumeration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportDriver {
    /// Publish over redis pub/sub channels
    Redis,
    /// Log every publish instead of sending it (off-line runs)
    #[default]
    Log,
}

fn default_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            driver: TransportDriver::Log,
            url: default_url(),
        }
    }
}
