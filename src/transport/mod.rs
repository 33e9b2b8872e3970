// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the proofbox project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Message-bus transport seam
//!
//! The control loop publishes two kinds of messages: relay On/Off commands
//! consumed by the smart plug, and a per-tick telemetry payload for
//! dashboards. Both go through driver traits so the core never depends on a
//! concrete broker:
//!
//! ```text
//!        ControlLoop / DutyCycleActuator
//!                      |
//!       RelayTransport   TelemetryTransport
//!                      |
//!      +---------------+---------------+
//!      |               |               |
//!   Redis pub/sub   Log driver    Recording (tests)
//! ```
//!
//! Publish failures are reported to the caller but treated as non-fatal
//! there: actuation correctness matters more than telemetry delivery, so the
//! loop logs and keeps ticking.

mod log_driver;
mod recording;
mod redis;

pub use self::log_driver::LogTransport;
pub use self::recording::{RecordingRelayTransport, RecordingTelemetryTransport};
pub use self::redis::RedisTransport;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// Logical relay command carried on the plug command topic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelaySwitch {
    On,
    Off,
}

impl RelaySwitch {
    /// Wire representation expected by the plug firmware
    pub fn as_str(self) -> &'static str {
        match self {
            RelaySwitch::On => "On",
            RelaySwitch::Off => "Off",
        }
    }
}

impl fmt::Display for RelaySwitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport for relay On/Off commands
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Publish a relay command on the given topic
    async fn publish_relay(&self, state: RelaySwitch, topic: &str) -> Result<()>;
}

/// Transport for the per-tick telemetry payload
#[async_trait]
pub trait TelemetryTransport: Send + Sync {
    /// Publish a JSON payload on the given topic
    async fn publish_telemetry(&self, payload: Value, topic: &str) -> Result<()>;
}
