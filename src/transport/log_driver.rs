// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the proofbox project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Logging transport driver for off-line runs
//!
//! Writes every publish to the log instead of a broker. Useful when tuning
//! gains on a bench without a plug or dashboard attached.

use anyhow::Result;
use async_trait::async_trait;
use log::info;
use serde_json::Value;

use super::{RelaySwitch, RelayTransport, TelemetryTransport};

/// Transport that logs instead of publishing
#[derive(Debug, Default)]
pub struct LogTransport;

#[async_trait]
impl RelayTransport for LogTransport {
    async fn publish_relay(&self, state: RelaySwitch, topic: &str) -> Result<()> {
        info!("[{topic}] relay {state}");
        Ok(())
    }
}

#[async_trait]
impl TelemetryTransport for LogTransport {
    async fn publish_telemetry(&self, payload: Value, topic: &str) -> Result<()> {
        info!("[{topic}] {payload}");
        Ok(())
    }
}
