// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the proofbox project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Recording transports for tests
//!
//! Capture every published message in memory so tests can assert on the
//! exact command sequence the control loop emitted.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::{RelaySwitch, RelayTransport, TelemetryTransport};

/// Relay transport capturing `(state, topic)` pairs
#[derive(Debug, Default, Clone)]
pub struct RecordingRelayTransport {
    published: Arc<Mutex<Vec<(RelaySwitch, String)>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingRelayTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, in order
    pub fn published(&self) -> Vec<(RelaySwitch, String)> {
        self.published.lock().unwrap().clone()
    }

    /// Make every subsequent publish fail (transport fault injection)
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl RelayTransport for RecordingRelayTransport {
    async fn publish_relay(&self, state: RelaySwitch, topic: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("injected relay transport failure"));
        }
        self.published
            .lock()
            .unwrap()
            .push((state, topic.to_string()));
        Ok(())
    }
}

/// Telemetry transport capturing `(payload, topic)` pairs
#[derive(Debug, Default, Clone)]
pub struct RecordingTelemetryTransport {
    published: Arc<Mutex<Vec<(Value, String)>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingTelemetryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<(Value, String)> {
        self.published.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl TelemetryTransport for RecordingTelemetryTransport {
    async fn publish_telemetry(&self, payload: Value, topic: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("injected telemetry transport failure"));
        }
        self.published
            .lock()
            .unwrap()
            .push((payload, topic.to_string()));
        Ok(())
    }
}
