// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the proofbox project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Duty-cycle relay actuation
//!
//! Converts a quantized level into relay commands for one PWM period:
//! level 0 switches Off immediately, level 10 holds On for the whole period,
//! anything in between switches On now and schedules a deferred Off after
//! `level * period / 10` seconds, corrected for time already consumed in the
//! tick.
//!
//! The deferred Off is a cancellable task owned by the actuator: a new
//! `apply` aborts any still-pending Off before issuing its own commands, so a
//! slow Off from tick N can never fire after tick N+1 switched the relay back
//! On. Commands are published even when the logical state does not change, to
//! tolerate a plug that was toggled behind the controller's back; only true
//! On/Off transitions increment the cycle counter.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::control::timing::{corrected_sleep, LoopClock};
use crate::transport::{RelaySwitch, RelayTransport};

/// Logical relay state with session statistics
#[derive(Debug, Clone, Default)]
pub struct RelayState {
    /// Whether the relay is logically On
    pub on: bool,
    /// Cumulative On/Off transitions this session (monotonically
    /// non-decreasing)
    pub transitions: u64,
    /// When the last transition happened
    pub last_transition: Option<DateTime<Utc>>,
}

/// Relay actuator time-proportioning a binary heating element
pub struct DutyCycleActuator {
    transport: Arc<dyn RelayTransport>,
    topic: String,
    state: Arc<Mutex<RelayState>>,
    clock: LoopClock,
    pending_off: Option<JoinHandle<()>>,
}

impl DutyCycleActuator {
    pub fn new(transport: Arc<dyn RelayTransport>, topic: impl Into<String>, clock: LoopClock) -> Self {
        Self {
            transport,
            topic: topic.into(),
            state: Arc::new(Mutex::new(RelayState::default())),
            clock,
            pending_off: None,
        }
    }

    /// Replace the command topic (hot reload)
    pub fn set_topic(&mut self, topic: impl Into<String>) {
        self.topic = topic.into();
    }

    /// Apply a duty-cycle level for the period starting at `tick_start`
    ///
    /// Issues the immediate relay command and, for interior levels, schedules
    /// the deferred Off; returns without waiting for it.
    pub async fn apply(&mut self, level: f64, period_secs: f64, tick_start: f64) {
        // cancel a deferred Off still pending from the previous period before
        // issuing anything new
        if let Some(handle) = self.pending_off.take() {
            if !handle.is_finished() {
                debug!("cancelling pending deferred off");
                handle.abort();
            }
        }

        if level <= 0.0 {
            switch(&self.transport, &self.topic, &self.state, RelaySwitch::Off, "level zero").await;
            return;
        }

        switch(&self.transport, &self.topic, &self.state, RelaySwitch::On, "duty cycle start").await;

        if level >= 10.0 {
            // full-period actuation, no deferred Off
            return;
        }

        let on_duration = level * period_secs / 10.0;
        let transport = self.transport.clone();
        let topic = self.topic.clone();
        let state = self.state.clone();
        let clock = self.clock;
        self.pending_off = Some(tokio::spawn(async move {
            let sleep = corrected_sleep(on_duration, tick_start, clock.now_secs());
            debug!("deferred off: level ({level}) period ({period_secs}) sleeping ({sleep})");
            tokio::time::sleep(Duration::from_secs_f64(sleep)).await;
            switch(&transport, &topic, &state, RelaySwitch::Off, "duty cycle elapsed").await;
        }));
    }

    /// Cancel any pending Off and force the relay Off (shutdown path)
    pub async fn force_off(&mut self, reason: &str) {
        if let Some(handle) = self.pending_off.take() {
            handle.abort();
        }
        switch(&self.transport, &self.topic, &self.state, RelaySwitch::Off, reason).await;
    }

    /// Snapshot of the logical relay state
    pub async fn state(&self) -> RelayState {
        self.state.lock().await.clone()
    }

    /// Whether a deferred Off is currently scheduled
    pub fn has_pending_off(&self) -> bool {
        self.pending_off
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

/// Switch the relay, always publishing the command
///
/// The logical state and the transition counter only move on a real change,
/// but the command goes out regardless so an externally toggled plug
/// resynchronizes on the next tick. Publish failures are logged and absorbed
/// here: actuation bookkeeping must not stall the loop.
async fn switch(
    transport: &Arc<dyn RelayTransport>,
    topic: &str,
    state: &Arc<Mutex<RelayState>>,
    desired: RelaySwitch,
    reason: &str,
) {
    {
        let mut state = state.lock().await;
        let currently_on = state.on;
        let wants_on = desired == RelaySwitch::On;
        if currently_on != wants_on {
            state.on = wants_on;
            state.transitions += 1;
            state.last_transition = Some(Utc::now());
            info!("relay {desired} ({reason}), transition #{}", state.transitions);
        } else {
            debug!("relay already {desired} ({reason}), re-sending command");
        }
    }

    if let Err(e) = transport.publish_relay(desired, topic).await {
        warn!("relay command {desired} on '{topic}' failed: {e}");
    }
}
