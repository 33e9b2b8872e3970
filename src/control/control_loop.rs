// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the proofbox project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Control loop orchestration
//!
//! One tick per PWM period: read the temperature, run the PID law, let the
//! preheat override bypass it while the window is open, quantize into a
//! duty-cycle level, drive the relay, update display and telemetry, then
//! sleep the drift-corrected remainder of the period. Commands (whole-config
//! snapshots from the reloader, enable toggles, stop) are drained at the
//! sleep point, so a reload is only ever observed by a tick that starts after
//! it was applied — never half-way through one.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};

use crate::config::ControlConfig;
use crate::control::actuator::DutyCycleActuator;
use crate::control::pid::{PidComponents, PidController};
use crate::control::preheat::PreheatOverride;
use crate::control::quantizer::{min_level_for_period, quantize};
use crate::control::timing::{corrected_sleep, LoopClock};
use crate::display::DisplayWriter;
use crate::sensor::TemperatureSensor;
use crate::transport::TelemetryTransport;

/// Commands accepted by a running control loop
#[derive(Debug, Clone)]
pub enum ControllerCommand {
    /// Apply a freshly validated configuration snapshot
    Reconfigure(ControlConfig),
    /// Toggle the PID enable flag
    SetEnabled(bool),
    /// Graceful shutdown: relay off, session statistics, exit
    Stop,
}

/// Immutable per-snapshot controller settings derived from [`ControlConfig`]
///
/// Replaced as a whole on reload; accumulated control state lives in the
/// [`PidController`] and the loop itself and survives the swap.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub period_secs: f64,
    pub setpoint: f64,
    pub preheat: PreheatOverride,
    /// Derived: never schedule an On-pulse shorter than 3 seconds
    pub min_level: f64,
    pub topic_status: String,
    pub topic_plug_command: String,
    pub enabled: bool,
}

impl ControllerSettings {
    pub fn derive(config: &ControlConfig) -> Self {
        let min_level = min_level_for_period(config.pwm_period);
        debug!("min level ({min_level})");
        Self {
            period_secs: config.pwm_period,
            setpoint: config.set_point,
            preheat: PreheatOverride {
                cycles: config.preheat_cycles,
                threshold: config.preheat_threshold,
                power_level: config.preheat_power_level,
            },
            min_level,
            topic_status: config.topic_status.clone(),
            topic_plug_command: config.topic_plug_command.clone(),
            enabled: config.enable_pid,
        }
    }
}

/// Everything one tick produced; ephemeral, feeds logging and telemetry
#[derive(Debug, Clone)]
pub struct TickContext {
    /// Loop-clock reading at the start of the tick
    pub tick_start: f64,
    /// Temperature read this tick
    pub measurement: f64,
    /// Level actually applied (after preheat/disable overrides)
    pub level: f64,
    /// PID terms behind the level
    pub components: PidComponents,
}

/// The control loop aggregate owning all mutable control state
///
/// All mutation of PID state, relay state and settings funnels through this
/// struct; collaborators are reached through their trait seams.
pub struct ControlLoop {
    settings: ControllerSettings,
    pid: PidController,
    actuator: DutyCycleActuator,
    sensor: Box<dyn TemperatureSensor>,
    display: Box<dyn DisplayWriter>,
    telemetry: Arc<dyn TelemetryTransport>,
    clock: LoopClock,
    commands: mpsc::UnboundedReceiver<ControllerCommand>,
    running: Arc<AtomicBool>,
    /// Ticks since the last disabled-to-enabled transition (preheat window)
    cycles_since_enable: u64,
    /// Total ticks this session, for logging
    cycle_num: u64,
    last_tick_start: Option<f64>,
    prev_measurement: Option<f64>,
    session_start: Instant,
}

impl ControlLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &ControlConfig,
        sensor: Box<dyn TemperatureSensor>,
        display: Box<dyn DisplayWriter>,
        relay_transport: Arc<dyn crate::transport::RelayTransport>,
        telemetry: Arc<dyn TelemetryTransport>,
        commands: mpsc::UnboundedReceiver<ControllerCommand>,
        running: Arc<AtomicBool>,
    ) -> Self {
        let settings = ControllerSettings::derive(config);
        let clock = LoopClock::start();

        let mut pid = PidController::new(
            config.kp,
            config.ki,
            config.kd,
            config.set_point,
            config.proportional_on_measurement,
            config.output_limits,
        );
        pid.seed_integral(config.initial_integral_sum);
        pid.set_enabled(config.enable_pid);

        let actuator = DutyCycleActuator::new(
            relay_transport,
            settings.topic_plug_command.clone(),
            clock,
        );

        Self {
            settings,
            pid,
            actuator,
            sensor,
            display,
            telemetry,
            clock,
            commands,
            running,
            cycles_since_enable: 0,
            cycle_num: 0,
            last_tick_start: None,
            prev_measurement: None,
            session_start: Instant::now(),
        }
    }

    /// Run until a stop command arrives or the running flag drops
    pub async fn run(&mut self) -> Result<()> {
        info!("starting control loop...");

        if let Err(e) = self.display.clear().await {
            warn!("display clear failed: {e}");
        }
        // start with the relay in a known state
        self.actuator.force_off("initial state").await;

        while self.running.load(Ordering::SeqCst) {
            let tick_start = self.clock.now_secs();
            if let Err(e) = self.tick(tick_start).await {
                // a fatal tick must not exit with the relay energized
                warn!("tick failed, shutting down: {e:#}");
                self.finish().await?;
                return Err(e);
            }

            let sleep = corrected_sleep(
                self.settings.period_secs,
                tick_start,
                self.clock.now_secs(),
            );
            debug!("sleeping for ({sleep})");
            let deadline = Instant::now() + Duration::from_secs_f64(sleep);
            loop {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => break,
                    command = self.commands.recv() => match command {
                        Some(ControllerCommand::Stop) | None => {
                            return self.finish().await;
                        }
                        Some(command) => self.handle_command(command),
                    },
                }
            }
        }

        self.finish().await
    }

    /// Execute one control tick starting at `tick_start` (loop-clock seconds)
    pub async fn tick(&mut self, tick_start: f64) -> Result<TickContext> {
        self.cycle_num += 1;

        let measurement = self
            .sensor
            .read_temperature()
            .await
            .context("sensor read failed")?;

        let delta = measurement - self.prev_measurement.unwrap_or(measurement);
        let error = self.settings.setpoint - measurement;
        info!(
            "{}: curTemp ({measurement}) delta ({delta:.4}) error ({error:.4})",
            self.cycle_num
        );
        self.prev_measurement = Some(measurement);

        // actual spacing to the previous tick; nominal period on the first
        let dt = match self.last_tick_start {
            Some(previous) if tick_start > previous => tick_start - previous,
            _ => self.settings.period_secs,
        };
        self.last_tick_start = Some(tick_start);

        let pid_output = self.pid.compute(measurement, dt);
        let quantized = quantize(pid_output.output, self.settings.min_level);

        let level = if !self.pid.is_enabled() {
            0.0
        } else if self
            .settings
            .preheat
            .applies(self.cycles_since_enable, self.settings.setpoint, measurement)
        {
            debug!(
                "preheating ({}:{})",
                self.cycles_since_enable, self.settings.preheat.cycles
            );
            self.settings.preheat.power_level
        } else {
            quantized
        };
        debug!("pid output ({}) level ({level})", pid_output.output);

        self.actuator
            .apply(level, self.settings.period_secs, tick_start)
            .await;

        if let Err(e) = self
            .display
            .update(self.settings.setpoint, measurement, level)
            .await
        {
            warn!("display update failed: {e}");
        }

        let payload = telemetry_payload(
            measurement,
            self.settings.setpoint,
            level,
            pid_output.components,
            self.pid.is_enabled(),
        );
        if let Err(e) = self
            .telemetry
            .publish_telemetry(payload, &self.settings.topic_status)
            .await
        {
            warn!("telemetry publish failed: {e}");
        }

        self.cycles_since_enable += 1;

        Ok(TickContext {
            tick_start,
            measurement,
            level,
            components: pid_output.components,
        })
    }

    /// Apply a command between ticks
    pub fn handle_command(&mut self, command: ControllerCommand) {
        match command {
            ControllerCommand::Reconfigure(config) => {
                let settings = ControllerSettings::derive(&config);
                if !self.pid.retune(config.kp, config.ki, config.kd) {
                    warn!("rejected retune to non-finite gains, keeping previous tuning");
                }
                if !self.pid.set_setpoint(config.set_point) {
                    warn!("rejected non-finite setpoint, keeping previous value");
                }
                self.pid
                    .set_proportional_on_measurement(config.proportional_on_measurement);
                self.pid.set_output_limits(config.output_limits);
                self.set_enabled(settings.enabled);
                self.actuator.set_topic(settings.topic_plug_command.clone());
                info!(
                    "reconfigured: setpoint ({}) period ({}) min level ({})",
                    settings.setpoint, settings.period_secs, settings.min_level
                );
                // whole-snapshot swap; accumulators untouched
                self.settings = settings;
            }
            ControllerCommand::SetEnabled(enabled) => self.set_enabled(enabled),
            ControllerCommand::Stop => {
                // handled at the select point; reaching here means stop raced
                // with another command, just drop the flag
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Toggle the PID together with the preheat cycle counter
    fn set_enabled(&mut self, enabled: bool) {
        if self.pid.set_enabled(enabled) {
            // disabled -> enabled restarts the preheat window
            self.cycles_since_enable = 0;
            info!("control enabled, preheat window restarted");
        } else if !enabled {
            info!("control disabled, level forced to 0");
        }
    }

    /// Graceful shutdown: relay off, session statistics, collaborator teardown
    async fn finish(&mut self) -> Result<()> {
        info!("cleaning up...");
        self.actuator.force_off("cleanup").await;

        let state = self.actuator.state().await;
        let elapsed_hours = self.session_start.elapsed().as_secs_f64() / 3600.0;
        info!(
            "session relay cycles ({}) over ({:.3}) hours",
            state.transitions, elapsed_hours
        );
        if elapsed_hours > 0.0 {
            info!(
                "cycles per hour ({:.3})",
                state.transitions as f64 / elapsed_hours
            );
        }
        if let Err(e) = self.display.clear().await {
            warn!("display clear failed: {e}");
        }
        Ok(())
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn pid(&self) -> &PidController {
        &self.pid
    }

    pub fn actuator(&self) -> &DutyCycleActuator {
        &self.actuator
    }

    pub fn cycles_since_enable(&self) -> u64 {
        self.cycles_since_enable
    }
}

/// Build the per-tick telemetry payload
///
/// `level` is reported as percent power (tenths times ten), the PID terms
/// under their dashboard field names.
pub fn telemetry_payload(
    measurement: f64,
    setpoint: f64,
    level: f64,
    components: PidComponents,
    enabled: bool,
) -> serde_json::Value {
    json!({
        "enabled": i32::from(enabled),
        "curTemp": measurement,
        "setPoint": setpoint,
        "level": level * 10.0,
        "curP": components.proportional,
        "curI": components.integral,
        "curD": components.derivative,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControlConfig;
    use crate::config::TemperatureUnit;
    use crate::display::NullDisplay;
    use crate::sensor::{SimulatedSensor, TemperatureSensor};
    use crate::transport::{
        RecordingRelayTransport, RecordingTelemetryTransport, RelaySwitch,
    };
    use anyhow::anyhow;
    use approx::assert_relative_eq;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    struct Harness {
        control_loop: ControlLoop,
        relay: RecordingRelayTransport,
        telemetry: RecordingTelemetryTransport,
        commands: mpsc::UnboundedSender<ControllerCommand>,
    }

    /// Loop with a fixed-temperature sensor and recording transports
    fn harness(config: ControlConfig, fixed_temp: f64) -> Harness {
        let relay = RecordingRelayTransport::new();
        let telemetry = RecordingTelemetryTransport::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let sensor = SimulatedSensor::new(fixed_temp, 0.0, 0.0, TemperatureUnit::Celsius);
        let control_loop = ControlLoop::new(
            &config,
            Box::new(sensor),
            Box::new(NullDisplay),
            Arc::new(relay.clone()),
            Arc::new(telemetry.clone()),
            rx,
            Arc::new(AtomicBool::new(true)),
        );
        Harness {
            control_loop,
            relay,
            telemetry,
            commands: tx,
        }
    }

    fn proportional_only_config() -> ControlConfig {
        ControlConfig {
            pwm_period: 30.0,
            set_point: 80.0,
            kp: 1.0,
            ki: 0.0,
            kd: 0.0,
            preheat_cycles: 0,
            proportional_on_measurement: false,
            ..ControlConfig::default()
        }
    }

    #[tokio::test]
    async fn saturated_error_drives_full_power_with_no_deferred_off() {
        // period 30, setpoint 80, kp=1, measurement 70: error 10, raw output
        // 10, level 10, relay On for the whole period
        let mut h = harness(proportional_only_config(), 70.0);
        let ctx = h.control_loop.tick(0.0).await.unwrap();

        assert_relative_eq!(ctx.level, 10.0);
        assert!(!h.control_loop.actuator().has_pending_off());
        assert_eq!(
            h.relay.published(),
            vec![(RelaySwitch::On, "proofbox/plug/command".to_string())]
        );
    }

    #[tokio::test]
    async fn preheat_forces_the_override_level_for_the_window() {
        let config = ControlConfig {
            pwm_period: 30.0,
            set_point: 80.0,
            kp: 0.1, // closed-loop output would quantize to ~1.5
            ki: 0.0,
            kd: 0.0,
            preheat_cycles: 5,
            preheat_threshold: 2.0,
            preheat_power_level: 8.0,
            proportional_on_measurement: false,
            ..ControlConfig::default()
        };
        let mut h = harness(config, 70.0);

        for cycle in 0..5 {
            let ctx = h.control_loop.tick(cycle as f64 * 30.0).await.unwrap();
            assert_relative_eq!(ctx.level, 8.0, epsilon = 1e-12);
        }
        // window expired: the quantized control output is used unmodified
        let ctx = h.control_loop.tick(150.0).await.unwrap();
        assert_relative_eq!(ctx.level, 1.5);
    }

    #[tokio::test]
    async fn preheat_stands_down_near_the_setpoint() {
        let config = ControlConfig {
            pwm_period: 30.0,
            set_point: 80.0,
            kp: 1.0,
            ki: 0.0,
            kd: 0.0,
            preheat_cycles: 5,
            preheat_threshold: 2.0,
            preheat_power_level: 8.0,
            proportional_on_measurement: false,
            ..ControlConfig::default()
        };
        // error of 1 is under the threshold: no preheat even on cycle 0
        let mut h = harness(config, 79.0);
        let ctx = h.control_loop.tick(0.0).await.unwrap();
        assert_relative_eq!(ctx.level, 1.5); // floor(10*1 + 5)/10
    }

    #[tokio::test]
    async fn disabled_loop_forces_level_zero() {
        let config = ControlConfig {
            enable_pid: false,
            ..proportional_only_config()
        };
        let mut h = harness(config, 70.0);
        let ctx = h.control_loop.tick(0.0).await.unwrap();

        assert_eq!(ctx.level, 0.0);
        let published = h.relay.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, RelaySwitch::Off);
    }

    #[tokio::test]
    async fn enabling_resets_the_preheat_counter() {
        let mut h = harness(proportional_only_config(), 70.0);
        for i in 0..4 {
            h.control_loop.tick(i as f64 * 30.0).await.unwrap();
        }
        assert_eq!(h.control_loop.cycles_since_enable(), 4);

        h.control_loop.handle_command(ControllerCommand::SetEnabled(false));
        h.control_loop.handle_command(ControllerCommand::SetEnabled(true));
        assert_eq!(h.control_loop.cycles_since_enable(), 0);
    }

    #[tokio::test]
    async fn disabling_alone_does_not_reset_the_counter() {
        let mut h = harness(proportional_only_config(), 70.0);
        h.control_loop.tick(0.0).await.unwrap();
        h.control_loop.handle_command(ControllerCommand::SetEnabled(false));
        assert_eq!(h.control_loop.cycles_since_enable(), 1);
    }

    #[tokio::test]
    async fn reload_preserves_the_integral_accumulator() {
        let config = ControlConfig {
            pwm_period: 30.0,
            set_point: 80.0,
            kp: 0.0,
            ki: 0.01,
            kd: 0.0,
            preheat_cycles: 0,
            proportional_on_measurement: false,
            ..ControlConfig::default()
        };
        let mut h = harness(config.clone(), 70.0);

        for i in 0..3 {
            h.control_loop.tick(i as f64 * 30.0).await.unwrap();
        }
        let integral_before = h.control_loop.pid().integral();
        assert!(integral_before > 0.0);

        // gains-only reload
        let reconfigured = ControlConfig {
            kp: 0.0,
            ki: 0.02,
            ..config
        };
        h.control_loop
            .handle_command(ControllerCommand::Reconfigure(reconfigured));
        assert_relative_eq!(h.control_loop.pid().integral(), integral_before);

        // next tick accumulates with the new gain on top of the old state
        let ctx = h.control_loop.tick(90.0).await.unwrap();
        assert_relative_eq!(
            ctx.components.integral,
            integral_before + 0.02 * 10.0 * 30.0
        );
    }

    #[tokio::test]
    async fn reload_swaps_the_whole_snapshot() {
        let mut h = harness(proportional_only_config(), 70.0);
        let reconfigured = ControlConfig {
            pwm_period: 60.0,
            set_point: 85.0,
            topic_plug_command: "cellar/plug".to_string(),
            ..proportional_only_config()
        };
        h.control_loop
            .handle_command(ControllerCommand::Reconfigure(reconfigured));

        let settings = h.control_loop.settings();
        assert_relative_eq!(settings.period_secs, 60.0);
        assert_relative_eq!(settings.setpoint, 85.0);
        assert_relative_eq!(settings.min_level, 0.5);

        let _ = h.control_loop.tick(0.0).await.unwrap();
        let published = h.relay.published();
        assert_eq!(published.last().unwrap().1, "cellar/plug");
    }

    #[tokio::test]
    async fn telemetry_payload_uses_percent_power() {
        let mut h = harness(proportional_only_config(), 70.0);
        h.control_loop.tick(0.0).await.unwrap();

        let published = h.telemetry.published();
        assert_eq!(published.len(), 1);
        let (payload, topic) = &published[0];
        assert_eq!(topic, "proofbox/status");
        assert_eq!(payload["curTemp"], 70.0);
        assert_eq!(payload["setPoint"], 80.0);
        assert_eq!(payload["level"], 100.0);
        assert_eq!(payload["enabled"], 1);
        assert_eq!(payload["curP"], 10.0);
    }

    #[tokio::test]
    async fn telemetry_failure_does_not_fail_the_tick() {
        let mut h = harness(proportional_only_config(), 70.0);
        h.telemetry.set_failing(true);
        assert!(h.control_loop.tick(0.0).await.is_ok());
    }

    /// Sensor that delivers one good reading and then fails every read
    struct DyingSensor {
        reads: AtomicU32,
    }

    #[async_trait]
    impl TemperatureSensor for DyingSensor {
        async fn read_temperature(&self) -> Result<f64> {
            if self.reads.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(70.0)
            } else {
                Err(anyhow!("sensor disconnected"))
            }
        }
    }

    #[tokio::test]
    async fn fatal_sensor_read_still_shuts_the_relay_off() {
        let config = ControlConfig {
            pwm_period: 1.0,
            ..proportional_only_config()
        };
        let relay = RecordingRelayTransport::new();
        let telemetry = RecordingTelemetryTransport::new();
        let (_tx, rx) = mpsc::unbounded_channel();
        let sensor = DyingSensor {
            reads: AtomicU32::new(0),
        };
        let mut control_loop = ControlLoop::new(
            &config,
            Box::new(sensor),
            Box::new(NullDisplay),
            Arc::new(relay.clone()),
            Arc::new(telemetry.clone()),
            rx,
            Arc::new(AtomicBool::new(true)),
        );

        // tick 1 saturates to full power (no deferred Off exists to rescue
        // the relay), tick 2 dies in the sensor read
        let result = control_loop.run().await;
        assert!(result.is_err());

        // the error path still ran the shutdown: relay commanded Off last
        let published = relay.published();
        assert_eq!(published.last().unwrap().0, RelaySwitch::Off);
        assert!(!control_loop.actuator().state().await.on);
    }

    #[tokio::test]
    async fn stop_command_ends_the_run_with_relay_off() {
        let config = ControlConfig {
            pwm_period: 2.0,
            ..proportional_only_config()
        };
        let mut h = harness(config, 70.0);
        h.commands.send(ControllerCommand::Stop).unwrap();
        h.control_loop.run().await.unwrap();

        let published = h.relay.published();
        // initial force-off, tick On, cleanup Off
        assert_eq!(published.first().unwrap().0, RelaySwitch::Off);
        assert_eq!(published.last().unwrap().0, RelaySwitch::Off);
        assert!(!h.control_loop.actuator().state().await.on);
    }
}
