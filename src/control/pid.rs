// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the proofbox project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Discrete-time PID control law
//!
//! Computes the continuous control output from the temperature error each
//! tick. Two proportional modes are supported:
//!
//! - classic: `P = kp * error`
//! - on-measurement: `P = -kp * (measurement - previous_measurement)`, which
//!   avoids a proportional kick when the setpoint is edited
//!
//! The derivative term always works on the measurement delta (not the error
//! delta) for the same reason. When output limits are configured the integral
//! accumulator is clamped to them (anti-windup); in on-measurement mode the
//! summed output is deliberately *not* re-clamped afterwards — the original
//! controller's library clips I but not the total in that mode, and parity is
//! kept here rather than silently fixed.
//!
//! Retuning and setpoint edits never reset the accumulator, so a hot reload
//! changes future behavior only through the new gains.

use log::debug;

/// Individual terms of the control output, reported for telemetry
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PidComponents {
    /// Proportional term
    pub proportional: f64,
    /// Accumulated integral term (includes the gain)
    pub integral: f64,
    /// Derivative term
    pub derivative: f64,
}

/// Control output with its components
#[derive(Debug, Clone, Copy)]
pub struct PidOutput {
    /// Summed control output
    pub output: f64,
    /// The three terms that produced it
    pub components: PidComponents,
}

/// PID controller owning the accumulated control state
///
/// The accumulator, last measurement and last error survive retuning and
/// setpoint changes; only [`PidController::reset`] or process restart clear
/// them.
#[derive(Debug, Clone)]
pub struct PidController {
    kp: f64,
    ki: f64,
    kd: f64,
    setpoint: f64,
    proportional_on_measurement: bool,
    output_limits: Option<(f64, f64)>,
    /// Accumulated integral term, gain included
    integral: f64,
    last_measurement: Option<f64>,
    last_error: f64,
    last_output: f64,
    last_components: PidComponents,
    enabled: bool,
}

impl PidController {
    pub fn new(
        kp: f64,
        ki: f64,
        kd: f64,
        setpoint: f64,
        proportional_on_measurement: bool,
        output_limits: Option<(f64, f64)>,
    ) -> Self {
        Self {
            kp,
            ki,
            kd,
            setpoint,
            proportional_on_measurement,
            output_limits,
            integral: 0.0,
            last_measurement: None,
            last_error: 0.0,
            last_output: 0.0,
            last_components: PidComponents::default(),
            enabled: false,
        }
    }

    /// Seed the integral accumulator (startup only, from configuration)
    pub fn seed_integral(&mut self, value: f64) {
        if value.is_finite() {
            self.integral = value;
        }
    }

    /// Compute the control output for a new measurement
    ///
    /// `dt` is the spacing to the previous compute call in seconds; the
    /// orchestrator passes the nominal period on the first tick. While the
    /// controller is disabled nothing accumulates and the previous output is
    /// returned unchanged.
    pub fn compute(&mut self, measurement: f64, dt: f64) -> PidOutput {
        if !self.enabled {
            return PidOutput {
                output: self.last_output,
                components: self.last_components,
            };
        }

        let error = self.setpoint - measurement;
        let d_measurement = measurement - self.last_measurement.unwrap_or(measurement);

        let proportional = if self.proportional_on_measurement {
            -self.kp * d_measurement
        } else {
            self.kp * error
        };

        self.integral += self.ki * error * dt;
        if let Some((min, max)) = self.output_limits {
            // integral-only anti-windup
            self.integral = self.integral.clamp(min, max);
        }

        let derivative = if dt > 0.0 {
            -self.kd * d_measurement / dt
        } else {
            0.0
        };

        let mut output = proportional + self.integral + derivative;
        if let Some((min, max)) = self.output_limits {
            if !self.proportional_on_measurement {
                output = output.clamp(min, max);
            }
            // on-measurement mode: the total is knowingly left unclamped,
            // matching the upstream behavior this controller was tuned
            // against
        }

        let components = PidComponents {
            proportional,
            integral: self.integral,
            derivative,
        };
        debug!(
            "pid components ({} {} {})",
            components.proportional, components.integral, components.derivative
        );

        self.last_measurement = Some(measurement);
        self.last_error = error;
        self.last_output = output;
        self.last_components = components;

        PidOutput { output, components }
    }

    /// Replace the gain triple without touching accumulated state
    ///
    /// Returns whether the change was accepted; non-finite gains are refused.
    pub fn retune(&mut self, kp: f64, ki: f64, kd: f64) -> bool {
        if !(kp.is_finite() && ki.is_finite() && kd.is_finite()) {
            return false;
        }
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
        debug!("pid tunings ({kp} {ki} {kd})");
        true
    }

    /// Change the setpoint without touching accumulated state
    pub fn set_setpoint(&mut self, setpoint: f64) -> bool {
        if !setpoint.is_finite() {
            return false;
        }
        self.setpoint = setpoint;
        true
    }

    /// Switch between the classic and on-measurement proportional modes
    pub fn set_proportional_on_measurement(&mut self, on_measurement: bool) {
        self.proportional_on_measurement = on_measurement;
    }

    /// Replace the output clamp
    pub fn set_output_limits(&mut self, limits: Option<(f64, f64)>) {
        self.output_limits = limits;
    }

    /// Toggle the enabled flag
    ///
    /// Returns `true` on a disabled-to-enabled transition so the orchestrator
    /// can reset its preheat cycle counter in the same step. While disabled,
    /// integral accumulation is suspended.
    pub fn set_enabled(&mut self, enabled: bool) -> bool {
        let rising = enabled && !self.enabled;
        self.enabled = enabled;
        rising
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    /// Accumulated integral term
    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// Error of the most recent compute call
    pub fn last_error(&self) -> f64 {
        self.last_error
    }

    /// Clear the accumulated state (not used on reload, by contract)
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_measurement = None;
        self.last_error = 0.0;
        self.last_output = 0.0;
        self.last_components = PidComponents::default();
    }
}
