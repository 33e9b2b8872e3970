// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the proofbox project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Control loop configuration section
//!
//! Every tunable of the PID law, the software-PWM timing and the preheat
//! override lives here. The tunables are required: a missing field is a
//! parse error at the configuration boundary, never a silent default, so a
//! misspelled key cannot run the controller with unintended values. Only the
//! two controller-mode parameters carry defaults, matching the control
//! library's documented ones.
//!
//! The section is replaced as a whole snapshot on hot reload; accumulated
//! control state (integral term, preheat cycle counter) is owned by the
//! control loop and survives the swap.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Control loop tuning and timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlConfig {
    /// Software-PWM period in seconds (one control tick per period)
    pub pwm_period: f64,

    /// Target temperature, unit-consistent with the sensor readings
    pub set_point: f64,

    /// Proportional gain
    pub kp: f64,

    /// Integral gain
    pub ki: f64,

    /// Derivative gain
    pub kd: f64,

    /// Number of initial cycles eligible for the open-loop preheat override
    pub preheat_cycles: u64,

    /// Error above which preheat forces the override level
    pub preheat_threshold: f64,

    /// Duty-cycle level (tenths of the period) forced while preheating
    pub preheat_power_level: f64,

    /// Start with the PID enabled
    pub enable_pid: bool,

    /// Compute the proportional term on the measurement delta instead of the
    /// error (avoids proportional kick on setpoint changes)
    #[serde(default = "default_true")]
    pub proportional_on_measurement: bool,

    /// Optional (min, max) output clamp; also bounds the integral accumulator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_limits: Option<(f64, f64)>,

    /// Seed value for the integral accumulator at startup
    pub initial_integral_sum: f64,

    /// Topic for the per-tick telemetry payload
    pub topic_status: String,

    /// Topic for relay On/Off commands
    pub topic_plug_command: String,
}

fn default_true() -> bool {
    true
}

// Bench values; configuration files must spell every tunable out.
impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            pwm_period: 60.0,
            set_point: 78.0,
            kp: 1.0,
            ki: 0.01,
            kd: 0.0,
            preheat_cycles: 5,
            preheat_threshold: 2.0,
            preheat_power_level: 8.0,
            enable_pid: true,
            proportional_on_measurement: true,
            output_limits: None,
            initial_integral_sum: 0.0,
            topic_status: "proofbox/status".to_string(),
            topic_plug_command: "proofbox/plug/command".to_string(),
        }
    }
}

impl ControlConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if !self.pwm_period.is_finite() || self.pwm_period <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "control.pwm_period must be a positive number of seconds, got {}",
                self.pwm_period
            )));
        }
        for (name, value) in [
            ("control.set_point", self.set_point),
            ("control.kp", self.kp),
            ("control.ki", self.ki),
            ("control.kd", self.kd),
            ("control.preheat_threshold", self.preheat_threshold),
            ("control.initial_integral_sum", self.initial_integral_sum),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::Invalid(format!("{name} must be finite")));
            }
        }
        if !(0.0..=10.0).contains(&self.preheat_power_level) {
            return Err(ConfigError::Invalid(format!(
                "control.preheat_power_level must be within 0..=10, got {}",
                self.preheat_power_level
            )));
        }
        if let Some((min, max)) = self.output_limits {
            if !min.is_finite() || !max.is_finite() || min >= max {
                return Err(ConfigError::Invalid(format!(
                    "control.output_limits must be a finite (min, max) pair with min < max, got ({min}, {max})"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A complete control section; the base for the omission tests
    fn full_section_yaml() -> String {
        "pwm_period: 60.0\nset_point: 78.0\nkp: 1.0\nki: 0.01\nkd: 0.0\n\
         preheat_cycles: 5\npreheat_threshold: 2.0\npreheat_power_level: 8.0\n\
         enable_pid: true\ninitial_integral_sum: 0.0\n\
         topic_status: proofbox/status\ntopic_plug_command: proofbox/plug/command\n"
            .to_string()
    }

    #[test]
    fn default_section_validates() {
        assert!(ControlConfig::default().validate().is_ok());
    }

    #[test]
    fn complete_section_parses() {
        let config: ControlConfig = serde_yml::from_str(&full_section_yaml()).unwrap();
        assert_eq!(config.pwm_period, 60.0);
        // mode parameters fall back to the library defaults when omitted
        assert!(config.proportional_on_measurement);
        assert!(config.output_limits.is_none());
    }

    #[test]
    fn every_tunable_is_required() {
        for key in [
            "pwm_period",
            "set_point",
            "kp",
            "ki",
            "kd",
            "preheat_cycles",
            "preheat_threshold",
            "preheat_power_level",
            "enable_pid",
            "initial_integral_sum",
            "topic_status",
            "topic_plug_command",
        ] {
            let yaml: String = full_section_yaml()
                .lines()
                .filter(|line| !line.starts_with(&format!("{key}:")))
                .map(|line| format!("{line}\n"))
                .collect();
            assert!(
                serde_yml::from_str::<ControlConfig>(&yaml).is_err(),
                "section parsed without {key}"
            );
        }
    }

    #[test]
    fn rejects_out_of_range_preheat_level() {
        let config = ControlConfig {
            preheat_power_level: 11.0,
            ..ControlConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_output_limits() {
        let config = ControlConfig {
            output_limits: Some((10.0, 0.0)),
            ..ControlConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_non_finite_gain() {
        let config = ControlConfig {
            ki: f64::NAN,
            ..ControlConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
