// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the proofbox project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Quantization of the continuous control output into a duty-cycle level
//!
//! Levels are tenths of the PWM period: 0 means the relay is never On during
//! the period, 10 means always On. Outputs inside (0, 10) are rounded with
//! the historical `floor(10x + 5) / 10` formula, which biases half a level
//! upward compared to textbook round-half-up (kept deliberately for
//! behavioral parity with the original controller). Levels shorter than the
//! minimum meaningful On-pulse snap to 0.

/// Minimum level for a period, encoding "never schedule an On-pulse shorter
/// than 3 seconds"
pub fn min_level_for_period(period_secs: f64) -> f64 {
    (3.0 * 100.0) / (10.0 * period_secs)
}

/// Quantize a control output into a level in `[0, 10]`
pub fn quantize(output: f64, min_level: f64) -> f64 {
    if output <= 0.0 {
        return 0.0;
    }
    if output >= 10.0 {
        return 10.0;
    }
    // Historical rounding; see module docs. The +5 bias can push outputs just
    // under 10 past the ceiling, so the level is capped to hold the [0, 10]
    // invariant.
    let level = ((10.0 * output + 5.0).floor() / 10.0).min(10.0);
    if level < min_level {
        // a pulse shorter than the minimum actuation time is not worth
        // energizing the relay for
        0.0
    } else {
        level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn non_positive_outputs_quantize_to_zero() {
        assert_eq!(quantize(0.0, 0.5), 0.0);
        assert_eq!(quantize(-3.7, 0.5), 0.0);
        assert_eq!(quantize(f64::NEG_INFINITY, 0.5), 0.0);
    }

    #[test]
    fn saturated_outputs_quantize_to_ten() {
        assert_eq!(quantize(10.0, 0.5), 10.0);
        assert_eq!(quantize(412.9, 0.5), 10.0);
    }

    #[test]
    fn interior_outputs_use_the_historical_rounding() {
        // floor(10 * 0.26 + 5) / 10 = floor(7.6) / 10 = 0.7
        assert_relative_eq!(quantize(0.26, 0.5), 0.7);
        // floor(10 * 4.32 + 5) / 10 = floor(48.2) / 10 = 4.8
        assert_relative_eq!(quantize(4.32, 0.5), 4.8);
    }

    #[test]
    fn outputs_just_under_ten_stay_capped() {
        // floor(10 * 9.99 + 5) / 10 would be 10.4 without the cap
        assert_eq!(quantize(9.99, 0.5), 10.0);
    }

    #[test]
    fn levels_below_the_minimum_snap_to_zero() {
        // period 30 s gives min_level 1.0; a tiny output quantizes to 0.5
        // which is below it
        let min_level = min_level_for_period(30.0);
        assert_relative_eq!(min_level, 1.0);
        assert_eq!(quantize(0.01, min_level), 0.0);
        // at or above the minimum the level passes through
        assert_relative_eq!(quantize(0.51, min_level), 1.0);
    }

    #[test]
    fn min_level_encodes_a_three_second_pulse() {
        // period 60 s: 3 s of On time is level 0.5
        assert_relative_eq!(min_level_for_period(60.0), 0.5);
    }
}
