// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the proofbox project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Drift-corrected tick timing
//!
//! The control loop must tick as close to `pwm_period` seconds of true
//! wall-clock spacing as possible, no matter how long the per-tick work
//! (sensor read, computation, display update, telemetry publish) takes.
//! Instead of sleeping the raw period and accumulating drift additively,
//! every sleep is shortened by the whole seconds already consumed and padded
//! to the next integer-second boundary of the loop clock, so successive tick
//! starts stay aligned over arbitrarily many iterations.

use std::time::Instant;

/// Monotonic clock for the control loop, in seconds since an anchor point
///
/// Mirrors a monotonic "seconds as float" clock: the anchor is captured when
/// the loop starts, every reading is `f64` seconds since then.
#[derive(Debug, Clone, Copy)]
pub struct LoopClock {
    anchor: Instant,
}

impl LoopClock {
    /// Anchor a new clock at the current instant
    pub fn start() -> Self {
        Self {
            anchor: Instant::now(),
        }
    }

    /// Seconds elapsed since the anchor
    pub fn now_secs(&self) -> f64 {
        self.anchor.elapsed().as_secs_f64()
    }
}

/// Compute the drift-corrected sleep for the remainder of a tick
///
/// `raw_secs` is the nominal wait (the PWM period, or a deferred-off
/// duration), `tick_start` and `now` are readings of the same [`LoopClock`].
/// The correction subtracts the whole seconds consumed since `tick_start`
/// and adds the fraction needed to land on the next integer-second boundary:
///
/// ```text
/// sleep = raw - floor(now - tick_start) - 1 + (ceil(now) - now)
/// ```
///
/// A tick whose work exceeded the period produces a negative value; that is
/// clamped to zero so the loop falls behind silently instead of failing.
pub fn corrected_sleep(raw_secs: f64, tick_start: f64, now: f64) -> f64 {
    let elapsed = (now - tick_start).floor();
    let remainder = now.ceil() - now;
    let sleep = raw_secs - elapsed - 1.0 + remainder;
    sleep.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn corrects_for_time_consumed_by_tick_work() {
        // 2.4 s of work inside a 10 s period, starting on an integer boundary:
        // sleep = 10 - 2 - 1 + 0.6 = 7.6
        let sleep = corrected_sleep(10.0, 100.0, 102.4);
        assert_relative_eq!(sleep, 7.6, epsilon = 1e-9);
    }

    #[test]
    fn zero_work_on_a_boundary_sleeps_one_second_short() {
        // Already aligned, zero elapsed: the -1/remainder pair trades a full
        // second for the fractional alignment, which is zero here
        let sleep = corrected_sleep(10.0, 50.0, 50.0);
        assert_relative_eq!(sleep, 9.0, epsilon = 1e-9);
    }

    #[test]
    fn overlong_tick_clamps_to_zero() {
        let sleep = corrected_sleep(10.0, 0.0, 25.3);
        assert_eq!(sleep, 0.0);
    }

    #[test]
    fn tick_starts_stay_aligned_over_many_iterations() {
        // Simulate 100 ticks with irregular per-tick work; wakeups must stay
        // pinned to integer-second boundaries with no accumulated drift.
        let period = 10.0;
        let mut start = 0.0_f64;
        for i in 0..100u32 {
            let work = 0.3 + 2.1 * f64::from(i % 4); // 0.3 .. 6.6 seconds
            let now = start + work;
            let sleep = corrected_sleep(period, start, now);
            let next_start: f64 = now + sleep;
            assert!(
                next_start.fract() < 1e-6 || next_start.fract() > 1.0 - 1e-6,
                "tick {i} woke at {next_start}, off the second boundary"
            );
            assert!(next_start - start <= period + 1e-6);
            start = next_start;
        }
        // 100 ticks of a 10 s period minus the one-second alignment step each
        // first tick: total elapsed never exceeds the nominal schedule.
        assert!(start <= 100.0 * period + 1e-6);
    }
}
