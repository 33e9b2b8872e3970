// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the proofbox project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Open-loop preheat override
//!
//! Closed-loop gains conservative enough for steady-state hold close a large
//! initial error slowly. For a bounded number of cycles after enabling, while
//! the enclosure is still far from the setpoint, the override bypasses the
//! quantized control output entirely and forces a boosted duty-cycle level.
//! Once either condition fails the loop reverts to the control law until the
//! enable flag is toggled off and on again, which restarts the window.

/// Preheat window parameters, derived from the controller snapshot
#[derive(Debug, Clone, Copy)]
pub struct PreheatOverride {
    /// Number of cycles after enable eligible for the override
    pub cycles: u64,
    /// Error above which the override fires
    pub threshold: f64,
    /// Forced duty-cycle level while the override is active
    pub power_level: f64,
}

impl PreheatOverride {
    /// Whether the override applies to the current tick
    ///
    /// `cycles_since_enable` starts at zero on every disabled-to-enabled
    /// transition and increments after each tick, so a window of 5 covers
    /// exactly the first five ticks.
    pub fn applies(&self, cycles_since_enable: u64, setpoint: f64, measurement: f64) -> bool {
        cycles_since_enable < self.cycles && (setpoint - measurement) > self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREHEAT: PreheatOverride = PreheatOverride {
        cycles: 5,
        threshold: 2.0,
        power_level: 8.0,
    };

    #[test]
    fn fires_while_young_and_far_from_setpoint() {
        for cycle in 0..5 {
            assert!(PREHEAT.applies(cycle, 80.0, 70.0), "cycle {cycle}");
        }
    }

    #[test]
    fn expires_after_the_window() {
        assert!(!PREHEAT.applies(5, 80.0, 70.0));
        assert!(!PREHEAT.applies(100, 80.0, 70.0));
    }

    #[test]
    fn does_not_fire_near_the_setpoint() {
        // error exactly at the threshold is not "far"
        assert!(!PREHEAT.applies(0, 80.0, 78.0));
        assert!(!PREHEAT.applies(0, 80.0, 79.5));
    }
}
