// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the proofbox project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Simulated enclosure temperature sensor
//!
//! Stands in for the hardware sensor during development and in tests: the
//! internal temperature drifts by a fixed amount per read with bounded
//! uniform noise on top. With drift and noise at zero it behaves as a fixed
//! reference source, which the scenario tests rely on.

use anyhow::Result;
use async_trait::async_trait;
use rand::RngExt;
use tokio::sync::Mutex;

use super::TemperatureSensor;
use crate::config::TemperatureUnit;

/// Simulated sensor; internal model runs in Celsius and converts on read
pub struct SimulatedSensor {
    current_celsius: Mutex<f64>,
    drift_per_read: f64,
    noise: f64,
    unit: TemperatureUnit,
}

impl SimulatedSensor {
    pub fn new(start_celsius: f64, drift_per_read: f64, noise: f64, unit: TemperatureUnit) -> Self {
        Self {
            current_celsius: Mutex::new(start_celsius),
            drift_per_read,
            noise,
            unit,
        }
    }
}

#[async_trait]
impl TemperatureSensor for SimulatedSensor {
    async fn read_temperature(&self) -> Result<f64> {
        let mut current = self.current_celsius.lock().await;
        *current += self.drift_per_read;
        let jitter = if self.noise > 0.0 {
            rand::rng().random_range(-self.noise..=self.noise)
        } else {
            0.0
        };
        Ok(self.unit.from_celsius(*current + jitter))
    }
}
