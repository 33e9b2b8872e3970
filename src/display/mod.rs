// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the proofbox project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Local display seam
//!
//! The loop pushes setpoint / current temperature / power level to a display
//! once per tick. Layout is the driver's business; failures are non-fatal and
//! absorbed by the caller. The console driver is the in-tree implementation;
//! a panel driver would slot in behind the same trait.

use anyhow::Result;
use async_trait::async_trait;
use log::debug;

use crate::config::DisplayConfig;

/// Display output for the enclosure's local panel
#[async_trait]
pub trait DisplayWriter: Send + Sync {
    /// Blank the display
    async fn clear(&self) -> Result<()>;

    /// Show the current controller values
    async fn update(&self, setpoint: f64, current: f64, level: f64) -> Result<()>;
}

/// Build the configured display driver
pub fn from_config(config: &DisplayConfig) -> Box<dyn DisplayWriter> {
    if config.enabled {
        Box::new(ConsoleDisplay)
    } else {
        Box::new(NullDisplay)
    }
}

/// Console display driver: clears the terminal and prints the three values
#[derive(Debug, Default)]
pub struct ConsoleDisplay;

#[async_trait]
impl DisplayWriter for ConsoleDisplay {
    async fn clear(&self) -> Result<()> {
        print!("\x1b[2J\x1b[H");
        Ok(())
    }

    async fn update(&self, setpoint: f64, current: f64, level: f64) -> Result<()> {
        print!("\x1b[H\x1b[J");
        println!("set:   {setpoint}");
        println!("cur:   {current}");
        println!("power: {level}");
        Ok(())
    }
}

/// Display driver that drops every update
#[derive(Debug, Default)]
pub struct NullDisplay;

#[async_trait]
impl DisplayWriter for NullDisplay {
    async fn clear(&self) -> Result<()> {
        Ok(())
    }

    async fn update(&self, setpoint: f64, current: f64, level: f64) -> Result<()> {
        debug!("display update dropped (set {setpoint} cur {current} power {level})");
        Ok(())
    }
}
