// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the proofbox project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Time-proportioning temperature controller for a heated proofing enclosure
//!
//! The heating element is a plug-in pad behind a smart relay that can only be
//! fully on or fully off, so the controller approximates a continuous power
//! level by varying the fraction of a fixed period the relay is held On
//! (software PWM). Each period a PID control law turns the temperature error
//! into a continuous output, which is quantized into a duty-cycle level in
//! tenths of the period and applied through the relay transport.
//!
//! Module map:
//! - [`control`] - PID law, level quantization, duty-cycle actuation and the
//!   drift-corrected control loop
//! - [`config`] - YAML configuration with validation and hot reload support
//! - [`daemon`] - background task lifecycle (control loop, config watcher,
//!   heartbeat)
//! - [`sensor`], [`display`], [`transport`] - collaborator seams and their
//!   in-tree drivers

pub mod config;
pub mod control;
pub mod daemon;
pub mod display;
pub mod sensor;
pub mod transport;
