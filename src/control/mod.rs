// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the proofbox project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Control core: PID law, quantization, actuation and orchestration
//!
//! Dependency order, leaves first: [`pid`] computes the continuous control
//! output, [`quantizer`] turns it into a duty-cycle level, [`actuator`]
//! drives the relay (with a cancellable deferred Off), [`preheat`] can bypass
//! the law early in a session, [`timing`] keeps ticks aligned to wall-clock
//! boundaries, and [`control_loop`] wires it all together once per period.

pub mod actuator;
pub mod control_loop;
pub mod pid;
pub mod preheat;
pub mod quantizer;
pub mod timing;

pub use actuator::{DutyCycleActuator, RelayState};
pub use control_loop::{ControlLoop, ControllerCommand, ControllerSettings, TickContext};
pub use pid::{PidComponents, PidController, PidOutput};
pub use preheat::PreheatOverride;
pub use quantizer::{min_level_for_period, quantize};
pub use timing::{corrected_sleep, LoopClock};
