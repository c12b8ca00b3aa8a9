//! Capture timer access and configuration.
//!
//! The capture timer is the raw noise source: a free-running counter
//! latched by edges of an unstable oscillator. This module defines the
//! capability interface the sampler programs against, a register-level
//! simulation for hosts without the peripheral, and the file
//! configuration for the whole self-test.

mod config;
mod sim;
mod timer;

pub use config::{ConfigError, FileConfig, OutputConfig, TimerConfig};
pub use sim::{reg, SimulatedTimer, TimerSnapshot};
pub use timer::{CaptureTimer, TimerLease};
