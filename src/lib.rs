//! Timer Entropy Library
//!
//! A noise-derived random bit generator, a 16-bit LCG that stretches one
//! true-random seed into a long stream, and a boot-time monobit
//! self-test that checks both.
//!
//! # Architecture
//!
//! ```text
//! capture timer → extraction (majority vote) → seed → stream (LCG)
//!                        ↓                               ↓
//!                     analysis (monobit)  ←──────────────┘
//!                        ↓
//!                     selftest → status → indicator
//! ```
//!
//! # Design Principles
//!
//! - **Leave the timer as found**: sampling leases the peripheral and
//!   restores its configuration on every exit path
//! - **Fail closed**: any failure flag, or an aborted sampling run,
//!   yields a failing status
//! - **Write once**: the status is published once per boot and only read
//!   afterwards
//! - **No cryptographic claims**: the monobit test is a sanity check
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use timer_entropy::{
//!     capture::SimulatedTimer,
//!     extraction::NoiseSampler,
//!     selftest::{SelfTestRunner, StatusCell},
//! };
//!
//! let sampler = NoiseSampler::new(SimulatedTimer::from_os_entropy());
//! let mut runner = SelfTestRunner::new(sampler);
//! let mut status = Arc::new(StatusCell::new());
//!
//! let report = runner.run(&mut status).unwrap();
//! println!("self-test: {}", report.status);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod analysis;
pub mod capture;
pub mod extraction;
pub mod metrics;
pub mod selftest;
pub mod stream;

// Re-export commonly used types at crate root
pub use analysis::{MonobitConfig, MonobitTester, SourceKind, TestResult, Verdict};
pub use capture::{CaptureTimer, FileConfig, SimulatedTimer, TimerLease};
pub use extraction::{NoiseSampler, SampleBatch, SamplerConfig, SamplerError};
pub use selftest::{BlinkDriver, SelfTestReport, SelfTestRunner, Status, StatusCell, StatusIndicator};
pub use stream::StreamExtender;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
