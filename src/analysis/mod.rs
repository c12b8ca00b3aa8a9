//! Statistical self-testing of the generators.
//!
//! Provides the monobit frequency test and the fixed parameters it runs
//! with for each generator. These are boot-time sanity checks, not
//! proofs of randomness.

mod monobit;
mod threshold;

pub use monobit::{MonobitTester, SourceKind, TestFailure, TestResult, Verdict};
pub use threshold::{
    MonobitConfig, CRITICAL_Z, HARDWARE_BITS_PER_DRAW, HARDWARE_DRAWS, HARDWARE_MAX_ABS_SUM,
    SIGNIFICANCE, STREAM_BITS_PER_DRAW, STREAM_DRAWS, STREAM_MAX_ABS_SUM,
};
