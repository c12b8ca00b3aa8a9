//! True-random bit extraction.
//!
//! This module turns capture-timer jitter into random words. Each bit is
//! debiased by majority voting over several capture events; whole words
//! are collected into batches for statistical testing.

mod batch;
mod sampler;

pub use batch::SampleBatch;
pub use sampler::{NoiseSampler, SamplerConfig, SamplerError, MAJORITY, MAX_BITS, VOTES};
