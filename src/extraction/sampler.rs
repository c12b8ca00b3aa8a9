//! Majority-vote bit sampler over a capture timer.
//!
//! Each output bit is the majority of five capture events. The timer is
//! leased for the duration of one call: its configuration is saved,
//! capture mode is programmed, and the saved configuration is restored
//! on every way out of the call.

use super::SampleBatch;
use crate::capture::{CaptureTimer, ConfigError, TimerLease};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Capture events taken per output bit.
pub const VOTES: u32 = 5;

/// Votes needed for an output bit of 1.
pub const MAJORITY: u32 = 3;

/// Widest draw the sampler produces.
pub const MAX_BITS: u8 = 16;

/// Errors that can occur while sampling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SamplerError {
    /// Requested width outside 1-16.
    #[error("bit count must be 1-{max}, got {0}", max = MAX_BITS)]
    InvalidBitCount(u8),
    /// The poll guard ran out waiting for a capture.
    #[error("capture timer unresponsive after {polls} polls")]
    Unresponsive {
        /// Polls spent on the capture that never came.
        polls: u64,
    },
}

/// Sampler configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Polls allowed per capture before giving up.
    ///
    /// `None` waits forever, which is the boot-time behavior: an
    /// unresponsive timer hangs the sampler.
    pub poll_limit: Option<u64>,
}

impl SamplerConfig {
    /// Creates a configuration with a poll guard.
    pub fn with_poll_limit(limit: u64) -> Self {
        Self {
            poll_limit: Some(limit),
        }
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_limit == Some(0) {
            return Err(ConfigError::InvalidPollLimit);
        }
        Ok(())
    }
}

/// Draws random bits from a capture timer by majority voting.
pub struct NoiseSampler<T: CaptureTimer> {
    timer: T,
    config: SamplerConfig,
    capture_events: u64,
    words_sampled: u64,
}

impl<T: CaptureTimer> NoiseSampler<T> {
    /// Creates a sampler with an unbounded capture wait.
    pub fn new(timer: T) -> Self {
        Self::with_config(timer, SamplerConfig::default())
    }

    /// Creates a sampler with explicit configuration.
    pub fn with_config(timer: T, config: SamplerConfig) -> Self {
        Self {
            timer,
            config,
            capture_events: 0,
            words_sampled: 0,
        }
    }

    /// Draws `n` random bits, right-aligned in the returned word.
    ///
    /// Bits are shifted in from the top, so the first bit sampled ends up
    /// lowest. With `n == 16` the full word is returned as produced.
    pub fn sample_bits(&mut self, n: u8) -> Result<u16, SamplerError> {
        if n == 0 || n > MAX_BITS {
            return Err(SamplerError::InvalidBitCount(n));
        }

        let poll_limit = self.config.poll_limit;
        let mut lease = TimerLease::acquire(&mut self.timer);
        let mut result: u16 = 0;

        for _ in 0..n {
            let mut ones = 0;

            for _ in 0..VOTES {
                await_capture(&mut *lease, poll_limit)?;
                lease.clear_capture_flag();
                self.capture_events += 1;

                if lease.read_capture_lsb() {
                    ones += 1;
                }
            }

            result >>= 1;
            if ones >= MAJORITY {
                result |= 0x8000;
            }
        }

        lease.release();

        let word = result >> (u32::from(MAX_BITS) - u32::from(n));
        self.words_sampled += 1;
        tracing::debug!(bits = n, word = format_args!("{:#06x}", word), "Sampled hardware bits");

        Ok(word)
    }

    /// Draws a full 16-bit word.
    pub fn sample(&mut self) -> Result<u16, SamplerError> {
        self.sample_bits(MAX_BITS)
    }

    /// Draws `count` full words.
    pub fn sample_batch(&mut self, count: usize) -> Result<SampleBatch, SamplerError> {
        let mut batch = SampleBatch::with_capacity(count);
        for _ in 0..count {
            batch.push(self.sample()?);
        }
        Ok(batch)
    }

    /// Capture events consumed so far.
    pub fn capture_events(&self) -> u64 {
        self.capture_events
    }

    /// Words returned so far.
    pub fn words_sampled(&self) -> u64 {
        self.words_sampled
    }

    /// Returns the sampler configuration.
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Returns the underlying timer.
    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Releases the underlying timer.
    pub fn into_inner(self) -> T {
        self.timer
    }
}

fn await_capture<T: CaptureTimer>(timer: &mut T, poll_limit: Option<u64>) -> Result<(), SamplerError> {
    let Some(limit) = poll_limit else {
        timer.wait_for_capture();
        return Ok(());
    };

    for _ in 0..limit {
        if timer.capture_pending() {
            return Ok(());
        }
        std::hint::spin_loop();
    }

    tracing::warn!(polls = limit, "Capture timer did not respond");
    Err(SamplerError::Unresponsive { polls: limit })
}
