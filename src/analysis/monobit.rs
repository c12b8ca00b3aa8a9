//! NIST SP 800-22 monobit frequency test.
//!
//! Each tested bit contributes +1 if set and -1 if clear. A balanced
//! source keeps the running sum `S` near zero; `|S|` above the critical
//! bound rejects the hypothesis of balance at the configured level.
//! Passing is necessary but not sufficient for good randomness.

use super::threshold::{MonobitConfig, SIGNIFICANCE};
use crate::capture::ConfigError;
use crate::extraction::SampleBatch;
use crate::stream::SOUND_BITS;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;

/// Generator a test instantiation covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Majority-vote capture-timer sampler.
    Hardware,
    /// LCG stream extender.
    Stream,
}

impl SourceKind {
    /// High-order bits per draw that carry randomness.
    pub fn sound_bits(self) -> u8 {
        match self {
            SourceKind::Hardware => 16,
            SourceKind::Stream => SOUND_BITS,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Hardware => f.write_str("hardware"),
            SourceKind::Stream => f.write_str("stream"),
        }
    }
}

/// Which generator failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum TestFailure {
    /// `|S|` over the hardware draws exceeded its bound.
    #[error("hardware source failed the monobit test")]
    HardwareTestFailure,
    /// `|S|` over the stream's high bytes exceeded its bound.
    #[error("pseudo-random stream failed the monobit test")]
    StreamTestFailure,
}

impl From<SourceKind> for TestFailure {
    fn from(source: SourceKind) -> Self {
        match source {
            SourceKind::Hardware => TestFailure::HardwareTestFailure,
            SourceKind::Stream => TestFailure::StreamTestFailure,
        }
    }
}

/// Outcome of a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// `|S|` within the bound.
    Success,
    /// `|S|` above the bound, tagged with the generator.
    Failure(TestFailure),
}

/// Result of one monobit test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    /// Generator tested.
    pub source: SourceKind,
    /// Pass or fail.
    pub verdict: Verdict,
    /// Accumulated ±1 sum. `|sum| <= bits_tested` always.
    pub sum: i32,
    /// Number of bits that contributed.
    pub bits_tested: u32,
    /// Bound the sum was checked against.
    pub max_abs_sum: u32,
}

impl TestResult {
    /// Returns true if the test passed.
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Success
    }

    /// Returns the failure, if any.
    pub fn failure(&self) -> Option<TestFailure> {
        match self.verdict {
            Verdict::Success => None,
            Verdict::Failure(failure) => Some(failure),
        }
    }

    /// `|S|`.
    pub fn abs_sum(&self) -> u32 {
        self.sum.unsigned_abs()
    }

    /// Fraction of ones minus 0.5.
    pub fn bit_bias(&self) -> f64 {
        if self.bits_tested == 0 {
            return 0.0;
        }
        f64::from(self.sum) / (2.0 * f64::from(self.bits_tested))
    }

    /// Normalized statistic `|S| / √n`.
    pub fn statistic(&self) -> f64 {
        if self.bits_tested == 0 {
            return 0.0;
        }
        f64::from(self.abs_sum()) / f64::from(self.bits_tested).sqrt()
    }
}

/// Runs the monobit test for one generator configuration.
#[derive(Debug, Clone)]
pub struct MonobitTester {
    config: MonobitConfig,
}

impl MonobitTester {
    /// Creates a tester, rejecting invalid parameters.
    pub fn new(config: MonobitConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Tester for the hardware source.
    pub fn hardware() -> Self {
        Self {
            config: MonobitConfig::hardware(),
        }
    }

    /// Tester for the LCG stream.
    pub fn stream() -> Self {
        Self {
            config: MonobitConfig::stream(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &MonobitConfig {
        &self.config
    }

    /// ±1 contribution of the top `bits_per_draw` bits of a draw.
    pub fn draw_contribution(&self, word: u16) -> i32 {
        let bits = u32::from(self.config.bits_per_draw);
        let ones = (word >> (16 - bits)).count_ones() as i32;
        2 * ones - bits as i32
    }

    /// Runs the test over `num_draws` draws from an infallible source.
    pub fn run<F>(&self, mut draw: F) -> TestResult
    where
        F: FnMut() -> u16,
    {
        match self.try_run(|| Ok::<u16, Infallible>(draw())) {
            Ok(result) => result,
            Err(never) => match never {},
        }
    }

    /// Runs the test over `num_draws` draws from a fallible source.
    ///
    /// The first source error aborts the test and is returned as is.
    pub fn try_run<F, E>(&self, mut draw: F) -> Result<TestResult, E>
    where
        F: FnMut() -> Result<u16, E>,
    {
        let mut sum: i32 = 0;

        for index in 0..self.config.num_draws {
            let word = draw()?;
            sum += self.draw_contribution(word);
            tracing::trace!(index, word = format_args!("{:#06x}", word), sum, "Monobit draw");
        }

        Ok(self.evaluate(sum))
    }

    /// Runs the test over the first `num_draws` words of a batch.
    ///
    /// Returns `None` if the batch is too short.
    pub fn run_batch(&self, batch: &SampleBatch) -> Option<TestResult> {
        let needed = self.config.num_draws as usize;
        if batch.len() < needed {
            return None;
        }
        let mut words = batch.iter();
        Some(self.run(|| words.next().unwrap_or_default()))
    }

    fn evaluate(&self, sum: i32) -> TestResult {
        let bits_tested = self.config.bits_tested();
        debug_assert!(sum.unsigned_abs() <= bits_tested);

        let verdict = if sum.unsigned_abs() > self.config.max_abs_sum {
            Verdict::Failure(self.config.source.into())
        } else {
            Verdict::Success
        };

        let result = TestResult {
            source: self.config.source,
            verdict,
            sum,
            bits_tested,
            max_abs_sum: self.config.max_abs_sum,
        };

        match verdict {
            Verdict::Success => tracing::info!(
                source = %result.source,
                sum,
                bound = result.max_abs_sum,
                bits = bits_tested,
                "Monobit test passed"
            ),
            Verdict::Failure(failure) => tracing::warn!(
                source = %result.source,
                sum,
                bound = result.max_abs_sum,
                bits = bits_tested,
                significance = SIGNIFICANCE,
                "Monobit test failed: {}",
                failure
            ),
        }

        result
    }
}
