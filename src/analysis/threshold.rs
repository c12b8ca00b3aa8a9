//! Monobit test parameters and critical bounds.
//!
//! The bound on `|S|` for significance level 0.01 is
//! `erfc⁻¹(0.01) · √2 · √n` for `n` tested bits. The bounds below are
//! fixed design constants, floored, one per generator configuration.

use super::monobit::SourceKind;
use crate::capture::ConfigError;
use crate::extraction::MAX_BITS;
use serde::{Deserialize, Serialize};

/// Significance level of the test.
pub const SIGNIFICANCE: f64 = 0.01;

/// `erfc⁻¹(0.01) · √2`, the two-sided normal critical value.
pub const CRITICAL_Z: f64 = 2.575_829_303_548_900_4;

/// Hardware source: full 16-bit draws.
pub const HARDWARE_BITS_PER_DRAW: u8 = 16;
/// Hardware source: each draw costs 80 capture events, so keep it small.
pub const HARDWARE_DRAWS: u32 = 50;
/// Hardware source: `floor(2.5758 · √800)`.
pub const HARDWARE_MAX_ABS_SUM: u32 = 72;

/// Stream: high byte only.
pub const STREAM_BITS_PER_DRAW: u8 = 8;
/// Stream: draws are cheap.
pub const STREAM_DRAWS: u32 = 1000;
/// Stream: `floor(2.5758 · √8000)`.
pub const STREAM_MAX_ABS_SUM: u32 = 230;

/// Parameters for one monobit test instantiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonobitConfig {
    /// Generator under test.
    pub source: SourceKind,
    /// High-order bits taken from each draw.
    pub bits_per_draw: u8,
    /// Number of draws.
    pub num_draws: u32,
    /// Largest `|S|` that still passes.
    pub max_abs_sum: u32,
}

impl MonobitConfig {
    /// Configuration for the hardware noise source.
    pub fn hardware() -> Self {
        Self {
            source: SourceKind::Hardware,
            bits_per_draw: HARDWARE_BITS_PER_DRAW,
            num_draws: HARDWARE_DRAWS,
            max_abs_sum: HARDWARE_MAX_ABS_SUM,
        }
    }

    /// Configuration for the LCG stream.
    pub fn stream() -> Self {
        Self {
            source: SourceKind::Stream,
            bits_per_draw: STREAM_BITS_PER_DRAW,
            num_draws: STREAM_DRAWS,
            max_abs_sum: STREAM_MAX_ABS_SUM,
        }
    }

    /// Total bits the test consumes.
    pub fn bits_tested(&self) -> u32 {
        self.num_draws * u32::from(self.bits_per_draw)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bits_per_draw == 0 || self.bits_per_draw > MAX_BITS {
            return Err(ConfigError::InvalidBitWidth(self.bits_per_draw));
        }
        let max = self.source.sound_bits();
        if self.bits_per_draw > max {
            return Err(ConfigError::UnsoundBitWidth {
                kind: self.source,
                got: self.bits_per_draw,
                max,
            });
        }
        // The signed sum must hold ±bits_tested.
        let fits = self
            .num_draws
            .checked_mul(u32::from(self.bits_per_draw))
            .is_some_and(|bits| bits <= i32::MAX as u32);
        if self.num_draws == 0 || !fits {
            return Err(ConfigError::InvalidDrawCount);
        }
        if self.max_abs_sum == 0 {
            return Err(ConfigError::InvalidBound);
        }
        Ok(())
    }
}
