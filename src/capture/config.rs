//! Timer and self-test configuration.
//!
//! Every section defaults to the documented design constants, so an
//! empty file (or no file at all) reproduces the boot-time behavior.

use crate::analysis::{MonobitConfig, SourceKind};
use crate::extraction::SamplerConfig;
use crate::selftest::IndicatorConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the simulated capture timer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Jitter seed. `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Probability that a captured LSB reads as 1 (0.5 = healthy).
    pub one_probability: f64,
    /// Use the variant that also reroutes the auxiliary clock.
    pub reconfigure_clock: bool,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            seed: None,
            one_probability: 0.5,
            reconfigure_clock: false,
        }
    }
}

impl TimerConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.one_probability) {
            return Err(ConfigError::InvalidProbability(self.one_probability));
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Timer bias outside the unit interval.
    #[error("one-probability {0} outside [0, 1]")]
    InvalidProbability(f64),
    /// Bits per draw outside 1-16.
    #[error("bits per draw must be 1-16, got {0}")]
    InvalidBitWidth(u8),
    /// More bits per draw than the generator produces soundly.
    #[error("{kind} stream only has {max} sound bits per draw, got {got}")]
    UnsoundBitWidth {
        /// Generator the test covers.
        kind: SourceKind,
        /// Requested bits per draw.
        got: u8,
        /// Sound high-order bits of that generator.
        max: u8,
    },
    /// Zero draws, or more tested bits than the signed sum can hold.
    #[error("number of draws must be non-zero and test at most {} bits", i32::MAX)]
    InvalidDrawCount,
    /// Zero critical bound.
    #[error("critical bound must be non-zero")]
    InvalidBound,
    /// A test section names the other generator.
    #[error("{section} test configured for the {found} source")]
    SourceMismatch {
        /// Offending config section.
        section: &'static str,
        /// Source it named.
        found: SourceKind,
    },
    /// Poll guard set to zero.
    #[error("poll limit must be non-zero when set")]
    InvalidPollLimit,
    /// Zero blink period.
    #[error("blink period must be non-zero")]
    InvalidBlinkPeriod,
    /// Config file could not be read.
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    /// Config file is not valid TOML for this schema.
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Output configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where to write the self-test report, if anywhere.
    pub report_path: Option<PathBuf>,
    /// Metrics server port (0 to disable).
    pub metrics_port: u16,
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    /// Simulated timer settings.
    #[serde(default)]
    pub timer: TimerConfig,
    /// Capture wait guard.
    #[serde(default)]
    pub sampler: SamplerConfig,
    /// Monobit parameters for the hardware source.
    #[serde(default = "MonobitConfig::hardware")]
    pub hardware_test: MonobitConfig,
    /// Monobit parameters for the LCG stream.
    #[serde(default = "MonobitConfig::stream")]
    pub stream_test: MonobitConfig,
    /// Status LED timing.
    #[serde(default)]
    pub indicator: IndicatorConfig,
    /// Report and metrics outputs.
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            timer: TimerConfig::default(),
            sampler: SamplerConfig::default(),
            hardware_test: MonobitConfig::hardware(),
            stream_test: MonobitConfig::stream(),
            indicator: IndicatorConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timer.validate()?;
        self.sampler.validate()?;
        self.indicator.validate()?;

        self.hardware_test.validate()?;
        if self.hardware_test.source != SourceKind::Hardware {
            return Err(ConfigError::SourceMismatch {
                section: "hardware_test",
                found: self.hardware_test.source,
            });
        }

        self.stream_test.validate()?;
        if self.stream_test.source != SourceKind::Stream {
            return Err(ConfigError::SourceMismatch {
                section: "stream_test",
                found: self.stream_test.source,
            });
        }

        Ok(())
    }
}
