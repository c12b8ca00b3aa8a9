//! Self-test report for offline inspection.

use super::status::Status;
use crate::analysis::TestResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while persisting a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// TOML serialization failed.
    #[error("failed to encode report: {0}")]
    Encode(#[from] toml::ser::Error),
    /// TOML text is not a report.
    #[error("failed to decode report: {0}")]
    Decode(#[from] toml::de::Error),
    /// Filesystem error.
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything a completed self-test determined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfTestReport {
    /// Final composite status.
    pub status: Status,
    /// Numeric failure cause (the status flags).
    pub status_bits: u8,
    /// Hardware seed the stream was extended from.
    pub seed: u16,
    /// Capture events consumed by the run.
    pub capture_events: u64,
    /// When the run finished.
    pub completed_at: DateTime<Utc>,
    /// Hardware source test.
    pub hardware: TestResult,
    /// Stream test.
    pub stream: TestResult,
}

impl SelfTestReport {
    /// Assembles a report, deriving the status from the two results.
    pub fn new(seed: u16, hardware: TestResult, stream: TestResult, capture_events: u64) -> Self {
        let status = Status::from(&hardware) | Status::from(&stream);
        Self {
            status,
            status_bits: status.bits(),
            seed,
            capture_events,
            completed_at: Utc::now(),
            hardware,
            stream,
        }
    }

    /// Encodes the report as TOML.
    pub fn to_toml(&self) -> Result<String, ReportError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Decodes a report from TOML.
    pub fn from_toml(content: &str) -> Result<Self, ReportError> {
        Ok(toml::from_str(content)?)
    }

    /// Writes the report as TOML.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        std::fs::write(path.as_ref(), self.to_toml()?)?;
        tracing::info!(path = %path.as_ref().display(), "Self-test report written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::MonobitTester;

    fn sample_report() -> SelfTestReport {
        let hardware = MonobitTester::hardware().run(|| 0xFFFF);
        let stream = MonobitTester::stream().run(|| 0xF0F0);
        SelfTestReport::new(0x1234, hardware, stream, 4080)
    }

    #[test]
    fn test_status_derived_from_results() {
        let report = sample_report();
        assert_eq!(report.status, Status::HardwareFailed);
        assert_eq!(report.status_bits, 0b01);
    }

    #[test]
    fn test_toml_readable_back() {
        let report = sample_report();
        let text = report.to_toml().unwrap();

        assert!(text.contains("status = \"hardware_failed\""));
        assert_eq!(SelfTestReport::from_toml(&text).unwrap(), report);
    }
}
