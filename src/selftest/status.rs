//! Composite self-test status and its write-once cell.

use crate::analysis::{TestFailure, TestResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::OnceLock;
use thiserror::Error;

/// Flag set when the hardware source failed.
pub const HARDWARE_FAILURE_FLAG: u8 = 0b01;

/// Flag set when the pseudo-random stream failed.
pub const STREAM_FAILURE_FLAG: u8 = 0b10;

/// Final outcome of a self-test run.
///
/// Combines with `|` like the failure flags it stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Both sources passed.
    Ok,
    /// The capture-timer source failed, or sampling aborted.
    HardwareFailed,
    /// The LCG stream failed.
    StreamFailed,
    /// Both sources failed.
    BothFailed,
}

impl Status {
    /// Failure flags for this status.
    pub fn bits(self) -> u8 {
        match self {
            Status::Ok => 0,
            Status::HardwareFailed => HARDWARE_FAILURE_FLAG,
            Status::StreamFailed => STREAM_FAILURE_FLAG,
            Status::BothFailed => HARDWARE_FAILURE_FLAG | STREAM_FAILURE_FLAG,
        }
    }

    /// Status for a set of failure flags. Unknown bits are ignored.
    pub fn from_bits(bits: u8) -> Self {
        match bits & (HARDWARE_FAILURE_FLAG | STREAM_FAILURE_FLAG) {
            0 => Status::Ok,
            HARDWARE_FAILURE_FLAG => Status::HardwareFailed,
            STREAM_FAILURE_FLAG => Status::StreamFailed,
            _ => Status::BothFailed,
        }
    }

    /// Returns true if nothing failed.
    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }

    /// Returns true if the hardware source failed.
    pub fn hardware_failed(self) -> bool {
        self.bits() & HARDWARE_FAILURE_FLAG != 0
    }

    /// Returns true if the stream failed.
    pub fn stream_failed(self) -> bool {
        self.bits() & STREAM_FAILURE_FLAG != 0
    }
}

impl From<TestFailure> for Status {
    fn from(failure: TestFailure) -> Self {
        match failure {
            TestFailure::HardwareTestFailure => Status::HardwareFailed,
            TestFailure::StreamTestFailure => Status::StreamFailed,
        }
    }
}

impl From<&TestResult> for Status {
    fn from(result: &TestResult) -> Self {
        result.failure().map_or(Status::Ok, Status::from)
    }
}

impl BitOr for Status {
    type Output = Status;

    fn bitor(self, rhs: Status) -> Status {
        Status::from_bits(self.bits() | rhs.bits())
    }
}

impl BitOrAssign for Status {
    fn bitor_assign(&mut self, rhs: Status) {
        *self = *self | rhs;
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Status::Ok => "ok",
            Status::HardwareFailed => "hardware source failed",
            Status::StreamFailed => "stream failed",
            Status::BothFailed => "hardware source and stream failed",
        };
        f.write_str(text)
    }
}

/// Errors from the status cell.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    /// A status was already published.
    #[error("status already set to {current}, refusing {attempted}")]
    AlreadySet {
        /// Status that stays published.
        current: Status,
        /// Status that was refused.
        attempted: Status,
    },
}

/// Write-once holder for the final status.
///
/// Written by the self-test, read by the periodic indicator driver. Once
/// set, the value never changes for the rest of the boot cycle.
#[derive(Debug, Default)]
pub struct StatusCell {
    inner: OnceLock<Status>,
}

impl StatusCell {
    /// Creates an empty cell.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the status. Fails if a status is already stored.
    pub fn publish(&self, status: Status) -> Result<(), StatusError> {
        self.inner.set(status).map_err(|attempted| StatusError::AlreadySet {
            current: self.get().unwrap_or(attempted),
            attempted,
        })
    }

    /// Returns the status, if the self-test has finished.
    pub fn get(&self) -> Option<Status> {
        self.inner.get().copied()
    }

    /// Returns true once a status is stored.
    pub fn is_set(&self) -> bool {
        self.inner.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_combine() {
        assert_eq!(Status::Ok | Status::Ok, Status::Ok);
        assert_eq!(Status::HardwareFailed | Status::Ok, Status::HardwareFailed);
        assert_eq!(Status::HardwareFailed | Status::StreamFailed, Status::BothFailed);

        let mut status = Status::StreamFailed;
        status |= Status::HardwareFailed;
        assert_eq!(status, Status::BothFailed);
        assert_eq!(status.bits(), 0b11);
    }

    #[test]
    fn test_bits_round_trip() {
        for status in [Status::Ok, Status::HardwareFailed, Status::StreamFailed, Status::BothFailed] {
            assert_eq!(Status::from_bits(status.bits()), status);
        }
        assert_eq!(Status::from_bits(0b100), Status::Ok);
    }

    #[test]
    fn test_which_failed() {
        assert!(Status::BothFailed.hardware_failed());
        assert!(Status::BothFailed.stream_failed());
        assert!(!Status::StreamFailed.hardware_failed());
        assert!(Status::Ok.is_ok());
    }

    #[test]
    fn test_cell_is_write_once() {
        let cell = StatusCell::new();
        assert_eq!(cell.get(), None);

        cell.publish(Status::StreamFailed).unwrap();
        assert_eq!(
            cell.publish(Status::Ok),
            Err(StatusError::AlreadySet {
                current: Status::StreamFailed,
                attempted: Status::Ok,
            })
        );
        assert_eq!(cell.get(), Some(Status::StreamFailed));
    }
}
