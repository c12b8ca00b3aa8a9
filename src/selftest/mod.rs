//! Boot-time self-test.
//!
//! Draws a hardware seed, runs the monobit test against the hardware
//! source and against the LCG stream seeded from it, and publishes the
//! combined status exactly once. Indication happens outside the test
//! flow: a periodic driver reads the published status and blinks.

mod dump;
mod indicator;
mod report;
mod runner;
mod status;

pub use dump::{boot_dump, DEFAULT_DUMP_WORDS};
pub use indicator::{BlinkDriver, IndicatorConfig, LedState, StatusIndicator};
pub use report::{ReportError, SelfTestReport};
pub use runner::{Phase, SelfTestError, SelfTestRunner};
pub use status::{Status, StatusCell, StatusError, HARDWARE_FAILURE_FLAG, STREAM_FAILURE_FLAG};
