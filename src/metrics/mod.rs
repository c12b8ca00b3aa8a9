//! Prometheus metrics exporter for self-test monitoring.
//!
//! # Metrics Exposed
//!
//! - `timer_entropy_selftest_status` - Failure flags of the last run (0=ok)
//! - `timer_entropy_selftest_runs_total` - Completed self-test runs
//! - `timer_entropy_hardware_monobit_passed` - Hardware source verdict (1=pass)
//! - `timer_entropy_hardware_monobit_sum` - Signed monobit sum, hardware source
//! - `timer_entropy_stream_monobit_passed` - LCG stream verdict (1=pass)
//! - `timer_entropy_stream_monobit_sum` - Signed monobit sum, LCG stream
//! - `timer_entropy_capture_events_total` - Capture events consumed
//!
//! The HTTP exporter is behind the `metrics` feature. Its `/health`
//! endpoint reads the published status directly and is 503 until a
//! passing status exists.

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, MetricsState, ServerError};
