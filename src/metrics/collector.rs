//! Metrics collection and registry.

use crate::selftest::{SelfTestError, SelfTestReport, Status};
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Metric construction, registration or encoding failed.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of self-test state for metrics update.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Composite status flags (0 = ok).
    pub status_bits: u8,
    /// Whether the hardware source passed.
    pub hardware_passed: bool,
    /// Monobit sum over the hardware source.
    pub hardware_sum: i32,
    /// Whether the stream passed.
    pub stream_passed: bool,
    /// Monobit sum over the stream.
    pub stream_sum: i32,
    /// Capture events consumed by the run.
    pub capture_events: u64,
    /// Completed self-test runs.
    pub runs: u64,
}

/// Prometheus metrics registry for self-test monitoring.
pub struct MetricsRegistry {
    registry: Registry,

    // Outcome
    status: IntGauge,
    runs_total: IntCounter,

    // Per-test metrics
    hardware_passed: IntGauge,
    hardware_sum: IntGauge,
    stream_passed: IntGauge,
    stream_sum: IntGauge,

    // Sampler metrics
    capture_events_total: IntCounter,
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all self-test metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let status = IntGauge::new(
            "timer_entropy_selftest_status",
            "Self-test failure flags (0=ok, 1=hardware, 2=stream, 3=both)",
        )?;
        let runs_total = IntCounter::new(
            "timer_entropy_selftest_runs_total",
            "Total number of completed self-test runs",
        )?;

        let hardware_passed = IntGauge::new(
            "timer_entropy_hardware_monobit_passed",
            "Hardware source monobit result (1=pass, 0=fail)",
        )?;
        let hardware_sum = IntGauge::new(
            "timer_entropy_hardware_monobit_sum",
            "Signed monobit sum over the hardware source",
        )?;
        let stream_passed = IntGauge::new(
            "timer_entropy_stream_monobit_passed",
            "LCG stream monobit result (1=pass, 0=fail)",
        )?;
        let stream_sum = IntGauge::new(
            "timer_entropy_stream_monobit_sum",
            "Signed monobit sum over the LCG stream",
        )?;

        let capture_events_total = IntCounter::new(
            "timer_entropy_capture_events_total",
            "Total capture events consumed by the sampler",
        )?;

        registry.register(Box::new(status.clone()))?;
        registry.register(Box::new(runs_total.clone()))?;
        registry.register(Box::new(hardware_passed.clone()))?;
        registry.register(Box::new(hardware_sum.clone()))?;
        registry.register(Box::new(stream_passed.clone()))?;
        registry.register(Box::new(stream_sum.clone()))?;
        registry.register(Box::new(capture_events_total.clone()))?;

        Ok(Self {
            registry,
            status,
            runs_total,
            hardware_passed,
            hardware_sum,
            stream_passed,
            stream_sum,
            capture_events_total,
        })
    }

    /// Updates all metrics from a snapshot.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        self.status.set(i64::from(snapshot.status_bits));
        self.hardware_passed.set(i64::from(snapshot.hardware_passed));
        self.hardware_sum.set(i64::from(snapshot.hardware_sum));
        self.stream_passed.set(i64::from(snapshot.stream_passed));
        self.stream_sum.set(i64::from(snapshot.stream_sum));

        // For counters, we need to increment by the difference
        let current_runs = self.runs_total.get();
        if snapshot.runs > current_runs {
            self.runs_total.inc_by(snapshot.runs - current_runs);
        }

        let current_events = self.capture_events_total.get();
        if snapshot.capture_events > current_events {
            self.capture_events_total
                .inc_by(snapshot.capture_events - current_events);
        }
    }

    /// Returns the last recorded status flags.
    pub fn status_bits(&self) -> u8 {
        self.status.get().clamp(0, 3) as u8
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl MetricsSnapshot {
    /// Creates a snapshot from a finished self-test.
    pub fn from_report(report: &SelfTestReport, runs: u64) -> Self {
        Self {
            status_bits: report.status_bits,
            hardware_passed: report.hardware.passed(),
            hardware_sum: report.hardware.sum,
            stream_passed: report.stream.passed(),
            stream_sum: report.stream.sum,
            capture_events: report.capture_events,
            runs,
        }
    }

    /// Creates a snapshot from whatever a self-test run returned.
    ///
    /// An aborted run has no report, so the gauges follow the status it
    /// published and both verdicts read as failed. With no published
    /// status at all, both sources count as failed.
    pub fn from_outcome(
        outcome: &Result<SelfTestReport, SelfTestError>,
        published: Option<Status>,
        capture_events: u64,
        runs: u64,
    ) -> Self {
        match outcome {
            Ok(report) => Self::from_report(report, runs),
            Err(_) => Self {
                status_bits: published.unwrap_or(Status::BothFailed).bits(),
                capture_events,
                runs,
                ..Self::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::MonobitTester;
    use crate::capture::SimulatedTimer;
    use crate::extraction::{NoiseSampler, SamplerConfig, SamplerError};
    use crate::selftest::{SelfTestRunner, StatusCell};
    use std::sync::Arc;

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_metrics_update() {
        let registry = MetricsRegistry::new().unwrap();

        let snapshot = MetricsSnapshot {
            status_bits: 2,
            hardware_passed: true,
            hardware_sum: -14,
            stream_passed: false,
            stream_sum: 242,
            capture_events: 4080,
            runs: 1,
        };

        registry.update(&snapshot);

        let output = registry.encode().unwrap();
        assert!(output.contains("timer_entropy_selftest_status 2"));
        assert!(output.contains("timer_entropy_hardware_monobit_sum -14"));
        assert!(output.contains("timer_entropy_stream_monobit_passed 0"));
        assert!(output.contains("timer_entropy_capture_events_total 4080"));
        assert_eq!(registry.status_bits(), 2);
    }

    #[test]
    fn test_snapshot_from_report() {
        let hardware = MonobitTester::hardware().run(|| 0xFFFF);
        let stream = MonobitTester::stream().run(|| 0xF0F0);
        let report = SelfTestReport::new(7, hardware, stream, 4080);

        let snapshot = MetricsSnapshot::from_report(&report, 1);
        assert_eq!(snapshot.status_bits, 1);
        assert!(!snapshot.hardware_passed);
        assert_eq!(snapshot.hardware_sum, 800);
        assert!(snapshot.stream_passed);
    }

    #[test]
    fn test_aborted_run_sets_failure_status() {
        let timer = SimulatedTimer::from_seed(0).stalled();
        let sampler = NoiseSampler::with_config(timer, SamplerConfig::with_poll_limit(16));
        let mut runner = SelfTestRunner::new(sampler);
        let mut cell = Arc::new(StatusCell::new());

        let outcome = runner.run(&mut cell);
        assert!(outcome.is_err());
        assert_eq!(cell.get(), Some(Status::HardwareFailed));

        let registry = MetricsRegistry::new().unwrap();
        let snapshot = MetricsSnapshot::from_outcome(
            &outcome,
            cell.get(),
            runner.sampler().capture_events(),
            1,
        );
        registry.update(&snapshot);

        assert_eq!(registry.status_bits(), 1);
        let output = registry.encode().unwrap();
        assert!(output.contains("timer_entropy_hardware_monobit_passed 0"));
        assert!(output.contains("timer_entropy_selftest_runs_total 1"));
    }

    #[test]
    fn test_unpublished_outcome_counts_as_both_failed() {
        let outcome = Err(SelfTestError::Sampler(SamplerError::Unresponsive { polls: 8 }));
        let snapshot = MetricsSnapshot::from_outcome(&outcome, None, 0, 1);
        assert_eq!(snapshot.status_bits, 3);
        assert!(!snapshot.hardware_passed);
        assert!(!snapshot.stream_passed);
    }

    #[test]
    fn test_outcome_uses_report_when_complete() {
        let hardware = MonobitTester::hardware().run(|| 0xAAAA);
        let stream = MonobitTester::stream().run(|| 0xF0F0);
        let report = SelfTestReport::new(7, hardware, stream, 4080);
        let outcome = Ok(report);

        let snapshot = MetricsSnapshot::from_outcome(&outcome, Some(Status::Ok), 0, 1);
        assert_eq!(snapshot.status_bits, 0);
        assert!(snapshot.hardware_passed);
        assert_eq!(snapshot.capture_events, 4080);
    }

    #[test]
    fn test_metrics_encode() {
        let registry = MetricsRegistry::new().unwrap();
        let output = registry.encode().unwrap();

        assert!(output.contains("timer_entropy_selftest_status"));
        assert!(output.contains("timer_entropy_stream_monobit_sum"));
        assert!(output.contains("timer_entropy_capture_events_total"));
    }
}
