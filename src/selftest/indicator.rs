//! Status indication.
//!
//! The self-test reports its outcome through a [`StatusIndicator`]. The
//! stock indicator is the shared [`StatusCell`]; a [`BlinkDriver`] reads
//! that cell on a fixed period and turns it into an LED pattern:
//!
//! | status            | red      | green    |
//! |-------------------|----------|----------|
//! | not yet set       | on       | off      |
//! | ok                | off      | on       |
//! | hardware failed   | blinking | off      |
//! | stream failed     | off      | blinking |
//! | both failed       | alternating | alternating |

use super::status::{Status, StatusCell};
use crate::capture::ConfigError;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Receiver for the self-test outcome.
pub trait StatusIndicator {
    /// Reports the final status.
    fn set(&mut self, status: Status);

    /// Signals that sampling has started and the caller may block.
    fn busy(&mut self) {}
}

impl<I: StatusIndicator + ?Sized> StatusIndicator for &mut I {
    fn set(&mut self, status: Status) {
        (**self).set(status)
    }

    fn busy(&mut self) {
        (**self).busy()
    }
}

impl StatusIndicator for Arc<StatusCell> {
    fn set(&mut self, status: Status) {
        if let Err(e) = self.publish(status) {
            tracing::warn!(error = %e, "Ignoring second status write");
        }
    }

    fn busy(&mut self) {
        tracing::debug!("Indicator busy");
    }
}

/// Two-LED output state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedState {
    /// Red LED lit.
    pub red: bool,
    /// Green LED lit.
    pub green: bool,
}

impl LedState {
    const BUSY: LedState = LedState {
        red: true,
        green: false,
    };
}

/// Blink driver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    /// Toggle period in milliseconds.
    pub period_ms: u64,
    /// Ticks to run before stopping. `None` runs until interrupted.
    pub cycles: Option<u64>,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            period_ms: 500,
            cycles: Some(10),
        }
    }
}

impl IndicatorConfig {
    /// Toggle period.
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period_ms == 0 {
            return Err(ConfigError::InvalidBlinkPeriod);
        }
        Ok(())
    }
}

/// Periodic driver turning the stored status into an LED pattern.
///
/// Only ever reads the status cell.
#[derive(Debug)]
pub struct BlinkDriver {
    cell: Arc<StatusCell>,
    phase: bool,
    ticks: u64,
}

impl BlinkDriver {
    /// Creates a driver reading `cell`.
    pub fn new(cell: Arc<StatusCell>) -> Self {
        Self {
            cell,
            phase: false,
            ticks: 0,
        }
    }

    /// Advances one period and returns the LED state to show.
    pub fn tick(&mut self) -> LedState {
        self.phase = !self.phase;
        self.ticks += 1;

        match self.cell.get() {
            None => LedState::BUSY,
            Some(Status::Ok) => LedState {
                red: false,
                green: true,
            },
            Some(Status::HardwareFailed) => LedState {
                red: self.phase,
                green: false,
            },
            Some(Status::StreamFailed) => LedState {
                red: false,
                green: self.phase,
            },
            Some(Status::BothFailed) => LedState {
                red: self.phase,
                green: !self.phase,
            },
        }
    }

    /// Ticks elapsed.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Ticks on the configured period until the cycle budget runs out or
    /// `stop` is raised, handing each LED state to `show`.
    pub fn run<F>(&mut self, config: &IndicatorConfig, stop: &AtomicBool, mut show: F)
    where
        F: FnMut(LedState),
    {
        let period = config.period();
        let mut remaining = config.cycles;

        while !stop.load(Ordering::Relaxed) {
            if let Some(left) = remaining.as_mut() {
                if *left == 0 {
                    break;
                }
                *left -= 1;
            }

            show(self.tick());
            std::thread::sleep(period);
        }

        tracing::debug!(ticks = self.ticks, "Blink driver stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver_with(status: Option<Status>) -> BlinkDriver {
        let cell = Arc::new(StatusCell::new());
        if let Some(status) = status {
            cell.publish(status).unwrap();
        }
        BlinkDriver::new(cell)
    }

    #[test]
    fn test_busy_until_set() {
        let cell = Arc::new(StatusCell::new());
        let mut driver = BlinkDriver::new(Arc::clone(&cell));
        assert_eq!(driver.tick(), LedState::BUSY);

        let mut indicator = Arc::clone(&cell);
        indicator.set(Status::Ok);
        assert_eq!(
            driver.tick(),
            LedState {
                red: false,
                green: true
            }
        );
    }

    #[test]
    fn test_ok_is_steady() {
        let mut driver = driver_with(Some(Status::Ok));
        let first = driver.tick();
        assert_eq!(driver.tick(), first);
        assert_eq!(driver.tick(), first);
    }

    #[test]
    fn test_hardware_failure_blinks_red() {
        let mut driver = driver_with(Some(Status::HardwareFailed));
        let a = driver.tick();
        let b = driver.tick();
        assert_ne!(a.red, b.red);
        assert!(!a.green && !b.green);
    }

    #[test]
    fn test_stream_failure_blinks_green() {
        let mut driver = driver_with(Some(Status::StreamFailed));
        let a = driver.tick();
        let b = driver.tick();
        assert_ne!(a.green, b.green);
        assert!(!a.red && !b.red);
    }

    #[test]
    fn test_both_failed_alternates() {
        let mut driver = driver_with(Some(Status::BothFailed));
        for _ in 0..4 {
            let state = driver.tick();
            assert_ne!(state.red, state.green);
        }
    }

    #[test]
    fn test_run_honors_cycle_budget() {
        let mut driver = driver_with(Some(Status::Ok));
        let config = IndicatorConfig {
            period_ms: 1,
            cycles: Some(3),
        };
        let stop = AtomicBool::new(false);
        let mut shown = Vec::new();

        driver.run(&config, &stop, |state| shown.push(state));
        assert_eq!(shown.len(), 3);
        assert_eq!(driver.ticks(), 3);
    }

    #[test]
    fn test_run_stops_when_raised() {
        let mut driver = driver_with(None);
        let config = IndicatorConfig {
            period_ms: 1,
            cycles: None,
        };
        let stop = AtomicBool::new(false);
        let mut count = 0;

        driver.run(&config, &stop, |_| {
            count += 1;
            if count == 5 {
                stop.store(true, Ordering::Relaxed);
            }
        });
        assert_eq!(count, 5);
    }

    #[test]
    fn test_second_write_ignored() {
        let cell = Arc::new(StatusCell::new());
        let mut indicator = Arc::clone(&cell);
        indicator.set(Status::HardwareFailed);
        indicator.set(Status::Ok);
        assert_eq!(cell.get(), Some(Status::HardwareFailed));
    }
}
