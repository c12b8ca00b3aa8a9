//! Register-level software model of a capture timer.
//!
//! Stands in for the hardware peripheral on hosts without one. The
//! capture-clock jitter is drawn from a ChaCha20 stream, which makes runs
//! reproducible from a seed. NOT an entropy source in its own right when
//! seeded deterministically.

use super::config::TimerConfig;
use super::timer::CaptureTimer;
use rand_chacha::ChaCha20Rng;
use rand_core::{RngCore, SeedableRng};
use std::cell::Cell;

/// Register bit definitions for the modeled timer.
pub mod reg {
    /// Capture/compare interrupt flag.
    pub const CCIFG: u16 = 0x0001;
    /// Capture/compare interrupt enable.
    pub const CCIE: u16 = 0x0010;
    /// Capture mode (compare mode when clear).
    pub const CAP: u16 = 0x0100;
    /// Capture input select: alternate input (the unstable oscillator).
    pub const CCIS_ALT: u16 = 0x1000;
    /// Capture on rising edge.
    pub const CM_RISING: u16 = 0x4000;
    /// Capture mode field mask.
    pub const CM_MASK: u16 = 0xC000;

    /// Timer source: sub-main clock.
    pub const TASSEL_SMCLK: u16 = 0x0200;
    /// Mode control: continuous counting.
    pub const MC_CONTINUOUS: u16 = 0x0020;
    /// Mode control field mask.
    pub const MC_MASK: u16 = 0x0030;

    /// Auxiliary clock sourced from the very-low-power oscillator.
    pub const LFXT1S_VLO: u8 = 0x20;
}

/// Saved register state of a [`SimulatedTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSnapshot {
    /// Timer control register.
    pub control: u16,
    /// Capture/compare control register, flag included.
    pub capture_control: u16,
    /// Clock control register, present only for the clock-reconfiguring variant.
    pub clock_control: Option<u8>,
}

/// Simulated capture timer.
pub struct SimulatedTimer {
    control: u16,
    capture_control: u16,
    clock_control: u8,
    counter: u16,
    captured: u16,
    reconfigure_clock: bool,
    one_threshold: u64,
    stalled: bool,
    rng: ChaCha20Rng,
    capture_events: u64,
    last_saved: Cell<Option<TimerSnapshot>>,
    last_restored: Option<TimerSnapshot>,
    restore_count: u64,
}

impl SimulatedTimer {
    /// Creates a deterministic, unbiased timer from a seed.
    pub fn from_seed(seed: u64) -> Self {
        Self::with_rng(ChaCha20Rng::seed_from_u64(seed))
    }

    /// Creates a timer whose jitter is seeded from the OS.
    pub fn from_os_entropy() -> Self {
        Self::with_rng(ChaCha20Rng::from_entropy())
    }

    /// Builds a timer from file configuration.
    pub fn from_config(config: &TimerConfig) -> Self {
        let timer = match config.seed {
            Some(seed) => Self::from_seed(seed),
            None => Self::from_os_entropy(),
        };

        timer
            .with_one_probability(config.one_probability)
            .with_clock_reconfiguration(config.reconfigure_clock)
    }

    fn with_rng(rng: ChaCha20Rng) -> Self {
        Self {
            control: 0,
            capture_control: 0,
            clock_control: 0,
            counter: 0,
            captured: 0,
            reconfigure_clock: false,
            one_threshold: 1 << 31,
            stalled: false,
            rng,
            capture_events: 0,
            last_saved: Cell::new(None),
            last_restored: None,
            restore_count: 0,
        }
    }

    /// Sets the probability that a captured LSB reads as 1.
    ///
    /// Anything other than 0.5 models a defective oscillator.
    pub fn with_one_probability(mut self, probability: f64) -> Self {
        let p = probability.clamp(0.0, 1.0);
        self.one_threshold = (p * (1u64 << 32) as f64) as u64;
        self
    }

    /// Selects the variant that also routes the auxiliary clock.
    pub fn with_clock_reconfiguration(mut self, enabled: bool) -> Self {
        self.reconfigure_clock = enabled;
        self
    }

    /// Presets register contents, as left by some other consumer.
    pub fn with_registers(mut self, control: u16, capture_control: u16, clock_control: u8) -> Self {
        self.control = control;
        self.capture_control = capture_control;
        self.clock_control = clock_control;
        self
    }

    /// Makes the timer never raise a capture.
    pub fn stalled(mut self) -> Self {
        self.stalled = true;
        self
    }

    /// Current register contents.
    pub fn registers(&self) -> TimerSnapshot {
        TimerSnapshot {
            control: self.control,
            capture_control: self.capture_control,
            clock_control: Some(self.clock_control),
        }
    }

    /// Number of capture events latched so far.
    pub fn capture_events(&self) -> u64 {
        self.capture_events
    }

    /// Snapshot most recently returned by `save_config`.
    pub fn last_saved(&self) -> Option<TimerSnapshot> {
        self.last_saved.get()
    }

    /// Snapshot most recently passed to `restore_config`.
    pub fn last_restored(&self) -> Option<TimerSnapshot> {
        self.last_restored
    }

    /// Number of `restore_config` calls.
    pub fn restore_count(&self) -> u64 {
        self.restore_count
    }

    fn capturing(&self) -> bool {
        self.capture_control & reg::CAP != 0
            && self.capture_control & reg::CM_MASK != 0
            && self.control & reg::MC_MASK != 0
    }

    fn latch(&mut self) {
        // The counter free-runs between edges by a jittery amount.
        let advance = (self.rng.next_u32() & 0x3F) as u16 + 1;
        self.counter = self.counter.wrapping_add(advance);

        let one = u64::from(self.rng.next_u32()) < self.one_threshold;
        self.captured = (self.counter & !1) | u16::from(one);
        self.capture_control |= reg::CCIFG;
        self.capture_events += 1;
    }
}

impl CaptureTimer for SimulatedTimer {
    type Snapshot = TimerSnapshot;

    fn save_config(&self) -> TimerSnapshot {
        let snapshot = TimerSnapshot {
            control: self.control,
            capture_control: self.capture_control,
            clock_control: self.reconfigure_clock.then_some(self.clock_control),
        };
        self.last_saved.set(Some(snapshot));
        snapshot
    }

    fn restore_config(&mut self, snapshot: TimerSnapshot) {
        self.control = snapshot.control;
        self.capture_control = snapshot.capture_control;
        if let Some(clock) = snapshot.clock_control {
            self.clock_control = clock;
        }
        self.last_restored = Some(snapshot);
        self.restore_count += 1;
    }

    fn configure_capture(&mut self) {
        self.capture_control = reg::CAP | reg::CM_RISING | reg::CCIS_ALT;
        self.control = reg::TASSEL_SMCLK | reg::MC_CONTINUOUS;
        if self.reconfigure_clock {
            self.clock_control = reg::LFXT1S_VLO;
        }
    }

    fn capture_pending(&mut self) -> bool {
        if self.capture_control & reg::CCIFG != 0 {
            return true;
        }
        if self.stalled || !self.capturing() {
            return false;
        }

        // Roughly one poll in four sees an edge.
        if self.rng.next_u32() & 0x3 == 0 {
            self.latch();
            return true;
        }
        false
    }

    fn clear_capture_flag(&mut self) {
        self.capture_control &= !reg::CCIFG;
    }

    fn read_capture_lsb(&self) -> bool {
        self.captured & 1 == 1
    }
}

impl std::fmt::Debug for SimulatedTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedTimer")
            .field("control", &format_args!("{:#06x}", self.control))
            .field("capture_control", &format_args!("{:#06x}", self.capture_control))
            .field("reconfigure_clock", &self.reconfigure_clock)
            .field("stalled", &self.stalled)
            .field("capture_events", &self.capture_events)
            .finish()
    }
}
