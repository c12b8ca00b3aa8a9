//! Capture timer abstraction.
//!
//! The timer is treated as an exclusive, singleton peripheral. Anything
//! that reprograms it must hand it back exactly as found, so access for
//! sampling goes through a [`TimerLease`] that restores the saved
//! configuration when it goes out of scope.

use std::fmt;
use std::ops::{Deref, DerefMut};

/// Trait for capture timer implementations.
///
/// A capture event latches the free-running counter on a triggering edge.
/// Jitter between the capture clock and the counter clock leaves the
/// least-significant bit of the latched count unpredictable.
///
/// Each implementation decides which registers make up its
/// [`Snapshot`](CaptureTimer::Snapshot); that set is exactly what it
/// guarantees to restore.
pub trait CaptureTimer {
    /// Saved peripheral configuration.
    type Snapshot: Clone + PartialEq + fmt::Debug;

    /// Reads the current configuration.
    fn save_config(&self) -> Self::Snapshot;

    /// Writes back a previously saved configuration, bit for bit.
    fn restore_config(&mut self, snapshot: Self::Snapshot);

    /// Reprograms the timer for sampling: capture mode, positive edge,
    /// free-running source clock, continuous counting.
    ///
    /// Must not depend on whatever configuration was active before.
    fn configure_capture(&mut self);

    /// Polls the capture-complete flag once.
    fn capture_pending(&mut self) -> bool;

    /// Clears the capture-complete flag.
    fn clear_capture_flag(&mut self);

    /// Returns the least-significant bit of the latched count.
    fn read_capture_lsb(&self) -> bool;

    /// Blocks until the next capture event.
    ///
    /// There is no timeout: an unresponsive timer hangs the caller.
    fn wait_for_capture(&mut self) {
        while !self.capture_pending() {
            std::hint::spin_loop();
        }
    }
}

impl<T: CaptureTimer + ?Sized> CaptureTimer for &mut T {
    type Snapshot = T::Snapshot;

    fn save_config(&self) -> Self::Snapshot {
        (**self).save_config()
    }

    fn restore_config(&mut self, snapshot: Self::Snapshot) {
        (**self).restore_config(snapshot)
    }

    fn configure_capture(&mut self) {
        (**self).configure_capture()
    }

    fn capture_pending(&mut self) -> bool {
        (**self).capture_pending()
    }

    fn clear_capture_flag(&mut self) {
        (**self).clear_capture_flag()
    }

    fn read_capture_lsb(&self) -> bool {
        (**self).read_capture_lsb()
    }

    fn wait_for_capture(&mut self) {
        (**self).wait_for_capture()
    }
}

/// Scoped exclusive access to a capture timer configured for sampling.
///
/// Acquiring the lease saves the incoming configuration and programs
/// capture mode. Dropping it restores the saved configuration, which
/// covers early returns and unwinding as well as the normal path.
pub struct TimerLease<'a, T: CaptureTimer> {
    timer: &'a mut T,
    saved: Option<T::Snapshot>,
}

impl<'a, T: CaptureTimer> TimerLease<'a, T> {
    /// Saves the timer's configuration and switches it to capture mode.
    pub fn acquire(timer: &'a mut T) -> Self {
        let saved = timer.save_config();
        tracing::trace!(snapshot = ?saved, "Saved timer configuration");
        timer.configure_capture();

        Self {
            timer,
            saved: Some(saved),
        }
    }

    /// Returns the configuration that will be restored on release.
    pub fn saved(&self) -> Option<&T::Snapshot> {
        self.saved.as_ref()
    }

    /// Restores the saved configuration now instead of at scope exit.
    pub fn release(mut self) {
        self.restore();
    }

    fn restore(&mut self) {
        if let Some(saved) = self.saved.take() {
            tracing::trace!(snapshot = ?saved, "Restoring timer configuration");
            self.timer.restore_config(saved);
        }
    }
}

impl<T: CaptureTimer> Deref for TimerLease<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.timer
    }
}

impl<T: CaptureTimer> DerefMut for TimerLease<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.timer
    }
}

impl<T: CaptureTimer> Drop for TimerLease<'_, T> {
    fn drop(&mut self) {
        self.restore();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct RegisterPair {
        control: u16,
        capture: bool,
        restores: usize,
    }

    impl CaptureTimer for RegisterPair {
        type Snapshot = u16;

        fn save_config(&self) -> u16 {
            self.control
        }

        fn restore_config(&mut self, snapshot: u16) {
            self.control = snapshot;
            self.restores += 1;
        }

        fn configure_capture(&mut self) {
            self.control = 0x4100;
        }

        fn capture_pending(&mut self) -> bool {
            self.capture = !self.capture;
            self.capture
        }

        fn clear_capture_flag(&mut self) {
            self.capture = false;
        }

        fn read_capture_lsb(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_lease_restores_on_drop() {
        let mut timer = RegisterPair {
            control: 0x0204,
            ..Default::default()
        };

        {
            let lease = TimerLease::acquire(&mut timer);
            assert_eq!(lease.control, 0x4100);
            assert_eq!(lease.saved(), Some(&0x0204));
        }

        assert_eq!(timer.control, 0x0204);
        assert_eq!(timer.restores, 1);
    }

    #[test]
    fn test_release_restores_once() {
        let mut timer = RegisterPair {
            control: 0x0001,
            ..Default::default()
        };

        let lease = TimerLease::acquire(&mut timer);
        lease.release();

        assert_eq!(timer.control, 0x0001);
        assert_eq!(timer.restores, 1);
    }

    #[test]
    fn test_wait_for_capture_spins_until_pending() {
        let mut timer = RegisterPair::default();
        timer.capture = true; // first poll flips to false, second to true
        timer.wait_for_capture();
        assert!(timer.capture);
    }
}
