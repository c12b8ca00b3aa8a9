//! 16-bit linear congruential generator.
//!
//! `state' = (MULTIPLIER * state + INCREMENT) mod 2^16`
//!
//! The modulus is a power of two, so bit `k` of the state has period
//! `2^(k+1)`: the lowest bit simply alternates. Only the high byte of
//! each state is fit for statistical use, and everything here that hands
//! bits to generic consumers hands out the high byte only.

use rand_core::{impls, Error, RngCore, SeedableRng};

/// LCG multiplier. Odd, with `MULTIPLIER % 4 == 1`, for full period.
pub const MULTIPLIER: u16 = 49381;

/// LCG increment. Odd, for full period.
pub const INCREMENT: u16 = 8643;

/// High-order bits of each state that may be treated as random.
pub const SOUND_BITS: u8 = 8;

/// Advances a generator state by one step.
#[inline]
pub const fn next_state(state: u16) -> u16 {
    MULTIPLIER.wrapping_mul(state).wrapping_add(INCREMENT)
}

/// Owns a generator state and advances it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamExtender {
    state: u16,
}

impl StreamExtender {
    /// Creates an extender from a seed.
    pub fn new(seed: u16) -> Self {
        Self { state: seed }
    }

    /// Returns the current state.
    #[inline]
    pub fn state(&self) -> u16 {
        self.state
    }

    /// Advances one step and returns the new state.
    #[inline]
    pub fn advance(&mut self) -> u16 {
        self.state = next_state(self.state);
        self.state
    }

    /// Advances one step and returns the sound high byte.
    #[inline]
    pub fn high_byte(&mut self) -> u8 {
        (self.advance() >> 8) as u8
    }

    /// Replaces the state with a fresh seed.
    pub fn reseed(&mut self, seed: u16) {
        tracing::debug!(seed = format_args!("{:#06x}", seed), "Stream extender reseeded");
        self.state = seed;
    }
}

impl Iterator for StreamExtender {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        Some(self.advance())
    }
}

impl RngCore for StreamExtender {
    fn next_u32(&mut self) -> u32 {
        u32::from_le_bytes([
            self.high_byte(),
            self.high_byte(),
            self.high_byte(),
            self.high_byte(),
        ])
    }

    fn next_u64(&mut self) -> u64 {
        impls::next_u64_via_u32(self)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for byte in dest.iter_mut() {
            *byte = self.high_byte();
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for StreamExtender {
    type Seed = [u8; 2];

    fn from_seed(seed: [u8; 2]) -> Self {
        Self::new(u16::from_le_bytes(seed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{any, prop_assert_eq, proptest};

    fn reference(state: u16) -> u16 {
        ((u32::from(MULTIPLIER) * u32::from(state) + u32::from(INCREMENT)) % 65536) as u16
    }

    #[test]
    fn test_golden_vectors() {
        assert_eq!(next_state(0), 8643);
        assert_eq!(next_state(8643), 38194);
        assert_eq!(next_state(38194), 6013);
    }

    #[test]
    fn test_sequence_from_zero() {
        let states: Vec<u16> = StreamExtender::new(0).take(3).collect();
        assert_eq!(states, vec![8643, reference(8643), reference(reference(8643))]);
    }

    #[test]
    fn test_full_period() {
        let mut extender = StreamExtender::new(0);
        let mut seen = vec![false; 1 << 16];
        for _ in 0..(1 << 16) {
            let s = extender.advance() as usize;
            assert!(!seen[s], "state {} repeated early", s);
            seen[s] = true;
        }
        assert_eq!(extender.state(), 0);
    }

    #[test]
    fn test_low_bit_alternates() {
        let states: Vec<u16> = StreamExtender::new(1234).take(16).collect();
        for pair in states.windows(2) {
            assert_ne!(pair[0] & 1, pair[1] & 1);
        }
    }

    #[test]
    fn test_rng_emits_high_bytes() {
        let mut rng = StreamExtender::from_seed(0u16.to_le_bytes());
        let mut buf = [0u8; 3];
        rng.fill_bytes(&mut buf);

        assert_eq!(buf, [(8643u16 >> 8) as u8, (38194u16 >> 8) as u8, (6013u16 >> 8) as u8]);
    }

    #[test]
    fn test_reseed_restarts_sequence() {
        let mut a = StreamExtender::new(77);
        let first: Vec<u16> = a.by_ref().take(5).collect();
        a.reseed(77);
        let again: Vec<u16> = a.take(5).collect();
        assert_eq!(first, again);
    }

    proptest! {
        #[test]
        fn prop_matches_modular_arithmetic(s in any::<u16>()) {
            prop_assert_eq!(next_state(s), reference(s));
            prop_assert_eq!(next_state(next_state(s)), reference(reference(s)));
        }

        #[test]
        fn prop_reproducible_from_seed(seed in any::<u16>(), n in 1usize..256) {
            let a: Vec<u16> = StreamExtender::new(seed).take(n).collect();
            let b: Vec<u16> = StreamExtender::new(seed).take(n).collect();
            prop_assert_eq!(a, b);
        }
    }
}
