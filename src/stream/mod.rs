//! Pseudo-random stream extension.
//!
//! Stretches one true-random seed into a long deterministic sequence
//! with a 16-bit linear congruential generator.

mod lcg;

pub use lcg::{next_state, StreamExtender, INCREMENT, MULTIPLIER, SOUND_BITS};
