//! Boot dump: one hardware seed stretched into a run of LCG states.

use super::indicator::StatusIndicator;
use super::status::Status;
use crate::capture::CaptureTimer;
use crate::extraction::{NoiseSampler, SamplerError};
use crate::stream::StreamExtender;

/// Words in the default dump.
pub const DEFAULT_DUMP_WORDS: usize = 32;

/// Draws a hardware seed and extends it to `count` words.
///
/// The first word is the seed itself; each following word is the next
/// LCG state. The indicator shows busy while sampling and `Ok` once the
/// dump is complete.
pub fn boot_dump<T, I>(
    sampler: &mut NoiseSampler<T>,
    count: usize,
    indicator: &mut I,
) -> Result<Vec<u16>, SamplerError>
where
    T: CaptureTimer,
    I: StatusIndicator + ?Sized,
{
    if count == 0 {
        return Ok(Vec::new());
    }

    indicator.busy();
    let seed = sampler.sample()?;

    let mut words = Vec::with_capacity(count);
    words.push(seed);
    words.extend(StreamExtender::new(seed).take(count - 1));

    indicator.set(Status::Ok);
    tracing::info!(seed = format_args!("{:#06x}", seed), words = count, "Boot dump complete");
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::SimulatedTimer;
    use crate::selftest::StatusCell;
    use crate::stream::next_state;
    use std::sync::Arc;

    #[test]
    fn test_dump_chains_from_seed() {
        let mut sampler = NoiseSampler::new(SimulatedTimer::from_seed(17));
        let cell = Arc::new(StatusCell::new());
        let mut indicator = Arc::clone(&cell);

        let words = boot_dump(&mut sampler, DEFAULT_DUMP_WORDS, &mut indicator).unwrap();

        assert_eq!(words.len(), DEFAULT_DUMP_WORDS);
        for pair in words.windows(2) {
            assert_eq!(pair[1], next_state(pair[0]));
        }
        assert_eq!(sampler.words_sampled(), 1);
        assert_eq!(cell.get(), Some(Status::Ok));
    }

    #[test]
    fn test_empty_dump_touches_nothing() {
        let mut sampler = NoiseSampler::new(SimulatedTimer::from_seed(17));
        let mut indicator = Arc::new(StatusCell::new());

        assert!(boot_dump(&mut sampler, 0, &mut indicator).unwrap().is_empty());
        assert_eq!(sampler.capture_events(), 0);
        assert!(!indicator.is_set());
    }
}
