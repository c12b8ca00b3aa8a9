//! Batch of sampled 16-bit words.

/// Ordered draws from a generator, held only for the duration of a test.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SampleBatch {
    /// Draws in sampling order.
    words: Vec<u16>,
}

impl SampleBatch {
    /// Creates a batch from existing draws.
    pub fn from_words(words: Vec<u16>) -> Self {
        Self { words }
    }

    /// Creates an empty batch with room for `count` draws.
    pub fn with_capacity(count: usize) -> Self {
        Self {
            words: Vec::with_capacity(count),
        }
    }

    /// Appends a draw.
    pub fn push(&mut self, word: u16) {
        self.words.push(word);
    }

    /// Returns the draws.
    #[inline]
    pub fn words(&self) -> &[u16] {
        &self.words
    }

    /// Returns the number of draws.
    #[inline]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Returns true if empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Returns the number of bits held.
    #[inline]
    pub fn bit_count(&self) -> usize {
        self.words.len() * 16
    }

    /// Counts the number of set bits.
    pub fn popcount(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Calculates bit bias as deviation from 0.5.
    ///
    /// Returns a value in [-0.5, 0.5] where 0.0 is unbiased.
    pub fn bit_bias(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let ones = self.popcount() as f64;
        let total = self.bit_count() as f64;
        (ones / total) - 0.5
    }

    /// Iterates over the draws.
    pub fn iter(&self) -> std::iter::Copied<std::slice::Iter<'_, u16>> {
        self.words.iter().copied()
    }
}

impl FromIterator<u16> for SampleBatch {
    fn from_iter<I: IntoIterator<Item = u16>>(iter: I) -> Self {
        Self::from_words(iter.into_iter().collect())
    }
}

impl std::fmt::Debug for SampleBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleBatch")
            .field("words", &self.words.len())
            .field("bit_bias", &format!("{:.4}", self.bit_bias()))
            .finish()
    }
}
