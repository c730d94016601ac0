//! Fixed-capacity bit set over `0..capacity`.
//!
//! The grammar engine uses bitfields for two hot lookups:
//! - which right-hand rules can follow a given left rule in a binary production
//! - which span lengths are populated for a start offset in the chart
//!
//! Insertion and membership are a single word operation; ascending iteration
//! skips empty words and uses trailing-zero counts inside a word.

use thiserror::Error;

const WORD_BITS: usize = 64;

/// Errors raised by bitfield operations.
///
/// These signal an engine bug rather than bad user input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BitfieldError {
    #[error("bitfield position {position} out of range for capacity {capacity}")]
    OutOfRange { position: usize, capacity: usize },
}

/// A sorted set of positions in `0..capacity`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitfield {
    words: Vec<u64>,
    capacity: usize,
}

impl Bitfield {
    /// Create an empty bitfield able to hold positions `0..capacity`.
    pub fn new(capacity: usize) -> Self {
        Bitfield {
            words: vec![0; capacity.div_ceil(WORD_BITS)],
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert a position. Returns `true` if it was not present before.
    #[inline]
    pub fn insert(&mut self, position: usize) -> Result<bool, BitfieldError> {
        if position >= self.capacity {
            return Err(BitfieldError::OutOfRange {
                position,
                capacity: self.capacity,
            });
        }
        let word = &mut self.words[position / WORD_BITS];
        let mask = 1u64 << (position % WORD_BITS);
        let is_new = *word & mask == 0;
        *word |= mask;
        Ok(is_new)
    }

    /// Membership test. Positions beyond the capacity are never members.
    #[inline]
    pub fn contains(&self, position: usize) -> bool {
        position < self.capacity
            && self.words[position / WORD_BITS] & (1u64 << (position % WORD_BITS)) != 0
    }

    /// Number of positions in the set.
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Iterate over the set positions in ascending order.
    pub fn iter(&self) -> Positions<'_> {
        Positions::new(&self.words, self.capacity)
    }
}

impl<'a> IntoIterator for &'a Bitfield {
    type Item = usize;
    type IntoIter = Positions<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Ascending iterator over the positions of a [`Bitfield`].
#[derive(Clone, Debug)]
pub struct Positions<'a> {
    words: &'a [u64],
    capacity: usize,
    word_index: usize,
    current: u64,
}

impl<'a> Positions<'a> {
    fn new(words: &'a [u64], capacity: usize) -> Self {
        Positions {
            words,
            capacity,
            word_index: 0,
            current: words.first().copied().unwrap_or(0),
        }
    }

    /// Start again from the lowest position.
    pub fn reset(&mut self) {
        self.word_index = 0;
        self.current = self.words.first().copied().unwrap_or(0);
    }

    /// Advance to the next set position.
    ///
    /// Fails with [`BitfieldError::OutOfRange`] once the set is exhausted.
    pub fn next_position(&mut self) -> Result<usize, BitfieldError> {
        while self.current == 0 {
            self.word_index += 1;
            if self.word_index >= self.words.len() {
                self.word_index = self.words.len();
                return Err(BitfieldError::OutOfRange {
                    position: self.capacity,
                    capacity: self.capacity,
                });
            }
            self.current = self.words[self.word_index];
        }
        let bit = self.current.trailing_zeros() as usize;
        // clear lowest set bit
        self.current &= self.current - 1;
        Ok(self.word_index * WORD_BITS + bit)
    }
}

impl Iterator for Positions<'_> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        self.next_position().ok()
    }
}
