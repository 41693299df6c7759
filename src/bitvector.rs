//! Fixed-width bit vectors: predicate valuations of abstract states.

use std::fmt;

/// A bit vector of fixed length, backed by a vector of u64 words.
///
/// Bit `i` holds the truth value of predicate `i`. Unused bits of the last
/// word are always zero, so the derived equality is bitwise equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BitVector {
    words: Vec<u64>,
    len: usize,
}

impl BitVector {
    const BITS_PER_WORD: usize = 64;

    /// Creates an all-zero vector of `len` bits.
    pub fn new(len: usize) -> Self {
        let num_words = (len + Self::BITS_PER_WORD - 1) / Self::BITS_PER_WORD;
        Self {
            words: vec![0; num_words],
            len,
        }
    }

    pub fn from_bools(bits: &[bool]) -> Self {
        let mut res = Self::new(bits.len());
        for (i, &b) in bits.iter().enumerate() {
            res.set(i, b);
        }
        res
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn word_and_bit(index: usize) -> (usize, usize) {
        (index / Self::BITS_PER_WORD, index % Self::BITS_PER_WORD)
    }

    #[inline]
    pub fn get(&self, index: usize) -> bool {
        assert!(index < self.len, "Bit index {} out of range {}", index, self.len);
        let (word, bit) = Self::word_and_bit(index);
        (self.words[word] >> bit) & 1 == 1
    }

    #[inline]
    pub fn set(&mut self, index: usize, value: bool) {
        assert!(index < self.len, "Bit index {} out of range {}", index, self.len);
        let (word, bit) = Self::word_and_bit(index);
        if value {
            self.words[word] |= 1 << bit;
        } else {
            self.words[word] &= !(1 << bit);
        }
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// The lowest index at which the two vectors differ.
    ///
    /// # Panics
    ///
    /// Panics if the vectors have different lengths.
    pub fn first_difference(&self, other: &BitVector) -> Option<usize> {
        assert_eq!(self.len, other.len, "Bit vectors of different lengths");
        self.words
            .iter()
            .zip(&other.words)
            .enumerate()
            .find(|(_, (a, b))| a != b)
            .map(|(i, (a, b))| i * Self::BITS_PER_WORD + (a ^ b).trailing_zeros() as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(move |i| self.get(i))
    }
}

impl fmt::Display for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.iter() {
            write!(f, "{}", if b { '1' } else { '0' })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set() {
        let mut bv = BitVector::new(70);
        assert!(!bv.get(69));
        bv.set(69, true);
        bv.set(3, true);
        assert!(bv.get(69));
        assert_eq!(bv.count_ones(), 2);
        bv.set(3, false);
        assert_eq!(bv.count_ones(), 1);
    }

    #[test]
    fn test_first_difference() {
        let a = BitVector::from_bools(&[true, false, true]);
        let b = BitVector::from_bools(&[true, true, false]);
        assert_eq!(a.first_difference(&b), Some(1));
        assert_eq!(a.first_difference(&a.clone()), None);

        let mut c = BitVector::new(100);
        let mut d = BitVector::new(100);
        c.set(80, true);
        d.set(80, true);
        d.set(99, true);
        assert_eq!(c.first_difference(&d), Some(99));
    }

    #[test]
    fn test_display() {
        assert_eq!(BitVector::from_bools(&[true, false, true]).to_string(), "101");
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_out_of_range() {
        BitVector::new(2).get(2);
    }
}
