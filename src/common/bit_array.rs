use std::fmt::{Display, Formatter, Result as FmtResult};

use super::error::{BarcodeError, BarcodeResult};

// Bit array
//------------------------------------------------------------------------------

/// Fixed size sequence of bits packed into 32-bit words. Bit `i` lives in word `i / 32` at
/// position `i % 32`, least significant bit first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BitArray {
    bits: Vec<u32>,
    size: usize,
}

impl BitArray {
    pub fn new() -> Self {
        Self { bits: Vec::new(), size: 0 }
    }

    pub fn with_size(size: usize) -> Self {
        Self { bits: vec![0; size.div_ceil(32)], size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn size_in_bytes(&self) -> usize {
        self.size.div_ceil(8)
    }

    pub fn words(&self) -> &[u32] {
        &self.bits
    }

    fn ensure_capacity(&mut self, size: usize) {
        let words = size.div_ceil(32);
        if words > self.bits.len() {
            self.bits.resize(words, 0);
        }
    }

    #[inline]
    pub fn get(&self, i: usize) -> bool {
        debug_assert!(i < self.size, "Bit index out of bounds: Index {i}, Size {}", self.size);
        (self.bits[i >> 5] & (1 << (i & 0x1f))) != 0
    }

    #[inline]
    pub fn set(&mut self, i: usize) {
        self.bits[i >> 5] |= 1 << (i & 0x1f);
    }

    #[inline]
    pub fn flip(&mut self, i: usize) {
        self.bits[i >> 5] ^= 1 << (i & 0x1f);
    }

    /// Sets the 32 bits starting at `i`, which must be a multiple of 32
    pub fn set_bulk(&mut self, i: usize, new_bits: u32) {
        debug_assert!(i & 0x1f == 0, "Bulk set must be word aligned: Index {i}");
        self.bits[i >> 5] = new_bits;
    }

    pub fn clear(&mut self) {
        self.bits.fill(0);
    }

    /// Index of the first set bit at or after `from`, or `size` if there is none
    pub fn next_set(&self, from: usize) -> usize {
        if from >= self.size {
            return self.size;
        }
        let mut offset = from >> 5;
        let mut current = self.bits[offset] & (u32::MAX << (from & 0x1f));
        while current == 0 {
            offset += 1;
            if offset == self.bits.len() {
                return self.size;
            }
            current = self.bits[offset];
        }
        std::cmp::min((offset << 5) + current.trailing_zeros() as usize, self.size)
    }

    /// Index of the first unset bit at or after `from`, or `size` if there is none
    pub fn next_unset(&self, from: usize) -> usize {
        if from >= self.size {
            return self.size;
        }
        let mut offset = from >> 5;
        let mut current = !self.bits[offset] & (u32::MAX << (from & 0x1f));
        while current == 0 {
            offset += 1;
            if offset == self.bits.len() {
                return self.size;
            }
            current = !self.bits[offset];
        }
        std::cmp::min((offset << 5) + current.trailing_zeros() as usize, self.size)
    }

    // Mask covering bits first..=last of a single word
    fn word_mask(first: usize, last: usize) -> u32 {
        (2u32 << last).wrapping_sub(1 << first)
    }

    /// Sets the bits in `start..end`
    pub fn set_range(&mut self, start: usize, end: usize) -> BarcodeResult<()> {
        if end < start || end > self.size {
            return Err(BarcodeError::illegal(format!("Invalid bit range {start}..{end}")));
        }
        if end == start {
            return Ok(());
        }
        let last = end - 1;
        let (first_word, last_word) = (start >> 5, last >> 5);
        for i in first_word..=last_word {
            let first_bit = if i > first_word { 0 } else { start & 0x1f };
            let last_bit = if i < last_word { 31 } else { last & 0x1f };
            self.bits[i] |= Self::word_mask(first_bit, last_bit);
        }
        Ok(())
    }

    /// Checks whether every bit in `start..end` equals `value`
    pub fn is_range(&self, start: usize, end: usize, value: bool) -> BarcodeResult<bool> {
        if end < start || end > self.size {
            return Err(BarcodeError::illegal(format!("Invalid bit range {start}..{end}")));
        }
        if end == start {
            return Ok(true);
        }
        let last = end - 1;
        let (first_word, last_word) = (start >> 5, last >> 5);
        for i in first_word..=last_word {
            let first_bit = if i > first_word { 0 } else { start & 0x1f };
            let last_bit = if i < last_word { 31 } else { last & 0x1f };
            let mask = Self::word_mask(first_bit, last_bit);
            let expected = if value { mask } else { 0 };
            if self.bits[i] & mask != expected {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn append_bit(&mut self, bit: bool) {
        self.ensure_capacity(self.size + 1);
        if bit {
            self.bits[self.size >> 5] |= 1 << (self.size & 0x1f);
        }
        self.size += 1;
    }

    /// Appends the lowest `num_bits` bits of `value`, most significant first
    pub fn append_bits(&mut self, value: u32, num_bits: usize) -> BarcodeResult<()> {
        if num_bits > 32 {
            return Err(BarcodeError::illegal("Num bits must be between 0 and 32"));
        }
        self.ensure_capacity(self.size + num_bits);
        for shift in (0..num_bits).rev() {
            self.append_bit((value >> shift) & 1 == 1);
        }
        Ok(())
    }

    pub fn append_bit_array(&mut self, other: &BitArray) {
        self.ensure_capacity(self.size + other.size);
        for i in 0..other.size {
            self.append_bit(other.get(i));
        }
    }

    pub fn xor(&mut self, other: &BitArray) -> BarcodeResult<()> {
        if self.size != other.size {
            return Err(BarcodeError::illegal("Sizes don't match"));
        }
        self.bits.iter_mut().zip(other.bits.iter()).for_each(|(a, b)| *a ^= b);
        Ok(())
    }

    /// Packs `num_bytes` bytes starting at `bit_offset` into `out`, most significant bit first
    pub fn to_bytes(&self, mut bit_offset: usize, out: &mut [u8]) {
        for byte in out.iter_mut() {
            let mut b = 0u8;
            for j in 0..8 {
                if self.get(bit_offset) {
                    b |= 1 << (7 - j);
                }
                bit_offset += 1;
            }
            *byte = b;
        }
    }

    pub fn reverse(&mut self) {
        let mut reversed = vec![0u32; self.bits.len()];
        for i in 0..self.size {
            if self.get(i) {
                let j = self.size - 1 - i;
                reversed[j >> 5] |= 1 << (j & 0x1f);
            }
        }
        self.bits = reversed;
    }
}

impl From<&[bool]> for BitArray {
    fn from(bits: &[bool]) -> Self {
        let mut res = Self::with_size(bits.len());
        bits.iter().enumerate().filter(|(_, &b)| b).for_each(|(i, _)| res.set(i));
        res
    }
}

impl Display for BitArray {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for i in 0..self.size {
            if i & 7 == 0 {
                f.write_str(" ")?;
            }
            f.write_str(if self.get(i) { "X" } else { "." })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod bit_array_tests {
    use super::BitArray;
    use test_case::test_case;

    #[test]
    fn test_get_set() {
        let mut arr = BitArray::with_size(33);
        for i in 0..33 {
            assert!(!arr.get(i));
            arr.set(i);
            assert!(arr.get(i));
        }
    }

    #[test]
    fn test_flip() {
        let mut arr = BitArray::with_size(32);
        arr.flip(5);
        assert!(arr.get(5));
        arr.flip(5);
        assert!(!arr.get(5));
    }

    #[test_case(&[], 0, 32; "empty")]
    #[test_case(&[31], 0, 31; "last bit of word")]
    #[test_case(&[31, 32], 32, 32; "first bit of next word")]
    #[test_case(&[10, 60], 11, 60; "spans words")]
    fn test_next_set(set: &[usize], from: usize, exp: usize) {
        let size = if set.is_empty() { 32 } else { 63 };
        let mut arr = BitArray::with_size(size);
        set.iter().for_each(|&i| arr.set(i));
        let exp = if set.is_empty() { size } else { exp };
        assert_eq!(arr.next_set(from), exp);
    }

    #[test]
    fn test_next_unset() {
        let mut arr = BitArray::with_size(64);
        arr.set_range(0, 40).unwrap();
        assert_eq!(arr.next_unset(0), 40);
        assert_eq!(arr.next_unset(41), 41);
        arr.set_range(40, 64).unwrap();
        assert_eq!(arr.next_unset(0), 64);
    }

    #[test]
    fn test_set_range_and_is_range() {
        let mut arr = BitArray::with_size(64);
        arr.set_range(28, 36).unwrap();
        assert!(!arr.get(27));
        assert!(arr.get(28));
        assert!(arr.get(35));
        assert!(!arr.get(36));
        assert!(arr.is_range(28, 36, true).unwrap());
        assert!(arr.is_range(0, 28, false).unwrap());
        assert!(!arr.is_range(27, 36, true).unwrap());
        arr.set_range(0, 64).unwrap();
        assert!(arr.is_range(0, 64, true).unwrap());
        assert!(arr.set_range(10, 65).is_err());
    }

    #[test]
    fn test_append_bits_and_bytes() {
        let mut arr = BitArray::new();
        arr.append_bits(0b1010_0101, 8).unwrap();
        arr.append_bits(0xff, 8).unwrap();
        assert_eq!(arr.size(), 16);
        let mut out = [0u8; 2];
        arr.to_bytes(0, &mut out);
        assert_eq!(out, [0b1010_0101, 0xff]);
        assert!(arr.append_bits(0, 33).is_err());
    }

    #[test]
    fn test_reverse() {
        let mut arr = BitArray::with_size(40);
        arr.set(0);
        arr.set(3);
        arr.reverse();
        assert!(arr.get(39));
        assert!(arr.get(36));
        assert!(!arr.get(0));
    }

    #[test]
    fn test_xor() {
        let mut a = BitArray::from(&[true, false, true][..]);
        let b = BitArray::from(&[true, true, false][..]);
        a.xor(&b).unwrap();
        assert_eq!(a, BitArray::from(&[false, true, true][..]));
        assert!(a.xor(&BitArray::with_size(4)).is_err());
    }

    #[test]
    fn test_display() {
        let arr = BitArray::from(&[true, false, true][..]);
        assert_eq!(arr.to_string(), " X.X");
    }
}
