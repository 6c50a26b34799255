use std::fmt::Display;

use num_traits::PrimInt;

// Bit stream
//------------------------------------------------------------------------------

/// Big endian bit buffer shared by the QR data encoder and the bitstream parser. Writing
/// appends at the end, reading consumes from a cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitStream {
    data: Vec<u8>,
    // Bit length
    len: usize,
    // Read cursor in bits
    cursor: usize,
}

impl BitStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bit_capacity: usize) -> Self {
        Self { data: Vec::with_capacity(bit_capacity.div_ceil(8)), len: 0, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn len_in_bytes(&self) -> usize {
        self.len.div_ceil(8)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Pushes the lowest `size` bits of `bits`, most significant first
    pub fn push_bits<T>(&mut self, bits: T, size: usize)
    where
        T: PrimInt + Display,
    {
        debug_assert!(
            size <= T::zero().count_zeros() as usize,
            "Bit count shouldn't exceed type width: Size {size}"
        );
        debug_assert!(
            size >= (T::zero().count_zeros() - bits.leading_zeros()) as usize,
            "Bit count shouldn't be less than bit length: Length {size}, Bits {bits}"
        );

        for shift in (0..size).rev() {
            self.push((bits >> shift) & T::one() == T::one());
        }
    }

    pub fn push(&mut self, bit: bool) {
        let offset = self.len & 7;
        if offset == 0 {
            self.data.push(0);
        }
        if bit {
            let pos = self.len >> 3;
            self.data[pos] |= 0b1000_0000 >> offset;
        }
        self.len += 1;
    }

    pub fn extend(&mut self, other: &BitStream) {
        for i in 0..other.len {
            self.push(other.bit(i));
        }
    }

    pub fn bit(&self, i: usize) -> bool {
        debug_assert!(i < self.len, "Bit index out of bounds: Index {i}, Length {}", self.len);
        (self.data[i >> 3] >> (7 - (i & 7))) & 1 == 1
    }

    /// Number of bits left to read
    pub fn available(&self) -> usize {
        self.len - self.cursor
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Reads the next `size` bits, at most 32, as an unsigned integer
    pub fn take_bits(&mut self, size: usize) -> Option<u32> {
        if size > 32 || size > self.available() {
            return None;
        }
        let mut res = 0u32;
        for _ in 0..size {
            res = (res << 1) | self.bit(self.cursor) as u32;
            self.cursor += 1;
        }
        Some(res)
    }
}

impl From<&[u8]> for BitStream {
    fn from(bytes: &[u8]) -> Self {
        Self { data: bytes.to_vec(), len: bytes.len() * 8, cursor: 0 }
    }
}
