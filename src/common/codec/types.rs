use std::cmp::Ordering;

use crate::common::error::{BarcodeError, BarcodeResult};
use crate::common::metadata::Version;

// Mode
//------------------------------------------------------------------------------

/// Segment modes with their 4 bit indicators
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash)]
pub enum Mode {
    Terminator = 0b0000,
    Numeric = 0b0001,
    Alphanumeric = 0b0010,
    StructuredAppend = 0b0011,
    Byte = 0b0100,
    Fnc1First = 0b0101,
    Eci = 0b0111,
    Kanji = 0b1000,
    Fnc1Second = 0b1001,
    Hanzi = 0b1101,
}

// Only the three character modes are ordered, each one a superset of the previous
impl PartialOrd for Mode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        let rank = |m: Mode| match m {
            Self::Numeric => Some(0),
            Self::Alphanumeric => Some(1),
            Self::Byte => Some(2),
            _ => None,
        };
        match (rank(*self), rank(*other)) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ if self == other => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl Mode {
    pub const MODE_BITS: usize = 4;

    pub fn from_bits(bits: u32) -> BarcodeResult<Self> {
        match bits {
            0b0000 => Ok(Self::Terminator),
            0b0001 => Ok(Self::Numeric),
            0b0010 => Ok(Self::Alphanumeric),
            0b0011 => Ok(Self::StructuredAppend),
            0b0100 => Ok(Self::Byte),
            0b0101 => Ok(Self::Fnc1First),
            0b0111 => Ok(Self::Eci),
            0b1000 => Ok(Self::Kanji),
            0b1001 => Ok(Self::Fnc1Second),
            0b1101 => Ok(Self::Hanzi),
            _ => Err(BarcodeError::Format),
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Width of the character count field. Zero for modes without one.
    pub fn char_count_bits(self, version: Version) -> usize {
        let i = match *version {
            ..=9 => 0,
            10..=26 => 1,
            _ => 2,
        };
        match self {
            Self::Numeric => [10, 12, 14][i],
            Self::Alphanumeric => [9, 11, 13][i],
            Self::Byte => [8, 16, 16][i],
            Self::Kanji | Self::Hanzi => [8, 10, 12][i],
            _ => 0,
        }
    }

    #[inline]
    fn numeric_digit(char: u8) -> u16 {
        debug_assert!(Mode::Numeric.contains(char), "Invalid numeric data: {char}");
        (char - b'0') as u16
    }

    #[inline]
    fn alphanumeric_digit(char: u8) -> u16 {
        debug_assert!(Mode::Alphanumeric.contains(char), "Invalid alphanumeric data: {char}");
        match char {
            b'0'..=b'9' => (char - b'0') as u16,
            b'A'..=b'Z' => (char - b'A' + 10) as u16,
            b' ' => 36,
            b'$' => 37,
            b'%' => 38,
            b'*' => 39,
            b'+' => 40,
            b'-' => 41,
            b'.' => 42,
            b'/' => 43,
            b':' => 44,
            _ => unreachable!("Invalid alphanumeric {char}"),
        }
    }

    /// Character for a numeric or alphanumeric digit value
    #[inline]
    fn byte(&self, mode_digit: u8) -> Option<u8> {
        match self {
            Self::Numeric => match mode_digit {
                md @ 0..=9 => Some(md + b'0'),
                _ => None,
            },
            Self::Alphanumeric => ALPHANUMERIC_CHARS.get(mode_digit as usize).copied(),
            _ => None,
        }
    }

    /// Packs up to three digits, two alphanumerics, one byte or one Shift_JIS pair
    pub fn encode_chunk(&self, data: &[u8]) -> u16 {
        let len = data.len();
        match self {
            Self::Numeric => {
                debug_assert!(len <= 3, "Data is too long for numeric conversion: {len}");
                data.iter().fold(0_u16, |n, b| n * 10 + Self::numeric_digit(*b))
            }
            Self::Alphanumeric => {
                debug_assert!(len <= 2, "Data is too long for alphanumeric conversion: {len}");
                data.iter().fold(0_u16, |n, b| n * 45 + Self::alphanumeric_digit(*b))
            }
            Self::Byte => {
                debug_assert!(len == 1, "Data is too long for byte conversion: {len}");
                data[0] as u16
            }
            Self::Kanji => {
                debug_assert!(len == 2, "Kanji chunk must be a Shift_JIS pair: {len}");
                let code = u16::from_be_bytes([data[0], data[1]]);
                let sub = if code <= 0x9ffc { code - 0x8140 } else { code - 0xc140 };
                (sub >> 8) * 0xc0 + (sub & 0xff)
            }
            _ => unreachable!("Cannot encode characters in {self:?} mode"),
        }
    }

    /// Inverse of `encode_chunk`. Fails when the value is out of range for the mode.
    pub fn decode_chunk(&self, data: u16, bit_len: usize) -> BarcodeResult<Vec<u8>> {
        match self {
            Self::Numeric => Self::decode_numeric_chunk(data, bit_len),
            Self::Alphanumeric => Self::decode_alphanumeric_chunk(data, bit_len),
            Self::Byte => {
                debug_assert!(bit_len == 8, "Invalid byte encoded length: {bit_len}");
                Ok(vec![data as u8])
            }
            Self::Kanji => Ok(Self::decode_kanji_chunk(data)),
            Self::Hanzi => Ok(Self::decode_hanzi_chunk(data)),
            _ => Err(BarcodeError::Format),
        }
    }

    fn decode_numeric_chunk(mut data: u16, bit_len: usize) -> BarcodeResult<Vec<u8>> {
        debug_assert!(
            bit_len == 10 || bit_len == 7 || bit_len == 4,
            "Invalid numeric encoded length: {bit_len}"
        );

        let len = bit_len / 3;
        if data >= [1, 10, 100, 1000][len] {
            return Err(BarcodeError::Format);
        }
        let mut res = vec![0; len];
        for i in 0..len {
            res[len - 1 - i] = Mode::Numeric.byte((data % 10) as u8).ok_or(BarcodeError::Format)?;
            data /= 10;
        }
        Ok(res)
    }

    fn decode_alphanumeric_chunk(mut data: u16, bit_len: usize) -> BarcodeResult<Vec<u8>> {
        debug_assert!(
            bit_len == 11 || bit_len == 6,
            "Invalid alphanumeric encoded length: {bit_len}"
        );

        let len = bit_len / 5;
        if data >= [1, 45, 45 * 45][len] {
            return Err(BarcodeError::Format);
        }
        let mut res = vec![0; len];
        for i in 0..len {
            res[len - 1 - i] =
                Mode::Alphanumeric.byte((data % 45) as u8).ok_or(BarcodeError::Format)?;
            data /= 45;
        }
        Ok(res)
    }

    // 13 bits to a Shift_JIS pair
    fn decode_kanji_chunk(data: u16) -> Vec<u8> {
        let msbyte = data / 0xc0;
        let lsbyte = data % 0xc0;
        let temp = ((msbyte << 8) | lsbyte) as u32 + 0x8140;
        let sjw = if temp <= 0x9ffc { temp } else { temp + 0x4000 };

        vec![(sjw >> 8) as u8, (sjw & 0xff) as u8]
    }

    // 13 bits to a GB2312 pair
    fn decode_hanzi_chunk(data: u16) -> Vec<u8> {
        let msbyte = data / 0x60;
        let lsbyte = data % 0x60;
        let temp = ((msbyte << 8) | lsbyte) as u32;
        let gbw = if temp < 0x0a00 { temp + 0xa1a1 } else { temp + 0xa6a1 };

        vec![(gbw >> 8) as u8, (gbw & 0xff) as u8]
    }

    pub fn contains(&self, byte: u8) -> bool {
        match self {
            Self::Numeric => byte.is_ascii_digit(),
            Self::Alphanumeric => ALPHANUMERIC_CHARS.contains(&byte),
            Self::Byte => true,
            _ => false,
        }
    }

    /// Encoded bit length of `len` characters (bytes for Kanji)
    pub fn encoded_len(&self, len: usize) -> usize {
        match *self {
            Self::Numeric => (len * 10).div_ceil(3),
            Self::Alphanumeric => (len * 11).div_ceil(2),
            Self::Byte => len * 8,
            Self::Kanji | Self::Hanzi => (len / 2) * 13,
            _ => 0,
        }
    }
}

/// True when `bytes` is a sequence of Shift_JIS double byte characters in the Kanji ranges
pub fn is_only_double_byte_kanji(bytes: &[u8]) -> bool {
    if bytes.is_empty() || bytes.len() % 2 != 0 {
        return false;
    }
    bytes.chunks(2).all(|pair| matches!(pair[0], 0x81..=0x9f | 0xe0..=0xeb))
}


// Segment
//------------------------------------------------------------------------------

/// A run of characters encoded in one mode. For Kanji `data` holds Shift_JIS pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Segment<'a> {
    pub mode: Mode,
    pub len_bits: usize, // Bit len of char count
    pub data: &'a [u8],  // Reference to raw data
}

impl<'a> Segment<'a> {
    pub fn new(mode: Mode, version: Version, data: &'a [u8]) -> Self {
        Self { mode, len_bits: mode.char_count_bits(version), data }
    }

    pub fn char_count(&self) -> usize {
        match self.mode {
            Mode::Kanji | Mode::Hanzi => self.data.len() / 2,
            _ => self.data.len(),
        }
    }

    pub fn bit_len(&self) -> usize {
        let encoded_bits = self.mode.encoded_len(self.data.len());
        Mode::MODE_BITS + self.len_bits + encoded_bits
    }
}


// Global constants
//------------------------------------------------------------------------------

pub static PADDING_CODEWORDS: [u8; 2] = [0b1110_1100, 0b0001_0001];

pub static ALPHANUMERIC_CHARS: [u8; 45] = *b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ $%*+-./:";

/// GS1 group separator, written as `%` in alphanumeric mode under FNC1
pub const GS: char = '\u{1d}';
