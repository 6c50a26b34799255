use std::fmt::{Display, Formatter, Result as FmtResult};
use std::ops::Deref;
use std::str::FromStr;
use std::sync::LazyLock;

use super::bit_matrix::BitMatrix;
use super::error::{BarcodeError, BarcodeResult};
use super::mask::MaskPattern;

// Error correction level
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ECLevel {
    L = 0,
    M = 1,
    Q = 2,
    H = 3,
}

impl ECLevel {
    pub const ALL: [ECLevel; 4] = [Self::L, Self::M, Self::Q, Self::H];

    /// Two bit indicator stored in the format information
    pub fn format_bits(self) -> u32 {
        match self {
            Self::L => 0b01,
            Self::M => 0b00,
            Self::Q => 0b11,
            Self::H => 0b10,
        }
    }

    pub fn from_format_bits(bits: u32) -> BarcodeResult<Self> {
        match bits {
            0b01 => Ok(Self::L),
            0b00 => Ok(Self::M),
            0b11 => Ok(Self::Q),
            0b10 => Ok(Self::H),
            _ => Err(BarcodeError::Format),
        }
    }
}

impl Display for ECLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let s = match self {
            Self::L => "L",
            Self::M => "M",
            Self::Q => "Q",
            Self::H => "H",
        };
        f.write_str(s)
    }
}

impl FromStr for ECLevel {
    type Err = BarcodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L" | "7" | "7%" => Ok(Self::L),
            "M" | "15" | "15%" => Ok(Self::M),
            "Q" | "25" | "25%" => Ok(Self::Q),
            "H" | "30" | "30%" => Ok(Self::H),
            _ => Err(BarcodeError::illegal(format!("Invalid error correction level: {s}"))),
        }
    }
}

// Version
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version(usize);

impl Deref for Version {
    type Target = usize;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

impl Version {
    pub const MIN: Version = Version(1);
    pub const MAX: Version = Version(40);

    pub fn new(number: usize) -> BarcodeResult<Self> {
        if !(1..=40).contains(&number) {
            return Err(BarcodeError::illegal(format!("Invalid version: {number}")));
        }
        Ok(Self(number))
    }

    pub fn all() -> impl Iterator<Item = Version> {
        (1..=40).map(Version)
    }

    pub const fn width(self) -> usize {
        self.0 * 4 + 17
    }

    pub fn alignment_pattern(self) -> &'static [usize] {
        &ALIGNMENT_PATTERN_POSITIONS[self.0]
    }

    /// Number of modules left for codewords once every function pattern and the
    /// format and version areas are excluded
    pub const fn raw_modules(self) -> usize {
        let v = self.0;
        let mut res = (16 * v + 128) * v + 64;
        if v >= 2 {
            let n = v / 7 + 2;
            res -= (25 * n - 10) * n - 55;
            if v >= 7 {
                res -= 36;
            }
        }
        res
    }

    pub const fn total_codewords(self) -> usize {
        self.raw_modules() >> 3
    }

    pub const fn remainder_bits(self) -> usize {
        self.raw_modules() & 7
    }

    pub fn ecc_per_block(self, ec_level: ECLevel) -> usize {
        ECC_CODEWORDS_PER_BLOCK[ec_level as usize][self.0]
    }

    pub fn num_blocks(self, ec_level: ECLevel) -> usize {
        NUM_ERROR_CORRECTION_BLOCKS[ec_level as usize][self.0]
    }

    pub fn total_ecc(self, ec_level: ECLevel) -> usize {
        self.ecc_per_block(ec_level) * self.num_blocks(ec_level)
    }

    pub fn data_codewords(self, ec_level: ECLevel) -> usize {
        self.total_codewords() - self.total_ecc(ec_level)
    }

    pub fn data_bit_capacity(self, ec_level: ECLevel) -> usize {
        self.data_codewords(ec_level) << 3
    }

    /// Data codewords per block as (short size, short count, long size, long count).
    /// Long blocks carry one extra data codeword and always follow the short ones.
    pub fn data_codewords_per_block(self, ec_level: ECLevel) -> (usize, usize, usize, usize) {
        let total = self.total_codewords();
        let blocks = self.num_blocks(ec_level);
        let ecc = self.ecc_per_block(ec_level);
        let short_len = total / blocks;
        let short_count = blocks - total % blocks;
        let short_size = short_len - ecc;
        let long_count = blocks - short_count;
        let long_size = if long_count > 0 { short_size + 1 } else { 0 };
        (short_size, short_count, long_size, long_count)
    }

    /// 18 bit version information word, only drawn for versions 7 and above
    pub fn info(self) -> u32 {
        let v = self.0 as u32;
        (v << 12) | bch_remainder(v, VERSION_GENERATOR)
    }

    /// Version implied by the module count of a sampled symbol
    pub fn provisional_for_dimension(dimension: usize) -> BarcodeResult<Self> {
        if dimension % 4 != 1 || dimension < 21 {
            return Err(BarcodeError::Format);
        }
        Self::new((dimension - 17) / 4).map_err(|_| BarcodeError::Format)
    }

    /// Best match for a read version information word, tolerating up to 3 bit errors
    pub fn decode_version_information(bits: u32) -> BarcodeResult<Self> {
        let (version, info) = Version::all()
            .skip(6)
            .map(|v| (v, v.info()))
            .min_by_key(|(_, info)| (bits ^ info).count_ones())
            .ok_or(BarcodeError::Format)?;
        if (bits ^ info).count_ones() <= VERSION_ERROR_CAPACITY {
            Ok(version)
        } else {
            Err(BarcodeError::Format)
        }
    }

    /// Marks every module that does not carry codewords
    pub fn build_function_pattern(self) -> BarcodeResult<BitMatrix> {
        let w = self.width();
        let mut bits = BitMatrix::square(w)?;

        // Finder patterns with separators and format areas
        bits.set_region(0, 0, 9, 9)?;
        bits.set_region(w - 8, 0, 8, 9)?;
        bits.set_region(0, w - 8, 9, 8)?;

        let poses = self.alignment_pattern();
        let last = poses.len().saturating_sub(1);
        for (i, &r) in poses.iter().enumerate() {
            for (j, &c) in poses.iter().enumerate() {
                if (i == 0 && (j == 0 || j == last)) || (i == last && j == 0) {
                    continue;
                }
                bits.set_region(c - 2, r - 2, 5, 5)?;
            }
        }

        // Timing patterns
        bits.set_region(6, 9, 1, w - 17)?;
        bits.set_region(9, 6, w - 17, 1)?;

        if self.0 > 6 {
            bits.set_region(w - 11, 0, 3, 6)?;
            bits.set_region(0, w - 11, 6, 3)?;
        }
        Ok(bits)
    }
}

fn bch_remainder(value: u32, generator: u32) -> u32 {
    let gen_len = 32 - generator.leading_zeros();
    let mut rem = value << (gen_len - 1);
    while 32 - rem.leading_zeros() >= gen_len {
        rem ^= generator << (32 - rem.leading_zeros() - gen_len);
    }
    rem
}


// Format information
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInfo {
    pub ec_level: ECLevel,
    pub mask: MaskPattern,
}

impl FormatInfo {
    pub fn new(ec_level: ECLevel, mask: MaskPattern) -> Self {
        Self { ec_level, mask }
    }

    /// 15 bit masked word as drawn in the symbol
    pub fn encode(self) -> u32 {
        let data = (self.ec_level.format_bits() << 3) | *self.mask as u32;
        ((data << 10) | bch_remainder(data, FORMAT_GENERATOR)) ^ FORMAT_MASK
    }

    fn from_data(data: u32) -> BarcodeResult<Self> {
        let ec_level = ECLevel::from_format_bits((data >> 3) & 0b11)?;
        Ok(Self { ec_level, mask: MaskPattern::new((data & 0b111) as u8)? })
    }

    /// Decodes the two read copies of the format information. Some writers forget
    /// to apply the format mask, so a failed match is retried on unmasked words.
    pub fn decode(masked_main: u32, masked_side: u32) -> Option<Self> {
        Self::do_decode(masked_main, masked_side).or_else(|| {
            Self::do_decode(masked_main ^ FORMAT_MASK, masked_side ^ FORMAT_MASK)
        })
    }

    fn do_decode(main: u32, side: u32) -> Option<Self> {
        let mut best_diff = u32::MAX;
        let mut best = None;
        for (data, &word) in FORMAT_INFOS_QR.iter().enumerate() {
            if word == main || word == side {
                return Self::from_data(data as u32).ok();
            }
            for read in [main, side] {
                let diff = (read ^ word).count_ones();
                if diff < best_diff {
                    best_diff = diff;
                    best = Some(data as u32);
                }
            }
        }
        if best_diff <= FORMAT_ERROR_CAPACITY {
            best.and_then(|d| Self::from_data(d).ok())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod format_info_tests {
    use super::{ECLevel, FormatInfo};
    use crate::common::mask::MaskPattern;

    #[test]
    fn test_encode() {
        let fi = FormatInfo::new(ECLevel::M, MaskPattern::new(5).unwrap());
        assert_eq!(fi.encode(), 0x40CE);
        let fi = FormatInfo::new(ECLevel::L, MaskPattern::new(4).unwrap());
        assert_eq!(fi.encode(), 0x662F);
    }

    #[test]
    fn test_decode_all() {
        for ecl in ECLevel::ALL {
            for m in 0..8 {
                let fi = FormatInfo::new(ecl, MaskPattern::new(m).unwrap());
                let word = fi.encode();
                assert_eq!(FormatInfo::decode(word, word), Some(fi));
                assert_eq!(FormatInfo::decode(word ^ 0b101, 0), Some(fi));
                assert_eq!(FormatInfo::decode(0x7fff, word ^ 0b1_0000_0100_0001), Some(fi));
            }
        }
    }

    #[test]
    fn test_decode_too_many_errors() {
        let fi = FormatInfo::new(ECLevel::Q, MaskPattern::new(2).unwrap());
        let word = fi.encode();
        let bad = word ^ 0b1111;
        let res = FormatInfo::decode(bad, bad);
        assert_ne!(res, Some(fi));
    }
}

// Global constants
//------------------------------------------------------------------------------

pub const FORMAT_INFO_BIT_LEN: usize = 15;
pub const FORMAT_ERROR_CAPACITY: u32 = 3;
pub const FORMAT_MASK: u32 = 0x5412;
const FORMAT_GENERATOR: u32 = 0x537;

pub const VERSION_INFO_BIT_LEN: usize = 18;
pub const VERSION_ERROR_CAPACITY: u32 = 3;
const VERSION_GENERATOR: u32 = 0x1F25;

/// Masked format words indexed by their 5 data bits
pub static FORMAT_INFOS_QR: LazyLock<[u32; 32]> = LazyLock::new(|| {
    let mut res = [0; 32];
    for (data, word) in res.iter_mut().enumerate() {
        let data = data as u32;
        *word = ((data << 10) | bch_remainder(data, FORMAT_GENERATOR)) ^ FORMAT_MASK;
    }
    res
});

// Coordinates are (row, column) listed from the most significant bit. Negative values
// count from the far edge.
pub static FORMAT_INFO_COORDS_QR_MAIN: [(i16, i16); 15] = [
    (8, 0),
    (8, 1),
    (8, 2),
    (8, 3),
    (8, 4),
    (8, 5),
    (8, 7),
    (8, 8),
    (7, 8),
    (5, 8),
    (4, 8),
    (3, 8),
    (2, 8),
    (1, 8),
    (0, 8),
];

pub static FORMAT_INFO_COORDS_QR_SIDE: [(i16, i16); 15] = [
    (-1, 8),
    (-2, 8),
    (-3, 8),
    (-4, 8),
    (-5, 8),
    (-6, 8),
    (-7, 8),
    (8, -8),
    (8, -7),
    (8, -6),
    (8, -5),
    (8, -4),
    (8, -3),
    (8, -2),
    (8, -1),
];

pub static VERSION_INFO_COORDS_BL: [(i16, i16); 18] = [
    (-9, 5),
    (-10, 5),
    (-11, 5),
    (-9, 4),
    (-10, 4),
    (-11, 4),
    (-9, 3),
    (-10, 3),
    (-11, 3),
    (-9, 2),
    (-10, 2),
    (-11, 2),
    (-9, 1),
    (-10, 1),
    (-11, 1),
    (-9, 0),
    (-10, 0),
    (-11, 0),
];

pub static VERSION_INFO_COORDS_TR: [(i16, i16); 18] = [
    (5, -9),
    (5, -10),
    (5, -11),
    (4, -9),
    (4, -10),
    (4, -11),
    (3, -9),
    (3, -10),
    (3, -11),
    (2, -9),
    (2, -10),
    (2, -11),
    (1, -9),
    (1, -10),
    (1, -11),
    (0, -9),
    (0, -10),
    (0, -11),
];

static ALIGNMENT_PATTERN_POSITIONS: LazyLock<Vec<Vec<usize>>> = LazyLock::new(|| {
    let mut res = vec![Vec::new(); 41];
    for (v, poses) in res.iter_mut().enumerate().skip(2) {
        let n = v / 7 + 2;
        let step = (v * 8 + n * 3 + 5) / (n * 4 - 4) * 2;
        let size = v * 4 + 17;
        poses.push(6);
        poses.extend((0..n - 1).rev().map(|i| size - 7 - i * step));
    }
    res
});

static ECC_CODEWORDS_PER_BLOCK: [[usize; 41]; 4] = [
    [
        0, 7, 10, 15, 20, 26, 18, 20, 24, 30, 18, 20, 24, 26, 30, 22, 24, 28, 30, 28, 28, 28, 28,
        30, 30, 26, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
    [
        0, 10, 16, 26, 18, 24, 16, 18, 22, 22, 26, 30, 22, 22, 24, 24, 28, 28, 26, 26, 26, 26, 28,
        28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28,
    ],
    [
        0, 13, 22, 18, 26, 18, 24, 18, 22, 20, 24, 28, 26, 24, 20, 30, 24, 28, 28, 26, 30, 28, 30,
        30, 30, 30, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
    [
        0, 17, 28, 22, 16, 22, 28, 26, 26, 24, 28, 24, 28, 22, 24, 24, 30, 28, 28, 26, 28, 30, 24,
        30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
];

static NUM_ERROR_CORRECTION_BLOCKS: [[usize; 41]; 4] = [
    [
        0, 1, 1, 1, 1, 1, 2, 2, 2, 2, 4, 4, 4, 4, 4, 6, 6, 6, 6, 7, 8, 8, 9, 9, 10, 12, 12, 12, 13,
        14, 15, 16, 17, 18, 19, 19, 20, 21, 22, 24, 25,
    ],
    [
        0, 1, 1, 1, 2, 2, 4, 4, 4, 5, 5, 5, 8, 9, 9, 10, 10, 11, 13, 14, 16, 17, 17, 18, 20, 21,
        23, 25, 26, 28, 29, 31, 33, 35, 37, 38, 40, 43, 45, 47, 49,
    ],
    [
        0, 1, 1, 2, 2, 4, 4, 6, 6, 8, 8, 8, 10, 12, 16, 12, 17, 16, 18, 21, 20, 23, 23, 25, 27, 29,
        34, 34, 35, 38, 40, 43, 45, 48, 51, 53, 56, 59, 62, 65, 68,
    ],
    [
        0, 1, 1, 2, 4, 4, 4, 5, 6, 8, 8, 11, 11, 16, 16, 18, 16, 19, 21, 25, 25, 25, 34, 30, 32,
        35, 37, 40, 42, 45, 48, 51, 54, 57, 60, 63, 66, 70, 74, 77, 81,
    ],
];
