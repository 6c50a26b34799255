use log::trace;

use super::{pattern_match_variance, record_pattern, scan_runs, OneDReader};
use crate::common::{
    bit_array::BitArray,
    error::{BarcodeError, BarcodeResult},
    format::BarcodeFormat,
    hints::DecodeHints,
    point::Point,
    result::{DecodedBarcode, MetadataValue, ResultMetadataKey},
};

// UPC/EAN tables
//------------------------------------------------------------------------------

const MAX_AVG_VARIANCE: f32 = 0.48;
const MAX_INDIVIDUAL_VARIANCE: f32 = 0.7;

pub(crate) const START_END_PATTERN: [usize; 3] = [1, 1, 1];
pub(crate) const MIDDLE_PATTERN: [usize; 5] = [1, 1, 1, 1, 1];
pub(crate) const UPCE_END_PATTERN: [usize; 6] = [1, 1, 1, 1, 1, 1];

/// Odd parity digit patterns, as light-dark-light-dark runs
pub(crate) const L_PATTERNS: [[usize; 4]; 10] = [
    [3, 2, 1, 1],
    [2, 2, 2, 1],
    [2, 1, 2, 2],
    [1, 4, 1, 1],
    [1, 1, 3, 2],
    [1, 2, 3, 1],
    [1, 1, 1, 4],
    [1, 3, 1, 2],
    [1, 2, 1, 3],
    [3, 1, 1, 2],
];

/// L patterns followed by the even parity G patterns, which are the L patterns reversed
pub(crate) const L_AND_G_PATTERNS: [[usize; 4]; 20] = [
    [3, 2, 1, 1],
    [2, 2, 2, 1],
    [2, 1, 2, 2],
    [1, 4, 1, 1],
    [1, 1, 3, 2],
    [1, 2, 3, 1],
    [1, 1, 1, 4],
    [1, 3, 1, 2],
    [1, 2, 1, 3],
    [3, 1, 1, 2],
    [1, 1, 2, 3],
    [1, 2, 2, 2],
    [2, 2, 1, 2],
    [1, 1, 4, 1],
    [2, 3, 1, 1],
    [1, 3, 2, 1],
    [4, 1, 1, 1],
    [2, 1, 3, 1],
    [3, 1, 2, 1],
    [2, 1, 1, 3],
];

/// Parity of the six left hand digits of EAN-13 for each implied first digit. A set bit
/// (from the most significant of six) marks a G pattern.
pub(crate) const FIRST_DIGIT_ENCODINGS: [u32; 10] =
    [0x00, 0x0B, 0x0D, 0x0E, 0x13, 0x19, 0x1C, 0x15, 0x16, 0x1A];

/// UPC-E parities by number system and check digit
pub(crate) const NUMSYS_AND_CHECK_DIGIT_PATTERNS: [[u32; 10]; 2] = [
    [0x38, 0x34, 0x32, 0x31, 0x2C, 0x26, 0x23, 0x2A, 0x29, 0x25],
    [0x07, 0x0B, 0x0D, 0x0E, 0x13, 0x19, 0x1C, 0x15, 0x16, 0x1A],
];

// Checksum
//------------------------------------------------------------------------------

/// Check digit of a digit string, weighting digits 3 and 1 alternately from the right
pub(crate) fn standard_checksum(s: &str) -> BarcodeResult<u32> {
    let mut sum = 0;
    for (i, b) in s.bytes().rev().enumerate() {
        if !b.is_ascii_digit() {
            return Err(BarcodeError::Format);
        }
        let digit = (b - b'0') as u32;
        sum += if i % 2 == 0 { digit * 3 } else { digit };
    }
    Ok((10 - sum % 10) % 10)
}

/// Verifies the trailing check digit of `s`
pub(crate) fn check_standard_checksum(s: &str) -> BarcodeResult<bool> {
    let Some(last) = s.bytes().last() else {
        return Ok(false);
    };
    if !last.is_ascii_digit() {
        return Err(BarcodeError::Format);
    }
    Ok(standard_checksum(&s[..s.len() - 1])? == (last - b'0') as u32)
}

/// Expands a zero suppressed UPC-E number (with or without check digit) to its UPC-A form
pub(crate) fn convert_upce_to_upca(upce: &str) -> String {
    let b = upce.as_bytes();
    if b.len() < 7 {
        return upce.to_string();
    }
    let digits = &upce[1..7];
    let mut res = String::with_capacity(12);
    res.push(char::from(b[0]));
    match b[6] {
        d @ b'0'..=b'2' => {
            res.push_str(&digits[..2]);
            res.push(char::from(d));
            res.push_str("0000");
            res.push_str(&digits[2..5]);
        }
        b'3' => {
            res.push_str(&digits[..3]);
            res.push_str("00000");
            res.push_str(&digits[3..5]);
        }
        b'4' => {
            res.push_str(&digits[..4]);
            res.push_str("00000");
            res.push_str(&digits[4..5]);
        }
        d => {
            res.push_str(&digits[..5]);
            res.push_str("0000");
            res.push(char::from(d));
        }
    }
    if let Some(&check) = b.get(7) {
        res.push(char::from(check));
    }
    res
}

// Guards and digits
//------------------------------------------------------------------------------

/// Finds the first start guard preceded by a quiet zone at least as wide as itself
pub(crate) fn find_start_guard_pattern(row: &BitArray) -> BarcodeResult<[usize; 2]> {
    let mut counters = [0; START_END_PATTERN.len()];
    let mut next_start = 0;
    loop {
        let range = find_guard_pattern(row, next_start, false, &START_END_PATTERN, &mut counters)?;
        let [start, end] = range;
        next_start = end;
        if let Some(quiet_start) = (2 * start).checked_sub(end) {
            if row.is_range(quiet_start, start, false)? {
                return Ok(range);
            }
        }
    }
}

pub(crate) fn find_guard_pattern(
    row: &BitArray,
    row_offset: usize,
    white_first: bool,
    pattern: &[usize],
    counters: &mut [usize],
) -> BarcodeResult<[usize; 2]> {
    scan_runs(row, row_offset, white_first, counters, |counters, start, end| {
        let matched = pattern_match_variance(counters, pattern, MAX_INDIVIDUAL_VARIANCE)
            < MAX_AVG_VARIANCE;
        Ok(matched.then_some([start, end]))
    })
}

/// Index of the closest pattern for the four runs starting at `row_offset`
pub(crate) fn decode_digit(
    row: &BitArray,
    counters: &mut [usize; 4],
    row_offset: usize,
    patterns: &[[usize; 4]],
) -> BarcodeResult<usize> {
    record_pattern(row, row_offset, counters)?;
    let mut best_variance = MAX_AVG_VARIANCE;
    let mut best_match = None;
    for (i, pattern) in patterns.iter().enumerate() {
        let variance = pattern_match_variance(counters, pattern, MAX_INDIVIDUAL_VARIANCE);
        if variance < best_variance {
            best_variance = variance;
            best_match = Some(i);
        }
    }
    best_match.ok_or(BarcodeError::NotFound)
}

fn push_digit(result: &mut String, digit: usize) {
    result.push(char::from(b'0' + (digit % 10) as u8));
}

// UPC/EAN reader
//------------------------------------------------------------------------------

/// Shared decoding of the UPC/EAN family. Implementors read the digits between the
/// guards; locating the guards, checking the quiet zone and the checksum are common.
pub trait UpcEanReader {
    fn format(&self) -> BarcodeFormat;

    /// Appends the digits after the start guard to `result` and returns the offset just
    /// past the last digit
    fn decode_middle(
        &mut self,
        row: &BitArray,
        start_range: [usize; 2],
        result: &mut String,
    ) -> BarcodeResult<usize>;

    fn decode_end(&self, row: &BitArray, end_start: usize) -> BarcodeResult<[usize; 2]> {
        let mut counters = [0; START_END_PATTERN.len()];
        find_guard_pattern(row, end_start, false, &START_END_PATTERN, &mut counters)
    }

    fn check_checksum(&self, s: &str) -> BarcodeResult<bool> {
        check_standard_checksum(s)
    }

    /// Decodes a row whose start guard was already located, so several readers can share
    /// one guard search
    fn decode_row_with_start(
        &mut self,
        row_number: usize,
        row: &BitArray,
        start_range: [usize; 2],
        hints: &DecodeHints,
    ) -> BarcodeResult<DecodedBarcode> {
        let y = row_number as f32;
        hints.notify_point(Point::new((start_range[0] + start_range[1]) as f32 / 2.0, y));

        let mut result = String::with_capacity(20);
        let end_start = self.decode_middle(row, start_range, &mut result)?;
        hints.notify_point(Point::new(end_start as f32, y));

        let end_range = self.decode_end(row, end_start)?;
        hints.notify_point(Point::new((end_range[0] + end_range[1]) as f32 / 2.0, y));

        // Quiet zone after the end guard, as wide as the guard
        let end = end_range[1];
        let quiet_end = 2 * end - end_range[0];
        if quiet_end >= row.size() || !row.is_range(end, quiet_end, false)? {
            return Err(BarcodeError::NotFound);
        }

        if result.len() < 8 {
            return Err(BarcodeError::Format);
        }
        if !self.check_checksum(&result)? {
            return Err(BarcodeError::Checksum);
        }

        let left = (start_range[0] + start_range[1]) as f32 / 2.0;
        let right = (end_range[0] + end_range[1]) as f32 / 2.0;
        let format = self.format();
        trace!("Decoded {format} {result} on row {row_number}");

        let mut res = DecodedBarcode::new(
            result,
            None,
            vec![Point::new(left, y), Point::new(right, y)],
            format,
        );
        let modifier = if format == BarcodeFormat::Ean8 { 4 } else { 0 };
        res.put_metadata(
            ResultMetadataKey::SymbologyIdentifier,
            MetadataValue::Text(format!("]E{modifier}")),
        );
        Ok(res)
    }
}

#[derive(Default)]
pub struct Ean13Reader {
    counters: [usize; 4],
}

impl Ean13Reader {
    pub fn new() -> Self {
        Self::default()
    }
}

// The first digit is implied by the parity pattern of the next six
fn determine_first_digit(result: &mut String, lg_pattern_found: u32) -> BarcodeResult<()> {
    let d = FIRST_DIGIT_ENCODINGS
        .iter()
        .position(|&p| p == lg_pattern_found)
        .ok_or(BarcodeError::NotFound)?;
    result.insert(0, char::from(b'0' + d as u8));
    Ok(())
}

impl UpcEanReader for Ean13Reader {
    fn format(&self) -> BarcodeFormat {
        BarcodeFormat::Ean13
    }

    fn decode_middle(
        &mut self,
        row: &BitArray,
        start_range: [usize; 2],
        result: &mut String,
    ) -> BarcodeResult<usize> {
        let end = row.size();
        let mut row_offset = start_range[1];

        let mut lg_pattern_found = 0;
        for x in 0..6 {
            if row_offset >= end {
                break;
            }
            let best = decode_digit(row, &mut self.counters, row_offset, &L_AND_G_PATTERNS)?;
            push_digit(result, best);
            row_offset += self.counters.iter().sum::<usize>();
            if best >= 10 {
                lg_pattern_found |= 1 << (5 - x);
            }
        }
        determine_first_digit(result, lg_pattern_found)?;

        let mut guard = [0; MIDDLE_PATTERN.len()];
        row_offset = find_guard_pattern(row, row_offset, true, &MIDDLE_PATTERN, &mut guard)?[1];

        for _ in 0..6 {
            if row_offset >= end {
                break;
            }
            let best = decode_digit(row, &mut self.counters, row_offset, &L_PATTERNS)?;
            push_digit(result, best);
            row_offset += self.counters.iter().sum::<usize>();
        }
        Ok(row_offset)
    }
}

#[derive(Default)]
pub struct Ean8Reader {
    counters: [usize; 4],
}

impl Ean8Reader {
    pub fn new() -> Self {
        Self::default()
    }

    fn decode_half(
        &mut self,
        row: &BitArray,
        mut row_offset: usize,
        result: &mut String,
    ) -> BarcodeResult<usize> {
        for _ in 0..4 {
            if row_offset >= row.size() {
                break;
            }
            let best = decode_digit(row, &mut self.counters, row_offset, &L_PATTERNS)?;
            push_digit(result, best);
            row_offset += self.counters.iter().sum::<usize>();
        }
        Ok(row_offset)
    }
}

impl UpcEanReader for Ean8Reader {
    fn format(&self) -> BarcodeFormat {
        BarcodeFormat::Ean8
    }

    fn decode_middle(
        &mut self,
        row: &BitArray,
        start_range: [usize; 2],
        result: &mut String,
    ) -> BarcodeResult<usize> {
        let row_offset = self.decode_half(row, start_range[1], result)?;
        let mut guard = [0; MIDDLE_PATTERN.len()];
        let middle = find_guard_pattern(row, row_offset, true, &MIDDLE_PATTERN, &mut guard)?;
        self.decode_half(row, middle[1], result)
    }
}

/// UPC-A is read as EAN-13 and accepted when the implied first digit is 0
#[derive(Default)]
pub struct UpcAReader {
    ean13: Ean13Reader,
}

impl UpcAReader {
    pub fn new() -> Self {
        Self::default()
    }
}

fn ean13_to_upca(res: DecodedBarcode) -> BarcodeResult<DecodedBarcode> {
    match res.text().strip_prefix('0') {
        Some(upca) => {
            let upca = upca.to_string();
            Ok(res.into_format(upca, BarcodeFormat::UpcA))
        }
        None => Err(BarcodeError::Format),
    }
}

impl UpcEanReader for UpcAReader {
    fn format(&self) -> BarcodeFormat {
        BarcodeFormat::UpcA
    }

    fn decode_middle(
        &mut self,
        row: &BitArray,
        start_range: [usize; 2],
        result: &mut String,
    ) -> BarcodeResult<usize> {
        self.ean13.decode_middle(row, start_range, result)
    }

    fn decode_row_with_start(
        &mut self,
        row_number: usize,
        row: &BitArray,
        start_range: [usize; 2],
        hints: &DecodeHints,
    ) -> BarcodeResult<DecodedBarcode> {
        ean13_to_upca(self.ean13.decode_row_with_start(row_number, row, start_range, hints)?)
    }
}

#[derive(Default)]
pub struct UpcEReader {
    counters: [usize; 4],
}

impl UpcEReader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UpcEanReader for UpcEReader {
    fn format(&self) -> BarcodeFormat {
        BarcodeFormat::UpcE
    }

    fn decode_middle(
        &mut self,
        row: &BitArray,
        start_range: [usize; 2],
        result: &mut String,
    ) -> BarcodeResult<usize> {
        let end = row.size();
        let mut row_offset = start_range[1];

        let mut lg_pattern_found = 0;
        for x in 0..6 {
            if row_offset >= end {
                break;
            }
            let best = decode_digit(row, &mut self.counters, row_offset, &L_AND_G_PATTERNS)?;
            push_digit(result, best);
            row_offset += self.counters.iter().sum::<usize>();
            if best >= 10 {
                lg_pattern_found |= 1 << (5 - x);
            }
        }

        // Number system and check digit are carried by the parities
        let (num_sys, check) = (0..2)
            .flat_map(|n| (0..10).map(move |d| (n, d)))
            .find(|&(n, d)| NUMSYS_AND_CHECK_DIGIT_PATTERNS[n][d] == lg_pattern_found)
            .ok_or(BarcodeError::NotFound)?;
        result.insert(0, char::from(b'0' + num_sys as u8));
        result.push(char::from(b'0' + check as u8));
        Ok(row_offset)
    }

    fn decode_end(&self, row: &BitArray, end_start: usize) -> BarcodeResult<[usize; 2]> {
        let mut counters = [0; UPCE_END_PATTERN.len()];
        find_guard_pattern(row, end_start, true, &UPCE_END_PATTERN, &mut counters)
    }

    fn check_checksum(&self, s: &str) -> BarcodeResult<bool> {
        check_standard_checksum(&convert_upce_to_upca(s))
    }
}

macro_rules! impl_one_d_for_upc_ean {
    ($($reader:ty),*) => {
        $(
            impl OneDReader for $reader {
                fn decode_row(
                    &mut self,
                    row_number: usize,
                    row: &BitArray,
                    hints: &DecodeHints,
                ) -> BarcodeResult<DecodedBarcode> {
                    let start_range = find_start_guard_pattern(row)?;
                    self.decode_row_with_start(row_number, row, start_range, hints)
                }
            }
        )*
    };
}

impl_one_d_for_upc_ean!(Ean13Reader, Ean8Reader, UpcAReader, UpcEReader);

// Multi format UPC/EAN reader
//------------------------------------------------------------------------------

enum UpcEanKind {
    Ean13(Ean13Reader),
    Ean8(Ean8Reader),
    UpcE(UpcEReader),
}

impl UpcEanKind {
    fn reader(&mut self) -> &mut dyn UpcEanReader {
        match self {
            Self::Ean13(r) => r,
            Self::Ean8(r) => r,
            Self::UpcE(r) => r,
        }
    }
}

/// Reads every enabled UPC/EAN format with a single start guard search per row. UPC-A
/// symbols are found by the EAN-13 reader.
pub struct MultiFormatUpcEanReader {
    readers: Vec<UpcEanKind>,
    // Report EAN-13 with a leading zero as UPC-A
    prefer_upca: bool,
}

impl MultiFormatUpcEanReader {
    pub fn new(hints: &DecodeHints) -> Self {
        let mut readers = Vec::new();
        if let Some(formats) = &hints.possible_formats {
            if formats.contains(&BarcodeFormat::Ean13) || formats.contains(&BarcodeFormat::UpcA) {
                readers.push(UpcEanKind::Ean13(Ean13Reader::new()));
            }
            if formats.contains(&BarcodeFormat::Ean8) {
                readers.push(UpcEanKind::Ean8(Ean8Reader::new()));
            }
            if formats.contains(&BarcodeFormat::UpcE) {
                readers.push(UpcEanKind::UpcE(UpcEReader::new()));
            }
        }
        if readers.is_empty() {
            readers = vec![
                UpcEanKind::Ean13(Ean13Reader::new()),
                UpcEanKind::Ean8(Ean8Reader::new()),
                UpcEanKind::UpcE(UpcEReader::new()),
            ];
        }

        let prefer_upca = match &hints.possible_formats {
            Some(f) => f.contains(&BarcodeFormat::UpcA) && !f.contains(&BarcodeFormat::Ean13),
            None => true,
        };
        Self { readers, prefer_upca }
    }
}

impl OneDReader for MultiFormatUpcEanReader {
    fn decode_row(
        &mut self,
        row_number: usize,
        row: &BitArray,
        hints: &DecodeHints,
    ) -> BarcodeResult<DecodedBarcode> {
        let start_range = find_start_guard_pattern(row)?;
        for reader in self.readers.iter_mut() {
            let decoded =
                reader.reader().decode_row_with_start(row_number, row, start_range, hints);
            let Ok(res) = decoded else { continue };
            if res.format() == BarcodeFormat::Ean13
                && self.prefer_upca
                && res.text().starts_with('0')
            {
                return ean13_to_upca(res);
            }
            return Ok(res);
        }
        Err(BarcodeError::NotFound)
    }
}

#[cfg(test)]
mod upc_ean_reader_tests {
    use test_case::test_case;

    use super::{
        check_standard_checksum, convert_upce_to_upca, standard_checksum, Ean13Reader,
        Ean8Reader, MultiFormatUpcEanReader, UpcAReader, UpcEReader,
    };
    use crate::common::{format::BarcodeFormat, hints::DecodeHints, result::ResultMetadataKey};
    use crate::reader::oned::{row_from_str, OneDReader};

    const EAN13_5901234123457: &str = "00001010001011010011101100110010011011110100111010101011001101101100100001010111001001110100010010100000";
    const EAN8_96385074: &str = "0000000001010001011010111101111010110111010101001110111001010001001011100101000000000";
    const UPCE_05096893: &str = "000000000101011100101001110001011010111101101110010111010101000000000";
    const UPCE_15096890: &str = "000000000101011000100011010001011000010100010010010111010101000000000";

    #[test_case("590123412345", 7)]
    #[test_case("9638507", 4)]
    #[test_case("03600029145", 2)]
    fn test_standard_checksum(digits: &str, exp: u32) {
        assert_eq!(standard_checksum(digits).unwrap(), exp);
        assert!(check_standard_checksum(&format!("{digits}{exp}")).unwrap());
        assert!(!check_standard_checksum(&format!("{digits}{}", (exp + 1) % 10)).unwrap());
    }

    #[test]
    fn test_checksum_rejects_non_digits() {
        assert!(standard_checksum("12a4").is_err());
        assert!(check_standard_checksum("123x").is_err());
        assert!(!check_standard_checksum("").unwrap());
    }

    #[test_case("01234565", "012345000065")]
    #[test_case("01234133", "012300000413")]
    #[test_case("01234146", "012340000016")]
    #[test_case("05096893", "050968000093")]
    #[test_case("0509689", "05096800009")]
    fn test_convert_upce_to_upca(upce: &str, exp: &str) {
        assert_eq!(convert_upce_to_upca(upce), exp);
    }

    #[test]
    fn test_ean13_decode_row() {
        let row = row_from_str(EAN13_5901234123457);
        let res = Ean13Reader::new().decode_row(0, &row, &DecodeHints::new()).unwrap();
        assert_eq!(res.text(), "5901234123457");
        assert_eq!(res.format(), BarcodeFormat::Ean13);
        assert_eq!(res.points().len(), 2);
        assert_eq!(
            res.metadata_value(ResultMetadataKey::SymbologyIdentifier).unwrap().as_text(),
            Some("]E0")
        );
    }

    #[test]
    fn test_ean13_reversed_row_fails() {
        let mut row = row_from_str(EAN13_5901234123457);
        row.reverse();
        assert!(Ean13Reader::new().decode_row(0, &row, &DecodeHints::new()).is_err());
    }

    #[test]
    fn test_ean8_decode_row() {
        let row = row_from_str(EAN8_96385074);
        let res = Ean8Reader::new().decode_row(0, &row, &DecodeHints::new()).unwrap();
        assert_eq!(res.text(), "96385074");
        assert_eq!(
            res.metadata_value(ResultMetadataKey::SymbologyIdentifier).unwrap().as_text(),
            Some("]E4")
        );
    }

    #[test]
    fn test_upca_requires_leading_zero() {
        let row = row_from_str(EAN13_5901234123457);
        assert!(UpcAReader::new().decode_row(0, &row, &DecodeHints::new()).is_err());
    }

    // Odd and even digit parities pick the number system and the check digit
    #[test_case(UPCE_05096893, "05096893")]
    #[test_case(UPCE_15096890, "15096890")]
    fn test_upce_decode_row(bars: &str, exp: &str) {
        let row = row_from_str(bars);
        let res = UpcEReader::new().decode_row(0, &row, &DecodeHints::new()).unwrap();
        assert_eq!(res.text(), exp);
        assert_eq!(res.format(), BarcodeFormat::UpcE);
        assert_eq!(
            res.metadata_value(ResultMetadataKey::SymbologyIdentifier).unwrap().as_text(),
            Some("]E0")
        );
    }

    #[test]
    fn test_upce_needs_quiet_zone_after_end_guard() {
        // Five light modules are narrower than the six module end guard
        let bars = UPCE_05096893.trim_end_matches('0').to_string() + "00000";
        let row = row_from_str(&bars);
        assert!(UpcEReader::new().decode_row(0, &row, &DecodeHints::new()).is_err());
    }

    #[test]
    fn test_upce_rejects_ean13() {
        let row = row_from_str(EAN13_5901234123457);
        assert!(UpcEReader::new().decode_row(0, &row, &DecodeHints::new()).is_err());
    }

    #[test]
    fn test_multi_format_prefers_ean13_without_leading_zero() {
        let row = row_from_str(EAN13_5901234123457);
        let hints = DecodeHints::new();
        let res = MultiFormatUpcEanReader::new(&hints).decode_row(0, &row, &hints).unwrap();
        assert_eq!(res.format(), BarcodeFormat::Ean13);

        let row = row_from_str(EAN8_96385074);
        let res = MultiFormatUpcEanReader::new(&hints).decode_row(0, &row, &hints).unwrap();
        assert_eq!(res.format(), BarcodeFormat::Ean8);
    }
}
