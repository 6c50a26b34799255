use log::trace;

use super::{record_pattern, scan_runs, OneDReader};
use crate::common::{
    bit_array::BitArray,
    error::{BarcodeError, BarcodeResult},
    format::BarcodeFormat,
    hints::DecodeHints,
    point::Point,
    result::{DecodedBarcode, MetadataValue, ResultMetadataKey},
};

// Code 39 tables
//------------------------------------------------------------------------------

pub(crate) const ALPHABET: &[u8; 43] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ-. $/+%";

/// Nine element patterns of the alphabet. Bits from the most significant of nine mark
/// wide bars and spaces, exactly three per character.
pub(crate) const CHARACTER_ENCODINGS: [u32; 43] = [
    0x034, 0x121, 0x061, 0x160, 0x031, 0x130, 0x070, 0x025, 0x124, 0x064, // 0-9
    0x109, 0x049, 0x148, 0x019, 0x118, 0x058, 0x00D, 0x10C, 0x04C, 0x01C, // A-J
    0x103, 0x043, 0x142, 0x013, 0x112, 0x052, 0x007, 0x106, 0x046, 0x016, // K-T
    0x181, 0x0C1, 0x1C0, 0x091, 0x190, 0x0D0, 0x085, 0x184, 0x0C4, 0x0A8, // U-$
    0x0A2, 0x08A, 0x02A, // /-%
];

pub(crate) const ASTERISK_ENCODING: u32 = 0x094;

// Code 39 reader
//------------------------------------------------------------------------------

/// Reads Code 39, optionally with a trailing mod 43 check character and the full ASCII
/// extension
pub struct Code39Reader {
    using_check_digit: bool,
    extended_mode: bool,
    counters: [usize; 9],
}

impl Code39Reader {
    pub fn new(using_check_digit: bool, extended_mode: bool) -> Self {
        Self { using_check_digit, extended_mode, counters: [0; 9] }
    }
}

impl Default for Code39Reader {
    fn default() -> Self {
        Self::new(false, false)
    }
}

impl OneDReader for Code39Reader {
    fn decode_row(
        &mut self,
        row_number: usize,
        row: &BitArray,
        _hints: &DecodeHints,
    ) -> BarcodeResult<DecodedBarcode> {
        let start = find_asterisk_pattern(row, &mut self.counters)?;
        let end = row.size();
        let mut next_start = row.next_set(start[1]);

        let mut result = String::with_capacity(20);
        let mut last_start;
        loop {
            record_pattern(row, next_start, &mut self.counters)?;
            let pattern = to_narrow_wide_pattern(&self.counters).ok_or(BarcodeError::NotFound)?;
            let decoded = pattern_to_char(pattern)?;
            result.push(decoded);
            last_start = next_start;
            next_start += self.counters.iter().sum::<usize>();
            next_start = row.next_set(next_start);
            if decoded == '*' {
                break;
            }
        }
        result.pop();

        // Trailing quiet zone of at least half the last character
        let last_pattern_size = self.counters.iter().sum::<usize>();
        let white_space_after_end = next_start - last_start - last_pattern_size;
        if next_start != end && white_space_after_end * 2 < last_pattern_size {
            return Err(BarcodeError::NotFound);
        }

        if self.using_check_digit {
            let Some(check) = result.pop() else {
                return Err(BarcodeError::NotFound);
            };
            let total = result.bytes().filter_map(alphabet_index).sum::<usize>();
            if check as u8 != ALPHABET[total % 43] {
                return Err(BarcodeError::Checksum);
            }
        }

        if result.is_empty() {
            return Err(BarcodeError::NotFound);
        }

        let text = if self.extended_mode { decode_extended(&result)? } else { result };
        trace!("Decoded Code 39 {text} on row {row_number}");

        let y = row_number as f32;
        let left = (start[1] + start[0]) as f32 / 2.0;
        let right = last_start as f32 + last_pattern_size as f32 / 2.0;
        let mut res = DecodedBarcode::new(
            text,
            None,
            vec![Point::new(left, y), Point::new(right, y)],
            BarcodeFormat::Code39,
        );
        res.put_metadata(ResultMetadataKey::SymbologyIdentifier, MetadataValue::Text("]A0".into()));
        Ok(res)
    }
}

fn alphabet_index(c: u8) -> Option<usize> {
    ALPHABET.iter().position(|&a| a == c)
}

fn find_asterisk_pattern(row: &BitArray, counters: &mut [usize; 9]) -> BarcodeResult<[usize; 2]> {
    scan_runs(row, 0, false, counters, |counters, start, end| {
        if to_narrow_wide_pattern(counters) != Some(ASTERISK_ENCODING) {
            return Ok(None);
        }
        // Look for whitespace before start pattern, at least half the width of the pattern
        let quiet_start = start.saturating_sub((end - start) / 2);
        Ok(row.is_range(quiet_start, start, false)?.then_some([start, end]))
    })
}

/// Classifies the runs as narrow or wide, succeeding only when exactly three are wide
/// and no wide run takes half of the total wide width
pub(crate) fn to_narrow_wide_pattern(counters: &[usize]) -> Option<u32> {
    let num_counters = counters.len();
    let mut max_narrow_counter = 0;
    loop {
        let min_counter = counters
            .iter()
            .copied()
            .filter(|&c| c > max_narrow_counter)
            .min()
            .unwrap_or(usize::MAX);
        max_narrow_counter = min_counter;

        let mut wide_counters = 0;
        let mut total_wide_width = 0;
        let mut pattern = 0;
        for (i, &counter) in counters.iter().enumerate() {
            if counter > max_narrow_counter {
                pattern |= 1 << (num_counters - 1 - i);
                wide_counters += 1;
                total_wide_width += counter;
            }
        }

        if wide_counters == 3 {
            let balanced = counters
                .iter()
                .filter(|&&c| c > max_narrow_counter)
                .all(|&c| c * 2 < total_wide_width);
            return balanced.then_some(pattern);
        }
        if wide_counters <= 3 {
            return None;
        }
    }
}

fn pattern_to_char(pattern: u32) -> BarcodeResult<char> {
    if pattern == ASTERISK_ENCODING {
        return Ok('*');
    }
    CHARACTER_ENCODINGS
        .iter()
        .position(|&e| e == pattern)
        .map(|i| char::from(ALPHABET[i]))
        .ok_or(BarcodeError::NotFound)
}

/// Resolves the two character full ASCII sequences introduced by `+`, `$`, `%` and `/`
pub(crate) fn decode_extended(encoded: &str) -> BarcodeResult<String> {
    let bytes = encoded.as_bytes();
    let mut decoded = String::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if !matches!(c, b'+' | b'$' | b'%' | b'/') {
            decoded.push(char::from(c));
            i += 1;
            continue;
        }
        let next = *bytes.get(i + 1).ok_or(BarcodeError::Format)?;
        let ch = match (c, next) {
            // +A to +Z map to a to z
            (b'+', b'A'..=b'Z') => next + 32,
            // $A to $Z map to control codes SH to SB
            (b'$', b'A'..=b'Z') => next - 64,
            // %A to %E map to control codes ESC to US
            (b'%', b'A'..=b'E') => next - 38,
            // %F to %J map to ; < = > ?
            (b'%', b'F'..=b'J') => next - 11,
            // %K to %O map to [ \ ] ^ _
            (b'%', b'K'..=b'O') => next + 16,
            // %P to %T map to { | } ~ DEL
            (b'%', b'P'..=b'T') => next + 43,
            (b'%', b'U') => 0,
            (b'%', b'V') => b'@',
            (b'%', b'W') => b'`',
            (b'%', b'X'..=b'Z') => 127,
            // /A to /O map to ! to , and /
            (b'/', b'A'..=b'O') => next - 32,
            (b'/', b'Z') => b':',
            _ => return Err(BarcodeError::Format),
        };
        decoded.push(char::from(ch));
        i += 2;
    }
    Ok(decoded)
}
