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

// Code 93 tables
//------------------------------------------------------------------------------

/// Alphabet followed by the four shift characters, written here as `a` to `d`, and the
/// start/stop character
pub(crate) const ALPHABET: &[u8; 48] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ-. $/+%abcd*";

/// Nine module patterns, most significant bit first, each with three bars and three spaces
pub(crate) const CHARACTER_ENCODINGS: [u32; 48] = [
    0x114, 0x148, 0x144, 0x142, 0x128, 0x124, 0x122, 0x150, 0x112, 0x10A, // 0-9
    0x1A8, 0x1A4, 0x1A2, 0x194, 0x192, 0x18A, 0x168, 0x164, 0x162, 0x134, // A-J
    0x11A, 0x158, 0x14C, 0x146, 0x12C, 0x116, 0x1B4, 0x1B2, 0x1AC, 0x1A6, // K-T
    0x196, 0x19A, 0x16C, 0x166, 0x136, 0x13A, // U-Z
    0x12E, 0x1D4, 0x1D2, 0x1CA, 0x16E, 0x176, 0x1AE, // Punctuation
    0x126, 0x1DA, 0x1D6, 0x132, 0x15E, // Control chars and start/stop
];

pub(crate) const ASTERISK_ENCODING: u32 = CHARACTER_ENCODINGS[47];

/// Index of the check character over `contents`, with weights cycling up to `max_weight`
/// from the right
pub(crate) fn checksum_index(contents: &[u8], max_weight: usize) -> BarcodeResult<usize> {
    let mut weight = 1;
    let mut total = 0;
    for &c in contents.iter().rev() {
        let idx = ALPHABET.iter().position(|&a| a == c).ok_or(BarcodeError::Format)?;
        total += idx * weight;
        weight += 1;
        if weight > max_weight {
            weight = 1;
        }
    }
    Ok(total % 47)
}

// Code 93 reader
//------------------------------------------------------------------------------

pub struct Code93Reader {
    counters: [usize; 6],
}

impl Code93Reader {
    pub fn new() -> Self {
        Self { counters: [0; 6] }
    }
}

impl Default for Code93Reader {
    fn default() -> Self {
        Self::new()
    }
}

impl OneDReader for Code93Reader {
    fn decode_row(
        &mut self,
        row_number: usize,
        row: &BitArray,
        _hints: &DecodeHints,
    ) -> BarcodeResult<DecodedBarcode> {
        let start = scan_runs(row, 0, false, &mut self.counters, |counters, start, end| {
            Ok((to_pattern(counters) == Some(ASTERISK_ENCODING)).then_some([start, end]))
        })?;

        let end = row.size();
        let mut next_start = row.next_set(start[1]);
        let mut result = Vec::with_capacity(20);
        let mut last_start;
        loop {
            record_pattern(row, next_start, &mut self.counters)?;
            let pattern = to_pattern(&self.counters).ok_or(BarcodeError::NotFound)?;
            let decoded = pattern_to_char(pattern)?;
            result.push(decoded);
            last_start = next_start;
            next_start += self.counters.iter().sum::<usize>();
            next_start = row.next_set(next_start);
            if decoded == b'*' {
                break;
            }
        }
        result.pop();
        let last_pattern_size = self.counters.iter().sum::<usize>();

        // Termination bar
        if next_start == end || !row.get(next_start) {
            return Err(BarcodeError::NotFound);
        }
        // Both check characters are needed
        if result.len() < 2 {
            return Err(BarcodeError::NotFound);
        }
        check_checksums(&result)?;
        result.truncate(result.len() - 2);

        let text = decode_extended(&result)?;
        trace!("Decoded Code 93 {text} on row {row_number}");

        let y = row_number as f32;
        let left = (start[1] + start[0]) as f32 / 2.0;
        let right = last_start as f32 + last_pattern_size as f32 / 2.0;
        let mut res = DecodedBarcode::new(
            text,
            None,
            vec![Point::new(left, y), Point::new(right, y)],
            BarcodeFormat::Code93,
        );
        res.put_metadata(ResultMetadataKey::SymbologyIdentifier, MetadataValue::Text("]G0".into()));
        Ok(res)
    }
}

/// Scales six runs onto nine modules; each run must round to 1 to 4 modules
fn to_pattern(counters: &[usize]) -> Option<u32> {
    let sum = counters.iter().sum::<usize>() as f32;
    let mut pattern = 0u32;
    for (i, &counter) in counters.iter().enumerate() {
        let scaled = (counter as f32 * 9.0 / sum).round() as u32;
        if !(1..=4).contains(&scaled) {
            return None;
        }
        pattern <<= scaled;
        if i & 1 == 0 {
            pattern |= (1 << scaled) - 1;
        }
    }
    Some(pattern)
}

fn pattern_to_char(pattern: u32) -> BarcodeResult<u8> {
    CHARACTER_ENCODINGS
        .iter()
        .position(|&e| e == pattern)
        .map(|i| ALPHABET[i])
        .ok_or(BarcodeError::NotFound)
}

fn check_checksums(result: &[u8]) -> BarcodeResult<()> {
    let len = result.len();
    for (check_position, max_weight) in [(len - 2, 20), (len - 1, 15)] {
        let check = checksum_index(&result[..check_position], max_weight)?;
        if result[check_position] != ALPHABET[check] {
            return Err(BarcodeError::Checksum);
        }
    }
    Ok(())
}

/// Resolves the shift pairs introduced by the characters `a` to `d`
fn decode_extended(encoded: &[u8]) -> BarcodeResult<String> {
    let mut decoded = String::with_capacity(encoded.len());
    let mut i = 0;
    while i < encoded.len() {
        let c = encoded[i];
        if !(b'a'..=b'd').contains(&c) {
            decoded.push(char::from(c));
            i += 1;
            continue;
        }
        let next = *encoded.get(i + 1).ok_or(BarcodeError::Format)?;
        let ch = match (c, next) {
            // Lowercase letters
            (b'd', b'A'..=b'Z') => next + 32,
            // Control codes SH to SB
            (b'a', b'A'..=b'Z') => next - 64,
            // Control codes ESC to US
            (b'b', b'A'..=b'E') => next - 38,
            (b'b', b'F'..=b'J') => next - 11,
            (b'b', b'K'..=b'O') => next + 16,
            (b'b', b'P'..=b'T') => next + 43,
            (b'b', b'U') => 0,
            (b'b', b'V') => b'@',
            (b'b', b'W') => b'`',
            (b'b', b'X'..=b'Z') => 127,
            (b'c', b'A'..=b'O') => next - 32,
            (b'c', b'Z') => b':',
            _ => return Err(BarcodeError::Format),
        };
        decoded.push(char::from(ch));
        i += 2;
    }
    Ok(decoded)
}

#[cfg(test)]
mod code93_reader_tests {
    use test_case::test_case;

    use super::{checksum_index, decode_extended, to_pattern, Code93Reader, ASTERISK_ENCODING};
    use crate::common::{error::BarcodeError, format::BarcodeFormat, hints::DecodeHints};
    use crate::reader::oned::{row_from_str, OneDReader};

    const CODE93: &str = "1010111101101000101001011001100101001100100101000010101010000101000101101100110101010111101";

    fn padded(code: &str) -> String {
        format!("{0}{code}{0}", "0".repeat(10))
    }

    #[test]
    fn test_to_pattern() {
        assert_eq!(to_pattern(&[1, 1, 1, 1, 4, 1]), Some(ASTERISK_ENCODING));
        assert_eq!(to_pattern(&[3, 3, 3, 3, 12, 3]), Some(ASTERISK_ENCODING));
        assert_eq!(to_pattern(&[1, 1, 1, 1, 10, 1]), None);
    }

    #[test]
    fn test_checksum_index() {
        // TEST93 carries the check characters '+' and '6'
        assert_eq!(checksum_index(b"TEST93", 20).unwrap(), 41);
        assert_eq!(checksum_index(b"TEST93+", 15).unwrap(), 6);
    }

    #[test]
    fn test_decode_row() {
        let row = row_from_str(&padded(CODE93));
        let res = Code93Reader::new().decode_row(0, &row, &DecodeHints::new()).unwrap();
        assert_eq!(res.text(), "CODE93");
        assert_eq!(res.format(), BarcodeFormat::Code93);
    }

    #[test]
    fn test_missing_termination_bar() {
        let row = row_from_str(&padded(&CODE93[..CODE93.len() - 1]));
        let res = Code93Reader::new().decode_row(0, &row, &DecodeHints::new());
        assert_eq!(res, Err(BarcodeError::NotFound));
    }

    #[test]
    fn test_bad_check_character() {
        // Second check character 'V' (0x19A) replaced by 'U' (0x196)
        let mut code = CODE93.to_string();
        let at = code.len() - 10;
        code.replace_range(at - 9..at, "110010110");
        let row = row_from_str(&padded(&code));
        let res = Code93Reader::new().decode_row(0, &row, &DecodeHints::new());
        assert_eq!(res, Err(BarcodeError::Checksum));
    }

    #[test_case(b"dAdZ", "az")]
    #[test_case(b"aMaJ", "\r\n")]
    #[test_case(b"bUbVbWbX", "\0@`\u{7f}")]
    #[test_case(b"cAcZ", "!:")]
    fn test_decode_extended(encoded: &[u8], exp: &str) {
        assert_eq!(decode_extended(encoded).unwrap(), exp);
    }

    #[test]
    fn test_decode_extended_invalid() {
        assert_eq!(decode_extended(b"AB d"), Err(BarcodeError::Format));
        assert_eq!(decode_extended(b"c1"), Err(BarcodeError::Format));
    }
}
