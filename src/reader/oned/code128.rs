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

// Code 128 tables
//------------------------------------------------------------------------------

/// Bar and space widths of every code value; the stop pattern has a seventh bar
pub(crate) const CODE_PATTERNS: [&[usize]; 107] = [
    &[2, 1, 2, 2, 2, 2], &[2, 2, 2, 1, 2, 2], &[2, 2, 2, 2, 2, 1], &[1, 2, 1, 2, 2, 3],
    &[1, 2, 1, 3, 2, 2], &[1, 3, 1, 2, 2, 2], &[1, 2, 2, 2, 1, 3], &[1, 2, 2, 3, 1, 2],
    &[1, 3, 2, 2, 1, 2], &[2, 2, 1, 2, 1, 3], &[2, 2, 1, 3, 1, 2], &[2, 3, 1, 2, 1, 2],
    &[1, 1, 2, 2, 3, 2], &[1, 2, 2, 1, 3, 2], &[1, 2, 2, 2, 3, 1], &[1, 1, 3, 2, 2, 2],
    &[1, 2, 3, 1, 2, 2], &[1, 2, 3, 2, 2, 1], &[2, 2, 3, 2, 1, 1], &[2, 2, 1, 1, 3, 2],
    &[2, 2, 1, 2, 3, 1], &[2, 1, 3, 2, 1, 2], &[2, 2, 3, 1, 1, 2], &[3, 1, 2, 1, 3, 1],
    &[3, 1, 1, 2, 2, 2], &[3, 2, 1, 1, 2, 2], &[3, 2, 1, 2, 2, 1], &[3, 1, 2, 2, 1, 2],
    &[3, 2, 2, 1, 1, 2], &[3, 2, 2, 2, 1, 1], &[2, 1, 2, 1, 2, 3], &[2, 1, 2, 3, 2, 1],
    &[2, 3, 2, 1, 2, 1], &[1, 1, 1, 3, 2, 3], &[1, 3, 1, 1, 2, 3], &[1, 3, 1, 3, 2, 1],
    &[1, 1, 2, 3, 1, 3], &[1, 3, 2, 1, 1, 3], &[1, 3, 2, 3, 1, 1], &[2, 1, 1, 3, 1, 3],
    &[2, 3, 1, 1, 1, 3], &[2, 3, 1, 3, 1, 1], &[1, 1, 2, 1, 3, 3], &[1, 1, 2, 3, 3, 1],
    &[1, 3, 2, 1, 3, 1], &[1, 1, 3, 1, 2, 3], &[1, 1, 3, 3, 2, 1], &[1, 3, 3, 1, 2, 1],
    &[3, 1, 3, 1, 2, 1], &[2, 1, 1, 3, 3, 1], &[2, 3, 1, 1, 3, 1], &[2, 1, 3, 1, 1, 3],
    &[2, 1, 3, 3, 1, 1], &[2, 1, 3, 1, 3, 1], &[3, 1, 1, 1, 2, 3], &[3, 1, 1, 3, 2, 1],
    &[3, 3, 1, 1, 2, 1], &[3, 1, 2, 1, 1, 3], &[3, 1, 2, 3, 1, 1], &[3, 3, 2, 1, 1, 1],
    &[3, 1, 4, 1, 1, 1], &[2, 2, 1, 4, 1, 1], &[4, 3, 1, 1, 1, 1], &[1, 1, 1, 2, 2, 4],
    &[1, 1, 1, 4, 2, 2], &[1, 2, 1, 1, 2, 4], &[1, 2, 1, 4, 2, 1], &[1, 4, 1, 1, 2, 2],
    &[1, 4, 1, 2, 2, 1], &[1, 1, 2, 2, 1, 4], &[1, 1, 2, 4, 1, 2], &[1, 2, 2, 1, 1, 4],
    &[1, 2, 2, 4, 1, 1], &[1, 4, 2, 1, 1, 2], &[1, 4, 2, 2, 1, 1], &[2, 4, 1, 2, 1, 1],
    &[2, 2, 1, 1, 1, 4], &[4, 1, 3, 1, 1, 1], &[2, 4, 1, 1, 1, 2], &[1, 3, 4, 1, 1, 1],
    &[1, 1, 1, 2, 4, 2], &[1, 2, 1, 1, 4, 2], &[1, 2, 1, 2, 4, 1], &[1, 1, 4, 2, 1, 2],
    &[1, 2, 4, 1, 1, 2], &[1, 2, 4, 2, 1, 1], &[4, 1, 1, 2, 1, 2], &[4, 2, 1, 1, 1, 2],
    &[4, 2, 1, 2, 1, 1], &[2, 1, 2, 1, 4, 1], &[2, 1, 4, 1, 2, 1], &[4, 1, 2, 1, 2, 1],
    &[1, 1, 1, 1, 4, 3], &[1, 1, 1, 3, 4, 1], &[1, 3, 1, 1, 4, 1], &[1, 1, 4, 1, 1, 3],
    &[1, 1, 4, 3, 1, 1], &[4, 1, 1, 1, 1, 3], &[4, 1, 1, 3, 1, 1], &[1, 1, 3, 1, 4, 1],
    &[1, 1, 4, 1, 3, 1], &[3, 1, 1, 1, 4, 1], &[4, 1, 1, 1, 3, 1], &[2, 1, 1, 4, 1, 2],
    &[2, 1, 1, 2, 1, 4], &[2, 1, 1, 2, 3, 2], &[2, 3, 3, 1, 1, 1, 2],
];

const MAX_AVG_VARIANCE: f32 = 0.25;
const MAX_INDIVIDUAL_VARIANCE: f32 = 0.7;

pub(crate) const CODE_SHIFT: usize = 98;
pub(crate) const CODE_CODE_C: usize = 99;
pub(crate) const CODE_CODE_B: usize = 100;
pub(crate) const CODE_CODE_A: usize = 101;
pub(crate) const CODE_FNC_1: usize = 102;
pub(crate) const CODE_FNC_2: usize = 97;
pub(crate) const CODE_FNC_3: usize = 96;
pub(crate) const CODE_FNC_4_A: usize = 101;
pub(crate) const CODE_FNC_4_B: usize = 100;
pub(crate) const CODE_START_A: usize = 103;
pub(crate) const CODE_START_B: usize = 104;
pub(crate) const CODE_START_C: usize = 105;
pub(crate) const CODE_STOP: usize = 106;

// Code 128 reader
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CodeSet {
    A,
    B,
    C,
}

/// Reads Code 128 in all three code sets, with FNC1 to FNC4 and the extended ASCII shift
pub struct Code128Reader {
    counters: [usize; 6],
}

impl Code128Reader {
    pub fn new() -> Self {
        Self { counters: [0; 6] }
    }

    // Start range and the start code found
    fn find_start_pattern(&mut self, row: &BitArray) -> BarcodeResult<([usize; 2], usize)> {
        scan_runs(row, 0, false, &mut self.counters, |counters, start, end| {
            let mut best_variance = MAX_AVG_VARIANCE;
            let mut best_match = None;
            for start_code in CODE_START_A..=CODE_START_C {
                let variance = pattern_match_variance(
                    counters,
                    CODE_PATTERNS[start_code],
                    MAX_INDIVIDUAL_VARIANCE,
                );
                if variance < best_variance {
                    best_variance = variance;
                    best_match = Some(start_code);
                }
            }
            let Some(start_code) = best_match else {
                return Ok(None);
            };
            // Quiet zone of at least half the start pattern
            let quiet_start = start.saturating_sub((end - start) / 2);
            Ok(row.is_range(quiet_start, start, false)?.then_some(([start, end], start_code)))
        })
    }

    fn decode_code(&mut self, row: &BitArray, row_offset: usize) -> BarcodeResult<usize> {
        record_pattern(row, row_offset, &mut self.counters)?;
        let mut best_variance = MAX_AVG_VARIANCE;
        let mut best_match = None;
        for (code, pattern) in CODE_PATTERNS.iter().enumerate() {
            let variance = pattern_match_variance(&self.counters, pattern, MAX_INDIVIDUAL_VARIANCE);
            if variance < best_variance {
                best_variance = variance;
                best_match = Some(code);
            }
        }
        best_match.ok_or(BarcodeError::NotFound)
    }
}

impl Default for Code128Reader {
    fn default() -> Self {
        Self::new()
    }
}

// Appends an ASCII character of code sets A and B, honouring the FNC4 extended shift
fn push_shifted(result: &mut String, value: usize, upper: bool) {
    let value = if upper { value + 128 } else { value };
    result.push(char::from(value as u8));
}

impl OneDReader for Code128Reader {
    fn decode_row(
        &mut self,
        row_number: usize,
        row: &BitArray,
        hints: &DecodeHints,
    ) -> BarcodeResult<DecodedBarcode> {
        let convert_fnc1 = hints.assume_gs1;
        let mut symbology_modifier = 0;

        let (start_range, start_code) = self.find_start_pattern(row)?;
        let mut raw_codes = vec![start_code as u8];
        let mut code_set = match start_code {
            CODE_START_A => CodeSet::A,
            CODE_START_B => CodeSet::B,
            CODE_START_C => CodeSet::C,
            _ => return Err(BarcodeError::Format),
        };

        let mut done = false;
        let mut is_next_shifted = false;
        let mut result = String::with_capacity(20);

        let mut last_start = start_range[0];
        let mut next_start = start_range[1];

        let mut last_code = 0;
        let mut code = 0;
        let mut checksum_total = start_code;
        let mut multiplier = 0;
        let mut last_character_was_printable = true;
        let mut upper_mode = false;
        let mut shift_upper_mode = false;

        while !done {
            let unshift = is_next_shifted;
            is_next_shifted = false;

            last_code = code;
            code = self.decode_code(row, next_start)?;
            raw_codes.push(code as u8);

            if code != CODE_STOP {
                last_character_was_printable = true;
                multiplier += 1;
                checksum_total += multiplier * code;
            }

            last_start = next_start;
            next_start += self.counters.iter().sum::<usize>();

            if matches!(code, CODE_START_A..=CODE_START_C) {
                return Err(BarcodeError::Format);
            }

            match code_set {
                CodeSet::A | CodeSet::B
                    if code < 64 || (code < 96 && code_set == CodeSet::B) =>
                {
                    push_shifted(&mut result, code + 32, shift_upper_mode != upper_mode);
                    shift_upper_mode = false;
                }
                CodeSet::A if code < 96 => {
                    push_shifted(&mut result, code - 64, shift_upper_mode != upper_mode);
                    shift_upper_mode = false;
                }
                CodeSet::C if code < 100 => {
                    if code < 10 {
                        result.push('0');
                    }
                    result.push_str(&code.to_string());
                }
                _ => {
                    if code != CODE_STOP {
                        last_character_was_printable = false;
                    }
                    match code {
                        CODE_FNC_1 => {
                            // FNC1 in first or second position selects GS1 or AIM
                            match result.len() {
                                0 => symbology_modifier = 1,
                                1 => symbology_modifier = 2,
                                _ => {}
                            }
                            if convert_fnc1 {
                                if result.is_empty() {
                                    result.push_str("]C1");
                                } else {
                                    result.push('\u{1d}');
                                }
                            }
                        }
                        CODE_FNC_2 if code_set != CodeSet::C => symbology_modifier = 4,
                        CODE_FNC_3 if code_set != CodeSet::C => {}
                        CODE_SHIFT if code_set != CodeSet::C => {
                            is_next_shifted = true;
                            code_set = if code_set == CodeSet::A { CodeSet::B } else { CodeSet::A };
                        }
                        // FNC4 in its own code set, otherwise a code set switch
                        CODE_FNC_4_A if code_set == CodeSet::A => {
                            toggle_upper(&mut upper_mode, &mut shift_upper_mode)
                        }
                        CODE_FNC_4_B if code_set == CodeSet::B => {
                            toggle_upper(&mut upper_mode, &mut shift_upper_mode)
                        }
                        CODE_CODE_A => code_set = CodeSet::A,
                        CODE_CODE_B => code_set = CodeSet::B,
                        CODE_CODE_C => code_set = CodeSet::C,
                        CODE_STOP => done = true,
                        _ => return Err(BarcodeError::Format),
                    }
                }
            }

            if unshift {
                code_set = if code_set == CodeSet::A { CodeSet::B } else { CodeSet::A };
            }
        }

        let last_pattern_size = next_start - last_start;

        // The stop pattern's seventh bar was not read, skip it before checking the quiet zone
        next_start = row.next_unset(next_start);
        let quiet_end = row.size().min(next_start + (next_start - last_start) / 2);
        if !row.is_range(next_start, quiet_end, false)? {
            return Err(BarcodeError::NotFound);
        }

        // The last decoded value is the checksum, remove its weighted contribution
        checksum_total -= multiplier * last_code;
        if checksum_total % 103 != last_code {
            return Err(BarcodeError::Checksum);
        }

        if result.is_empty() {
            return Err(BarcodeError::NotFound);
        }
        // The checksum was appended as data unless it read as a control code
        if last_character_was_printable {
            result.pop();
            if code_set == CodeSet::C {
                result.pop();
            }
        }
        trace!("Decoded Code 128 {result} on row {row_number}");

        let y = row_number as f32;
        let left = (start_range[1] + start_range[0]) as f32 / 2.0;
        let right = last_start as f32 + last_pattern_size as f32 / 2.0;
        let mut res = DecodedBarcode::new(
            result,
            Some(raw_codes),
            vec![Point::new(left, y), Point::new(right, y)],
            BarcodeFormat::Code128,
        );
        res.put_metadata(
            ResultMetadataKey::SymbologyIdentifier,
            MetadataValue::Text(format!("]C{symbology_modifier}")),
        );
        Ok(res)
    }
}

// FNC4 once shifts the next character to the upper half, twice latches
fn toggle_upper(upper_mode: &mut bool, shift_upper_mode: &mut bool) {
    if *shift_upper_mode {
        *upper_mode = !*upper_mode;
        *shift_upper_mode = false;
    } else {
        *shift_upper_mode = true;
    }
}

#[cfg(test)]
mod code128_reader_tests {
    use test_case::test_case;

    use super::Code128Reader;
    use crate::common::{
        error::{BarcodeError, BarcodeResult},
        format::BarcodeFormat,
        hints::DecodeHints,
        result::{DecodedBarcode, ResultMetadataKey},
    };
    use crate::reader::oned::{row_from_str, OneDReader};

    const FNC1_123: &str = "1101001110011110101110101100111001011110111011001011100101011110001100011101011";
    const HI: &str = "110100100001100010100010000110100100111101001100011101011";
    const DIGITS: &str = "11010011100101100111001000101100011100010110100011011101100011101011";
    const CONTROL_A: &str = "110100001001001011000010100011000111001101001100011101011";

    fn decode(code: &str, hints: &DecodeHints) -> BarcodeResult<DecodedBarcode> {
        let row = row_from_str(&format!("{0}{code}{0}", "0".repeat(10)));
        Code128Reader::new().decode_row(0, &row, hints)
    }

    #[test_case(HI, "Hi", "]C0"; "code set b")]
    #[test_case(DIGITS, "123456", "]C0"; "code set c")]
    #[test_case(CONTROL_A, "\u{1}A", "]C0"; "code set a")]
    #[test_case(FNC1_123, "123", "]C1"; "leading fnc1")]
    fn test_decode_row(code: &str, exp: &str, symbology: &str) {
        let res = decode(code, &DecodeHints::new()).unwrap();
        assert_eq!(res.text(), exp);
        assert_eq!(res.format(), BarcodeFormat::Code128);
        assert_eq!(
            res.metadata_value(ResultMetadataKey::SymbologyIdentifier).unwrap().as_text(),
            Some(symbology)
        );
    }

    #[test]
    fn test_gs1_prefix() {
        let mut hints = DecodeHints::new();
        hints.assume_gs1(true);
        assert_eq!(decode(FNC1_123, &hints).unwrap().text(), "]C1123");
    }

    #[test]
    fn test_raw_codes() {
        let res = decode(HI, &DecodeHints::new()).unwrap();
        assert_eq!(res.raw_bytes(), Some(&[104, 40, 73, 84, 106][..]));
    }

    #[test]
    fn test_bad_checksum() {
        // Checksum 84 replaced by 85
        let mut code = HI.to_string();
        code.replace_range(33..44, "10011110010");
        assert_eq!(decode(&code, &DecodeHints::new()), Err(BarcodeError::Checksum));
    }

    #[test]
    fn test_missing_quiet_zone() {
        let row = row_from_str(&format!("{}{HI}001111", "0".repeat(10)));
        let res = Code128Reader::new().decode_row(0, &row, &DecodeHints::new());
        assert_eq!(res, Err(BarcodeError::NotFound));
    }
}
