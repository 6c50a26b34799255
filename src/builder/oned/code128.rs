use log::debug;

use super::append_pattern;
use crate::common::error::{BarcodeError, BarcodeResult};
use crate::common::hints::{CodeSet, EncodeHints};
use crate::reader::oned::code128::{
    CODE_CODE_A, CODE_CODE_B, CODE_CODE_C, CODE_FNC_1, CODE_FNC_2, CODE_FNC_3, CODE_FNC_4_A,
    CODE_FNC_4_B, CODE_PATTERNS, CODE_START_A, CODE_START_B, CODE_START_C, CODE_STOP,
};

/// Characters standing in for the function codes in the contents
pub const ESCAPE_FNC_1: char = '\u{f1}';
pub const ESCAPE_FNC_2: char = '\u{f2}';
pub const ESCAPE_FNC_3: char = '\u{f3}';
pub const ESCAPE_FNC_4: char = '\u{f4}';

const MAX_LENGTH: usize = 80;
const BAD_DIGIT_COUNT: &str = "Bad number of characters for digit only encoding.";

// Results of looking ahead at the contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CType {
    Uncodable,
    OneDigit,
    TwoDigits,
    Fnc1,
}

pub fn encode(contents: &str, hints: &EncodeHints) -> BarcodeResult<Vec<bool>> {
    let contents = if hints.gs1_format {
        format!("{ESCAPE_FNC_1}{contents}")
    } else {
        contents.to_string()
    };
    let chars = contents.chars().collect::<Vec<_>>();
    let forced = check(&chars, hints.force_code_set)?;
    if hints.code128_compact {
        debug!("Compact Code 128 encoding is not available, using the fast encoder");
    }
    encode_fast(&chars, forced)
}

fn check(contents: &[char], forced: Option<CodeSet>) -> BarcodeResult<Option<usize>> {
    if contents.len() > MAX_LENGTH {
        return Err(BarcodeError::illegal(format!(
            "Contents length should be between 1 and 80 characters, but got {}",
            contents.len()
        )));
    }

    let forced = forced.map(|cs| match cs {
        CodeSet::A => CODE_CODE_A,
        CodeSet::B => CODE_CODE_B,
        CodeSet::C => CODE_CODE_C,
    });

    for &c in contents {
        let v = c as u32;
        let is_escape = matches!(c, ESCAPE_FNC_1..=ESCAPE_FNC_4);
        if !is_escape && v > 127 {
            return Err(BarcodeError::illegal(format!("Bad character in input: ASCII value={v}")));
        }
        let bad_for_forced = match forced {
            Some(CODE_CODE_A) => (96..=127).contains(&v),
            Some(CODE_CODE_B) => v < 32,
            Some(_) => {
                v < 48
                    || (58..=127).contains(&v)
                    || matches!(c, ESCAPE_FNC_2 | ESCAPE_FNC_3 | ESCAPE_FNC_4)
            }
            None => false,
        };
        if bad_for_forced {
            return Err(BarcodeError::illegal(format!(
                "Bad character in input for forced code set: ASCII value={v}"
            )));
        }
    }
    Ok(forced)
}

fn encode_fast(contents: &[char], forced: Option<usize>) -> BarcodeResult<Vec<bool>> {
    let length = contents.len();
    let mut patterns = Vec::new();
    let mut check_sum = 0;
    let mut check_weight = 1;
    let mut code_set = 0;
    let mut position = 0;

    while position < length {
        let new_code_set = forced.unwrap_or_else(|| choose_code(contents, position, code_set));
        let pattern_index;
        if new_code_set == code_set {
            pattern_index = match contents[position] {
                ESCAPE_FNC_1 => CODE_FNC_1,
                ESCAPE_FNC_2 => CODE_FNC_2,
                ESCAPE_FNC_3 => CODE_FNC_3,
                ESCAPE_FNC_4 if code_set == CODE_CODE_A => CODE_FNC_4_A,
                ESCAPE_FNC_4 => CODE_FNC_4_B,
                c if code_set == CODE_CODE_A => {
                    // Control characters follow the underscore in code set A
                    let v = c as usize;
                    if v < 32 {
                        v + 64
                    } else {
                        v - 32
                    }
                }
                c if code_set == CODE_CODE_B => c as usize - 32,
                _ => {
                    // Code set C always takes two digits
                    let pair = contents
                        .get(position..position + 2)
                        .ok_or_else(|| BarcodeError::illegal(BAD_DIGIT_COUNT))?
                        .iter()
                        .map(|&c| c.to_digit(10))
                        .collect::<Option<Vec<_>>>()
                        .ok_or_else(|| BarcodeError::illegal("Code set C only encodes digits"))?;
                    position += 1;
                    (pair[0] * 10 + pair[1]) as usize
                }
            };
            position += 1;
        } else {
            pattern_index = match (code_set, new_code_set) {
                (0, CODE_CODE_A) => CODE_START_A,
                (0, CODE_CODE_B) => CODE_START_B,
                (0, _) => CODE_START_C,
                (_, new) => new,
            };
            code_set = new_code_set;
        }

        patterns.push(CODE_PATTERNS[pattern_index]);
        check_sum += pattern_index * check_weight;
        if position != 0 {
            check_weight += 1;
        }
    }
    Ok(produce_result(patterns, check_sum))
}

fn produce_result(mut patterns: Vec<&[usize]>, check_sum: usize) -> Vec<bool> {
    patterns.push(CODE_PATTERNS[check_sum % 103]);
    patterns.push(CODE_PATTERNS[CODE_STOP]);

    let code_width = patterns.iter().flat_map(|p| p.iter()).sum::<usize>();
    let mut res = vec![false; code_width];
    let mut pos = 0;
    for pattern in patterns {
        pos += append_pattern(&mut res, pos, pattern, true);
    }
    res
}

fn find_c_type(value: &[char], start: usize) -> CType {
    let Some(&c) = value.get(start) else {
        return CType::Uncodable;
    };
    if c == ESCAPE_FNC_1 {
        return CType::Fnc1;
    }
    if !c.is_ascii_digit() {
        return CType::Uncodable;
    }
    match value.get(start + 1) {
        Some(c) if c.is_ascii_digit() => CType::TwoDigits,
        _ => CType::OneDigit,
    }
}

// Picks the code set for the character at `start`, switching to C only when enough
// digits follow to pay for the switch
fn choose_code(value: &[char], start: usize, old_code: usize) -> usize {
    let mut lookahead = find_c_type(value, start);
    if lookahead == CType::OneDigit {
        return if old_code == CODE_CODE_A { CODE_CODE_A } else { CODE_CODE_B };
    }
    if lookahead == CType::Uncodable {
        if let Some(&c) = value.get(start) {
            let in_a = c < ' '
                || (old_code == CODE_CODE_A
                    && (c < '`' || matches!(c, ESCAPE_FNC_1..=ESCAPE_FNC_4)));
            if in_a {
                return CODE_CODE_A;
            }
        }
        return CODE_CODE_B;
    }
    if old_code == CODE_CODE_A && lookahead == CType::Fnc1 {
        return CODE_CODE_A;
    }
    if old_code == CODE_CODE_C {
        return CODE_CODE_C;
    }
    if old_code == CODE_CODE_B {
        if lookahead == CType::Fnc1 {
            return CODE_CODE_B;
        }
        // Two digits seen, look at what follows
        lookahead = find_c_type(value, start + 2);
        if matches!(lookahead, CType::Uncodable | CType::OneDigit) {
            return CODE_CODE_B;
        }
        if lookahead == CType::Fnc1 {
            return if find_c_type(value, start + 3) == CType::TwoDigits {
                CODE_CODE_C
            } else {
                CODE_CODE_B
            };
        }
        // At least four digits; switch now unless the run is odd
        let mut index = start + 4;
        loop {
            lookahead = find_c_type(value, index);
            if lookahead != CType::TwoDigits {
                break;
            }
            index += 2;
        }
        return if lookahead == CType::OneDigit { CODE_CODE_B } else { CODE_CODE_C };
    }

    // Initial code set, a leading FNC1 does not count
    if lookahead == CType::Fnc1 {
        lookahead = find_c_type(value, start + 1);
    }
    if lookahead == CType::TwoDigits {
        CODE_CODE_C
    } else {
        CODE_CODE_B
    }
}
