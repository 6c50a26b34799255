use super::{append_pattern, check_numeric};
use crate::common::error::{BarcodeError, BarcodeResult};
use crate::reader::oned::upc_ean::{
    check_standard_checksum, convert_upce_to_upca, standard_checksum, FIRST_DIGIT_ENCODINGS,
    L_AND_G_PATTERNS, L_PATTERNS, MIDDLE_PATTERN, NUMSYS_AND_CHECK_DIGIT_PATTERNS,
    START_END_PATTERN, UPCE_END_PATTERN,
};

const EAN13_WIDTH: usize = 3 + 7 * 6 + 5 + 7 * 6 + 3;
const EAN8_WIDTH: usize = 3 + 7 * 4 + 5 + 7 * 4 + 3;
const UPCE_WIDTH: usize = 3 + 7 * 6 + 6;

// Appends the check digit to `len - 1` digits or verifies it on `len` digits
fn with_check_digit(contents: &str, len: usize) -> BarcodeResult<String> {
    check_numeric(contents)?;
    match contents.len() {
        l if l == len - 1 => Ok(format!("{contents}{}", standard_checksum(contents)?)),
        l if l == len => {
            if !check_standard_checksum(contents)? {
                return Err(BarcodeError::illegal("Contents do not pass checksum"));
            }
            Ok(contents.to_string())
        }
        l => Err(BarcodeError::illegal(format!(
            "Requested contents should be {} or {len} digits long, but got {l}",
            len - 1
        ))),
    }
}

fn digits(contents: &str) -> Vec<usize> {
    contents.bytes().map(|b| (b - b'0') as usize).collect()
}

pub fn encode_ean13(contents: &str) -> BarcodeResult<Vec<bool>> {
    let contents = with_check_digit(contents, 13)?;
    let digits = digits(&contents);
    let parities = FIRST_DIGIT_ENCODINGS[digits[0]];

    let mut res = vec![false; EAN13_WIDTH];
    let mut pos = append_pattern(&mut res, 0, &START_END_PATTERN, true);
    // The first digit is carried by the parity of the left half
    for (i, &d) in digits.iter().enumerate().take(7).skip(1) {
        let d = if (parities >> (6 - i)) & 1 == 1 { d + 10 } else { d };
        pos += append_pattern(&mut res, pos, &L_AND_G_PATTERNS[d], false);
    }
    pos += append_pattern(&mut res, pos, &MIDDLE_PATTERN, false);
    for &d in &digits[7..] {
        pos += append_pattern(&mut res, pos, &L_PATTERNS[d], true);
    }
    append_pattern(&mut res, pos, &START_END_PATTERN, true);
    Ok(res)
}

pub fn encode_ean8(contents: &str) -> BarcodeResult<Vec<bool>> {
    let contents = with_check_digit(contents, 8)?;
    let digits = digits(&contents);

    let mut res = vec![false; EAN8_WIDTH];
    let mut pos = append_pattern(&mut res, 0, &START_END_PATTERN, true);
    for &d in &digits[..4] {
        pos += append_pattern(&mut res, pos, &L_PATTERNS[d], false);
    }
    pos += append_pattern(&mut res, pos, &MIDDLE_PATTERN, false);
    for &d in &digits[4..] {
        pos += append_pattern(&mut res, pos, &L_PATTERNS[d], true);
    }
    append_pattern(&mut res, pos, &START_END_PATTERN, true);
    Ok(res)
}

/// UPC-A is EAN-13 with a leading zero
pub fn encode_upc_a(contents: &str) -> BarcodeResult<Vec<bool>> {
    check_numeric(contents)?;
    let contents = match contents.len() {
        11 => {
            let sum = contents
                .bytes()
                .enumerate()
                .map(|(i, b)| (b - b'0') as u32 * if i % 2 == 0 { 3 } else { 1 })
                .sum::<u32>();
            format!("{contents}{}", (1000 - sum) % 10)
        }
        12 => contents.to_string(),
        l => {
            return Err(BarcodeError::illegal(format!(
                "Requested contents should be 11 or 12 digits long, but got {l}"
            )))
        }
    };
    encode_ean13(&format!("0{contents}"))
}

pub fn encode_upc_e(contents: &str) -> BarcodeResult<Vec<bool>> {
    check_numeric(contents)?;
    let contents = match contents.len() {
        7 => format!("{contents}{}", standard_checksum(&convert_upce_to_upca(contents))?),
        8 => {
            if !check_standard_checksum(&convert_upce_to_upca(contents))? {
                return Err(BarcodeError::illegal("Contents do not pass checksum"));
            }
            contents.to_string()
        }
        l => {
            return Err(BarcodeError::illegal(format!(
                "Requested contents should be 7 or 8 digits long, but got {l}"
            )))
        }
    };

    let digits = digits(&contents);
    let number_system = digits[0];
    if number_system > 1 {
        return Err(BarcodeError::illegal("Number system must be 0 or 1"));
    }
    let parities = NUMSYS_AND_CHECK_DIGIT_PATTERNS[number_system][digits[7]];

    let mut res = vec![false; UPCE_WIDTH];
    let mut pos = append_pattern(&mut res, 0, &START_END_PATTERN, true);
    for (i, &d) in digits.iter().enumerate().take(7).skip(1) {
        let d = if (parities >> (6 - i)) & 1 == 1 { d + 10 } else { d };
        pos += append_pattern(&mut res, pos, &L_AND_G_PATTERNS[d], false);
    }
    append_pattern(&mut res, pos, &UPCE_END_PATTERN, false);
    Ok(res)
}
