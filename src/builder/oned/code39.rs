use super::append_pattern;
use crate::common::error::{BarcodeError, BarcodeResult};
use crate::reader::oned::code39::{ALPHABET, ASTERISK_ENCODING, CHARACTER_ENCODINGS};

const MAX_LENGTH: usize = 80;

pub fn encode(contents: &str) -> BarcodeResult<Vec<bool>> {
    check_length(contents.len())?;
    let contents = if contents.bytes().all(|b| ALPHABET.contains(&b)) {
        contents.to_string()
    } else {
        let extended = to_extended_mode(contents)?;
        check_length(extended.len())?;
        extended
    };

    let mut res = vec![false; 24 + 1 + 13 * contents.len()];
    let mut pos = append_pattern(&mut res, 0, &to_widths(ASTERISK_ENCODING), true);
    pos += append_pattern(&mut res, pos, &[1], false);
    for b in contents.bytes() {
        let Some(idx) = ALPHABET.iter().position(|&a| a == b) else {
            return Err(BarcodeError::illegal(format!("Bad contents: {contents}")));
        };
        pos += append_pattern(&mut res, pos, &to_widths(CHARACTER_ENCODINGS[idx]), true);
        pos += append_pattern(&mut res, pos, &[1], false);
    }
    append_pattern(&mut res, pos, &to_widths(ASTERISK_ENCODING), true);
    Ok(res)
}

fn check_length(len: usize) -> BarcodeResult<()> {
    if len > MAX_LENGTH {
        return Err(BarcodeError::illegal(format!(
            "Requested contents should be less than 80 digits long, but got {len}"
        )));
    }
    Ok(())
}

// Wide elements are two modules
fn to_widths(encoding: u32) -> [usize; 9] {
    let mut widths = [1; 9];
    for (i, w) in widths.iter_mut().enumerate() {
        if encoding & (1 << (8 - i)) != 0 {
            *w = 2;
        }
    }
    widths
}

/// Rewrites characters outside the Code 39 alphabet as full ASCII pairs
fn to_extended_mode(contents: &str) -> BarcodeResult<String> {
    let mut extended = String::with_capacity(contents.len() * 2);
    for c in contents.chars() {
        let b = c as u32;
        let shifted = |prefix: char, base: u8, offset: u32| {
            [prefix, char::from(base + (b - offset) as u8)]
        };
        let pair = match c {
            '\0' => ['%', 'U'],
            ' ' | '-' | '.' => {
                extended.push(c);
                continue;
            }
            '@' => ['%', 'V'],
            '`' => ['%', 'W'],
            '\u{1}'..='\u{1a}' => shifted('$', b'A', 1),
            '\u{1b}'..='\u{1f}' => shifted('%', b'A', 27),
            '!'..=',' | '/' | ':' => shifted('/', b'A', 33),
            '0'..='9' | 'A'..='Z' => {
                extended.push(c);
                continue;
            }
            ';'..='?' => shifted('%', b'F', 59),
            '['..='_' => shifted('%', b'K', 91),
            'a'..='z' => shifted('+', b'A', 97),
            '{'..='\u{7f}' => shifted('%', b'P', 123),
            _ => {
                return Err(BarcodeError::illegal(format!(
                    "Requested content contains a non-encodable character: '{c}'"
                )))
            }
        };
        extended.extend(pair);
    }
    Ok(extended)
}
