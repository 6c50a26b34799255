use crate::common::error::{BarcodeError, BarcodeResult};
use crate::reader::oned::code93::{checksum_index, ALPHABET, ASTERISK_ENCODING, CHARACTER_ENCODINGS};

const MAX_LENGTH: usize = 80;

pub fn encode(contents: &str) -> BarcodeResult<Vec<bool>> {
    let mut contents = convert_to_extended(contents)?.into_bytes();
    if contents.len() > MAX_LENGTH {
        return Err(BarcodeError::illegal(format!(
            "Requested contents should be less than 80 digits long after converting to \
             extended encoding, but got {}",
            contents.len()
        )));
    }

    // Start, contents, two check characters, stop and the termination bar
    let mut res = vec![false; (contents.len() + 2 + 2) * 9 + 1];
    let mut pos = append_pattern(&mut res, 0, ASTERISK_ENCODING);
    for &c in &contents {
        pos += append_pattern(&mut res, pos, CHARACTER_ENCODINGS[alphabet_index(c)?]);
    }

    for max_weight in [20, 15] {
        let check = checksum_index(&contents, max_weight)?;
        pos += append_pattern(&mut res, pos, CHARACTER_ENCODINGS[check]);
        contents.push(ALPHABET[check]);
    }

    pos += append_pattern(&mut res, pos, ASTERISK_ENCODING);
    res[pos] = true;
    Ok(res)
}

fn alphabet_index(c: u8) -> BarcodeResult<usize> {
    ALPHABET
        .iter()
        .position(|&a| a == c)
        .ok_or_else(|| BarcodeError::illegal(format!("Bad character: {}", char::from(c))))
}

// Writes the nine modules of an encoding, most significant bit first
fn append_pattern(target: &mut [bool], pos: usize, encoding: u32) -> usize {
    for (i, module) in target[pos..pos + 9].iter_mut().enumerate() {
        *module = encoding & (1 << (8 - i)) != 0;
    }
    9
}

/// Rewrites characters outside the Code 93 alphabet as shift pairs, with the shift
/// characters written as `a` to `d`
fn convert_to_extended(contents: &str) -> BarcodeResult<String> {
    let mut extended = String::with_capacity(contents.len() * 2);
    for c in contents.chars() {
        let b = c as u32;
        let shifted =
            |shift: char, base: u8, offset: u32| [shift, char::from(base + (b - offset) as u8)];
        let pair = match c {
            '\0' => ['b', 'U'],
            '\u{1}'..='\u{1a}' => shifted('a', b'A', 1),
            '\u{1b}'..='\u{1f}' => shifted('b', b'A', 27),
            ' ' | '$' | '%' | '+' | '-'..='9' | 'A'..='Z' => {
                extended.push(c);
                continue;
            }
            '!'..=',' => shifted('c', b'A', 33),
            ':' => ['c', 'Z'],
            ';'..='?' => shifted('b', b'F', 59),
            '@' => ['b', 'V'],
            '['..='_' => shifted('b', b'K', 91),
            '`' => ['b', 'W'],
            'a'..='z' => shifted('d', b'A', 97),
            '{'..='\u{7f}' => shifted('b', b'P', 123),
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
