use crate::common::error::{BarcodeError, BarcodeResult};
use crate::reader::oned::codabar::{ALPHABET, CHARACTER_ENCODINGS, START_END_ENCODING};

// Alternate guards, written as A to D
const ALT_START_END_CHARS: [u8; 4] = [b'T', b'N', b'*', b'E'];
const CHARS_WHICH_ARE_TEN_LENGTH_EACH_AFTER_DECODED: [u8; 4] = [b'/', b':', b'+', b'.'];
const DEFAULT_GUARD: u8 = START_END_ENCODING[0];

pub fn encode(contents: &str) -> BarcodeResult<Vec<bool>> {
    let contents = with_guards(contents)?;

    // Guards are ten modules each, with a narrow gap between every character
    let mut result_length = 20;
    for &c in &contents[1..contents.len() - 1] {
        result_length += match c {
            b'0'..=b'9' | b'-' | b'$' => 9,
            _ if CHARS_WHICH_ARE_TEN_LENGTH_EACH_AFTER_DECODED.contains(&c) => 10,
            _ => {
                return Err(BarcodeError::illegal(format!(
                    "Cannot encode : '{}'",
                    char::from(c)
                )))
            }
        };
    }
    result_length += contents.len() - 1;

    let mut res = vec![false; result_length];
    let mut pos = 0;
    let last = contents.len() - 1;
    for (index, &c) in contents.iter().enumerate() {
        let mut c = c.to_ascii_uppercase();
        if index == 0 || index == last {
            c = match c {
                b'T' => b'A',
                b'N' => b'B',
                b'*' => b'C',
                b'E' => b'D',
                _ => c,
            };
        }
        let code = ALPHABET
            .iter()
            .position(|&a| a == c)
            .map(|i| CHARACTER_ENCODINGS[i])
            .unwrap_or(0);

        // Seven elements, a set bit doubling the element
        for bit in 0..7 {
            let color = bit % 2 == 0;
            let width = if (code >> (6 - bit)) & 1 == 1 { 2 } else { 1 };
            res[pos..pos + width].fill(color);
            pos += width;
        }
        if index < last {
            pos += 1;
        }
    }
    Ok(res)
}

// Contents framed by matching guards, or by the default guard when it has none
fn with_guards(contents: &str) -> BarcodeResult<Vec<u8>> {
    if !contents.is_ascii() {
        return Err(BarcodeError::illegal(format!("Cannot encode : '{contents}'")));
    }
    let bytes = contents.as_bytes();
    let framed = || {
        let mut framed = Vec::with_capacity(bytes.len() + 2);
        framed.push(DEFAULT_GUARD);
        framed.extend_from_slice(bytes);
        framed.push(DEFAULT_GUARD);
        framed
    };
    if bytes.len() < 2 {
        return Ok(framed());
    }

    let first = bytes[0].to_ascii_uppercase();
    let last = bytes[bytes.len() - 1].to_ascii_uppercase();
    let starts_normal = START_END_ENCODING.contains(&first);
    let ends_normal = START_END_ENCODING.contains(&last);
    let starts_alt = ALT_START_END_CHARS.contains(&first);
    let ends_alt = ALT_START_END_CHARS.contains(&last);
    if (starts_normal && !ends_normal) || (starts_alt && !ends_alt) {
        return Err(BarcodeError::illegal(format!("Invalid start/end guards: {contents}")));
    }
    if starts_normal || starts_alt {
        return Ok(bytes.to_vec());
    }
    if ends_normal || ends_alt {
        return Err(BarcodeError::illegal(format!("Invalid start/end guards: {contents}")));
    }
    Ok(framed())
}

#[cfg(test)]
mod codabar_writer_tests {
    use test_case::test_case;

    use crate::builder::{oned::matrix_row_string, OneDWriter, Writer};
    use crate::common::{error::BarcodeError, format::BarcodeFormat, hints::EncodeHints};

    fn encode(contents: &str) -> String {
        let matrix =
            OneDWriter.encode(contents, BarcodeFormat::Codabar, 0, 0, &EncodeHints::new()).unwrap();
        matrix_row_string(&matrix)
    }

    #[test]
    fn test_encode() {
        let exp = [
            "00000",
            "1001001011",
            "0110101001",
            "0101011001",
            "0110101001",
            "0101001101",
            "0110010101",
            "01101101011",
            "01001001011",
            "00000",
        ]
        .concat();
        assert_eq!(encode("B515-3/B"), exp);
    }

    #[test]
    fn test_alt_start_end() {
        assert_eq!(encode("T123456789-$T"), encode("A123456789-$A"));
    }

    #[test]
    fn test_default_guards() {
        assert_eq!(encode("1"), encode("A1A"));
        assert_eq!(encode("123"), encode("a123a"));
    }

    #[test_case("A123"; "missing end guard")]
    #[test_case("123B"; "missing start guard")]
    #[test_case("A12x3A"; "bad character")]
    fn test_illegal_contents(contents: &str) {
        let res = OneDWriter.encode(contents, BarcodeFormat::Codabar, 0, 0, &EncodeHints::new());
        assert!(matches!(res, Err(BarcodeError::IllegalArgument(_))));
    }
}
