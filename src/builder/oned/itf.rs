use super::{append_pattern, check_numeric};
use crate::common::error::{BarcodeError, BarcodeResult};
use crate::reader::oned::itf::{END_PATTERN, PATTERNS, START_PATTERN};

const MAX_LENGTH: usize = 80;

// Digits are written with wide elements of 3 modules
const WIDE_PATTERNS_OFFSET: usize = 10;

pub fn encode(contents: &str) -> BarcodeResult<Vec<bool>> {
    let length = contents.len();
    if length % 2 != 0 {
        return Err(BarcodeError::illegal("The length of the input should be even"));
    }
    if length > MAX_LENGTH {
        return Err(BarcodeError::illegal(format!(
            "Requested contents should be less than 80 digits long, but got {length}"
        )));
    }
    check_numeric(contents)?;

    let digits = contents.bytes().map(|b| (b - b'0') as usize).collect::<Vec<_>>();
    let mut res = vec![false; 9 + 9 * length];
    let mut pos = append_pattern(&mut res, 0, &START_PATTERN, true);
    for pair in digits.chunks_exact(2) {
        let black = &PATTERNS[WIDE_PATTERNS_OFFSET + pair[0]];
        let white = &PATTERNS[WIDE_PATTERNS_OFFSET + pair[1]];
        let mut encoding = [0; 10];
        for k in 0..5 {
            encoding[2 * k] = black[k];
            encoding[2 * k + 1] = white[k];
        }
        pos += append_pattern(&mut res, pos, &encoding, true);
    }
    append_pattern(&mut res, pos, &END_PATTERN, true);
    Ok(res)
}

#[cfg(test)]
mod itf_writer_tests {
    use test_case::test_case;

    use crate::builder::{oned::matrix_row_string, OneDWriter, Writer};
    use crate::common::{error::BarcodeError, format::BarcodeFormat, hints::EncodeHints};

    fn encode(contents: &str) -> String {
        let matrix =
            OneDWriter.encode(contents, BarcodeFormat::Itf, 0, 0, &EncodeHints::new()).unwrap();
        matrix_row_string(&matrix)
    }

    #[test]
    fn test_encode() {
        let exp = "101011101000101011100011101110100010100011101000111000101011101";
        assert_eq!(encode("123456"), format!("00000{exp}00000"));
    }

    #[test]
    fn test_width() {
        assert_eq!(encode("00123456789012").len(), 9 + 9 * 14 + 10);
    }

    #[test_case("12345"; "odd length")]
    #[test_case("12a4"; "not numeric")]
    fn test_illegal_contents(contents: &str) {
        let res = OneDWriter.encode(contents, BarcodeFormat::Itf, 0, 0, &EncodeHints::new());
        assert!(matches!(res, Err(BarcodeError::IllegalArgument(_))));
    }
}
