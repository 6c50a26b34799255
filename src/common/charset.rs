use std::fmt::{Display, Formatter, Result as FmtResult};

use encoding_rs::Encoding;

use super::error::{BarcodeError, BarcodeResult};

// Character set ECI
//------------------------------------------------------------------------------

/// Character sets addressable through an Extended Channel Interpretation designator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacterSetEci {
    Cp437,
    Iso8859_1,
    Iso8859_2,
    Iso8859_3,
    Iso8859_4,
    Iso8859_5,
    Iso8859_6,
    Iso8859_7,
    Iso8859_8,
    Iso8859_9,
    Iso8859_10,
    Iso8859_11,
    Iso8859_13,
    Iso8859_14,
    Iso8859_15,
    Iso8859_16,
    ShiftJis,
    Cp1250,
    Cp1251,
    Cp1252,
    Cp1256,
    Utf16Be,
    Utf8,
    Ascii,
    Big5,
    Gb18030,
    EucKr,
}

use CharacterSetEci::*;

// (charset, ECI values, canonical name, other names)
type CharsetEntry = (CharacterSetEci, &'static [u32], &'static str, &'static [&'static str]);

static CHARSETS: [CharsetEntry; 27] = [
    (Cp437, &[0, 2], "Cp437", &["IBM437"]),
    (Iso8859_1, &[1, 3], "ISO-8859-1", &["ISO8859_1", "LATIN1"]),
    (Iso8859_2, &[4], "ISO-8859-2", &["ISO8859_2"]),
    (Iso8859_3, &[5], "ISO-8859-3", &["ISO8859_3"]),
    (Iso8859_4, &[6], "ISO-8859-4", &["ISO8859_4"]),
    (Iso8859_5, &[7], "ISO-8859-5", &["ISO8859_5"]),
    (Iso8859_6, &[8], "ISO-8859-6", &["ISO8859_6"]),
    (Iso8859_7, &[9], "ISO-8859-7", &["ISO8859_7"]),
    (Iso8859_8, &[10], "ISO-8859-8", &["ISO8859_8"]),
    (Iso8859_9, &[11], "ISO-8859-9", &["ISO8859_9"]),
    (Iso8859_10, &[12], "ISO-8859-10", &["ISO8859_10"]),
    (Iso8859_11, &[13], "ISO-8859-11", &["ISO8859_11"]),
    (Iso8859_13, &[15], "ISO-8859-13", &["ISO8859_13"]),
    (Iso8859_14, &[16], "ISO-8859-14", &["ISO8859_14"]),
    (Iso8859_15, &[17], "ISO-8859-15", &["ISO8859_15"]),
    (Iso8859_16, &[18], "ISO-8859-16", &["ISO8859_16"]),
    (ShiftJis, &[20], "Shift_JIS", &["SJIS"]),
    (Cp1250, &[21], "windows-1250", &["Cp1250"]),
    (Cp1251, &[22], "windows-1251", &["Cp1251"]),
    (Cp1252, &[23], "windows-1252", &["Cp1252"]),
    (Cp1256, &[24], "windows-1256", &["Cp1256"]),
    (Utf16Be, &[25], "UTF-16BE", &["UnicodeBig", "UnicodeBigUnmarked"]),
    (Utf8, &[26], "UTF-8", &["UTF8"]),
    (Ascii, &[27, 170], "US-ASCII", &["ASCII"]),
    (Big5, &[28], "Big5", &[]),
    (Gb18030, &[29], "GB18030", &["GB2312", "EUC_CN", "GBK"]),
    (EucKr, &[30], "EUC-KR", &["EUC_KR"]),
];

impl CharacterSetEci {
    fn entry(self) -> &'static CharsetEntry {
        // Every variant has exactly one row
        CHARSETS.iter().find(|e| e.0 == self).unwrap_or(&CHARSETS[1])
    }

    /// Primary ECI value
    pub fn value(self) -> u32 {
        self.entry().1[0]
    }

    pub fn name(self) -> &'static str {
        self.entry().2
    }

    pub fn from_value(value: u32) -> BarcodeResult<Self> {
        if value >= 900 {
            return Err(BarcodeError::Format);
        }
        CHARSETS
            .iter()
            .find(|e| e.1.contains(&value))
            .map(|e| e.0)
            .ok_or(BarcodeError::Format)
    }

    /// Looks up a character set by any of its names, ignoring case
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        CHARSETS
            .iter()
            .find(|e| {
                e.2.eq_ignore_ascii_case(name) || e.3.iter().any(|n| n.eq_ignore_ascii_case(name))
            })
            .map(|e| e.0)
    }

    fn encoding(self) -> Option<&'static Encoding> {
        match self {
            Cp437 | Iso8859_1 | Ascii | Utf16Be => None,
            Utf8 => Some(encoding_rs::UTF_8),
            _ => Encoding::for_label(self.name().as_bytes()),
        }
    }

    pub fn decode(self, bytes: &[u8]) -> BarcodeResult<String> {
        match self {
            Iso8859_1 | Ascii => Ok(bytes.iter().map(|&b| b as char).collect()),
            Utf16Be => {
                let (text, _) = encoding_rs::UTF_16BE.decode_without_bom_handling(bytes);
                Ok(text.into_owned())
            }
            _ => {
                let enc = self.encoding().ok_or(BarcodeError::Format)?;
                let (text, _) = enc.decode_without_bom_handling(bytes);
                Ok(text.into_owned())
            }
        }
    }

    /// Encodes `text`, failing when some character has no representation
    pub fn encode(self, text: &str) -> BarcodeResult<Vec<u8>> {
        let unmappable = || BarcodeError::illegal(format!("Cannot encode {text:?} as {self}"));
        match self {
            Iso8859_1 => text.chars().map(|c| u8::try_from(c).map_err(|_| unmappable())).collect(),
            Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { Ok(c as u8) } else { Err(unmappable()) })
                .collect(),
            Utf16Be => Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect()),
            Utf8 => Ok(text.as_bytes().to_vec()),
            _ => {
                let enc = self.encoding().ok_or_else(unmappable)?;
                let (bytes, _, had_errors) = enc.encode(text);
                if had_errors {
                    return Err(unmappable());
                }
                Ok(bytes.into_owned())
            }
        }
    }

    pub fn can_encode(self, text: &str) -> bool {
        self.encode(text).is_ok()
    }
}

impl Display for CharacterSetEci {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

/// Best guess at the character set of byte mode data that carries no ECI
pub fn guess_encoding(bytes: &[u8], hint: Option<CharacterSetEci>) -> CharacterSetEci {
    if let Some(cs) = hint {
        return cs;
    }
    if bytes.starts_with(&[0xef, 0xbb, 0xbf]) {
        return Utf8;
    }
    if bytes.is_ascii() {
        return Iso8859_1;
    }
    if std::str::from_utf8(bytes).is_ok() {
        return Utf8;
    }
    if looks_like_shift_jis(bytes) {
        return ShiftJis;
    }
    Iso8859_1
}

// Valid Shift_JIS with at least two consecutive double byte characters
fn looks_like_shift_jis(bytes: &[u8]) -> bool {
    let (_, _, had_errors) = encoding_rs::SHIFT_JIS.decode(bytes);
    if had_errors {
        return false;
    }
    let mut i = 0;
    let mut run = 0;
    let mut max_run = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if matches!(b, 0x81..=0x9f | 0xe0..=0xef) && i + 1 < bytes.len() {
            run += 1;
            max_run = max_run.max(run);
            i += 2;
        } else {
            run = 0;
            i += 1;
        }
    }
    max_run >= 2
}

#[cfg(test)]
mod charset_tests {
    use super::{guess_encoding, CharacterSetEci};
    use test_case::test_case;

    #[test_case(0, CharacterSetEci::Cp437)]
    #[test_case(3, CharacterSetEci::Iso8859_1)]
    #[test_case(20, CharacterSetEci::ShiftJis)]
    #[test_case(26, CharacterSetEci::Utf8)]
    #[test_case(170, CharacterSetEci::Ascii)]
    fn test_from_value(value: u32, exp: CharacterSetEci) {
        assert_eq!(CharacterSetEci::from_value(value), Ok(exp));
    }

    #[test]
    fn test_unknown_value() {
        assert!(CharacterSetEci::from_value(14).is_err());
        assert!(CharacterSetEci::from_value(900).is_err());
    }

    #[test_case("utf-8", CharacterSetEci::Utf8)]
    #[test_case("SJIS", CharacterSetEci::ShiftJis)]
    #[test_case("iso-8859-1", CharacterSetEci::Iso8859_1)]
    #[test_case("gb2312", CharacterSetEci::Gb18030)]
    fn test_from_name(name: &str, exp: CharacterSetEci) {
        assert_eq!(CharacterSetEci::from_name(name), Some(exp));
    }

    #[test]
    fn test_latin1_round_trip() {
        let cs = CharacterSetEci::Iso8859_1;
        let bytes = cs.encode("café").unwrap();
        assert_eq!(bytes, b"caf\xe9");
        assert_eq!(cs.decode(&bytes).unwrap(), "café");
        assert!(!cs.can_encode("日本"));
    }

    #[test]
    fn test_shift_jis() {
        let cs = CharacterSetEci::ShiftJis;
        let bytes = cs.encode("点茗").unwrap();
        assert_eq!(bytes, [0x93, 0x5f, 0xe4, 0xaa]);
        assert_eq!(cs.decode(&bytes).unwrap(), "点茗");
    }

    #[test]
    fn test_utf16be() {
        let cs = CharacterSetEci::Utf16Be;
        let bytes = cs.encode("Aé").unwrap();
        assert_eq!(bytes, [0x00, 0x41, 0x00, 0xe9]);
        assert_eq!(cs.decode(&bytes).unwrap(), "Aé");
    }

    #[test]
    fn test_cp437_is_unsupported() {
        assert!(CharacterSetEci::Cp437.decode(b"abc").is_err());
    }

    #[test]
    fn test_guess_encoding() {
        assert_eq!(guess_encoding(b"hello", None), CharacterSetEci::Iso8859_1);
        assert_eq!(guess_encoding("héllo".as_bytes(), None), CharacterSetEci::Utf8);
        assert_eq!(guess_encoding(&[0x93, 0x5f, 0xe4, 0xaa], None), CharacterSetEci::ShiftJis);
        assert_eq!(guess_encoding(b"caf\xe9", None), CharacterSetEci::Iso8859_1);
        assert_eq!(
            guess_encoding(b"abc", Some(CharacterSetEci::Utf16Be)),
            CharacterSetEci::Utf16Be
        );
    }
}
