pub use encode::*;

// Encoder
//------------------------------------------------------------------------------

pub mod encode {
    use log::debug;

    use crate::common::bitstream::BitStream;
    use crate::common::charset::CharacterSetEci;
    use crate::common::codec::types::{is_only_double_byte_kanji, Mode, Segment};
    use crate::common::error::{BarcodeError, BarcodeResult};
    use crate::common::metadata::{ECLevel, Version};

    use super::writer::{
        pad_remaining_capacity, push_eci, push_fnc1_first, push_segment, push_terminator,
    };

    /// Data codewords of a symbol together with the choices that produced them
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct EncodedData {
        pub bits: BitStream,
        pub version: Version,
        pub ec_level: ECLevel,
        pub mode: Mode,
    }

    /// Picks one mode for the whole content, prefixes ECI and FNC1 headers as needed and
    /// finds the smallest version that fits unless `version` pins one.
    pub fn encode(
        content: &str,
        ec_level: ECLevel,
        charset: Option<CharacterSetEci>,
        gs1: bool,
        version: Option<Version>,
    ) -> BarcodeResult<EncodedData> {
        let (encoding, explicit) = match charset {
            Some(cs) => (cs, true),
            None if CharacterSetEci::Iso8859_1.can_encode(content) => {
                (CharacterSetEci::Iso8859_1, false)
            }
            None => (CharacterSetEci::Utf8, false),
        };

        let (mode, data) = choose_mode(content, encoding)?;

        let mut header = BitStream::new();
        if mode == Mode::Byte && (explicit || encoding != CharacterSetEci::Iso8859_1) {
            push_eci(encoding, &mut header);
        }
        if gs1 {
            push_fnc1_first(&mut header);
        }

        let version = match version {
            Some(v) => {
                let seg = Segment::new(mode, v, &data);
                if !will_fit(header.len() + seg.bit_len(), v, ec_level) {
                    return Err(BarcodeError::illegal("Data too big for requested version"));
                }
                v
            }
            None => recommend_version(&header, mode, &data, ec_level)?,
        };
        debug!("QR content fits version {version} at level {ec_level} in {mode:?} mode");

        let seg = Segment::new(mode, version, &data);
        if seg.char_count() >= 1 << seg.len_bits {
            return Err(BarcodeError::illegal("Character count exceeds the count field"));
        }

        let bcap = version.data_bit_capacity(ec_level);
        let mut bits = BitStream::with_capacity(bcap);
        bits.extend(&header);
        push_segment(&seg, &mut bits);
        push_terminator(&mut bits, bcap);
        pad_remaining_capacity(&mut bits, bcap);
        Ok(EncodedData { bits, version, ec_level, mode })
    }

    /// Numeric when every char is a digit, then alphanumeric, else bytes in `encoding`.
    /// Kanji only when the content is Shift_JIS and entirely double byte.
    pub(crate) fn choose_mode(
        content: &str,
        encoding: CharacterSetEci,
    ) -> BarcodeResult<(Mode, Vec<u8>)> {
        if encoding == CharacterSetEci::ShiftJis {
            let bytes = encoding.encode(content)?;
            if is_only_double_byte_kanji(&bytes) {
                return Ok((Mode::Kanji, bytes));
            }
        }

        let bytes = content.as_bytes();
        let mode = if content.is_ascii() {
            bytes.iter().fold(Mode::Numeric, |mode, &b| {
                if Mode::Numeric.contains(b) {
                    mode
                } else if Mode::Alphanumeric.contains(b) && mode < Mode::Byte {
                    Mode::Alphanumeric
                } else {
                    Mode::Byte
                }
            })
        } else {
            Mode::Byte
        };

        match mode {
            Mode::Byte => Ok((mode, encoding.encode(content)?)),
            _ => Ok((mode, bytes.to_vec())),
        }
    }

    fn will_fit(num_bits: usize, version: Version, ec_level: ECLevel) -> bool {
        num_bits <= version.data_bit_capacity(ec_level)
    }

    // The count field width depends on the version, so size with version 1 first and
    // then confirm with the provisional result
    fn recommend_version(
        header: &BitStream,
        mode: Mode,
        data: &[u8],
        ec_level: ECLevel,
    ) -> BarcodeResult<Version> {
        let bits_for = |v: Version| header.len() + Segment::new(mode, v, data).bit_len();
        let provisional = choose_version(bits_for(Version::MIN), ec_level)?;
        choose_version(bits_for(provisional), ec_level)
    }

    fn choose_version(num_bits: usize, ec_level: ECLevel) -> BarcodeResult<Version> {
        Version::all()
            .find(|&v| will_fit(num_bits, v, ec_level))
            .ok_or_else(|| BarcodeError::illegal("Data too big"))
    }

    #[cfg(test)]
    mod encode_tests {
        use test_case::test_case;

        use super::{choose_mode, encode, CharacterSetEci, ECLevel, Mode, Version};

        #[test_case("0123456789", Mode::Numeric)]
        #[test_case("AC-42", Mode::Alphanumeric)]
        #[test_case("aaaaa11111AAA", Mode::Byte)]
        #[test_case("héllo", Mode::Byte)]
        #[test_case("", Mode::Numeric)]
        fn test_choose_mode(content: &str, exp: Mode) {
            let (mode, _) = choose_mode(content, CharacterSetEci::Iso8859_1).unwrap();
            assert_eq!(mode, exp);
        }

        #[test]
        fn test_choose_kanji_mode() {
            let (mode, data) = choose_mode("点茗", CharacterSetEci::ShiftJis).unwrap();
            assert_eq!(mode, Mode::Kanji);
            assert_eq!(data, [0x93, 0x5f, 0xe4, 0xaa]);
            let (mode, _) = choose_mode("点a", CharacterSetEci::ShiftJis).unwrap();
            assert_eq!(mode, Mode::Byte);
        }

        #[test_case("1".repeat(41), ECLevel::L, 1)]
        #[test_case("1".repeat(42), ECLevel::L, 2)]
        #[test_case("A".repeat(25), ECLevel::L, 1)]
        #[test_case("a".repeat(17), ECLevel::L, 1)]
        #[test_case("a".repeat(18), ECLevel::L, 2)]
        #[test_case("a".repeat(14), ECLevel::M, 1)]
        #[test_case("a".repeat(7), ECLevel::H, 1)]
        #[test_case("a".repeat(2953), ECLevel::L, 40)]
        fn test_smallest_version(content: String, ecl: ECLevel, exp: usize) {
            let encoded = encode(&content, ecl, None, false, None).unwrap();
            assert_eq!(*encoded.version, exp);
            assert_eq!(encoded.bits.len(), encoded.version.data_bit_capacity(ecl));
        }

        #[test]
        fn test_data_too_big() {
            let content = "a".repeat(2954);
            assert!(encode(&content, ECLevel::L, None, false, None).is_err());
            let v1 = Version::new(1).ok();
            assert!(encode(&"a".repeat(18), ECLevel::L, None, false, v1).is_err());
        }

        #[test]
        fn test_encode_numeric_v1() {
            // ISO 18004 Annex I example
            let encoded = encode("01234567", ECLevel::M, None, false, None).unwrap();
            assert_eq!(
                encoded.bits.data(),
                [
                    0x10, 0x20, 0x0c, 0x56, 0x61, 0x80, 0xec, 0x11, 0xec, 0x11, 0xec, 0x11, 0xec,
                    0x11, 0xec, 0x11
                ]
            );
        }

        #[test]
        fn test_utf8_adds_eci() {
            let encoded = encode("日本", ECLevel::L, None, false, None).unwrap();
            // ECI mode, value 26, then byte mode
            assert_eq!(encoded.bits.data()[..2], [0b0111_0001, 0b1010_0100]);
        }

        #[test]
        fn test_gs1_adds_fnc1() {
            let encoded = encode("0101", ECLevel::L, None, true, None).unwrap();
            assert_eq!(encoded.bits.data()[0] >> 4, 0b0101);
            assert_eq!(encoded.bits.data()[0] & 0xf, 0b0001);
        }
    }
}

// Writer for encoded data
//------------------------------------------------------------------------------

pub(super) mod writer {
    use crate::common::bitstream::BitStream;
    use crate::common::charset::CharacterSetEci;
    use crate::common::codec::types::{Mode, Segment, PADDING_CODEWORDS};

    pub fn push_segment(seg: &Segment, out: &mut BitStream) {
        push_header(seg, out);
        match seg.mode {
            Mode::Numeric => push_numeric_data(seg.data, out),
            Mode::Alphanumeric => push_alphanumeric_data(seg.data, out),
            Mode::Byte => push_byte_data(seg.data, out),
            Mode::Kanji => push_kanji_data(seg.data, out),
            _ => unreachable!("No character data in {:?} mode", seg.mode),
        }
    }

    fn push_header(seg: &Segment, out: &mut BitStream) {
        out.push_bits(seg.mode.bits(), Mode::MODE_BITS);
        let char_cnt = seg.char_count();
        debug_assert!(
            char_cnt < (1 << seg.len_bits),
            "Char count exceeds bit length: Char count {char_cnt}, Char count bits {}",
            seg.len_bits
        );
        out.push_bits(char_cnt as u16, seg.len_bits);
    }

    pub fn push_eci(charset: CharacterSetEci, out: &mut BitStream) {
        out.push_bits(Mode::Eci.bits(), Mode::MODE_BITS);
        let value = charset.value();
        match value {
            ..=127 => out.push_bits(value, 8),
            128..=16383 => out.push_bits(0x8000 | value, 16),
            _ => out.push_bits(0xc0_0000 | value, 24),
        }
    }

    pub fn push_fnc1_first(out: &mut BitStream) {
        out.push_bits(Mode::Fnc1First.bits(), Mode::MODE_BITS);
    }

    fn push_numeric_data(data: &[u8], out: &mut BitStream) {
        for chunk in data.chunks(3) {
            let len = (chunk.len() * 10 + 2) / 3;
            let data = Mode::Numeric.encode_chunk(chunk);
            out.push_bits(data, len);
        }
    }

    fn push_alphanumeric_data(data: &[u8], out: &mut BitStream) {
        for chunk in data.chunks(2) {
            let len = (chunk.len() * 11 + 1) / 2;
            let data = Mode::Alphanumeric.encode_chunk(chunk);
            out.push_bits(data, len);
        }
    }

    fn push_byte_data(data: &[u8], out: &mut BitStream) {
        for chunk in data.chunks(1) {
            let data = Mode::Byte.encode_chunk(chunk);
            out.push_bits(data, 8);
        }
    }

    fn push_kanji_data(data: &[u8], out: &mut BitStream) {
        for chunk in data.chunks_exact(2) {
            let data = Mode::Kanji.encode_chunk(chunk);
            out.push_bits(data, 13);
        }
    }

    pub fn push_terminator(out: &mut BitStream, bit_capacity: usize) {
        let bit_len = out.len();
        if bit_len < bit_capacity {
            let term_len = std::cmp::min(4, bit_capacity - bit_len);
            out.push_bits(0u8, term_len);
        }
    }

    pub fn pad_remaining_capacity(out: &mut BitStream, bit_capacity: usize) {
        push_padding_bits(out);
        push_padding_codewords(out, bit_capacity);
    }

    fn push_padding_bits(out: &mut BitStream) {
        let offset = out.len() & 7;
        if offset > 0 {
            let padding_bits_len = 8 - offset;
            out.push_bits(0u8, padding_bits_len);
        }
    }

    fn push_padding_codewords(out: &mut BitStream, bit_capacity: usize) {
        let offset = out.len() & 7;
        debug_assert!(
            offset == 0,
            "Bit offset should be zero before padding codewords: {}",
            offset
        );

        let remain_byte_capacity = bit_capacity.saturating_sub(out.len()) >> 3;
        PADDING_CODEWORDS.iter().copied().cycle().take(remain_byte_capacity).for_each(|pc| {
            out.push_bits(pc, 8);
        });
    }

}
