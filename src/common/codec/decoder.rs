pub use decode::*;

// Reader for encoded data
//------------------------------------------------------------------------------

mod reader {
    use std::cmp::min;

    use crate::common::bitstream::BitStream;
    use crate::common::charset::{guess_encoding, CharacterSetEci};
    use crate::common::codec::types::{Mode, GS};
    use crate::common::error::{BarcodeError, BarcodeResult};
    use crate::common::metadata::Version;

    /// Everything that carries over from one segment to the next
    #[derive(Debug, Default)]
    pub struct ParseState {
        pub charset: Option<CharacterSetEci>,
        pub hint: Option<CharacterSetEci>,
        pub fnc1_first: bool,
        pub fnc1_second: bool,
        pub structured_append: Option<(u8, u8)>,
        pub byte_segments: Vec<Vec<u8>>,
    }

    impl ParseState {
        fn fnc1_in_effect(&self) -> bool {
            self.fnc1_first || self.fnc1_second
        }
    }

    /// Reads one segment into `out` and returns its mode. `Terminator` ends the stream.
    pub fn write_segment(
        inp: &mut BitStream,
        ver: Version,
        state: &mut ParseState,
        out: &mut String,
    ) -> BarcodeResult<Mode> {
        // Fewer than four bits left means an implicit terminator
        let mode = match inp.available() {
            0..=3 => Mode::Terminator,
            _ => Mode::from_bits(take(inp, 4)?)?,
        };

        match mode {
            Mode::Terminator => {}
            Mode::Fnc1First => state.fnc1_first = true,
            Mode::Fnc1Second => {
                // Application indicator, not part of the text
                take(inp, 8)?;
                state.fnc1_second = true;
            }
            Mode::StructuredAppend => {
                let seq = take(inp, 8)? as u8;
                let parity = take(inp, 8)? as u8;
                state.structured_append = Some((seq, parity));
            }
            Mode::Eci => {
                let value = take_eci_value(inp)?;
                state.charset = Some(CharacterSetEci::from_value(value)?);
            }
            Mode::Hanzi => {
                let subset = take(inp, 4)?;
                let char_cnt = take(inp, mode.char_count_bits(ver))? as usize;
                // Only GB2312 is defined
                if subset == 1 {
                    write_double_byte(inp, mode, char_cnt, CharacterSetEci::Gb18030, out)?;
                }
            }
            _ => {
                let char_cnt = take(inp, mode.char_count_bits(ver))? as usize;
                match mode {
                    Mode::Numeric => write_numeric(inp, char_cnt, out)?,
                    Mode::Alphanumeric => {
                        write_alphanumeric(inp, char_cnt, state.fnc1_in_effect(), out)?
                    }
                    Mode::Byte => write_byte(inp, char_cnt, state, out)?,
                    Mode::Kanji => {
                        write_double_byte(inp, mode, char_cnt, CharacterSetEci::ShiftJis, out)?
                    }
                    _ => return Err(BarcodeError::Format),
                }
            }
        }

        Ok(mode)
    }

    fn take(inp: &mut BitStream, size: usize) -> BarcodeResult<u32> {
        inp.take_bits(size).ok_or(BarcodeError::Format)
    }

    // One, two or three bytes, flagged by the leading bits of the first
    fn take_eci_value(inp: &mut BitStream) -> BarcodeResult<u32> {
        let first = take(inp, 8)?;
        match first {
            _ if first & 0x80 == 0 => Ok(first & 0x7f),
            _ if first & 0xc0 == 0x80 => Ok(((first & 0x3f) << 8) | take(inp, 8)?),
            _ if first & 0xe0 == 0xc0 => Ok(((first & 0x1f) << 16) | take(inp, 16)?),
            _ => Err(BarcodeError::Format),
        }
    }

    pub(super) fn write_numeric(
        inp: &mut BitStream,
        mut char_cnt: usize,
        out: &mut String,
    ) -> BarcodeResult<()> {
        while char_cnt > 0 {
            let bit_len = if char_cnt > 2 { 10 } else { (char_cnt % 3) * 3 + 1 };
            let chunk = take(inp, bit_len)?;
            let decoded = Mode::Numeric.decode_chunk(chunk as u16, bit_len)?;
            out.extend(decoded.into_iter().map(char::from));
            char_cnt -= min(3, char_cnt);
        }

        Ok(())
    }

    pub(super) fn write_alphanumeric(
        inp: &mut BitStream,
        mut char_cnt: usize,
        fnc1_in_effect: bool,
        out: &mut String,
    ) -> BarcodeResult<()> {
        let mut seg = String::with_capacity(char_cnt);
        while char_cnt > 0 {
            let bit_len = if char_cnt > 1 { 11 } else { 6 };
            let chunk = take(inp, bit_len)?;
            let decoded = Mode::Alphanumeric.decode_chunk(chunk as u16, bit_len)?;
            seg.extend(decoded.into_iter().map(char::from));
            char_cnt -= min(2, char_cnt);
        }

        // Under FNC1 a lone % is a group separator and %% an escaped %
        if fnc1_in_effect {
            let mut chars = seg.chars().peekable();
            while let Some(c) = chars.next() {
                match c {
                    '%' if chars.peek() == Some(&'%') => {
                        chars.next();
                        out.push('%');
                    }
                    '%' => out.push(GS),
                    _ => out.push(c),
                }
            }
        } else {
            out.push_str(&seg);
        }

        Ok(())
    }

    pub(super) fn write_byte(
        inp: &mut BitStream,
        char_cnt: usize,
        state: &mut ParseState,
        out: &mut String,
    ) -> BarcodeResult<()> {
        if char_cnt * 8 > inp.available() {
            return Err(BarcodeError::Format);
        }
        let mut bytes = Vec::with_capacity(char_cnt);
        for _ in 0..char_cnt {
            bytes.push(take(inp, 8)? as u8);
        }

        let charset = match state.charset {
            Some(cs) => cs,
            None => guess_encoding(&bytes, state.hint),
        };
        out.push_str(&charset.decode(&bytes)?);
        state.byte_segments.push(bytes);

        Ok(())
    }

    fn write_double_byte(
        inp: &mut BitStream,
        mode: Mode,
        char_cnt: usize,
        charset: CharacterSetEci,
        out: &mut String,
    ) -> BarcodeResult<()> {
        if char_cnt * 13 > inp.available() {
            return Err(BarcodeError::Format);
        }
        let mut bytes = Vec::with_capacity(char_cnt * 2);
        for _ in 0..char_cnt {
            let chunk = take(inp, 13)?;
            bytes.extend(mode.decode_chunk(chunk as u16, 13)?);
        }
        out.push_str(&charset.decode(&bytes)?);

        Ok(())
    }

    #[cfg(test)]
    mod reader_tests {
        use super::{
            take_eci_value, write_alphanumeric, write_byte, write_numeric, write_segment,
            BitStream, Mode, ParseState,
        };
        use crate::common::charset::CharacterSetEci;
        use crate::common::metadata::Version;

        #[test]
        fn test_take_header_v1() {
            let data = vec![0b00011111, 0b11111100, 0b10111111, 0b11101001, 0b11111110];
            let mut bs = BitStream::from(&data[..]);
            assert_eq!(bs.take_bits(4), Some(Mode::Numeric as u32));
            assert_eq!(bs.take_bits(Mode::Numeric.char_count_bits(Version::MIN)), Some(1023));
            assert_eq!(bs.take_bits(4), Some(Mode::Alphanumeric as u32));
            assert_eq!(bs.take_bits(Mode::Alphanumeric.char_count_bits(Version::MIN)), Some(511));
            assert_eq!(bs.take_bits(4), Some(Mode::Byte as u32));
            assert_eq!(bs.take_bits(Mode::Byte.char_count_bits(Version::MIN)), Some(255));
        }

        #[test]
        fn test_write_numeric() {
            // 123 45 then 6
            let mut bs = BitStream::new();
            bs.push_bits(123u16, 10);
            bs.push_bits(45u16, 7);
            bs.push_bits(6u16, 4);
            let mut out = String::new();
            write_numeric(&mut bs, 3, &mut out).unwrap();
            assert_eq!(out, "123");
            write_numeric(&mut bs, 2, &mut out).unwrap();
            assert_eq!(out, "12345");
            write_numeric(&mut bs, 1, &mut out).unwrap();
            assert_eq!(out, "123456");
        }

        #[test]
        fn test_write_numeric_out_of_range() {
            let mut bs = BitStream::new();
            bs.push_bits(1000u16, 10);
            assert!(write_numeric(&mut bs, 3, &mut String::new()).is_err());
        }

        #[test]
        fn test_write_alphanumeric() {
            let mut bs = BitStream::new();
            bs.push_bits(0b00111001110u16, 11);
            bs.push_bits(41u16, 6);
            let mut out = String::new();
            write_alphanumeric(&mut bs, 3, false, &mut out).unwrap();
            assert_eq!(out, "AC-");
        }

        #[test]
        fn test_write_alphanumeric_fnc1() {
            // "A%%B%C" under FNC1 becomes "A%B<GS>C"
            let digits = [10u16, 38, 38, 11, 38, 12];
            let mut bs = BitStream::new();
            for pair in digits.chunks(2) {
                bs.push_bits(pair[0] * 45 + pair[1], 11);
            }
            let mut out = String::new();
            write_alphanumeric(&mut bs, 6, true, &mut out).unwrap();
            assert_eq!(out, "A%B\u{1d}C");
        }

        #[test]
        fn test_write_byte() {
            let mut bs = BitStream::from(&b"abc"[..]);
            let mut state = ParseState::default();
            let mut out = String::new();
            write_byte(&mut bs, 2, &mut state, &mut out).unwrap();
            assert_eq!(out, "ab");
            write_byte(&mut bs, 1, &mut state, &mut out).unwrap();
            assert_eq!(out, "abc");
            assert_eq!(state.byte_segments, vec![b"ab".to_vec(), b"c".to_vec()]);
            assert!(write_byte(&mut bs, 1, &mut state, &mut out).is_err());
        }

        #[test]
        fn test_write_byte_with_eci() {
            let mut bs = BitStream::from(&[0x93, 0x5f][..]);
            let mut state =
                ParseState { charset: Some(CharacterSetEci::ShiftJis), ..Default::default() };
            let mut out = String::new();
            write_byte(&mut bs, 2, &mut state, &mut out).unwrap();
            assert_eq!(out, "点");
        }

        #[test]
        fn test_eci_value() {
            let mut bs = BitStream::from(&[0x1a, 0x80 | 0x01, 0x02, 0xc0, 0x12, 0x34][..]);
            assert_eq!(take_eci_value(&mut bs), Ok(26));
            assert_eq!(take_eci_value(&mut bs), Ok(0x102));
            assert_eq!(take_eci_value(&mut bs), Ok(0x1234));
            let mut bs = BitStream::from(&[0xe0][..]);
            assert!(take_eci_value(&mut bs).is_err());
        }

        #[test]
        fn test_implicit_terminator() {
            let mut bs = BitStream::new();
            bs.push_bits(0b111u8, 3);
            let mut state = ParseState::default();
            let mode = write_segment(&mut bs, Version::MIN, &mut state, &mut String::new());
            assert_eq!(mode, Ok(Mode::Terminator));
        }

        #[test]
        fn test_structured_append() {
            let mut bs = BitStream::new();
            bs.push_bits(0b0011u8, 4);
            bs.push_bits(0x21u8, 8);
            bs.push_bits(0x5au8, 8);
            let mut state = ParseState::default();
            write_segment(&mut bs, Version::MIN, &mut state, &mut String::new()).unwrap();
            assert_eq!(state.structured_append, Some((0x21, 0x5a)));
        }
    }
}

// Decoder
//------------------------------------------------------------------------------

pub mod decode {
    use log::trace;

    use super::reader::{write_segment, ParseState};
    use crate::common::bitstream::BitStream;
    use crate::common::charset::CharacterSetEci;
    use crate::common::codec::types::Mode;
    use crate::common::error::BarcodeResult;
    use crate::common::metadata::{ECLevel, Version};
    use crate::common::result::DecoderResult;

    /// Parses the corrected data codewords of a symbol into text. `hint` is used for
    /// byte segments not covered by an ECI.
    pub fn decode(
        bytes: &[u8],
        ver: Version,
        ecl: ECLevel,
        hint: Option<CharacterSetEci>,
    ) -> BarcodeResult<DecoderResult> {
        let mut encoded = BitStream::from(bytes);
        let mut state = ParseState { hint, ..Default::default() };
        let mut text = String::with_capacity(bytes.len());
        loop {
            let mode = write_segment(&mut encoded, ver, &mut state, &mut text)?;
            trace!("Parsed {mode:?} segment, {} bits left", encoded.available());
            if mode == Mode::Terminator {
                break;
            }
        }

        let flags = (state.charset.is_some(), state.fnc1_first, state.fnc1_second);
        let symbology_modifier = match flags {
            (true, true, _) => 4,
            (true, _, true) => 6,
            (true, _, _) => 2,
            (false, true, _) => 3,
            (false, _, true) => 5,
            (false, _, _) => 1,
        };

        Ok(DecoderResult {
            raw_bytes: bytes.to_vec(),
            num_bits: bytes.len() * 8,
            text,
            byte_segments: state.byte_segments,
            ec_level: Some(ecl.to_string()),
            structured_append_sequence: state.structured_append.map(|sa| sa.0),
            structured_append_parity: state.structured_append.map(|sa| sa.1),
            symbology_modifier,
            ..Default::default()
        })
    }

}
