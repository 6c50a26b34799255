use log::trace;

use super::OneDReader;
use crate::common::{
    bit_array::BitArray,
    error::{BarcodeError, BarcodeResult},
    format::BarcodeFormat,
    hints::DecodeHints,
    point::Point,
    result::{DecodedBarcode, MetadataValue, ResultMetadataKey},
};

// Codabar tables
//------------------------------------------------------------------------------

// Thresholds for the widest stripes, as a multiple of their average plus padding
const MAX_ACCEPTABLE: f32 = 2.0;
const PADDING: f32 = 1.5;

pub(crate) const ALPHABET: &[u8; 20] = b"0123456789-$:/.+ABCD";

/// Seven element patterns, most significant bit first, a set bit marking a wide element
pub(crate) const CHARACTER_ENCODINGS: [u32; 20] = [
    0x003, 0x006, 0x009, 0x060, 0x012, 0x042, 0x021, 0x024, 0x030, 0x048, // 0-9
    0x00c, 0x018, 0x045, 0x051, 0x054, 0x015, 0x01A, 0x029, 0x00B, 0x00E, // -$:/.+ABCD
];

pub(crate) const START_END_ENCODING: [u8; 4] = [b'A', b'B', b'C', b'D'];

// Start, stop and at least one character
const MIN_CHARACTER_LENGTH: usize = 3;

// Codabar reader
//------------------------------------------------------------------------------

/// Reads Codabar. The whole row is first turned into run lengths, starting with the
/// first light module, and characters are then matched eight runs at a time.
pub struct CodabarReader {
    counters: Vec<usize>,
    // Alphabet indexes of the characters read so far
    decoded: Vec<usize>,
}

impl CodabarReader {
    pub fn new() -> Self {
        Self { counters: Vec::with_capacity(80), decoded: Vec::with_capacity(20) }
    }

    fn set_counters(&mut self, row: &BitArray) -> BarcodeResult<()> {
        self.counters.clear();
        let end = row.size();
        let mut i = row.next_unset(0);
        if i >= end {
            return Err(BarcodeError::NotFound);
        }
        let mut is_white = true;
        let mut count = 0;
        while i < end {
            if row.get(i) != is_white {
                count += 1;
            } else {
                self.counters.push(count);
                count = 1;
                is_white = !is_white;
            }
            i += 1;
        }
        self.counters.push(count);
        Ok(())
    }

    fn find_start_pattern(&self) -> BarcodeResult<usize> {
        for i in (1..self.counters.len()).step_by(2) {
            let Some(offset) = self.to_narrow_wide_pattern(i) else {
                continue;
            };
            if !START_END_ENCODING.contains(&ALPHABET[offset]) {
                continue;
            }
            // Whitespace before the start must be at least half its width, unless the
            // whitespace is the first run of the row
            let pattern_size = self.counters[i..i + 7].iter().sum::<usize>();
            if i == 1 || self.counters[i - 1] >= pattern_size / 2 {
                return Ok(i);
            }
        }
        Err(BarcodeError::NotFound)
    }

    // Alphabet index of the seven runs at `position`, each run classed against the
    // midpoint of the narrowest and widest run of its color
    fn to_narrow_wide_pattern(&self, position: usize) -> Option<usize> {
        let end = position + 7;
        if end >= self.counters.len() {
            return None;
        }
        let runs = &self.counters[position..end];
        let threshold = |first: usize| {
            let (min, max) = runs
                .iter()
                .skip(first)
                .step_by(2)
                .fold((usize::MAX, 0), |(min, max), &c| (min.min(c), max.max(c)));
            (min + max) / 2
        };
        let threshold_bar = threshold(0);
        let threshold_space = threshold(1);

        let mut pattern = 0;
        for (i, &run) in runs.iter().enumerate() {
            let threshold = if i & 1 == 0 { threshold_bar } else { threshold_space };
            if run > threshold {
                pattern |= 1 << (6 - i);
            }
        }
        CHARACTER_ENCODINGS.iter().position(|&e| e == pattern)
    }

    // Checks every stripe against the average narrow and wide size of its color
    fn validate_pattern(&self, start: usize) -> BarcodeResult<()> {
        // Narrow bars, narrow spaces, wide bars, wide spaces
        let mut sizes = [0; 4];
        let mut counts = [0; 4];
        let categories = |offset: usize| {
            let mut pattern = CHARACTER_ENCODINGS[offset];
            (0..7).rev().map(move |j| {
                let category = (j & 1) + (pattern & 1) as usize * 2;
                pattern >>= 1;
                (j, category)
            })
        };

        let mut pos = start;
        for &offset in &self.decoded {
            for (j, category) in categories(offset) {
                sizes[category] += self.counters[pos + j];
                counts[category] += 1;
            }
            // The inter-character space can be of any size
            pos += 8;
        }

        let mut mins = [0.0f32; 4];
        let mut maxes = [0.0f32; 4];
        for i in 0..2 {
            // Short stripes may be arbitrarily small
            mins[i + 2] = (sizes[i] as f32 / counts[i] as f32
                + sizes[i + 2] as f32 / counts[i + 2] as f32)
                / 2.0;
            maxes[i] = mins[i + 2];
            maxes[i + 2] = (sizes[i + 2] as f32 * MAX_ACCEPTABLE + PADDING) / counts[i + 2] as f32;
        }

        let mut pos = start;
        for &offset in &self.decoded {
            for (j, category) in categories(offset) {
                let size = self.counters[pos + j] as f32;
                if size < mins[category] || size > maxes[category] {
                    return Err(BarcodeError::NotFound);
                }
            }
            pos += 8;
        }
        Ok(())
    }
}

impl Default for CodabarReader {
    fn default() -> Self {
        Self::new()
    }
}

impl OneDReader for CodabarReader {
    fn decode_row(
        &mut self,
        row_number: usize,
        row: &BitArray,
        hints: &DecodeHints,
    ) -> BarcodeResult<DecodedBarcode> {
        self.set_counters(row)?;
        let start_offset = self.find_start_pattern()?;
        let mut next_start = start_offset;

        // No fixed end pattern, read until a stop character or the end of the runs
        self.decoded.clear();
        loop {
            let offset = self.to_narrow_wide_pattern(next_start).ok_or(BarcodeError::NotFound)?;
            self.decoded.push(offset);
            next_start += 8;
            if self.decoded.len() > 1 && START_END_ENCODING.contains(&ALPHABET[offset]) {
                break;
            }
            if next_start >= self.counters.len() {
                break;
            }
        }

        // Whitespace after the stop must be half its width, unless the row ends there
        let trailing_whitespace = self.counters[next_start - 1];
        let last_pattern_size = self.counters[next_start - 8..next_start - 1].iter().sum::<usize>();
        if next_start < self.counters.len() && trailing_whitespace < last_pattern_size / 2 {
            return Err(BarcodeError::NotFound);
        }

        self.validate_pattern(start_offset)?;

        let mut text = self.decoded.iter().map(|&i| char::from(ALPHABET[i])).collect::<String>();
        let is_guard = |c: Option<char>| {
            c.is_some_and(|c| c.is_ascii() && START_END_ENCODING.contains(&(c as u8)))
        };
        if !is_guard(text.chars().next()) || !is_guard(text.chars().last()) {
            return Err(BarcodeError::NotFound);
        }
        if text.len() <= MIN_CHARACTER_LENGTH {
            return Err(BarcodeError::NotFound);
        }
        if !hints.return_codabar_start_end {
            text.pop();
            text.remove(0);
        }
        trace!("Decoded Codabar {text} on row {row_number}");

        let left = self.counters[..start_offset].iter().sum::<usize>();
        let right = left + self.counters[start_offset..next_start - 1].iter().sum::<usize>();
        let y = row_number as f32;
        let mut res = DecodedBarcode::new(
            text,
            None,
            vec![Point::new(left as f32, y), Point::new(right as f32, y)],
            BarcodeFormat::Codabar,
        );
        res.put_metadata(ResultMetadataKey::SymbologyIdentifier, MetadataValue::Text("]F0".into()));
        Ok(res)
    }
}
