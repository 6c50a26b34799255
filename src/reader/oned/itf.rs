use log::trace;

use super::{pattern_match_variance, record_pattern, scan_runs, OneDReader};
use crate::common::{
    bit_array::BitArray,
    error::{BarcodeError, BarcodeResult},
    format::BarcodeFormat,
    hints::DecodeHints,
    point::Point,
    result::{DecodedBarcode, MetadataValue, ResultMetadataKey},
};

// ITF tables
//------------------------------------------------------------------------------

const MAX_AVG_VARIANCE: f32 = 0.38;
const MAX_INDIVIDUAL_VARIANCE: f32 = 0.5;

// Wide elements are read at both 2 and 3 times the narrow width
const W: usize = 3;
const SW: usize = 2;
const N: usize = 1;

const DEFAULT_ALLOWED_LENGTHS: [usize; 5] = [6, 8, 10, 12, 14];

pub(crate) const START_PATTERN: [usize; 4] = [N, N, N, N];
pub(crate) const END_PATTERN: [usize; 3] = [W, N, N];
const END_PATTERN_REVERSED: [[usize; 3]; 2] = [[N, N, SW], [N, N, W]];

/// Digit patterns with wide elements of 2 modules, then the same with 3 modules
pub(crate) const PATTERNS: [[usize; 5]; 20] = [
    [N, N, SW, SW, N],
    [SW, N, N, N, SW],
    [N, SW, N, N, SW],
    [SW, SW, N, N, N],
    [N, N, SW, N, SW],
    [SW, N, SW, N, N],
    [N, SW, SW, N, N],
    [N, N, N, SW, SW],
    [SW, N, N, SW, N],
    [N, SW, N, SW, N],
    [N, N, W, W, N],
    [W, N, N, N, W],
    [N, W, N, N, W],
    [W, W, N, N, N],
    [N, N, W, N, W],
    [W, N, W, N, N],
    [N, W, W, N, N],
    [N, N, N, W, W],
    [W, N, N, W, N],
    [N, W, N, W, N],
];

// ITF reader
//------------------------------------------------------------------------------

/// Reads Interleaved 2 of 5, where the bars carry one digit and the spaces the next
#[derive(Default)]
pub struct ItfReader;

impl ItfReader {
    pub fn new() -> Self {
        Self
    }
}

impl OneDReader for ItfReader {
    fn decode_row(
        &mut self,
        row_number: usize,
        row: &BitArray,
        hints: &DecodeHints,
    ) -> BarcodeResult<DecodedBarcode> {
        let (start_range, narrow_line_width) = decode_start(row)?;
        let end_range = decode_end(row, narrow_line_width)?;

        let mut result = String::with_capacity(20);
        decode_middle(row, start_range[1], end_range[0], &mut result)?;

        // Short reads must have a standard length to rule out noise and 2D symbols
        let allowed = hints.allowed_lengths.as_deref().unwrap_or(&DEFAULT_ALLOWED_LENGTHS);
        let length = result.len();
        let max_allowed_length = allowed.iter().copied().max().unwrap_or(0);
        if !allowed.contains(&length) && length <= max_allowed_length {
            return Err(BarcodeError::Format);
        }
        trace!("Decoded ITF {result} on row {row_number}");

        let y = row_number as f32;
        let mut res = DecodedBarcode::new(
            result,
            None,
            vec![Point::new(start_range[1] as f32, y), Point::new(end_range[0] as f32, y)],
            BarcodeFormat::Itf,
        );
        res.put_metadata(ResultMetadataKey::SymbologyIdentifier, MetadataValue::Text("]I0".into()));
        Ok(res)
    }
}

fn decode_middle(
    row: &BitArray,
    mut payload_start: usize,
    payload_end: usize,
    result: &mut String,
) -> BarcodeResult<()> {
    let mut counter_digit_pair = [0; 10];
    let mut counter_black = [0; 5];
    let mut counter_white = [0; 5];

    while payload_start < payload_end {
        record_pattern(row, payload_start, &mut counter_digit_pair)?;
        for k in 0..5 {
            counter_black[k] = counter_digit_pair[2 * k];
            counter_white[k] = counter_digit_pair[2 * k + 1];
        }
        for counters in [&counter_black, &counter_white] {
            let digit = decode_digit(counters)?;
            result.push(char::from(b'0' + digit as u8));
        }
        payload_start += counter_digit_pair.iter().sum::<usize>();
    }
    Ok(())
}

// Start range and the width of a narrow line, a quarter of the start pattern
fn decode_start(row: &BitArray) -> BarcodeResult<([usize; 2], usize)> {
    let end_start = skip_white_space(row)?;
    let start_pattern = find_guard_pattern(row, end_start, &START_PATTERN)?;
    let narrow_line_width = (start_pattern[1] - start_pattern[0]) / 4;
    validate_quiet_zone(row, start_pattern[0], narrow_line_width)?;
    Ok((start_pattern, narrow_line_width))
}

// The end pattern is searched for from the end of a reversed copy of the row
fn decode_end(row: &BitArray, narrow_line_width: usize) -> BarcodeResult<[usize; 2]> {
    let mut reversed = row.clone();
    reversed.reverse();

    let end_start = skip_white_space(&reversed)?;
    let end_pattern = find_guard_pattern(&reversed, end_start, &END_PATTERN_REVERSED[0])
        .or_else(|_| find_guard_pattern(&reversed, end_start, &END_PATTERN_REVERSED[1]))?;
    validate_quiet_zone(&reversed, end_pattern[0], narrow_line_width)?;

    let size = row.size();
    Ok([size - end_pattern[1], size - end_pattern[0]])
}

/// Requires ten narrow lines of quiet zone before `start`, or as many as the row has
fn validate_quiet_zone(
    row: &BitArray,
    start: usize,
    narrow_line_width: usize,
) -> BarcodeResult<()> {
    let quiet_count = (narrow_line_width * 10).min(start);
    if row.is_range(start - quiet_count, start, false)? {
        Ok(())
    } else {
        Err(BarcodeError::NotFound)
    }
}

fn skip_white_space(row: &BitArray) -> BarcodeResult<usize> {
    let end_start = row.next_set(0);
    if end_start == row.size() {
        return Err(BarcodeError::NotFound);
    }
    Ok(end_start)
}

fn find_guard_pattern(
    row: &BitArray,
    offset: usize,
    pattern: &[usize],
) -> BarcodeResult<[usize; 2]> {
    let mut counters = vec![0; pattern.len()];
    scan_runs(row, offset, false, &mut counters, |counters, start, end| {
        let variance = pattern_match_variance(counters, pattern, MAX_INDIVIDUAL_VARIANCE);
        Ok((variance < MAX_AVG_VARIANCE).then_some([start, end]))
    })
}

// Ties between two patterns are rejected as ambiguous
fn decode_digit(counters: &[usize; 5]) -> BarcodeResult<usize> {
    let mut best_variance = MAX_AVG_VARIANCE;
    let mut best_match = None;
    for (i, pattern) in PATTERNS.iter().enumerate() {
        let variance = pattern_match_variance(counters, pattern, MAX_INDIVIDUAL_VARIANCE);
        if variance < best_variance {
            best_variance = variance;
            best_match = Some(i);
        } else if variance == best_variance {
            best_match = None;
        }
    }
    best_match.map(|i| i % 10).ok_or(BarcodeError::NotFound)
}
