pub(crate) mod codabar;
pub(crate) mod code128;
pub(crate) mod code39;
pub(crate) mod code93;
pub(crate) mod itf;
pub(crate) mod upc_ean;

pub use codabar::CodabarReader;
pub use code128::Code128Reader;
pub use code39::Code39Reader;
pub use code93::Code93Reader;
pub use itf::ItfReader;
pub use upc_ean::{
    Ean13Reader, Ean8Reader, MultiFormatUpcEanReader, UpcAReader, UpcEReader, UpcEanReader,
};

use log::{debug, trace};

use super::{binarize::Binarizer, BinaryBitmap, Reader};
use crate::common::{
    bit_array::BitArray,
    error::{BarcodeError, BarcodeResult},
    format::BarcodeFormat,
    hints::DecodeHints,
    point::Point,
    result::{DecodedBarcode, MetadataValue, ResultMetadataKey},
};

// One dimensional reader
//------------------------------------------------------------------------------

/// Decodes a single row of a linear symbol. Implementors own their scratch counters, so
/// decoding needs exclusive access.
pub trait OneDReader {
    fn decode_row(
        &mut self,
        row_number: usize,
        row: &BitArray,
        hints: &DecodeHints,
    ) -> BarcodeResult<DecodedBarcode>;
}

/// Scans rows of the image for a linear symbol. With `try_harder`, the image is also
/// scanned rotated by 90 degrees when the source supports rotation.
pub fn decode_1d<R, B>(
    reader: &mut R,
    image: &BinaryBitmap<B>,
    hints: &DecodeHints,
) -> BarcodeResult<DecodedBarcode>
where
    R: OneDReader + ?Sized,
    B: Binarizer,
{
    match do_decode(reader, image, hints) {
        Ok(res) => Ok(res),
        Err(_) if hints.try_harder && image.is_rotate_supported() => {
            debug!("Retrying linear decode on the image rotated counter clockwise");
            let rotated = image.rotate_counter_clockwise()?;
            let mut res = do_decode(reader, &rotated, hints)?;

            // Record that the symbol was found at 270 degrees on top of any prior rotation
            let orientation = res
                .metadata_value(ResultMetadataKey::Orientation)
                .and_then(MetadataValue::as_int)
                .map_or(270, |o| (o + 270) % 360);
            res.put_metadata(ResultMetadataKey::Orientation, MetadataValue::Int(orientation));

            let height = rotated.height() as f32;
            for p in res.points_mut() {
                *p = Point::new(height - p.y - 1.0, p.x);
            }
            Ok(res)
        }
        Err(e) => Err(e),
    }
}

// Rows are tried outwards from the middle, each one forwards and then reversed
fn do_decode<R, B>(
    reader: &mut R,
    image: &BinaryBitmap<B>,
    hints: &DecodeHints,
) -> BarcodeResult<DecodedBarcode>
where
    R: OneDReader + ?Sized,
    B: Binarizer,
{
    let (width, height) = (image.width(), image.height());
    let mut row = BitArray::with_size(width);

    let middle = (height / 2) as isize;
    let row_step = (height >> if hints.try_harder { 8 } else { 5 }).max(1) as isize;
    let max_lines = if hints.try_harder { height } else { 15 };

    // Points found on a reversed row would be reported mirrored, so the callback is dropped
    let mut reversed_hints = hints.clone();
    reversed_hints.result_point_callback = None;

    for x in 0..max_lines as isize {
        let steps_above_or_below = (x + 1) / 2;
        let is_above = x & 1 == 0;
        let row_number =
            middle + row_step * if is_above { steps_above_or_below } else { -steps_above_or_below };
        if row_number < 0 || row_number >= height as isize {
            break;
        }
        let row_number = row_number as usize;

        row = match image.black_row(row_number, std::mem::take(&mut row)) {
            Ok(r) => r,
            Err(_) => continue,
        };

        for attempt in 0..2 {
            if attempt == 1 {
                row.reverse();
            }
            let row_hints = if attempt == 1 { &reversed_hints } else { hints };
            match reader.decode_row(row_number, &row, row_hints) {
                Ok(mut res) => {
                    if attempt == 1 {
                        res.put_metadata(ResultMetadataKey::Orientation, MetadataValue::Int(180));
                        let w = width as f32;
                        for p in res.points_mut() {
                            *p = Point::new(w - p.x - 1.0, p.y);
                        }
                    }
                    debug!("Found {} on row {row_number}", res.format());
                    return Ok(res);
                }
                Err(e) => trace!("Row {row_number} attempt {attempt}: {e}"),
            }
        }
    }
    Err(BarcodeError::NotFound)
}

// Row helpers
//------------------------------------------------------------------------------

/// Records the widths of `counters.len()` consecutive runs starting at `start`. Running
/// off the end of the row while filling the last counter is accepted.
pub fn record_pattern(row: &BitArray, start: usize, counters: &mut [usize]) -> BarcodeResult<()> {
    counters.fill(0);
    let end = row.size();
    if start >= end {
        return Err(BarcodeError::NotFound);
    }
    let num_counters = counters.len();
    let mut is_white = !row.get(start);
    let mut counter_position = 0;
    let mut i = start;
    while i < end {
        if row.get(i) != is_white {
            counters[counter_position] += 1;
        } else {
            counter_position += 1;
            if counter_position == num_counters {
                break;
            }
            counters[counter_position] = 1;
            is_white = !is_white;
        }
        i += 1;
    }
    if counter_position == num_counters || (counter_position == num_counters - 1 && i == end) {
        Ok(())
    } else {
        Err(BarcodeError::NotFound)
    }
}

/// Like [`record_pattern`] but for the runs ending just before `start`
pub fn record_pattern_in_reverse(
    row: &BitArray,
    start: usize,
    counters: &mut [usize],
) -> BarcodeResult<()> {
    let mut transitions_left = counters.len() as isize;
    let mut start = start;
    let mut last = row.get(start);
    while start > 0 && transitions_left >= 0 {
        start -= 1;
        if row.get(start) != last {
            transitions_left -= 1;
            last = !last;
        }
    }
    if transitions_left >= 0 {
        return Err(BarcodeError::NotFound);
    }
    record_pattern(row, start + 1, counters)
}

/// Average variance between observed run widths and a pattern, relative to the total
/// width. Infinite when any single run is off by more than `max_individual_variance`
/// modules or there are fewer pixels than pattern modules. Pattern elements beyond the
/// number of counters are ignored.
pub fn pattern_match_variance(
    counters: &[usize],
    pattern: &[usize],
    max_individual_variance: f32,
) -> f32 {
    let total = counters.iter().sum::<usize>();
    let pattern_length = pattern.iter().take(counters.len()).sum::<usize>();
    if total < pattern_length {
        return f32::INFINITY;
    }

    let unit_bar_width = total as f32 / pattern_length as f32;
    let max_individual_variance = max_individual_variance * unit_bar_width;

    let mut total_variance = 0.0;
    for (&counter, &p) in counters.iter().zip(pattern) {
        let variance = (counter as f32 - p as f32 * unit_bar_width).abs();
        if variance > max_individual_variance {
            return f32::INFINITY;
        }
        total_variance += variance;
    }
    total_variance / total as f32
}

/// Slides a window of `counters.len()` runs along the row, starting with a dark run at
/// `offset` (or a light one when `white_first`). `accept` sees the runs together with
/// the window's start and end and stops the scan by returning a value.
pub(crate) fn scan_runs<T>(
    row: &BitArray,
    offset: usize,
    white_first: bool,
    counters: &mut [usize],
    mut accept: impl FnMut(&[usize], usize, usize) -> BarcodeResult<Option<T>>,
) -> BarcodeResult<T> {
    counters.fill(0);
    let width = row.size();
    let offset = if white_first { row.next_unset(offset) } else { row.next_set(offset) };
    let last = counters.len() - 1;
    let mut counter_position = 0;
    let mut pattern_start = offset;
    let mut is_white = white_first;
    for x in offset..width {
        if row.get(x) != is_white {
            counters[counter_position] += 1;
            continue;
        }
        if counter_position == last {
            if let Some(found) = accept(counters, pattern_start, x)? {
                return Ok(found);
            }
            pattern_start += counters[0] + counters[1];
            counters.copy_within(2.., 0);
            counters[last - 1] = 0;
            counters[last] = 0;
            counter_position -= 1;
        } else {
            counter_position += 1;
        }
        counters[counter_position] = 1;
        is_white = !is_white;
    }
    Err(BarcodeError::NotFound)
}

// Reader dispatch
//------------------------------------------------------------------------------

/// Closed set of linear readers
pub enum OneDReaderKind {
    UpcEan(MultiFormatUpcEanReader),
    Code39(Code39Reader),
    Code93(Code93Reader),
    Code128(Code128Reader),
    Itf(ItfReader),
    Codabar(CodabarReader),
}

impl OneDReader for OneDReaderKind {
    fn decode_row(
        &mut self,
        row_number: usize,
        row: &BitArray,
        hints: &DecodeHints,
    ) -> BarcodeResult<DecodedBarcode> {
        match self {
            Self::UpcEan(r) => r.decode_row(row_number, row, hints),
            Self::Code39(r) => r.decode_row(row_number, row, hints),
            Self::Code93(r) => r.decode_row(row_number, row, hints),
            Self::Code128(r) => r.decode_row(row_number, row, hints),
            Self::Itf(r) => r.decode_row(row_number, row, hints),
            Self::Codabar(r) => r.decode_row(row_number, row, hints),
        }
    }
}

/// Tries every enabled linear reader on each row
pub struct MultiFormatOneDReader {
    readers: Vec<OneDReaderKind>,
}

impl MultiFormatOneDReader {
    pub fn new(hints: &DecodeHints) -> Self {
        let check_digit = hints.assume_code39_check_digit;
        let mut readers = Vec::new();
        if let Some(formats) = &hints.possible_formats {
            if formats.iter().any(|f| f.is_upc_ean()) {
                readers.push(OneDReaderKind::UpcEan(MultiFormatUpcEanReader::new(hints)));
            }
            if formats.contains(&BarcodeFormat::Code39) {
                readers.push(OneDReaderKind::Code39(Code39Reader::new(check_digit, false)));
            }
            if formats.contains(&BarcodeFormat::Code93) {
                readers.push(OneDReaderKind::Code93(Code93Reader::new()));
            }
            if formats.contains(&BarcodeFormat::Code128) {
                readers.push(OneDReaderKind::Code128(Code128Reader::new()));
            }
            if formats.contains(&BarcodeFormat::Itf) {
                readers.push(OneDReaderKind::Itf(ItfReader::new()));
            }
            if formats.contains(&BarcodeFormat::Codabar) {
                readers.push(OneDReaderKind::Codabar(CodabarReader::new()));
            }
        }
        if readers.is_empty() {
            readers = vec![
                OneDReaderKind::UpcEan(MultiFormatUpcEanReader::new(hints)),
                OneDReaderKind::Code39(Code39Reader::new(check_digit, false)),
                OneDReaderKind::Codabar(CodabarReader::new()),
                OneDReaderKind::Code93(Code93Reader::new()),
                OneDReaderKind::Code128(Code128Reader::new()),
                OneDReaderKind::Itf(ItfReader::new()),
            ];
        }
        Self { readers }
    }
}

impl OneDReader for MultiFormatOneDReader {
    fn decode_row(
        &mut self,
        row_number: usize,
        row: &BitArray,
        hints: &DecodeHints,
    ) -> BarcodeResult<DecodedBarcode> {
        for reader in self.readers.iter_mut() {
            if let Ok(res) = reader.decode_row(row_number, row, hints) {
                return Ok(res);
            }
        }
        Err(BarcodeError::NotFound)
    }
}

// Every linear reader decodes whole images through the row driver
macro_rules! impl_reader_for_one_d {
    ($($reader:ty),* $(,)?) => {
        $(
            impl Reader for $reader {
                fn decode<B: Binarizer>(
                    &mut self,
                    image: &BinaryBitmap<B>,
                    hints: &DecodeHints,
                ) -> BarcodeResult<DecodedBarcode> {
                    decode_1d(self, image, hints)
                }
            }
        )*
    };
}

impl_reader_for_one_d!(
    MultiFormatOneDReader,
    OneDReaderKind,
    MultiFormatUpcEanReader,
    Ean13Reader,
    Ean8Reader,
    UpcAReader,
    UpcEReader,
    Code39Reader,
    Code93Reader,
    Code128Reader,
    ItfReader,
    CodabarReader,
);

/// Renders `code` as a one row image for the reader tests
#[cfg(test)]
pub(crate) fn row_from_str(code: &str) -> BitArray {
    let bits = code.chars().map(|c| c == '1').collect::<Vec<_>>();
    BitArray::from(&bits[..])
}

#[cfg(test)]
mod oned_reader_tests {
    use test_case::test_case;

    use super::{
        pattern_match_variance, record_pattern, record_pattern_in_reverse, row_from_str,
        MultiFormatOneDReader, OneDReader,
    };
    use crate::common::{error::BarcodeError, format::BarcodeFormat, hints::DecodeHints};

    #[test]
    fn test_record_pattern() {
        let row = row_from_str("0011100100");
        let mut counters = [0; 3];
        record_pattern(&row, 2, &mut counters).unwrap();
        assert_eq!(counters, [3, 2, 1]);

        // Last run may touch the end of the row
        let row = row_from_str("0011100111");
        let mut counters = [0; 4];
        record_pattern(&row, 0, &mut counters).unwrap();
        assert_eq!(counters, [2, 3, 2, 3]);

        let mut counters = [0; 6];
        assert_eq!(record_pattern(&row, 0, &mut counters), Err(BarcodeError::NotFound));
        assert_eq!(record_pattern(&row, 10, &mut counters), Err(BarcodeError::NotFound));
    }

    #[test]
    fn test_record_pattern_in_reverse() {
        let row = row_from_str("0011100100");
        let mut counters = [0; 2];
        // Runs end just before the bar at 7, the scan backs up over two transitions
        record_pattern_in_reverse(&row, 7, &mut counters).unwrap();
        assert_eq!(counters, [3, 2]);
        let mut counters = [0; 6];
        assert!(record_pattern_in_reverse(&row, 7, &mut counters).is_err());
    }

    #[test_case(&[2, 2, 2], &[1, 1, 1], 0.0; "exact")]
    #[test_case(&[3, 2, 3], &[1, 1, 1], 1.0 / 6.0; "close")]
    #[test_case(&[1, 1], &[2, 2], f32::INFINITY; "too narrow")]
    #[test_case(&[6, 1, 1], &[1, 1, 1], f32::INFINITY; "run too wide")]
    fn test_pattern_match_variance(counters: &[usize], pattern: &[usize], exp: f32) {
        let variance = pattern_match_variance(counters, pattern, 0.7);
        if exp.is_infinite() {
            assert!(variance.is_infinite());
        } else {
            assert!((variance - exp).abs() < 1e-6, "{variance} != {exp}");
        }
    }

    #[test]
    fn test_multi_format_restricts_readers() {
        let mut hints = DecodeHints::new();
        hints.possible_formats(&[BarcodeFormat::Code93]);
        let mut reader = MultiFormatOneDReader::new(&hints);
        assert_eq!(reader.readers.len(), 1);

        // A Code 39 row is not picked up by the Code 93 reader alone
        let row = row_from_str(&format!("{}{}{}", "0".repeat(20), CODE39_A, "0".repeat(20)));
        assert_eq!(reader.decode_row(0, &row, &hints), Err(BarcodeError::NotFound));

        let mut reader = MultiFormatOneDReader::new(&DecodeHints::new());
        assert_eq!(reader.readers.len(), 6);
        let res = reader.decode_row(0, &row, &DecodeHints::new()).unwrap();
        assert_eq!(res.format(), BarcodeFormat::Code39);
        assert_eq!(res.text(), "A");
    }

    // "*A*" in Code 39 with two module wide elements
    const CODE39_A: &str = "10010110110101101010010110100101101101";
}
