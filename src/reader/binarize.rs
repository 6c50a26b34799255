use std::cell::OnceCell;

use log::trace;

use super::luminance::{LuminanceSource, Luma8Source};
use crate::common::{
    bit_array::BitArray,
    bit_matrix::BitMatrix,
    error::{BarcodeError, BarcodeResult},
};

// Binarizer
//------------------------------------------------------------------------------

/// Turns luminance into black and white, by rows for 1D readers or as a whole matrix
/// for 2D readers
pub trait Binarizer {
    fn luminance_source(&self) -> &Luma8Source;

    /// Black modules of row `y`. `reuse` is cleared and returned when it can hold the row.
    fn black_row(&self, y: usize, reuse: BitArray) -> BarcodeResult<BitArray>;

    fn black_matrix(&self) -> BarcodeResult<BitMatrix>;

    /// Same kind of binarizer over another source
    fn create_binarizer(&self, source: Luma8Source) -> Self
    where
        Self: Sized;

    fn width(&self) -> usize {
        self.luminance_source().width()
    }

    fn height(&self) -> usize {
        self.luminance_source().height()
    }
}

fn row_buffer(reuse: BitArray, width: usize) -> BitArray {
    if reuse.size() < width {
        BitArray::with_size(width)
    } else {
        let mut row = reuse;
        row.clear();
        row
    }
}

// Global histogram binarizer
//------------------------------------------------------------------------------

const LUMINANCE_BITS: usize = 5;
const LUMINANCE_SHIFT: usize = 8 - LUMINANCE_BITS;
const LUMINANCE_BUCKETS: usize = 1 << LUMINANCE_BITS;

/// Picks one black point for the whole image from a coarse histogram. Fast, but lost on
/// uneven lighting.
#[derive(Debug, Clone)]
pub struct GlobalHistogramBinarizer {
    source: Luma8Source,
}

impl GlobalHistogramBinarizer {
    pub fn new(source: Luma8Source) -> Self {
        Self { source }
    }
}

impl Binarizer for GlobalHistogramBinarizer {
    fn luminance_source(&self) -> &Luma8Source {
        &self.source
    }

    fn black_row(&self, y: usize, reuse: BitArray) -> BarcodeResult<BitArray> {
        global_black_row(&self.source, y, reuse)
    }

    fn black_matrix(&self) -> BarcodeResult<BitMatrix> {
        global_black_matrix(&self.source)
    }

    fn create_binarizer(&self, source: Luma8Source) -> Self {
        Self::new(source)
    }
}

// Rows are sharpened with a [-1 4 -1] filter before thresholding
fn global_black_row(source: &Luma8Source, y: usize, reuse: BitArray) -> BarcodeResult<BitArray> {
    let width = source.width();
    let mut row = row_buffer(reuse, width);
    let mut luminances = Vec::with_capacity(width);
    source.row(y, &mut luminances)?;

    let mut buckets = [0; LUMINANCE_BUCKETS];
    for &l in &luminances {
        buckets[(l as usize) >> LUMINANCE_SHIFT] += 1;
    }
    let black_point = estimate_black_point(&buckets)?;

    if width < 3 {
        for (x, &l) in luminances.iter().enumerate() {
            if (l as usize) < black_point {
                row.set(x);
            }
        }
    } else {
        for (x, w) in luminances.windows(3).enumerate() {
            let (left, center, right) = (w[0] as i32, w[1] as i32, w[2] as i32);
            if (center * 4 - left - right) / 2 < black_point as i32 {
                row.set(x + 1);
            }
        }
    }
    Ok(row)
}

// The histogram is sampled from four rows, then the whole image is thresholded
fn global_black_matrix(source: &Luma8Source) -> BarcodeResult<BitMatrix> {
    let (width, height) = (source.width(), source.height());
    let mut matrix = BitMatrix::new(width, height)?;

    let mut buckets = [0; LUMINANCE_BUCKETS];
    let mut luminances = Vec::with_capacity(width);
    for y in 1..5 {
        source.row(height * y / 5, &mut luminances)?;
        for &l in &luminances[width / 5..(width * 4) / 5] {
            buckets[(l as usize) >> LUMINANCE_SHIFT] += 1;
        }
    }
    let black_point = estimate_black_point(&buckets)?;

    for (i, &l) in source.matrix().iter().enumerate() {
        if (l as usize) < black_point {
            matrix.set(i % width, i / width);
        }
    }
    Ok(matrix)
}

/// Black point between the two tallest, well separated peaks of the histogram, leaning
/// towards the white peak
pub(crate) fn estimate_black_point(buckets: &[usize]) -> BarcodeResult<usize> {
    let num_buckets = buckets.len();
    let mut max_bucket_count = 0;
    let mut first_peak = 0;
    let mut first_peak_size = 0;
    for (x, &count) in buckets.iter().enumerate() {
        if count > first_peak_size {
            first_peak = x;
            first_peak_size = count;
        }
        max_bucket_count = max_bucket_count.max(count);
    }

    // Distant second peaks are favoured by the square of the distance
    let mut second_peak = 0;
    let mut second_peak_score = 0;
    for (x, &count) in buckets.iter().enumerate() {
        let distance = x.abs_diff(first_peak);
        let score = count * distance * distance;
        if score > second_peak_score {
            second_peak = x;
            second_peak_score = score;
        }
    }

    let (first_peak, second_peak) = if first_peak > second_peak {
        (second_peak, first_peak)
    } else {
        (first_peak, second_peak)
    };

    // Too little contrast to pick a meaningful black point
    if second_peak - first_peak <= num_buckets / 16 {
        trace!("Histogram peaks {first_peak} and {second_peak} are too close");
        return Err(BarcodeError::NotFound);
    }

    let mut best_valley = second_peak - 1;
    let mut best_valley_score = None;
    for x in (first_peak + 1..second_peak).rev() {
        let from_first = x - first_peak;
        let score = from_first * from_first * (second_peak - x) * (max_bucket_count - buckets[x]);
        if best_valley_score.map_or(true, |best| score > best) {
            best_valley = x;
            best_valley_score = Some(score);
        }
    }

    Ok(best_valley << LUMINANCE_SHIFT)
}

// Hybrid binarizer
//------------------------------------------------------------------------------

const BLOCK_SIZE_POWER: usize = 3;
const BLOCK_SIZE: usize = 1 << BLOCK_SIZE_POWER;
const BLOCK_SIZE_MASK: usize = BLOCK_SIZE - 1;
const MINIMUM_DIMENSION: usize = BLOCK_SIZE * 5;
const MIN_DYNAMIC_RANGE: u8 = 24;

/// Local thresholding for the matrix. Steps:
/// 1. Divides the image into blocks of 8x8 pixels. The last fractional block is computed
///    from the last 8 pixels, so a few pixels overlap into 2 blocks
/// 2. Calculates the average of each block, or a guess from its neighbours when the
///    block has little contrast
/// 3. Calculates the threshold of each block by averaging the 5x5 blocks around it
/// 4. Sets a pixel black if its value is less than or equal to the threshold, so that
///    black pixels stay black when the threshold is 0
///
/// Rows for 1D readers are binarized like the global histogram binarizer.
#[derive(Debug, Clone)]
pub struct HybridBinarizer {
    source: Luma8Source,
}

impl HybridBinarizer {
    pub fn new(source: Luma8Source) -> Self {
        Self { source }
    }
}

impl Binarizer for HybridBinarizer {
    fn luminance_source(&self) -> &Luma8Source {
        &self.source
    }

    fn black_row(&self, y: usize, reuse: BitArray) -> BarcodeResult<BitArray> {
        global_black_row(&self.source, y, reuse)
    }

    fn black_matrix(&self) -> BarcodeResult<BitMatrix> {
        let (width, height) = (self.source.width(), self.source.height());
        if width < MINIMUM_DIMENSION || height < MINIMUM_DIMENSION {
            return global_black_matrix(&self.source);
        }

        let luminances = self.source.matrix();
        let sub_width = blocks(width);
        let sub_height = blocks(height);
        let black_points =
            calculate_black_points(&luminances, sub_width, sub_height, width, height);

        let mut matrix = BitMatrix::new(width, height)?;
        calculate_threshold_for_block(
            &luminances,
            sub_width,
            sub_height,
            width,
            height,
            &black_points,
            &mut matrix,
        );
        Ok(matrix)
    }

    fn create_binarizer(&self, source: Luma8Source) -> Self {
        Self::new(source)
    }
}

fn blocks(len: usize) -> usize {
    let mut steps = len >> BLOCK_SIZE_POWER;
    if len & BLOCK_SIZE_MASK != 0 {
        steps += 1;
    }
    steps
}

fn calculate_black_points(
    luminances: &[u8],
    sub_width: usize,
    sub_height: usize,
    width: usize,
    height: usize,
) -> Vec<usize> {
    let max_y_offset = height - BLOCK_SIZE;
    let max_x_offset = width - BLOCK_SIZE;
    let mut black_points = vec![0usize; sub_width * sub_height];

    for y in 0..sub_height {
        let y_offset = (y << BLOCK_SIZE_POWER).min(max_y_offset);
        for x in 0..sub_width {
            let x_offset = (x << BLOCK_SIZE_POWER).min(max_x_offset);
            let mut sum = 0usize;
            let mut min = u8::MAX;
            let mut max = 0u8;
            for yy in 0..BLOCK_SIZE {
                let offset = (y_offset + yy) * width + x_offset;
                for &p in &luminances[offset..offset + BLOCK_SIZE] {
                    sum += p as usize;
                    min = min.min(p);
                    max = max.max(p);
                }
            }

            let mut average = sum >> (BLOCK_SIZE_POWER * 2);
            if max - min <= MIN_DYNAMIC_RANGE {
                // Low contrast blocks are assumed light, unless the neighbours already
                // estimated say otherwise
                average = min as usize / 2;
                if y > 0 && x > 0 {
                    let i = y * sub_width + x;
                    let neighbours = (black_points[i - sub_width]
                        + 2 * black_points[i - 1]
                        + black_points[i - sub_width - 1])
                        / 4;
                    if (min as usize) < neighbours {
                        average = neighbours;
                    }
                }
            }
            black_points[y * sub_width + x] = average;
        }
    }
    black_points
}

fn calculate_threshold_for_block(
    luminances: &[u8],
    sub_width: usize,
    sub_height: usize,
    width: usize,
    height: usize,
    black_points: &[usize],
    matrix: &mut BitMatrix,
) {
    let max_y_offset = height - BLOCK_SIZE;
    let max_x_offset = width - BLOCK_SIZE;
    let cap = |v: usize, max: usize| v.clamp(2, max);

    for y in 0..sub_height {
        let y_offset = (y << BLOCK_SIZE_POWER).min(max_y_offset);
        let top = cap(y, sub_height - 3);
        for x in 0..sub_width {
            let x_offset = (x << BLOCK_SIZE_POWER).min(max_x_offset);
            let left = cap(x, sub_width - 3);

            let mut sum = 0;
            for ny in top - 2..=top + 2 {
                let ni = ny * sub_width + left;
                sum += black_points[ni - 2..=ni + 2].iter().sum::<usize>();
            }
            let threshold = sum / 25;

            for yy in 0..BLOCK_SIZE {
                let offset = (y_offset + yy) * width + x_offset;
                for (xx, &p) in luminances[offset..offset + BLOCK_SIZE].iter().enumerate() {
                    if p as usize <= threshold {
                        matrix.set(x_offset + xx, y_offset + yy);
                    }
                }
            }
        }
    }
}

// Passthrough binarizer
//------------------------------------------------------------------------------

/// For sources that are already black and white, any nonzero byte is black
#[derive(Debug, Clone)]
pub struct PassthroughBinarizer {
    source: Luma8Source,
}

impl PassthroughBinarizer {
    pub fn new(source: Luma8Source) -> Self {
        Self { source }
    }
}

impl Binarizer for PassthroughBinarizer {
    fn luminance_source(&self) -> &Luma8Source {
        &self.source
    }

    fn black_row(&self, y: usize, reuse: BitArray) -> BarcodeResult<BitArray> {
        let mut row = row_buffer(reuse, self.source.width());
        let mut luminances = Vec::with_capacity(self.source.width());
        self.source.row(y, &mut luminances)?;
        for (x, _) in luminances.iter().enumerate().filter(|(_, &l)| l != 0) {
            row.set(x);
        }
        Ok(row)
    }

    fn black_matrix(&self) -> BarcodeResult<BitMatrix> {
        let width = self.source.width();
        let mut matrix = BitMatrix::new(width, self.source.height())?;
        for (i, _) in self.source.matrix().iter().enumerate().filter(|(_, &l)| l != 0) {
            matrix.set(i % width, i / width);
        }
        Ok(matrix)
    }

    fn create_binarizer(&self, source: Luma8Source) -> Self {
        Self::new(source)
    }
}

// Binary bitmap
//------------------------------------------------------------------------------

/// Image handed to readers. The black matrix is computed once and shared by every
/// reader trying the image.
#[derive(Debug)]
pub struct BinaryBitmap<B: Binarizer> {
    binarizer: B,
    matrix: OnceCell<BitMatrix>,
}

impl<B: Binarizer> BinaryBitmap<B> {
    pub fn new(binarizer: B) -> Self {
        Self { binarizer, matrix: OnceCell::new() }
    }

    pub fn binarizer(&self) -> &B {
        &self.binarizer
    }

    pub fn width(&self) -> usize {
        self.binarizer.width()
    }

    pub fn height(&self) -> usize {
        self.binarizer.height()
    }

    pub fn black_row(&self, y: usize, reuse: BitArray) -> BarcodeResult<BitArray> {
        self.binarizer.black_row(y, reuse)
    }

    pub fn black_matrix(&self) -> BarcodeResult<&BitMatrix> {
        if let Some(matrix) = self.matrix.get() {
            return Ok(matrix);
        }
        let matrix = self.binarizer.black_matrix()?;
        Ok(self.matrix.get_or_init(|| matrix))
    }

    pub fn is_crop_supported(&self) -> bool {
        self.binarizer.luminance_source().is_crop_supported()
    }

    pub fn crop(
        &self,
        left: usize,
        top: usize,
        width: usize,
        height: usize,
    ) -> BarcodeResult<Self> {
        let source = self.binarizer.luminance_source().crop(left, top, width, height)?;
        Ok(Self::new(self.binarizer.create_binarizer(source)))
    }

    pub fn is_rotate_supported(&self) -> bool {
        self.binarizer.luminance_source().is_rotate_supported()
    }

    pub fn rotate_counter_clockwise(&self) -> BarcodeResult<Self> {
        let source = self.binarizer.luminance_source().rotate_counter_clockwise()?;
        Ok(Self::new(self.binarizer.create_binarizer(source)))
    }

    /// Same image with light and dark swapped
    pub fn inverted(&self) -> Self {
        let source = self.binarizer.luminance_source().invert();
        Self::new(self.binarizer.create_binarizer(source))
    }
}

#[cfg(test)]
mod binarize_tests {
    use test_case::test_case;

    use super::{
        estimate_black_point, Binarizer, BinaryBitmap, GlobalHistogramBinarizer, HybridBinarizer,
        PassthroughBinarizer,
    };
    use crate::common::{bit_array::BitArray, error::BarcodeError};
    use crate::reader::luminance::Luma8Source;

    // Dark left half, light right half
    fn split_source(w: usize, h: usize) -> Luma8Source {
        let data = (0..w * h).map(|i| if i % w < w / 2 { 20 } else { 230 }).collect::<Vec<u8>>();
        Luma8Source::from_luma(data, w, h).unwrap()
    }

    #[test]
    fn test_estimate_black_point() {
        let mut buckets = [0; 32];
        buckets[2] = 50;
        buckets[28] = 60;
        let bp = estimate_black_point(&buckets).unwrap();
        assert!((2 << 3) < bp && bp < (28 << 3));
    }

    #[test]
    fn test_estimate_black_point_low_contrast() {
        let mut buckets = [0; 32];
        buckets[10] = 50;
        buckets[11] = 60;
        assert_eq!(estimate_black_point(&buckets), Err(BarcodeError::NotFound));
    }

    #[test_case(60, 60; "hybrid blocks")]
    #[test_case(20, 20; "small image falls back to histogram")]
    #[test_case(61, 45; "fractional blocks")]
    fn test_hybrid_matrix(w: usize, h: usize) {
        let bin = HybridBinarizer::new(split_source(w, h));
        let matrix = bin.black_matrix().unwrap();
        assert_eq!((matrix.width(), matrix.height()), (w, h));
        for y in 0..h {
            for x in 0..w {
                assert_eq!(matrix.get(x, y), x < w / 2, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_global_row() {
        let bin = GlobalHistogramBinarizer::new(split_source(40, 3));
        let row = bin.black_row(1, BitArray::new()).unwrap();
        assert_eq!(row.size(), 40);
        // The edges of the row are never set by the sharpening filter
        assert!(!row.get(0));
        assert!((1..20).all(|x| row.get(x)));
        assert!((20..40).all(|x| !row.get(x)));
    }

    #[test]
    fn test_row_reuse() {
        let bin = GlobalHistogramBinarizer::new(split_source(40, 3));
        let mut reuse = BitArray::with_size(64);
        reuse.set(63);
        let row = bin.black_row(0, reuse).unwrap();
        assert_eq!(row.size(), 64);
        assert!(!row.get(63));
    }

    #[test]
    fn test_uniform_image_not_found() {
        let src = Luma8Source::from_luma(vec![0u8; 100], 10, 10).unwrap();
        let bin = GlobalHistogramBinarizer::new(src);
        assert_eq!(bin.black_matrix(), Err(BarcodeError::NotFound));
        assert_eq!(bin.black_row(0, BitArray::new()), Err(BarcodeError::NotFound));
    }

    #[test]
    fn test_passthrough() {
        let src = Luma8Source::from_luma(vec![0u8, 1, 255, 0], 2, 2).unwrap();
        let bin = PassthroughBinarizer::new(src);
        let matrix = bin.black_matrix().unwrap();
        assert!(!matrix.get(0, 0) && matrix.get(1, 0) && matrix.get(0, 1) && !matrix.get(1, 1));
        let row = bin.black_row(1, BitArray::new()).unwrap();
        assert!(row.get(0) && !row.get(1));
    }

    #[test]
    fn test_binary_bitmap() {
        let bitmap = BinaryBitmap::new(HybridBinarizer::new(split_source(48, 40)));
        let first = bitmap.black_matrix().unwrap() as *const _;
        let second = bitmap.black_matrix().unwrap() as *const _;
        assert_eq!(first, second);

        assert!(bitmap.is_rotate_supported());
        let rotated = bitmap.rotate_counter_clockwise().unwrap();
        assert_eq!((rotated.width(), rotated.height()), (40, 48));
        // Dark left half becomes the bottom half
        let matrix = rotated.black_matrix().unwrap();
        assert!(matrix.get(5, 40) && !matrix.get(5, 5));

        let crop = bitmap.crop(20, 0, 28, 40).unwrap();
        assert_eq!(crop.width(), 28);

        let inverted = bitmap.inverted();
        assert!(!inverted.black_matrix().unwrap().get(0, 0));
    }
}
