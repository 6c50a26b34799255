use std::fmt::{Display, Formatter, Result as FmtResult};

use image::{GrayImage, Luma};

use super::bit_array::BitArray;
use super::error::{BarcodeError, BarcodeResult};

// Bit matrix
//------------------------------------------------------------------------------

/// 2D grid of bits, row major. `get(x, y)` with `x` the column and `y` the row. Each row is
/// packed into `row_size` 32-bit words so rows can be copied in and out as `BitArray`s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitMatrix {
    width: usize,
    height: usize,
    row_size: usize,
    bits: Vec<u32>,
}

impl BitMatrix {
    pub fn new(width: usize, height: usize) -> BarcodeResult<Self> {
        if width == 0 || height == 0 {
            return Err(BarcodeError::illegal("Both dimensions must be greater than 0"));
        }
        let row_size = width.div_ceil(32);
        Ok(Self { width, height, row_size, bits: vec![0; row_size * height] })
    }

    pub fn square(dimension: usize) -> BarcodeResult<Self> {
        Self::new(dimension, dimension)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn row_size(&self) -> usize {
        self.row_size
    }

    #[inline]
    fn offset(&self, x: usize, y: usize) -> usize {
        debug_assert!(
            x < self.width && y < self.height,
            "Coordinates out of bounds: ({x}, {y}), Size {}x{}",
            self.width,
            self.height
        );
        y * self.row_size + (x >> 5)
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        (self.bits[self.offset(x, y)] >> (x & 0x1f)) & 1 != 0
    }

    /// Bounds checked read for callers working with signed or projected coordinates
    #[inline]
    pub fn try_get(&self, x: i32, y: i32) -> Option<bool> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        Some(self.get(x as usize, y as usize))
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize) {
        let offset = self.offset(x, y);
        self.bits[offset] |= 1 << (x & 0x1f);
    }

    #[inline]
    pub fn unset(&mut self, x: usize, y: usize) {
        let offset = self.offset(x, y);
        self.bits[offset] &= !(1 << (x & 0x1f));
    }

    #[inline]
    pub fn set_bool(&mut self, x: usize, y: usize, value: bool) {
        if value {
            self.set(x, y);
        } else {
            self.unset(x, y);
        }
    }

    #[inline]
    pub fn flip(&mut self, x: usize, y: usize) {
        let offset = self.offset(x, y);
        self.bits[offset] ^= 1 << (x & 0x1f);
    }

    pub fn flip_all(&mut self) {
        // Padding bits past the width are flipped too, they are never read
        self.bits.iter_mut().for_each(|w| *w = !*w);
    }

    /// Xors every bit with the same position in `mask`
    pub fn xor(&mut self, mask: &BitMatrix) -> BarcodeResult<()> {
        if self.width != mask.width || self.height != mask.height || self.row_size != mask.row_size
        {
            return Err(BarcodeError::illegal("Input matrix dimensions do not match"));
        }
        self.bits.iter_mut().zip(mask.bits.iter()).for_each(|(a, b)| *a ^= b);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.bits.fill(0);
    }

    /// Sets a rectangular region with top left corner at (left, top)
    pub fn set_region(
        &mut self,
        left: usize,
        top: usize,
        width: usize,
        height: usize,
    ) -> BarcodeResult<()> {
        if width < 1 || height < 1 {
            return Err(BarcodeError::illegal("Height and width must be at least 1"));
        }
        let (right, bottom) = (left + width, top + height);
        if right > self.width || bottom > self.height {
            return Err(BarcodeError::illegal("The region must fit inside the matrix"));
        }
        for y in top..bottom {
            let offset = y * self.row_size;
            for x in left..right {
                self.bits[offset + (x >> 5)] |= 1 << (x & 0x1f);
            }
        }
        Ok(())
    }

    /// Copies row `y` into `reuse`, allocating a new array only when `reuse` is too small
    pub fn row(&self, y: usize, reuse: BitArray) -> BitArray {
        let mut row =
            if reuse.size() < self.width { BitArray::with_size(self.width) } else { reuse };
        row.clear();
        let offset = y * self.row_size;
        for x in 0..self.row_size {
            row.set_bulk(x << 5, self.bits[offset + x]);
        }
        row
    }

    pub fn set_row(&mut self, y: usize, row: &BitArray) {
        let offset = y * self.row_size;
        let words = row.words();
        self.bits[offset..offset + self.row_size].copy_from_slice(&words[..self.row_size]);
    }

    pub fn rotate_180(&mut self) {
        let mut rotated = vec![0u32; self.bits.len()];
        for y in 0..self.height {
            for x in 0..self.width {
                if self.get(x, y) {
                    let (nx, ny) = (self.width - 1 - x, self.height - 1 - y);
                    rotated[ny * self.row_size + (nx >> 5)] |= 1 << (nx & 0x1f);
                }
            }
        }
        self.bits = rotated;
    }

    /// Rotates 90 degrees counter clockwise
    pub fn rotate_90(&mut self) {
        let (new_width, new_height) = (self.height, self.width);
        let new_row_size = new_width.div_ceil(32);
        let mut rotated = vec![0u32; new_row_size * new_height];
        for y in 0..self.height {
            for x in 0..self.width {
                if self.get(x, y) {
                    let (nx, ny) = (y, self.width - 1 - x);
                    rotated[ny * new_row_size + (nx >> 5)] |= 1 << (nx & 0x1f);
                }
            }
        }
        self.width = new_width;
        self.height = new_height;
        self.row_size = new_row_size;
        self.bits = rotated;
    }

    /// Swaps rows and columns. Only defined for square matrices.
    pub fn transpose(&mut self) {
        debug_assert_eq!(self.width, self.height, "Transpose needs a square matrix");
        for x in 0..self.width {
            for y in x + 1..self.height {
                if self.get(x, y) != self.get(y, x) {
                    self.flip(y, x);
                    self.flip(x, y);
                }
            }
        }
    }

    /// Bounding box of all set bits as (left, top, width, height)
    pub fn enclosing_rectangle(&self) -> Option<(usize, usize, usize, usize)> {
        let (mut left, mut top) = (self.width, self.height);
        let (mut right, mut bottom) = (0, 0);
        let mut found = false;
        for y in 0..self.height {
            for x in 0..self.width {
                if self.get(x, y) {
                    found = true;
                    left = left.min(x);
                    right = right.max(x);
                    top = top.min(y);
                    bottom = bottom.max(y);
                }
            }
        }
        found.then(|| (left, top, right - left + 1, bottom - top + 1))
    }

    pub fn top_left_on_bit(&self) -> Option<(usize, usize)> {
        let idx = self.bits.iter().position(|&w| w != 0)?;
        let (y, word) = (idx / self.row_size, idx % self.row_size);
        let x = (word << 5) + self.bits[idx].trailing_zeros() as usize;
        Some((x, y))
    }

    pub fn bottom_right_on_bit(&self) -> Option<(usize, usize)> {
        let idx = self.bits.iter().rposition(|&w| w != 0)?;
        let (y, word) = (idx / self.row_size, idx % self.row_size);
        let x = (word << 5) + 31 - self.bits[idx].leading_zeros() as usize;
        Some((x, y))
    }

    /// Renders set bits as black pixels, each module `scale` pixels wide
    pub fn to_image(&self, scale: u32) -> GrayImage {
        let scale = scale.max(1);
        let (w, h) = (self.width as u32 * scale, self.height as u32 * scale);
        GrayImage::from_fn(w, h, |x, y| {
            let dark = self.get((x / scale) as usize, (y / scale) as usize);
            Luma([if dark { 0 } else { 255 }])
        })
    }

    /// Parses rows of `set` and `unset` tokens, one row per line
    pub fn parse(repr: &str, set: &str, unset: &str) -> BarcodeResult<Self> {
        let rows = repr
            .lines()
            .filter(|l| !l.is_empty())
            .map(|line| {
                let mut row = Vec::new();
                let mut rest = line;
                while !rest.is_empty() {
                    if let Some(r) = rest.strip_prefix(set) {
                        row.push(true);
                        rest = r;
                    } else if let Some(r) = rest.strip_prefix(unset) {
                        row.push(false);
                        rest = r;
                    } else {
                        return Err(BarcodeError::illegal(format!("Illegal character in {line}")));
                    }
                }
                Ok(row)
            })
            .collect::<BarcodeResult<Vec<_>>>()?;
        let width = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != width) {
            return Err(BarcodeError::illegal("Row lengths do not match"));
        }
        let mut matrix = Self::new(width, rows.len())?;
        for (y, row) in rows.iter().enumerate() {
            row.iter().enumerate().filter(|(_, &b)| b).for_each(|(x, _)| matrix.set(x, y));
        }
        Ok(matrix)
    }

    pub fn to_string_with(&self, set: &str, unset: &str) -> String {
        let mut res = String::with_capacity(self.height * (self.width * set.len() + 1));
        for y in 0..self.height {
            for x in 0..self.width {
                res.push_str(if self.get(x, y) { set } else { unset });
            }
            res.push('\n');
        }
        res
    }
}

impl Display for BitMatrix {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.to_string_with("X ", "  "))
    }
}

#[cfg(test)]
mod bit_matrix_tests {
    use super::BitMatrix;
    use crate::common::bit_array::BitArray;

    #[test]
    fn test_get_set() {
        let mut matrix = BitMatrix::square(33).unwrap();
        assert_eq!(matrix.height(), 33);
        for y in 0..33 {
            for x in 0..33 {
                if y * x % 3 == 0 {
                    matrix.set(x, y);
                }
            }
        }
        for y in 0..33 {
            for x in 0..33 {
                assert_eq!(matrix.get(x, y), y * x % 3 == 0);
            }
        }
    }

    #[test]
    fn test_zero_dimension() {
        assert!(BitMatrix::new(0, 4).is_err());
        assert!(BitMatrix::new(4, 0).is_err());
    }

    #[test]
    fn test_set_region() {
        let mut matrix = BitMatrix::square(5).unwrap();
        matrix.set_region(1, 1, 3, 3).unwrap();
        for y in 0..5 {
            for x in 0..5 {
                assert_eq!(matrix.get(x, y), (1..=3).contains(&y) && (1..=3).contains(&x));
            }
        }
        assert!(matrix.set_region(0, 0, 0, 1).is_err());
        assert!(matrix.set_region(3, 3, 3, 3).is_err());
    }

    #[test]
    fn test_enclosing() {
        let mut matrix = BitMatrix::square(5).unwrap();
        assert_eq!(matrix.enclosing_rectangle(), None);
        matrix.set_region(1, 1, 1, 1).unwrap();
        assert_eq!(matrix.enclosing_rectangle(), Some((1, 1, 1, 1)));
        matrix.set_region(1, 1, 3, 2).unwrap();
        assert_eq!(matrix.enclosing_rectangle(), Some((1, 1, 3, 2)));
        matrix.set_region(0, 0, 5, 5).unwrap();
        assert_eq!(matrix.enclosing_rectangle(), Some((0, 0, 5, 5)));
    }

    #[test]
    fn test_on_bit() {
        let mut matrix = BitMatrix::square(5).unwrap();
        assert_eq!(matrix.top_left_on_bit(), None);
        assert_eq!(matrix.bottom_right_on_bit(), None);
        matrix.set_region(1, 1, 1, 1).unwrap();
        assert_eq!(matrix.top_left_on_bit(), Some((1, 1)));
        assert_eq!(matrix.bottom_right_on_bit(), Some((1, 1)));
        matrix.set_region(1, 1, 3, 2).unwrap();
        assert_eq!(matrix.top_left_on_bit(), Some((1, 1)));
        assert_eq!(matrix.bottom_right_on_bit(), Some((3, 2)));
    }

    #[test]
    fn test_rectangular() {
        let mut matrix = BitMatrix::new(75, 20).unwrap();
        matrix.set(10, 0);
        matrix.set(11, 1);
        matrix.set(50, 2);
        matrix.set(51, 3);
        matrix.flip(74, 4);
        matrix.flip(0, 5);
        assert!(matrix.get(10, 0));
        assert!(matrix.get(11, 1));
        assert!(matrix.get(50, 2));
        assert!(matrix.get(51, 3));
        assert!(matrix.get(74, 4));
        assert!(matrix.get(0, 5));
        matrix.flip(50, 2);
        assert!(!matrix.get(50, 2));
    }

    #[test]
    fn test_row_round_trip() {
        let mut matrix = BitMatrix::new(102, 3).unwrap();
        matrix.set(0, 1);
        matrix.set(101, 1);
        let row = matrix.row(1, BitArray::new());
        assert_eq!(row.size(), 102);
        assert!(row.get(0) && row.get(101) && !row.get(50));
        let mut other = BitMatrix::new(102, 3).unwrap();
        other.set_row(2, &row);
        assert!(other.get(0, 2) && other.get(101, 2));
    }

    #[test]
    fn test_rotate_90() {
        let mut matrix = BitMatrix::new(3, 2).unwrap();
        matrix.set(2, 0);
        matrix.rotate_90();
        assert_eq!((matrix.width(), matrix.height()), (2, 3));
        assert!(matrix.get(0, 0));
        matrix.rotate_90();
        matrix.rotate_90();
        matrix.rotate_90();
        assert!(matrix.get(2, 0));
    }

    #[test]
    fn test_rotate_180() {
        let mut matrix = BitMatrix::new(40, 3).unwrap();
        matrix.set(0, 0);
        matrix.set(39, 1);
        matrix.rotate_180();
        assert!(matrix.get(39, 2));
        assert!(matrix.get(0, 1));
        assert!(!matrix.get(0, 0));
    }

    #[test]
    fn test_transpose() {
        let mut matrix = BitMatrix::square(4).unwrap();
        matrix.set(3, 0);
        matrix.transpose();
        assert!(matrix.get(0, 3));
        assert!(!matrix.get(3, 0));
    }

    #[test]
    fn test_clone_is_deep() {
        let mut matrix = BitMatrix::square(5).unwrap();
        matrix.set(1, 1);
        let cloned = matrix.clone();
        matrix.set(2, 2);
        assert!(cloned.get(1, 1));
        assert!(!cloned.get(2, 2));
        assert_ne!(matrix, cloned);
    }

    #[test]
    fn test_xor() {
        let mut matrix = BitMatrix::square(3).unwrap();
        matrix.set(0, 0);
        let mut mask = BitMatrix::square(3).unwrap();
        mask.set(0, 0);
        mask.set(1, 1);
        matrix.xor(&mask).unwrap();
        assert!(!matrix.get(0, 0));
        assert!(matrix.get(1, 1));
        assert!(matrix.xor(&BitMatrix::square(4).unwrap()).is_err());
    }

    #[test]
    fn test_parse_display() {
        let repr = "X X \n  X \n";
        let matrix = BitMatrix::parse(repr, "X ", "  ").unwrap();
        assert_eq!(matrix.width(), 2);
        assert!(matrix.get(0, 0) && matrix.get(1, 0) && !matrix.get(0, 1) && matrix.get(1, 1));
        assert_eq!(matrix.to_string(), repr);
    }

    #[test]
    fn test_to_image() {
        let mut matrix = BitMatrix::square(2).unwrap();
        matrix.set(1, 0);
        let img = matrix.to_image(3);
        assert_eq!(img.dimensions(), (6, 6));
        assert_eq!(img.get_pixel(4, 1).0, [0]);
        assert_eq!(img.get_pixel(1, 1).0, [255]);
    }
}
