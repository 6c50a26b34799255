use std::ops::Deref;

use super::bit_matrix::BitMatrix;
use super::error::{BarcodeError, BarcodeResult};

#[derive(Debug, PartialEq, Eq, Copy, Clone, PartialOrd, Ord, Hash)]
pub struct MaskPattern(u8);

impl MaskPattern {
    pub fn new(pattern: u8) -> BarcodeResult<Self> {
        if pattern >= 8 {
            return Err(BarcodeError::illegal(format!("Invalid mask pattern: {pattern}")));
        }
        Ok(Self(pattern))
    }

    pub fn all() -> impl Iterator<Item = MaskPattern> {
        (0..8).map(MaskPattern)
    }
}

impl Deref for MaskPattern {
    type Target = u8;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

mod mask_functions {
    pub fn checkerboard(r: i32, c: i32) -> bool {
        (r + c) & 1 == 0
    }

    pub fn horizontal_lines(r: i32, _: i32) -> bool {
        r & 1 == 0
    }

    pub fn vertical_lines(_: i32, c: i32) -> bool {
        c % 3 == 0
    }

    pub fn diagonal_lines(r: i32, c: i32) -> bool {
        (r + c) % 3 == 0
    }

    pub fn large_checkerboard(r: i32, c: i32) -> bool {
        ((r >> 1) + (c / 3)) & 1 == 0
    }

    pub fn fields(r: i32, c: i32) -> bool {
        ((r * c) & 1) + ((r * c) % 3) == 0
    }

    pub fn diamonds(r: i32, c: i32) -> bool {
        (((r * c) & 1) + ((r * c) % 3)) & 1 == 0
    }

    pub fn meadow(r: i32, c: i32) -> bool {
        (((r + c) & 1) + ((r * c) % 3)) & 1 == 0
    }
}

impl MaskPattern {
    pub fn mask_function(self) -> fn(i32, i32) -> bool {
        match self.0 {
            0b000 => mask_functions::checkerboard,
            0b001 => mask_functions::horizontal_lines,
            0b010 => mask_functions::vertical_lines,
            0b011 => mask_functions::diagonal_lines,
            0b100 => mask_functions::large_checkerboard,
            0b101 => mask_functions::fields,
            0b110 => mask_functions::diamonds,
            _ => mask_functions::meadow,
        }
    }

    /// Whether the module at row `r`, column `c` is flipped by this mask
    pub fn is_masked(self, r: usize, c: usize) -> bool {
        (self.mask_function())(r as i32, c as i32)
    }
}

#[cfg(test)]
mod mask_pattern_tests {
    use super::MaskPattern;

    #[test]
    fn test_invalid_pattern() {
        assert!(MaskPattern::new(8).is_err());
        assert_eq!(*MaskPattern::new(7).unwrap(), 7);
    }

    #[test]
    fn test_mask_functions() {
        let m = |p| MaskPattern::new(p).unwrap();
        assert!(m(0).is_masked(0, 0));
        assert!(!m(0).is_masked(0, 1));
        assert!(m(1).is_masked(2, 1));
        assert!(!m(1).is_masked(1, 2));
        assert!(m(2).is_masked(1, 3));
        assert!(!m(2).is_masked(3, 1));
        assert!(m(3).is_masked(1, 2));
        assert!(m(4).is_masked(1, 2));
        assert!(!m(4).is_masked(2, 2));
        assert!(m(5).is_masked(0, 5));
        assert!(!m(5).is_masked(1, 1));
        assert!(m(6).is_masked(0, 0));
        assert!(!m(6).is_masked(3, 3));
        assert!(!m(7).is_masked(1, 1));
        assert!(m(7).is_masked(0, 0));
    }
}

// Penalty rules
//------------------------------------------------------------------------------

/// Sum of the four ISO 18004 penalty rules for a complete, masked symbol
pub fn compute_total_penalty(qr: &BitMatrix) -> u32 {
    let adj_pen = compute_adjacent_penalty(qr);
    let blk_pen = compute_block_penalty(qr);
    let fp_pen_h = compute_finder_pattern_penalty(qr, true);
    let fp_pen_v = compute_finder_pattern_penalty(qr, false);
    let bal_pen = compute_balance_penalty(qr);
    adj_pen + blk_pen + fp_pen_h + fp_pen_v + bal_pen
}

// N1: runs of five or more same colored modules in a row or column
fn compute_adjacent_penalty(qr: &BitMatrix) -> u32 {
    let w = qr.width();
    let run_penalty = |len: u32| if len >= 5 { len - 2 } else { 0 };
    let mut pen = 0;
    let mut cols = vec![(false, 0u32); w];
    for r in 0..w {
        let mut last = (false, 0u32);
        for (c, col) in cols.iter_mut().enumerate() {
            let clr = qr.get(c, r);
            if r == 0 || col.0 != clr {
                pen += run_penalty(col.1);
                *col = (clr, 0);
            }
            col.1 += 1;
            if c == 0 || last.0 != clr {
                pen += run_penalty(last.1);
                last = (clr, 0);
            }
            last.1 += 1;
        }
        pen += run_penalty(last.1);
    }
    pen + cols.iter().map(|col| run_penalty(col.1)).sum::<u32>()
}

// N2: 2x2 blocks of one color
fn compute_block_penalty(qr: &BitMatrix) -> u32 {
    let mut pen = 0;
    let w = qr.width();
    for r in 0..w - 1 {
        for c in 0..w - 1 {
            let clr = qr.get(c, r);
            if clr == qr.get(c, r + 1) && clr == qr.get(c + 1, r) && clr == qr.get(c + 1, r + 1) {
                pen += 3;
            }
        }
    }
    pen
}

// N3: 1:1:3:1:1 finder-like patterns with four light modules on either side
fn compute_finder_pattern_penalty(qr: &BitMatrix, is_hor: bool) -> u32 {
    static PATTERN: [bool; 7] = [true, false, true, true, true, false, true];
    let mut pen = 0;
    let w = qr.width() as i32;
    for i in 0..w {
        let get = |j: i32| {
            if is_hor {
                qr.get(j as usize, i as usize)
            } else {
                qr.get(i as usize, j as usize)
            }
        };
        for j in 0..w - 6 {
            if (j..j + 7).map(get).eq(PATTERN.iter().copied()) {
                let light = |x: i32| x < 0 || x >= w || !get(x);
                if (j - 4..j).all(light) || (j + 7..j + 11).all(light) {
                    pen += 40;
                }
            }
        }
    }
    pen
}

// N4: deviation of the dark module ratio from 50%
fn compute_balance_penalty(qr: &BitMatrix) -> u32 {
    let w = qr.width();
    let tot = w * w;
    let dark_cnt =
        (0..w).flat_map(|r| (0..w).map(move |c| (c, r))).filter(|&(c, r)| qr.get(c, r)).count();
    let k = (dark_cnt * 2).abs_diff(tot) * 10 / tot;
    (k * 10) as u32
}
