use std::ops::{Deref, Not};

use log::{debug, trace};

use crate::common::{
    bit_matrix::BitMatrix,
    error::{BarcodeError, BarcodeResult},
    iter::EncRegionIter,
    mask::{compute_total_penalty, MaskPattern},
    metadata::*,
};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Color {
    Light,
    Dark,
}

impl Not for Color {
    type Output = Self;
    fn not(self) -> Self::Output {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Module {
    Empty,
    Func(Color),
    Version(Color),
    Format(Color),
    Data(Color),
}

impl Deref for Module {
    type Target = Color;
    fn deref(&self) -> &Self::Target {
        match self {
            Module::Empty => &Color::Light,
            Module::Func(c) => c,
            Module::Version(c) => c,
            Module::Format(c) => c,
            Module::Data(c) => c,
        }
    }
}

/// Module grid of a QR symbol under construction
#[derive(Debug, Clone)]
pub struct QR {
    grid: Vec<Module>,
    w: usize,
    ver: Version,
    ecl: ECLevel,
    mask: Option<MaskPattern>,
}

// QR type for builder
//------------------------------------------------------------------------------

impl QR {
    pub fn new(ver: Version, ecl: ECLevel) -> Self {
        let w = ver.width();
        Self { grid: vec![Module::Empty; w * w], w, ver, ecl, mask: None }
    }

    pub fn version(&self) -> Version {
        self.ver
    }

    pub fn width(&self) -> usize {
        self.w
    }

    pub fn ec_level(&self) -> ECLevel {
        self.ecl
    }

    pub fn mask(&self) -> Option<MaskPattern> {
        self.mask
    }

    pub fn count_dark_modules(&self) -> usize {
        self.grid.iter().filter(|&m| matches!(**m, Color::Dark)).count()
    }

    #[cfg(test)]
    pub fn to_debug_str(&self) -> String {
        let w = self.w as i16;
        let mut res = String::with_capacity((w * (w + 1)) as usize);
        res.push('\n');
        for i in 0..w {
            for j in 0..w {
                let c = match self.get(i, j) {
                    Module::Empty => '.',
                    Module::Func(Color::Dark) => 'f',
                    Module::Func(Color::Light) => 'F',
                    Module::Version(Color::Dark) => 'v',
                    Module::Version(Color::Light) => 'V',
                    Module::Format(Color::Dark) => 'm',
                    Module::Format(Color::Light) => 'M',
                    Module::Data(Color::Dark) => 'd',
                    Module::Data(Color::Light) => 'D',
                };
                res.push(c);
            }
            res.push('\n');
        }
        res
    }

    // Negative coordinates count from the far edge
    fn coord_to_index(&self, r: i16, c: i16) -> usize {
        let w = self.w as i16;
        debug_assert!(-w <= r && r < w, "row should be less than w");
        debug_assert!(-w <= c && c < w, "column should be less than w");

        let r = if r < 0 { r + w } else { r };
        let c = if c < 0 { c + w } else { c };
        (r * w + c) as _
    }

    pub fn get(&self, r: i16, c: i16) -> Module {
        self.grid[self.coord_to_index(r, c)]
    }

    pub fn set(&mut self, r: i16, c: i16, module: Module) {
        let index = self.coord_to_index(r, c);
        self.grid[index] = module;
    }

    /// Dark modules as set bits, x being the column
    pub fn to_bit_matrix(&self) -> BarcodeResult<BitMatrix> {
        let mut matrix = BitMatrix::square(self.w)?;
        for (i, m) in self.grid.iter().enumerate() {
            if **m == Color::Dark {
                matrix.set(i % self.w, i / self.w);
            }
        }
        Ok(matrix)
    }
}


// Finder pattern
//------------------------------------------------------------------------------

impl QR {
    fn draw_finder_patterns(&mut self) {
        self.draw_finder_pattern_at(3, 3);
        self.draw_finder_pattern_at(3, -4);
        self.draw_finder_pattern_at(-4, 3);
    }

    // Finder with its light separator on the sides facing the symbol
    fn draw_finder_pattern_at(&mut self, r: i16, c: i16) {
        let (dr_top, dr_bottom) = if r > 0 { (-3, 4) } else { (-4, 3) };
        let (dc_left, dc_right) = if c > 0 { (-3, 4) } else { (-4, 3) };
        for i in dr_top..=dr_bottom {
            for j in dc_left..=dc_right {
                let clr = match (i, j) {
                    (4 | -4, _) | (_, 4 | -4) => Color::Light,
                    (3 | -3, _) | (_, 3 | -3) => Color::Dark,
                    (2 | -2, _) | (_, 2 | -2) => Color::Light,
                    _ => Color::Dark,
                };
                self.set(r + i, c + j, Module::Func(clr));
            }
        }
    }
}

#[cfg(test)]
mod finder_pattern_tests {
    use super::QR;
    use crate::common::metadata::{ECLevel, Version};

    #[test]
    fn test_finder_pattern_qr() {
        let mut qr = QR::new(Version::MIN, ECLevel::L);
        qr.draw_finder_patterns();
        assert_eq!(
            qr.to_debug_str(),
            "\n\
             fffffffF.....Ffffffff\n\
             fFFFFFfF.....FfFFFFFf\n\
             fFfffFfF.....FfFfffFf\n\
             fFfffFfF.....FfFfffFf\n\
             fFfffFfF.....FfFfffFf\n\
             fFFFFFfF.....FfFFFFFf\n\
             fffffffF.....Ffffffff\n\
             FFFFFFFF.....FFFFFFFF\n\
             .....................\n\
             .....................\n\
             .....................\n\
             .....................\n\
             .....................\n\
             FFFFFFFF.............\n\
             fffffffF.............\n\
             fFFFFFfF.............\n\
             fFfffFfF.............\n\
             fFfffFfF.............\n\
             fFfffFfF.............\n\
             fFFFFFfF.............\n\
             fffffffF.............\n"
        );
    }
}

// Timing pattern
//------------------------------------------------------------------------------

impl QR {
    fn draw_timing_pattern(&mut self) {
        let last = self.w as i16 - 9;
        for k in 8..=last {
            let clr = if k & 1 == 0 { Color::Dark } else { Color::Light };
            self.set(6, k, Module::Func(clr));
            self.set(k, 6, Module::Func(clr));
        }
    }
}

#[cfg(test)]
mod timing_pattern_tests {
    use super::QR;
    use crate::common::metadata::{ECLevel, Version};

    #[test]
    fn test_timing_pattern_1() {
        let mut qr = QR::new(Version::MIN, ECLevel::L);
        qr.draw_timing_pattern();
        let s = qr.to_debug_str();
        let rows = s.lines().skip(1).collect::<Vec<_>>();
        assert_eq!(rows[6], "........fFfFf........");
        assert_eq!(rows[8], "......f..............");
        assert_eq!(rows[9], "......F..............");
        assert_eq!(rows[12], "......f..............");
        assert_eq!(rows[13], ".....................");
    }
}

// Alignment pattern
//------------------------------------------------------------------------------

impl QR {
    fn draw_alignment_patterns(&mut self) {
        let poses = self.ver.alignment_pattern();
        for &r in poses {
            for &c in poses {
                self.draw_alignment_pattern_at(r as i16, c as i16)
            }
        }
    }

    // Skips the three corners taken by finder patterns
    fn draw_alignment_pattern_at(&mut self, r: i16, c: i16) {
        let w = self.w as i16;
        if (r == 6 && (c == 6 || c - w == -7)) || (r - w == -7 && c == 6) {
            return;
        }
        for i in -2..=2 {
            for j in -2..=2 {
                let clr = match (i, j) {
                    (-2 | 2, _) | (_, -2 | 2) | (0, 0) => Color::Dark,
                    _ => Color::Light,
                };
                self.set(r + i, c + j, Module::Func(clr));
            }
        }
    }
}


// All function patterns
//------------------------------------------------------------------------------

impl QR {
    pub fn draw_all_function_patterns(&mut self) {
        self.draw_finder_patterns();
        self.draw_timing_pattern();
        self.draw_alignment_patterns();
    }
}

// Format & version info
//------------------------------------------------------------------------------

impl QR {
    fn reserve_format_area(&mut self) {
        self.draw_format_info((1 << FORMAT_INFO_BIT_LEN) - 1);
    }

    fn draw_format_info(&mut self, format_info: u32) {
        let (off, on) = (Module::Format(Color::Light), Module::Format(Color::Dark));
        self.draw_number(format_info, FORMAT_INFO_BIT_LEN, off, on, &FORMAT_INFO_COORDS_QR_MAIN);
        self.draw_number(format_info, FORMAT_INFO_BIT_LEN, off, on, &FORMAT_INFO_COORDS_QR_SIDE);
        // Always dark module next to the bottom left finder
        self.set(-8, 8, Module::Format(Color::Dark));
    }

    fn draw_version_info(&mut self) {
        if *self.ver < 7 {
            return;
        }
        let ver_info = self.ver.info();
        let (off, on) = (Module::Version(Color::Light), Module::Version(Color::Dark));
        self.draw_number(ver_info, VERSION_INFO_BIT_LEN, off, on, &VERSION_INFO_COORDS_BL);
        self.draw_number(ver_info, VERSION_INFO_BIT_LEN, off, on, &VERSION_INFO_COORDS_TR);
    }

    // Coordinates are listed most significant bit first
    fn draw_number(
        &mut self,
        number: u32,
        bit_len: usize,
        off_clr: Module,
        on_clr: Module,
        coords: &[(i16, i16)],
    ) {
        let mut mask = 1 << (bit_len - 1);
        for (r, c) in coords {
            if number & mask == 0 {
                self.set(*r, *c, off_clr);
            } else {
                self.set(*r, *c, on_clr);
            }
            mask >>= 1;
        }
    }
}


// Encoding region
//------------------------------------------------------------------------------

impl QR {
    /// Places codewords along the zigzag path, most significant bit first. Modules left
    /// over are remainder bits and stay light before masking.
    pub fn draw_encoding_region(&mut self, payload: &[u8]) {
        self.reserve_format_area();
        self.draw_version_info();

        let mut coords = EncRegionIter::new(self.ver)
            .map(|(r, c)| (r as i16, c as i16))
            .filter(|&(r, c)| self.get(r, c) == Module::Empty)
            .collect::<Vec<_>>()
            .into_iter();
        let bits = payload.iter().flat_map(|b| (0..8).rev().map(move |i| (b >> i) & 1 == 1));
        for bit in bits {
            let Some((r, c)) = coords.next() else { break };
            let module = Module::Data(if bit { Color::Dark } else { Color::Light });
            self.set(r, c, module);
        }
        for (r, c) in coords {
            self.set(r, c, Module::Data(Color::Light));
        }

        debug_assert!(!self.grid.contains(&Module::Empty), "Empty module found in debug");
    }

    pub fn apply_mask(&mut self, pattern: MaskPattern) {
        self.mask = Some(pattern);
        let mask_fn = pattern.mask_function();
        let w = self.w as i16;
        for r in 0..w {
            for c in 0..w {
                if mask_fn(r as i32, c as i32) {
                    if let Module::Data(clr) = self.get(r, c) {
                        self.set(r, c, Module::Data(!clr))
                    }
                }
            }
        }
        let format_info = FormatInfo::new(self.ecl, pattern).encode();
        self.draw_format_info(format_info);
    }

    /// Tries every mask and keeps the one with the lowest penalty, the lowest index on ties
    pub fn apply_best_mask(&mut self) -> BarcodeResult<MaskPattern> {
        let mut best = None;
        for m in MaskPattern::all() {
            let mut qr = self.clone();
            qr.apply_mask(m);
            let penalty = compute_total_penalty(&qr.to_bit_matrix()?);
            trace!("Mask {} penalty {penalty}", *m);
            if best.map_or(true, |(_, p)| penalty < p) {
                best = Some((m, penalty));
            }
        }
        let (best_mask, _) = best.ok_or(BarcodeError::Format)?;
        self.apply_mask(best_mask);
        Ok(best_mask)
    }
}

#[cfg(test)]
mod encoding_region_tests {
    use super::{Color, Module, QR};
    use crate::common::mask::MaskPattern;
    use crate::common::metadata::{ECLevel, FormatInfo, Version, FORMAT_INFO_COORDS_QR_MAIN};

    fn filled(ver: usize) -> QR {
        let ver = Version::new(ver).unwrap();
        let mut qr = QR::new(ver, ECLevel::M);
        qr.draw_all_function_patterns();
        qr.draw_encoding_region(&vec![0u8; ver.total_codewords()]);
        qr
    }

    #[test]
    fn test_first_codeword_position() {
        let ver = Version::MIN;
        let mut qr = QR::new(ver, ECLevel::M);
        qr.draw_all_function_patterns();
        let mut payload = vec![0u8; ver.total_codewords()];
        payload[0] = 0b1010_0000;
        qr.draw_encoding_region(&payload);
        assert_eq!(qr.get(20, 20), Module::Data(Color::Dark));
        assert_eq!(qr.get(20, 19), Module::Data(Color::Light));
        assert_eq!(qr.get(19, 20), Module::Data(Color::Dark));
    }

    #[test]
    fn test_no_empty_modules() {
        for v in [1, 2, 7, 21, 40] {
            let qr = filled(v);
            assert!(!qr.grid.contains(&Module::Empty));
        }
    }

    #[test]
    fn test_apply_mask_writes_format_info() {
        let mut qr = filled(1);
        let mask = MaskPattern::new(5).unwrap();
        qr.apply_mask(mask);
        let mut word = 0;
        for &(r, c) in FORMAT_INFO_COORDS_QR_MAIN.iter() {
            word = (word << 1) | (*qr.get(r, c) == Color::Dark) as u32;
        }
        assert_eq!(word, FormatInfo::new(ECLevel::M, mask).encode());
        // r * c = 360 is masked by pattern 5, 400 is not
        assert_eq!(qr.get(20, 18), Module::Data(Color::Dark));
        assert_eq!(qr.get(20, 20), Module::Data(Color::Light));
    }

    #[test]
    fn test_best_mask_is_deterministic() {
        let mut a = filled(2);
        let mut b = filled(2);
        assert_eq!(a.apply_best_mask().unwrap(), b.apply_best_mask().unwrap());
        assert_eq!(a.mask(), b.mask());
    }
}

// Render
//------------------------------------------------------------------------------

impl QR {
    /// Renders with a quiet zone of `margin` modules, scaled by the largest whole factor
    /// that fits `width` x `height` and centered in it
    pub fn render(&self, width: usize, height: usize, margin: usize) -> BarcodeResult<BitMatrix> {
        let input = self.to_bit_matrix()?;
        let matrix = render_scaled(&input, width, height, margin)?;
        debug!(
            "Rendered version {} QR ({} dark modules) into {}x{}",
            self.ver,
            self.count_dark_modules(),
            matrix.width(),
            matrix.height()
        );
        Ok(matrix)
    }
}

pub(crate) fn render_scaled(
    input: &BitMatrix,
    width: usize,
    height: usize,
    margin: usize,
) -> BarcodeResult<BitMatrix> {
    let (in_w, in_h) = (input.width(), input.height());
    let (qr_w, qr_h) = (in_w + 2 * margin, in_h + 2 * margin);
    let out_w = width.max(qr_w);
    let out_h = height.max(qr_h);

    let multiple = (out_w / qr_w).min(out_h / qr_h);
    let left = (out_w - in_w * multiple) / 2;
    let top = (out_h - in_h * multiple) / 2;

    let mut output = BitMatrix::new(out_w, out_h)?;
    for y in 0..in_h {
        for x in 0..in_w {
            if input.get(x, y) {
                output.set_region(left + x * multiple, top + y * multiple, multiple, multiple)?;
            }
        }
    }
    Ok(output)
}

#[cfg(test)]
mod render_tests {
    use super::render_scaled;
    use crate::common::bit_matrix::BitMatrix;

    #[test]
    fn test_render_scaled() {
        let mut input = BitMatrix::square(3).unwrap();
        input.set(0, 0);
        input.set(2, 2);
        let out = render_scaled(&input, 0, 0, 1).unwrap();
        assert_eq!(out.width(), 5);
        assert!(out.get(1, 1));
        assert!(out.get(3, 3));
        assert!(!out.get(0, 0));

        let out = render_scaled(&input, 20, 10, 1).unwrap();
        assert_eq!((out.width(), out.height()), (20, 10));
        // multiple = 2, left = (20 - 6) / 2, top = (10 - 6) / 2
        assert!(out.get(7, 2) && out.get(8, 3));
        assert!(!out.get(9, 4));
        assert!(out.get(11, 6));
    }
}
