use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use super::charset::CharacterSetEci;
use super::format::BarcodeFormat;
use super::mask::MaskPattern;
use super::metadata::{ECLevel, Version};
use super::point::Point;

pub type PointCallback = Arc<dyn Fn(Point) + Send + Sync>;

// Decode hints
//------------------------------------------------------------------------------

/// Options steering the readers. Every option has a neutral default.
#[derive(Clone, Default)]
pub struct DecodeHints {
    pub(crate) possible_formats: Option<Vec<BarcodeFormat>>,
    pub(crate) try_harder: bool,
    pub(crate) pure_barcode: bool,
    pub(crate) character_set: Option<CharacterSetEci>,
    pub(crate) assume_gs1: bool,
    pub(crate) result_point_callback: Option<PointCallback>,
    pub(crate) assume_code39_check_digit: bool,
    pub(crate) return_codabar_start_end: bool,
    pub(crate) allowed_lengths: Option<Vec<usize>>,
    pub(crate) also_inverted: bool,
}

impl DecodeHints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts decoding to the given formats
    pub fn possible_formats(&mut self, formats: &[BarcodeFormat]) -> &mut Self {
        self.possible_formats = Some(formats.to_vec());
        self
    }

    /// Spends more time looking for a symbol: more rows, rotations and reversed scans
    pub fn try_harder(&mut self, try_harder: bool) -> &mut Self {
        self.try_harder = try_harder;
        self
    }

    /// The image is a clean, unrotated rendering of a single symbol
    pub fn pure_barcode(&mut self, pure_barcode: bool) -> &mut Self {
        self.pure_barcode = pure_barcode;
        self
    }

    pub fn character_set(&mut self, character_set: CharacterSetEci) -> &mut Self {
        self.character_set = Some(character_set);
        self
    }

    pub fn assume_gs1(&mut self, assume_gs1: bool) -> &mut Self {
        self.assume_gs1 = assume_gs1;
        self
    }

    pub fn result_point_callback<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(Point) + Send + Sync + 'static,
    {
        self.result_point_callback = Some(Arc::new(callback));
        self
    }

    pub fn assume_code39_check_digit(&mut self, assume: bool) -> &mut Self {
        self.assume_code39_check_digit = assume;
        self
    }

    pub fn return_codabar_start_end(&mut self, ret: bool) -> &mut Self {
        self.return_codabar_start_end = ret;
        self
    }

    pub fn allowed_lengths(&mut self, lengths: &[usize]) -> &mut Self {
        self.allowed_lengths = Some(lengths.to_vec());
        self
    }

    /// Retries on the inverted image when nothing is found
    pub fn also_inverted(&mut self, also_inverted: bool) -> &mut Self {
        self.also_inverted = also_inverted;
        self
    }

    /// True when `format` is acceptable. No restriction means every format is.
    pub fn is_possible(&self, format: BarcodeFormat) -> bool {
        self.possible_formats.as_ref().map_or(true, |f| f.contains(&format))
    }

    pub(crate) fn notify_point(&self, point: Point) {
        if let Some(cb) = &self.result_point_callback {
            cb(point);
        }
    }
}

impl Debug for DecodeHints {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DecodeHints")
            .field("possible_formats", &self.possible_formats)
            .field("try_harder", &self.try_harder)
            .field("pure_barcode", &self.pure_barcode)
            .field("character_set", &self.character_set)
            .field("assume_gs1", &self.assume_gs1)
            .field("result_point_callback", &self.result_point_callback.is_some())
            .field("assume_code39_check_digit", &self.assume_code39_check_digit)
            .field("return_codabar_start_end", &self.return_codabar_start_end)
            .field("allowed_lengths", &self.allowed_lengths)
            .field("also_inverted", &self.also_inverted)
            .finish()
    }
}

// Encode hints
//------------------------------------------------------------------------------

/// Code 128 code set a writer can be pinned to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeSet {
    A,
    B,
    C,
}

#[derive(Debug, Clone, Default)]
pub struct EncodeHints {
    pub(crate) margin: Option<usize>,
    pub(crate) ec_level: Option<ECLevel>,
    pub(crate) gs1_format: bool,
    pub(crate) character_set: Option<CharacterSetEci>,
    pub(crate) qr_version: Option<Version>,
    pub(crate) qr_mask_pattern: Option<MaskPattern>,
    pub(crate) code128_compact: bool,
    pub(crate) force_code_set: Option<CodeSet>,
}

impl EncodeHints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quiet zone in modules, overriding each format's default
    pub fn margin(&mut self, margin: usize) -> &mut Self {
        self.margin = Some(margin);
        self
    }

    pub fn ec_level(&mut self, ec_level: ECLevel) -> &mut Self {
        self.ec_level = Some(ec_level);
        self
    }

    pub fn gs1_format(&mut self, gs1_format: bool) -> &mut Self {
        self.gs1_format = gs1_format;
        self
    }

    pub fn character_set(&mut self, character_set: CharacterSetEci) -> &mut Self {
        self.character_set = Some(character_set);
        self
    }

    pub fn qr_version(&mut self, version: Version) -> &mut Self {
        self.qr_version = Some(version);
        self
    }

    pub fn qr_mask_pattern(&mut self, mask: MaskPattern) -> &mut Self {
        self.qr_mask_pattern = Some(mask);
        self
    }

    /// Accepted for compatibility, the compact Code 128 encoder is not available
    pub fn code128_compact(&mut self, compact: bool) -> &mut Self {
        self.code128_compact = compact;
        self
    }

    pub fn force_code_set(&mut self, code_set: CodeSet) -> &mut Self {
        self.force_code_set = Some(code_set);
        self
    }
}
