//! # barcodec
//!
//! A Rust library for reading and writing QR codes and linear barcodes. Symbols are
//! located in grayscale images, sampled and error corrected with Reed-Solomon codes
//! where the format carries them.
//!
//! ## Features
//!
//! - **QR Codes**: Versions 1-40, all error correction levels, ECI character sets,
//!   structured append and GS1 markers
//! - **Linear Barcodes**: EAN-13, EAN-8, UPC-A, UPC-E, Code 39, Code 93, Code 128,
//!   ITF and Codabar
//! - **Binarization**: Global histogram and local block based thresholding
//! - **Robust Detection**: Perspective correction, mirrored symbols, inverted images
//!   and rotated linear codes
//!
//! ## Quick Start
//!
//! ### Writing a Symbol
//!
//! ```rust
//! use barcodec::{encode, BarcodeFormat, ECLevel, EncodeHints};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Width and height of 0 give the smallest rendering, quiet zone included
//! let mut hints = EncodeHints::new();
//! hints.ec_level(ECLevel::M);
//! let matrix = encode("Hello, World!", BarcodeFormat::QrCode, 0, 0, &hints)?;
//!
//! let img = matrix.to_image(4);  // 4 pixels a module
//! assert_eq!(img.width() as usize, 4 * matrix.width());
//! # Ok(())
//! # }
//! ```
//!
//! ### Reading a Symbol
//!
//! ```rust
//! use barcodec::{decode_luma, encode, BarcodeFormat, DecodeHints, EncodeHints};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let matrix = encode("5901234123457", BarcodeFormat::Ean13, 300, 60, &EncodeHints::new())?;
//! let img = matrix.to_image(1);
//! let (w, h) = img.dimensions();
//!
//! let mut hints = DecodeHints::new();
//! hints.possible_formats(&[BarcodeFormat::Ean13]);
//! let res = decode_luma(img.as_raw(), w as usize, h as usize, &hints)?;
//! assert_eq!(res.text(), "5901234123457");
//! # Ok(())
//! # }
//! ```
//!
//! ### Reading From a File
//!
//! ```rust,no_run
//! use barcodec::{decode_image, DecodeHints};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = image::open("barcode.png")?;
//! let mut hints = DecodeHints::new();
//! hints.try_harder(true).also_inverted(true);
//!
//! let res = decode_image(&img, &hints)?;
//! println!("{}: {}", res.format(), res.text());
//! # Ok(())
//! # }
//! ```
//!
//! ## QR Code Components
//!
//! ### Error Correction Levels
//! - **L (Low)**: ~7% error correction
//! - **M (Medium)**: ~15% error correction
//! - **Q (Quartile)**: ~25% error correction
//! - **H (High)**: ~30% error correction
//!
//! ### Hints
//! Decoding is steered by [`DecodeHints`]: restricting the formats tried, spending more
//! time with `try_harder`, skipping detection for `pure_barcode` images or retrying on
//! the inverted image. Encoding takes [`EncodeHints`] for margins, QR version, mask and
//! error correction level, character set and Code 128 code set.

#![allow(clippy::items_after_test_module)]

pub mod builder;
pub(crate) mod common;
pub mod reader;

pub use builder::{MultiFormatWriter, QRBuilder, Writer};
pub use common::{
    bit_array::BitArray,
    bit_matrix::BitMatrix,
    charset::CharacterSetEci,
    error::{BarcodeError, BarcodeResult},
    format::BarcodeFormat,
    hints::{CodeSet, DecodeHints, EncodeHints},
    mask::MaskPattern,
    metadata::{ECLevel, Version},
    point::{Point, ResultPoint},
    result::{DecodedBarcode, DecoderResult, MetadataValue, ResultMetadataKey},
};
pub use reader::{
    BinaryBitmap, HybridBinarizer, Luma8Source, LuminanceSource, MultiFormatReader, Reader,
};

use image::DynamicImage;
use log::debug;

// Entry points
//------------------------------------------------------------------------------

/// Decodes the first symbol found in `source`
pub fn decode(source: &Luma8Source, hints: &DecodeHints) -> BarcodeResult<DecodedBarcode> {
    debug!("Decoding {}x{} image", source.width(), source.height());
    let image = BinaryBitmap::new(HybridBinarizer::new(source.clone()));
    MultiFormatReader::new(hints).decode_with_state(&image)
}

/// Decodes the first symbol found in `width` x `height` 8 bit grayscale pixels
pub fn decode_luma(
    pixels: &[u8],
    width: usize,
    height: usize,
    hints: &DecodeHints,
) -> BarcodeResult<DecodedBarcode> {
    let source = Luma8Source::from_luma(pixels, width, height)?;
    decode(&source, hints)
}

/// Decodes the first symbol found in `img`
pub fn decode_image(img: &DynamicImage, hints: &DecodeHints) -> BarcodeResult<DecodedBarcode> {
    let source = Luma8Source::try_from(img)?;
    decode(&source, hints)
}

/// Renders `text` as a symbol of `format`, scaled up to at least `width` x `height`. Set
/// modules are dark.
pub fn encode(
    text: &str,
    format: BarcodeFormat,
    width: usize,
    height: usize,
    hints: &EncodeHints,
) -> BarcodeResult<BitMatrix> {
    debug!("Encoding {} characters as {format}", text.chars().count());
    MultiFormatWriter.encode(text, format, width, height, hints)
}
