pub mod binarize;
pub mod luminance;
pub mod oned;
pub mod qr;
pub mod utils;

pub use binarize::{
    Binarizer, BinaryBitmap, GlobalHistogramBinarizer, HybridBinarizer, PassthroughBinarizer,
};
pub use luminance::{Luma8Source, LuminanceSource};
pub use oned::{MultiFormatOneDReader, OneDReader};
pub use qr::QrCodeReader;

use log::{debug, trace};

use crate::common::{
    error::{BarcodeError, BarcodeResult},
    format::BarcodeFormat,
    hints::DecodeHints,
    result::DecodedBarcode,
};

// Reader
//------------------------------------------------------------------------------

/// Locates and decodes one symbol in a binarized image
pub trait Reader {
    fn decode<B: Binarizer>(
        &mut self,
        image: &BinaryBitmap<B>,
        hints: &DecodeHints,
    ) -> BarcodeResult<DecodedBarcode>;
}

/// Closed set of readers the multi format reader chooses from
pub enum ReaderKind {
    OneD(MultiFormatOneDReader),
    Qr(QrCodeReader),
}

impl Reader for ReaderKind {
    fn decode<B: Binarizer>(
        &mut self,
        image: &BinaryBitmap<B>,
        hints: &DecodeHints,
    ) -> BarcodeResult<DecodedBarcode> {
        match self {
            Self::OneD(r) => r.decode(image, hints),
            Self::Qr(r) => r.decode(image, hints),
        }
    }
}

// Multi format reader
//------------------------------------------------------------------------------

/// Tries every reader enabled by the hints. Linear readers go first unless trying
/// harder, in which case the slower 2D search runs before them.
pub struct MultiFormatReader {
    hints: DecodeHints,
    readers: Vec<ReaderKind>,
}

impl Default for MultiFormatReader {
    fn default() -> Self {
        Self::new(&DecodeHints::default())
    }
}

impl MultiFormatReader {
    pub fn new(hints: &DecodeHints) -> Self {
        let mut reader = Self { hints: DecodeHints::default(), readers: Vec::new() };
        reader.set_hints(hints);
        reader
    }

    /// Rebuilds the reader list for `hints`
    pub fn set_hints(&mut self, hints: &DecodeHints) {
        self.hints = hints.clone();
        let try_harder = hints.try_harder;
        let mut readers = Vec::new();

        if let Some(formats) = &hints.possible_formats {
            let add_one_d = formats.iter().any(|f| f.is_one_d());
            if add_one_d && !try_harder {
                readers.push(ReaderKind::OneD(MultiFormatOneDReader::new(hints)));
            }
            if formats.contains(&BarcodeFormat::QrCode) {
                readers.push(ReaderKind::Qr(QrCodeReader::new()));
            }
            if add_one_d && try_harder {
                readers.push(ReaderKind::OneD(MultiFormatOneDReader::new(hints)));
            }
        }

        if readers.is_empty() {
            if !try_harder {
                readers.push(ReaderKind::OneD(MultiFormatOneDReader::new(hints)));
            }
            readers.push(ReaderKind::Qr(QrCodeReader::new()));
            if try_harder {
                readers.push(ReaderKind::OneD(MultiFormatOneDReader::new(hints)));
            }
        }
        self.readers = readers;
    }

    /// Decodes with the hints last set, without rebuilding the readers
    pub fn decode_with_state<B: Binarizer>(
        &mut self,
        image: &BinaryBitmap<B>,
    ) -> BarcodeResult<DecodedBarcode> {
        let mut best_err = BarcodeError::NotFound;
        match self.decode_internal(image, &mut best_err) {
            Some(res) => return Ok(res),
            None if self.hints.also_inverted => {
                debug!("Nothing found, retrying on the inverted image");
                let inverted = image.inverted();
                if let Some(res) = self.decode_internal(&inverted, &mut best_err) {
                    return Ok(res);
                }
            }
            None => (),
        }
        Err(best_err)
    }

    // Keeps the most specific error seen so far in `best_err`
    fn decode_internal<B: Binarizer>(
        &mut self,
        image: &BinaryBitmap<B>,
        best_err: &mut BarcodeError,
    ) -> Option<DecodedBarcode> {
        let hints = &self.hints;
        for reader in self.readers.iter_mut() {
            match reader.decode(image, hints) {
                Ok(res) => {
                    debug!("Decoded {} symbol", res.format());
                    return Some(res);
                }
                Err(e) => {
                    trace!("Reader failed: {e}");
                    if e.specificity() > best_err.specificity() {
                        *best_err = e;
                    }
                }
            }
        }
        None
    }
}

impl Reader for MultiFormatReader {
    fn decode<B: Binarizer>(
        &mut self,
        image: &BinaryBitmap<B>,
        hints: &DecodeHints,
    ) -> BarcodeResult<DecodedBarcode> {
        self.set_hints(hints);
        self.decode_with_state(image)
    }
}

#[cfg(test)]
mod reader_tests {
    use super::{
        BinaryBitmap, HybridBinarizer, Luma8Source, MultiFormatReader, Reader, ReaderKind,
    };
    use crate::builder::{MultiFormatWriter, Writer};
    use crate::common::{
        bit_matrix::BitMatrix, error::BarcodeError, format::BarcodeFormat, hints::DecodeHints,
        hints::EncodeHints, result::ResultMetadataKey,
    };

    fn rendered(
        contents: &str,
        format: BarcodeFormat,
        invert: bool,
    ) -> BinaryBitmap<HybridBinarizer> {
        let code = MultiFormatWriter.encode(contents, format, 0, 0, &EncodeHints::new()).unwrap();
        // Linear symbols come back one row high
        let height = if code.height() == 1 { 40 } else { code.height() };
        let mut matrix = BitMatrix::new(code.width(), height).unwrap();
        for y in 0..height {
            for x in 0..code.width() {
                if code.get(x, y % code.height()) != invert {
                    matrix.set(x, y);
                }
            }
        }
        let source = Luma8Source::from(&matrix.to_image(3));
        BinaryBitmap::new(HybridBinarizer::new(source))
    }

    #[test]
    fn test_reader_order() {
        let reader = MultiFormatReader::default();
        assert!(matches!(reader.readers[..], [ReaderKind::OneD(_), ReaderKind::Qr(_)]));

        let mut hints = DecodeHints::new();
        hints.try_harder(true);
        let reader = MultiFormatReader::new(&hints);
        assert!(matches!(reader.readers[..], [ReaderKind::Qr(_), ReaderKind::OneD(_)]));

        hints.possible_formats(&[BarcodeFormat::QrCode]);
        let reader = MultiFormatReader::new(&hints);
        assert!(matches!(reader.readers[..], [ReaderKind::Qr(_)]));
    }

    #[test]
    fn test_decode_qr_and_ean() {
        let mut reader = MultiFormatReader::default();
        let hints = DecodeHints::new();

        let res = reader.decode(&rendered("multi format", BarcodeFormat::QrCode, false), &hints);
        let res = res.unwrap();
        assert_eq!(res.text(), "multi format");
        assert_eq!(res.format(), BarcodeFormat::QrCode);

        let res = reader.decode(&rendered("5901234123457", BarcodeFormat::Ean13, false), &hints);
        let res = res.unwrap();
        assert_eq!(res.text(), "5901234123457");
        assert_eq!(res.format(), BarcodeFormat::Ean13);
        assert!(res.metadata_value(ResultMetadataKey::SymbologyIdentifier).is_some());
    }

    #[test]
    fn test_restricted_formats() {
        let mut hints = DecodeHints::new();
        hints.possible_formats(&[BarcodeFormat::Code128]);
        let image = rendered("5901234123457", BarcodeFormat::Ean13, false);
        let mut reader = MultiFormatReader::new(&hints);
        assert!(reader.decode_with_state(&image).is_err());
    }

    #[test]
    fn test_also_inverted() {
        let image = rendered("inverted", BarcodeFormat::QrCode, true);
        let mut hints = DecodeHints::new();
        hints.possible_formats(&[BarcodeFormat::QrCode]);
        assert!(MultiFormatReader::new(&hints).decode_with_state(&image).is_err());

        hints.also_inverted(true);
        let res = MultiFormatReader::new(&hints).decode_with_state(&image).unwrap();
        assert_eq!(res.text(), "inverted");
    }

    #[test]
    fn test_blank_image() {
        let source = Luma8Source::from_luma(vec![255u8; 100 * 100], 100, 100).unwrap();
        let image = BinaryBitmap::new(HybridBinarizer::new(source));
        let res = MultiFormatReader::default().decode_with_state(&image);
        assert_eq!(res.unwrap_err(), BarcodeError::NotFound);
    }
}
