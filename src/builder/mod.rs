mod ec;
mod oned;
mod qr;

pub use ec::{blockify, build_codewords, error_correction_capacity, interleave};
pub use oned::OneDWriter;
pub use qr::{Color, Module, QR};

use log::debug;

use crate::common::{
    bit_matrix::BitMatrix,
    charset::CharacterSetEci,
    codec::encode,
    error::{BarcodeError, BarcodeResult},
    format::BarcodeFormat,
    hints::EncodeHints,
    mask::MaskPattern,
    metadata::{ECLevel, Version},
};

pub const QUIET_ZONE_SIZE: usize = 4;

// Writer
//------------------------------------------------------------------------------

/// Renders `contents` as a symbol of `format`, scaled up to at least `width` x `height`
pub trait Writer {
    fn encode(
        &self,
        contents: &str,
        format: BarcodeFormat,
        width: usize,
        height: usize,
        hints: &EncodeHints,
    ) -> BarcodeResult<BitMatrix>;
}

/// Dispatches to the writer of the requested format
pub struct MultiFormatWriter;

impl Writer for MultiFormatWriter {
    fn encode(
        &self,
        contents: &str,
        format: BarcodeFormat,
        width: usize,
        height: usize,
        hints: &EncodeHints,
    ) -> BarcodeResult<BitMatrix> {
        match format {
            BarcodeFormat::QrCode => QrCodeWriter.encode(contents, format, width, height, hints),
            _ => OneDWriter.encode(contents, format, width, height, hints),
        }
    }
}

pub struct QrCodeWriter;

impl Writer for QrCodeWriter {
    fn encode(
        &self,
        contents: &str,
        format: BarcodeFormat,
        width: usize,
        height: usize,
        hints: &EncodeHints,
    ) -> BarcodeResult<BitMatrix> {
        if contents.is_empty() {
            return Err(BarcodeError::illegal("Found empty contents"));
        }
        if format != BarcodeFormat::QrCode {
            return Err(BarcodeError::illegal(format!("Can only encode QR_CODE, but got {format}")));
        }

        let mut builder = QRBuilder::new(contents);
        builder.ec_level(hints.ec_level.unwrap_or(ECLevel::L)).gs1(hints.gs1_format);
        if let Some(v) = hints.qr_version {
            builder.version(v);
        }
        if let Some(m) = hints.qr_mask_pattern {
            builder.mask(m);
        }
        if let Some(cs) = hints.character_set {
            builder.charset(cs);
        }

        let qr = builder.build()?;
        qr.render(width, height, hints.margin.unwrap_or(QUIET_ZONE_SIZE))
    }
}

// QR builder
//------------------------------------------------------------------------------

pub struct QRBuilder<'a> {
    data: &'a str,
    version: Option<Version>,
    ec_level: ECLevel,
    mask: Option<MaskPattern>,
    charset: Option<CharacterSetEci>,
    gs1: bool,
}

impl<'a> QRBuilder<'a> {
    pub fn new(data: &'a str) -> Self {
        Self { data, version: None, ec_level: ECLevel::L, mask: None, charset: None, gs1: false }
    }

    pub fn data(&mut self, data: &'a str) -> &mut Self {
        self.data = data;
        self
    }

    pub fn version(&mut self, version: Version) -> &mut Self {
        self.version = Some(version);
        self
    }

    pub fn unset_version(&mut self) -> &mut Self {
        self.version = None;
        self
    }

    pub fn ec_level(&mut self, ec_level: ECLevel) -> &mut Self {
        self.ec_level = ec_level;
        self
    }

    pub fn mask(&mut self, mask: MaskPattern) -> &mut Self {
        self.mask = Some(mask);
        self
    }

    /// Character set for byte mode. Without one, ISO-8859-1 is used when it can hold the
    /// content and UTF-8 otherwise.
    pub fn charset(&mut self, charset: CharacterSetEci) -> &mut Self {
        self.charset = Some(charset);
        self
    }

    /// Marks the content as GS1 data with a leading FNC1
    pub fn gs1(&mut self, gs1: bool) -> &mut Self {
        self.gs1 = gs1;
        self
    }

    pub fn metadata(&self) -> String {
        match self.version {
            Some(v) => format!("{{ Version: {}, Ec level: {} }}", *v, self.ec_level),
            None => format!("{{ Version: None, Ec level: {} }}", self.ec_level),
        }
    }
}

impl QRBuilder<'_> {
    pub fn build(&self) -> BarcodeResult<QR> {
        debug!("Generating QR {}", self.metadata());
        if self.data.is_empty() {
            return Err(BarcodeError::illegal("Found empty contents"));
        }

        let encoded = encode(self.data, self.ec_level, self.charset, self.gs1, self.version)?;
        let version = encoded.version;

        debug!("Constructing payload with ecc & interleaving");
        let codewords = build_codewords(encoded.bits.data(), version, self.ec_level)?;

        let mut qr = QR::new(version, self.ec_level);
        qr.draw_all_function_patterns();
        qr.draw_encoding_region(&codewords);

        let mask = match self.mask {
            Some(m) => {
                qr.apply_mask(m);
                m
            }
            None => qr.apply_best_mask()?,
        };

        debug!(
            "QR generated: version {}, mask {}, {} data codewords, error capacity {}",
            *version,
            *mask,
            version.data_codewords(self.ec_level),
            error_correction_capacity(version, self.ec_level)
        );
        Ok(qr)
    }
}

#[cfg(test)]
mod qrbuilder_util_tests {
    use super::QRBuilder;
    use crate::common::metadata::{ECLevel, Version};

    #[test]
    fn test_metadata() {
        let mut qr_builder = QRBuilder::new("Hello, world!");
        qr_builder.version(Version::new(1).unwrap()).ec_level(ECLevel::Q);
        assert_eq!(qr_builder.metadata(), "{ Version: 1, Ec level: Q }");
        qr_builder.unset_version();
        assert_eq!(qr_builder.metadata(), "{ Version: None, Ec level: Q }");
    }
}
