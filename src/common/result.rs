use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::SystemTime;

use super::format::BarcodeFormat;
use super::point::Point;

// Result metadata
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultMetadataKey {
    /// Degrees of rotation the image needed before the symbol was found
    Orientation,
    /// Raw bytes of each byte mode segment
    ByteSegments,
    ErrorCorrectionLevel,
    ErrorsCorrected,
    StructuredAppendSequence,
    StructuredAppendParity,
    /// ISO/IEC 15424 identifier such as "]Q1" or "]E0"
    SymbologyIdentifier,
    UpcEanExtension,
    PossibleCountry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue {
    Int(i32),
    Text(String),
    ByteSegments(Vec<Vec<u8>>),
}

impl MetadataValue {
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl Display for MetadataValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Text(s) => f.write_str(s),
            Self::ByteSegments(segs) => write!(f, "{} segment(s)", segs.len()),
        }
    }
}

pub type ResultMetadata = HashMap<ResultMetadataKey, MetadataValue>;

// Decoded barcode
//------------------------------------------------------------------------------

/// Outcome of a successful decode
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBarcode {
    text: String,
    raw_bytes: Option<Vec<u8>>,
    num_bits: usize,
    points: Vec<Point>,
    format: BarcodeFormat,
    timestamp: SystemTime,
    metadata: ResultMetadata,
}

impl DecodedBarcode {
    pub fn new(
        text: String,
        raw_bytes: Option<Vec<u8>>,
        points: Vec<Point>,
        format: BarcodeFormat,
    ) -> Self {
        let num_bits = raw_bytes.as_ref().map_or(0, |b| b.len() * 8);
        Self::with_num_bits(text, raw_bytes, num_bits, points, format)
    }

    pub fn with_num_bits(
        text: String,
        raw_bytes: Option<Vec<u8>>,
        num_bits: usize,
        points: Vec<Point>,
        format: BarcodeFormat,
    ) -> Self {
        Self {
            text,
            raw_bytes,
            num_bits,
            points,
            format,
            timestamp: SystemTime::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn raw_bytes(&self) -> Option<&[u8]> {
        self.raw_bytes.as_deref()
    }

    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub(crate) fn points_mut(&mut self) -> &mut [Point] {
        &mut self.points
    }

    pub fn format(&self) -> BarcodeFormat {
        self.format
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    pub fn metadata(&self) -> &ResultMetadata {
        &self.metadata
    }

    pub fn metadata_value(&self, key: ResultMetadataKey) -> Option<&MetadataValue> {
        self.metadata.get(&key)
    }

    pub fn put_metadata(&mut self, key: ResultMetadataKey, value: MetadataValue) {
        self.metadata.insert(key, value);
    }

    pub fn put_all_metadata(&mut self, metadata: ResultMetadata) {
        self.metadata.extend(metadata);
    }

    pub fn add_points(&mut self, points: &[Point]) {
        self.points.extend_from_slice(points);
    }

    /// Same symbol reported under a different format, keeping points and metadata
    pub(crate) fn into_format(self, text: String, format: BarcodeFormat) -> Self {
        Self { text, format, ..self }
    }
}

impl Display for DecodedBarcode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.text)
    }
}

// Decoder result
//------------------------------------------------------------------------------

/// Intermediate result of decoding the data region of a 2D symbol, before it is
/// attached to points in the image.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecoderResult {
    pub raw_bytes: Vec<u8>,
    pub num_bits: usize,
    pub text: String,
    pub byte_segments: Vec<Vec<u8>>,
    pub ec_level: Option<String>,
    pub structured_append_sequence: Option<u8>,
    pub structured_append_parity: Option<u8>,
    pub errors_corrected: usize,
    pub erasures: usize,
    pub symbology_modifier: u8,
    pub mirrored: bool,
}

impl DecoderResult {
    pub fn has_structured_append(&self) -> bool {
        self.structured_append_sequence.is_some() && self.structured_append_parity.is_some()
    }
}
