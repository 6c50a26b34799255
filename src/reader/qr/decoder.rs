use log::{debug, trace};

use super::deqr::{data_blocks, DeQR};
use super::detector::{extract_pure_bits, Detector};
use crate::common::{
    bit_matrix::BitMatrix,
    codec::decode,
    ec::{ReedSolomonDecoder, QR_CODE_FIELD_256},
    error::{BarcodeError, BarcodeResult},
    format::BarcodeFormat,
    hints::DecodeHints,
    result::{DecodedBarcode, DecoderResult, MetadataValue, ResultMetadataKey},
};
use crate::reader::{binarize::Binarizer, BinaryBitmap, Reader};

// QR decoder
//------------------------------------------------------------------------------

/// Error corrects and parses a sampled symbol
#[derive(Debug, Clone, Copy)]
pub struct QrDecoder {
    rs_decoder: ReedSolomonDecoder,
}

impl Default for QrDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl QrDecoder {
    pub fn new() -> Self {
        Self { rs_decoder: ReedSolomonDecoder::new(&QR_CODE_FIELD_256) }
    }

    /// Decodes `bits`, retrying with rows and columns swapped when the normal read fails.
    /// The error of the normal read is reported if both fail.
    pub fn decode(&self, bits: BitMatrix, hints: &DecodeHints) -> BarcodeResult<DecoderResult> {
        let mut parser = DeQR::new(bits)?;
        let err = match self.decode_parsed(&mut parser, hints) {
            Ok(res) => return Ok(res),
            Err(e @ (BarcodeError::Format | BarcodeError::Checksum)) => e,
            Err(e) => return Err(e),
        };
        debug!("Normal read failed with {err}, trying mirrored");

        match self.decode_mirrored(&mut parser, hints) {
            Ok(mut res) => {
                res.mirrored = true;
                Ok(res)
            }
            Err(e) => {
                trace!("Mirrored read failed with {e}");
                Err(err)
            }
        }
    }

    fn decode_mirrored(
        &self,
        parser: &mut DeQR,
        hints: &DecodeHints,
    ) -> BarcodeResult<DecoderResult> {
        parser.remask();
        parser.set_mirror(true);
        parser.read_version()?;
        parser.read_format_info()?;
        // Format and version make sense mirrored, so read the content that way too
        parser.mirror();
        self.decode_parsed(parser, hints)
    }

    fn decode_parsed(
        &self,
        parser: &mut DeQR,
        hints: &DecodeHints,
    ) -> BarcodeResult<DecoderResult> {
        let version = parser.read_version()?;
        let ec_level = parser.read_format_info()?.ec_level;
        let codewords = parser.read_codewords()?;
        let blocks = data_blocks(&codewords, version, ec_level)?;

        let total_bytes = blocks.iter().map(|b| b.num_data_codewords).sum();
        let mut result_bytes = Vec::with_capacity(total_bytes);
        let mut errors_corrected = 0;
        for mut block in blocks {
            let ec_len = block.codewords.len() - block.num_data_codewords;
            errors_corrected += self.rs_decoder.decode(&mut block.codewords, ec_len)?;
            result_bytes.extend_from_slice(&block.codewords[..block.num_data_codewords]);
        }
        debug!("Version {version} {ec_level} symbol, {errors_corrected} error(s) corrected");

        let mut res = decode(&result_bytes, version, ec_level, hints.character_set)?;
        res.errors_corrected = errors_corrected;
        Ok(res)
    }
}

// QR reader
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct QrCodeReader {
    decoder: QrDecoder,
}

impl QrCodeReader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reader for QrCodeReader {
    fn decode<B: Binarizer>(
        &mut self,
        image: &BinaryBitmap<B>,
        hints: &DecodeHints,
    ) -> BarcodeResult<DecodedBarcode> {
        let matrix = image.black_matrix()?;
        let (res, mut points) = if hints.pure_barcode {
            debug!("Extracting pure symbol");
            (self.decoder.decode(extract_pure_bits(matrix)?, hints)?, Vec::new())
        } else {
            let detected = Detector::new(matrix).detect(hints)?;
            (self.decoder.decode(detected.bits, hints)?, detected.points)
        };

        // A mirrored symbol has bottom left and top right swapped
        if res.mirrored && points.len() >= 3 {
            points.swap(0, 2);
        }

        let mut result = DecodedBarcode::with_num_bits(
            res.text,
            Some(res.raw_bytes),
            res.num_bits,
            points,
            BarcodeFormat::QrCode,
        );
        if !res.byte_segments.is_empty() {
            result.put_metadata(
                ResultMetadataKey::ByteSegments,
                MetadataValue::ByteSegments(res.byte_segments),
            );
        }
        if let Some(ecl) = res.ec_level {
            result.put_metadata(ResultMetadataKey::ErrorCorrectionLevel, MetadataValue::Text(ecl));
        }
        if let (Some(seq), Some(parity)) =
            (res.structured_append_sequence, res.structured_append_parity)
        {
            result.put_metadata(
                ResultMetadataKey::StructuredAppendSequence,
                MetadataValue::Int(seq.into()),
            );
            result.put_metadata(
                ResultMetadataKey::StructuredAppendParity,
                MetadataValue::Int(parity.into()),
            );
        }
        result.put_metadata(
            ResultMetadataKey::ErrorsCorrected,
            MetadataValue::Int(res.errors_corrected as i32),
        );
        result.put_metadata(
            ResultMetadataKey::SymbologyIdentifier,
            MetadataValue::Text(format!("]Q{}", res.symbology_modifier)),
        );
        Ok(result)
    }
}
