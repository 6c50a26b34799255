use super::galois::GenericGF;
use super::poly::GFPoly;
use crate::common::error::{BarcodeError, BarcodeResult};

// Reed-Solomon encoder
//------------------------------------------------------------------------------

/// Computes error correction codewords. Generator polynomials are cached so encoding many
/// blocks with the same ec length only builds the generator once.
#[derive(Debug, Clone)]
pub struct ReedSolomonEncoder {
    field: &'static GenericGF,
    cached_generators: Vec<GFPoly>,
}

impl ReedSolomonEncoder {
    pub fn new(field: &'static GenericGF) -> Self {
        Self { field, cached_generators: vec![field.one()] }
    }

    fn build_generator(&mut self, degree: usize) -> BarcodeResult<&GFPoly> {
        let base = self.field.generator_base();
        while self.cached_generators.len() <= degree {
            let d = self.cached_generators.len();
            let last = &self.cached_generators[d - 1];
            let factor = GFPoly::new(self.field, &[1, self.field.exp(d - 1 + base)])?;
            let next = last.multiply(&factor)?;
            self.cached_generators.push(next);
        }
        Ok(&self.cached_generators[degree])
    }

    /// Overwrites the trailing `ec_len` bytes of `to_encode` with the error correction
    /// codewords for the data bytes in front of them.
    pub fn encode(&mut self, to_encode: &mut [u8], ec_len: usize) -> BarcodeResult<()> {
        if ec_len == 0 {
            return Err(BarcodeError::illegal("No error correction bytes"));
        }
        if to_encode.len() <= ec_len {
            return Err(BarcodeError::illegal("No data bytes provided"));
        }
        let data_len = to_encode.len() - ec_len;
        let field = self.field;
        let generator = self.build_generator(ec_len)?.clone();

        let info = GFPoly::new(field, &to_encode[..data_len])?.multiply_by_monomial(ec_len, 1);
        let (_, remainder) = info.divide(&generator)?;
        let coefficients = remainder.coefficients();

        let zeros = ec_len - coefficients.len();
        to_encode[data_len..data_len + zeros].fill(0);
        to_encode[data_len + zeros..].copy_from_slice(coefficients);
        Ok(())
    }
}

#[cfg(test)]
mod encoder_tests {
    use super::ReedSolomonEncoder;
    use crate::common::ec::galois::QR_CODE_FIELD_256;

    #[test]
    fn test_qr_reference_block() {
        // Version 1-M "01234567" from ISO 18004 annex I
        let data = [
            0x10, 0x20, 0x0c, 0x56, 0x61, 0x80, 0xec, 0x11, 0xec, 0x11, 0xec, 0x11, 0xec, 0x11,
            0xec, 0x11,
        ];
        let ecc = [0xa5, 0x24, 0xd4, 0xc1, 0xed, 0x36, 0xc7, 0x87, 0x2c, 0x55];
        let mut block = data.to_vec();
        block.extend([0u8; 10]);
        let mut encoder = ReedSolomonEncoder::new(&QR_CODE_FIELD_256);
        encoder.encode(&mut block, 10).unwrap();
        assert_eq!(&block[..16], &data);
        assert_eq!(&block[16..], &ecc);
    }

    #[test]
    fn test_invalid_lengths() {
        let mut encoder = ReedSolomonEncoder::new(&QR_CODE_FIELD_256);
        assert!(encoder.encode(&mut [1, 2, 3], 0).is_err());
        assert!(encoder.encode(&mut [1, 2, 3], 3).is_err());
    }

    #[test]
    fn test_generator_cache_grows() {
        let mut encoder = ReedSolomonEncoder::new(&QR_CODE_FIELD_256);
        encoder.encode(&mut [7; 20], 7).unwrap();
        assert_eq!(encoder.cached_generators.len(), 8);
        encoder.encode(&mut [7; 20], 3).unwrap();
        assert_eq!(encoder.cached_generators.len(), 8);
        assert_eq!(encoder.cached_generators[7].degree(), 7);
    }
}
