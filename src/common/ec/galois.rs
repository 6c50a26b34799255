use std::sync::LazyLock;

use super::poly::GFPoly;
use crate::common::error::{BarcodeError, BarcodeResult};

// Galois field GF(256)
//------------------------------------------------------------------------------

/// Arithmetic in GF(2^8) for a given primitive polynomial, using exponent and logarithm
/// tables. `generator_base` is the power of alpha at which the code generator's roots start.
#[derive(Debug)]
pub struct GenericGF {
    exp_table: [u8; 256],
    log_table: [u8; 256],
    primitive: u32,
    generator_base: usize,
}

/// x^8 + x^4 + x^3 + x^2 + 1, used by QR codes
pub static QR_CODE_FIELD_256: LazyLock<GenericGF> = LazyLock::new(|| GenericGF::new(0x011d, 0));

/// x^8 + x^5 + x^3 + x^2 + 1, used by Data Matrix
pub static DATA_MATRIX_FIELD_256: LazyLock<GenericGF> =
    LazyLock::new(|| GenericGF::new(0x012d, 1));

impl GenericGF {
    pub const SIZE: usize = 256;

    pub fn new(primitive: u32, generator_base: usize) -> Self {
        let mut exp_table = [0u8; 256];
        let mut log_table = [0u8; 256];
        let mut x = 1u32;
        for e in exp_table.iter_mut() {
            *e = x as u8;
            x <<= 1;
            if x >= Self::SIZE as u32 {
                x ^= primitive;
                x &= Self::SIZE as u32 - 1;
            }
        }
        for i in 0..Self::SIZE - 1 {
            log_table[exp_table[i] as usize] = i as u8;
        }
        // log_table[0] stays 0 but is never read
        Self { exp_table, log_table, primitive, generator_base }
    }

    pub fn primitive(&self) -> u32 {
        self.primitive
    }

    pub fn generator_base(&self) -> usize {
        self.generator_base
    }

    pub fn zero(&'static self) -> GFPoly {
        GFPoly::zero(self)
    }

    pub fn one(&'static self) -> GFPoly {
        GFPoly::one(self)
    }

    /// Polynomial of the form coefficient * x^degree
    pub fn build_monomial(&'static self, degree: usize, coefficient: u8) -> GFPoly {
        if coefficient == 0 {
            return self.zero();
        }
        let mut coefficients = vec![0u8; degree + 1];
        coefficients[0] = coefficient;
        GFPoly::normalized(self, coefficients)
    }

    /// Addition and subtraction are the same in GF(2^n)
    #[inline]
    pub fn add_or_subtract(a: u8, b: u8) -> u8 {
        a ^ b
    }

    /// 2 to the power of `a`
    #[inline]
    pub fn exp(&self, a: usize) -> u8 {
        self.exp_table[a % (Self::SIZE - 1)]
    }

    /// Base 2 logarithm of `a`
    pub fn log(&self, a: u8) -> BarcodeResult<usize> {
        if a == 0 {
            return Err(BarcodeError::Arithmetic("Log of zero"));
        }
        Ok(self.log_table[a as usize] as usize)
    }

    /// Multiplicative inverse of `a`
    pub fn inverse(&self, a: u8) -> BarcodeResult<u8> {
        if a == 0 {
            return Err(BarcodeError::Arithmetic("Inverse of zero"));
        }
        Ok(self.exp_table[Self::SIZE - 1 - self.log_table[a as usize] as usize])
    }

    #[inline]
    pub fn multiply(&self, a: u8, b: u8) -> u8 {
        if a == 0 || b == 0 {
            return 0;
        }
        let sum = self.log_table[a as usize] as usize + self.log_table[b as usize] as usize;
        self.exp_table[sum % (Self::SIZE - 1)]
    }
}

#[cfg(test)]
mod galois_tests {
    use super::{GenericGF, DATA_MATRIX_FIELD_256, QR_CODE_FIELD_256};
    use test_case::test_case;

    #[test]
    fn test_exp_log_identity() {
        for field in [&*QR_CODE_FIELD_256, &*DATA_MATRIX_FIELD_256] {
            for a in 1..=255u8 {
                assert_eq!(field.exp(field.log(a).unwrap()), a);
            }
            for i in 0..255 {
                assert_eq!(field.log(field.exp(i)).unwrap(), i);
            }
        }
    }

    #[test]
    fn test_inverse() {
        for a in 1..=255u8 {
            let inv = QR_CODE_FIELD_256.inverse(a).unwrap();
            assert_eq!(QR_CODE_FIELD_256.multiply(a, inv), 1);
        }
    }

    #[test]
    fn test_zero_is_rejected() {
        assert!(QR_CODE_FIELD_256.log(0).is_err());
        assert!(QR_CODE_FIELD_256.inverse(0).is_err());
    }

    #[test_case(0, 7, 0)]
    #[test_case(1, 7, 7)]
    #[test_case(2, 0x80, 0x1d)]
    #[test_case(3, 3, 5)]
    fn test_multiply(a: u8, b: u8, exp: u8) {
        assert_eq!(QR_CODE_FIELD_256.multiply(a, b), exp);
        assert_eq!(QR_CODE_FIELD_256.multiply(b, a), exp);
    }

    #[test]
    fn test_add_or_subtract() {
        assert_eq!(GenericGF::add_or_subtract(0b1010, 0b0110), 0b1100);
    }

    #[test]
    fn test_build_monomial() {
        let m = QR_CODE_FIELD_256.build_monomial(3, 5);
        assert_eq!(m.degree(), 3);
        assert_eq!(m.coefficient(3), 5);
        assert!(QR_CODE_FIELD_256.build_monomial(3, 0).is_zero());
    }
}
