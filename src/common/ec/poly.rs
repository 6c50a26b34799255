use std::fmt::{Display, Formatter, Result as FmtResult};
use std::ptr;

use super::galois::GenericGF;
use crate::common::error::{BarcodeError, BarcodeResult};

// Polynomial over GF(256)
//------------------------------------------------------------------------------

/// Polynomial with coefficients in a [`GenericGF`], highest degree first. There are no
/// leading zero coefficients except for the zero polynomial, which is `[0]`.
#[derive(Debug, Clone)]
pub struct GFPoly {
    field: &'static GenericGF,
    coefficients: Vec<u8>,
}

impl PartialEq for GFPoly {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.field, other.field) && self.coefficients == other.coefficients
    }
}

impl Eq for GFPoly {}

impl GFPoly {
    pub fn new(field: &'static GenericGF, coefficients: &[u8]) -> BarcodeResult<Self> {
        if coefficients.is_empty() {
            return Err(BarcodeError::illegal("Polynomial needs at least one coefficient"));
        }
        Ok(Self::normalized(field, coefficients.to_vec()))
    }

    // Strips leading zeros, collapsing an all zero vector into the zero polynomial
    pub(crate) fn normalized(field: &'static GenericGF, mut coefficients: Vec<u8>) -> Self {
        match coefficients.iter().position(|&c| c != 0) {
            Some(0) => {}
            Some(i) => {
                coefficients.drain(..i);
            }
            None => coefficients = vec![0],
        }
        Self { field, coefficients }
    }

    pub fn zero(field: &'static GenericGF) -> Self {
        Self { field, coefficients: vec![0] }
    }

    pub fn one(field: &'static GenericGF) -> Self {
        Self { field, coefficients: vec![1] }
    }

    pub fn coefficients(&self) -> &[u8] {
        &self.coefficients
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    pub fn is_zero(&self) -> bool {
        self.coefficients[0] == 0
    }

    /// Coefficient of the x^degree term
    pub fn coefficient(&self, degree: usize) -> u8 {
        let len = self.coefficients.len();
        if degree >= len {
            return 0;
        }
        self.coefficients[len - 1 - degree]
    }

    pub fn evaluate_at(&self, a: u8) -> u8 {
        if a == 0 {
            return self.coefficient(0);
        }
        if a == 1 {
            return self.coefficients.iter().fold(0, |acc, &c| acc ^ c);
        }
        self.coefficients[1..]
            .iter()
            .fold(self.coefficients[0], |acc, &c| self.field.multiply(a, acc) ^ c)
    }

    fn check_field(&self, other: &GFPoly) -> BarcodeResult<()> {
        if !ptr::eq(self.field, other.field) {
            return Err(BarcodeError::illegal("GF polynomials do not have same field"));
        }
        Ok(())
    }

    pub fn add_or_subtract(&self, other: &GFPoly) -> BarcodeResult<GFPoly> {
        self.check_field(other)?;
        if self.is_zero() {
            return Ok(other.clone());
        }
        if other.is_zero() {
            return Ok(self.clone());
        }

        let (smaller, larger) = if self.coefficients.len() > other.coefficients.len() {
            (&other.coefficients, &self.coefficients)
        } else {
            (&self.coefficients, &other.coefficients)
        };
        let len_diff = larger.len() - smaller.len();
        let mut sum_diff = larger.clone();
        sum_diff[len_diff..].iter_mut().zip(smaller.iter()).for_each(|(l, s)| *l ^= s);
        Ok(Self::normalized(self.field, sum_diff))
    }

    pub fn multiply(&self, other: &GFPoly) -> BarcodeResult<GFPoly> {
        self.check_field(other)?;
        if self.is_zero() || other.is_zero() {
            return Ok(Self::zero(self.field));
        }
        let (a, b) = (&self.coefficients, &other.coefficients);
        let mut product = vec![0u8; a.len() + b.len() - 1];
        for (i, &ac) in a.iter().enumerate() {
            for (j, &bc) in b.iter().enumerate() {
                product[i + j] ^= self.field.multiply(ac, bc);
            }
        }
        Ok(Self::normalized(self.field, product))
    }

    pub fn multiply_scalar(&self, scalar: u8) -> GFPoly {
        match scalar {
            0 => Self::zero(self.field),
            1 => self.clone(),
            _ => {
                let product =
                    self.coefficients.iter().map(|&c| self.field.multiply(c, scalar)).collect();
                Self::normalized(self.field, product)
            }
        }
    }

    pub fn multiply_by_monomial(&self, degree: usize, coefficient: u8) -> GFPoly {
        if coefficient == 0 {
            return Self::zero(self.field);
        }
        let mut product = vec![0u8; self.coefficients.len() + degree];
        product
            .iter_mut()
            .zip(self.coefficients.iter())
            .for_each(|(p, &c)| *p = self.field.multiply(c, coefficient));
        Self::normalized(self.field, product)
    }

    /// Returns (quotient, remainder)
    pub fn divide(&self, other: &GFPoly) -> BarcodeResult<(GFPoly, GFPoly)> {
        self.check_field(other)?;
        if other.is_zero() {
            return Err(BarcodeError::Arithmetic("Divide by 0"));
        }

        let mut quotient = Self::zero(self.field);
        let mut remainder = self.clone();

        let denominator_leading_term = other.coefficient(other.degree());
        let inverse_denominator_leading_term = self.field.inverse(denominator_leading_term)?;

        while remainder.degree() >= other.degree() && !remainder.is_zero() {
            let degree_diff = remainder.degree() - other.degree();
            let leading = remainder.coefficient(remainder.degree());
            let scale = self.field.multiply(leading, inverse_denominator_leading_term);
            let term = other.multiply_by_monomial(degree_diff, scale);
            let iteration_quotient = self.field.build_monomial(degree_diff, scale);
            quotient = quotient.add_or_subtract(&iteration_quotient)?;
            remainder = remainder.add_or_subtract(&term)?;
        }

        Ok((quotient, remainder))
    }
}

impl Display for GFPoly {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if self.is_zero() {
            return f.write_str("0");
        }
        let mut first = true;
        for degree in (0..=self.degree()).rev() {
            let coefficient = self.coefficient(degree);
            if coefficient == 0 {
                continue;
            }
            if !first {
                f.write_str(" + ")?;
            }
            first = false;
            if coefficient != 1 || degree == 0 {
                write!(f, "{coefficient}")?;
            }
            match degree {
                0 => {}
                1 => f.write_str("x")?,
                _ => write!(f, "x^{degree}")?,
            }
        }
        Ok(())
    }
}
