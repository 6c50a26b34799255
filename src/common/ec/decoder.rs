use log::trace;

use super::galois::GenericGF;
use super::poly::GFPoly;
use crate::common::error::{BarcodeError, BarcodeResult};

// Reed-Solomon decoder
//------------------------------------------------------------------------------

/// Corrects errors in a received codeword in place. Syndromes are computed first and a
/// clean codeword returns early. Otherwise the Euclidean algorithm yields the error locator
/// and evaluator, Chien search finds the error positions and Forney's formula the
/// magnitudes.
#[derive(Debug, Clone, Copy)]
pub struct ReedSolomonDecoder {
    field: &'static GenericGF,
}

impl ReedSolomonDecoder {
    pub fn new(field: &'static GenericGF) -> Self {
        Self { field }
    }

    /// Corrects `received` in place, whose last `ec_len` bytes are error correction
    /// codewords, and returns the number of errors corrected. Every failure of the algebra
    /// is reported as a checksum error.
    pub fn decode(&self, received: &mut [u8], ec_len: usize) -> BarcodeResult<usize> {
        self.try_decode(received, ec_len).map_err(|e| match e {
            BarcodeError::IllegalArgument(_) => e,
            _ => BarcodeError::Checksum,
        })
    }

    fn try_decode(&self, received: &mut [u8], ec_len: usize) -> BarcodeResult<usize> {
        let field = self.field;
        let poly = GFPoly::new(field, received)?;

        let mut syndrome_coefficients = vec![0u8; ec_len];
        let mut no_error = true;
        for i in 0..ec_len {
            let eval = poly.evaluate_at(field.exp(i + field.generator_base()));
            syndrome_coefficients[ec_len - 1 - i] = eval;
            no_error &= eval == 0;
        }
        if no_error {
            return Ok(0);
        }

        let syndrome = GFPoly::new(field, &syndrome_coefficients)?;
        let (sigma, omega) =
            self.run_euclidean_algorithm(field.build_monomial(ec_len, 1), syndrome, ec_len)?;
        let error_locations = self.find_error_locations(&sigma)?;
        let error_magnitudes = self.find_error_magnitudes(&omega, &error_locations)?;

        let positions = error_locations
            .iter()
            .map(|&location| match field.log(location)? {
                log if log < received.len() => Ok(received.len() - 1 - log),
                _ => Err(BarcodeError::Checksum),
            })
            .collect::<BarcodeResult<Vec<_>>>()?;
        for (position, magnitude) in positions.into_iter().zip(error_magnitudes) {
            received[position] = GenericGF::add_or_subtract(received[position], magnitude);
        }

        trace!("Corrected {} errors", error_locations.len());
        Ok(error_locations.len())
    }

    fn run_euclidean_algorithm(
        &self,
        a: GFPoly,
        b: GFPoly,
        r_degree: usize,
    ) -> BarcodeResult<(GFPoly, GFPoly)> {
        let field = self.field;
        let (a, b) = if a.degree() < b.degree() { (b, a) } else { (a, b) };

        let mut r_last = a;
        let mut r = b;
        let mut t_last = field.zero();
        let mut t = field.one();

        // Run until r's degree drops below half the ec codeword count, rounded down
        while r.degree() >= r_degree / 2 {
            let r_last_last = r_last;
            let t_last_last = t_last;
            r_last = r;
            t_last = t;

            if r_last.is_zero() {
                return Err(BarcodeError::Checksum);
            }
            r = r_last_last;
            let mut q = field.zero();
            let denominator_leading_term = r_last.coefficient(r_last.degree());
            let dlt_inverse = field.inverse(denominator_leading_term)?;
            while r.degree() >= r_last.degree() && !r.is_zero() {
                let degree_diff = r.degree() - r_last.degree();
                let scale = field.multiply(r.coefficient(r.degree()), dlt_inverse);
                q = q.add_or_subtract(&field.build_monomial(degree_diff, scale))?;
                r = r.add_or_subtract(&r_last.multiply_by_monomial(degree_diff, scale))?;
            }

            t = q.multiply(&t_last)?.add_or_subtract(&t_last_last)?;

            if r.degree() >= r_last.degree() {
                return Err(BarcodeError::Checksum);
            }
        }

        let sigma_tilde_at_zero = t.coefficient(0);
        if sigma_tilde_at_zero == 0 {
            return Err(BarcodeError::Checksum);
        }

        let inverse = field.inverse(sigma_tilde_at_zero)?;
        Ok((t.multiply_scalar(inverse), r.multiply_scalar(inverse)))
    }

    // Chien search
    fn find_error_locations(&self, error_locator: &GFPoly) -> BarcodeResult<Vec<u8>> {
        let num_errors = error_locator.degree();
        if num_errors == 1 {
            return Ok(vec![error_locator.coefficient(1)]);
        }
        let mut res = Vec::with_capacity(num_errors);
        for i in 1..=255u8 {
            if res.len() >= num_errors {
                break;
            }
            if error_locator.evaluate_at(i) == 0 {
                res.push(self.field.inverse(i)?);
            }
        }
        if res.len() != num_errors {
            return Err(BarcodeError::Checksum);
        }
        Ok(res)
    }

    // Forney's formula
    fn find_error_magnitudes(
        &self,
        error_evaluator: &GFPoly,
        error_locations: &[u8],
    ) -> BarcodeResult<Vec<u8>> {
        let field = self.field;
        let mut res = Vec::with_capacity(error_locations.len());
        for (i, &location) in error_locations.iter().enumerate() {
            let xi_inverse = field.inverse(location)?;
            let mut denominator = 1u8;
            for (j, &other) in error_locations.iter().enumerate() {
                if i == j {
                    continue;
                }
                let term = field.multiply(other, xi_inverse);
                let term_plus_one = if term & 1 == 0 { term | 1 } else { term & !1 };
                denominator = field.multiply(denominator, term_plus_one);
            }
            let mut magnitude = field
                .multiply(error_evaluator.evaluate_at(xi_inverse), field.inverse(denominator)?);
            if field.generator_base() != 0 {
                magnitude = field.multiply(magnitude, xi_inverse);
            }
            res.push(magnitude);
        }
        Ok(res)
    }
}
