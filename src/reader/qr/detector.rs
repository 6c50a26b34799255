use log::{debug, trace};

use super::alignment::{AlignmentPattern, AlignmentPatternFinder};
use super::finder::{FinderPattern, FinderPatternFinder};
use crate::common::{
    bit_matrix::BitMatrix,
    error::{BarcodeError, BarcodeResult},
    hints::DecodeHints,
    metadata::Version,
    point::{distance, int_distance, Point, ResultPoint},
};
use crate::reader::utils::{homography::PerspectiveTransform, round, sampler::sample_grid};

// Detector result
//------------------------------------------------------------------------------

/// Sampled modules of a symbol together with the image points it was located by:
/// bottom left, top left and top right finder centres, then the alignment pattern if any.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorResult {
    pub bits: BitMatrix,
    pub points: Vec<Point>,
}

// Detector
//------------------------------------------------------------------------------

pub struct Detector<'a> {
    image: &'a BitMatrix,
}

impl<'a> Detector<'a> {
    pub fn new(image: &'a BitMatrix) -> Self {
        Self { image }
    }

    pub fn detect(&self, hints: &DecodeHints) -> BarcodeResult<DetectorResult> {
        let [bottom_left, top_left, top_right] =
            FinderPatternFinder::new(self.image, hints).find()?;
        self.process_finder_patterns(bottom_left, top_left, top_right, hints)
    }

    fn process_finder_patterns(
        &self,
        bottom_left: FinderPattern,
        top_left: FinderPattern,
        top_right: FinderPattern,
        hints: &DecodeHints,
    ) -> BarcodeResult<DetectorResult> {
        let module_size = self.calculate_module_size(&top_left, &top_right, &bottom_left);
        if module_size.is_nan() || module_size < 1.0 {
            return Err(BarcodeError::NotFound);
        }
        let dimension = compute_dimension(&top_left, &top_right, &bottom_left, module_size)?;
        let provisional_version =
            Version::provisional_for_dimension(dimension).map_err(|_| BarcodeError::NotFound)?;
        let modules_between_centers = provisional_version.width() - 7;
        debug!(
            "Module size {module_size:.2}, dimension {dimension}, provisional version \
             {provisional_version}"
        );

        let mut alignment = None;
        if !provisional_version.alignment_pattern().is_empty() {
            // Where a fourth finder pattern would sit, then 3 modules back towards top left
            let bottom_right_x = top_right.x - top_left.x + bottom_left.x;
            let bottom_right_y = top_right.y - top_left.y + bottom_left.y;
            let correction = 1.0 - 3.0 / modules_between_centers as f32;
            let est_x = (top_left.x + correction * (bottom_right_x - top_left.x)) as i32;
            let est_y = (top_left.y + correction * (bottom_right_y - top_left.y)) as i32;

            // Widen the search before giving up
            for allowance in [4.0, 8.0, 16.0] {
                match self.find_alignment_in_region(module_size, est_x, est_y, allowance, hints) {
                    Ok(ap) => {
                        alignment = Some(ap);
                        break;
                    }
                    Err(_) => trace!("No alignment pattern within {allowance} modules"),
                }
            }
        }

        let transform =
            create_transform(&top_left, &top_right, &bottom_left, alignment.as_ref(), dimension);
        let bits = sample_grid(self.image, dimension, dimension, &transform)?;

        let mut points = vec![bottom_left.point(), top_left.point(), top_right.point()];
        if let Some(ap) = alignment {
            points.push(ap.point());
        }
        Ok(DetectorResult { bits, points })
    }

    /// Average module size measured along the top and left edges of the symbol
    fn calculate_module_size(
        &self,
        top_left: &FinderPattern,
        top_right: &FinderPattern,
        bottom_left: &FinderPattern,
    ) -> f32 {
        (self.calculate_module_size_one_way(top_left, top_right)
            + self.calculate_module_size_one_way(top_left, bottom_left))
            / 2.0
    }

    fn calculate_module_size_one_way(&self, pattern: &FinderPattern, other: &FinderPattern) -> f32 {
        let (px, py) = (pattern.x as i32, pattern.y as i32);
        let (ox, oy) = (other.x as i32, other.y as i32);
        let est1 = self.size_of_black_white_black_run_both_ways(px, py, ox, oy);
        let est2 = self.size_of_black_white_black_run_both_ways(ox, oy, px, py);
        match (est1, est2) {
            (None, None) => f32::NAN,
            (Some(e), None) | (None, Some(e)) => e / 7.0,
            // Each run spans the 7 module wide pattern
            (Some(e1), Some(e2)) => (e1 + e2) / 14.0,
        }
    }

    /// Width of the finder pattern through (from_x, from_y), measured towards (to_x, to_y)
    /// and away from it, clipped to the image
    fn size_of_black_white_black_run_both_ways(
        &self,
        from_x: i32,
        from_y: i32,
        to_x: i32,
        to_y: i32,
    ) -> Option<f32> {
        let width = self.image.width() as i32;
        let height = self.image.height() as i32;
        let result = self.size_of_black_white_black_run(from_x, from_y, to_x, to_y);

        let mut scale = 1.0;
        let mut other_to_x = from_x - (to_x - from_x);
        if other_to_x < 0 {
            scale = from_x as f32 / (from_x - other_to_x) as f32;
            other_to_x = 0;
        } else if other_to_x >= width {
            scale = (width - 1 - from_x) as f32 / (other_to_x - from_x) as f32;
            other_to_x = width - 1;
        }
        let mut other_to_y = (from_y as f32 - (to_y - from_y) as f32 * scale) as i32;

        scale = 1.0;
        if other_to_y < 0 {
            scale = from_y as f32 / (from_y - other_to_y) as f32;
            other_to_y = 0;
        } else if other_to_y >= height {
            scale = (height - 1 - from_y) as f32 / (other_to_y - from_y) as f32;
            other_to_y = height - 1;
        }
        other_to_x = (from_x as f32 + (other_to_x - from_x) as f32 * scale) as i32;

        let other = self.size_of_black_white_black_run(from_x, from_y, other_to_x, other_to_y);
        // The centre pixel is counted by both runs
        match (result, other) {
            (Some(a), Some(b)) => Some(a + b - 1.0),
            _ => None,
        }
    }

    /// Bresenham walk from the centre out through black, white and black again, returning
    /// the distance to the start of the white beyond
    fn size_of_black_white_black_run(
        &self,
        from_x: i32,
        from_y: i32,
        to_x: i32,
        to_y: i32,
    ) -> Option<f32> {
        let steep = (to_y - from_y).abs() > (to_x - from_x).abs();
        let (from_x, from_y, to_x, to_y) =
            if steep { (from_y, from_x, to_y, to_x) } else { (from_x, from_y, to_x, to_y) };

        let dx = (to_x - from_x).abs();
        let dy = (to_y - from_y).abs();
        let mut error = -dx / 2;
        let xstep = if from_x < to_x { 1 } else { -1 };
        let ystep = if from_y < to_y { 1 } else { -1 };

        // 0 and 2 scan black, 1 scans white
        let mut state = 0;
        let x_limit = to_x + xstep;
        let mut x = from_x;
        let mut y = from_y;
        while x != x_limit {
            let (real_x, real_y) = if steep { (y, x) } else { (x, y) };
            let black = self.image.try_get(real_x, real_y) == Some(true);
            if (state == 1) == black {
                if state == 2 {
                    return Some(int_distance(x, y, from_x, from_y));
                }
                state += 1;
            }

            error += dy;
            if error > 0 {
                if y == to_y {
                    break;
                }
                y += ystep;
                error -= dx;
            }
            x += xstep;
        }

        // Treat the pixel past the end as white
        (state == 2).then(|| int_distance(to_x + xstep, to_y, from_x, from_y))
    }

    fn find_alignment_in_region(
        &self,
        overall_est_module_size: f32,
        est_alignment_x: i32,
        est_alignment_y: i32,
        allowance_factor: f32,
        hints: &DecodeHints,
    ) -> BarcodeResult<AlignmentPattern> {
        let allowance = (allowance_factor * overall_est_module_size) as i32;
        let left = (est_alignment_x - allowance).max(0);
        let right = (est_alignment_x + allowance).min(self.image.width() as i32 - 1);
        if ((right - left) as f32) < overall_est_module_size * 3.0 {
            return Err(BarcodeError::NotFound);
        }
        let top = (est_alignment_y - allowance).max(0);
        let bottom = (est_alignment_y + allowance).min(self.image.height() as i32 - 1);
        if ((bottom - top) as f32) < overall_est_module_size * 3.0 {
            return Err(BarcodeError::NotFound);
        }

        AlignmentPatternFinder::new(
            self.image,
            (left as usize, top as usize),
            ((right - left) as usize, (bottom - top) as usize),
            overall_est_module_size,
            hints,
        )
        .find()
    }
}

/// Module count along a side, from the finder centre distances, snapped to 1 mod 4
fn compute_dimension(
    top_left: &FinderPattern,
    top_right: &FinderPattern,
    bottom_left: &FinderPattern,
    module_size: f32,
) -> BarcodeResult<usize> {
    let tltr = round(distance(top_left, top_right) / module_size);
    let tlbl = round(distance(top_left, bottom_left) / module_size);
    let dimension = (tltr + tlbl) / 2 + 7;
    match dimension & 0x03 {
        0 => Ok(dimension as usize + 1),
        1 => Ok(dimension as usize),
        2 => Ok(dimension as usize - 1),
        _ => Err(BarcodeError::NotFound),
    }
}

/// Maps module space onto the image through the finder centres and the alignment
/// pattern, or an estimated fourth corner when there is none
fn create_transform(
    top_left: &FinderPattern,
    top_right: &FinderPattern,
    bottom_left: &FinderPattern,
    alignment: Option<&AlignmentPattern>,
    dimension: usize,
) -> PerspectiveTransform {
    let dim_minus_three = dimension as f32 - 3.5;
    let (bottom_right, source_bottom_right) = match alignment {
        Some(ap) => (ap.point(), dim_minus_three - 3.0),
        None => (
            Point::new(
                top_right.x - top_left.x + bottom_left.x,
                top_right.y - top_left.y + bottom_left.y,
            ),
            dim_minus_three,
        ),
    };

    PerspectiveTransform::quadrilateral_to_quadrilateral(
        [
            Point::new(3.5, 3.5),
            Point::new(dim_minus_three, 3.5),
            Point::new(source_bottom_right, source_bottom_right),
            Point::new(3.5, dim_minus_three),
        ],
        [top_left.point(), top_right.point(), bottom_right, bottom_left.point()],
    )
}

// Pure barcode extraction
//------------------------------------------------------------------------------

/// Reads a symbol straight off an image holding nothing but the unrotated symbol and
/// its quiet zone, skipping detection
pub fn extract_pure_bits(image: &BitMatrix) -> BarcodeResult<BitMatrix> {
    let (Some(left_top), Some(right_bottom)) =
        (image.top_left_on_bit(), image.bottom_right_on_bit())
    else {
        return Err(BarcodeError::NotFound);
    };

    let module_size = pure_module_size(left_top, image)?;
    let (mut left, mut top) = left_top;
    let (mut right, bottom) = right_bottom;
    if left >= right || top >= bottom {
        return Err(BarcodeError::NotFound);
    }

    if bottom - top != right - left {
        // The bottom right module was light, so assume a square
        right = left + (bottom - top);
        if right >= image.width() {
            return Err(BarcodeError::NotFound);
        }
    }

    let matrix_width = ((right - left + 1) as f32 / module_size).round() as usize;
    let matrix_height = ((bottom - top + 1) as f32 / module_size).round() as usize;
    if matrix_width == 0 || matrix_height == 0 || matrix_width != matrix_height {
        return Err(BarcodeError::NotFound);
    }

    // Sample the middle of each module, pulling back if that runs past the last pixel
    let nudge = (module_size / 2.0) as usize;
    top += nudge;
    left += nudge;
    let span = ((matrix_width - 1) as f32 * module_size) as usize;
    if left + span > right {
        let too_far = left + span - right;
        if too_far > nudge {
            return Err(BarcodeError::NotFound);
        }
        left -= too_far;
    }
    let span = ((matrix_height - 1) as f32 * module_size) as usize;
    if top + span > bottom {
        let too_far = top + span - bottom;
        if too_far > nudge {
            return Err(BarcodeError::NotFound);
        }
        top -= too_far;
    }

    let mut bits = BitMatrix::new(matrix_width, matrix_height)?;
    for y in 0..matrix_height {
        let i_offset = top + (y as f32 * module_size) as usize;
        for x in 0..matrix_width {
            if image.get(left + (x as f32 * module_size) as usize, i_offset) {
                bits.set(x, y);
            }
        }
    }
    Ok(bits)
}

// Walks the diagonal from the top left corner across the 7 module finder pattern
fn pure_module_size(left_top: (usize, usize), image: &BitMatrix) -> BarcodeResult<f32> {
    let (width, height) = (image.width(), image.height());
    let (mut x, mut y) = left_top;
    let mut in_black = true;
    let mut transitions = 0;
    while x < width && y < height {
        if in_black != image.get(x, y) {
            transitions += 1;
            if transitions == 5 {
                break;
            }
            in_black = !in_black;
        }
        x += 1;
        y += 1;
    }
    if x == width || y == height {
        return Err(BarcodeError::NotFound);
    }
    Ok((x - left_top.0) as f32 / 7.0)
}

#[cfg(test)]
mod detector_tests {
    use test_case::test_case;

    use super::{compute_dimension, extract_pure_bits, Detector};
    use crate::builder::QRBuilder;
    use crate::common::{
        bit_matrix::BitMatrix, error::BarcodeError, hints::DecodeHints, metadata::Version,
    };
    use crate::reader::qr::finder::FinderPattern;

    fn qr_symbol(data: &str, version: usize) -> BitMatrix {
        QRBuilder::new(data)
            .version(Version::new(version).unwrap())
            .build()
            .unwrap()
            .render(0, 0, 0)
            .unwrap()
    }

    #[test_case(18.0, 18.0, Ok(25))]
    #[test_case(14.0, 14.0, Ok(21))]
    #[test_case(15.0, 15.0, Ok(21))]
    #[test_case(17.0, 17.0, Ok(25))]
    #[test_case(16.0, 16.0, Err(BarcodeError::NotFound))]
    fn test_compute_dimension(dx: f32, dy: f32, exp: Result<usize, BarcodeError>) {
        let tl = FinderPattern::new(0.0, 0.0, 1.0);
        let tr = FinderPattern::new(dx, 0.0, 1.0);
        let bl = FinderPattern::new(0.0, dy, 1.0);
        assert_eq!(compute_dimension(&tl, &tr, &bl, 1.0), exp);
    }

    #[test_case(1, 3)]
    #[test_case(2, 4)]
    #[test_case(7, 2)]
    fn test_extract_pure_bits(version: usize, scale: usize) {
        let symbol = qr_symbol("pure extraction", version);
        let dim = symbol.width();
        let mut image = BitMatrix::new((dim + 8) * scale, (dim + 8) * scale).unwrap();
        for y in 0..dim {
            for x in 0..dim {
                if symbol.get(x, y) {
                    image.set_region((x + 4) * scale, (y + 4) * scale, scale, scale).unwrap();
                }
            }
        }
        assert_eq!(extract_pure_bits(&image).unwrap(), symbol);
    }

    #[test]
    fn test_extract_pure_bits_blank() {
        let image = BitMatrix::new(30, 30).unwrap();
        assert_eq!(extract_pure_bits(&image), Err(BarcodeError::NotFound));
    }

    #[test_case("detector", 1, 4)]
    #[test_case("detector round trip", 3, 3)]
    #[test_case("detector round trip", 8, 3)]
    fn test_detect_samples_symbol(data: &str, version: usize, scale: usize) {
        let symbol = qr_symbol(data, version);
        let dim = symbol.width();
        let mut image = BitMatrix::new((dim + 8) * scale, (dim + 8) * scale).unwrap();
        for y in 0..dim {
            for x in 0..dim {
                if symbol.get(x, y) {
                    image.set_region((x + 4) * scale, (y + 4) * scale, scale, scale).unwrap();
                }
            }
        }

        let hints = DecodeHints::new();
        let res = Detector::new(&image).detect(&hints).unwrap();
        assert_eq!(res.bits, symbol);
        let exp_points = if version > 1 { 4 } else { 3 };
        assert_eq!(res.points.len(), exp_points);
        // Bottom left first, then top left
        assert!(res.points[0].y > res.points[1].y);
        assert!((res.points[1].x - 7.5 * scale as f32).abs() < 1.0);
    }
}
