use log::trace;

use super::homography::PerspectiveTransform;
use crate::common::{
    bit_matrix::BitMatrix,
    error::{BarcodeError, BarcodeResult},
    point::Point,
};

// Grid sampler
//------------------------------------------------------------------------------

/// Reads a `dimension_x` x `dimension_y` grid of modules from `image`, taking the pixel
/// under the centre of each module as projected by `transform`
pub fn sample_grid(
    image: &BitMatrix,
    dimension_x: usize,
    dimension_y: usize,
    transform: &PerspectiveTransform,
) -> BarcodeResult<BitMatrix> {
    if dimension_x == 0 || dimension_y == 0 {
        return Err(BarcodeError::NotFound);
    }
    let mut bits = BitMatrix::new(dimension_x, dimension_y)?;
    let mut points = vec![Point::default(); dimension_x];
    for y in 0..dimension_y {
        let y_value = y as f32 + 0.5;
        for (x, p) in points.iter_mut().enumerate() {
            *p = Point::new(x as f32 + 0.5, y_value);
        }
        transform.transform_points(&mut points);
        // Checking the ends of the row is enough for a sane transform
        check_and_nudge_points(image, &mut points)?;

        for (x, p) in points.iter().enumerate() {
            // A twisted transform can still send interior points outside the image
            match image.try_get(p.x as i32, p.y as i32) {
                Some(true) => bits.set(x, y),
                Some(false) => (),
                None => {
                    trace!("Module ({x}, {y}) sampled outside the image at {p}");
                    return Err(BarcodeError::NotFound);
                }
            }
        }
    }
    Ok(bits)
}

/// Samples the grid mapping the module coordinates `from` onto the image coordinates `to`
pub fn sample_grid_quad(
    image: &BitMatrix,
    dimension_x: usize,
    dimension_y: usize,
    from: [Point; 4],
    to: [Point; 4],
) -> BarcodeResult<BitMatrix> {
    let transform = PerspectiveTransform::quadrilateral_to_quadrilateral(from, to);
    sample_grid(image, dimension_x, dimension_y, &transform)
}

/// Moves points lying one pixel outside the image onto its edge, working inwards from
/// both ends of the row until a point needs no nudge. Points further out fail.
pub fn check_and_nudge_points(image: &BitMatrix, points: &mut [Point]) -> BarcodeResult<()> {
    let width = image.width() as i32;
    let height = image.height() as i32;

    let nudge = |p: &mut Point| -> BarcodeResult<bool> {
        let x = p.x as i32;
        let y = p.y as i32;
        if x < -1 || x > width || y < -1 || y > height {
            return Err(BarcodeError::NotFound);
        }
        let mut nudged = false;
        if x == -1 {
            p.x = 0.0;
            nudged = true;
        } else if x == width {
            p.x = (width - 1) as f32;
            nudged = true;
        }
        if y == -1 {
            p.y = 0.0;
            nudged = true;
        } else if y == height {
            p.y = (height - 1) as f32;
            nudged = true;
        }
        Ok(nudged)
    };

    for p in points.iter_mut() {
        if !nudge(p)? {
            break;
        }
    }
    for p in points.iter_mut().rev() {
        if !nudge(p)? {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod sampler_tests {
    use super::{check_and_nudge_points, sample_grid, sample_grid_quad};
    use crate::common::{bit_matrix::BitMatrix, error::BarcodeError, point::Point};
    use crate::reader::utils::homography::PerspectiveTransform;

    fn quad(pts: [(f32, f32); 4]) -> [Point; 4] {
        pts.map(|(x, y)| Point::new(x, y))
    }

    #[test]
    fn test_sample_scaled_grid() {
        // 3x3 checkerboard drawn at 4 pixels a module
        let mut image = BitMatrix::new(12, 12).unwrap();
        for (x, y) in [(0, 0), (2, 0), (1, 1), (0, 2), (2, 2)] {
            image.set_region(x * 4, y * 4, 4, 4).unwrap();
        }
        let bits = sample_grid_quad(
            &image,
            3,
            3,
            quad([(0.0, 0.0), (3.0, 0.0), (3.0, 3.0), (0.0, 3.0)]),
            quad([(0.0, 0.0), (12.0, 0.0), (12.0, 12.0), (0.0, 12.0)]),
        )
        .unwrap();
        assert_eq!(bits.to_string_with("X", "."), "X.X\n.X.\nX.X\n");
    }

    #[test]
    fn test_sample_outside_image() {
        let image = BitMatrix::new(10, 10).unwrap();
        let transform = PerspectiveTransform::square_to_quadrilateral(quad([
            (0.0, 0.0),
            (20.0, 0.0),
            (20.0, 20.0),
            (0.0, 20.0),
        ]));
        assert_eq!(sample_grid(&image, 2, 2, &transform), Err(BarcodeError::NotFound));
        assert_eq!(sample_grid(&image, 0, 2, &transform), Err(BarcodeError::NotFound));
    }

    #[test]
    fn test_check_and_nudge_points() {
        let image = BitMatrix::new(10, 10).unwrap();
        let mut points = [Point::new(-0.5, 3.0), Point::new(-1.5, 4.0), Point::new(10.5, 5.0)];
        check_and_nudge_points(&image, &mut points).unwrap();
        // Truncation sends -0.5 to 0, so only the backward pass nudges
        assert_eq!(points[0], Point::new(-0.5, 3.0));
        assert_eq!(points[1], Point::new(0.0, 4.0));
        assert_eq!(points[2], Point::new(9.0, 5.0));

        let mut points = [Point::new(-2.5, 3.0)];
        assert_eq!(check_and_nudge_points(&image, &mut points), Err(BarcodeError::NotFound));
    }
}
