use std::ops::Mul;

use crate::common::point::Point;

// Perspective transform to map logical modules onto the image
//------------------------------------------------------------------------------

/// 3x3 projective matrix acting on row vectors `[x y 1]`. Element `aij` sits in row `i`
/// and column `j`, so `a13` and `a23` carry the perspective.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct PerspectiveTransform {
    a11: f32,
    a12: f32,
    a13: f32,
    a21: f32,
    a22: f32,
    a23: f32,
    a31: f32,
    a32: f32,
    a33: f32,
}

impl PerspectiveTransform {
    #[allow(clippy::too_many_arguments)]
    fn new(
        a11: f32,
        a21: f32,
        a31: f32,
        a12: f32,
        a22: f32,
        a32: f32,
        a13: f32,
        a23: f32,
        a33: f32,
    ) -> Self {
        Self { a11, a12, a13, a21, a22, a23, a31, a32, a33 }
    }

    /// Maps the quadrilateral `from` onto the quadrilateral `to`, corner by corner
    pub fn quadrilateral_to_quadrilateral(from: [Point; 4], to: [Point; 4]) -> Self {
        let q_to_s = Self::quadrilateral_to_square(from);
        let s_to_q = Self::square_to_quadrilateral(to);
        s_to_q.times(&q_to_s)
    }

    /// Maps the unit square, corners in the order (0,0) (1,0) (1,1) (0,1), onto `quad`
    pub fn square_to_quadrilateral(quad: [Point; 4]) -> Self {
        let [p0, p1, p2, p3] = quad;
        let (x0, y0, x1, y1) = (p0.x, p0.y, p1.x, p1.y);
        let (x2, y2, x3, y3) = (p2.x, p2.y, p3.x, p3.y);
        let dx3 = x0 - x1 + x2 - x3;
        let dy3 = y0 - y1 + y2 - y3;
        if dx3 == 0.0 && dy3 == 0.0 {
            // Affine
            return Self::new(x1 - x0, x2 - x1, x0, y1 - y0, y2 - y1, y0, 0.0, 0.0, 1.0);
        }

        let dx1 = x1 - x2;
        let dx2 = x3 - x2;
        let dy1 = y1 - y2;
        let dy2 = y3 - y2;
        let denominator = dx1 * dy2 - dx2 * dy1;
        let a13 = (dx3 * dy2 - dx2 * dy3) / denominator;
        let a23 = (dx1 * dy3 - dx3 * dy1) / denominator;
        Self::new(
            x1 - x0 + a13 * x1,
            x3 - x0 + a23 * x3,
            x0,
            y1 - y0 + a13 * y1,
            y3 - y0 + a23 * y3,
            y0,
            a13,
            a23,
            1.0,
        )
    }

    pub fn quadrilateral_to_square(quad: [Point; 4]) -> Self {
        // The adjoint is proportional to the inverse, which is all a projection needs
        Self::square_to_quadrilateral(quad).build_adjoint()
    }

    /// Transpose of the cofactor matrix
    pub fn build_adjoint(&self) -> Self {
        let Self { a11, a12, a13, a21, a22, a23, a31, a32, a33 } = *self;
        Self::new(
            a22 * a33 - a23 * a32,
            a23 * a31 - a21 * a33,
            a21 * a32 - a22 * a31,
            a13 * a32 - a12 * a33,
            a11 * a33 - a13 * a31,
            a12 * a31 - a11 * a32,
            a12 * a23 - a13 * a22,
            a13 * a21 - a11 * a23,
            a11 * a22 - a12 * a21,
        )
    }

    pub fn times(&self, other: &Self) -> Self {
        Self::new(
            self.a11 * other.a11 + self.a21 * other.a12 + self.a31 * other.a13,
            self.a11 * other.a21 + self.a21 * other.a22 + self.a31 * other.a23,
            self.a11 * other.a31 + self.a21 * other.a32 + self.a31 * other.a33,
            self.a12 * other.a11 + self.a22 * other.a12 + self.a32 * other.a13,
            self.a12 * other.a21 + self.a22 * other.a22 + self.a32 * other.a23,
            self.a12 * other.a31 + self.a22 * other.a32 + self.a32 * other.a33,
            self.a13 * other.a11 + self.a23 * other.a12 + self.a33 * other.a13,
            self.a13 * other.a21 + self.a23 * other.a22 + self.a33 * other.a23,
            self.a13 * other.a31 + self.a23 * other.a32 + self.a33 * other.a33,
        )
    }

    pub fn transform(&self, x: f32, y: f32) -> Point {
        let denominator = self.a13 * x + self.a23 * y + self.a33;
        Point::new(
            (self.a11 * x + self.a21 * y + self.a31) / denominator,
            (self.a12 * x + self.a22 * y + self.a32) / denominator,
        )
    }

    pub fn transform_points(&self, points: &mut [Point]) {
        for p in points.iter_mut() {
            *p = self.transform(p.x, p.y);
        }
    }
}

impl Mul for PerspectiveTransform {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        self.times(&rhs)
    }
}

#[cfg(test)]
mod homography_tests {
    use super::PerspectiveTransform;
    use crate::common::point::Point;

    fn assert_close(p: Point, x: f32, y: f32) {
        assert!((p.x - x).abs() < 1e-2 && (p.y - y).abs() < 1e-2, "{p} != ({x}, {y})");
    }

    fn quad(pts: [(f32, f32); 4]) -> [Point; 4] {
        pts.map(|(x, y)| Point::new(x, y))
    }

    #[test]
    fn test_square_to_quadrilateral() {
        let t = PerspectiveTransform::square_to_quadrilateral(quad([
            (2.0, 3.0),
            (10.0, 4.0),
            (16.0, 15.0),
            (4.0, 9.0),
        ]));
        assert_close(t.transform(0.0, 0.0), 2.0, 3.0);
        assert_close(t.transform(1.0, 0.0), 10.0, 4.0);
        assert_close(t.transform(1.0, 1.0), 16.0, 15.0);
        assert_close(t.transform(0.0, 1.0), 4.0, 9.0);
    }

    #[test]
    fn test_quadrilateral_to_quadrilateral() {
        let from = quad([(3.5, 3.5), (21.5, 3.5), (18.5, 18.5), (3.5, 21.5)]);
        let to = quad([(75.0, 75.0), (255.0, 75.0), (225.0, 225.0), (75.0, 255.0)]);
        let t = PerspectiveTransform::quadrilateral_to_quadrilateral(from, to);
        for (f, t_pt) in from.iter().zip(to) {
            assert_close(t.transform(f.x, f.y), t_pt.x, t_pt.y);
        }

        let mut points = [Point::new(12.5, 3.5), Point::new(3.5, 12.5)];
        t.transform_points(&mut points);
        assert_close(points[0], 165.0, 75.0);
        assert_close(points[1], 75.0, 165.0);
    }

    #[test]
    fn test_adjoint_inverts() {
        let q = quad([(1.0, 2.0), (9.0, 1.0), (11.0, 12.0), (0.0, 8.0)]);
        let to_quad = PerspectiveTransform::square_to_quadrilateral(q);
        let round_trip = PerspectiveTransform::quadrilateral_to_square(q) * to_quad;
        assert_close(round_trip.transform(0.25, 0.75), 0.25, 0.75);
    }
}
