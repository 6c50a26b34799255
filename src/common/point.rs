use std::fmt::{Display, Formatter, Result as FmtResult};

// Point
//------------------------------------------------------------------------------

/// Location of interest in an image, such as a finder pattern centre or the end of a 1D
/// symbol. Coordinates are in pixels and may be fractional.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl Display for Point {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

/// Anything that sits at a point in the image
pub trait ResultPoint {
    fn x(&self) -> f32;
    fn y(&self) -> f32;

    fn point(&self) -> Point {
        Point::new(self.x(), self.y())
    }
}

impl ResultPoint for Point {
    fn x(&self) -> f32 {
        self.x
    }

    fn y(&self) -> f32 {
        self.y
    }
}

pub fn distance<A: ResultPoint, B: ResultPoint>(a: &A, b: &B) -> f32 {
    let (dx, dy) = (a.x() - b.x(), a.y() - b.y());
    (dx * dx + dy * dy).sqrt()
}

pub fn int_distance(ax: i32, ay: i32, bx: i32, by: i32) -> f32 {
    let (dx, dy) = ((ax - bx) as f32, (ay - by) as f32);
    (dx * dx + dy * dy).sqrt()
}

/// Z component of the cross product of (a - b) and (c - b)
pub fn cross_product_z<T: ResultPoint>(a: &T, b: &T, c: &T) -> f32 {
    let (bx, by) = (b.x(), b.y());
    (c.x() - bx) * (a.y() - by) - (c.y() - by) * (a.x() - bx)
}

/// Orders three finder patterns as [bottom left, top left, top right]. Top left is the
/// vertex opposite the longest side, the other two are swapped as needed so the turn
/// from bottom left through top left to top right is clockwise in image coordinates.
pub fn order_best_patterns<T: ResultPoint + Copy>(patterns: [T; 3]) -> [T; 3] {
    let zero_one = distance(&patterns[0], &patterns[1]);
    let one_two = distance(&patterns[1], &patterns[2]);
    let zero_two = distance(&patterns[0], &patterns[2]);

    let (mut a, b, mut c) = if one_two >= zero_one && one_two >= zero_two {
        (patterns[1], patterns[0], patterns[2])
    } else if zero_two >= one_two && zero_two >= zero_one {
        (patterns[0], patterns[1], patterns[2])
    } else {
        (patterns[0], patterns[2], patterns[1])
    };

    if cross_product_z(&a, &b, &c) < 0.0 {
        std::mem::swap(&mut a, &mut c);
    }

    [a, b, c]
}

#[cfg(test)]
mod point_tests {
    use super::{cross_product_z, distance, order_best_patterns, Point};

    #[test]
    fn test_distance() {
        let a = Point::new(1.0, 2.0);
        let b = Point::new(4.0, 6.0);
        assert_eq!(distance(&a, &b), 5.0);
        assert_eq!(distance(&a, &a), 0.0);
    }

    #[test]
    fn test_cross_product_z() {
        let (a, b, c) = (Point::new(0.0, 10.0), Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        assert!(cross_product_z(&a, &b, &c) > 0.0);
        assert!(cross_product_z(&c, &b, &a) < 0.0);
    }

    #[test]
    fn test_order_best_patterns() {
        let bl = Point::new(3.5, 17.5);
        let tl = Point::new(3.5, 3.5);
        let tr = Point::new(17.5, 3.5);
        for perm in [[bl, tl, tr], [tr, bl, tl], [tl, tr, bl], [tr, tl, bl], [bl, tr, tl]] {
            assert_eq!(order_best_patterns(perm), [bl, tl, tr]);
        }
    }

    #[test]
    fn test_order_best_patterns_mirrored() {
        // Horizontally flipped symbol
        let bl = Point::new(17.5, 17.5);
        let tl = Point::new(17.5, 3.5);
        let tr = Point::new(3.5, 3.5);
        assert_eq!(order_best_patterns([bl, tl, tr]), [tr, tl, bl]);
    }
}
