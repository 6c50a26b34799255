pub mod homography;
pub mod sampler;

// Rounds half away from zero, the way pixel coordinates are snapped everywhere in the
// readers
#[inline]
pub fn round(d: f32) -> i32 {
    (d + if d < 0.0 { -0.5 } else { 0.5 }) as i32
}
