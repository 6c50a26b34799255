use log::{debug, trace};

use crate::common::{
    bit_matrix::BitMatrix,
    error::{BarcodeError, BarcodeResult},
    hints::DecodeHints,
    point::{order_best_patterns, Point, ResultPoint},
};

// Finder pattern
//------------------------------------------------------------------------------

// *******
// *     *
// * *** *  <- 1:1:3:1:1 along every line through the centre
// * *** *
// * *** *
// *     *
// *******
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinderPattern {
    pub x: f32,
    pub y: f32,
    pub estimated_module_size: f32,
    // Number of scans that confirmed this centre
    pub count: usize,
}

impl FinderPattern {
    pub fn new(x: f32, y: f32, estimated_module_size: f32) -> Self {
        Self { x, y, estimated_module_size, count: 1 }
    }

    /// Whether a centre found at row `i`, column `j` with `module_size` is this pattern
    pub fn about_equals(&self, module_size: f32, i: f32, j: f32) -> bool {
        if (i - self.y).abs() <= module_size && (j - self.x).abs() <= module_size {
            let module_size_diff = (module_size - self.estimated_module_size).abs();
            return module_size_diff <= 1.0 || module_size_diff <= self.estimated_module_size;
        }
        false
    }

    /// Weighted average of this pattern with one more sighting
    pub fn combine_estimate(&self, i: f32, j: f32, new_module_size: f32) -> Self {
        let count = self.count as f32;
        let combined_count = count + 1.0;
        Self {
            x: (count * self.x + j) / combined_count,
            y: (count * self.y + i) / combined_count,
            estimated_module_size: (count * self.estimated_module_size + new_module_size)
                / combined_count,
            count: self.count + 1,
        }
    }
}

impl ResultPoint for FinderPattern {
    fn x(&self) -> f32 {
        self.x
    }

    fn y(&self) -> f32 {
        self.y
    }
}

// Finder pattern finder
//------------------------------------------------------------------------------

const CENTER_QUORUM: usize = 2;
const MIN_SKIP: usize = 3;
// Largest symbol is 177 modules; assume a quarter of the image height holds the 3 module
// wide centre at one pixel per module
const MAX_MODULES: usize = 97;

pub struct FinderPatternFinder<'a> {
    image: &'a BitMatrix,
    possible_centers: Vec<FinderPattern>,
    has_skipped: bool,
    hints: &'a DecodeHints,
}

impl<'a> FinderPatternFinder<'a> {
    pub fn new(image: &'a BitMatrix, hints: &'a DecodeHints) -> Self {
        Self { image, possible_centers: Vec::new(), has_skipped: false, hints }
    }

    pub fn possible_centers(&self) -> &[FinderPattern] {
        &self.possible_centers
    }

    /// Scans rows for 1:1:3:1:1 runs, cross checking each hit, and returns the three
    /// best centres as [bottom left, top left, top right]
    pub fn find(&mut self) -> BarcodeResult<[FinderPattern; 3]> {
        let max_i = self.image.height();
        let max_j = self.image.width();

        let mut i_skip = (3 * max_i) / (4 * MAX_MODULES);
        if i_skip < MIN_SKIP || self.hints.try_harder {
            i_skip = MIN_SKIP;
        }

        let mut done = false;
        let mut state_count = [0usize; 5];
        let mut i = i_skip - 1;
        while i < max_i && !done {
            state_count.fill(0);
            let mut current_state = 0;
            let mut j = 0;
            while j < max_j {
                if self.image.get(j, i) {
                    // Black after white moves on to the next run
                    if current_state & 1 == 1 {
                        current_state += 1;
                    }
                    state_count[current_state] += 1;
                } else if current_state & 1 == 1 {
                    state_count[current_state] += 1;
                } else if current_state < 4 {
                    current_state += 1;
                    state_count[current_state] += 1;
                } else if found_pattern_cross(&state_count) {
                    if self.handle_possible_center(&state_count, i, j) {
                        // Every other line is enough once a centre is confirmed
                        i_skip = 2;
                        if self.has_skipped {
                            done = self.have_multiply_confirmed_centers();
                        } else {
                            let row_skip = self.find_row_skip();
                            if row_skip > state_count[2] {
                                // Jump towards the third centre, backing off by the size
                                // of this one and the skip about to be added
                                i = (i + row_skip).saturating_sub(state_count[2] + i_skip);
                                j = max_j - 1;
                            }
                        }
                        current_state = 0;
                        state_count.fill(0);
                    } else {
                        shift_counts_2(&mut state_count);
                        current_state = 3;
                    }
                } else {
                    shift_counts_2(&mut state_count);
                    current_state = 3;
                }
                j += 1;
            }

            if found_pattern_cross(&state_count)
                && self.handle_possible_center(&state_count, i, max_j)
            {
                i_skip = state_count[0];
                if self.has_skipped {
                    done = self.have_multiply_confirmed_centers();
                }
            }
            i += i_skip.max(1);
        }

        let best = self.select_best_patterns()?;
        debug!("Selected finder patterns {:?}", best.map(|p| p.point()));
        Ok(order_best_patterns(best))
    }

    fn handle_possible_center(&mut self, state_count: &[usize; 5], i: usize, j: usize) -> bool {
        let state_count_total = state_count.iter().sum::<usize>();
        let center_j = center_from_end(state_count, j);
        let Some(center_i) =
            self.cross_check_vertical(i, center_j as usize, state_count[2], state_count_total)
        else {
            return false;
        };
        let Some(center_j) = self.cross_check_horizontal(
            center_j as usize,
            center_i as usize,
            state_count[2],
            state_count_total,
        ) else {
            return false;
        };
        if !self.cross_check_diagonal(center_i as usize, center_j as usize) {
            return false;
        }

        let estimated_module_size = state_count_total as f32 / 7.0;
        match self
            .possible_centers
            .iter_mut()
            .find(|c| c.about_equals(estimated_module_size, center_i, center_j))
        {
            Some(center) => {
                *center = center.combine_estimate(center_i, center_j, estimated_module_size);
            }
            None => {
                let point = FinderPattern::new(center_j, center_i, estimated_module_size);
                trace!("Possible finder pattern at {}", point.point());
                self.hints.notify_point(point.point());
                self.possible_centers.push(point);
            }
        }
        true
    }

    /// Vertical scan through `center_j` from row `start_i`, returning the centre row
    fn cross_check_vertical(
        &self,
        start_i: usize,
        center_j: usize,
        max_count: usize,
        original_state_count_total: usize,
    ) -> Option<f32> {
        let max_i = self.image.height();
        let black = |i: usize| self.image.get(center_j, i);
        let mut state_count = [0usize; 5];

        // Up from the centre
        let mut i = start_i as isize;
        while i >= 0 && black(i as usize) {
            state_count[2] += 1;
            i -= 1;
        }
        if i < 0 {
            return None;
        }
        while i >= 0 && !black(i as usize) && state_count[1] <= max_count {
            state_count[1] += 1;
            i -= 1;
        }
        if i < 0 || state_count[1] > max_count {
            return None;
        }
        while i >= 0 && black(i as usize) && state_count[0] <= max_count {
            state_count[0] += 1;
            i -= 1;
        }
        if state_count[0] > max_count {
            return None;
        }

        // Down from the centre
        let mut i = start_i + 1;
        while i < max_i && black(i) {
            state_count[2] += 1;
            i += 1;
        }
        if i == max_i {
            return None;
        }
        while i < max_i && !black(i) && state_count[3] < max_count {
            state_count[3] += 1;
            i += 1;
        }
        if i == max_i || state_count[3] >= max_count {
            return None;
        }
        while i < max_i && black(i) && state_count[4] < max_count {
            state_count[4] += 1;
            i += 1;
        }
        if state_count[4] >= max_count {
            return None;
        }

        // More than 40% off the horizontal size is a false positive
        let total = state_count.iter().sum::<usize>();
        if 5 * total.abs_diff(original_state_count_total) >= 2 * original_state_count_total {
            return None;
        }
        found_pattern_cross(&state_count).then(|| center_from_end(&state_count, i))
    }

    /// Horizontal scan through row `center_i` from column `start_j`, returning the centre
    /// column
    fn cross_check_horizontal(
        &self,
        start_j: usize,
        center_i: usize,
        max_count: usize,
        original_state_count_total: usize,
    ) -> Option<f32> {
        let max_j = self.image.width();
        let black = |j: usize| self.image.get(j, center_i);
        let mut state_count = [0usize; 5];

        let mut j = start_j as isize;
        while j >= 0 && black(j as usize) {
            state_count[2] += 1;
            j -= 1;
        }
        if j < 0 {
            return None;
        }
        while j >= 0 && !black(j as usize) && state_count[1] <= max_count {
            state_count[1] += 1;
            j -= 1;
        }
        if j < 0 || state_count[1] > max_count {
            return None;
        }
        while j >= 0 && black(j as usize) && state_count[0] <= max_count {
            state_count[0] += 1;
            j -= 1;
        }
        if state_count[0] > max_count {
            return None;
        }

        let mut j = start_j + 1;
        while j < max_j && black(j) {
            state_count[2] += 1;
            j += 1;
        }
        if j == max_j {
            return None;
        }
        while j < max_j && !black(j) && state_count[3] < max_count {
            state_count[3] += 1;
            j += 1;
        }
        if j == max_j || state_count[3] >= max_count {
            return None;
        }
        while j < max_j && black(j) && state_count[4] < max_count {
            state_count[4] += 1;
            j += 1;
        }
        if state_count[4] >= max_count {
            return None;
        }

        // Stricter than vertically: 20% off the original size is a false positive
        let total = state_count.iter().sum::<usize>();
        if 5 * total.abs_diff(original_state_count_total) >= original_state_count_total {
            return None;
        }
        found_pattern_cross(&state_count).then(|| center_from_end(&state_count, j))
    }

    /// Scan along the diagonal from the top left to the bottom right through the centre
    fn cross_check_diagonal(&self, center_i: usize, center_j: usize) -> bool {
        let (max_i, max_j) = (self.image.height(), self.image.width());
        let mut state_count = [0usize; 5];

        // Up and left: centre, white ring, black border
        let black_up = |k: usize| self.image.get(center_j - k, center_i - k);
        let in_up = |k: usize| center_i >= k && center_j >= k;
        let mut k = 0;
        for (state, want_black) in [(2, true), (1, false), (0, true)] {
            while in_up(k) && black_up(k) == want_black {
                state_count[state] += 1;
                k += 1;
            }
            if state_count[state] == 0 {
                return false;
            }
        }

        // Down and right
        let black_down = |k: usize| self.image.get(center_j + k, center_i + k);
        let in_down = |k: usize| center_i + k < max_i && center_j + k < max_j;
        let mut k = 1;
        for (state, want_black) in [(2, true), (3, false), (4, true)] {
            while in_down(k) && black_down(k) == want_black {
                state_count[state] += 1;
                k += 1;
            }
            if state != 2 && state_count[state] == 0 {
                return false;
            }
        }

        found_pattern_diagonal(&state_count)
    }

    // Once two centres are confirmed, rows can be skipped down to where the third could
    // start
    fn find_row_skip(&mut self) -> usize {
        if self.possible_centers.len() <= 1 {
            return 0;
        }
        let mut confirmed = self.possible_centers.iter().filter(|c| c.count >= CENTER_QUORUM);
        let (Some(first), Some(second)) = (confirmed.next(), confirmed.next()) else {
            return 0;
        };
        self.has_skipped = true;
        let skip = ((first.x - second.x).abs() - (first.y - second.y).abs()) / 2.0;
        skip.max(0.0) as usize
    }

    // At least three confirmed centres whose module sizes deviate by at most 5% in total
    fn have_multiply_confirmed_centers(&self) -> bool {
        let confirmed = self.possible_centers.iter().filter(|c| c.count >= CENTER_QUORUM);
        let confirmed_count = confirmed.clone().count();
        let total_module_size = confirmed.map(|c| c.estimated_module_size).sum::<f32>();
        if confirmed_count < 3 {
            return false;
        }

        let average = total_module_size / self.possible_centers.len() as f32;
        let total_deviation = self
            .possible_centers
            .iter()
            .map(|c| (c.estimated_module_size - average).abs())
            .sum::<f32>();
        total_deviation <= 0.05 * total_module_size
    }

    /// Picks the three centres of similar module size that form the most isosceles right
    /// triangle
    fn select_best_patterns(&mut self) -> BarcodeResult<[FinderPattern; 3]> {
        let size = self.possible_centers.len();
        if size < 3 {
            return Err(BarcodeError::NotFound);
        }
        self.possible_centers
            .sort_by(|a, b| a.estimated_module_size.total_cmp(&b.estimated_module_size));

        let centers = &self.possible_centers;
        let mut distortion = f64::MAX;
        let mut best = None;
        for i in 0..size - 2 {
            let fpi = centers[i];
            let min_module_size = fpi.estimated_module_size;
            for j in i + 1..size - 1 {
                let fpj = centers[j];
                let squares0 = squared_distance(&fpi, &fpj);
                for &fpk in &centers[j + 1..] {
                    if fpk.estimated_module_size > min_module_size * 1.4 {
                        continue;
                    }
                    let mut sides =
                        [squares0, squared_distance(&fpj, &fpk), squared_distance(&fpi, &fpk)];
                    sides.sort_by(f64::total_cmp);
                    let [a, b, c] = sides;
                    // Zero for an isosceles right triangle, c^2 = 2a^2 = 2b^2
                    let d = (c - 2.0 * b).abs() + (c - 2.0 * a).abs();
                    if d < distortion {
                        distortion = d;
                        best = Some([fpi, fpj, fpk]);
                    }
                }
            }
        }
        best.ok_or(BarcodeError::NotFound)
    }
}

fn squared_distance(a: &FinderPattern, b: &FinderPattern) -> f64 {
    let x = (a.x - b.x) as f64;
    let y = (a.y - b.y) as f64;
    x * x + y * y
}

// Centre of the middle run, given the position just past the last run
fn center_from_end(state_count: &[usize; 5], end: usize) -> f32 {
    (end - state_count[4] - state_count[3]) as f32 - state_count[2] as f32 / 2.0
}

fn shift_counts_2(state_count: &mut [usize; 5]) {
    state_count[0] = state_count[2];
    state_count[1] = state_count[3];
    state_count[2] = state_count[4];
    state_count[3] = 1;
    state_count[4] = 0;
}

fn pattern_matches(state_count: &[usize; 5], variance_divisor: f32) -> bool {
    if state_count.contains(&0) {
        return false;
    }
    let total_module_size = state_count.iter().sum::<usize>();
    if total_module_size < 7 {
        return false;
    }
    let module_size = total_module_size as f32 / 7.0;
    let max_variance = module_size / variance_divisor;
    let off = |i: usize, ratio: f32| (ratio * module_size - state_count[i] as f32).abs();
    off(0, 1.0) < max_variance
        && off(1, 1.0) < max_variance
        && off(2, 3.0) < 3.0 * max_variance
        && off(3, 1.0) < max_variance
        && off(4, 1.0) < max_variance
}

/// Less than 50% variance from the 1:1:3:1:1 proportions
pub(crate) fn found_pattern_cross(state_count: &[usize; 5]) -> bool {
    pattern_matches(state_count, 2.0)
}

// Diagonals are looser, less than 75% variance
fn found_pattern_diagonal(state_count: &[usize; 5]) -> bool {
    pattern_matches(state_count, 1.333)
}

#[cfg(test)]
mod finder_tests {
    use std::sync::{Arc, Mutex};

    use test_case::test_case;

    use super::{found_pattern_cross, FinderPattern, FinderPatternFinder};
    use crate::builder::{QrCodeWriter, Writer};
    use crate::common::{
        bit_matrix::BitMatrix, error::BarcodeError, format::BarcodeFormat, hints::DecodeHints,
        hints::EncodeHints, metadata::Version,
    };

    fn qr_image(scale: usize) -> BitMatrix {
        let mut hints = EncodeHints::new();
        hints.qr_version(Version::new(2).unwrap());
        let size = (25 + 8) * scale;
        QrCodeWriter.encode("Hello, world!", BarcodeFormat::QrCode, size, size, &hints).unwrap()
    }

    #[test_case([1, 1, 3, 1, 1], true)]
    #[test_case([2, 2, 6, 2, 2], true)]
    #[test_case([3, 2, 7, 2, 3], true)]
    #[test_case([1, 1, 1, 1, 1], false)]
    #[test_case([2, 0, 6, 2, 2], false)]
    #[test_case([4, 1, 3, 1, 1], false)]
    fn test_found_pattern_cross(state_count: [usize; 5], exp: bool) {
        assert_eq!(found_pattern_cross(&state_count), exp);
    }

    #[test]
    fn test_about_equals_and_combine() {
        let fp = FinderPattern::new(10.0, 20.0, 3.0);
        assert!(fp.about_equals(3.5, 21.0, 12.0));
        assert!(!fp.about_equals(3.0, 24.0, 10.0));
        assert!(!fp.about_equals(7.5, 20.0, 10.0));

        let combined = fp.combine_estimate(22.0, 12.0, 5.0);
        assert_eq!(combined.count, 2);
        assert_eq!((combined.x, combined.y), (11.0, 21.0));
        assert_eq!(combined.estimated_module_size, 4.0);

        let combined = combined.combine_estimate(24.0, 14.0, 7.0);
        assert_eq!(combined.count, 3);
        assert_eq!((combined.x, combined.y), (12.0, 22.0));
        assert_eq!(combined.estimated_module_size, 5.0);
    }

    #[test]
    fn test_find_ordered_patterns() {
        let scale = 4;
        let image = qr_image(scale);
        let hints = DecodeHints::new();
        let [bottom_left, top_left, top_right] =
            FinderPatternFinder::new(&image, &hints).find().unwrap();

        // Centres sit 3.5 modules in from the corners of the symbol, past the quiet zone
        let near = |p: FinderPattern, x: f32, y: f32| {
            let (x, y) = ((x + 4.0) * scale as f32, (y + 4.0) * scale as f32);
            (p.x - x).abs() < 1.0 && (p.y - y).abs() < 1.0
        };
        assert!(near(top_left, 3.5, 3.5), "{top_left:?}");
        assert!(near(top_right, 21.5, 3.5), "{top_right:?}");
        assert!(near(bottom_left, 3.5, 21.5), "{bottom_left:?}");
        assert!((top_left.estimated_module_size - scale as f32).abs() < 0.5);
    }

    #[test]
    fn test_point_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut hints = DecodeHints::new();
        hints.result_point_callback(move |p| sink.lock().unwrap().push(p));

        let image = qr_image(3);
        FinderPatternFinder::new(&image, &hints).find().unwrap();
        assert!(seen.lock().unwrap().len() >= 3);
    }

    #[test]
    fn test_blank_image() {
        let image = BitMatrix::new(60, 60).unwrap();
        let hints = DecodeHints::new();
        let res = FinderPatternFinder::new(&image, &hints).find();
        assert_eq!(res, Err(BarcodeError::NotFound));
    }
}
