use log::trace;

use crate::common::{
    bit_matrix::BitMatrix,
    error::{BarcodeError, BarcodeResult},
    hints::DecodeHints,
    point::ResultPoint,
};

// Alignment pattern
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentPattern {
    pub x: f32,
    pub y: f32,
    pub estimated_module_size: f32,
}

impl AlignmentPattern {
    pub fn new(x: f32, y: f32, estimated_module_size: f32) -> Self {
        Self { x, y, estimated_module_size }
    }

    pub fn about_equals(&self, module_size: f32, i: f32, j: f32) -> bool {
        if (i - self.y).abs() <= module_size && (j - self.x).abs() <= module_size {
            let module_size_diff = (module_size - self.estimated_module_size).abs();
            return module_size_diff <= 1.0 || module_size_diff <= self.estimated_module_size;
        }
        false
    }

    /// Plain average with another sighting
    pub fn combine_estimate(&self, i: f32, j: f32, new_module_size: f32) -> Self {
        Self {
            x: (self.x + j) / 2.0,
            y: (self.y + i) / 2.0,
            estimated_module_size: (self.estimated_module_size + new_module_size) / 2.0,
        }
    }
}

impl ResultPoint for AlignmentPattern {
    fn x(&self) -> f32 {
        self.x
    }

    fn y(&self) -> f32 {
        self.y
    }
}

// Alignment pattern finder
//------------------------------------------------------------------------------

/// Looks for the 1:1:1 dark centre of an alignment pattern inside a search window. The
/// window is small, so every row is scanned, starting from its middle and moving outwards.
pub struct AlignmentPatternFinder<'a> {
    image: &'a BitMatrix,
    possible_centers: Vec<AlignmentPattern>,
    start_x: usize,
    start_y: usize,
    width: usize,
    height: usize,
    module_size: f32,
    hints: &'a DecodeHints,
}

impl<'a> AlignmentPatternFinder<'a> {
    pub fn new(
        image: &'a BitMatrix,
        (start_x, start_y): (usize, usize),
        (width, height): (usize, usize),
        module_size: f32,
        hints: &'a DecodeHints,
    ) -> Self {
        Self {
            image,
            possible_centers: Vec::new(),
            start_x,
            start_y,
            width,
            height,
            module_size,
            hints,
        }
    }

    /// Returns the first centre seen twice, else the first one seen at all
    pub fn find(&mut self) -> BarcodeResult<AlignmentPattern> {
        let max_j = self.start_x + self.width;
        let middle_i = self.start_y + self.height / 2;
        let mut state_count = [0usize; 3];

        for i_gen in 0..self.height {
            let offset = (i_gen + 1) / 2;
            let i = if i_gen & 1 == 0 { middle_i + offset } else { middle_i - offset };
            if i >= self.image.height() {
                continue;
            }

            state_count.fill(0);
            let mut j = self.start_x;
            // A white run touching the window edge has unknown length
            while j < max_j && !self.image.get(j, i) {
                j += 1;
            }

            let mut current_state = 0;
            while j < max_j {
                if self.image.get(j, i) {
                    if current_state == 1 {
                        state_count[1] += 1;
                    } else if current_state == 2 {
                        if self.found_pattern_cross(&state_count) {
                            if let Some(confirmed) = self.handle_possible_center(&state_count, i, j)
                            {
                                return Ok(confirmed);
                            }
                        }
                        state_count = [state_count[2], 1, 0];
                        current_state = 1;
                    } else {
                        current_state += 1;
                        state_count[current_state] += 1;
                    }
                } else {
                    if current_state == 1 {
                        current_state += 1;
                    }
                    state_count[current_state] += 1;
                }
                j += 1;
            }

            if self.found_pattern_cross(&state_count) {
                if let Some(confirmed) = self.handle_possible_center(&state_count, i, max_j) {
                    return Ok(confirmed);
                }
            }
        }

        self.possible_centers.first().copied().ok_or(BarcodeError::NotFound)
    }

    fn found_pattern_cross(&self, state_count: &[usize; 3]) -> bool {
        let max_variance = self.module_size / 2.0;
        state_count.iter().all(|&c| (self.module_size - c as f32).abs() < max_variance)
    }

    fn cross_check_vertical(
        &self,
        start_i: usize,
        center_j: usize,
        max_count: usize,
        original_state_count_total: usize,
    ) -> Option<f32> {
        let max_i = self.image.height();
        let black = |i: usize| self.image.get(center_j, i);
        let mut state_count = [0usize; 3];

        let mut i = start_i as isize;
        while i >= 0 && black(i as usize) && state_count[1] <= max_count {
            state_count[1] += 1;
            i -= 1;
        }
        if i < 0 || state_count[1] > max_count {
            return None;
        }
        while i >= 0 && !black(i as usize) && state_count[0] <= max_count {
            state_count[0] += 1;
            i -= 1;
        }
        if state_count[0] > max_count {
            return None;
        }

        let mut i = start_i + 1;
        while i < max_i && black(i) && state_count[1] <= max_count {
            state_count[1] += 1;
            i += 1;
        }
        if i == max_i || state_count[1] > max_count {
            return None;
        }
        while i < max_i && !black(i) && state_count[2] <= max_count {
            state_count[2] += 1;
            i += 1;
        }
        if state_count[2] > max_count {
            return None;
        }

        let total = state_count.iter().sum::<usize>();
        if 5 * total.abs_diff(original_state_count_total) >= 2 * original_state_count_total {
            return None;
        }
        self.found_pattern_cross(&state_count).then(|| center_from_end(&state_count, i))
    }

    fn handle_possible_center(
        &mut self,
        state_count: &[usize; 3],
        i: usize,
        j: usize,
    ) -> Option<AlignmentPattern> {
        let state_count_total = state_count.iter().sum::<usize>();
        let center_j = center_from_end(state_count, j);
        let center_i = self.cross_check_vertical(
            i,
            center_j as usize,
            2 * state_count[1],
            state_count_total,
        )?;

        let estimated_module_size = state_count_total as f32 / 3.0;
        if let Some(center) = self
            .possible_centers
            .iter()
            .find(|c| c.about_equals(estimated_module_size, center_i, center_j))
        {
            return Some(center.combine_estimate(center_i, center_j, estimated_module_size));
        }

        let point = AlignmentPattern::new(center_j, center_i, estimated_module_size);
        trace!("Possible alignment pattern at {}", point.point());
        self.hints.notify_point(point.point());
        self.possible_centers.push(point);
        None
    }
}

fn center_from_end(state_count: &[usize; 3], end: usize) -> f32 {
    (end - state_count[2]) as f32 - state_count[1] as f32 / 2.0
}
