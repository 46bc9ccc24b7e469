use super::{Animation, AnimationSettings};
use crate::{
    color::Hsv,
    led_map::{MATRIX_COLS, MATRIX_ROWS},
    matrix::DualMatrix,
};

/// A rainbow spread over the columns, scrolling from left to right.
pub struct ColorCycleLeftRight {
    hue: u8,
}

impl Default for ColorCycleLeftRight {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorCycleLeftRight {
    pub fn new() -> Self {
        ColorCycleLeftRight { hue: 0 }
    }
}

/// Hue of column `col` when column 0 shows `hue`.
fn column_hue(hue: u8, col: usize) -> u8 {
    hue.wrapping_sub((col * 256 / MATRIX_COLS) as u8)
}

impl Animation for ColorCycleLeftRight {
    fn start<I>(&mut self, _matrix: &mut DualMatrix<I>, _settings: &AnimationSettings) {
        self.hue = 0;
    }

    fn frame<I>(&mut self, matrix: &mut DualMatrix<I>, settings: &AnimationSettings) {
        for col in 0..MATRIX_COLS {
            let color = Hsv::new(column_hue(self.hue, col), settings.hsv.s, settings.hsv.v);
            for row in 0..MATRIX_ROWS {
                matrix.draw_pixel_hsv(col as i16, row as i16, color);
            }
        }

        self.hue = self.hue.wrapping_add(1);
    }
}
