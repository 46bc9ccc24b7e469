use super::{scale, Animation, AnimationSettings};
use crate::{
    color::Hsv,
    led_map::{MATRIX_COLS, MATRIX_ROWS},
    matrix::DualMatrix,
};

/// Brightness lost per frame by a lit key.
pub(super) const FADE_STEP: u8 = 8;

/// A brightness level per key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct KeyLevels([[u8; MATRIX_COLS]; MATRIX_ROWS]);

impl KeyLevels {
    pub(super) const fn new() -> Self {
        KeyLevels([[0; MATRIX_COLS]; MATRIX_ROWS])
    }

    pub(super) fn clear(&mut self) {
        *self = Self::new();
    }

    pub(super) fn get(&self, row: usize, col: usize) -> u8 {
        self.0[row][col]
    }

    pub(super) fn light(&mut self, row: usize, col: usize) {
        if let Some(level) = self.0.get_mut(row).and_then(|cols| cols.get_mut(col)) {
            *level = u8::MAX;
        }
    }

    /// Lights every key whose bit is set in `bits`.
    pub(super) fn light_row(&mut self, row: u8, bits: u32) {
        for col in (0..MATRIX_COLS).filter(|col| bits & (1 << col) != 0) {
            self.light(row as usize, col);
        }
    }

    pub(super) fn fade(&mut self, step: u8) {
        for level in self.0.iter_mut().flatten() {
            *level = level.saturating_sub(step);
        }
    }
}

/// Pressed keys flash up in the primary colour and fade out.
pub struct TypeOMatic {
    levels: KeyLevels,
}

impl Default for TypeOMatic {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeOMatic {
    pub fn new() -> Self {
        TypeOMatic {
            levels: KeyLevels::new(),
        }
    }
}

impl Animation for TypeOMatic {
    fn start<I>(&mut self, _matrix: &mut DualMatrix<I>, _settings: &AnimationSettings) {
        self.levels.clear();
    }

    fn frame<I>(&mut self, matrix: &mut DualMatrix<I>, settings: &AnimationSettings) {
        let hsv = settings.hsv;

        for row in 0..MATRIX_ROWS {
            for col in 0..MATRIX_COLS {
                let level = self.levels.get(row, col);
                let color = Hsv::new(hsv.h, hsv.s, scale(hsv.v, level));
                matrix.draw_pixel_hsv(col as i16, row as i16, color);
            }
        }

        self.levels.fade(FADE_STEP);
    }

    fn typematrix_row(&mut self, row: u8, bits: u32) {
        self.levels.light_row(row, bits);
    }
}
