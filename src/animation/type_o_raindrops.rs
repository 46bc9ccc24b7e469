use rand::{rngs::SmallRng, RngCore, SeedableRng};

use super::{
    scale,
    type_o_matic::{KeyLevels, FADE_STEP},
    Animation, AnimationSettings,
};
use crate::{
    color::Hsv,
    led_map::{self, MATRIX_COLS, MATRIX_ROWS},
    matrix::DualMatrix,
};

/// One in this many frames starts a new drop.
const DROP_CHANCE: u32 = 4;

const SEED: u64 = 0x91;

/// Random keys light up in the secondary colour, pressed keys in the primary one.
pub struct TypeORaindrops {
    rng: SmallRng,
    drops: KeyLevels,
    pressed: KeyLevels,
}

impl Default for TypeORaindrops {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeORaindrops {
    pub fn new() -> Self {
        TypeORaindrops {
            rng: SmallRng::seed_from_u64(SEED),
            drops: KeyLevels::new(),
            pressed: KeyLevels::new(),
        }
    }

    fn spawn_drop(&mut self) {
        if self.rng.next_u32() % DROP_CHANCE != 0 {
            return;
        }

        let row = self.rng.next_u32() as usize % MATRIX_ROWS;
        let col = self.rng.next_u32() as usize % MATRIX_COLS;
        if led_map::led_position(row, col).is_some() {
            self.drops.light(row, col);
        }
    }
}

impl Animation for TypeORaindrops {
    fn start<I>(&mut self, _matrix: &mut DualMatrix<I>, _settings: &AnimationSettings) {
        self.drops.clear();
        self.pressed.clear();
    }

    fn frame<I>(&mut self, matrix: &mut DualMatrix<I>, settings: &AnimationSettings) {
        self.spawn_drop();

        for row in 0..MATRIX_ROWS {
            for col in 0..MATRIX_COLS {
                let pressed = self.pressed.get(row, col);
                let (base, level) = if pressed > 0 {
                    (settings.hsv, pressed)
                } else {
                    (settings.hsv2, self.drops.get(row, col))
                };

                let color = Hsv::new(base.h, base.s, scale(base.v, level));
                matrix.draw_pixel_hsv(col as i16, row as i16, color);
            }
        }

        self.drops.fade(FADE_STEP / 2);
        self.pressed.fade(FADE_STEP);
    }

    fn typematrix_row(&mut self, row: u8, bits: u32) {
        self.pressed.light_row(row, bits);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{color::RGB8, matrix::tests::recording_matrix};

    #[test]
    fn test_drops_fall_over_time() {
        let (mut matrix, _, _) = recording_matrix();
        let settings = AnimationSettings::default();
        let mut animation = TypeORaindrops::new();
        animation.start(&mut matrix, &settings);

        for _ in 0..64 {
            animation.frame(&mut matrix, &settings);
        }

        let lit = led_map::keys()
            .filter(|(_, _, p)| matrix.device(p.device).pixel_rgb(p.row, p.col) != Some(RGB8::default()))
            .count();
        assert!(lit > 0);
    }

    #[test]
    fn test_press_wins_over_drop() {
        let (mut matrix, _, _) = recording_matrix();
        let settings = AnimationSettings {
            hsv: Hsv::new(0, 255, 255),
            hsv2: Hsv::new(85, 255, 255),
            ..AnimationSettings::default()
        };
        let mut animation = TypeORaindrops::new();
        animation.start(&mut matrix, &settings);

        animation.drops.light(0, 0);
        animation.typematrix_row(0, 1);
        animation.frame(&mut matrix, &settings);

        let esc = led_map::led_position(0, 0).unwrap();
        assert_eq!(
            matrix.device(esc.device).pixel_rgb(esc.row, esc.col),
            Some(RGB8::new(255, 0, 0))
        );
    }

    #[test]
    fn test_start_clears_levels() {
        let (mut matrix, _, _) = recording_matrix();
        let settings = AnimationSettings::default();
        let mut animation = TypeORaindrops::new();

        animation.typematrix_row(1, 0b111);
        animation.start(&mut matrix, &settings);

        assert_eq!(animation.pressed, KeyLevels::new());
    }
}
