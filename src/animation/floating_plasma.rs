use super::{
    tables::{PALETTE_SIZE, PLASMA_PALETTE, SIN_LUT},
    Animation, AnimationOptions, AnimationSettings,
};
use crate::{
    color::RGB8,
    led_map::{MATRIX_COLS, MATRIX_ROWS},
    matrix::DualMatrix,
};

/// How the frame counter moves the plasma through the palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlasmaVariant {
    /// Counter added after scaling the phase sum: the palette scrolls one colour per frame
    Variant1,
    /// Counter added before scaling: a slower, smoother drift
    Variant2,
}

/// Continuous colour field built from four sine samples per key.
pub struct FloatingPlasma {
    counter: u16,
    variant: PlasmaVariant,
}

impl Default for FloatingPlasma {
    fn default() -> Self {
        Self::new()
    }
}

impl FloatingPlasma {
    pub fn new() -> Self {
        FloatingPlasma {
            counter: 0,
            variant: PlasmaVariant::Variant1,
        }
    }

    pub fn variant(&self) -> PlasmaVariant {
        self.variant
    }

    pub fn counter(&self) -> u16 {
        self.counter
    }
}

/// Palette index of the key in column `x`, row `y` at frame `counter`.
pub(crate) fn plasma_index(x: u8, y: u8, counter: u16, variant: PlasmaVariant) -> usize {
    let (x, y) = (x as u16, y as u16);

    let phase1 = ((x << 4).wrapping_add(counter)) as u8;
    let phase2 = ((y << 5).wrapping_add(counter)) as u8;
    let phase3 = ((x << 4) + (y << 4)).wrapping_add(counter >> 1) as u8;
    let phase4 = ((((x * x) << 3) + ((y * y) << 3)) / (x + y + 1)) as u8;

    let sum = SIN_LUT[phase1 as usize]
        + SIN_LUT[phase2 as usize]
        + SIN_LUT[phase3 as usize]
        + SIN_LUT[phase4 as usize];

    match variant {
        PlasmaVariant::Variant1 => ((sum as usize >> 4) + counter as usize) % PALETTE_SIZE,
        PlasmaVariant::Variant2 => {
            (sum.wrapping_add(counter << 2) as usize >> 4) % PALETTE_SIZE
        }
    }
}

impl Animation for FloatingPlasma {
    fn start<I>(&mut self, _matrix: &mut DualMatrix<I>, _settings: &AnimationSettings) {
        self.counter = 0;
    }

    fn frame<I>(&mut self, matrix: &mut DualMatrix<I>, _settings: &AnimationSettings) {
        for y in 0..MATRIX_ROWS as u8 {
            for x in 0..MATRIX_COLS as u8 {
                let [r, g, b] = PLASMA_PALETTE[plasma_index(x, y, self.counter, self.variant)];
                matrix.draw_pixel_rgb(x as i16, y as i16, RGB8::new(r, g, b));
            }
        }

        self.counter = self.counter.wrapping_add(1);
    }

    fn supported_options(&self) -> AnimationOptions {
        AnimationOptions::VARIANT_1 | AnimationOptions::VARIANT_2
    }

    fn set_option(&mut self, option: AnimationOptions) {
        if option.contains(AnimationOptions::VARIANT_1) {
            self.variant = PlasmaVariant::Variant1;
        } else if option.contains(AnimationOptions::VARIANT_2) {
            self.variant = PlasmaVariant::Variant2;
        }
    }

    fn option(&self) -> AnimationOptions {
        match self.variant {
            PlasmaVariant::Variant1 => AnimationOptions::VARIANT_1,
            PlasmaVariant::Variant2 => AnimationOptions::VARIANT_2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{led_map::Device, matrix::tests::recording_matrix};

    #[test]
    fn test_origin_at_first_frame() {
        // four samples of SIN_LUT[0] = 1536, 6144 >> 4 = 384
        assert_eq!(plasma_index(0, 0, 0, PlasmaVariant::Variant1), 384);
        assert_eq!(plasma_index(0, 0, 0, PlasmaVariant::Variant2), 384);
    }

    #[test]
    fn test_variants_differ_in_counter_handling() {
        // counter 1 moves phase 1 and 2 by one step, phase 3 only every other frame
        let sum = SIN_LUT[1] as usize * 2 + SIN_LUT[0] as usize * 2;
        assert_eq!(plasma_index(0, 0, 1, PlasmaVariant::Variant1), (sum >> 4) + 1);
        assert_eq!(plasma_index(0, 0, 1, PlasmaVariant::Variant2), (sum + 4) >> 4);
    }

    #[test]
    fn test_index_stays_in_palette() {
        for counter in [0, 1, 255, 1000, u16::MAX] {
            for variant in [PlasmaVariant::Variant1, PlasmaVariant::Variant2] {
                for y in 0..MATRIX_ROWS as u8 {
                    for x in 0..MATRIX_COLS as u8 {
                        assert!(plasma_index(x, y, counter, variant) < PALETTE_SIZE);
                    }
                }
            }
        }
    }

    #[test]
    fn test_frame_paints_keys_and_advances() {
        let (mut matrix, _, _) = recording_matrix();
        let mut plasma = FloatingPlasma::new();
        let settings = AnimationSettings::default();

        plasma.start(&mut matrix, &settings);
        plasma.frame(&mut matrix, &settings);

        let [r, g, b] = PLASMA_PALETTE[384];
        assert_eq!(
            matrix.device(Device::Upper).pixel_rgb(0, 0),
            Some(RGB8::new(r, g, b))
        );
        assert_eq!(plasma.counter(), 1);

        plasma.start(&mut matrix, &settings);
        assert_eq!(plasma.counter(), 0);
    }

    #[test]
    fn test_variant_option() {
        let mut plasma = FloatingPlasma::new();
        assert_eq!(plasma.option(), AnimationOptions::VARIANT_1);

        plasma.set_option(AnimationOptions::VARIANT_2);
        assert_eq!(plasma.variant(), PlasmaVariant::Variant2);

        plasma.set_option(AnimationOptions::empty());
        assert_eq!(plasma.variant(), PlasmaVariant::Variant2);
    }
}
