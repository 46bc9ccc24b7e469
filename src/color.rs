//! RGB composition on top of a single chip.
//!
//! Each RGB LED occupies three consecutive PWM bytes; which byte drives which
//! colour depends on the board wiring and is described by [`RgbOffsets`].

use smart_leds::hsv::hsv2rgb;
pub use smart_leds::RGB8;

use crate::{interface::RegisterAccess, Error, Is31fl3733, PWM_SIZE};

/// Colour in hue/saturation/value form, every component spanning 0..=255.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

impl Hsv {
    pub const fn new(h: u8, s: u8, v: u8) -> Self {
        Hsv { h, s, v }
    }

    pub fn to_rgb(self) -> RGB8 {
        hsv2rgb(smart_leds::hsv::Hsv {
            hue: self.h,
            sat: self.s,
            val: self.v,
        })
    }
}

/// Position of each colour channel within an LED's three PWM bytes.
///
/// The offsets are always a permutation of 0, 1 and 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbOffsets {
    r: u8,
    g: u8,
    b: u8,
}

impl RgbOffsets {
    /// Wiring of the 91TKL board: red, blue, green.
    pub const BOARD: RgbOffsets = RgbOffsets { r: 0, g: 2, b: 1 };

    /// Returns `None` unless `r`, `g` and `b` are distinct and below 3.
    pub const fn new(r: u8, g: u8, b: u8) -> Option<Self> {
        if r > 2 || g > 2 || b > 2 || r == g || r == b || g == b {
            return None;
        }

        Some(RgbOffsets { r, g, b })
    }

    pub fn r(&self) -> u8 {
        self.r
    }

    pub fn g(&self) -> u8 {
        self.g
    }

    pub fn b(&self) -> u8 {
        self.b
    }

    fn channels(&self, color: RGB8) -> [(usize, u8); 3] {
        [
            (self.r as usize, color.r),
            (self.g as usize, color.g),
            (self.b as usize, color.b),
        ]
    }
}

impl Default for RgbOffsets {
    fn default() -> Self {
        Self::BOARD
    }
}

/// A chip whose PWM outputs are grouped into RGB pixels.
pub struct Is31fl3733Rgb<I> {
    device: Is31fl3733<I>,
    offsets: RgbOffsets,
}

impl<I> Is31fl3733Rgb<I> {
    pub fn new(device: Is31fl3733<I>) -> Self {
        Self::with_offsets(device, RgbOffsets::BOARD)
    }

    pub fn with_offsets(device: Is31fl3733<I>, offsets: RgbOffsets) -> Self {
        Is31fl3733Rgb { device, offsets }
    }

    pub fn device(&self) -> &Is31fl3733<I> {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut Is31fl3733<I> {
        &mut self.device
    }

    pub fn offsets(&self) -> RgbOffsets {
        self.offsets
    }

    pub fn release(self) -> Is31fl3733<I> {
        self.device
    }

    /// Writes `color` to every masked pixel.
    pub fn fill_rgb_masked(&mut self, color: RGB8) {
        let buffer = self.device.buffer_mut();

        for (offset, value) in self.offsets.channels(color) {
            for i in (offset..PWM_SIZE).step_by(3) {
                buffer.set_pwm_offset_masked(i, value);
            }
        }
    }

    pub fn fill_hsv_masked(&mut self, color: Hsv) {
        self.fill_rgb_masked(color.to_rgb());
    }

    /// Sets the pixel whose first PWM byte sits at (`row`, `col`). Pixels running past
    /// the end of the PWM buffer are ignored.
    pub fn set_pixel_rgb(&mut self, row: u8, col: u8, color: RGB8) {
        let base = crate::buffer::led_offset(col, row);
        if base + 2 >= PWM_SIZE {
            return;
        }

        let pwm = self.device.buffer_mut().pwm_buffer_mut();
        for (offset, value) in self.offsets.channels(color) {
            pwm[base + offset] = value;
        }
    }

    pub fn set_pixel_hsv(&mut self, row: u8, col: u8, color: Hsv) {
        self.set_pixel_rgb(row, col, color.to_rgb());
    }

    /// Colour currently buffered for the pixel at (`row`, `col`).
    pub fn pixel_rgb(&self, row: u8, col: u8) -> Option<RGB8> {
        let base = crate::buffer::led_offset(col, row);
        let pwm = self.device.buffer().pwm_buffer();
        let channel = |offset: u8| pwm.get(base + offset as usize).copied();

        Some(RGB8::new(
            channel(self.offsets.r)?,
            channel(self.offsets.g)?,
            channel(self.offsets.b)?,
        ))
    }
}

impl<I, IE> Is31fl3733Rgb<I>
where
    I: RegisterAccess<Error = Error<IE>>,
{
    pub fn init(&mut self) -> Result<(), Error<IE>> {
        self.device.init()
    }
}
