//! In-memory mirror of one chip's LED state.
//!
//! Nothing in here touches the bus; [`crate::Is31fl3733::update`] and friends push the
//! buffers to the chip.

/// Number of current sinks (columns) per chip
pub const CS: usize = 16;

/// Number of switch lines (rows) per chip
pub const SW: usize = 12;

/// Size of the PWM buffer, one byte per LED
pub const PWM_SIZE: usize = CS * SW;

/// Size of the enable and mask buffers, one bit per LED
pub const ENABLE_SIZE: usize = CS * SW / 8;

/// One bit per LED, laid out like the enable buffer.
pub type Mask = [u8; ENABLE_SIZE];

/// Offset of LED (`cs`, `sw`) in the PWM buffer. Bit `offset % 8` of byte `offset / 8`
/// addresses the same LED in the enable and mask buffers.
pub const fn led_offset(cs: u8, sw: u8) -> usize {
    sw as usize * CS + cs as usize
}

const fn bit(offset: usize) -> (usize, u8) {
    (offset / 8, 1 << (offset % 8))
}

/// Enable bits, PWM values and write mask of one chip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedBuffer {
    leds: [u8; ENABLE_SIZE],
    pwm: [u8; PWM_SIZE],
    mask: Mask,
}

impl Default for LedBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LedBuffer {
    pub const fn new() -> Self {
        LedBuffer {
            leds: [0; ENABLE_SIZE],
            pwm: [0; PWM_SIZE],
            mask: [0; ENABLE_SIZE],
        }
    }

    /// Zeroes enable bits, mask and PWM values.
    pub fn clear(&mut self) {
        self.leds.fill(0);
        self.mask.fill(0);
        self.pwm.fill(0);
    }

    pub fn led_buffer(&self) -> &[u8; ENABLE_SIZE] {
        &self.leds
    }

    pub fn led_buffer_mut(&mut self) -> &mut [u8; ENABLE_SIZE] {
        &mut self.leds
    }

    pub fn pwm_buffer(&self) -> &[u8; PWM_SIZE] {
        &self.pwm
    }

    pub fn pwm_buffer_mut(&mut self) -> &mut [u8; PWM_SIZE] {
        &mut self.pwm
    }

    pub fn mask_buffer(&self) -> &Mask {
        &self.mask
    }

    fn write_led(&mut self, offset: usize, enabled: bool) {
        let (byte, bit) = bit(offset);
        if let Some(leds) = self.leds.get_mut(byte) {
            if enabled {
                *leds |= bit;
            } else {
                *leds &= !bit;
            }
        }
    }

    /// Whether the mask bit at PWM buffer `offset` is set.
    pub fn is_masked_offset(&self, offset: usize) -> bool {
        let (byte, bit) = bit(offset);
        self.mask.get(byte).is_some_and(|mask| mask & bit != 0)
    }

    pub fn is_masked(&self, cs: u8, sw: u8) -> bool {
        self.is_masked_offset(led_offset(cs, sw))
    }

    pub fn set_led(&mut self, cs: u8, sw: u8, enabled: bool) {
        self.write_led(led_offset(cs, sw), enabled);
    }

    /// Like [`LedBuffer::set_led`], but only if the LED's mask bit is set.
    pub fn set_led_masked(&mut self, cs: u8, sw: u8, enabled: bool) {
        let offset = led_offset(cs, sw);
        if self.is_masked_offset(offset) {
            self.write_led(offset, enabled);
        }
    }

    pub fn is_led_enabled(&self, cs: u8, sw: u8) -> bool {
        let (byte, bit) = bit(led_offset(cs, sw));
        self.leds.get(byte).is_some_and(|leds| leds & bit != 0)
    }

    pub fn enable_all(&mut self) {
        self.leds.fill(0xff);
    }

    pub fn disable_all(&mut self) {
        self.leds.fill(0x00);
    }

    /// Enables every LED set in `mask`, leaving the others as they are.
    pub fn enable_by_mask(&mut self, mask: &Mask) {
        self.leds
            .iter_mut()
            .zip(mask.iter())
            .for_each(|(leds, mask)| *leds |= mask);
    }

    /// Disables every LED set in `mask`, leaving the others as they are.
    pub fn disable_by_mask(&mut self, mask: &Mask) {
        self.leds
            .iter_mut()
            .zip(mask.iter())
            .for_each(|(leds, mask)| *leds &= !mask);
    }

    pub fn set_pwm(&mut self, cs: u8, sw: u8, brightness: u8) {
        if let Some(pwm) = self.pwm.get_mut(led_offset(cs, sw)) {
            *pwm = brightness;
        }
    }

    pub fn get_pwm(&self, cs: u8, sw: u8) -> u8 {
        self.pwm.get(led_offset(cs, sw)).copied().unwrap_or(0)
    }

    pub fn set_pwm_masked(&mut self, cs: u8, sw: u8, brightness: u8) {
        let offset = led_offset(cs, sw);
        if self.is_masked_offset(offset) {
            self.pwm[offset] = brightness;
        }
    }

    /// Sets the PWM byte at `offset` if its mask bit is set.
    pub(crate) fn set_pwm_offset_masked(&mut self, offset: usize, brightness: u8) {
        if self.is_masked_offset(offset) {
            self.pwm[offset] = brightness;
        }
    }

    pub fn fill(&mut self, brightness: u8) {
        self.pwm.fill(brightness);
    }

    pub fn fill_masked(&mut self, brightness: u8) {
        for offset in 0..PWM_SIZE {
            self.set_pwm_offset_masked(offset, brightness);
        }
    }

    /// PWM values of switch line `sw`.
    pub fn pwm_row(&self, sw: u8) -> Option<&[u8]> {
        let start = sw as usize * CS;
        self.pwm.get(start..start + CS)
    }

    /// Overwrites the PWM values of switch line `sw`. Returns `false` for rows past the matrix.
    pub fn set_pwm_row(&mut self, sw: u8, values: &[u8; CS]) -> bool {
        let start = sw as usize * CS;
        match self.pwm.get_mut(start..start + CS) {
            Some(row) => {
                row.copy_from_slice(values);
                true
            }
            None => false,
        }
    }

    /// Replaces the mask.
    pub fn set_mask(&mut self, mask: &Mask) {
        self.mask = *mask;
    }

    pub fn clear_mask(&mut self) {
        self.mask.fill(0);
    }

    pub fn or_mask(&mut self, mask: &Mask) {
        self.mask
            .iter_mut()
            .zip(mask.iter())
            .for_each(|(current, mask)| *current |= mask);
    }

    pub fn nand_mask(&mut self, mask: &Mask) {
        self.mask
            .iter_mut()
            .zip(mask.iter())
            .for_each(|(current, mask)| *current &= !mask);
    }
}
