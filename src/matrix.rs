//! The upper/lower chip pair behind the key matrix.

use crate::{
    color::{Hsv, Is31fl3733Rgb, RGB8},
    interface::RegisterAccess,
    led_map::{self, Device, LedPosition, MATRIX_COLS, MATRIX_ROWS},
    log::{info, warn},
    Error, Mask, ENABLE_SIZE, PWM_SIZE,
};

/// A mask covering both chips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixMask {
    pub upper: Mask,
    pub lower: Mask,
}

impl Default for MatrixMask {
    fn default() -> Self {
        Self::new()
    }
}

impl MatrixMask {
    pub const fn new() -> Self {
        MatrixMask {
            upper: [0; ENABLE_SIZE],
            lower: [0; ENABLE_SIZE],
        }
    }

    pub fn device(&self, device: Device) -> &Mask {
        match device {
            Device::Upper => &self.upper,
            Device::Lower => &self.lower,
        }
    }

    /// Adds the three channels of the pixel at `position`.
    pub fn add_pixel(&mut self, position: LedPosition) {
        let mask = match position.device {
            Device::Upper => &mut self.upper,
            Device::Lower => &mut self.lower,
        };

        for offset in position.offset()..position.offset() + 3 {
            if let Some(byte) = mask.get_mut(offset / 8) {
                *byte |= 1 << (offset % 8);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.upper.iter().chain(self.lower.iter()).all(|&b| b == 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ChipSnapshot {
    leds: [u8; ENABLE_SIZE],
    pwm: [u8; PWM_SIZE],
}

/// Enable and PWM buffers of both chips at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixSnapshot {
    upper: ChipSnapshot,
    lower: ChipSnapshot,
}

/// Two chips forming one logical LED matrix.
pub struct DualMatrix<I> {
    upper: Is31fl3733Rgb<I>,
    lower: Is31fl3733Rgb<I>,
}

impl<I> DualMatrix<I> {
    pub fn device(&self, device: Device) -> &Is31fl3733Rgb<I> {
        match device {
            Device::Upper => &self.upper,
            Device::Lower => &self.lower,
        }
    }

    pub fn device_mut(&mut self, device: Device) -> &mut Is31fl3733Rgb<I> {
        match device {
            Device::Upper => &mut self.upper,
            Device::Lower => &mut self.lower,
        }
    }

    fn devices_mut(&mut self) -> [&mut Is31fl3733Rgb<I>; 2] {
        [&mut self.upper, &mut self.lower]
    }

    /// Destroys the matrix and returns the upper and lower chip.
    pub fn release(self) -> (Is31fl3733Rgb<I>, Is31fl3733Rgb<I>) {
        (self.upper, self.lower)
    }

    /// Sets the pixel of the key in column `x`, row `y`. Coordinates outside the
    /// matrix or keys without a pixel are ignored.
    pub fn draw_pixel_rgb(&mut self, x: i16, y: i16, color: RGB8) {
        // the bounds are inclusive; the lookup rejects x == MATRIX_COLS and y == MATRIX_ROWS
        if x < 0 || x > MATRIX_COLS as i16 {
            return;
        }
        if y < 0 || y > MATRIX_ROWS as i16 {
            return;
        }

        if let Some(position) = led_map::led_position(y as usize, x as usize) {
            self.device_mut(position.device)
                .set_pixel_rgb(position.row, position.col, color);
        }
    }

    pub fn draw_pixel_hsv(&mut self, x: i16, y: i16, color: Hsv) {
        self.draw_pixel_rgb(x, y, color.to_rgb());
    }

    pub fn fill(&mut self, brightness: u8) {
        for device in self.devices_mut() {
            device.device_mut().buffer_mut().fill(brightness);
        }
    }

    pub fn fill_rgb_masked(&mut self, color: RGB8) {
        for device in self.devices_mut() {
            device.fill_rgb_masked(color);
        }
    }

    pub fn fill_hsv_masked(&mut self, color: Hsv) {
        self.fill_rgb_masked(color.to_rgb());
    }

    pub fn enable_all_leds(&mut self) {
        for device in self.devices_mut() {
            device.device_mut().buffer_mut().enable_all();
        }
    }

    pub fn disable_all_leds(&mut self) {
        for device in self.devices_mut() {
            device.device_mut().buffer_mut().disable_all();
        }
    }

    /// Replaces the write mask of both chips.
    pub fn set_mask(&mut self, mask: &MatrixMask) {
        self.upper.device_mut().buffer_mut().set_mask(&mask.upper);
        self.lower.device_mut().buffer_mut().set_mask(&mask.lower);
    }

    pub fn enable_by_mask(&mut self, mask: &MatrixMask) {
        self.upper.device_mut().buffer_mut().enable_by_mask(&mask.upper);
        self.lower.device_mut().buffer_mut().enable_by_mask(&mask.lower);
    }

    pub fn disable_by_mask(&mut self, mask: &MatrixMask) {
        self.upper
            .device_mut()
            .buffer_mut()
            .disable_by_mask(&mask.upper);
        self.lower
            .device_mut()
            .buffer_mut()
            .disable_by_mask(&mask.lower);
    }

    pub fn snapshot(&self) -> MatrixSnapshot {
        let chip = |device: &Is31fl3733Rgb<I>| ChipSnapshot {
            leds: *device.device().buffer().led_buffer(),
            pwm: *device.device().buffer().pwm_buffer(),
        };

        MatrixSnapshot {
            upper: chip(&self.upper),
            lower: chip(&self.lower),
        }
    }

    /// Copies the enable and PWM buffers of `snapshot` back. Masks are not part of a snapshot.
    pub fn restore(&mut self, snapshot: &MatrixSnapshot) {
        for (device, chip) in self
            .devices_mut()
            .into_iter()
            .zip([&snapshot.upper, &snapshot.lower])
        {
            let buffer = device.device_mut().buffer_mut();
            *buffer.led_buffer_mut() = chip.leds;
            *buffer.pwm_buffer_mut() = chip.pwm;
        }
    }
}

impl<I, IE> DualMatrix<I>
where
    I: RegisterAccess<Error = Error<IE>>,
{
    /// Pairs two chips. Exactly one of them has to be configured as sync master.
    pub fn new(upper: Is31fl3733Rgb<I>, lower: Is31fl3733Rgb<I>) -> Result<Self, Error<IE>> {
        if upper.device().is_master() == lower.device().is_master() {
            return Err(Error::SyncConflict);
        }

        Ok(DualMatrix { upper, lower })
    }

    pub fn init(&mut self) -> Result<(), Error<IE>> {
        for device in self.devices_mut() {
            device.init()?;
        }

        Ok(())
    }

    /// Re-runs the init sequence of a single chip.
    pub fn reinit(&mut self, device: Device) -> Result<(), Error<IE>> {
        info!("reinit {} chip", device_name(device));
        self.device_mut(device).init()
    }

    pub fn update(&mut self) -> Result<(), Error<IE>> {
        for device in self.devices_mut() {
            device.device_mut().update()?;
        }

        Ok(())
    }

    pub fn update_enable(&mut self) -> Result<(), Error<IE>> {
        for device in self.devices_mut() {
            device.device_mut().update_enable()?;
        }

        Ok(())
    }

    pub fn update_pwm(&mut self) -> Result<(), Error<IE>> {
        for device in self.devices_mut() {
            device.device_mut().update_pwm()?;
        }

        Ok(())
    }

    pub fn hardware_shutdown(&mut self, enable: bool) -> Result<(), Error<IE>> {
        for device in self.devices_mut() {
            device.device_mut().hardware_shutdown(enable)?;
        }

        Ok(())
    }

    /// Sets the global current control register of both chips.
    pub fn set_global_current(&mut self, gcc: u8) -> Result<(), Error<IE>> {
        for device in self.devices_mut() {
            device.device_mut().set_global_current(gcc)?;
        }

        Ok(())
    }

    /// Current budget in mA. There is no mapping from a current budget to a GCC value for
    /// this board; use [`DualMatrix::set_global_current`] instead.
    pub fn power_target(&mut self, milliamps: u16) -> Result<(), Error<IE>> {
        warn!("power target of {} mA is not supported", milliamps);
        Err(Error::Unsupported)
    }
}

fn device_name(device: Device) -> &'static str {
    match device {
        Device::Upper => "upper",
        Device::Lower => "lower",
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        interface::mock::{Access, Journal, MockInterface, Trace},
        ConfigBuilder, Is31fl3733,
    };

    /// A matrix whose chips record into their own journals.
    pub(crate) fn recording_matrix() -> (DualMatrix<MockInterface>, Journal, Journal) {
        let (upper, upper_journal) = MockInterface::recording();
        let (lower, lower_journal) = MockInterface::recording();
        let matrix = DualMatrix::new(
            Is31fl3733Rgb::new(Is31fl3733::new(&ConfigBuilder::upper(), upper)),
            Is31fl3733Rgb::new(Is31fl3733::new(&ConfigBuilder::lower(), lower)),
        )
        .unwrap();

        (matrix, upper_journal, lower_journal)
    }

    /// Number of full PWM pushes (12 row transfers on page 1) in `journal`.
    pub(crate) fn pwm_pushes(journal: &Journal) -> usize {
        journal
            .borrow()
            .windows(3)
            .filter(|w| {
                w[0] == Access::WriteRegister(0xFE, 0xC5)
                    && w[1] == Access::WriteRegister(0xFD, 1)
                    && matches!(&w[2], Access::WriteRegisters(0x00, data) if data.len() == 16)
            })
            .count()
    }

    /// Number of enable pushes (two transfers on page 0) in `journal`.
    pub(crate) fn enable_pushes(journal: &Journal) -> usize {
        journal
            .borrow()
            .windows(3)
            .filter(|w| {
                w[0] == Access::WriteRegister(0xFE, 0xC5)
                    && w[1] == Access::WriteRegister(0xFD, 0)
                    && matches!(&w[2], Access::WriteRegisters(0x00, data) if data.len() == 12)
            })
            .count()
    }

    #[test]
    fn test_new_requires_one_master() {
        let chip = |config: ConfigBuilder| {
            Is31fl3733Rgb::new(Is31fl3733::new(&config, MockInterface::new(Vec::new())))
        };

        assert!(matches!(
            DualMatrix::new(chip(ConfigBuilder::lower()), chip(ConfigBuilder::lower())),
            Err(Error::SyncConflict)
        ));
        assert!(matches!(
            DualMatrix::new(chip(ConfigBuilder::upper()), chip(ConfigBuilder::upper())),
            Err(Error::SyncConflict)
        ));
        assert!(DualMatrix::new(chip(ConfigBuilder::upper()), chip(ConfigBuilder::lower())).is_ok());
    }

    #[test]
    fn test_draw_pixel_routes_to_chip() {
        let (mut matrix, _, _) = recording_matrix();

        matrix.draw_pixel_rgb(2, 0, RGB8::new(9, 8, 7));
        matrix.draw_pixel_rgb(0, 3, RGB8::new(1, 2, 3));

        assert_eq!(
            matrix.device(Device::Upper).pixel_rgb(0, 3),
            Some(RGB8::new(9, 8, 7))
        );
        assert_eq!(
            matrix.device(Device::Lower).pixel_rgb(0, 0),
            Some(RGB8::new(1, 2, 3))
        );
    }

    #[test]
    fn test_draw_pixel_ignores_absent_and_out_of_range() {
        let (mut matrix, _, _) = recording_matrix();
        let before = matrix.snapshot();

        // no key at row 0, column 1
        matrix.draw_pixel_rgb(1, 0, RGB8::new(1, 1, 1));
        matrix.draw_pixel_rgb(-1, 0, RGB8::new(1, 1, 1));
        matrix.draw_pixel_rgb(0, -1, RGB8::new(1, 1, 1));
        matrix.draw_pixel_rgb(18, 0, RGB8::new(1, 1, 1));

        assert_eq!(matrix.snapshot(), before);
    }

    #[test]
    fn test_draw_pixel_inclusive_bound_is_a_no_op() {
        let (mut matrix, _, _) = recording_matrix();
        let before = matrix.snapshot();

        // the bounds check lets these through, the map has no entry for them
        matrix.draw_pixel_rgb(MATRIX_COLS as i16, 0, RGB8::new(1, 1, 1));
        matrix.draw_pixel_rgb(0, MATRIX_ROWS as i16, RGB8::new(1, 1, 1));

        assert_eq!(matrix.snapshot(), before);
    }

    #[test]
    fn test_update_pwm_pushes_both_chips() {
        let (mut matrix, upper, lower) = recording_matrix();

        matrix.update_pwm().unwrap();

        assert_eq!(pwm_pushes(&upper), 1);
        assert_eq!(pwm_pushes(&lower), 1);
        assert_eq!(enable_pushes(&upper), 0);
        assert_eq!(upper.borrow().len(), 2 + 12);
    }

    /// A matrix whose chips both append to one shared, chip-tagged trace.
    fn tracing_matrix() -> (DualMatrix<MockInterface>, Trace) {
        let trace = Trace::default();
        let (upper, _) = MockInterface::tracing(&trace, Device::Upper);
        let (lower, _) = MockInterface::tracing(&trace, Device::Lower);
        let matrix = DualMatrix::new(
            Is31fl3733Rgb::new(Is31fl3733::new(&ConfigBuilder::upper(), upper)),
            Is31fl3733Rgb::new(Is31fl3733::new(&ConfigBuilder::lower(), lower)),
        )
        .unwrap();

        (matrix, trace)
    }

    /// Asserts both chips were written and every upper access precedes the first lower one.
    fn assert_upper_then_lower(trace: &Trace) {
        let devices: Vec<Device> = trace.borrow().iter().map(|(device, _)| *device).collect();
        let first_lower = devices
            .iter()
            .position(|device| *device == Device::Lower)
            .expect("lower chip was not written");

        assert!(first_lower > 0, "upper chip was not written first");
        assert!(
            devices[first_lower..].iter().all(|device| *device == Device::Lower),
            "upper chip written after lower chip: {devices:?}"
        );
    }

    #[test]
    fn test_fan_out_writes_upper_then_lower() {
        let updates: [fn(&mut DualMatrix<MockInterface>) -> Result<(), Error<()>>; 3] = [
            DualMatrix::update,
            DualMatrix::update_enable,
            DualMatrix::update_pwm,
        ];

        for update in updates {
            let (mut matrix, trace) = tracing_matrix();
            update(&mut matrix).unwrap();
            assert_upper_then_lower(&trace);
        }
    }

    #[test]
    fn test_fan_out_pwm_rows_upper_then_lower() {
        let (mut matrix, trace) = tracing_matrix();

        matrix.update_pwm().unwrap();

        let rows: Vec<Device> = trace
            .borrow()
            .iter()
            .filter(|(_, access)| matches!(access, Access::WriteRegisters(_, data) if data.len() == 16))
            .map(|(device, _)| *device)
            .collect();
        let mut expected = vec![Device::Upper; 12];
        expected.extend([Device::Lower; 12]);
        assert_eq!(rows, expected);
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let (mut matrix, _, _) = recording_matrix();
        matrix.draw_pixel_hsv(5, 1, Hsv::new(10, 200, 100));
        matrix
            .device_mut(Device::Lower)
            .device_mut()
            .buffer_mut()
            .set_led(2, 2, true);

        let snapshot = matrix.snapshot();
        matrix.enable_all_leds();
        matrix.fill(0);
        assert_ne!(matrix.snapshot(), snapshot);

        matrix.restore(&snapshot);
        assert_eq!(matrix.snapshot(), snapshot);
    }

    #[test]
    fn test_masked_fill_fans_out() {
        let (mut matrix, _, _) = recording_matrix();
        let mut mask = MatrixMask::new();
        mask.add_pixel(led_map::led_position(0, 0).unwrap());
        mask.add_pixel(led_map::led_position(5, 16).unwrap());
        matrix.set_mask(&mask);
        matrix.enable_by_mask(&mask);

        matrix.fill_rgb_masked(RGB8::new(4, 5, 6));

        assert_eq!(
            matrix.device(Device::Upper).pixel_rgb(0, 0),
            Some(RGB8::new(4, 5, 6))
        );
        let last = led_map::led_position(5, 16).unwrap();
        assert_eq!(
            matrix.device(Device::Lower).pixel_rgb(last.row, last.col),
            Some(RGB8::new(4, 5, 6))
        );
        assert!(matrix
            .device(Device::Upper)
            .device()
            .buffer()
            .is_led_enabled(2, 0));

        matrix.disable_by_mask(&mask);
        assert!(!matrix
            .device(Device::Upper)
            .device()
            .buffer()
            .is_led_enabled(2, 0));
    }

    #[test]
    fn test_power_target_is_unsupported() {
        let (mut matrix, upper, lower) = recording_matrix();

        assert!(matches!(matrix.power_target(500), Err(Error::Unsupported)));
        assert!(upper.borrow().is_empty());
        assert!(lower.borrow().is_empty());

        matrix.set_global_current(0x20).unwrap();
        assert!(upper.borrow().contains(&Access::WriteRegister(0x01, 0x20)));
        assert!(lower.borrow().contains(&Access::WriteRegister(0x01, 0x20)));
    }

    #[test]
    fn test_reinit_touches_one_chip() {
        let (mut matrix, upper, lower) = recording_matrix();

        matrix.reinit(Device::Lower).unwrap();

        assert!(upper.borrow().is_empty());
        assert!(lower.borrow().contains(&Access::HardwareEnable(true)));
    }
}
