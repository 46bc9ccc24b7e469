//! Backlight zones.
//!
//! Every key belongs to one of [`SECTOR_MAX`] sectors. A sector has an enable flag and
//! a colour; operations act on the sector under the selection cursor, which stays put
//! until the next [`SectorControl::select`].

use embedded_storage::Storage;

use crate::{
    color::Hsv,
    led_map::{self, Device},
    log::{debug, info},
    matrix::{DualMatrix, MatrixMask},
    store::{BacklightStore, SectorRecord, SECTOR_COUNT},
    PWM_SIZE,
};

pub const SECTOR_MAX: usize = SECTOR_COUNT;

pub const SECTOR_FUNCTION_ROW: u8 = 0;
pub const SECTOR_NUMBER_ROW: u8 = 1;
pub const SECTOR_ALPHA: u8 = 2;
pub const SECTOR_MODIFIERS: u8 = 3;
pub const SECTOR_NAVIGATION: u8 = 4;
pub const SECTOR_ARROWS: u8 = 5;
pub const SECTOR_SPACE: u8 = 6;
pub const SECTOR_ESCAPE: u8 = 7;

/// Sector of the key at (`row`, `col`).
pub const fn sector_of(row: usize, col: usize) -> u8 {
    match (row, col) {
        (0, 0) => SECTOR_ESCAPE,
        (0..=2, 14..=16) => SECTOR_NAVIGATION,
        (0, _) => SECTOR_FUNCTION_ROW,
        (1, _) => SECTOR_NUMBER_ROW,
        (4, 15) | (5, 14..=16) => SECTOR_ARROWS,
        (5, 6) => SECTOR_SPACE,
        (2, 1..=12) | (3, 1..=11) | (4, 2..=11) => SECTOR_ALPHA,
        _ => SECTOR_MODIFIERS,
    }
}

/// A sector id past [`SECTOR_MAX`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidSector(pub u8);

pub struct SectorControl {
    masks: [MatrixMask; SECTOR_MAX],
    all_keys: MatrixMask,
    enabled: u8,
    colors: [Hsv; SECTOR_MAX],
    cursor: u8,
    custom_map: u8,
}

impl Default for SectorControl {
    fn default() -> Self {
        Self::new()
    }
}

impl SectorControl {
    /// Builds the sector masks from the LED map. All sectors start enabled in white.
    pub fn new() -> Self {
        let mut masks = [MatrixMask::new(); SECTOR_MAX];
        let mut all_keys = MatrixMask::new();

        for (row, col, position) in led_map::keys() {
            masks[sector_of(row, col) as usize].add_pixel(position);
            all_keys.add_pixel(position);
        }

        let record = SectorRecord::default();
        SectorControl {
            masks,
            all_keys,
            enabled: record.enabled,
            colors: record.colors,
            cursor: 0,
            custom_map: record.custom_map,
        }
    }

    /// The currently selected sector.
    pub fn cursor(&self) -> u8 {
        self.cursor
    }

    pub fn mask(&self, id: u8) -> Option<&MatrixMask> {
        self.masks.get(id as usize)
    }

    pub fn is_enabled(&self, id: u8) -> bool {
        (id as usize) < SECTOR_MAX && self.enabled & (1 << id) != 0
    }

    pub fn color(&self, id: u8) -> Option<Hsv> {
        self.colors.get(id as usize).copied()
    }

    pub fn custom_map(&self) -> u8 {
        self.custom_map
    }

    /// Moves the cursor to `id` and loads its mask into both chips.
    pub fn select<I>(&mut self, id: u8, matrix: &mut DualMatrix<I>) -> Result<(), InvalidSector> {
        let mask = self.masks.get(id as usize).ok_or(InvalidSector(id))?;
        matrix.set_mask(mask);
        self.cursor = id;
        Ok(())
    }

    /// Enables or disables the LEDs of the selected sector. Buffer only.
    pub fn set_selected_enabled<I>(&mut self, enabled: bool, matrix: &mut DualMatrix<I>) {
        let mask = &self.masks[self.cursor as usize];
        if enabled {
            matrix.enable_by_mask(mask);
            self.enabled |= 1 << self.cursor;
        } else {
            matrix.disable_by_mask(mask);
            self.enabled &= !(1 << self.cursor);
        }
    }

    /// Fills the chips' current masks with `color` and records it for the selected
    /// sector. Buffer only.
    pub fn set_selected_hsv_color<I>(&mut self, color: Hsv, matrix: &mut DualMatrix<I>) {
        matrix.fill_hsv_masked(color);
        self.colors[self.cursor as usize] = color;
    }

    /// Writes every sector's enable flag and colour into the buffers. The cursor and its
    /// mask are left as they were.
    pub fn apply_all<I>(&mut self, matrix: &mut DualMatrix<I>) {
        for (id, mask) in self.masks.iter().enumerate() {
            if self.enabled & (1 << id) != 0 {
                matrix.enable_by_mask(mask);
            } else {
                matrix.disable_by_mask(mask);
            }
            matrix.set_mask(mask);
            matrix.fill_hsv_masked(self.colors[id]);
        }

        matrix.set_mask(&self.masks[self.cursor as usize]);
    }

    pub fn record(&self) -> SectorRecord {
        SectorRecord {
            enabled: self.enabled,
            colors: self.colors,
            custom_map: self.custom_map,
        }
    }

    pub fn save_state<S: Storage>(&self, store: &mut BacklightStore<S>) -> Result<(), S::Error> {
        debug!("sector: save state");
        store.write_sectors(&self.record())
    }

    /// Restores flags, colours and map selector from `store`. Buffers are not touched.
    pub fn load_state<S: Storage>(&mut self, store: &mut BacklightStore<S>) -> Result<(), S::Error> {
        let record = store.read_sectors()?;
        self.enabled = record.enabled;
        self.colors = record.colors;
        self.custom_map = record.custom_map;
        Ok(())
    }

    /// Resets the persisted backlight state and reloads the defaults. Buffers are not
    /// touched.
    pub fn clear_store<S: Storage>(&mut self, store: &mut BacklightStore<S>) -> Result<(), S::Error> {
        info!("sector: clear store");
        store.clear()?;
        self.load_state(store)
    }

    /// Selects a PWM source: `0` shows the sectors, anything else the stored custom PWM
    /// map with every key enabled. Buffer only.
    pub fn set_custom_map<I, S: Storage>(
        &mut self,
        map: u8,
        matrix: &mut DualMatrix<I>,
        store: &mut BacklightStore<S>,
    ) -> Result<(), S::Error> {
        if map == 0 {
            self.custom_map = 0;
            self.apply_all(matrix);
            return Ok(());
        }

        for device in [Device::Lower, Device::Upper] {
            let mut pwm = [0u8; PWM_SIZE];
            store.read_custom_pwm(device, &mut pwm)?;
            *matrix
                .device_mut(device)
                .device_mut()
                .buffer_mut()
                .pwm_buffer_mut() = pwm;
        }
        matrix.enable_by_mask(&self.all_keys);

        self.custom_map = map;
        Ok(())
    }

    /// Stores the current PWM buffers of both chips as the custom map.
    pub fn save_custom_pwm_map<I, S: Storage>(
        &self,
        matrix: &DualMatrix<I>,
        store: &mut BacklightStore<S>,
    ) -> Result<(), S::Error> {
        for device in [Device::Lower, Device::Upper] {
            store.write_custom_pwm(device, matrix.device(device).device().buffer().pwm_buffer())?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        led_map::{LedPosition, MATRIX_COLS, MATRIX_ROWS},
        matrix::tests::recording_matrix,
        store::{MemoryStore, StoreLayout},
    };

    const BLACK: crate::color::RGB8 = crate::color::RGB8 { r: 0, g: 0, b: 0 };

    fn pixel_of<I>(matrix: &DualMatrix<I>, position: LedPosition) -> crate::color::RGB8 {
        matrix
            .device(position.device)
            .pixel_rgb(position.row, position.col)
            .unwrap_or(BLACK)
    }

    fn first_key_of(sector: u8) -> LedPosition {
        led_map::keys()
            .find(|(row, col, _)| sector_of(*row, *col) == sector)
            .map(|(_, _, position)| position)
            .unwrap()
    }

    fn is_lit<I>(matrix: &DualMatrix<I>, position: LedPosition) -> bool {
        matrix
            .device(position.device)
            .device()
            .buffer()
            .is_led_enabled(position.col, position.row)
    }

    #[test]
    fn test_every_key_in_exactly_one_sector() {
        let sectors = SectorControl::new();

        for (_, _, position) in led_map::keys() {
            let owners = (0..SECTOR_MAX as u8)
                .filter(|&id| {
                    let mask = sectors.mask(id).unwrap().device(position.device);
                    let offset = position.offset();
                    mask[offset / 8] & (1 << (offset % 8)) != 0
                })
                .count();
            assert_eq!(owners, 1);
        }
        for id in 0..SECTOR_MAX as u8 {
            assert!(!sectors.mask(id).unwrap().is_empty(), "sector {id} is empty");
        }
    }

    #[test]
    fn test_sector_partition() {
        assert_eq!(sector_of(0, 0), SECTOR_ESCAPE);
        assert_eq!(sector_of(0, 5), SECTOR_FUNCTION_ROW);
        assert_eq!(sector_of(1, 15), SECTOR_NAVIGATION);
        assert_eq!(sector_of(2, 5), SECTOR_ALPHA);
        assert_eq!(sector_of(4, 0), SECTOR_MODIFIERS);
        assert_eq!(sector_of(5, 15), SECTOR_ARROWS);
        assert_eq!(sector_of(5, 6), SECTOR_SPACE);
        assert!(sector_of(MATRIX_ROWS - 1, MATRIX_COLS - 1) < SECTOR_MAX as u8);
    }

    #[test]
    fn test_select_rejects_unknown_sector() {
        let (mut matrix, _, _) = recording_matrix();
        let mut sectors = SectorControl::new();

        sectors.select(3, &mut matrix).unwrap();
        assert_eq!(sectors.select(8, &mut matrix), Err(InvalidSector(8)));
        assert_eq!(sectors.cursor(), 3);
    }

    #[test]
    fn test_selection_is_sticky() {
        let (mut matrix, _, _) = recording_matrix();
        let mut sectors = SectorControl::new();
        let color = Hsv::new(0, 255, 255);

        sectors.select(SECTOR_ALPHA, &mut matrix).unwrap();
        sectors.set_selected_enabled(true, &mut matrix);
        sectors.select(SECTOR_SPACE, &mut matrix).unwrap();
        sectors.set_selected_hsv_color(color, &mut matrix);

        let alpha = first_key_of(SECTOR_ALPHA);
        let space = first_key_of(SECTOR_SPACE);

        assert!(is_lit(&matrix, alpha));
        assert!(!is_lit(&matrix, space));
        assert_eq!(pixel_of(&matrix, space), color.to_rgb());
        assert_eq!(pixel_of(&matrix, alpha), BLACK);
        assert_eq!(sectors.cursor(), SECTOR_SPACE);
        assert_eq!(sectors.color(SECTOR_SPACE), Some(color));
    }

    #[test]
    fn test_disable_selected_sector() {
        let (mut matrix, _, _) = recording_matrix();
        let mut sectors = SectorControl::new();
        matrix.enable_all_leds();

        sectors.select(SECTOR_ARROWS, &mut matrix).unwrap();
        sectors.set_selected_enabled(false, &mut matrix);

        assert!(!sectors.is_enabled(SECTOR_ARROWS));
        assert!(sectors.is_enabled(SECTOR_SPACE));
        assert!(!is_lit(&matrix, first_key_of(SECTOR_ARROWS)));
        assert!(is_lit(&matrix, first_key_of(SECTOR_SPACE)));
    }

    #[test]
    fn test_apply_all_keeps_cursor_mask() {
        let (mut matrix, _, _) = recording_matrix();
        let mut sectors = SectorControl::new();
        sectors.select(SECTOR_ESCAPE, &mut matrix).unwrap();
        sectors.set_selected_hsv_color(Hsv::new(0, 255, 255), &mut matrix);

        sectors.apply_all(&mut matrix);

        assert!(is_lit(&matrix, first_key_of(SECTOR_NUMBER_ROW)));
        assert_eq!(
            pixel_of(&matrix, first_key_of(SECTOR_ESCAPE)),
            Hsv::new(0, 255, 255).to_rgb()
        );
        assert_eq!(
            matrix.device(Device::Upper).device().buffer().mask_buffer(),
            &sectors.mask(SECTOR_ESCAPE).unwrap().upper
        );
    }

    #[test]
    fn test_save_and_load_state() {
        let (mut matrix, _, _) = recording_matrix();
        let mut store = BacklightStore::new(MemoryStore::<512>::new(), StoreLayout::default());
        let mut sectors = SectorControl::new();

        sectors.select(1, &mut matrix).unwrap();
        sectors.set_selected_enabled(false, &mut matrix);
        sectors.set_selected_hsv_color(Hsv::new(120, 200, 128), &mut matrix);
        sectors.save_state(&mut store).unwrap();

        let mut restored = SectorControl::new();
        restored.load_state(&mut store).unwrap();
        assert!(!restored.is_enabled(1));
        assert!(restored.is_enabled(0));
        assert_eq!(restored.color(1), Some(Hsv::new(120, 200, 128)));
        assert_eq!(restored.record(), sectors.record());
    }

    #[test]
    fn test_custom_map_loads_stored_pwm() {
        let (mut matrix, _, _) = recording_matrix();
        let mut store = BacklightStore::new(MemoryStore::<512>::new(), StoreLayout::default());
        let mut sectors = SectorControl::new();

        matrix.fill(0x11);
        sectors.save_custom_pwm_map(&matrix, &mut store).unwrap();
        matrix.fill(0);

        sectors.set_custom_map(1, &mut matrix, &mut store).unwrap();
        assert_eq!(sectors.custom_map(), 1);
        assert_eq!(
            matrix.device(Device::Lower).device().buffer().get_pwm(3, 3),
            0x11
        );
        assert!(is_lit(&matrix, first_key_of(SECTOR_SPACE)));

        sectors.set_custom_map(0, &mut matrix, &mut store).unwrap();
        assert_eq!(sectors.custom_map(), 0);
    }

    #[test]
    fn test_clear_store_restores_defaults() {
        let (mut matrix, _, _) = recording_matrix();
        let mut store = BacklightStore::new(MemoryStore::<512>::new(), StoreLayout::default());
        let mut sectors = SectorControl::new();

        sectors.select(SECTOR_ALPHA, &mut matrix).unwrap();
        sectors.set_selected_enabled(false, &mut matrix);
        sectors.save_state(&mut store).unwrap();

        sectors.clear_store(&mut store).unwrap();
        assert!(sectors.is_enabled(SECTOR_ALPHA));
        assert_eq!(sectors.record(), SectorRecord::default());
        assert_eq!(store.read_sectors().unwrap(), SectorRecord::default());
    }
}
