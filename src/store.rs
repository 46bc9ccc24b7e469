//! Persisted backlight state on a byte addressed non-volatile store.
//!
//! Layout, relative to [`StoreLayout::base`]:
//!
//! | offset | size | content                                         |
//! |--------|------|-------------------------------------------------|
//! | 0      | 1    | enabled sectors, bit `n` for sector `n`         |
//! | 1      | 24   | sector colours, `h s v` per sector              |
//! | 25     | 1    | custom PWM map selector                         |
//! | 26     | 192  | custom PWM map of the lower chip                |
//! | 218    | 192  | custom PWM map of the upper chip                |
//! | 410    | 12   | animation: kind, delay (LE), hsv, hsv2, rgb     |

use embedded_storage::{ReadStorage, Storage};

use crate::{
    color::{Hsv, RGB8},
    led_map::Device,
    PWM_SIZE,
};

pub const SECTOR_COUNT: usize = 8;

const SECTOR_ENABLED: u32 = 0;
const SECTOR_COLORS: u32 = 1;
const CUSTOM_MAP: u32 = SECTOR_COLORS + 3 * SECTOR_COUNT as u32;
const CUSTOM_PWM: u32 = CUSTOM_MAP + 1;
const ANIMATION: u32 = CUSTOM_PWM + 2 * PWM_SIZE as u32;
const ANIMATION_SIZE: usize = 12;

/// Where the backlight state lives inside the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLayout {
    base: u32,
}

impl StoreLayout {
    /// Number of bytes used, starting at `base`.
    pub const SIZE: u32 = ANIMATION + ANIMATION_SIZE as u32;

    pub const fn new(base: u32) -> Self {
        StoreLayout { base }
    }

    pub const fn base(&self) -> u32 {
        self.base
    }

    const fn custom_pwm(&self, device: Device) -> u32 {
        match device {
            Device::Lower => self.base + CUSTOM_PWM,
            Device::Upper => self.base + CUSTOM_PWM + PWM_SIZE as u32,
        }
    }
}

impl Default for StoreLayout {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Sector enable flags, colours and the custom map selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorRecord {
    pub enabled: u8,
    pub colors: [Hsv; SECTOR_COUNT],
    pub custom_map: u8,
}

impl Default for SectorRecord {
    fn default() -> Self {
        SectorRecord {
            enabled: 0xff,
            colors: [Hsv::new(0, 0, 255); SECTOR_COUNT],
            custom_map: 0,
        }
    }
}

/// Selected animation and its settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationRecord {
    pub kind: u8,
    pub delay_ms: u16,
    pub hsv: Hsv,
    pub hsv2: Hsv,
    pub rgb: RGB8,
}

impl Default for AnimationRecord {
    fn default() -> Self {
        AnimationRecord {
            kind: 0,
            delay_ms: 40,
            hsv: Hsv::new(0, 255, 255),
            hsv2: Hsv::new(128, 255, 255),
            rgb: RGB8::new(255, 255, 255),
        }
    }
}

/// Typed access to the backlight area of a [`Storage`].
pub struct BacklightStore<S> {
    storage: S,
    layout: StoreLayout,
}

impl<S: Storage> BacklightStore<S> {
    pub fn new(storage: S, layout: StoreLayout) -> Self {
        BacklightStore { storage, layout }
    }

    pub fn layout(&self) -> StoreLayout {
        self.layout
    }

    pub fn release(self) -> S {
        self.storage
    }

    pub fn read_sectors(&mut self) -> Result<SectorRecord, S::Error> {
        let mut bytes = [0u8; 1 + 3 * SECTOR_COUNT + 1];
        self.storage
            .read(self.layout.base + SECTOR_ENABLED, &mut bytes)?;

        let mut colors = [Hsv::default(); SECTOR_COUNT];
        for (color, hsv) in colors.iter_mut().zip(bytes[1..].chunks_exact(3)) {
            *color = Hsv::new(hsv[0], hsv[1], hsv[2]);
        }

        Ok(SectorRecord {
            enabled: bytes[0],
            colors,
            custom_map: bytes[1 + 3 * SECTOR_COUNT],
        })
    }

    pub fn write_sectors(&mut self, record: &SectorRecord) -> Result<(), S::Error> {
        let mut bytes = [0u8; 1 + 3 * SECTOR_COUNT + 1];
        bytes[0] = record.enabled;
        for (hsv, color) in bytes[1..].chunks_exact_mut(3).zip(record.colors.iter()) {
            hsv.copy_from_slice(&[color.h, color.s, color.v]);
        }
        bytes[1 + 3 * SECTOR_COUNT] = record.custom_map;

        self.storage.write(self.layout.base + SECTOR_ENABLED, &bytes)
    }

    pub fn read_custom_pwm(
        &mut self,
        device: Device,
        pwm: &mut [u8; PWM_SIZE],
    ) -> Result<(), S::Error> {
        self.storage.read(self.layout.custom_pwm(device), pwm)
    }

    pub fn write_custom_pwm(&mut self, device: Device, pwm: &[u8; PWM_SIZE]) -> Result<(), S::Error> {
        self.storage.write(self.layout.custom_pwm(device), pwm)
    }

    pub fn read_animation(&mut self) -> Result<AnimationRecord, S::Error> {
        let mut bytes = [0u8; ANIMATION_SIZE];
        self.storage.read(self.layout.base + ANIMATION, &mut bytes)?;

        Ok(AnimationRecord {
            kind: bytes[0],
            delay_ms: u16::from_le_bytes([bytes[1], bytes[2]]),
            hsv: Hsv::new(bytes[3], bytes[4], bytes[5]),
            hsv2: Hsv::new(bytes[6], bytes[7], bytes[8]),
            rgb: RGB8::new(bytes[9], bytes[10], bytes[11]),
        })
    }

    pub fn write_animation(&mut self, record: &AnimationRecord) -> Result<(), S::Error> {
        let [delay_lo, delay_hi] = record.delay_ms.to_le_bytes();
        let bytes = [
            record.kind,
            delay_lo,
            delay_hi,
            record.hsv.h,
            record.hsv.s,
            record.hsv.v,
            record.hsv2.h,
            record.hsv2.s,
            record.hsv2.v,
            record.rgb.r,
            record.rgb.g,
            record.rgb.b,
        ];

        self.storage.write(self.layout.base + ANIMATION, &bytes)
    }

    /// Resets the whole backlight area to defaults.
    pub fn clear(&mut self) -> Result<(), S::Error> {
        self.write_sectors(&SectorRecord::default())?;
        self.write_custom_pwm(Device::Lower, &[0; PWM_SIZE])?;
        self.write_custom_pwm(Device::Upper, &[0; PWM_SIZE])?;
        self.write_animation(&AnimationRecord::default())
    }
}

/// Access outside of a [`MemoryStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutOfBounds;

/// A RAM backed store, erased to `0xff`.
#[derive(Debug, Clone)]
pub struct MemoryStore<const N: usize> {
    data: [u8; N],
}

impl<const N: usize> MemoryStore<N> {
    pub const fn new() -> Self {
        MemoryStore { data: [0xff; N] }
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.data
    }

    fn range(offset: u32, len: usize) -> Result<core::ops::Range<usize>, OutOfBounds> {
        let start = offset as usize;
        let end = start.checked_add(len).ok_or(OutOfBounds)?;
        if end > N {
            return Err(OutOfBounds);
        }
        Ok(start..end)
    }
}

impl<const N: usize> Default for MemoryStore<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ReadStorage for MemoryStore<N> {
    type Error = OutOfBounds;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let range = Self::range(offset, bytes.len())?;
        bytes.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Storage for MemoryStore<N> {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let range = Self::range(offset, bytes.len())?;
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: usize = 512;

    #[test]
    fn test_layout_fits() {
        assert_eq!(StoreLayout::SIZE, 422);
        assert!(StoreLayout::SIZE as usize <= SIZE);
    }

    #[test]
    fn test_sector_record_layout() {
        let mut store = BacklightStore::new(MemoryStore::<SIZE>::new(), StoreLayout::new(16));
        let mut record = SectorRecord::default();
        record.enabled = 0b1000_0010;
        record.colors[1] = Hsv::new(120, 200, 128);
        record.custom_map = 2;

        store.write_sectors(&record).unwrap();
        assert_eq!(store.read_sectors().unwrap(), record);

        let bytes = store.release();
        let bytes = bytes.as_bytes();
        assert_eq!(bytes[15], 0xff);
        assert_eq!(bytes[16], 0b1000_0010);
        assert_eq!(&bytes[16 + 4..16 + 7], &[120, 200, 128]);
        assert_eq!(bytes[16 + 25], 2);
    }

    #[test]
    fn test_custom_pwm_lower_before_upper() {
        let mut store = BacklightStore::new(MemoryStore::<SIZE>::new(), StoreLayout::default());
        store.write_custom_pwm(Device::Lower, &[1; PWM_SIZE]).unwrap();
        store.write_custom_pwm(Device::Upper, &[2; PWM_SIZE]).unwrap();

        let mut pwm = [0; PWM_SIZE];
        store.read_custom_pwm(Device::Upper, &mut pwm).unwrap();
        assert_eq!(pwm, [2; PWM_SIZE]);

        let memory = store.release();
        assert_eq!(memory.as_bytes()[26], 1);
        assert_eq!(memory.as_bytes()[26 + 192], 2);
    }

    #[test]
    fn test_animation_record_delay_little_endian() {
        let mut store = BacklightStore::new(MemoryStore::<SIZE>::new(), StoreLayout::default());
        let record = AnimationRecord {
            kind: 3,
            delay_ms: 0x0102,
            ..AnimationRecord::default()
        };

        store.write_animation(&record).unwrap();
        assert_eq!(store.read_animation().unwrap(), record);

        let memory = store.release();
        assert_eq!(&memory.as_bytes()[410..413], &[3, 0x02, 0x01]);
    }

    #[test]
    fn test_clear_writes_defaults() {
        let mut store = BacklightStore::new(MemoryStore::<SIZE>::new(), StoreLayout::default());
        store.clear().unwrap();

        assert_eq!(store.read_sectors().unwrap(), SectorRecord::default());
        assert_eq!(store.read_animation().unwrap(), AnimationRecord::default());
    }

    #[test]
    fn test_memory_store_bounds() {
        let mut memory = MemoryStore::<8>::new();
        assert_eq!(memory.write(6, &[1, 2, 3]), Err(OutOfBounds));
        assert_eq!(memory.write(5, &[1, 2, 3]), Ok(()));

        let mut store = BacklightStore::new(memory, StoreLayout::default());
        assert_eq!(store.read_animation(), Err(OutOfBounds));
    }
}
