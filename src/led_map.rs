//! Static map from key matrix coordinates to the RGB pixel lighting that key.
//!
//! The key rows 0..3 are wired to the upper chip, rows 3..6 to the lower one. Within a
//! chip, keys are chained in matrix order and every key takes the next three PWM
//! bytes, so key `k` of a chip starts at PWM offset `3 * k`.

use crate::CS;

pub const MATRIX_ROWS: usize = 6;
pub const MATRIX_COLS: usize = 17;

/// Key rows driven by the upper chip.
const UPPER_KEY_ROWS: usize = 3;

/// Keys populated in each matrix row, bit `n` standing for column `n`.
const KEYS_PRESENT: [u32; MATRIX_ROWS] = [
    0b1_1111_1111_1111_1101,
    0b1_1111_1111_1111_1111,
    0b1_1111_1111_1111_1111,
    0b0_0010_1111_1111_1111,
    0b0_1001_1111_1111_1101,
    0b1_1111_1100_0100_0111,
];

/// Chip of the pair. On the wire the lower chip is `0`, anything else selects the
/// upper chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Device {
    Upper,
    Lower,
}

impl Device {
    pub fn from_wire(value: u8) -> Self {
        if value == 0 {
            Device::Lower
        } else {
            Device::Upper
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            Device::Lower => 0,
            Device::Upper => 1,
        }
    }
}

/// Physical location of a key's RGB pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedPosition {
    pub device: Device,
    /// Switch line of the pixel's first PWM byte
    pub row: u8,
    /// Current sink of the pixel's first PWM byte
    pub col: u8,
}

impl LedPosition {
    /// Offset of the pixel's first PWM byte.
    pub const fn offset(&self) -> usize {
        self.row as usize * CS + self.col as usize
    }
}

const fn build_led_map() -> [[Option<LedPosition>; MATRIX_COLS]; MATRIX_ROWS] {
    let mut map = [[None; MATRIX_COLS]; MATRIX_ROWS];
    let mut upper_keys = 0;
    let mut lower_keys = 0;

    let mut row = 0;
    while row < MATRIX_ROWS {
        let mut col = 0;
        while col < MATRIX_COLS {
            if KEYS_PRESENT[row] & (1 << col) != 0 {
                let (device, key) = if row < UPPER_KEY_ROWS {
                    upper_keys += 1;
                    (Device::Upper, upper_keys - 1)
                } else {
                    lower_keys += 1;
                    (Device::Lower, lower_keys - 1)
                };

                let offset = key * 3;
                map[row][col] = Some(LedPosition {
                    device,
                    row: (offset / CS) as u8,
                    col: (offset % CS) as u8,
                });
            }
            col += 1;
        }
        row += 1;
    }

    map
}

static LED_MAP: [[Option<LedPosition>; MATRIX_COLS]; MATRIX_ROWS] = build_led_map();

/// Pixel of the key at (`row`, `col`), `None` for positions without a key.
pub fn led_position(row: usize, col: usize) -> Option<LedPosition> {
    LED_MAP.get(row)?.get(col).copied().flatten()
}

/// All keys with a backlight pixel as `(row, col, position)`.
pub fn keys() -> impl Iterator<Item = (usize, usize, LedPosition)> {
    LED_MAP.iter().enumerate().flat_map(|(row, cols)| {
        cols.iter()
            .enumerate()
            .filter_map(move |(col, position)| position.map(|position| (row, col, position)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PWM_SIZE;

    #[test]
    fn test_first_keys() {
        assert_eq!(
            led_position(0, 0),
            Some(LedPosition {
                device: Device::Upper,
                row: 0,
                col: 0
            })
        );
        assert_eq!(led_position(0, 1), None);
        assert_eq!(
            led_position(0, 2),
            Some(LedPosition {
                device: Device::Upper,
                row: 0,
                col: 3
            })
        );
        assert_eq!(
            led_position(3, 0),
            Some(LedPosition {
                device: Device::Lower,
                row: 0,
                col: 0
            })
        );
    }

    #[test]
    fn test_out_of_matrix_is_absent() {
        assert_eq!(led_position(MATRIX_ROWS, 0), None);
        assert_eq!(led_position(0, MATRIX_COLS), None);
    }

    #[test]
    fn test_pixels_fit_and_do_not_overlap() {
        for device in [Device::Upper, Device::Lower] {
            let mut used = [false; PWM_SIZE];
            for (_, _, position) in keys().filter(|(_, _, p)| p.device == device) {
                for offset in position.offset()..position.offset() + 3 {
                    assert!(offset < PWM_SIZE);
                    assert!(!used[offset], "{device:?} offset {offset} used twice");
                    used[offset] = true;
                }
            }
        }
    }

    #[test]
    fn test_key_counts() {
        assert_eq!(keys().filter(|(_, _, p)| p.device == Device::Upper).count(), 50);
        assert_eq!(keys().filter(|(_, _, p)| p.device == Device::Lower).count(), 37);
    }

    #[test]
    fn test_device_wire_numbering() {
        assert_eq!(Device::from_wire(0), Device::Lower);
        assert_eq!(Device::from_wire(1), Device::Upper);
        assert_eq!(Device::from_wire(7), Device::Upper);
        assert_eq!(Device::Lower.to_wire(), 0);
    }
}
