//! Fixed point lookup tables.

/// One sine period over 256 steps, scaled to `0..=3071`.
pub static SIN_LUT: [u16; 256] = [
    1536, 1573, 1611, 1648, 1686, 1723, 1761, 1798, 1835, 1872, 1909, 1945,
    1981, 2017, 2053, 2088, 2123, 2158, 2192, 2226, 2259, 2292, 2325, 2357,
    2389, 2420, 2450, 2480, 2510, 2538, 2567, 2594, 2621, 2648, 2673, 2698,
    2722, 2746, 2769, 2791, 2812, 2833, 2853, 2872, 2890, 2907, 2924, 2939,
    2954, 2968, 2981, 2994, 3005, 3015, 3025, 3034, 3041, 3048, 3054, 3059,
    3064, 3067, 3069, 3071, 3071, 3071, 3069, 3067, 3064, 3059, 3054, 3048,
    3041, 3034, 3025, 3015, 3005, 2994, 2981, 2968, 2954, 2939, 2924, 2907,
    2890, 2872, 2853, 2833, 2812, 2791, 2769, 2746, 2722, 2698, 2673, 2648,
    2621, 2594, 2567, 2538, 2510, 2480, 2450, 2420, 2389, 2357, 2325, 2292,
    2259, 2226, 2192, 2158, 2123, 2088, 2053, 2017, 1981, 1945, 1909, 1872,
    1835, 1798, 1761, 1723, 1686, 1648, 1611, 1573, 1536, 1498, 1460, 1423,
    1385, 1348, 1310, 1273, 1236, 1199, 1162, 1126, 1090, 1054, 1018, 983,
    948, 913, 879, 845, 812, 779, 746, 714, 682, 651, 621, 591,
    561, 533, 504, 477, 450, 423, 398, 373, 349, 325, 302, 280,
    259, 238, 218, 199, 181, 164, 147, 132, 117, 103, 90, 77,
    66, 56, 46, 37, 30, 23, 17, 12, 7, 4, 2, 0,
    0, 0, 2, 4, 7, 12, 17, 23, 30, 37, 46, 56,
    66, 77, 90, 103, 117, 132, 147, 164, 181, 199, 218, 238,
    259, 280, 302, 325, 349, 373, 398, 423, 450, 477, 504, 533,
    561, 591, 621, 651, 682, 714, 746, 779, 812, 845, 879, 913,
    948, 983, 1018, 1054, 1090, 1126, 1162, 1199, 1236, 1273, 1310, 1348,
    1385, 1423, 1460, 1498,
];

/// Number of colours in [`PLASMA_PALETTE`].
pub const PALETTE_SIZE: usize = 256 * 3;

/// Hue ramp red -> green -> blue -> red.
pub static PLASMA_PALETTE: [[u8; 3]; PALETTE_SIZE] = build_palette();

const fn build_palette() -> [[u8; 3]; PALETTE_SIZE] {
    let mut palette = [[0; 3]; PALETTE_SIZE];

    let mut i = 0;
    while i < 256 {
        let up = i as u8;
        let down = 255 - up;
        palette[i] = [down, up, 0];
        palette[256 + i] = [0, down, up];
        palette[512 + i] = [up, 0, down];
        i += 1;
    }

    palette
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sin_lut_shape() {
        assert_eq!(SIN_LUT[0], 1536);
        assert_eq!(SIN_LUT[64], 3071);
        assert_eq!(SIN_LUT[192], 0);
        assert_eq!(SIN_LUT[255], 1498);
    }

    #[test]
    fn test_palette_wraps_around() {
        assert_eq!(PLASMA_PALETTE[0], [255, 0, 0]);
        assert_eq!(PLASMA_PALETTE[255], [0, 255, 0]);
        assert_eq!(PLASMA_PALETTE[511], [0, 0, 255]);
        assert_eq!(PLASMA_PALETTE[767], [255, 0, 0]);
    }
}
