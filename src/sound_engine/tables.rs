//! Static lookup tables shared by the oscillator bank and the sequencer.

/// One full sine period, 256 unsigned 8-bit steps centred on 128.
pub const SINE_TABLE: [u8; 256] = [
    128, 131, 134, 137, 140, 143, 146, 149, 152, 155, 158, 162, 165, 167, 170, 173,
    176, 179, 182, 185, 188, 190, 193, 196, 198, 201, 203, 206, 208, 211, 213, 215,
    218, 220, 222, 224, 226, 228, 230, 232, 234, 235, 237, 238, 240, 241, 243, 244,
    245, 246, 248, 249, 250, 250, 251, 252, 253, 253, 254, 254, 254, 255, 255, 255,
    255, 255, 255, 255, 254, 254, 254, 253, 253, 252, 251, 250, 250, 249, 248, 246,
    245, 244, 243, 241, 240, 238, 237, 235, 234, 232, 230, 228, 226, 224, 222, 220,
    218, 215, 213, 211, 208, 206, 203, 201, 198, 196, 193, 190, 188, 185, 182, 179,
    176, 173, 170, 167, 165, 162, 158, 155, 152, 149, 146, 143, 140, 137, 134, 131,
    128, 124, 121, 118, 115, 112, 109, 106, 103, 100, 97, 93, 90, 88, 85, 82,
    79, 76, 73, 70, 67, 65, 62, 59, 57, 54, 52, 49, 47, 44, 42, 40,
    37, 35, 33, 31, 29, 27, 25, 23, 21, 20, 18, 17, 15, 14, 12, 11,
    10, 9, 7, 6, 5, 5, 4, 3, 2, 2, 1, 1, 1, 0, 0, 0,
    0, 0, 0, 0, 1, 1, 1, 2, 2, 3, 4, 5, 5, 6, 7, 9,
    10, 11, 12, 14, 15, 17, 18, 20, 21, 23, 25, 27, 29, 31, 33, 35,
    37, 40, 42, 44, 47, 49, 52, 54, 57, 59, 62, 65, 67, 70, 73, 76,
    79, 82, 85, 88, 90, 93, 97, 100, 103, 106, 109, 112, 115, 118, 121, 124,
];

/// Top octave (C-7 up to and including C-8) in 1/1024 Hz, equal temperament, A-4 = 440 Hz.
///
/// Lower octaves are derived by shifting right, so every note in the range
/// shares the same rounding behaviour.
pub const FREQUENCY_TABLE: [u32; 13] = [
    2143237, 2270680, 2405702, 2548752, 2700309, 2860878, 3030994, 3211227, 3402176, 3604480,
    3818814, 4045892, 4286473,
];

/// Octave whose frequencies are stored in [`FREQUENCY_TABLE`]
pub const FREQUENCY_TABLE_OCTAVE: u32 = 7;

/// Signed sine lookup in the range -128..=127
#[inline]
pub fn sine_signed(position: u8) -> i32 {
    SINE_TABLE[position as usize] as i32 - 128
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_table_symmetry() {
        // Half a period apart the table mirrors around the centre line
        for i in 1..128 {
            let a = SINE_TABLE[i] as i32 - 128;
            let b = SINE_TABLE[i + 128] as i32 - 128;
            assert!((a + b).abs() <= 1, "asymmetry at {i}: {a} vs {b}");
        }
    }

    #[test]
    fn test_frequency_table_monotonic() {
        for pair in FREQUENCY_TABLE.windows(2) {
            assert!(pair[1] > pair[0]);
        }
        // C-8 is exactly one octave above C-7 (within rounding)
        let ratio = FREQUENCY_TABLE[12] as f64 / FREQUENCY_TABLE[0] as f64;
        approx::assert_relative_eq!(ratio, 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_a4_reference() {
        // A-7 shifted down three octaves is A-4 = 440 Hz
        let a4 = FREQUENCY_TABLE[9] >> 3;
        approx::assert_relative_eq!(a4 as f64 / 1024.0, 440.0, epsilon = 0.01);
    }
}
