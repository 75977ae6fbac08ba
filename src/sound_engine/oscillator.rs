//! Oscillator bank
//!
//! Each voice owns a 22-bit phase accumulator. The raw waveform is derived
//! from the accumulator every sample; several basis waveforms can be enabled
//! at once, in which case their outputs are bitwise-ANDed together.

use bitflags::bitflags;

use super::tables::SINE_TABLE;

/// Width of the phase accumulator in bits
pub const ACC_BITS: u32 = 22;
/// Accumulator modulus
pub const ACC_LENGTH: u32 = 1 << ACC_BITS;
/// Mask applied after every accumulator step
pub const ACC_MASK: u32 = ACC_LENGTH - 1;

/// Width of a raw oscillator sample in bits
pub const WAVE_BITS: u32 = 12;
/// Number of raw oscillator levels
pub const WAVE_AMP: u32 = 1 << WAVE_BITS;
/// Largest raw oscillator sample
pub const WAVE_MAX: u32 = WAVE_AMP - 1;

/// Pulse width range (0x000..=0xFFF)
pub const MAX_PULSE_WIDTH: u16 = 0xFFF;

const NOISE_TAPS: u32 = (1 << 21) | (1 << 16);
const NOISE_MASK: u32 = (1 << 22) - 1;
const METAL_TAPS: u32 = (1 << 13) | (1 << 7);
const METAL_MASK: u32 = (1 << 14) - 1;

/// Noise is clocked 32 times per oscillator period
const NOISE_CLOCK_SHIFT: u32 = ACC_BITS - 5;

const NOISE_SEED: u32 = 0x2A_5D3B;
const METAL_SEED: u32 = 0x1ACE;

bitflags! {
    /// Basis waveforms of one voice
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Waveform: u8 {
        /// 22-bit LFSR noise
        const NOISE = 0x01;
        /// Variable-width pulse
        const PULSE = 0x02;
        /// Triangle
        const TRIANGLE = 0x04;
        /// Rising sawtooth
        const SAW = 0x08;
        /// Short-period (14-bit LFSR) noise
        const NOISE_METAL = 0x10;
        /// Table sine
        const SINE = 0x20;
    }
}

/// Phase accumulator and noise registers of a single voice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Oscillator {
    /// Current phase (wraps modulo 2^22)
    pub accumulator: u32,
    /// Per-sample phase increment
    pub frequency_step: u32,
    /// Pulse width (0x000..=0xFFF)
    pub pulse_width: u16,
    /// Enabled basis waveforms
    pub waveform: Waveform,
    lfsr: u32,
    lfsr_metal: u32,
    noise_clock: u32,
    /// Set when the last step wrapped the accumulator (drives hard sync)
    pub wrapped: bool,
}

impl Default for Oscillator {
    fn default() -> Self {
        Self::new()
    }
}

impl Oscillator {
    /// Create a silent oscillator with a 50% pulse width
    pub const fn new() -> Self {
        Self {
            accumulator: 0,
            frequency_step: 0,
            pulse_width: 0x800,
            waveform: Waveform::empty(),
            lfsr: NOISE_SEED,
            lfsr_metal: METAL_SEED,
            noise_clock: 0,
            wrapped: false,
        }
    }

    /// Phase step for a frequency given in 1/1024 Hz
    #[inline]
    pub fn step_for(frequency: u32, sample_rate: u32) -> u32 {
        if sample_rate == 0 {
            return 0;
        }
        let step = (frequency as u64 * ACC_LENGTH as u64) / (sample_rate as u64 * 1024);
        step.min(ACC_MASK as u64) as u32
    }

    /// Reset phase and noise registers (key sync / phase reset)
    pub fn reset_phase(&mut self) {
        self.accumulator = 0;
        self.noise_clock = 0;
        self.lfsr = NOISE_SEED;
        self.lfsr_metal = METAL_SEED;
    }

    /// Advance the accumulator by one sample
    #[inline]
    pub fn advance(&mut self) {
        let next = self.accumulator + self.frequency_step;
        self.wrapped = next > ACC_MASK;
        self.accumulator = next & ACC_MASK;

        let clock = self.accumulator >> NOISE_CLOCK_SHIFT;
        if clock != self.noise_clock {
            self.noise_clock = clock;
            if self.waveform.contains(Waveform::NOISE) {
                self.lfsr = galois_step(self.lfsr, NOISE_TAPS, NOISE_MASK);
            }
            if self.waveform.contains(Waveform::NOISE_METAL) {
                self.lfsr_metal = galois_step(self.lfsr_metal, METAL_TAPS, METAL_MASK);
            }
        }
    }

    /// Raw 12-bit output of the enabled waveforms
    ///
    /// Returns 0 when no waveform is enabled.
    #[inline]
    pub fn output(&self) -> u32 {
        if self.waveform.is_empty() {
            return 0;
        }
        self.waveform
            .iter()
            .fold(WAVE_MAX, |acc, basis| acc & self.basis_output(basis))
    }

    fn basis_output(&self, basis: Waveform) -> u32 {
        let acc = self.accumulator;
        if basis == Waveform::PULSE {
            let width = if self.pulse_width >= MAX_PULSE_WIDTH {
                0x1000
            } else {
                self.pulse_width as u32
            };
            if (acc >> (ACC_BITS - WAVE_BITS)) >= width {
                WAVE_MAX
            } else {
                0
            }
        } else if basis == Waveform::TRIANGLE {
            let folded = if acc & (1 << (ACC_BITS - 1)) != 0 {
                !acc & ACC_MASK
            } else {
                acc
            };
            (folded >> (ACC_BITS - WAVE_BITS - 1)) & WAVE_MAX
        } else if basis == Waveform::SAW {
            acc >> (ACC_BITS - WAVE_BITS)
        } else if basis == Waveform::NOISE {
            self.lfsr & WAVE_MAX
        } else if basis == Waveform::NOISE_METAL {
            self.lfsr_metal & WAVE_MAX
        } else if basis == Waveform::SINE {
            (SINE_TABLE[(acc >> (ACC_BITS - 8)) as usize] as u32) << 4
        } else {
            WAVE_MAX
        }
    }
}

/// One Galois LFSR step: shift right, XOR the taps in when the LSB falls out
#[inline]
fn galois_step(state: u32, taps: u32, mask: u32) -> u32 {
    let lsb = state & 1;
    let mut next = state >> 1;
    if lsb != 0 {
        next ^= taps;
    }
    let next = next & mask;
    // An all-zero register would lock up
    if next == 0 {
        1
    } else {
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn osc(waveform: Waveform, step: u32) -> Oscillator {
        let mut osc = Oscillator::new();
        osc.waveform = waveform;
        osc.frequency_step = step;
        osc
    }

    #[test]
    fn test_accumulator_wraps() {
        let mut o = osc(Waveform::SAW, ACC_LENGTH / 4 + 1);
        for _ in 0..4 {
            o.advance();
        }
        assert!(o.wrapped);
        assert_eq!(o.accumulator, 4);
    }

    #[test]
    fn test_pulse_half_duty() {
        let mut o = osc(Waveform::PULSE, ACC_LENGTH / 1000);
        o.pulse_width = 0x800;
        let mut high = 0;
        for _ in 0..1000 {
            o.advance();
            if o.output() == WAVE_MAX {
                high += 1;
            }
        }
        assert!((499..=501).contains(&high), "high count {high}");
    }

    #[test]
    fn test_pulse_full_width_is_silent() {
        let mut o = osc(Waveform::PULSE, 12345);
        o.pulse_width = MAX_PULSE_WIDTH;
        for _ in 0..2000 {
            o.advance();
            assert_eq!(o.output(), 0);
        }
    }

    #[test]
    fn test_triangle_peaks_at_midpoint() {
        let mut o = osc(Waveform::TRIANGLE, 0);
        o.accumulator = (1 << (ACC_BITS - 1)) - 1;
        assert_eq!(o.output(), WAVE_MAX);
        o.accumulator = 0;
        assert_eq!(o.output(), 0);
        o.accumulator = ACC_MASK;
        assert_eq!(o.output(), 0);
    }

    #[test]
    fn test_saw_uses_top_bits() {
        let mut o = osc(Waveform::SAW, 0);
        o.accumulator = ACC_MASK;
        assert_eq!(o.output(), WAVE_MAX);
        o.accumulator = 1 << (ACC_BITS - 1);
        assert_eq!(o.output(), 0x800);
    }

    #[test]
    fn test_combined_waveform_is_bitwise_and() {
        let mut o = osc(Waveform::SAW | Waveform::TRIANGLE, 0);
        o.accumulator = 0x12_3456;
        let saw = o.basis_output(Waveform::SAW);
        let tri = o.basis_output(Waveform::TRIANGLE);
        assert_eq!(o.output(), saw & tri);
    }

    #[test]
    fn test_noise_varies_and_is_deterministic() {
        let mut a = osc(Waveform::NOISE, ACC_LENGTH / 64);
        let mut b = a;
        let mut seen = std::collections::HashSet::new();
        for _ in 0..256 {
            a.advance();
            b.advance();
            assert_eq!(a.output(), b.output());
            seen.insert(a.output());
        }
        assert!(seen.len() > 16, "noise produced only {} values", seen.len());
    }

    #[test]
    fn test_metal_noise_stays_within_register_width() {
        let mut o = osc(Waveform::NOISE_METAL, ACC_LENGTH / 40);
        for _ in 0..10_000 {
            o.advance();
            assert!(o.lfsr_metal <= METAL_MASK);
            assert_ne!(o.lfsr_metal, 0);
        }
    }

    #[test]
    fn test_step_for_440hz() {
        let step = Oscillator::step_for(440 * 1024, 44_100);
        assert_eq!(step, 41_847);
    }
}
