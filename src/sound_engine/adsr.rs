//! ADSR envelope generator
//!
//! The envelope is a 17-bit fractional fixed-point value stepped once per
//! output sample. Stage rates are converted with [`envelope_speed`] so that
//! the 0..=255 rate parameter behaves like a musical time constant rather
//! than a linear slope.

/// Fractional bits of the envelope value
pub const ADSR_FRACTION_BITS: u32 = 17;
/// Full-scale envelope level
pub const MAX_ADSR: u32 = 0xFF << ADSR_FRACTION_BITS;
/// Full-scale channel volume
pub const MAX_ADSR_VOLUME: u8 = 0x80;
/// Reference sample rate the rate parameters are tuned for
pub const BASE_FREQ: u32 = 22_050;

/// Envelope stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdsrState {
    /// Rising towards full scale
    Attack,
    /// Falling towards the sustain level
    Decay,
    /// Holding the sustain level until released
    Sustain,
    /// Falling towards silence
    Release,
    /// Silent, gate closed
    #[default]
    Done,
}

/// Per-sample envelope increment for a stage rate
///
/// `rate == 0` reaches full scale within one sample at [`BASE_FREQ`].
#[inline]
pub fn envelope_speed(rate: u8, sample_rate: u32) -> u32 {
    let rate = rate as u64;
    let slope = (MAX_ADSR as u64) / (rate * rate).max(1);
    let scaled = slope * BASE_FREQ as u64 / sample_rate.max(1) as u64;
    scaled.clamp(1, MAX_ADSR as u64) as u32
}

/// Envelope state machine of a single voice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adsr {
    /// Attack rate
    pub a: u8,
    /// Decay rate
    pub d: u8,
    /// Sustain level (0..=255)
    pub s: u8,
    /// Release rate
    pub r: u8,
    /// Channel volume (0..=[`MAX_ADSR_VOLUME`])
    pub volume: u8,
    /// Current level (0..=[`MAX_ADSR`])
    pub envelope: u32,
    /// Current per-sample step
    pub envelope_speed: u32,
    /// Current stage
    pub state: AdsrState,
}

impl Default for Adsr {
    fn default() -> Self {
        Self {
            a: 0,
            d: 0,
            s: 0xFF,
            r: 0,
            volume: MAX_ADSR_VOLUME,
            envelope: 0,
            envelope_speed: 0,
            state: AdsrState::Done,
        }
    }
}

impl Adsr {
    /// Sustain level in envelope units
    #[inline]
    pub fn sustain_level(&self) -> u32 {
        (self.s as u32) << ADSR_FRACTION_BITS
    }

    /// Restart from the attack stage
    ///
    /// The envelope level is left untouched so a retrigger ramps from where
    /// the previous note was instead of clicking to zero.
    pub fn trigger(&mut self, sample_rate: u32) {
        self.state = AdsrState::Attack;
        self.envelope_speed = envelope_speed(self.a, sample_rate);
    }

    /// Enter the release stage (no-op when already releasing or done)
    pub fn release(&mut self, sample_rate: u32) {
        if matches!(self.state, AdsrState::Release | AdsrState::Done) {
            return;
        }
        self.state = AdsrState::Release;
        self.envelope_speed = envelope_speed(self.r, sample_rate);
    }

    /// Silence immediately
    pub fn kill(&mut self) {
        self.state = AdsrState::Done;
        self.envelope = 0;
        self.envelope_speed = 0;
    }

    /// Recompute the step of the running stage after a parameter change
    pub fn refresh_speed(&mut self, sample_rate: u32) {
        self.envelope_speed = match self.state {
            AdsrState::Attack => envelope_speed(self.a, sample_rate),
            AdsrState::Decay => envelope_speed(self.d, sample_rate),
            AdsrState::Release => envelope_speed(self.r, sample_rate),
            AdsrState::Sustain | AdsrState::Done => self.envelope_speed,
        };
    }

    /// Step the envelope by one sample
    ///
    /// Returns `false` once the release stage has reached silence; the
    /// caller clears the channel gate.
    #[inline]
    pub fn advance(&mut self, sample_rate: u32) -> bool {
        match self.state {
            AdsrState::Attack => {
                self.envelope = self.envelope.saturating_add(self.envelope_speed);
                if self.envelope >= MAX_ADSR {
                    self.envelope = MAX_ADSR;
                    self.enter_decay(sample_rate);
                }
            }
            AdsrState::Decay => {
                let sustain = self.sustain_level();
                if self.envelope > sustain {
                    self.envelope = self.envelope.saturating_sub(self.envelope_speed);
                }
                if self.envelope <= sustain {
                    self.envelope = sustain;
                    self.enter_sustain(sample_rate);
                }
            }
            AdsrState::Sustain => {
                self.envelope = self.sustain_level();
            }
            AdsrState::Release => {
                self.envelope = self.envelope.saturating_sub(self.envelope_speed);
                if self.envelope == 0 {
                    self.state = AdsrState::Done;
                    return false;
                }
            }
            AdsrState::Done => return false,
        }
        true
    }

    fn enter_decay(&mut self, sample_rate: u32) {
        self.state = AdsrState::Decay;
        self.envelope_speed = envelope_speed(self.d, sample_rate);
    }

    fn enter_sustain(&mut self, sample_rate: u32) {
        if self.s == 0 {
            self.state = AdsrState::Release;
            self.envelope_speed = envelope_speed(self.r, sample_rate);
        } else {
            self.state = AdsrState::Sustain;
        }
    }

    /// Scale a centred oscillator sample by envelope and volume
    #[inline]
    pub fn apply(&self, input: i32) -> i32 {
        let scaled = input as i64 * self.envelope as i64 * self.volume as i64;
        (scaled / (MAX_ADSR as i64 * MAX_ADSR_VOLUME as i64)) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 44_100;

    fn adsr(a: u8, d: u8, s: u8, r: u8) -> Adsr {
        Adsr {
            a,
            d,
            s,
            r,
            ..Adsr::default()
        }
    }

    #[test]
    fn test_zero_rate_is_near_instant() {
        let mut env = adsr(0, 0, 0xFF, 0);
        env.trigger(SR);
        let mut samples = 0;
        while env.state == AdsrState::Attack {
            env.advance(SR);
            samples += 1;
        }
        assert!(samples <= 2, "attack took {samples} samples");
        assert_eq!(env.envelope, MAX_ADSR);
    }

    #[test]
    fn test_stages_are_monotonic_and_hit_sustain_exactly() {
        let mut env = adsr(8, 12, 0x80, 10);
        env.trigger(SR);
        let mut last = env.envelope;
        let mut last_state = env.state;

        for _ in 0..200_000 {
            env.advance(SR);
            if env.state == last_state {
                match env.state {
                    AdsrState::Attack => assert!(env.envelope >= last),
                    AdsrState::Decay | AdsrState::Release => assert!(env.envelope <= last),
                    AdsrState::Sustain => assert_eq!(env.envelope, env.sustain_level()),
                    AdsrState::Done => {}
                }
            } else if env.state == AdsrState::Sustain {
                assert_eq!(env.envelope, env.sustain_level());
            }
            last = env.envelope;
            last_state = env.state;
            if env.state == AdsrState::Sustain {
                break;
            }
        }
        assert_eq!(env.state, AdsrState::Sustain);

        env.release(SR);
        let mut steps = 0;
        while env.advance(SR) {
            assert!(env.envelope <= last);
            last = env.envelope;
            steps += 1;
            assert!(steps < 1_000_000);
        }
        assert_eq!(env.envelope, 0);
        assert_eq!(env.state, AdsrState::Done);
    }

    #[test]
    fn test_zero_sustain_skips_to_release() {
        let mut env = adsr(0, 0, 0, 0);
        env.trigger(SR);
        let mut saw_sustain = false;
        while env.advance(SR) {
            saw_sustain |= env.state == AdsrState::Sustain;
        }
        assert!(!saw_sustain);
        assert_eq!(env.state, AdsrState::Done);
    }

    #[test]
    fn test_longer_rates_take_longer() {
        assert!(envelope_speed(1, SR) > envelope_speed(2, SR));
        assert!(envelope_speed(2, SR) > envelope_speed(0x40, SR));
        assert!(envelope_speed(0xFF, SR) >= 1);
        // Doubling the sample rate halves the per-sample step
        assert_eq!(envelope_speed(4, 44_100) / 2, envelope_speed(4, 88_200));
    }

    #[test]
    fn test_apply_scales_by_envelope_and_volume() {
        let mut env = adsr(0, 0, 0xFF, 0);
        env.envelope = MAX_ADSR;
        env.volume = MAX_ADSR_VOLUME;
        assert_eq!(env.apply(2047), 2047);
        env.volume = MAX_ADSR_VOLUME / 2;
        assert_eq!(env.apply(2000), 1000);
        env.envelope = 0;
        assert_eq!(env.apply(2047), 0);
    }
}
