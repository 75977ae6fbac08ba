//! Instrument definition
//!
//! An instrument bundles the voice setup applied on note trigger (waveform,
//! envelope, filter, cross-channel routing) with modulation defaults and a
//! 16-slot micro-program.

use bitflags::bitflags;

use super::program::{PROGRAM_END, PROGRAM_NOP, PROGRAM_SLOTS};
use super::{fixed_name, to_fixed_name, MIDDLE_C, NAME_LEN};
use crate::sound_engine::{ChannelFlags, FilterType, Waveform, MAX_ADSR_VOLUME, NO_SOURCE};

bitflags! {
    /// Trigger-time behaviour of an instrument
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InstrumentFlags: u8 {
        /// Restart the envelope when a slide begins
        const RETRIGGER_ON_SLIDE = 0x01;
        /// Start vibrato from the instrument parameters
        const VIBRATO = 0x02;
        /// Start pulse-width modulation from the instrument parameters
        const PWM = 0x04;
        /// Load the instrument pulse width on trigger
        const SET_PW = 0x08;
        /// Load the instrument cutoff/resonance/type on trigger
        const SET_CUTOFF = 0x10;
    }
}

/// Sound definition plus micro-program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instrument {
    /// NUL-padded display name
    pub name: [u8; NAME_LEN],
    /// Basis waveforms
    pub waveform: Waveform,
    /// Trigger behaviour
    pub flags: InstrumentFlags,
    /// Voice flags loaded on trigger (filter, ring mod, hard sync, key sync)
    pub sound_engine_flags: ChannelFlags,
    /// Note that plays at the written pitch
    pub base_note: u8,
    /// Pitch offset in 1/256 semitone
    pub finetune: i8,
    /// Default slide speed for `03` slides
    pub slide_speed: u8,
    /// Attack rate
    pub attack: u8,
    /// Decay rate
    pub decay: u8,
    /// Sustain level
    pub sustain: u8,
    /// Release rate
    pub release: u8,
    /// Initial channel volume (0..=0x80)
    pub volume: u8,
    /// Pulse width (0..=0xFFF)
    pub pw: u16,
    /// Ring-mod source channel
    pub ring_mod: u8,
    /// Hard-sync source channel
    pub hard_sync: u8,
    /// Filter cutoff (0..=0x7FF)
    pub filter_cutoff: u16,
    /// Filter resonance
    pub filter_resonance: u8,
    /// Filter tap selection
    pub filter_type: FilterType,
    /// Vibrato LFO speed
    pub vibrato_speed: u8,
    /// Vibrato depth
    pub vibrato_depth: u8,
    /// Ticks before vibrato starts
    pub vibrato_delay: u8,
    /// PWM LFO speed
    pub pwm_speed: u8,
    /// PWM depth
    pub pwm_depth: u8,
    /// Ticks before PWM starts
    pub pwm_delay: u8,
    /// Ticks between program steps
    pub program_period: u8,
    /// Micro-program slots
    pub program: [u16; PROGRAM_SLOTS],
}

impl Default for Instrument {
    fn default() -> Self {
        let mut program = [PROGRAM_NOP; PROGRAM_SLOTS];
        program[0] = PROGRAM_END;

        Self {
            name: [0; NAME_LEN],
            waveform: Waveform::SAW,
            flags: InstrumentFlags::SET_PW | InstrumentFlags::SET_CUTOFF,
            sound_engine_flags: ChannelFlags::KEY_SYNC,
            base_note: MIDDLE_C,
            finetune: 0,
            slide_speed: 0x20,
            attack: 0x02,
            decay: 0x28,
            sustain: 0xA0,
            release: 0x18,
            volume: MAX_ADSR_VOLUME,
            pw: 0x800,
            ring_mod: NO_SOURCE,
            hard_sync: NO_SOURCE,
            filter_cutoff: 0x3FF,
            filter_resonance: 0,
            filter_type: FilterType::LowPass,
            vibrato_speed: 0,
            vibrato_depth: 0,
            vibrato_delay: 0,
            pwm_speed: 0,
            pwm_depth: 0,
            pwm_delay: 0,
            program_period: 1,
            program,
        }
    }
}

impl Instrument {
    /// Create a default instrument with a name
    pub fn named(name: &str) -> Self {
        Self {
            name: to_fixed_name(name),
            ..Self::default()
        }
    }

    /// Display name
    pub fn name(&self) -> String {
        fixed_name(&self.name)
    }

    /// Replace the display name (truncated to the stored width)
    pub fn set_name(&mut self, name: &str) {
        self.name = to_fixed_name(name);
    }

    /// True when the program does anything besides ending
    pub fn has_program(&self) -> bool {
        self.program
            .iter()
            .take_while(|&&slot| slot & 0x7FFF != PROGRAM_END)
            .any(|&slot| slot & 0x7FFF != PROGRAM_NOP)
    }
}
