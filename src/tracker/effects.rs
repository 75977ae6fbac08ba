//! Effect opcode interpreter
//!
//! Commands are 15-bit words: the high byte selects the effect, the low byte
//! is its parameter. `0E` is an extended group whose parameter high nibble
//! selects a sub-effect.
//!
//! Most effects only act on tick 0 of a row. Continuous effects (slides,
//! fades, retrigger, cut) act on every tick they are evaluated. Program
//! slots call into the same interpreter with `tick == 0`.

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

use super::{TrackerEngine, MAX_NOTE};
use crate::sound_engine::{
    oscillator::MAX_PULSE_WIDTH, ChannelFlags, FilterType, SoundEngine, Waveform,
    MAX_ADSR_VOLUME, MAX_CUTOFF, NO_SOURCE, NUM_CHANNELS,
};

/// Main effect ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum Effect {
    /// `00xy` arpeggio
    Arpeggio = 0x00,
    /// `01xx` portamento up
    PortamentoUp = 0x01,
    /// `02xx` portamento down
    PortamentoDown = 0x02,
    /// `03xx` slide to note, `0300` = legato
    Slide = 0x03,
    /// `04xy` vibrato
    Vibrato = 0x04,
    /// `05xy` pulse-width modulation
    Pwm = 0x05,
    /// `06xx` set pulse width
    SetPw = 0x06,
    /// `07xx` pulse width down
    PwDown = 0x07,
    /// `08xx` pulse width up
    PwUp = 0x08,
    /// `09xx` set cutoff
    SetCutoff = 0x09,
    /// `0Axy` volume fade
    VolumeFade = 0x0A,
    /// `0Bxx` set waveform
    SetWaveform = 0x0B,
    /// `0Cxx` set volume
    SetVolume = 0x0C,
    /// `0Dxx` skip to next sequence step at row xx
    SkipPattern = 0x0D,
    /// `0Exy` extended group
    Extended = 0x0E,
    /// `0Fxx` set speed
    SetSpeed = 0x0F,
    /// `10xx` cutoff up
    CutoffUp = 0x10,
    /// `11xx` cutoff down
    CutoffDown = 0x11,
    /// `12xx` set resonance
    SetResonance = 0x12,
    /// `13xx` resonance up
    ResonanceUp = 0x13,
    /// `14xx` resonance down
    ResonanceDown = 0x14,
    /// `15xx` set attack
    SetAttack = 0x15,
    /// `16xx` set decay
    SetDecay = 0x16,
    /// `17xx` set sustain
    SetSustain = 0x17,
    /// `18xx` set release
    SetRelease = 0x18,
    /// `19xx` restart program
    ProgramRestart = 0x19,
    /// `1Axx` set rate
    SetRate = 0x1A,
    /// `1Bxx` portamento up by semitones
    SemitoneUp = 0x1B,
    /// `1Cxx` portamento down by semitones
    SemitoneDown = 0x1C,
    /// `1Dxx` fine pitch
    FinePitch = 0x1D,
    /// `1Exx` absolute arpeggio
    AbsoluteArpeggio = 0x1E,
    /// `1Fxx` program period
    ProgramPeriod = 0x1F,
}

/// Sub-effects of `0E`
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum ExtendedEffect {
    /// `E0x` arpeggio speed
    ArpeggioSpeed = 0x0,
    /// `E1x` fine portamento up
    FinePortamentoUp = 0x1,
    /// `E2x` fine portamento down
    FinePortamentoDown = 0x2,
    /// `E3x` filter type
    FilterType = 0x3,
    /// `E4x` filter on/off
    FilterToggle = 0x4,
    /// `E6x` pattern loop
    PatternLoop = 0x6,
    /// `E7x` ring-mod source
    RingModSource = 0x7,
    /// `E8x` hard-sync source
    HardSyncSource = 0x8,
    /// `E9x` retrigger
    Retrigger = 0x9,
    /// `EAx` fine volume down
    FineVolumeDown = 0xA,
    /// `EBx` fine volume up
    FineVolumeUp = 0xB,
    /// `ECx` note cut
    NoteCut = 0xC,
    /// `EDx` note delay
    NoteDelay = 0xD,
    /// `EEx` phase reset
    PhaseReset = 0xE,
    /// `EFx` release
    Release = 0xF,
}

/// Split a command into effect id and parameter
#[inline]
pub fn split_command(command: u16) -> (u8, u8) {
    (((command >> 8) & 0x7F) as u8, command as u8)
}

/// Build a command word from an effect and parameter
#[inline]
pub fn make_command(effect: Effect, param: u8) -> u16 {
    ((effect as u16) << 8) | param as u16
}

/// Build an extended (`0Exy`) command word
#[inline]
pub fn make_extended(effect: ExtendedEffect, value: u8) -> u16 {
    make_command(Effect::Extended, ((effect as u8) << 4) | (value & 0x0F))
}

/// Note-delay tick of a command (0 when the command is not `EDx`)
#[inline]
pub fn note_delay(command: u16) -> u8 {
    let (id, param) = split_command(command);
    if id == Effect::Extended as u8 && param >> 4 == ExtendedEffect::NoteDelay as u8 {
        param & 0x0F
    } else {
        0
    }
}

/// True for `03xx`
#[inline]
pub fn is_slide(command: u16) -> bool {
    split_command(command).0 == Effect::Slide as u8
}

fn clamp_note(note: i32) -> u16 {
    note.clamp(0, MAX_NOTE as i32) as u16
}

impl TrackerEngine {
    /// Execute one command against a channel
    ///
    /// `tick` is the row tick; program slots pass 0 with `from_program` set.
    /// Unknown ids are ignored.
    pub(crate) fn do_command(
        &mut self,
        engine: &mut SoundEngine,
        channel: usize,
        command: u16,
        tick: u8,
        from_program: bool,
    ) {
        let (id, param) = split_command(command);
        let Some(effect) = Effect::from_u8(id) else {
            return;
        };
        let first_tick = tick == 0;
        let sample_rate = engine.sample_rate();

        match effect {
            Effect::Arpeggio => {
                let ch = &mut self.channel[channel];
                if from_program {
                    ch.arpeggio_note = (param as i8 as i16) << 8;
                } else if param != 0 {
                    let speed = ch.arpeggio_speed.max(1);
                    let offset = match (tick / speed) % 3 {
                        0 => 0,
                        1 => param >> 4,
                        _ => param & 0x0F,
                    };
                    ch.arpeggio_note = (offset as i16) << 8;
                    ch.pattern_arpeggio = true;
                }
            }
            Effect::PortamentoUp | Effect::PortamentoDown => {
                let step = param as i32 * 4;
                let step = if effect == Effect::PortamentoUp { step } else { -step };
                let ch = &mut self.channel[channel];
                ch.note = clamp_note(ch.note as i32 + step);
                ch.target_note = ch.note;
            }
            Effect::Slide => {
                if first_tick && param != 0 {
                    self.channel[channel].slide_speed = param as u16;
                }
            }
            Effect::Vibrato => {
                if first_tick {
                    let ch = &mut self.channel[channel];
                    ch.vibrato_speed = param >> 4;
                    ch.vibrato_depth = (param & 0x0F) << 4;
                    ch.vibrato_delay = 0;
                }
            }
            Effect::Pwm => {
                if first_tick {
                    let ch = &mut self.channel[channel];
                    ch.pwm_speed = param >> 4;
                    ch.pwm_depth = (param & 0x0F) << 4;
                    ch.pwm_delay = 0;
                }
            }
            Effect::SetPw => {
                if first_tick {
                    self.channel[channel].pw = (param as u16) << 4;
                }
            }
            Effect::PwDown => {
                let ch = &mut self.channel[channel];
                ch.pw = ch.pw.saturating_sub(param as u16);
            }
            Effect::PwUp => {
                let ch = &mut self.channel[channel];
                ch.pw = ch.pw.saturating_add(param as u16).min(MAX_PULSE_WIDTH);
            }
            Effect::SetCutoff => {
                if first_tick {
                    self.channel[channel].filter_cutoff = (param as u16) << 3;
                }
            }
            Effect::VolumeFade => {
                if !first_tick || from_program {
                    let ch = &mut self.channel[channel];
                    let volume = ch.volume as i32 + (param >> 4) as i32 - (param & 0x0F) as i32;
                    ch.volume = volume.clamp(0, MAX_ADSR_VOLUME as i32) as u8;
                }
            }
            Effect::SetWaveform => {
                if first_tick {
                    engine.channel[channel].osc.waveform = Waveform::from_bits_truncate(param);
                }
            }
            Effect::SetVolume => {
                if first_tick {
                    self.channel[channel].volume = param.min(MAX_ADSR_VOLUME);
                }
            }
            Effect::SkipPattern => {
                if first_tick && !from_program {
                    self.pending_skip = Some(param as u16);
                }
            }
            Effect::Extended => self.do_extended(engine, channel, param, tick, from_program),
            Effect::SetSpeed => {
                if first_tick && param != 0 {
                    self.speed = param;
                }
            }
            Effect::CutoffUp => {
                let ch = &mut self.channel[channel];
                ch.filter_cutoff = ch.filter_cutoff.saturating_add(param as u16).min(MAX_CUTOFF);
            }
            Effect::CutoffDown => {
                let ch = &mut self.channel[channel];
                ch.filter_cutoff = ch.filter_cutoff.saturating_sub(param as u16);
            }
            Effect::SetResonance => {
                if first_tick {
                    self.channel[channel].filter_resonance = param;
                }
            }
            Effect::ResonanceUp => {
                let ch = &mut self.channel[channel];
                ch.filter_resonance = ch.filter_resonance.saturating_add(param);
            }
            Effect::ResonanceDown => {
                let ch = &mut self.channel[channel];
                ch.filter_resonance = ch.filter_resonance.saturating_sub(param);
            }
            Effect::SetAttack | Effect::SetDecay | Effect::SetSustain | Effect::SetRelease => {
                if first_tick {
                    let adsr = &mut engine.channel[channel].adsr;
                    match effect {
                        Effect::SetAttack => adsr.a = param,
                        Effect::SetDecay => adsr.d = param,
                        Effect::SetSustain => adsr.s = param,
                        _ => adsr.r = param,
                    }
                    adsr.refresh_speed(sample_rate);
                }
            }
            Effect::ProgramRestart => {
                if first_tick {
                    self.channel[channel].restart_program();
                }
            }
            Effect::SetRate => {
                if first_tick && param != 0 {
                    self.rate = param;
                }
            }
            Effect::SemitoneUp | Effect::SemitoneDown => {
                if first_tick {
                    let step = (param as i32) << 8;
                    let step = if effect == Effect::SemitoneUp { step } else { -step };
                    let ch = &mut self.channel[channel];
                    ch.note = clamp_note(ch.note as i32 + step);
                    ch.target_note = ch.note;
                }
            }
            Effect::FinePitch => {
                if first_tick {
                    self.channel[channel].fine_note = param as i16 - 0x80;
                }
            }
            Effect::AbsoluteArpeggio => {
                if first_tick {
                    self.channel[channel].absolute_note = Some(clamp_note((param as i32) << 8));
                }
            }
            Effect::ProgramPeriod => {
                if first_tick {
                    let ch = &mut self.channel[channel];
                    ch.program_period = param.max(1);
                    if ch.program_tick >= ch.program_period {
                        ch.program_tick = 0;
                    }
                }
            }
        }
    }

    fn do_extended(
        &mut self,
        engine: &mut SoundEngine,
        channel: usize,
        param: u8,
        tick: u8,
        from_program: bool,
    ) {
        let Some(effect) = ExtendedEffect::from_u8(param >> 4) else {
            return;
        };
        let value = param & 0x0F;
        let first_tick = tick == 0;

        match effect {
            ExtendedEffect::ArpeggioSpeed => {
                if first_tick {
                    self.channel[channel].arpeggio_speed = value.max(1);
                }
            }
            ExtendedEffect::FinePortamentoUp | ExtendedEffect::FinePortamentoDown => {
                if first_tick {
                    let step = value as i32;
                    let step = if effect == ExtendedEffect::FinePortamentoUp {
                        step
                    } else {
                        -step
                    };
                    let ch = &mut self.channel[channel];
                    ch.note = clamp_note(ch.note as i32 + step);
                    ch.target_note = ch.note;
                }
            }
            ExtendedEffect::FilterType => {
                if first_tick {
                    self.channel[channel].filter_type = FilterType::from_raw(value);
                }
            }
            ExtendedEffect::FilterToggle => {
                if first_tick {
                    engine.channel[channel]
                        .flags
                        .set(ChannelFlags::FILTER, value != 0);
                }
            }
            ExtendedEffect::PatternLoop => {
                if first_tick && !from_program {
                    self.pattern_loop(value);
                }
            }
            ExtendedEffect::RingModSource | ExtendedEffect::HardSyncSource => {
                if first_tick {
                    let (flag, source) = if effect == ExtendedEffect::RingModSource {
                        (ChannelFlags::RING_MOD, &mut engine.channel[channel].ring_mod)
                    } else {
                        (ChannelFlags::HARD_SYNC, &mut engine.channel[channel].hard_sync)
                    };
                    let enabled = (value as usize) < NUM_CHANNELS && value as usize != channel;
                    *source = if enabled { value } else { NO_SOURCE };
                    engine.channel[channel].flags.set(flag, enabled);
                }
            }
            ExtendedEffect::Retrigger => {
                if value != 0 && !first_tick && tick % value == 0 {
                    engine.enable_gate(channel, true);
                }
            }
            ExtendedEffect::FineVolumeDown => {
                if first_tick {
                    let ch = &mut self.channel[channel];
                    ch.volume = ch.volume.saturating_sub(value);
                }
            }
            ExtendedEffect::FineVolumeUp => {
                if first_tick {
                    let ch = &mut self.channel[channel];
                    ch.volume = ch.volume.saturating_add(value).min(MAX_ADSR_VOLUME);
                }
            }
            ExtendedEffect::NoteCut => {
                if tick == value {
                    self.channel[channel].volume = 0;
                }
            }
            ExtendedEffect::NoteDelay => {}
            ExtendedEffect::PhaseReset => {
                if tick == value {
                    engine.channel[channel].osc.reset_phase();
                }
            }
            ExtendedEffect::Release => {
                if tick == value {
                    engine.enable_gate(channel, false);
                }
            }
        }
    }

    fn pattern_loop(&mut self, count: u8) {
        if count == 0 {
            self.loop_row = self.pattern_position;
            return;
        }
        if self.loop_count == 0 {
            self.loop_count = count;
            self.pending_loop = Some(self.loop_row);
        } else {
            self.loop_count -= 1;
            if self.loop_count > 0 {
                self.pending_loop = Some(self.loop_row);
            }
        }
    }
}
