//! Per-voice sequencing state

use super::instrument::Instrument;
use crate::sound_engine::FilterType;

/// Sequencing state of one tracker channel
///
/// Pitches are in 1/256 semitone (`note << 8`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerEngineChannel {
    /// Instrument currently playing, `None` for silence
    pub instrument: Option<Instrument>,

    /// Current pitch
    pub note: u16,
    /// Slide destination
    pub target_note: u16,
    /// Last triggered note
    pub last_note: u16,
    /// Per-tick slide step
    pub slide_speed: u16,
    /// Signed pitch offset from fine pitch (`1D`)
    pub fine_note: i16,
    /// Arpeggio offset applied on top of `note`
    pub arpeggio_note: i16,
    /// Absolute note overriding `note` (`1E`)
    pub absolute_note: Option<u16>,
    /// Ticks per pattern arpeggio note
    pub arpeggio_speed: u8,
    /// A pattern arpeggio was running on the previous row
    pub pattern_arpeggio: bool,

    /// Vibrato LFO step per tick
    pub vibrato_speed: u8,
    /// Vibrato depth
    pub vibrato_depth: u8,
    /// Ticks before vibrato starts
    pub vibrato_delay: u8,
    /// Vibrato LFO phase
    pub vibrato_position: u8,

    /// PWM LFO step per tick
    pub pwm_speed: u8,
    /// PWM depth
    pub pwm_depth: u8,
    /// Ticks before PWM starts
    pub pwm_delay: u8,
    /// PWM LFO phase
    pub pwm_position: u8,
    /// Pulse width before PWM
    pub pw: u16,

    /// Channel volume (0..=0x80)
    pub volume: u8,

    /// Shadow of the voice filter, written to the engine every tick
    pub filter_cutoff: u16,
    /// Shadow resonance
    pub filter_resonance: u8,
    /// Shadow filter tap
    pub filter_type: FilterType,

    /// Next program slot
    pub program_counter: u8,
    /// Ticks since the last program step
    pub program_tick: u8,
    /// Loop iterations left + 1, 0 when no loop is active
    pub program_loop: u8,
    /// Ticks between program steps
    pub program_period: u8,
    /// Program has not reached END
    pub program_running: bool,

    /// Output muted (state keeps running)
    pub muted: bool,
}

impl Default for TrackerEngineChannel {
    fn default() -> Self {
        Self {
            instrument: None,
            note: 0,
            target_note: 0,
            last_note: 0,
            slide_speed: 0,
            fine_note: 0,
            arpeggio_note: 0,
            absolute_note: None,
            arpeggio_speed: 1,
            pattern_arpeggio: false,
            vibrato_speed: 0,
            vibrato_depth: 0,
            vibrato_delay: 0,
            vibrato_position: 0,
            pwm_speed: 0,
            pwm_depth: 0,
            pwm_delay: 0,
            pwm_position: 0,
            pw: 0x800,
            volume: 0,
            filter_cutoff: crate::sound_engine::MAX_CUTOFF,
            filter_resonance: 0,
            filter_type: FilterType::LowPass,
            program_counter: 0,
            program_tick: 0,
            program_loop: 0,
            program_period: 1,
            program_running: false,
            muted: false,
        }
    }
}

impl TrackerEngineChannel {
    /// Load the modulation and program defaults of `instrument`
    ///
    /// Called on every hard note trigger.
    pub fn load_instrument(&mut self, instrument: &Instrument) {
        use super::instrument::InstrumentFlags;

        self.instrument = Some(*instrument);
        self.slide_speed = instrument.slide_speed as u16;
        self.arpeggio_note = 0;
        self.absolute_note = None;
        self.fine_note = 0;

        if instrument.flags.contains(InstrumentFlags::VIBRATO) {
            self.vibrato_speed = instrument.vibrato_speed;
            self.vibrato_depth = instrument.vibrato_depth;
            self.vibrato_delay = instrument.vibrato_delay;
        } else {
            self.vibrato_depth = 0;
            self.vibrato_delay = 0;
        }
        self.vibrato_position = 0;

        if instrument.flags.contains(InstrumentFlags::PWM) {
            self.pwm_speed = instrument.pwm_speed;
            self.pwm_depth = instrument.pwm_depth;
            self.pwm_delay = instrument.pwm_delay;
        } else {
            self.pwm_depth = 0;
            self.pwm_delay = 0;
        }
        self.pwm_position = 0;

        if instrument.flags.contains(InstrumentFlags::SET_PW) {
            self.pw = instrument.pw.min(crate::sound_engine::oscillator::MAX_PULSE_WIDTH);
        }
        if instrument.flags.contains(InstrumentFlags::SET_CUTOFF) {
            self.filter_cutoff = instrument.filter_cutoff.min(crate::sound_engine::MAX_CUTOFF);
            self.filter_resonance = instrument.filter_resonance;
            self.filter_type = instrument.filter_type;
        }

        self.restart_program();
    }

    /// Rewind the micro-program to slot 0
    pub fn restart_program(&mut self) {
        let Some(instrument) = self.instrument else {
            self.program_running = false;
            return;
        };
        self.program_counter = 0;
        self.program_tick = 0;
        self.program_loop = 0;
        self.program_period = instrument.program_period.max(1);
        self.program_running = instrument.has_program();
    }

    /// Pitch after arpeggio and fine offsets, before vibrato
    pub fn base_pitch(&self) -> i32 {
        let note = self.absolute_note.unwrap_or(self.note) as i32;
        note + self.arpeggio_note as i32 + self.fine_note as i32
    }
}
