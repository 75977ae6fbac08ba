//! Song score: patterns, sequence and instruments
//!
//! Pattern steps are stored in their packed four-byte form. The accessors
//! below split them into note / instrument / volume / command fields.

use super::instrument::Instrument;
use super::{fixed_name, to_fixed_name, NAME_LEN};
use crate::sound_engine::NUM_CHANNELS;
use crate::{Result, TrackerError};

/// Empty note cell
pub const NOTE_NONE: u8 = 127;
/// Note-off cell
pub const NOTE_RELEASE: u8 = 126;
/// Empty instrument cell
pub const INSTRUMENT_NONE: u8 = 31;
/// Empty volume cell
pub const VOLUME_NONE: u8 = 31;
/// Largest step volume (maps to full channel volume)
pub const MAX_STEP_VOLUME: u8 = 0x10;

/// Upper bound for the pattern length
pub const MAX_PATTERN_LENGTH: u16 = 256;
/// Upper bound for the number of sequence steps
pub const MAX_SEQUENCE_STEPS: u16 = 256;
/// Upper bound for the number of patterns
pub const MAX_PATTERNS: u16 = 256;
/// Upper bound for the number of instruments (31 is the empty marker)
pub const MAX_INSTRUMENTS: u8 = 31;

/// Default ticks per row
pub const DEFAULT_SPEED: u8 = 6;
/// Default ticks per second
pub const DEFAULT_RATE: u8 = 60;
/// Default rows per pattern
pub const DEFAULT_PATTERN_LENGTH: u16 = 64;

/// One packed pattern cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PatternStep {
    /// Note (bits 0-6) and instrument bit 4 (bit 7)
    pub note: u8,
    /// Instrument bits 0-3 (high nibble) and volume bits 0-3 (low nibble)
    pub inst_vol: u8,
    /// Command (bits 0-14) and volume bit 4 (bit 15)
    pub command: u16,
}

impl Default for PatternStep {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl PatternStep {
    /// A cell with nothing in it
    pub const EMPTY: PatternStep = PatternStep {
        note: NOTE_NONE | 0x80,
        inst_vol: 0xFF,
        command: 0x8000,
    };

    /// Pack a cell from its fields
    pub fn new(note: u8, instrument: u8, volume: u8, command: u16) -> Self {
        let mut step = Self::EMPTY;
        step.set_note(note);
        step.set_instrument(instrument);
        step.set_volume(volume);
        step.set_command(command);
        step
    }

    /// Note number, [`NOTE_NONE`] or [`NOTE_RELEASE`]
    #[inline]
    pub fn note(&self) -> u8 {
        self.note & 0x7F
    }

    /// Instrument index or [`INSTRUMENT_NONE`]
    #[inline]
    pub fn instrument(&self) -> u8 {
        (self.inst_vol >> 4) | ((self.note & 0x80) >> 3)
    }

    /// Step volume or [`VOLUME_NONE`]
    #[inline]
    pub fn volume(&self) -> u8 {
        (self.inst_vol & 0x0F) | ((self.command >> 11) as u8 & 0x10)
    }

    /// 15-bit command word
    #[inline]
    pub fn command(&self) -> u16 {
        self.command & 0x7FFF
    }

    /// Set the note (7 bits)
    pub fn set_note(&mut self, note: u8) {
        self.note = (self.note & 0x80) | (note & 0x7F);
    }

    /// Set the instrument (5 bits)
    pub fn set_instrument(&mut self, instrument: u8) {
        let instrument = instrument & 0x1F;
        self.inst_vol = (self.inst_vol & 0x0F) | ((instrument & 0x0F) << 4);
        self.note = (self.note & 0x7F) | ((instrument & 0x10) << 3);
    }

    /// Set the volume (5 bits)
    pub fn set_volume(&mut self, volume: u8) {
        let volume = volume & 0x1F;
        self.inst_vol = (self.inst_vol & 0xF0) | (volume & 0x0F);
        self.command = (self.command & 0x7FFF) | (((volume & 0x10) as u16) << 11);
    }

    /// Set the command (15 bits)
    pub fn set_command(&mut self, command: u16) {
        self.command = (self.command & 0x8000) | (command & 0x7FFF);
    }

    /// True when the cell carries nothing
    pub fn is_empty(&self) -> bool {
        self.note() == NOTE_NONE
            && self.instrument() == INSTRUMENT_NONE
            && self.volume() == VOLUME_NONE
            && self.command() == 0
    }
}

/// A column of steps; every pattern in a song has the same length
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    /// Rows
    pub step: Vec<PatternStep>,
}

impl Pattern {
    /// An empty pattern of `length` rows
    pub fn new(length: u16) -> Self {
        Self {
            step: vec![PatternStep::EMPTY; length as usize],
        }
    }
}

/// Pattern indices played together, one per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SequenceStep {
    /// Pattern index per channel
    pub pattern_indices: [u8; NUM_CHANNELS],
}

/// Whole composition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerSong {
    /// NUL-padded title
    pub name: [u8; NAME_LEN],
    /// Instruments (at most [`MAX_INSTRUMENTS`])
    pub instrument: Vec<Instrument>,
    /// Patterns
    pub pattern: Vec<Pattern>,
    /// Sequence (order list)
    pub sequence: Vec<SequenceStep>,
    /// Rows per pattern
    pub pattern_length: u16,
    /// Ticks per row
    pub speed: u8,
    /// Ticks per second
    pub rate: u8,
    /// First sequence step of the loop range
    pub loop_start: u8,
    /// Last sequence step of the loop range
    pub loop_end: u8,
    /// Whether the loop range is honoured
    pub loop_enabled: bool,
}

impl Default for TrackerSong {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackerSong {
    /// One empty pattern, one sequence step, one default instrument
    pub fn new() -> Self {
        Self {
            name: to_fixed_name("untitled"),
            instrument: vec![Instrument::named("instrument 1")],
            pattern: vec![Pattern::new(DEFAULT_PATTERN_LENGTH)],
            sequence: vec![SequenceStep::default()],
            pattern_length: DEFAULT_PATTERN_LENGTH,
            speed: DEFAULT_SPEED,
            rate: DEFAULT_RATE,
            loop_start: 0,
            loop_end: 0,
            loop_enabled: false,
        }
    }

    /// Title
    pub fn name(&self) -> String {
        fixed_name(&self.name)
    }

    /// Replace the title (truncated to the stored width)
    pub fn set_name(&mut self, name: &str) {
        self.name = to_fixed_name(name);
    }

    /// Number of sequence steps
    pub fn num_sequence_steps(&self) -> u16 {
        self.sequence.len() as u16
    }

    /// Append an empty pattern and return the new pattern count
    ///
    /// Returns the unchanged count when the song is full.
    pub fn add_pattern(&mut self) -> usize {
        if self.pattern.len() < MAX_PATTERNS as usize {
            self.pattern.reserve_exact(1);
            self.pattern.push(Pattern::new(self.pattern_length));
        }
        self.pattern.len()
    }

    /// Append an instrument and return the new instrument count
    pub fn add_instrument(&mut self, instrument: Instrument) -> usize {
        if self.instrument.len() < MAX_INSTRUMENTS as usize {
            self.instrument.reserve_exact(1);
            self.instrument.push(instrument);
        }
        self.instrument.len()
    }

    /// Append a sequence step and return the new sequence length
    pub fn add_sequence_step(&mut self, step: SequenceStep) -> usize {
        if self.sequence.len() < MAX_SEQUENCE_STEPS as usize {
            self.sequence.reserve_exact(1);
            self.sequence.push(step);
        }
        self.sequence.len()
    }

    /// Resize every pattern, clamping to `1..=256` rows
    ///
    /// Rows cut off by shrinking are lost.
    pub fn set_pattern_length(&mut self, length: u16) -> u16 {
        let length = length.clamp(1, MAX_PATTERN_LENGTH);
        for pattern in self.pattern.iter_mut() {
            pattern.step.resize(length as usize, PatternStep::EMPTY);
        }
        self.pattern_length = length;
        length
    }

    /// Pattern played by `channel` at a sequence position
    pub fn pattern_at(&self, sequence_position: u16, channel: usize) -> Option<&Pattern> {
        let index = *self
            .sequence
            .get(sequence_position as usize)?
            .pattern_indices
            .get(channel)?;
        self.pattern.get(index as usize)
    }

    /// Step played by `channel`, or an empty step for invalid positions
    pub fn step_at(&self, sequence_position: u16, channel: usize, row: u16) -> PatternStep {
        self.pattern_at(sequence_position, channel)
            .and_then(|pattern| pattern.step.get(row as usize))
            .copied()
            .unwrap_or(PatternStep::EMPTY)
    }

    /// Mutable access to a pattern cell
    pub fn step_mut(&mut self, pattern: usize, row: u16) -> Option<&mut PatternStep> {
        self.pattern.get_mut(pattern)?.step.get_mut(row as usize)
    }

    /// Check the structural invariants a loaded or edited song must hold
    pub fn validate(&self) -> Result<()> {
        if self.pattern_length == 0 || self.pattern_length > MAX_PATTERN_LENGTH {
            return Err(TrackerError::InvalidSong(format!(
                "pattern length {} out of range",
                self.pattern_length
            )));
        }
        if self.sequence.is_empty() || self.sequence.len() > MAX_SEQUENCE_STEPS as usize {
            return Err(TrackerError::InvalidSong(format!(
                "{} sequence steps",
                self.sequence.len()
            )));
        }
        if self.pattern.is_empty() || self.pattern.len() > MAX_PATTERNS as usize {
            return Err(TrackerError::InvalidSong(format!(
                "{} patterns",
                self.pattern.len()
            )));
        }
        if self.instrument.len() > MAX_INSTRUMENTS as usize {
            return Err(TrackerError::InvalidSong(format!(
                "{} instruments",
                self.instrument.len()
            )));
        }
        if self.speed == 0 || self.rate == 0 {
            return Err(TrackerError::InvalidSong("speed and rate must be non-zero".into()));
        }
        if self.loop_start > self.loop_end || self.loop_end as usize >= self.sequence.len() {
            return Err(TrackerError::InvalidSong(format!(
                "loop range {}..={} outside sequence",
                self.loop_start, self.loop_end
            )));
        }

        for (i, pattern) in self.pattern.iter().enumerate() {
            if pattern.step.len() != self.pattern_length as usize {
                return Err(TrackerError::InvalidSong(format!(
                    "pattern {i} has {} rows, expected {}",
                    pattern.step.len(),
                    self.pattern_length
                )));
            }
        }
        for (i, step) in self.sequence.iter().enumerate() {
            if let Some(&index) = step
                .pattern_indices
                .iter()
                .find(|&&index| index as usize >= self.pattern.len())
            {
                return Err(TrackerError::InvalidSong(format!(
                    "sequence step {i} references missing pattern {index}"
                )));
            }
        }
        Ok(())
    }
}
