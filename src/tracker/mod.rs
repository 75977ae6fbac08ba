//! Tracker sequencer
//!
//! [`TrackerEngine`] walks a [`TrackerSong`] one tick at a time, triggering
//! notes and running effects and instrument programs against a
//! [`SoundEngine`]. It never allocates or frees the song; the active song is
//! a shared snapshot replaced through [`TrackerEngine::set_song`].

pub mod channel;
pub mod effects;
pub mod instrument;
pub mod program;
pub mod song;
mod tick;

use std::sync::Arc;

use tracing::debug;

pub use channel::TrackerEngineChannel;
pub use effects::{make_command, make_extended, Effect, ExtendedEffect};
pub use instrument::{Instrument, InstrumentFlags};
pub use program::ProgramStep;
pub use song::{Pattern, PatternStep, SequenceStep, TrackerSong};

use crate::sound_engine::tables::{FREQUENCY_TABLE, FREQUENCY_TABLE_OCTAVE};
use crate::sound_engine::{ChannelFlags, SoundEngine, NO_SOURCE, NUM_CHANNELS};

/// Width of song and instrument names
pub const NAME_LEN: usize = 32;
/// Highest note, B-7, in 1/256 semitone
pub const MAX_NOTE: u16 = (12 * 7 + 11) << 8;
/// C-4
pub const MIDDLE_C: u8 = 12 * 4;

/// Frequency in 1/1024 Hz of a pitch in 1/256 semitone
///
/// The fractional part interpolates linearly between table neighbours.
pub fn note_frequency(note: u16) -> u32 {
    let note = note.min(MAX_NOTE);
    let semitone = (note >> 8) as usize;
    let fraction = (note & 0xFF) as u32;
    let octave = (semitone / 12) as u32;
    let index = semitone % 12;

    let low = FREQUENCY_TABLE[index];
    let high = FREQUENCY_TABLE[index + 1];
    let top = low + (((high - low) * fraction) >> 8);
    top >> (FREQUENCY_TABLE_OCTAVE - octave.min(FREQUENCY_TABLE_OCTAVE))
}

pub(crate) fn fixed_name(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

pub(crate) fn to_fixed_name(name: &str) -> [u8; NAME_LEN] {
    let mut out = [0u8; NAME_LEN];
    for (dst, src) in out.iter_mut().zip(name.bytes()) {
        *dst = src;
    }
    out
}

/// Sequencer runtime
#[derive(Debug, Clone)]
pub struct TrackerEngine {
    song: Option<Arc<TrackerSong>>,
    /// Per-channel sequencing state
    pub channel: [TrackerEngineChannel; NUM_CHANNELS],
    pattern_position: u16,
    sequence_position: u16,
    current_tick: u8,
    speed: u8,
    rate: u8,
    playing: bool,
    loop_row: u16,
    loop_count: u8,
    pending_loop: Option<u16>,
    pending_skip: Option<u16>,
}

impl Default for TrackerEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackerEngine {
    /// Stopped sequencer without a song
    pub fn new() -> Self {
        Self {
            song: None,
            channel: [TrackerEngineChannel::default(); NUM_CHANNELS],
            pattern_position: 0,
            sequence_position: 0,
            current_tick: 0,
            speed: song::DEFAULT_SPEED,
            rate: song::DEFAULT_RATE,
            playing: false,
            loop_row: 0,
            loop_count: 0,
            pending_loop: None,
            pending_skip: None,
        }
    }

    /// Active song snapshot
    pub fn song(&self) -> Option<&Arc<TrackerSong>> {
        self.song.as_ref()
    }

    /// Replace the active song
    ///
    /// Positions are clamped to the new song's bounds. Passing `None`
    /// stops playback and silences every channel.
    pub fn set_song(&mut self, engine: &mut SoundEngine, song: Option<Arc<TrackerSong>>) {
        match song {
            Some(song) => {
                let first = self.song.is_none();
                self.sequence_position = self
                    .sequence_position
                    .min(song.num_sequence_steps().saturating_sub(1));
                self.pattern_position = self
                    .pattern_position
                    .min(song.pattern_length.saturating_sub(1));
                self.loop_row = self.loop_row.min(self.pattern_position);
                if first || !self.playing {
                    self.speed = song.speed.max(1);
                    self.rate = song.rate.max(1);
                }
                debug!(
                    name = %song.name(),
                    patterns = song.pattern.len(),
                    sequence = song.sequence.len(),
                    "song swapped in"
                );
                self.song = Some(song);
            }
            None => {
                self.stop(engine);
                self.song = None;
                debug!("song unloaded");
            }
        }
    }

    /// Begin (or resume) playback at the current position
    ///
    /// Does nothing without a song.
    pub fn start(&mut self, engine: &mut SoundEngine) {
        let Some((speed, rate)) = self.song.as_ref().map(|s| (s.speed, s.rate)) else {
            return;
        };
        self.reset_channels(engine);
        self.speed = speed.max(1);
        self.rate = rate.max(1);
        self.current_tick = 0;
        self.loop_count = 0;
        self.pending_loop = None;
        self.pending_skip = None;
        self.playing = true;
        debug!(
            sequence = self.sequence_position,
            row = self.pattern_position,
            "playback started"
        );
    }

    /// Stop playback and silence every voice before returning
    pub fn stop(&mut self, engine: &mut SoundEngine) {
        self.playing = false;
        self.current_tick = 0;
        self.reset_channels(engine);
        debug!("playback stopped");
    }

    /// Seek to a sequence step and row
    pub fn set_position(&mut self, sequence_position: u16, pattern_position: u16) {
        let (steps, rows) = self
            .song
            .as_ref()
            .map(|s| (s.num_sequence_steps(), s.pattern_length))
            .unwrap_or((1, 1));
        self.sequence_position = sequence_position.min(steps.saturating_sub(1));
        self.pattern_position = pattern_position.min(rows.saturating_sub(1));
        self.current_tick = 0;
        self.loop_row = 0;
        self.loop_count = 0;
        self.pending_loop = None;
        self.pending_skip = None;
    }

    /// Start a note with an instrument outside of the song (live preview)
    pub fn trigger_instrument(
        &mut self,
        engine: &mut SoundEngine,
        channel: usize,
        instrument: &Instrument,
        note: u8,
    ) {
        if channel >= NUM_CHANNELS {
            return;
        }
        self.channel[channel].volume = instrument.volume.min(crate::sound_engine::MAX_ADSR_VOLUME);
        self.trigger_note(engine, channel, instrument, note);
        self.update_channel(engine, channel);
    }

    /// Mute or unmute a channel; a muted channel keeps sequencing silently
    pub fn set_channel_mute(&mut self, channel: usize, muted: bool) {
        if let Some(ch) = self.channel.get_mut(channel) {
            ch.muted = muted;
        }
    }

    /// Whether the sequencer is playing
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Row within the current pattern
    pub fn pattern_position(&self) -> u16 {
        self.pattern_position
    }

    /// Current sequence step
    pub fn sequence_position(&self) -> u16 {
        self.sequence_position
    }

    /// Tick within the current row
    pub fn current_tick(&self) -> u8 {
        self.current_tick
    }

    /// Ticks per row (may be changed by `0F`)
    pub fn speed(&self) -> u8 {
        self.speed
    }

    /// Ticks per second (may be changed by `1A`)
    pub fn rate(&self) -> u8 {
        self.rate
    }

    fn reset_channels(&mut self, engine: &mut SoundEngine) {
        for (i, ch) in self.channel.iter_mut().enumerate() {
            let muted = ch.muted;
            *ch = TrackerEngineChannel {
                muted,
                ..Default::default()
            };
            let voice = &mut engine.channel[i];
            voice.silence();
            voice.filter.reset();
        }
    }

    /// Hard-trigger `note` (semitone) with `instrument` on a channel
    pub(crate) fn trigger_note(
        &mut self,
        engine: &mut SoundEngine,
        channel: usize,
        instrument: &Instrument,
        note: u8,
    ) {
        let pitch = pitch_for(instrument, note);
        let ch = &mut self.channel[channel];
        ch.load_instrument(instrument);
        ch.note = pitch;
        ch.target_note = pitch;
        ch.last_note = pitch;

        let voice = &mut engine.channel[channel];
        voice.osc.waveform = instrument.waveform;
        voice.flags = (voice.flags & ChannelFlags::GATE)
            | (instrument.sound_engine_flags - ChannelFlags::GATE);
        voice.ring_mod = routing_source(instrument.ring_mod, channel);
        voice.hard_sync = routing_source(instrument.hard_sync, channel);
        if voice.ring_mod == NO_SOURCE {
            voice.flags.remove(ChannelFlags::RING_MOD);
        }
        if voice.hard_sync == NO_SOURCE {
            voice.flags.remove(ChannelFlags::HARD_SYNC);
        }
        voice.adsr.a = instrument.attack;
        voice.adsr.d = instrument.decay;
        voice.adsr.s = instrument.sustain;
        voice.adsr.r = instrument.release;
        if instrument.flags.contains(InstrumentFlags::SET_CUTOFF) {
            voice.filter.reset();
        }

        engine.enable_gate(channel, true);
    }
}

/// Pitch of a written note played with an instrument
fn pitch_for(instrument: &Instrument, note: u8) -> u16 {
    let semitone = note as i32 + instrument.base_note as i32 - MIDDLE_C as i32;
    let pitch = (semitone << 8) + instrument.finetune as i32;
    pitch.clamp(0, MAX_NOTE as i32) as u16
}

fn routing_source(source: u8, channel: usize) -> u8 {
    if (source as usize) < NUM_CHANNELS && source as usize != channel {
        source
    } else {
        NO_SOURCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_frequency_reference_points() {
        // A-4 = 440 Hz
        let a4 = note_frequency((12 * 4 + 9) << 8);
        approx::assert_relative_eq!(a4 as f64 / 1024.0, 440.0, epsilon = 0.01);
        // One octave up doubles
        let a5 = note_frequency((12 * 5 + 9) << 8);
        assert_eq!(a5, a4 * 2);
        // Fractions land between neighbours
        let half = note_frequency(((12 * 4 + 9) << 8) + 0x80);
        let next = note_frequency((12 * 4 + 10) << 8);
        assert!(half > a4 && half < next);
        // Clamped at the top
        assert_eq!(note_frequency(u16::MAX), note_frequency(MAX_NOTE));
    }

    #[test]
    fn test_fixed_name_stops_at_nul() {
        let mut raw = [0u8; NAME_LEN];
        raw[..3].copy_from_slice(b"abc");
        raw[4] = b'z';
        assert_eq!(fixed_name(&raw), "abc");
        assert_eq!(fixed_name(&to_fixed_name("hello")), "hello");
    }

    #[test]
    fn test_pitch_for_applies_base_note_and_finetune() {
        let mut ins = Instrument::default();
        assert_eq!(pitch_for(&ins, 60), 60 << 8);
        ins.base_note = MIDDLE_C + 12;
        ins.finetune = -16;
        assert_eq!(pitch_for(&ins, 60), (72 << 8) - 16);
        ins.base_note = 0;
        assert_eq!(pitch_for(&ins, 10), 0);
    }

    #[test]
    fn test_set_song_clamps_positions() {
        let mut engine = SoundEngine::new(44_100, 64);
        let mut tracker = TrackerEngine::new();
        let mut song = TrackerSong::new();
        for _ in 0..4 {
            song.add_sequence_step(SequenceStep::default());
        }
        tracker.set_song(&mut engine, Some(Arc::new(song)));
        tracker.set_position(4, 40);
        assert_eq!(tracker.sequence_position(), 4);

        let mut short = TrackerSong::new();
        short.set_pattern_length(16);
        tracker.set_song(&mut engine, Some(Arc::new(short)));
        assert_eq!(tracker.sequence_position(), 0);
        assert_eq!(tracker.pattern_position(), 15);
    }

    #[test]
    fn test_start_without_song_does_nothing() {
        let mut engine = SoundEngine::new(44_100, 64);
        let mut tracker = TrackerEngine::new();
        tracker.start(&mut engine);
        assert!(!tracker.is_playing());
    }

    #[test]
    fn test_trigger_instrument_opens_gate() {
        let mut engine = SoundEngine::new(44_100, 64);
        let mut tracker = TrackerEngine::new();
        let ins = Instrument::default();
        tracker.trigger_instrument(&mut engine, 1, &ins, 57);
        assert!(engine.channel[1].flags.contains(ChannelFlags::GATE));
        assert_eq!(engine.channel[1].frequency, note_frequency(57 << 8));
        tracker.trigger_instrument(&mut engine, 9, &ins, 57);
    }
}
