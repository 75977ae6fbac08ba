//! Playback Engine Domain
//!
//! Couples the sound engine with the sequencer: samples are rendered in
//! chunks between sequencer ticks, the tick clock fires at the song rate and
//! new song snapshots are adopted at tick boundaries.

mod song_slot;
pub mod tick_clock;

pub use song_slot::{SongHandle, SongSlot, SongUpdate};
pub use tick_clock::TickClock;

use std::sync::Arc;

use tracing::debug;

use crate::config::EngineConfig;
use crate::sound_engine::{BufferHalf, SoundEngine, MAX_ADSR_VOLUME};
use crate::tracker::{Instrument, TrackerEngine, TrackerSong};
use crate::{Result, TrackerError};

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Stopped
    Stopped,
    /// Currently playing
    Playing,
    /// Paused
    Paused,
}

/// Simple playback controller trait
pub trait PlaybackController {
    /// Start playback
    fn play(&mut self) -> Result<()>;

    /// Pause playback
    fn pause(&mut self) -> Result<()>;

    /// Stop playback
    fn stop(&mut self) -> Result<()>;

    /// Get current playback state
    fn state(&self) -> PlaybackState;
}

/// Song player
///
/// Owns one [`SoundEngine`] and one [`TrackerEngine`]. Everything is
/// driven from [`render`](Player::render): the caller only supplies
/// buffers.
#[derive(Debug)]
pub struct Player {
    engine: SoundEngine,
    tracker: TrackerEngine,
    clock: TickClock,
    slot: Arc<SongSlot>,
    state: PlaybackState,
    /// Backing store for [`fill_half`](Player::fill_half)
    buffer: Vec<u16>,
}

impl Player {
    /// Create a stopped player without a song
    pub fn new(config: &EngineConfig) -> Self {
        let config = config.validated();
        let mut engine = SoundEngine::new(config.sample_rate, config.audio_buffer_size);
        engine.master_volume = config.master_volume;
        let tracker = TrackerEngine::new();
        let clock = TickClock::new(config.sample_rate, tracker.rate());
        let buffer = vec![0; engine.audio_buffer().len()];

        Self {
            engine,
            tracker,
            clock,
            slot: Arc::new(SongSlot::new()),
            state: PlaybackState::Stopped,
            buffer,
        }
    }

    /// Validate `song`, stop playback and make it the active song
    pub fn load_song(&mut self, song: TrackerSong) -> Result<()> {
        song.validate()?;
        let rate = song.rate;
        self.tracker.stop(&mut self.engine);
        self.tracker.set_song(&mut self.engine, Some(Arc::new(song)));
        self.tracker.set_position(0, 0);
        self.clock.set_rate(rate);
        self.clock.reset();
        self.state = PlaybackState::Stopped;
        Ok(())
    }

    /// Handle for publishing song edits while playing
    pub fn song_handle(&self) -> SongHandle {
        SongHandle::new(Arc::clone(&self.slot))
    }

    /// Active song, if any
    pub fn song(&self) -> Option<&Arc<TrackerSong>> {
        self.tracker.song()
    }

    /// Run one sequencer tick
    ///
    /// Called by [`render`](Player::render) at every tick boundary.
    pub fn tick(&mut self) {
        if let Some(update) = self.slot.try_take() {
            match update {
                SongUpdate::Load(song) => self.tracker.set_song(&mut self.engine, Some(song)),
                SongUpdate::Unload => {
                    self.tracker.set_song(&mut self.engine, None);
                    self.state = PlaybackState::Stopped;
                }
            }
        }

        let was_playing = self.tracker.is_playing();
        self.tracker.advance_tick(&mut self.engine);
        self.clock.set_rate(self.tracker.rate());

        if was_playing && !self.tracker.is_playing() {
            debug!(ticks = self.clock.tick_count(), "end of song");
            self.state = PlaybackState::Stopped;
        }
    }

    /// Render `out.len()` samples, ticking the sequencer on schedule
    pub fn render(&mut self, out: &mut [u16]) {
        let mut offset = 0;
        while offset < out.len() {
            let chunk = (out.len() - offset).min(self.clock.samples_until_tick() as usize);
            self.engine.fill(&mut out[offset..offset + chunk]);
            offset += chunk;
            if self.clock.advance(chunk as u32) {
                self.tick();
            }
        }
    }

    /// Render one half of the circular buffer and return it
    pub fn fill_half(&mut self, half: BufferHalf) -> &[u16] {
        let mid = self.buffer.len() / 2;
        let range = match half {
            BufferHalf::First => 0..mid,
            BufferHalf::Second => mid..self.buffer.len(),
        };
        let mut buffer = std::mem::take(&mut self.buffer);
        self.render(&mut buffer[range.clone()]);
        self.buffer = buffer;
        &self.buffer[range]
    }

    /// Play `note` with `instrument` on `channel`, outside of the song
    pub fn trigger_instrument(&mut self, channel: usize, instrument: &Instrument, note: u8) {
        self.tracker
            .trigger_instrument(&mut self.engine, channel, instrument, note);
    }

    /// Mute or unmute a channel
    pub fn set_channel_mute(&mut self, channel: usize, muted: bool) {
        self.tracker.set_channel_mute(channel, muted);
    }

    /// Set the global output scale (clamped to `0..=0x80`)
    pub fn set_master_volume(&mut self, volume: u8) {
        self.engine.master_volume = volume.min(MAX_ADSR_VOLUME);
    }

    /// Global output scale; it lives on the sound engine, not the sequencer
    pub fn master_volume(&self) -> u8 {
        self.engine.master_volume
    }

    /// Seek to a sequence step and row
    pub fn set_position(&mut self, sequence_position: u16, pattern_position: u16) {
        self.tracker
            .set_position(sequence_position, pattern_position);
    }

    /// Sound engine
    pub fn engine(&self) -> &SoundEngine {
        &self.engine
    }

    /// Sequencer
    pub fn tracker(&self) -> &TrackerEngine {
        &self.tracker
    }

    /// Output sample rate
    pub fn sample_rate(&self) -> u32 {
        self.engine.sample_rate()
    }

    /// Samples left before the next sequencer tick
    pub fn samples_until_tick(&self) -> u32 {
        self.clock.samples_until_tick()
    }

    /// Seconds rendered so far
    pub fn elapsed_seconds(&self) -> f64 {
        self.clock.elapsed_seconds()
    }
}

impl PlaybackController for Player {
    fn play(&mut self) -> Result<()> {
        if self.tracker.song().is_none() {
            return Err(TrackerError::Other("no song loaded".into()));
        }
        if self.state != PlaybackState::Playing {
            self.tracker.start(&mut self.engine);
            self.clock.set_rate(self.tracker.rate());
            self.state = PlaybackState::Playing;
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        if self.state == PlaybackState::Playing {
            self.tracker.stop(&mut self.engine);
            self.state = PlaybackState::Paused;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.tracker.stop(&mut self.engine);
        self.tracker.set_position(0, 0);
        self.state = PlaybackState::Stopped;
        Ok(())
    }

    fn state(&self) -> PlaybackState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound_engine::OUTPUT_CENTER;
    use crate::tracker::PatternStep;

    fn one_note_song() -> TrackerSong {
        let mut song = TrackerSong::new();
        song.add_instrument(Instrument::named("lead"));
        if let Some(step) = song.step_mut(0, 0) {
            *step = PatternStep::new(48, 0, 0x10, 0);
        }
        song
    }

    fn player() -> Player {
        Player::new(&EngineConfig {
            sample_rate: 8_000,
            audio_buffer_size: 256,
            ..EngineConfig::default()
        })
    }

    #[test]
    fn test_play_without_song_fails() {
        let mut p = player();
        assert!(p.play().is_err());
        assert_eq!(p.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_state_transitions() {
        let mut p = player();
        p.load_song(one_note_song()).unwrap();
        p.play().unwrap();
        assert_eq!(p.state(), PlaybackState::Playing);
        p.pause().unwrap();
        assert_eq!(p.state(), PlaybackState::Paused);
        p.play().unwrap();
        assert_eq!(p.state(), PlaybackState::Playing);
        p.stop().unwrap();
        assert_eq!(p.state(), PlaybackState::Stopped);
        assert_eq!(p.tracker().pattern_position(), 0);
    }

    #[test]
    fn test_render_ticks_at_song_rate() {
        let mut p = player();
        p.load_song(one_note_song()).unwrap();
        p.play().unwrap();
        // 60 Hz at 8 kHz: 133.33 samples per tick, speed 6 -> one row every 800 samples
        let mut buf = vec![0u16; 800];
        p.render(&mut buf);
        assert_eq!(p.tracker().pattern_position(), 1);
        assert!(buf.iter().any(|&s| s != OUTPUT_CENTER));
    }

    #[test]
    fn test_stop_silences_output() {
        let mut p = player();
        p.load_song(one_note_song()).unwrap();
        p.play().unwrap();
        let mut buf = vec![0u16; 400];
        p.render(&mut buf);
        p.stop().unwrap();
        p.render(&mut buf);
        assert!(buf.iter().all(|&s| s == OUTPUT_CENTER));
    }

    #[test]
    fn test_published_song_adopted_on_tick() {
        let mut p = player();
        p.load_song(one_note_song()).unwrap();
        let handle = p.song_handle();
        let mut edited = one_note_song();
        edited.set_name("edited");
        handle.publish(edited).unwrap();
        assert_eq!(p.song().map(|s| s.name()), Some("untitled".to_string()));
        p.tick();
        assert_eq!(p.song().map(|s| s.name()), Some("edited".to_string()));
        assert!(!handle.is_pending());
    }

    #[test]
    fn test_unload_stops_player() {
        let mut p = player();
        p.load_song(one_note_song()).unwrap();
        p.play().unwrap();
        p.song_handle().unload();
        p.tick();
        assert!(p.song().is_none());
        assert_eq!(p.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_song_end_sets_stopped() {
        let mut song = TrackerSong::new();
        song.set_pattern_length(1);
        song.speed = 1;
        let mut p = player();
        p.load_song(song).unwrap();
        p.play().unwrap();
        p.tick();
        assert_eq!(p.state(), PlaybackState::Stopped);
        assert!(!p.tracker().is_playing());
    }

    #[test]
    fn test_fill_half_lengths() {
        let mut p = player();
        assert_eq!(p.fill_half(BufferHalf::First).len(), 128);
        assert_eq!(p.fill_half(BufferHalf::Second).len(), 128);
    }
}
