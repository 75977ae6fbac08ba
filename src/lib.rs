//! Fixed-point sound chip and pattern tracker
//!
//! A four-voice software synthesizer (oscillator bank, ADSR envelopes,
//! state-variable filters) driven by a tracker sequencer with a per-tick
//! effect interpreter and per-instrument micro-programs. All DSP runs in
//! integer arithmetic so identical inputs produce identical sample streams.
//!
//! # Features
//! - Pulse, triangle, saw, sine and two LFSR noise waveforms, AND-combined
//! - Ring modulation and hard sync between voices
//! - Pattern/sequence playback with a tick-level effect interpreter
//! - 16-slot instrument programs with loops and jumps
//! - Versioned binary song (`FZT!`) and instrument (`FZI!`) files
//! - WAV export and optional real-time streaming
//!
//! # Crate feature flags
//! - `streaming` (opt-in): Real-time audio output (enables optional `rodio` dep)
//!
//! # Quick start
//! ```no_run
//! use fztracker::replayer::{PlaybackController, Player};
//! use fztracker::EngineConfig;
//!
//! let data = std::fs::read("song.fzt").unwrap();
//! let song = fztracker::song_io::load_song(&data).unwrap();
//! let mut player = Player::new(&EngineConfig::default());
//! player.load_song(song).unwrap();
//! player.play().unwrap();
//! let mut buffer = vec![0u16; 4096];
//! player.render(&mut buffer);
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod export;
pub mod replayer;
pub mod song_io;
pub mod sound_engine;
#[cfg(feature = "streaming")]
pub mod streaming;
pub mod tracker;

/// Error types for tracker operations
#[derive(thiserror::Error, Debug)]
pub enum TrackerError {
    /// Error while parsing a song or instrument file
    #[error("Parse error: {0}")]
    Parse(String),

    /// File written by a newer format version
    #[error("Unsupported format version {found} (newest supported is {supported})")]
    UnsupportedVersion {
        /// Version found in the file
        found: u8,
        /// Newest version this build reads
        supported: u8,
    },

    /// Song structure violates an invariant
    #[error("Invalid song: {0}")]
    InvalidSong(String),

    /// IO error from filesystem or device
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error writing audio file
    #[error("Audio file write error: {0}")]
    AudioFileError(String),

    /// Audio device error
    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for TrackerError {
    /// Converts a String into `TrackerError::Other`.
    ///
    /// Prefer the specific variants (`Parse`, `InvalidSong`, `ConfigError`,
    /// ...) where the failure kind is known.
    fn from(msg: String) -> Self {
        TrackerError::Other(msg)
    }
}

impl From<&str> for TrackerError {
    /// Converts a string slice into `TrackerError::Other`.
    fn from(msg: &str) -> Self {
        TrackerError::Other(msg.to_string())
    }
}

/// Result type for tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;

// Public API exports
pub use config::EngineConfig;
pub use export::export_to_wav;
pub use replayer::{PlaybackController, PlaybackState, Player, SongHandle, SongSlot};
pub use song_io::{load_song, load_song_into, write_song};
pub use sound_engine::{SoundEngine, NUM_CHANNELS};
#[cfg(feature = "streaming")]
pub use streaming::{AudioDevice, PlayerSource};
pub use tracker::{Instrument, TrackerEngine, TrackerSong};
