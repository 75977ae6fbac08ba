//! Audio export
//!
//! Renders a [`Player`](crate::replayer::Player) to a 16-bit PCM WAV file.
//!
//! ```no_run
//! use fztracker::export::export_to_wav;
//! use fztracker::replayer::Player;
//! use fztracker::EngineConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let song = fztracker::song_io::load_song_file("song.fzt")?;
//! let mut player = Player::new(&EngineConfig::default());
//! player.load_song(song)?;
//! export_to_wav(&mut player, "output.wav", 180.0)?;
//! # Ok(())
//! # }
//! ```

mod wav;

pub use wav::*;

use crate::sound_engine::OUTPUT_CENTER;

/// Export configuration options
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Number of audio channels (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Upper bound on the rendered length in seconds
    pub max_seconds: f32,
    /// Fade out duration in seconds (0 = no fade)
    pub fade_out_duration: f32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            channels: 1,
            max_seconds: 300.0,
            fade_out_duration: 0.0,
        }
    }
}

impl ExportConfig {
    /// Create config for stereo export
    pub fn stereo() -> Self {
        Self {
            channels: 2,
            ..Default::default()
        }
    }

    /// Set the length limit
    pub fn max_seconds(mut self, seconds: f32) -> Self {
        self.max_seconds = seconds.max(0.0);
        self
    }

    /// Set fade out duration in seconds
    pub fn fade_out(mut self, duration: f32) -> Self {
        self.fade_out_duration = duration.max(0.0);
        self
    }
}

/// Engine sample (centred at 0x8000) to signed PCM
pub fn to_pcm(sample: u16) -> i16 {
    (sample as i32 - OUTPUT_CENTER as i32) as i16
}

/// Apply a linear fade to the last `duration` seconds of `samples`
pub fn apply_fade_out(samples: &mut [i16], duration: f32, sample_rate: u32) {
    let fade_samples = ((duration * sample_rate as f32) as usize).min(samples.len());
    if fade_samples == 0 {
        return;
    }
    let start = samples.len() - fade_samples;
    for (i, sample) in samples[start..].iter_mut().enumerate() {
        let gain = 1.0 - i as f32 / fade_samples as f32;
        *sample = (*sample as f32 * gain) as i16;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_pcm_centre_and_extremes() {
        assert_eq!(to_pcm(OUTPUT_CENTER), 0);
        assert_eq!(to_pcm(0), i16::MIN);
        assert_eq!(to_pcm(u16::MAX), i16::MAX);
    }

    #[test]
    fn test_fade_out() {
        let mut samples = vec![1000i16; 100];
        apply_fade_out(&mut samples, 0.5, 100);
        assert_eq!(samples[0], 1000);
        assert_eq!(samples[50], 1000);
        assert!(samples[75] < 1000);
        assert!(samples[99] < 50);
    }
}
