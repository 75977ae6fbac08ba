//! Real-time playback through the system audio device
//!
//! [`PlayerSource`] adapts a shared [`Player`] into a `rodio` source: the
//! audio thread pulls samples in small batches, so ticks and buffer fills
//! stay interleaved exactly as in offline rendering. The foreground keeps
//! a clone of the `Arc` to start, stop or preview instruments.

mod audio_device;

pub use audio_device::AudioDevice;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rodio::Source;

use crate::export::to_pcm;
use crate::replayer::Player;

/// Samples rendered per lock of the player
pub const SOURCE_BATCH: usize = 512;

/// `rodio` source pulling mono samples from a shared player
pub struct PlayerSource {
    player: Arc<Mutex<Player>>,
    sample_rate: u32,
    finished: Arc<AtomicBool>,
    buffer: Vec<u16>,
    buffer_pos: usize,
}

impl PlayerSource {
    /// Wrap a shared player; `finished` ends the stream when set
    pub fn new(player: Arc<Mutex<Player>>, finished: Arc<AtomicBool>) -> Self {
        let sample_rate = player.lock().sample_rate();
        Self {
            player,
            sample_rate,
            finished,
            buffer: vec![0; SOURCE_BATCH],
            buffer_pos: SOURCE_BATCH,
        }
    }

    fn refill(&mut self) {
        self.player.lock().render(&mut self.buffer);
        self.buffer_pos = 0;
    }
}

impl Iterator for PlayerSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.finished.load(Ordering::Relaxed) {
            return None;
        }
        if self.buffer_pos >= self.buffer.len() {
            self.refill();
        }
        let sample = self.buffer[self.buffer_pos];
        self.buffer_pos += 1;
        Some(to_pcm(sample) as f32 / 32768.0)
    }
}

impl Source for PlayerSource {
    fn current_frame_len(&self) -> Option<usize> {
        let remaining = self.buffer.len().saturating_sub(self.buffer_pos);
        Some(if remaining == 0 { SOURCE_BATCH } else { remaining })
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}
