//! Audio device integration using rodio

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rodio::{OutputStream, Sink};

use super::PlayerSource;
use crate::replayer::{PlaybackController, PlaybackState, Player};
use crate::{Result, TrackerError};

/// Audio playback device using rodio
pub struct AudioDevice {
    _stream: OutputStream,
    sink: Sink,
    player: Arc<Mutex<Player>>,
    finished: Arc<AtomicBool>,
}

impl AudioDevice {
    /// Open the default output device and start pulling from `player`
    pub fn new(player: Arc<Mutex<Player>>) -> Result<Self> {
        let (stream, stream_handle) = OutputStream::try_default().map_err(|e| {
            TrackerError::AudioDeviceError(format!("Failed to create audio stream: {e}"))
        })?;
        let sink = Sink::try_new(&stream_handle).map_err(|e| {
            TrackerError::AudioDeviceError(format!("Failed to create audio sink: {e}"))
        })?;

        let finished = Arc::new(AtomicBool::new(false));
        sink.append(PlayerSource::new(
            Arc::clone(&player),
            Arc::clone(&finished),
        ));

        Ok(AudioDevice {
            _stream: stream,
            sink,
            player,
            finished,
        })
    }

    /// Shared player driven by this device
    pub fn player(&self) -> &Arc<Mutex<Player>> {
        &self.player
    }

    /// Pause the output stream
    pub fn pause(&self) {
        self.sink.pause();
    }

    /// Resume the output stream
    pub fn play(&self) {
        self.sink.play();
    }

    /// Whether the song has stopped (or was never started)
    pub fn is_song_finished(&self) -> bool {
        self.player.lock().state() == PlaybackState::Stopped
    }

    /// Block until the song stops, polling every `poll` interval
    pub fn wait_for_song_end(&self, poll: Duration) {
        while !self.is_song_finished() {
            std::thread::sleep(poll);
        }
    }

    /// End the stream; the source returns `None` on its next pull
    pub fn finish(&self) {
        self.finished.store(true, Ordering::Relaxed);
    }
}

impl Drop for AudioDevice {
    fn drop(&mut self) {
        self.finish();
        self.sink.stop();
    }
}
