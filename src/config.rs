//! Engine configuration
//!
//! Loaded from JSON; every field has a default so partial files work.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::sound_engine::MAX_ADSR_VOLUME;
use crate::{Result, TrackerError};

/// Lowest accepted output rate
pub const MIN_SAMPLE_RATE: u32 = 8_000;
/// Highest accepted output rate
pub const MAX_SAMPLE_RATE: u32 = 192_000;

/// Sound engine setup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Circular buffer length in samples (even, split into two halves)
    pub audio_buffer_size: usize,
    /// Global output scale (0..=0x80)
    pub master_volume: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            audio_buffer_size: 1024,
            master_volume: MAX_ADSR_VOLUME,
        }
    }
}

impl EngineConfig {
    /// Small buffer for low-latency playback
    pub fn low_latency(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            audio_buffer_size: 256,
            ..Self::default()
        }
    }

    /// Clamp every field into its supported range
    ///
    /// Each correction is logged.
    pub fn validated(mut self) -> Self {
        let rate = self.sample_rate.clamp(MIN_SAMPLE_RATE, MAX_SAMPLE_RATE);
        if rate != self.sample_rate {
            warn!(requested = self.sample_rate, used = rate, "sample rate clamped");
            self.sample_rate = rate;
        }

        let size = (self.audio_buffer_size.max(2) + 1) & !1;
        if size != self.audio_buffer_size {
            warn!(
                requested = self.audio_buffer_size,
                used = size,
                "audio buffer size must be even"
            );
            self.audio_buffer_size = size;
        }

        if self.master_volume > MAX_ADSR_VOLUME {
            warn!(requested = self.master_volume, "master volume clamped");
            self.master_volume = MAX_ADSR_VOLUME;
        }
        self
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| TrackerError::ConfigError(e.to_string()))?;
        Ok(config.validated())
    }

    /// Load and validate a JSON configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Serialize as pretty JSON
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| TrackerError::ConfigError(e.to_string()))
    }
}
