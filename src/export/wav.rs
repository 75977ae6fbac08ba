//! WAV file export functionality

use std::path::Path;

use tracing::info;

use super::{apply_fade_out, to_pcm, ExportConfig};
use crate::replayer::{PlaybackController, Player};
use crate::{Result, TrackerError};

/// Samples rendered per chunk
const SAMPLES_PER_CHUNK: usize = 4096;

/// Export playback to a mono WAV file
///
/// Plays from the player's current position until the song ends or
/// `max_seconds` of audio have been rendered, whichever comes first.
/// Returns the number of sample frames written.
pub fn export_to_wav<P: AsRef<Path>>(
    player: &mut Player,
    output_path: P,
    max_seconds: f32,
) -> Result<usize> {
    export_to_wav_with_config(
        player,
        output_path,
        ExportConfig::default().max_seconds(max_seconds),
    )
}

/// Export playback to a WAV file with custom configuration
pub fn export_to_wav_with_config<P: AsRef<Path>>(
    player: &mut Player,
    output_path: P,
    config: ExportConfig,
) -> Result<usize> {
    player.play()?;

    let sample_rate = player.sample_rate();
    let samples = render_samples(player, config.max_seconds);
    let mut pcm: Vec<i16> = samples.into_iter().map(to_pcm).collect();

    if config.fade_out_duration > 0.0 {
        apply_fade_out(&mut pcm, config.fade_out_duration, sample_rate);
    }

    info!(
        path = %output_path.as_ref().display(),
        seconds = pcm.len() as f64 / sample_rate as f64,
        "writing WAV file"
    );
    write_wav_file(
        output_path.as_ref(),
        &pcm,
        sample_rate,
        config.channels.max(1),
    )?;
    Ok(pcm.len())
}

/// Render until the song stops or the time limit is reached
fn render_samples(player: &mut Player, max_seconds: f32) -> Vec<u16> {
    let limit = (max_seconds.max(0.0) as f64 * player.sample_rate() as f64) as usize;
    let mut samples = Vec::with_capacity(limit.min(SAMPLES_PER_CHUNK * 64));
    let mut chunk = vec![0u16; SAMPLES_PER_CHUNK];

    while samples.len() < limit && player.tracker().is_playing() {
        let len = (limit - samples.len())
            .min(SAMPLES_PER_CHUNK)
            .min(player.samples_until_tick() as usize);
        player.render(&mut chunk[..len]);
        samples.extend_from_slice(&chunk[..len]);
    }
    samples
}

/// Write samples to WAV file
fn write_wav_file(path: &Path, samples: &[i16], sample_rate: u32, channels: u16) -> Result<()> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| TrackerError::AudioFileError(format!("Failed to create WAV file: {e}")))?;

    for &sample in samples {
        for _ in 0..channels {
            writer.write_sample(sample).map_err(|e| {
                TrackerError::AudioFileError(format!("Failed to write sample: {e}"))
            })?;
        }
    }

    writer
        .finalize()
        .map_err(|e| TrackerError::AudioFileError(format!("Failed to finalize WAV file: {e}")))?;

    Ok(())
}
