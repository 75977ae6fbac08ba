//! fztracker command line
//!
//! # Commands
//!
//! - `fztracker render <song.fzt> -o out.wav` - render a song to WAV
//! - `fztracker info <song.fzt>` - print song structure
//! - `fztracker demo -o demo.wav` - render the built-in demo song
//! - `fztracker play <song.fzt>` - play through the audio device (`streaming` feature)

mod demo;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use fztracker::export::export_to_wav;
use fztracker::replayer::Player;
use fztracker::song_io::{load_song_file, save_song_file};
use fztracker::tracker::TrackerSong;
use fztracker::EngineConfig;

/// Fixed-point chiptune tracker
#[derive(Parser)]
#[command(name = "fztracker")]
#[command(about = "Render and play fztracker songs")]
#[command(version)]
struct Cli {
    /// Engine configuration (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a song to a WAV file
    Render {
        /// Song file
        song: PathBuf,
        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,
        /// Length limit in seconds
        #[arg(long, default_value_t = 300.0)]
        seconds: f32,
    },

    /// Print song structure
    Info {
        /// Song file
        song: PathBuf,
    },

    /// Render the built-in demo song
    Demo {
        /// Output WAV file
        #[arg(short, long, default_value = "demo.wav")]
        output: PathBuf,
        /// Length limit in seconds
        #[arg(long, default_value_t = 60.0)]
        seconds: f32,
        /// Also save the demo as a song file
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Play a song through the default audio device
    Play {
        /// Song file
        song: PathBuf,
        /// Stop after this many seconds
        #[arg(long)]
        seconds: Option<f32>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Render {
            song,
            output,
            seconds,
        } => {
            let song = load(&song)?;
            render(&config, song, &output, seconds)
        }
        Commands::Info { song } => {
            print_info(&load(&song)?);
            Ok(())
        }
        Commands::Demo {
            output,
            seconds,
            save,
        } => {
            let song = demo::demo_song();
            if let Some(path) = save {
                save_song_file(&path, &song)
                    .with_context(|| format!("saving {}", path.display()))?;
                info!(path = %path.display(), "demo song saved");
            }
            render(&config, song, &output, seconds)
        }
        Commands::Play { song, seconds } => play(&config, load(&song)?, seconds),
    }
}

fn load(path: &Path) -> Result<TrackerSong> {
    load_song_file(path).with_context(|| format!("loading {}", path.display()))
}

fn render(config: &EngineConfig, song: TrackerSong, output: &Path, seconds: f32) -> Result<()> {
    let mut player = Player::new(config);
    player.load_song(song)?;
    let frames = export_to_wav(&mut player, output, seconds)
        .with_context(|| format!("writing {}", output.display()))?;
    info!(
        path = %output.display(),
        seconds = frames as f64 / player.sample_rate() as f64,
        "render complete"
    );
    Ok(())
}

fn print_info(song: &TrackerSong) {
    let rows = song.num_sequence_steps() as u32 * song.pattern_length as u32;
    let seconds = rows as f32 * song.speed as f32 / song.rate.max(1) as f32;

    println!("Title:          {}", song.name());
    println!("Speed / rate:   {} ticks/row, {} Hz", song.speed, song.rate);
    println!("Pattern length: {}", song.pattern_length);
    println!("Sequence steps: {}", song.num_sequence_steps());
    println!("Patterns:       {}", song.pattern.len());
    if song.loop_enabled {
        println!("Loop:           {}..={}", song.loop_start, song.loop_end);
    }
    println!("Length:         ~{seconds:.1}s (without tempo effects)");
    println!("Instruments:");
    for (i, inst) in song.instrument.iter().enumerate() {
        let program = if inst.has_program() { " +program" } else { "" };
        println!("  {i:02} {:<32} {:?}{program}", inst.name(), inst.waveform);
    }
}

#[cfg(feature = "streaming")]
fn play(config: &EngineConfig, song: TrackerSong, seconds: Option<f32>) -> Result<()> {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use fztracker::replayer::PlaybackController;
    use fztracker::AudioDevice;
    use parking_lot::Mutex;

    let mut player = Player::new(config);
    player.load_song(song)?;
    player.play()?;

    let device = AudioDevice::new(Arc::new(Mutex::new(player)))?;
    info!("playing, Ctrl+C to quit");

    let poll = Duration::from_millis(50);
    match seconds {
        Some(limit) => {
            let start = Instant::now();
            let limit = Duration::from_secs_f32(limit.max(0.0));
            while !device.is_song_finished() && start.elapsed() < limit {
                std::thread::sleep(poll);
            }
        }
        None => device.wait_for_song_end(poll),
    }
    Ok(())
}

#[cfg(not(feature = "streaming"))]
fn play(_config: &EngineConfig, _song: TrackerSong, _seconds: Option<f32>) -> Result<()> {
    anyhow::bail!("playback requires the \"streaming\" feature; rebuild with `--features streaming`")
}
