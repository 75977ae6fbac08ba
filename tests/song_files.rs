use std::sync::Arc;

use fztracker::song_io::{
    load_instrument_file, load_song_file, load_song_into, save_instrument_file, save_song_file,
    write_song, FORMAT_VERSION,
};
use fztracker::sound_engine::{
    ChannelFlags, FilterType, SoundEngine, Waveform, MAX_ADSR_VOLUME, MAX_CUTOFF,
};
use fztracker::tracker::program::{PROGRAM_END, PROGRAM_JUMP, PROGRAM_LOOP_BEGIN, PROGRAM_LOOP_END};
use fztracker::tracker::song::VOLUME_NONE;
use fztracker::tracker::{
    make_command, make_extended, Effect, ExtendedEffect, Instrument, InstrumentFlags, PatternStep,
    SequenceStep, TrackerEngine, TrackerSong,
};
use fztracker::{EngineConfig, PlaybackController, Player, TrackerError};

fn sample_song() -> TrackerSong {
    let mut song = TrackerSong::new();
    song.set_name("file test");
    song.set_pattern_length(32);
    song.speed = 4;
    song.rate = 50;
    song.add_pattern();
    song.add_sequence_step(SequenceStep {
        pattern_indices: [1, 0, 1, 0],
    });
    song.loop_enabled = true;
    song.loop_start = 0;
    song.loop_end = 1;

    let mut pluck = Instrument::named("pluck");
    pluck.waveform = Waveform::PULSE | Waveform::TRIANGLE;
    pluck.sound_engine_flags = ChannelFlags::KEY_SYNC | ChannelFlags::FILTER;
    pluck.filter_type = FilterType::BandPass;
    pluck.filter_resonance = 0x40;
    pluck.program[0] = PROGRAM_LOOP_BEGIN;
    pluck.program[1] = make_command(Effect::PwUp, 0x10);
    pluck.program[2] = PROGRAM_LOOP_END | 3;
    pluck.program[3] = PROGRAM_JUMP;
    pluck.program[4] = PROGRAM_END;
    song.add_instrument(pluck);

    for row in (0..32).step_by(8) {
        if let Some(step) = song.step_mut(0, row) {
            *step = PatternStep::new(48 + row as u8 / 2, 1, 0x0E, make_command(Effect::Vibrato, 0x42));
        }
        if let Some(step) = song.step_mut(1, row + 4) {
            *step = PatternStep::new(36, 0, 0x10, 0);
        }
    }
    song
}

#[test]
fn song_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("song.fzt");
    let song = sample_song();

    save_song_file(&path, &song).unwrap();
    let loaded = load_song_file(&path).unwrap();
    assert_eq!(loaded, song);
    assert_eq!(loaded.name(), "file test");
}

#[test]
fn instrument_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pluck.fzi");
    let song = sample_song();
    let pluck = song.instrument[1];

    save_instrument_file(&path, &pluck).unwrap();
    assert_eq!(load_instrument_file(&path).unwrap(), pluck);
}

#[test]
fn loaded_song_renders_like_the_original() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("song.fzt");
    save_song_file(&path, &sample_song()).unwrap();

    let config = EngineConfig::default();
    let mut a = Player::new(&config);
    let mut b = Player::new(&config);
    a.load_song(sample_song()).unwrap();
    b.load_song(load_song_file(&path).unwrap()).unwrap();
    a.play().unwrap();
    b.play().unwrap();

    let mut buf_a = vec![0u16; 16_384];
    let mut buf_b = vec![0u16; 16_384];
    a.render(&mut buf_a);
    b.render(&mut buf_b);
    assert_eq!(buf_a, buf_b);
}

#[test]
fn newer_version_is_rejected_without_touching_the_song() {
    let mut bytes = write_song(&sample_song()).unwrap();
    bytes[4] = FORMAT_VERSION + 1;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.fzt");
    std::fs::write(&path, &bytes).unwrap();

    match load_song_file(&path) {
        Err(TrackerError::UnsupportedVersion { found, supported }) => {
            assert_eq!(found, FORMAT_VERSION + 1);
            assert_eq!(supported, FORMAT_VERSION);
        }
        other => panic!("expected UnsupportedVersion, got {other:?}"),
    }

    let mut current = TrackerSong::new();
    let before = current.clone();
    assert!(!load_song_into(&mut current, &bytes));
    assert_eq!(current, before);
}

#[test]
fn truncated_and_foreign_files_are_errors() {
    let bytes = write_song(&sample_song()).unwrap();
    for len in [0, 3, 5, 40, bytes.len() / 2, bytes.len() - 1] {
        assert!(fztracker::load_song(&bytes[..len]).is_err(), "length {len}");
    }

    let mut foreign = bytes.clone();
    foreign[..4].copy_from_slice(b"RIFF");
    assert!(matches!(
        fztracker::load_song(&foreign),
        Err(TrackerError::Parse(_))
    ));
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        load_song_file(dir.path().join("nope.fzt")),
        Err(TrackerError::Io(_))
    ));
}

#[test]
fn loaded_instrument_with_out_of_range_fields_plays() {
    let mut song = TrackerSong::new();
    song.set_pattern_length(16);
    song.speed = 2;
    let mut hot = Instrument::named("hot");
    hot.volume = 0xFF;
    hot.filter_cutoff = 0xFFFF;
    hot.flags |= InstrumentFlags::SET_CUTOFF;
    song.instrument = vec![hot];
    if let Some(step) = song.step_mut(0, 0) {
        *step = PatternStep::new(48, 0, VOLUME_NONE, make_extended(ExtendedEffect::FineVolumeUp, 1));
    }
    if let Some(step) = song.step_mut(1, 0) {
        *step = PatternStep::new(48, 0, VOLUME_NONE, make_command(Effect::CutoffUp, 1));
    }

    let loaded = fztracker::load_song(&write_song(&song).unwrap()).unwrap();

    let mut engine = SoundEngine::new(44_100, 256);
    let mut tracker = TrackerEngine::new();
    tracker.set_song(&mut engine, Some(Arc::new(loaded.clone())));
    tracker.start(&mut engine);
    for _ in 0..8 {
        tracker.advance_tick(&mut engine);
        assert!(tracker.channel[0].volume <= MAX_ADSR_VOLUME);
        assert!(tracker.channel[1].filter_cutoff <= MAX_CUTOFF);
    }
    assert_eq!(tracker.channel[0].volume, MAX_ADSR_VOLUME);
    assert_eq!(tracker.channel[1].filter_cutoff, MAX_CUTOFF);

    let mut player = Player::new(&EngineConfig::default());
    player.load_song(loaded).unwrap();
    player.play().unwrap();
    let mut buffer = vec![0u16; 8192];
    player.render(&mut buffer);
}
