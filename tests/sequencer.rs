use std::sync::Arc;

use fztracker::sound_engine::{SoundEngine, Waveform, OUTPUT_CENTER};
use fztracker::tracker::program::{PROGRAM_END, PROGRAM_NOP};
use fztracker::tracker::song::{INSTRUMENT_NONE, NOTE_NONE, VOLUME_NONE};
use fztracker::tracker::{
    make_command, Effect, Instrument, PatternStep, SequenceStep, TrackerEngine, TrackerSong,
};
use fztracker::{EngineConfig, PlaybackController, Player};

fn song(pattern_length: u16, speed: u8, sequence_steps: usize) -> TrackerSong {
    let mut song = TrackerSong::new();
    song.set_pattern_length(pattern_length);
    song.speed = speed;
    for _ in 1..sequence_steps {
        song.add_sequence_step(SequenceStep::default());
    }
    song
}

fn start(song: TrackerSong) -> (TrackerEngine, SoundEngine) {
    let mut engine = SoundEngine::new(44_100, 256);
    let mut tracker = TrackerEngine::new();
    tracker.set_song(&mut engine, Some(Arc::new(song)));
    tracker.start(&mut engine);
    (tracker, engine)
}

#[test]
fn skip_pattern_moves_to_next_sequence_step_in_the_same_tick() {
    let mut s = song(4, 6, 2);
    if let Some(step) = s.step_mut(0, 0) {
        step.set_command(make_command(Effect::SkipPattern, 0));
    }
    let (mut tracker, mut engine) = start(s);

    tracker.advance_tick(&mut engine);
    assert_eq!(tracker.sequence_position(), 1);
    assert_eq!(tracker.pattern_position(), 0);
    assert_eq!(tracker.current_tick(), 0);
    assert!(tracker.is_playing());
}

#[test]
fn skip_pattern_lands_on_requested_row() {
    let mut s = song(8, 2, 2);
    if let Some(step) = s.step_mut(0, 1) {
        step.set_command(make_command(Effect::SkipPattern, 5));
    }
    let (mut tracker, mut engine) = start(s);

    for _ in 0..3 {
        tracker.advance_tick(&mut engine);
    }
    assert_eq!(tracker.sequence_position(), 1);
    assert_eq!(tracker.pattern_position(), 5);
}

#[test]
fn program_sets_cutoff_once_and_holds() {
    let mut inst = Instrument::named("prog");
    inst.program = [PROGRAM_NOP; 16];
    inst.program[0] = make_command(Effect::SetCutoff, 0x20);
    inst.program[15] = PROGRAM_END;
    inst.program_period = 1;

    let mut s = song(64, 6, 1);
    s.instrument = vec![inst];
    if let Some(step) = s.step_mut(0, 0) {
        *step = PatternStep::new(48, 0, 0x10, 0);
    }
    let (mut tracker, mut engine) = start(s);

    tracker.advance_tick(&mut engine);
    assert_eq!(tracker.channel[0].filter_cutoff, 0x100);

    for tick in 1..20 {
        tracker.advance_tick(&mut engine);
        assert_eq!(tracker.channel[0].filter_cutoff, 0x100, "tick {tick}");
    }
    assert!(!tracker.channel[0].program_running);
}

#[test]
fn stop_then_start_leaves_silence() {
    let mut s = song(16, 6, 1);
    if let Some(step) = s.step_mut(0, 0) {
        *step = PatternStep::new(48, 0, 0x10, 0);
    }
    let mut player = Player::new(&EngineConfig::default());
    player.load_song(s).unwrap();
    player.play().unwrap();

    let mut buffer = vec![0u16; 2048];
    player.render(&mut buffer);
    assert!(buffer.iter().any(|&s| s != OUTPUT_CENTER));

    player.stop().unwrap();
    player.render(&mut buffer);
    assert!(buffer.iter().all(|&s| s == OUTPUT_CENTER));
}

#[test]
fn muted_channel_keeps_position_but_is_silent() {
    let mut s = song(16, 1, 1);
    if let Some(step) = s.step_mut(0, 0) {
        *step = PatternStep::new(48, 0, 0x10, 0);
    }
    let mut player = Player::new(&EngineConfig::default());
    player.load_song(s).unwrap();
    player.set_channel_mute(0, true);
    player.play().unwrap();

    let mut buffer = vec![0u16; 4096];
    player.render(&mut buffer);
    assert!(player.tracker().pattern_position() > 0);
    assert!(buffer.iter().all(|&s| s == OUTPUT_CENTER));
}

#[test]
fn published_song_positions_are_clamped() {
    let mut player = Player::new(&EngineConfig::default());
    player.load_song(song(64, 6, 4)).unwrap();
    player.set_position(3, 40);
    assert_eq!(player.tracker().sequence_position(), 3);

    player.song_handle().publish(song(16, 6, 2)).unwrap();
    player.tick();
    assert_eq!(player.tracker().sequence_position(), 1);
    assert_eq!(player.tracker().pattern_position(), 15);
}

#[test]
fn invalid_song_is_rejected_and_current_song_kept() {
    let mut player = Player::new(&EngineConfig::default());
    let mut good = song(16, 6, 1);
    good.set_name("good");
    player.load_song(good).unwrap();

    let mut bad = song(16, 6, 1);
    bad.sequence[0].pattern_indices[2] = 9;
    assert!(player.load_song(bad.clone()).is_err());
    assert!(player.song_handle().publish(bad).is_err());
    player.tick();
    assert_eq!(player.song().map(|s| s.name()), Some("good".to_string()));
}

#[test]
fn two_players_render_identical_streams() {
    let mut s = song(16, 3, 2);
    let mut noise = Instrument::named("noise");
    noise.waveform = Waveform::NOISE;
    s.add_instrument(noise);
    for row in (0..16).step_by(4) {
        if let Some(step) = s.step_mut(0, row) {
            *step = PatternStep::new(36 + row as u8, (row / 4 % 2) as u8, 0x0C, 0);
        }
    }

    let config = EngineConfig::default();
    let mut a = Player::new(&config);
    let mut b = Player::new(&config);
    a.load_song(s.clone()).unwrap();
    b.load_song(s).unwrap();
    a.play().unwrap();
    b.play().unwrap();

    let mut buf_a = vec![0u16; 8192];
    let mut buf_b = vec![0u16; 8192];
    for _ in 0..8 {
        a.render(&mut buf_a);
        b.render(&mut buf_b);
        assert_eq!(buf_a, buf_b);
    }
}

#[test]
fn instrument_without_note_changes_volume_but_keeps_the_voice() {
    let mut lead = Instrument::named("lead");
    lead.waveform = Waveform::SAW;
    lead.volume = 0x60;
    let mut pad = Instrument::named("pad");
    pad.waveform = Waveform::TRIANGLE;
    pad.volume = 0x20;

    let mut s = song(16, 1, 1);
    s.instrument = vec![lead, pad];
    if let Some(step) = s.step_mut(0, 0) {
        *step = PatternStep::new(48, 0, VOLUME_NONE, 0);
    }
    if let Some(step) = s.step_mut(0, 1) {
        *step = PatternStep::new(NOTE_NONE, 1, VOLUME_NONE, 0);
    }
    if let Some(step) = s.step_mut(0, 2) {
        *step = PatternStep::new(50, INSTRUMENT_NONE, VOLUME_NONE, 0);
    }
    let (mut tracker, mut engine) = start(s);

    tracker.advance_tick(&mut engine);
    assert_eq!(engine.channel[0].osc.waveform, Waveform::SAW);

    tracker.advance_tick(&mut engine);
    assert_eq!(tracker.channel[0].volume, 0x20);
    assert_eq!(tracker.channel[0].instrument.map(|i| i.name()), Some("pad".to_string()));
    assert_eq!(engine.channel[0].osc.waveform, Waveform::SAW);

    tracker.advance_tick(&mut engine);
    assert_eq!(engine.channel[0].osc.waveform, Waveform::TRIANGLE);
}
