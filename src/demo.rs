//! Built-in demo song used by `fztracker demo`

use fztracker::sound_engine::{ChannelFlags, FilterType, Waveform};
use fztracker::tracker::program::ProgramStep;
use fztracker::tracker::song::{INSTRUMENT_NONE, NOTE_NONE, NOTE_RELEASE, VOLUME_NONE};
use fztracker::tracker::{
    make_command, make_extended, Effect, ExtendedEffect, Instrument, InstrumentFlags,
    SequenceStep, TrackerSong,
};

const ROWS: u16 = 32;

const LEAD: u8 = 0;
const BASS: u8 = 1;
const DRUM: u8 = 2;
const CHORD: u8 = 3;

fn lead() -> Instrument {
    let mut inst = Instrument::named("lead");
    inst.waveform = Waveform::PULSE;
    inst.flags |= InstrumentFlags::VIBRATO | InstrumentFlags::PWM;
    inst.pw = 0x600;
    inst.vibrato_speed = 0x20;
    inst.vibrato_depth = 0x18;
    inst.vibrato_delay = 0x10;
    inst.pwm_speed = 0x08;
    inst.pwm_depth = 0x30;
    inst.volume = 0x60;
    inst
}

fn bass() -> Instrument {
    let mut inst = Instrument::named("bass");
    inst.waveform = Waveform::SAW;
    inst.sound_engine_flags = ChannelFlags::KEY_SYNC | ChannelFlags::FILTER;
    inst.base_note = 48 + 12;
    inst.filter_cutoff = 0x180;
    inst.filter_resonance = 0x60;
    inst.filter_type = FilterType::LowPass;
    inst.decay = 0x20;
    inst.sustain = 0x60;
    inst
}

fn drum() -> Instrument {
    let mut inst = Instrument::named("drum");
    inst.waveform = Waveform::NOISE;
    inst.attack = 0;
    inst.decay = 0x10;
    inst.sustain = 0;
    inst.release = 0x08;
    inst.program_period = 2;
    inst.program[0] = ProgramStep::Effect {
        command: make_command(Effect::SetWaveform, Waveform::NOISE.bits()),
        unite: false,
    }
    .encode();
    inst.program[1] = ProgramStep::Effect {
        command: make_command(Effect::SetWaveform, Waveform::TRIANGLE.bits()),
        unite: false,
    }
    .encode();
    inst.program[2] = ProgramStep::End.encode();
    inst
}

fn chord() -> Instrument {
    let mut inst = Instrument::named("chord");
    inst.waveform = Waveform::TRIANGLE | Waveform::SAW;
    inst.volume = 0x40;
    inst.release = 0x20;
    inst
}

/// Fill a pattern from `(row, note, instrument, command)` cells
fn write_cells(song: &mut TrackerSong, pattern: usize, cells: &[(u16, u8, u8, u16)]) {
    for &(row, note, instrument, command) in cells {
        if let Some(step) = song.step_mut(pattern, row) {
            step.set_note(note);
            step.set_instrument(instrument);
            step.set_volume(VOLUME_NONE);
            step.set_command(command);
        }
    }
}

fn melody(notes: &[u8]) -> Vec<(u16, u8, u8, u16)> {
    notes
        .iter()
        .enumerate()
        .filter(|&(_, &n)| n != NOTE_NONE)
        .map(|(i, &n)| {
            let instrument = if n == NOTE_RELEASE { INSTRUMENT_NONE } else { LEAD };
            (i as u16 * 4, n, instrument, 0)
        })
        .collect()
}

/// Four channels, six patterns, four sequence steps
pub fn demo_song() -> TrackerSong {
    let mut song = TrackerSong::new();
    song.set_name("fztracker demo");
    song.instrument.clear();
    for inst in [lead(), bass(), drum(), chord()] {
        song.add_instrument(inst);
    }
    song.set_pattern_length(ROWS);
    song.speed = 6;
    song.rate = 50;
    for _ in 1..6 {
        song.add_pattern();
    }

    // 0, 4: lead phrases
    write_cells(&mut song, 0, &melody(&[60, 63, 67, 65, 63, 62, 60, NOTE_RELEASE]));
    let mut answer = melody(&[58, 60, 62, 63, NOTE_NONE, 67, 65, 63]);
    if let Some(cell) = answer.iter_mut().find(|cell| cell.0 == 20) {
        cell.3 = make_command(Effect::Slide, 0x40);
    }
    write_cells(&mut song, 4, &answer);

    // 1: bass
    let bass_line: Vec<_> = (0..ROWS / 4)
        .map(|i| {
            let note = if i % 4 == 3 { 43 } else { 36 };
            (i * 4, note, BASS, make_command(Effect::CutoffDown, 0x02))
        })
        .collect();
    write_cells(&mut song, 1, &bass_line);

    // 2: drums
    let beat: Vec<_> = (0..ROWS / 2)
        .map(|i| {
            let command = if i % 2 == 1 {
                make_extended(ExtendedEffect::NoteCut, 3)
            } else {
                0
            };
            (i * 2, 24 + (i % 2) as u8 * 12, DRUM, command)
        })
        .collect();
    write_cells(&mut song, 2, &beat);

    // 3, 5: arpeggiated chords, the arpeggio repeated on every row to keep it running
    for (pattern, chords) in [(3, [(48, 0x37), (53, 0x47)]), (5, [(51, 0x47), (50, 0x37)])] {
        for row in 0..ROWS {
            let (note, param) = chords[(row / 16) as usize];
            if let Some(step) = song.step_mut(pattern, row) {
                if row % 16 == 0 {
                    step.set_note(note);
                    step.set_instrument(CHORD);
                }
                step.set_command(make_command(Effect::Arpeggio, param));
            }
        }
    }
    if let Some(step) = song.step_mut(5, ROWS - 4) {
        step.set_note(NOTE_RELEASE);
        step.set_command(0);
    }

    song.sequence.clear();
    for indices in [[0, 1, 2, 3], [4, 1, 2, 3], [0, 1, 2, 5], [4, 1, 2, 5]] {
        song.add_sequence_step(SequenceStep {
            pattern_indices: indices,
        });
    }
    song
}
