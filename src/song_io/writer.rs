//! `FZT!` / `FZI!` writers (little-endian, current format version)

use super::{FORMAT_VERSION, INSTRUMENT_MAGIC, SONG_MAGIC};
use crate::tracker::instrument::Instrument;
use crate::tracker::song::TrackerSong;
use crate::Result;

/// Serialize a song
///
/// The song is validated first so a written file always loads back.
pub fn write_song(song: &TrackerSong) -> Result<Vec<u8>> {
    song.validate()?;

    let steps = song.pattern_length as usize;
    let mut out = Vec::with_capacity(
        64 + song.sequence.len() * 4 + song.pattern.len() * steps * 4 + song.instrument.len() * 96,
    );

    out.extend_from_slice(SONG_MAGIC);
    out.push(FORMAT_VERSION);
    out.extend_from_slice(&song.name);
    out.push(song.speed);
    out.push(song.rate);
    out.extend_from_slice(&song.pattern_length.to_le_bytes());
    out.push(song.loop_start);
    out.push(song.loop_end);
    out.push(song.loop_enabled as u8);
    out.extend_from_slice(&(song.sequence.len() as u16).to_le_bytes());
    out.extend_from_slice(&(song.pattern.len() as u16).to_le_bytes());
    out.push(song.instrument.len() as u8);

    for step in &song.sequence {
        out.extend_from_slice(&step.pattern_indices);
    }
    for pattern in &song.pattern {
        for step in &pattern.step {
            out.push(step.note);
            out.push(step.inst_vol);
            out.extend_from_slice(&step.command.to_le_bytes());
        }
    }
    for instrument in &song.instrument {
        write_instrument_record(&mut out, instrument);
    }
    Ok(out)
}

/// Serialize a single instrument
pub fn write_instrument(instrument: &Instrument) -> Vec<u8> {
    let mut out = Vec::with_capacity(96);
    out.extend_from_slice(INSTRUMENT_MAGIC);
    out.push(FORMAT_VERSION);
    write_instrument_record(&mut out, instrument);
    out
}

fn write_instrument_record(out: &mut Vec<u8>, ins: &Instrument) {
    out.extend_from_slice(&ins.name);
    out.extend_from_slice(&[
        ins.waveform.bits(),
        ins.flags.bits(),
        ins.sound_engine_flags.bits(),
        ins.base_note,
        ins.finetune as u8,
        ins.slide_speed,
        ins.attack,
        ins.decay,
        ins.sustain,
        ins.release,
        ins.volume,
    ]);
    out.extend_from_slice(&ins.pw.to_le_bytes());
    out.push(ins.ring_mod);
    out.push(ins.hard_sync);
    out.extend_from_slice(&ins.filter_cutoff.to_le_bytes());
    out.push(ins.filter_resonance);
    out.push(ins.filter_type as u8);
    out.extend_from_slice(&[
        ins.vibrato_speed,
        ins.vibrato_depth,
        ins.vibrato_delay,
        ins.pwm_speed,
        ins.pwm_depth,
        ins.pwm_delay,
        ins.program_period,
    ]);
    for slot in ins.program {
        out.extend_from_slice(&slot.to_le_bytes());
    }
}
