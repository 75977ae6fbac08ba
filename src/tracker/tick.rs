//! Tick processing and song advancement.
//!
//! One call to [`TrackerEngine::advance_tick`] handles:
//! - Reading the current row for every channel and triggering notes
//! - Running the row commands and instrument programs
//! - Vibrato / PWM LFOs and note slides
//! - Row, pattern and sequence advance (including skip and pattern loop)

use std::sync::Arc;

use tracing::debug;

use super::effects::{is_slide, note_delay, split_command, Effect};
use super::song::{
    PatternStep, TrackerSong, INSTRUMENT_NONE, MAX_STEP_VOLUME, NOTE_NONE, NOTE_RELEASE,
    VOLUME_NONE,
};
use super::{note_frequency, InstrumentFlags, TrackerEngine, MAX_NOTE};
use crate::sound_engine::oscillator::MAX_PULSE_WIDTH;
use crate::sound_engine::tables::sine_signed;
use crate::sound_engine::{SoundEngine, MAX_ADSR_VOLUME, NUM_CHANNELS};

/// Step volume to channel volume
const STEP_VOLUME_SCALE: u8 = 8;

impl TrackerEngine {
    /// Advance the sequencer by one tick
    ///
    /// Channels with a live-preview note keep their programs and LFOs
    /// running while stopped.
    pub fn advance_tick(&mut self, engine: &mut SoundEngine) {
        let song = if self.playing { self.song.clone() } else { None };

        for channel in 0..NUM_CHANNELS {
            if let Some(song) = song.as_deref() {
                self.process_step(engine, channel, song);
            }
            self.run_program(engine, channel);
            self.update_channel(engine, channel);
        }

        if let Some(song) = song {
            self.advance_position(engine, &song);
        }
    }

    fn process_step(&mut self, engine: &mut SoundEngine, channel: usize, song: &TrackerSong) {
        let step = song.step_at(self.sequence_position, channel, self.pattern_position);
        let command = step.command();
        let tick = self.current_tick;

        if tick == 0 && self.channel[channel].pattern_arpeggio {
            let (id, param) = split_command(command);
            if id != Effect::Arpeggio as u8 || param == 0 {
                self.channel[channel].arpeggio_note = 0;
                self.channel[channel].pattern_arpeggio = false;
            }
        }

        if note_delay(command) == tick {
            self.trigger_step(engine, channel, song, step);
        }

        self.do_command(engine, channel, command, tick, false);
    }

    fn trigger_step(
        &mut self,
        engine: &mut SoundEngine,
        channel: usize,
        song: &TrackerSong,
        step: PatternStep,
    ) {
        let instrument_index = step.instrument();
        if instrument_index != INSTRUMENT_NONE {
            // Without a note this only selects the instrument and its volume;
            // the sounding voice keeps its timbre until the next note.
            // Invalid indices silence the channel.
            let instrument = song.instrument.get(instrument_index as usize).copied();
            let ch = &mut self.channel[channel];
            ch.instrument = instrument;
            match instrument {
                Some(instrument) => ch.volume = instrument.volume.min(MAX_ADSR_VOLUME),
                None => engine.channel[channel].silence(),
            }
        }

        let note = step.note();
        if note == NOTE_RELEASE {
            engine.enable_gate(channel, false);
        } else if note != NOTE_NONE {
            if let Some(instrument) = self.channel[channel].instrument {
                let command = step.command();
                let sounding = engine.channel[channel].is_active();
                if is_slide(command) && sounding {
                    self.start_slide(engine, channel, &instrument, note, command as u8);
                } else {
                    self.trigger_note(engine, channel, &instrument, note);
                }
            }
        }

        let volume = step.volume();
        if volume != VOLUME_NONE {
            self.channel[channel].volume = volume.min(MAX_STEP_VOLUME) * STEP_VOLUME_SCALE;
        }
    }

    fn start_slide(
        &mut self,
        engine: &mut SoundEngine,
        channel: usize,
        instrument: &super::Instrument,
        note: u8,
        speed: u8,
    ) {
        let target = super::pitch_for(instrument, note);
        let ch = &mut self.channel[channel];
        ch.target_note = target;
        ch.last_note = target;
        if speed == 0 {
            // Legato: jump without retriggering
            ch.note = target;
        } else {
            ch.slide_speed = speed as u16;
        }
        if instrument.flags.contains(InstrumentFlags::RETRIGGER_ON_SLIDE) {
            engine.enable_gate(channel, true);
        }
    }

    /// Run LFOs and slides, then push pitch, pulse width, volume and filter
    /// to the voice
    pub(crate) fn update_channel(&mut self, engine: &mut SoundEngine, channel: usize) {
        let ch = &mut self.channel[channel];
        if ch.instrument.is_none() {
            return;
        }

        if ch.note != ch.target_note {
            let step = ch.slide_speed.max(1) as i32 * 4;
            let note = ch.note as i32;
            let target = ch.target_note as i32;
            ch.note = if note < target {
                (note + step).min(target)
            } else {
                (note - step).max(target)
            } as u16;
        }

        let mut vibrato = 0;
        if ch.vibrato_delay > 0 {
            ch.vibrato_delay -= 1;
        } else if ch.vibrato_depth > 0 {
            ch.vibrato_position = ch
                .vibrato_position
                .wrapping_add(ch.vibrato_speed.wrapping_mul(4));
            vibrato = (sine_signed(ch.vibrato_position) * ch.vibrato_depth as i32) >> 6;
        }

        let mut pwm = 0;
        if ch.pwm_delay > 0 {
            ch.pwm_delay -= 1;
        } else if ch.pwm_depth > 0 {
            ch.pwm_position = ch.pwm_position.wrapping_add(ch.pwm_speed.wrapping_mul(4));
            pwm = (sine_signed(ch.pwm_position) * ch.pwm_depth as i32) >> 4;
        }

        let pitch = (ch.base_pitch() + vibrato).clamp(0, MAX_NOTE as i32) as u16;
        let pulse_width = (ch.pw as i32 + pwm).clamp(0, MAX_PULSE_WIDTH as i32) as u16;
        let volume = if ch.muted { 0 } else { ch.volume };
        let (cutoff, resonance, filter_type) =
            (ch.filter_cutoff, ch.filter_resonance, ch.filter_type);

        engine.set_channel_frequency(channel, note_frequency(pitch));
        let voice = &mut engine.channel[channel];
        voice.osc.pulse_width = pulse_width;
        voice.adsr.volume = volume;
        voice.filter.set_coefficients(cutoff, resonance);
        voice.filter.filter_type = filter_type;
    }

    fn advance_position(&mut self, engine: &mut SoundEngine, song: &Arc<TrackerSong>) {
        if let Some(row) = self.pending_skip.take() {
            self.current_tick = 0;
            self.pending_loop = None;
            self.advance_sequence(engine, song);
            self.pattern_position = row.min(song.pattern_length.saturating_sub(1));
            return;
        }

        self.current_tick += 1;
        if self.current_tick < self.speed.max(1) {
            return;
        }
        self.current_tick = 0;

        if let Some(row) = self.pending_loop.take() {
            self.pattern_position = row;
            return;
        }

        self.pattern_position += 1;
        if self.pattern_position >= song.pattern_length {
            self.pattern_position = 0;
            self.advance_sequence(engine, song);
        }
    }

    fn advance_sequence(&mut self, engine: &mut SoundEngine, song: &TrackerSong) {
        self.loop_row = 0;
        self.loop_count = 0;

        let steps = song.num_sequence_steps();
        if song.loop_enabled && self.sequence_position >= song.loop_end as u16 {
            self.sequence_position = (song.loop_start as u16).min(steps.saturating_sub(1));
            return;
        }

        self.sequence_position += 1;
        if self.sequence_position >= steps {
            self.sequence_position = 0;
            self.playing = false;
            for channel in 0..NUM_CHANNELS {
                engine.enable_gate(channel, false);
            }
            debug!("sequence end reached");
        }
    }
}
