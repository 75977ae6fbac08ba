//! `FZT!` / `FZI!` parsers
//!
//! Built from `nom` combinators over little-endian fields. The header is
//! parsed and version-checked first; section sizes are bounds-checked before
//! anything is allocated for them.

use nom::bytes::complete::{tag, take};
use nom::multi::count;
use nom::number::complete::{le_i8, le_u16, le_u8};
use nom::IResult;
use num_traits::FromPrimitive;

use super::{FormatParser, FORMAT_VERSION, INSTRUMENT_MAGIC, SONG_MAGIC};
use crate::sound_engine::{ChannelFlags, FilterType, Waveform, NUM_CHANNELS};
use crate::tracker::instrument::{Instrument, InstrumentFlags};
use crate::tracker::program::PROGRAM_SLOTS;
use crate::tracker::song::{
    Pattern, PatternStep, SequenceStep, TrackerSong, MAX_INSTRUMENTS, MAX_PATTERNS,
    MAX_PATTERN_LENGTH, MAX_SEQUENCE_STEPS,
};
use crate::tracker::NAME_LEN;
use crate::{Result, TrackerError};

type Input<'a> = &'a [u8];

/// Song file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongHeader {
    /// Format version
    pub version: u8,
    /// NUL-padded title
    pub name: [u8; NAME_LEN],
    /// Ticks per row
    pub speed: u8,
    /// Ticks per second
    pub rate: u8,
    /// Rows per pattern
    pub pattern_length: u16,
    /// Loop range start
    pub loop_start: u8,
    /// Loop range end
    pub loop_end: u8,
    /// Loop range enabled
    pub loop_enabled: bool,
    /// Sequence length
    pub num_sequence_steps: u16,
    /// Pattern count
    pub num_patterns: u16,
    /// Instrument count
    pub num_instruments: u8,
}

/// Parser for song files
pub struct SongParser;

/// Parser for single-instrument files
pub struct InstrumentParser;

impl FormatParser for SongParser {
    type Output = TrackerSong;

    fn parse(&self, data: &[u8]) -> Result<TrackerSong> {
        let version = check_version(SONG_MAGIC, data)?;
        let (rest, header) = song_header(data).map_err(|e| truncated("song header", e))?;
        let header = SongHeader { version, ..header };
        check_header(&header)?;

        let (rest, sequence) = count(sequence_step, header.num_sequence_steps as usize)(rest)
            .map_err(|e| truncated("sequence", e))?;
        let mut rest = rest;
        let mut pattern = Vec::with_capacity(header.num_patterns as usize);
        for _ in 0..header.num_patterns {
            let (next, p) =
                parse_pattern(rest, header.pattern_length).map_err(|e| truncated("patterns", e))?;
            pattern.push(p);
            rest = next;
        }
        let (_, raw_instruments) = count(instrument_record, header.num_instruments as usize)(rest)
            .map_err(|e| truncated("instruments", e))?;
        let instrument = raw_instruments
            .into_iter()
            .map(RawInstrument::into_instrument)
            .collect::<Result<Vec<_>>>()?;

        let song = TrackerSong {
            name: header.name,
            instrument,
            pattern,
            sequence,
            pattern_length: header.pattern_length,
            speed: header.speed,
            rate: header.rate,
            loop_start: header.loop_start,
            loop_end: header.loop_end,
            loop_enabled: header.loop_enabled,
        };
        song.validate()?;
        Ok(song)
    }

    fn name(&self) -> &str {
        "FZT song"
    }
}

impl FormatParser for InstrumentParser {
    type Output = Instrument;

    fn parse(&self, data: &[u8]) -> Result<Instrument> {
        check_version(INSTRUMENT_MAGIC, data)?;
        let (_, raw) = instrument_record(&data[INSTRUMENT_MAGIC.len() + 1..])
            .map_err(|e| truncated("instrument", e))?;
        raw.into_instrument()
    }

    fn name(&self) -> &str {
        "FZI instrument"
    }
}

/// Parse just the header of a song file
pub fn parse_song_header(data: &[u8]) -> Result<SongHeader> {
    let version = check_version(SONG_MAGIC, data)?;
    let (_, header) = song_header(data).map_err(|e| truncated("song header", e))?;
    Ok(SongHeader { version, ..header })
}

fn truncated(section: &str, err: nom::Err<nom::error::Error<Input<'_>>>) -> TrackerError {
    let detail = match err {
        nom::Err::Incomplete(_) => "unexpected end of data".to_string(),
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            format!("{:?} with {} bytes left", e.code, e.input.len())
        }
    };
    TrackerError::Parse(format!("{section}: {detail}"))
}

fn check_version(magic: &'static [u8], data: &[u8]) -> Result<u8> {
    let (_, version) = signature(magic, data).map_err(|_| {
        TrackerError::Parse(format!(
            "missing {} signature",
            String::from_utf8_lossy(magic)
        ))
    })?;

    if version == 0 || version > FORMAT_VERSION {
        return Err(TrackerError::UnsupportedVersion {
            found: version,
            supported: FORMAT_VERSION,
        });
    }
    Ok(version)
}

fn signature<'a>(magic: &'static [u8], input: Input<'a>) -> IResult<Input<'a>, u8> {
    let (input, _) = tag(magic)(input)?;
    le_u8(input)
}

fn check_header(header: &SongHeader) -> Result<()> {
    let in_range = |value: u16, max: u16| (1..=max).contains(&value);
    if !in_range(header.pattern_length, MAX_PATTERN_LENGTH)
        || !in_range(header.num_sequence_steps, MAX_SEQUENCE_STEPS)
        || !in_range(header.num_patterns, MAX_PATTERNS)
        || header.num_instruments > MAX_INSTRUMENTS
    {
        return Err(TrackerError::InvalidSong(format!(
            "header out of range: {} rows, {} sequence steps, {} patterns, {} instruments",
            header.pattern_length,
            header.num_sequence_steps,
            header.num_patterns,
            header.num_instruments
        )));
    }
    Ok(())
}

fn fixed_name(input: Input<'_>) -> IResult<Input<'_>, [u8; NAME_LEN]> {
    let (input, bytes) = take(NAME_LEN)(input)?;
    let mut name = [0u8; NAME_LEN];
    name.copy_from_slice(bytes);
    Ok((input, name))
}

fn song_header(input: Input<'_>) -> IResult<Input<'_>, SongHeader> {
    let (input, _) = tag(SONG_MAGIC)(input)?;
    let (input, version) = le_u8(input)?;
    let (input, name) = fixed_name(input)?;
    let (input, speed) = le_u8(input)?;
    let (input, rate) = le_u8(input)?;
    let (input, pattern_length) = le_u16(input)?;
    let (input, loop_start) = le_u8(input)?;
    let (input, loop_end) = le_u8(input)?;
    let (input, loop_enabled) = le_u8(input)?;
    let (input, num_sequence_steps) = le_u16(input)?;
    let (input, num_patterns) = le_u16(input)?;
    let (input, num_instruments) = le_u8(input)?;

    Ok((
        input,
        SongHeader {
            version,
            name,
            speed,
            rate,
            pattern_length,
            loop_start,
            loop_end,
            loop_enabled: loop_enabled != 0,
            num_sequence_steps,
            num_patterns,
            num_instruments,
        },
    ))
}

fn sequence_step(input: Input<'_>) -> IResult<Input<'_>, SequenceStep> {
    let (input, bytes) = take(NUM_CHANNELS)(input)?;
    let mut pattern_indices = [0u8; NUM_CHANNELS];
    pattern_indices.copy_from_slice(bytes);
    Ok((input, SequenceStep { pattern_indices }))
}

fn pattern_step(input: Input<'_>) -> IResult<Input<'_>, PatternStep> {
    let (input, note) = le_u8(input)?;
    let (input, inst_vol) = le_u8(input)?;
    let (input, command) = le_u16(input)?;
    Ok((
        input,
        PatternStep {
            note,
            inst_vol,
            command,
        },
    ))
}

fn parse_pattern(input: Input<'_>, length: u16) -> IResult<Input<'_>, Pattern> {
    let (input, step) = count(pattern_step, length as usize)(input)?;
    Ok((input, Pattern { step }))
}

/// Instrument record as stored, before enum decoding
struct RawInstrument {
    instrument: Instrument,
    filter_type: u8,
}

impl RawInstrument {
    fn into_instrument(self) -> Result<Instrument> {
        let filter_type = FilterType::from_u8(self.filter_type).ok_or_else(|| {
            TrackerError::InvalidSong(format!("unknown filter type {}", self.filter_type))
        })?;
        Ok(Instrument {
            filter_type,
            ..self.instrument
        })
    }
}

fn instrument_record(input: Input<'_>) -> IResult<Input<'_>, RawInstrument> {
    let (input, name) = fixed_name(input)?;
    let (input, waveform) = le_u8(input)?;
    let (input, flags) = le_u8(input)?;
    let (input, sound_engine_flags) = le_u8(input)?;
    let (input, base_note) = le_u8(input)?;
    let (input, finetune) = le_i8(input)?;
    let (input, slide_speed) = le_u8(input)?;
    let (input, attack) = le_u8(input)?;
    let (input, decay) = le_u8(input)?;
    let (input, sustain) = le_u8(input)?;
    let (input, release) = le_u8(input)?;
    let (input, volume) = le_u8(input)?;
    let (input, pw) = le_u16(input)?;
    let (input, ring_mod) = le_u8(input)?;
    let (input, hard_sync) = le_u8(input)?;
    let (input, filter_cutoff) = le_u16(input)?;
    let (input, filter_resonance) = le_u8(input)?;
    let (input, filter_type) = le_u8(input)?;
    let (input, vibrato_speed) = le_u8(input)?;
    let (input, vibrato_depth) = le_u8(input)?;
    let (input, vibrato_delay) = le_u8(input)?;
    let (input, pwm_speed) = le_u8(input)?;
    let (input, pwm_depth) = le_u8(input)?;
    let (input, pwm_delay) = le_u8(input)?;
    let (input, program_period) = le_u8(input)?;
    let (input, slots) = count(le_u16, PROGRAM_SLOTS)(input)?;

    let mut program = [0u16; PROGRAM_SLOTS];
    program.copy_from_slice(&slots);

    Ok((
        input,
        RawInstrument {
            instrument: Instrument {
                name,
                waveform: Waveform::from_bits_truncate(waveform),
                flags: InstrumentFlags::from_bits_truncate(flags),
                sound_engine_flags: ChannelFlags::from_bits_truncate(sound_engine_flags)
                    - ChannelFlags::GATE,
                base_note,
                finetune,
                slide_speed,
                attack,
                decay,
                sustain,
                release,
                volume,
                pw,
                ring_mod,
                hard_sync,
                filter_cutoff,
                filter_resonance,
                filter_type: FilterType::LowPass,
                vibrato_speed,
                vibrato_depth,
                vibrato_delay,
                pwm_speed,
                pwm_depth,
                pwm_delay,
                program_period,
                program,
            },
            filter_type,
        },
    ))
}
