//! Song and instrument persistence
//!
//! Versioned little-endian binary files:
//! - `FZT!`: header, sequence, patterns, instruments
//! - `FZI!`: a single instrument record
//!
//! Loading never touches a live song: the file is parsed and validated into
//! a fresh [`TrackerSong`] which the caller swaps in on success.

pub mod parser;
pub mod writer;

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

pub use parser::{parse_song_header, InstrumentParser, SongHeader, SongParser};
pub use writer::{write_instrument, write_song};

use crate::tracker::instrument::Instrument;
use crate::tracker::song::TrackerSong;
use crate::Result;

/// Song file signature
pub const SONG_MAGIC: &[u8] = b"FZT!";
/// Instrument file signature
pub const INSTRUMENT_MAGIC: &[u8] = b"FZI!";
/// Newest format version this crate reads and the one it writes
pub const FORMAT_VERSION: u8 = 1;

/// A binary format parser
pub trait FormatParser {
    /// Parsed value
    type Output;

    /// Parse file data
    fn parse(&self, data: &[u8]) -> Result<Self::Output>;

    /// Get parser name
    fn name(&self) -> &str;
}

/// Parse a song from bytes
pub fn load_song(data: &[u8]) -> Result<TrackerSong> {
    SongParser.parse(data)
}

/// Parse an instrument from bytes
pub fn load_instrument(data: &[u8]) -> Result<Instrument> {
    InstrumentParser.parse(data)
}

/// Read and parse a song file
pub fn load_song_file<P: AsRef<Path>>(path: P) -> Result<TrackerSong> {
    let path = path.as_ref();
    let data = fs::read(path)?;
    let song = load_song(&data)?;
    debug!(path = %path.display(), name = %song.name(), "song loaded");
    Ok(song)
}

/// Read and parse an instrument file
pub fn load_instrument_file<P: AsRef<Path>>(path: P) -> Result<Instrument> {
    load_instrument(&fs::read(path)?)
}

/// Write a song file
pub fn save_song_file<P: AsRef<Path>>(path: P, song: &TrackerSong) -> Result<()> {
    fs::write(path, write_song(song)?)?;
    Ok(())
}

/// Write an instrument file
pub fn save_instrument_file<P: AsRef<Path>>(path: P, instrument: &Instrument) -> Result<()> {
    fs::write(path, write_instrument(instrument))?;
    Ok(())
}

/// Replace `song` with the song in `data`
///
/// Returns `false` and leaves `song` untouched when the data is rejected.
pub fn load_song_into(song: &mut TrackerSong, data: &[u8]) -> bool {
    match load_song(data) {
        Ok(loaded) => {
            *song = loaded;
            true
        }
        Err(err) => {
            warn!(%err, "song load rejected");
            false
        }
    }
}
