//! Song hand-off between the editor and the sequencer
//!
//! The editor never mutates the song the sequencer is playing. It builds a
//! new [`TrackerSong`], validates it and publishes it here; the sequencer
//! picks it up at the start of its next tick. The sequencer side only ever
//! uses `try_lock`, so a tick never waits on the editor.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::tracker::song::TrackerSong;
use crate::Result;

/// Pending change to the active song
#[derive(Debug, Clone)]
pub enum SongUpdate {
    /// Swap in a new snapshot
    Load(Arc<TrackerSong>),
    /// Drop the active song and stop
    Unload,
}

/// Single-entry mailbox for song snapshots
#[derive(Debug, Default)]
pub struct SongSlot {
    pending: Mutex<Option<SongUpdate>>,
}

impl SongSlot {
    /// Empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever is pending with `update`
    pub fn publish(&self, update: SongUpdate) {
        *self.pending.lock() = Some(update);
    }

    /// Take the pending update without blocking
    ///
    /// Returns `None` when nothing is pending or the editor holds the lock;
    /// in the latter case the update is picked up on a later tick.
    pub fn try_take(&self) -> Option<SongUpdate> {
        self.pending.try_lock()?.take()
    }

    /// Whether an update is waiting
    pub fn has_pending(&self) -> bool {
        self.pending.lock().is_some()
    }
}

/// Editor-side handle to a player's song slot
#[derive(Debug, Clone)]
pub struct SongHandle {
    slot: Arc<SongSlot>,
}

impl SongHandle {
    pub(crate) fn new(slot: Arc<SongSlot>) -> Self {
        Self { slot }
    }

    /// Validate and publish a new song snapshot
    ///
    /// An invalid song is rejected here and the playing song stays active.
    pub fn publish(&self, song: TrackerSong) -> Result<()> {
        song.validate()?;
        self.slot.publish(SongUpdate::Load(Arc::new(song)));
        Ok(())
    }

    /// Ask the player to drop its song
    pub fn unload(&self) {
        self.slot.publish(SongUpdate::Unload);
    }

    /// Whether the last publish has not been picked up yet
    pub fn is_pending(&self) -> bool {
        self.slot.has_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_publish_wins() {
        let slot = Arc::new(SongSlot::new());
        let handle = SongHandle::new(Arc::clone(&slot));
        let mut a = TrackerSong::new();
        a.set_name("a");
        let mut b = TrackerSong::new();
        b.set_name("b");
        handle.publish(a).unwrap();
        handle.publish(b).unwrap();
        assert!(handle.is_pending());

        match slot.try_take() {
            Some(SongUpdate::Load(song)) => assert_eq!(song.name(), "b"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(slot.try_take().is_none());
    }

    #[test]
    fn test_try_take_does_not_block_while_locked() {
        let slot = SongSlot::new();
        slot.publish(SongUpdate::Unload);
        let guard = slot.pending.lock();
        assert!(slot.try_take().is_none());
        drop(guard);
        assert!(matches!(slot.try_take(), Some(SongUpdate::Unload)));
    }

    #[test]
    fn test_invalid_song_is_not_published() {
        let slot = Arc::new(SongSlot::new());
        let handle = SongHandle::new(Arc::clone(&slot));
        let mut bad = TrackerSong::new();
        bad.speed = 0;
        assert!(handle.publish(bad).is_err());
        assert!(!handle.is_pending());
    }
}
