//! Playback-related types and state management

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::types::DeviceInfo;

/// Description of the item playing on the account, as decoded from one poll.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackSnapshot {
    pub name: String,
    pub album: String,
    pub artists: Vec<String>,
    pub duration_ms: u64,
    pub progress_ms: u64,
    pub is_playing: bool,
    pub device: DeviceInfo,
}

impl TrackSnapshot {
    /// Nothing has been decoded yet.
    pub fn is_placeholder(&self) -> bool {
        self.name.is_empty()
    }

    /// Same item as `other`. The Web API gives us nothing better than the
    /// title to go on.
    pub fn same_track(&self, other: &TrackSnapshot) -> bool {
        self.name == other.name
    }

    pub fn artist_line(&self) -> String {
        self.artists.join(", ")
    }
}

/// Two snapshot slots and the index of the current one.
///
/// A new track is built in the spare slot and becomes current with an index
/// flip, so the current slot is never partially written.
#[derive(Debug, Default)]
pub struct TrackSlots {
    slots: [TrackSnapshot; 2],
    current: usize,
}

impl TrackSlots {
    pub fn current(&self) -> &TrackSnapshot {
        &self.slots[self.current]
    }

    pub(crate) fn current_mut(&mut self) -> &mut TrackSnapshot {
        &mut self.slots[self.current]
    }

    /// Write `candidate` into the spare slot (dropping whatever it held) and
    /// make it current.
    pub fn replace(&mut self, candidate: TrackSnapshot) -> &TrackSnapshot {
        let spare = self.current ^ 1;
        self.slots[spare] = candidate;
        self.current = spare;
        &self.slots[self.current]
    }

    /// Fold the volatile fields of a poll of the same track into the current
    /// slot.
    pub fn refresh(&mut self, latest: TrackSnapshot) -> &TrackSnapshot {
        let current = self.current_mut();
        current.progress_ms = latest.progress_ms;
        current.is_playing = latest.is_playing;
        current.device = latest.device;
        &self.slots[self.current]
    }
}

/// Last known play/pause state, shared by the sync engine (which learns it
/// from polls) and the command dispatcher (which flips it optimistically).
#[derive(Clone, Debug, Default)]
pub struct PlayingFlag(Arc<AtomicBool>);

impl PlayingFlag {
    pub fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set(&self, playing: bool) {
        self.0.store(playing, Ordering::Release);
    }
}
