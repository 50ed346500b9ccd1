//! Per-track playback status tracking.
//!
//! Two update paths feed the map and must stay consistent: optimistic
//! updates applied the moment a command is issued, and authoritative
//! reconciliation from decoded TRACK_REPORT frames. A device report
//! always overwrites whatever optimistic value is present.

use std::collections::HashMap;

/// Playback status of one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackStatus {
    /// Not playing. Also the implicit status of any track never referenced.
    #[default]
    Stopped,
    /// Currently audible.
    Playing,
    /// Paused mid-track.
    Paused,
}

/// Sparse map of track id to playback status.
///
/// Tracks that were never referenced, or whose status returned to
/// [`TrackStatus::Stopped`], carry no entry; [`status`](Self::status)
/// reports `Stopped` for them.
#[derive(Debug, Default)]
pub struct TrackStateTracker {
    tracks: HashMap<u16, TrackStatus>,
}

impl TrackStateTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status of a track.
    pub fn status(&self, track: u16) -> TrackStatus {
        self.tracks.get(&track).copied().unwrap_or_default()
    }

    /// Optimistic update from command issuance. Setting `Stopped` evicts
    /// the entry, keeping the map sparse.
    pub fn set(&mut self, track: u16, status: TrackStatus) {
        if status == TrackStatus::Stopped {
            self.tracks.remove(&track);
        } else {
            self.tracks.insert(track, status);
        }
    }

    /// Authoritative overwrite from a device TRACK_REPORT.
    pub fn reconcile(&mut self, track: u16, playing: bool) {
        let status = if playing {
            TrackStatus::Playing
        } else {
            TrackStatus::Stopped
        };
        self.set(track, status);
    }

    /// Number of tracks currently tracked as playing or paused.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// True when no track is playing or paused.
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
