//! Play history and played-set tracking
//!
//! Both are owned by the navigation sequencer and never touched from
//! anywhere else.

use chrono::{DateTime, Utc};
use pulse_core::{RunTrack, Track, TrackId};
use std::collections::{HashSet, VecDeque};

/// A track that started playing, with the context it started in
#[derive(Debug, Clone, PartialEq)]
pub struct PlayedEntry {
    /// The track
    pub track: Track,

    /// When it was recorded as started
    pub played_at: DateTime<Utc>,

    /// Target value at that moment, if known
    pub heart_rate_at_start: Option<u32>,
}

impl PlayedEntry {
    /// Record `track` as starting now
    pub fn now(track: Track, heart_rate_at_start: Option<u32>) -> Self {
        Self {
            track,
            played_at: Utc::now(),
            heart_rate_at_start,
        }
    }

    /// Convert into the run summary record
    pub fn to_run_track(&self) -> RunTrack {
        RunTrack {
            track_id: self.track.id.clone(),
            title: self.track.title.clone(),
            artist: self.track.artist.clone(),
            played_at: self.played_at,
            heart_rate_at_start: self.heart_rate_at_start,
        }
    }
}

/// Ordered record of tracks that actually started, most recent last
///
/// Never holds two consecutive entries with the same id. Bounded: once full,
/// the oldest entry is discarded.
#[derive(Debug, Clone)]
pub struct PlayHistory {
    /// History buffer (most recent = back)
    entries: VecDeque<PlayedEntry>,

    /// Maximum history size
    max_size: usize,
}

impl PlayHistory {
    /// Create new history with specified maximum size
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_size.min(64)),
            max_size: max_size.max(2),
        }
    }

    /// Append an entry unless its track is already the tail
    ///
    /// Returns `false` when the entry was dropped as a consecutive duplicate.
    pub fn push(&mut self, entry: PlayedEntry) -> bool {
        if self.is_current(&entry.track.id) {
            return false;
        }

        if self.entries.len() >= self.max_size {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
        true
    }

    /// Whether `id` is the most recent entry
    pub fn is_current(&self, id: &TrackId) -> bool {
        self.entries.back().is_some_and(|e| &e.track.id == id)
    }

    /// Most recent entry
    pub fn current(&self) -> Option<&PlayedEntry> {
        self.entries.back()
    }

    /// Remove the current and previous entries
    ///
    /// Returns `(current, previous)`, or `None` (leaving history untouched)
    /// when fewer than two entries exist.
    pub fn pop_current_and_previous(&mut self) -> Option<(PlayedEntry, PlayedEntry)> {
        if self.entries.len() < 2 {
            return None;
        }
        let current = self.entries.pop_back()?;
        let previous = self.entries.pop_back()?;
        Some((current, previous))
    }

    /// All entries, oldest first
    pub fn entries(&self) -> impl Iterator<Item = &PlayedEntry> {
        self.entries.iter()
    }

    /// All tracks, oldest first
    pub fn tracks(&self) -> Vec<Track> {
        self.entries.iter().map(|e| e.track.clone()).collect()
    }

    /// Get number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if history is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Get maximum history size
    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

impl Default for PlayHistory {
    fn default() -> Self {
        Self::new(500)
    }
}

/// Ids of tracks already surfaced this session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayedSet {
    ids: HashSet<TrackId>,
}

impl PlayedSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a track as played; returns `false` if it already was
    pub fn insert(&mut self, id: TrackId) -> bool {
        self.ids.insert(id)
    }

    /// Unmark a track
    pub fn remove(&mut self, id: &TrackId) -> bool {
        self.ids.remove(id)
    }

    /// Whether the track was played
    pub fn contains(&self, id: &TrackId) -> bool {
        self.ids.contains(id)
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Number of played ids
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether nothing has been played
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Iterate over played ids in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &TrackId> {
        self.ids.iter()
    }
}

impl FromIterator<TrackId> for PlayedSet {
    fn from_iter<I: IntoIterator<Item = TrackId>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> PlayedEntry {
        PlayedEntry::now(Track::new(id, format!("Track {}", id), "Test Artist"), None)
    }

    #[test]
    fn push_skips_consecutive_duplicate() {
        let mut history = PlayHistory::new(10);
        assert!(history.push(entry("1")));
        assert!(!history.push(entry("1")));
        assert!(history.push(entry("2")));
        assert!(history.push(entry("1")));

        let ids: Vec<_> = history.entries().map(|e| e.track.id.to_string()).collect();
        assert_eq!(ids, vec!["1", "2", "1"]);
    }

    #[test]
    fn pop_current_and_previous() {
        let mut history = PlayHistory::new(10);
        history.push(entry("1"));
        history.push(entry("2"));
        history.push(entry("3"));

        let (current, previous) = history.pop_current_and_previous().unwrap();
        assert_eq!(current.track.id.as_str(), "3");
        assert_eq!(previous.track.id.as_str(), "2");
        assert_eq!(history.len(), 1);
        assert_eq!(history.current().unwrap().track.id.as_str(), "1");
    }

    #[test]
    fn pop_needs_two_entries() {
        let mut history = PlayHistory::new(10);
        assert!(history.pop_current_and_previous().is_none());

        history.push(entry("1"));
        assert!(history.pop_current_and_previous().is_none());
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn history_bounded() {
        let mut history = PlayHistory::new(3);
        for id in ["1", "2", "3", "4"] {
            history.push(entry(id));
        }

        assert_eq!(history.len(), 3);
        let ids: Vec<_> = history.entries().map(|e| e.track.id.to_string()).collect();
        assert_eq!(ids, vec!["2", "3", "4"]);
    }

    #[test]
    fn run_track_carries_start_context() {
        let played = PlayedEntry::now(Track::new("9", "Stronger", "Kanye West"), Some(151));
        let record = played.to_run_track();
        assert_eq!(record.track_id.as_str(), "9");
        assert_eq!(record.heart_rate_at_start, Some(151));
        assert_eq!(record.played_at, played.played_at);
    }

    #[test]
    fn played_set_basics() {
        let mut played = PlayedSet::new();
        assert!(played.insert(TrackId::new("a")));
        assert!(!played.insert(TrackId::new("a")));
        assert!(played.contains(&TrackId::new("a")));
        assert!(played.remove(&TrackId::new("a")));
        assert!(played.is_empty());
    }
}
