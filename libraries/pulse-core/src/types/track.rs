/// Track domain type
use crate::types::TrackId;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::time::Duration;

/// A playable song in the runner's pool
///
/// Immutable once built. Equality and hashing go through `id` only, so two
/// values with the same id compare equal even if their metadata differs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    /// Catalog-scoped identifier
    pub id: TrackId,

    /// Track title
    pub title: String,

    /// Artist name
    pub artist: String,

    /// Duration in whole seconds
    #[serde(default)]
    pub duration_seconds: u32,

    /// Tempo in beats per minute; `None` means the track is unscored
    #[serde(default)]
    pub bpm: Option<u32>,

    /// Opaque artwork handle owned by the catalog
    #[serde(default)]
    pub artwork_ref: Option<String>,

    /// Informational flag set by the app when the runner skipped the track
    #[serde(default)]
    pub is_skipped: bool,
}

impl Track {
    /// Create a track with no tempo, duration or artwork
    pub fn new(id: impl Into<TrackId>, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            duration_seconds: 0,
            bpm: None,
            artwork_ref: None,
            is_skipped: false,
        }
    }

    /// Set the tempo
    #[must_use]
    pub fn with_bpm(mut self, bpm: u32) -> Self {
        self.bpm = Some(bpm);
        self
    }

    /// Set the duration in seconds
    #[must_use]
    pub fn with_duration(mut self, seconds: u32) -> Self {
        self.duration_seconds = seconds;
        self
    }

    /// Set the artwork handle
    #[must_use]
    pub fn with_artwork(mut self, artwork_ref: impl Into<String>) -> Self {
        self.artwork_ref = Some(artwork_ref.into());
        self
    }

    /// Get the duration as a `Duration`
    pub fn duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.duration_seconds))
    }

    /// Whether the track has a tempo to score against
    pub fn is_scored(&self) -> bool {
        self.bpm.is_some()
    }

    /// Cross-catalog identity: same title and artist, ignoring case
    ///
    /// The remote catalog assigns the library copy and the catalog copy of a
    /// song different ids; this is how the two are matched up.
    pub fn is_same_song(&self, other: &Track) -> bool {
        self.id == other.id
            || (self.title.to_lowercase() == other.title.to_lowercase()
                && self.artist.to_lowercase() == other.artist.to_lowercase())
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Track {}

impl Hash for Track {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Tempo estimate returned by the BPM analysis service
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BpmEstimate {
    /// Estimated tempo, rounded to one decimal by the service
    pub bpm: f32,

    /// Confidence from 0.0 to 1.0, when the service reports one
    pub confidence: Option<f32>,
}

impl BpmEstimate {
    /// Create an estimate
    pub fn new(bpm: f32, confidence: Option<f32>) -> Self {
        Self { bpm, confidence }
    }

    /// Tempo rounded to the nearest whole beat
    pub fn whole_bpm(&self) -> u32 {
        self.bpm.max(0.0).round() as u32
    }

    /// Confidence with "unknown" treated as zero
    pub fn confidence_or_zero(&self) -> f32 {
        self.confidence.unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn equality_is_by_id_only() {
        let a = Track::new("1", "Song", "Artist").with_bpm(120);
        let b = Track::new("1", "Renamed", "Someone Else");
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(!set.insert(b));
    }

    #[test]
    fn same_song_across_catalogs() {
        let library = Track::new("l.1", "Eye of the Tiger", "Survivor");
        let catalog = Track::new("c.7", "EYE OF THE TIGER", "survivor");
        let other = Track::new("c.8", "Eye of the Tiger", "Katy Perry");

        assert_ne!(library, catalog);
        assert!(library.is_same_song(&catalog));
        assert!(!library.is_same_song(&other));
    }

    #[test]
    fn deserializes_with_optional_fields_missing() {
        let track: Track =
            serde_json::from_str(r#"{"id":"x","title":"T","artist":"A","bpm":128}"#).unwrap();
        assert_eq!(track.bpm, Some(128));
        assert_eq!(track.duration_seconds, 0);
        assert!(!track.is_skipped);
        assert!(track.artwork_ref.is_none());
    }

    #[test]
    fn estimate_rounding() {
        assert_eq!(BpmEstimate::new(120.5, None).whole_bpm(), 121);
        assert_eq!(BpmEstimate::new(119.4, Some(0.8)).whole_bpm(), 119);
        assert_eq!(BpmEstimate::new(90.0, None).confidence_or_zero(), 0.0);
    }
}
