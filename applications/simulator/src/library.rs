//! Track pool loading
//!
//! A library file is JSON: either a bare array of tracks or an object with a
//! `tracks` array. Tracks use the `pulse_core::Track` field names.

use crate::error::{Result, SimError};
use async_trait::async_trait;
use pulse_core::{BpmAnalyzer, BpmEstimate, PulseError, Track};
use serde::Deserialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

#[derive(Deserialize)]
#[serde(untagged)]
enum LibraryFile {
    Wrapped { tracks: Vec<Track> },
    Bare(Vec<Track>),
}

/// Read a pool from `path`
pub fn load(path: &Path) -> Result<Vec<Track>> {
    let raw = std::fs::read_to_string(path)?;
    let tracks = match serde_json::from_str::<LibraryFile>(&raw)? {
        LibraryFile::Wrapped { tracks } | LibraryFile::Bare(tracks) => tracks,
    };

    if tracks.is_empty() {
        return Err(SimError::Library(format!(
            "{} contains no tracks",
            path.display()
        )));
    }
    Ok(tracks)
}

/// Pool from `path`, or the demo pool
pub fn load_or_demo(path: Option<&Path>) -> Result<Vec<Track>> {
    match path {
        Some(path) => load(path),
        None => Ok(demo_pool()),
    }
}

/// Built-in pool spanning warm-up to sprint tempos
///
/// Two tracks carry no tempo so the analyzer has something to do.
pub fn demo_pool() -> Vec<Track> {
    [
        ("demo.01", "Morning Stretch", "Slow Loris", Some(92), 214),
        ("demo.02", "Easy Does It", "The Joggers", Some(104), 198),
        ("demo.03", "Side Street", "Cadence Club", Some(118), 241),
        ("demo.04", "Second Wind", "Tempo Tantrum", Some(128), 205),
        ("demo.05", "Hill Repeats", "Lactic", Some(138), 187),
        ("demo.06", "Negative Split", "Pace Setters", Some(146), 223),
        ("demo.07", "Threshold", "Lactic", Some(152), 199),
        ("demo.08", "Tempo Run", "Cadence Club", Some(160), 211),
        ("demo.09", "Last Mile", "Tempo Tantrum", Some(168), 176),
        ("demo.10", "Kick", "Pace Setters", Some(176), 164),
        ("demo.11", "Finish Line", "The Joggers", Some(184), 190),
        ("demo.12", "Cool Down", "Slow Loris", None, 232),
        ("demo.13", "Untitled Demo", "Basement Tapes", None, 180),
    ]
    .into_iter()
    .map(|(id, title, artist, bpm, duration)| {
        let track = Track::new(id, title, artist).with_duration(duration);
        match bpm {
            Some(bpm) => track.with_bpm(bpm),
            None => track,
        }
    })
    .collect()
}

/// Stand-in for the tempo analysis service
///
/// Derives a stable tempo between 80 and 180 from title and artist, with low
/// confidence. Tracks titled "Untitled ..." have no detectable beat.
pub struct SimulatedAnalyzer;

#[async_trait]
impl BpmAnalyzer for SimulatedAnalyzer {
    async fn analyze(&self, track: &Track) -> pulse_core::Result<BpmEstimate> {
        if track.title.starts_with("Untitled") {
            return Err(PulseError::analysis(format!(
                "no beat detected in '{}'",
                track.title
            )));
        }

        let mut hasher = DefaultHasher::new();
        track.title.to_lowercase().hash(&mut hasher);
        track.artist.to_lowercase().hash(&mut hasher);
        let bpm = 80.0 + (hasher.finish() % 1000) as f32 / 10.0;

        Ok(BpmEstimate::new(bpm, Some(0.4)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_demo_pool_is_usable() {
        let pool = demo_pool();
        assert!(pool.iter().filter(|t| t.is_scored()).count() >= 10);
        assert!(pool.iter().any(|t| !t.is_scored()));
    }

    #[test]
    fn test_load_accepts_both_layouts() {
        let mut bare = tempfile::NamedTempFile::new().unwrap();
        write!(
            bare,
            r#"[{{"id": "1", "title": "A", "artist": "X", "bpm": 150}}]"#
        )
        .unwrap();
        let tracks = load(bare.path()).unwrap();
        assert_eq!(tracks[0].bpm, Some(150));
        assert_eq!(tracks[0].duration_seconds, 0);

        let mut wrapped = tempfile::NamedTempFile::new().unwrap();
        write!(
            wrapped,
            r#"{{"tracks": [{{"id": "2", "title": "B", "artist": "Y"}}]}}"#
        )
        .unwrap();
        let tracks = load(wrapped.path()).unwrap();
        assert_eq!(tracks[0].id.as_str(), "2");
        assert!(!tracks[0].is_scored());
    }

    #[test]
    fn test_empty_library_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[]").unwrap();
        assert!(matches!(load(file.path()), Err(SimError::Library(_))));
    }

    #[tokio::test]
    async fn test_analyzer_is_stable_and_bounded() {
        let track = Track::new("x", "Cool Down", "Slow Loris");
        let a = SimulatedAnalyzer.analyze(&track).await.unwrap();
        let b = SimulatedAnalyzer.analyze(&track).await.unwrap();
        assert_eq!(a, b);
        assert!((80.0..180.0).contains(&a.bpm));

        let untitled = Track::new("y", "Untitled Demo", "Basement Tapes");
        assert!(SimulatedAnalyzer.analyze(&untitled).await.is_err());
    }
}
