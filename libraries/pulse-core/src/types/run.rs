/// Completed run records
use crate::types::{MetricSource, TrackId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A track that played during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTrack {
    /// Pool track id
    pub track_id: TrackId,

    /// Title at the time it played
    pub title: String,

    /// Artist at the time it played
    pub artist: String,

    /// When the controller recorded the track as started
    pub played_at: DateTime<Utc>,

    /// Target value when the track started, if one was known
    pub heart_rate_at_start: Option<u32>,
}

/// Final metrics for a completed run
///
/// Serialized as-is when the run is synced to the account history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// When the session went active
    pub started_at: Option<DateTime<Utc>>,

    /// When the session completed
    pub ended_at: DateTime<Utc>,

    /// Time spent active, pauses excluded, in whole seconds
    pub active_duration_secs: u64,

    /// Which signal the averages refer to
    pub metric: MetricSource,

    /// Integer mean of all active samples
    pub average: Option<u32>,

    /// Highest active sample
    pub max: Option<u32>,

    /// Number of active samples
    pub sample_count: usize,

    /// Play history, oldest first
    pub tracks: Vec<RunTrack>,
}

impl RunSummary {
    /// Whether the run ever went active
    pub fn was_started(&self) -> bool {
        self.started_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_json_shape() {
        let summary = RunSummary {
            started_at: None,
            ended_at: Utc::now(),
            active_duration_secs: 0,
            metric: MetricSource::Cadence,
            average: None,
            max: None,
            sample_count: 0,
            tracks: vec![],
        };

        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["metric"], "cadence");
        assert!(value["average"].is_null());
        assert!(!summary.was_started());
    }
}
