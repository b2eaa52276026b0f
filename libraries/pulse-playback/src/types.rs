//! Core types for the playback controller

use pulse_core::{DeviceSelector, MetricSource};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Lifecycle of a run session
///
/// `NotStarted -> Active <-> Paused`, and any state `-> Completed`.
/// `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunSessionState {
    /// Created, nothing running yet
    #[default]
    NotStarted,

    /// Ticker running, samples drive the queue
    Active,

    /// Ticker stopped, playback paused, sensor still streaming
    Paused,

    /// Finished; metrics are final
    Completed,
}

impl RunSessionState {
    /// Whether the runner can navigate tracks in this state
    pub fn is_in_progress(self) -> bool {
        matches!(self, RunSessionState::Active | RunSessionState::Paused)
    }
}

impl fmt::Display for RunSessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunSessionState::NotStarted => "not started",
            RunSessionState::Active => "active",
            RunSessionState::Paused => "paused",
            RunSessionState::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Configuration for a run session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Target used for the first pick, before any sample arrives (default: 120)
    pub default_heart_rate: u32,

    /// Minimum spacing between two accepted skips in one direction (default: 300)
    pub navigation_debounce_ms: u64,

    /// Time after playback starts before the player accepts queue edits (default: 2000)
    pub queue_warmup_ms: u64,

    /// Elapsed-time ticker period (default: 1000)
    pub tick_interval_ms: u64,

    /// Maximum play history length (default: 500)
    pub history_size: usize,

    /// Signal that drives selection (default: heart rate)
    pub metric: MetricSource,

    /// Sensor to open when the session starts
    pub device: DeviceSelector,
}

impl SessionConfig {
    /// Debounce window as a `Duration`
    pub fn navigation_debounce(&self) -> Duration {
        Duration::from_millis(self.navigation_debounce_ms)
    }

    /// Warm-up interval as a `Duration`
    pub fn queue_warmup(&self) -> Duration {
        Duration::from_millis(self.queue_warmup_ms)
    }

    /// Ticker period as a `Duration`
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_heart_rate: 120,
            navigation_debounce_ms: 300,
            queue_warmup_ms: 2000,
            tick_interval_ms: 1000,
            history_size: 500,
            metric: MetricSource::HeartRate,
            device: DeviceSelector::Default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.default_heart_rate, 120);
        assert_eq!(config.navigation_debounce(), Duration::from_millis(300));
        assert_eq!(config.queue_warmup(), Duration::from_secs(2));
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.metric, MetricSource::HeartRate);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"queue_warmup_ms": 500, "metric": "cadence"}"#).unwrap();
        assert_eq!(config.queue_warmup(), Duration::from_millis(500));
        assert_eq!(config.metric, MetricSource::Cadence);
        assert_eq!(config.navigation_debounce_ms, 300);
    }

    #[test]
    fn in_progress_states() {
        assert!(!RunSessionState::NotStarted.is_in_progress());
        assert!(RunSessionState::Active.is_in_progress());
        assert!(RunSessionState::Paused.is_in_progress());
        assert!(!RunSessionState::Completed.is_in_progress());
    }
}
