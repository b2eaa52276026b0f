/// Physiological signal types
use serde::{Deserialize, Serialize};
use std::fmt;

/// One reading from the sensor
///
/// Ordering is receipt order. Samples carry no clock of their own; the
/// controller only relies on arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeartRateSample(pub u32);

impl HeartRateSample {
    /// Beats (or steps) per minute
    pub fn bpm(self) -> u32 {
        self.0
    }
}

impl From<u32> for HeartRateSample {
    fn from(bpm: u32) -> Self {
        Self(bpm)
    }
}

/// Which signal drives track selection
///
/// Both are per-minute rates and are scored the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricSource {
    /// Heart rate in beats per minute
    #[default]
    HeartRate,

    /// Running cadence in steps per minute
    Cadence,
}

impl MetricSource {
    /// Unit label for display and logs
    pub fn unit(self) -> &'static str {
        match self {
            MetricSource::HeartRate => "bpm",
            MetricSource::Cadence => "spm",
        }
    }
}

impl fmt::Display for MetricSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricSource::HeartRate => write!(f, "heart rate"),
            MetricSource::Cadence => write!(f, "cadence"),
        }
    }
}

/// Which sensor the heart-rate provider should open
///
/// The controller never inspects this; it is passed straight through.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceSelector {
    /// Whatever the platform considers the primary sensor
    #[default]
    Default,

    /// A specific paired device
    Named(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_source_config_names() {
        let m: MetricSource = serde_json::from_str("\"cadence\"").unwrap();
        assert_eq!(m, MetricSource::Cadence);
        assert_eq!(m.unit(), "spm");
        assert_eq!(MetricSource::default(), MetricSource::HeartRate);
    }

    #[test]
    fn device_selector_config_names() {
        let d: DeviceSelector = serde_json::from_str("{\"named\":\"Polar H10\"}").unwrap();
        assert_eq!(d, DeviceSelector::Named("Polar H10".to_string()));
    }
}
