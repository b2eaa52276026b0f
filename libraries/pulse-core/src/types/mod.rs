mod catalog;
mod heart_rate;
mod ids;
mod run;
mod track;

pub use catalog::{CatalogRef, TransportState};
pub use heart_rate::{DeviceSelector, HeartRateSample, MetricSource};
pub use ids::TrackId;
pub use run::{RunSummary, RunTrack};
pub use track::{BpmEstimate, Track};
