//! PulseTempo Core
//!
//! Platform-agnostic core types, collaborator traits, and error handling for
//! PulseTempo.
//!
//! This crate provides the building blocks shared by the playback controller
//! and by whatever application embeds it (mobile app, wearable bridge,
//! simulator).
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `Track`, `CatalogRef`, `HeartRateSample`, `RunSummary`
//! - **Collaborator Traits**: `HeartRateProvider`, `PlaybackProvider`, `BpmAnalyzer`
//! - **Error Handling**: Unified `PulseError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use pulse_core::types::Track;
//!
//! let library_copy = Track::new("l.1", "Lose Yourself", "Eminem").with_bpm(171);
//! let catalog_copy = Track::new("c.99", "lose yourself", "EMINEM");
//!
//! assert_ne!(library_copy, catalog_copy);
//! assert!(library_copy.is_same_song(&catalog_copy));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{PulseError, Result};
pub use traits::{BpmAnalyzer, HeartRateProvider, MonitorEvent, PlaybackProvider};

pub use types::{
    BpmEstimate, CatalogRef, DeviceSelector, HeartRateSample, MetricSource, RunSummary, RunTrack,
    Track, TrackId, TransportState,
};
