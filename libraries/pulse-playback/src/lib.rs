//! PulseTempo - Adaptive Playback Queue Controller
//!
//! Keeps music tempo matched to a runner's live heart rate (or cadence).
//!
//! This crate provides:
//! - Track scoring against a target heart rate
//! - Best-track selection with a no-repeat played set
//! - A serialized navigation sequencer with per-direction debounce
//! - A one-track lookahead for the remote player, with a warm-up gate
//! - The run session state machine (start, pause, resume, stop)
//! - A cached BPM resolver for annotating a track pool
//!
//! # Architecture
//!
//! `pulse-playback` knows nothing about sensors or streaming services:
//! - Heart-rate samples arrive through [`HeartRateProvider`](pulse_core::HeartRateProvider)
//! - Playback and catalog lookups go through [`PlaybackProvider`](pulse_core::PlaybackProvider)
//! - State leaves through one publisher task as a `watch` snapshot
//!
//! # Example: Ranking a pool
//!
//! ```rust
//! use pulse_core::Track;
//! use pulse_playback::{rank, PlayedSet};
//!
//! let pool = vec![
//!     Track::new("1", "Warm Up", "A").with_bpm(100),
//!     Track::new("2", "Tempo", "B").with_bpm(150),
//! ];
//!
//! let ranked = rank(&pool, &PlayedSet::new(), 155);
//! assert_eq!(ranked[0].0.title, "Tempo");
//! ```
//!
//! # Example: Running a session
//!
//! ```rust,no_run
//! use pulse_playback::{RunSession, SessionConfig};
//! # use std::sync::Arc;
//! # async fn demo(
//! #     sensor: Arc<dyn pulse_core::HeartRateProvider>,
//! #     player: Arc<dyn pulse_core::PlaybackProvider>,
//! #     pool: Vec<pulse_core::Track>,
//! # ) -> pulse_playback::Result<()> {
//! let session = RunSession::new(SessionConfig::default(), pool, sensor, player);
//! let mut updates = session.subscribe();
//!
//! session.start().await?;
//! updates.changed().await.ok();
//! println!("now playing: {:?}", updates.borrow().current_track);
//!
//! let summary = session.stop().await?;
//! println!("average: {:?}", summary.average);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bpm;
mod error;
pub mod events;
mod history;
pub mod lookahead;
mod metrics;
pub mod navigation;
pub mod scoring;
mod selection;
mod session;
pub mod types;

// Public exports
pub use bpm::{merge_estimate, BpmResolver};
pub use error::{Result, SessionError};
pub use events::{ErrorSource, SessionSnapshot, StatePublisher, StateUpdate};
pub use history::{PlayHistory, PlayedEntry, PlayedSet};
pub use lookahead::{LookaheadCoordinator, LookaheadOutcome, QueueGate, ReplaceOutcome};
pub use metrics::HeartRateBuffer;
pub use navigation::{NavigationHandle, NavigationOutcome, NavigationSnapshot};
pub use scoring::score;
pub use selection::{peek_best, rank, select_best};
pub use session::RunSession;
pub use types::{RunSessionState, SessionConfig};
