//! Published session state
//!
//! All externally observable state goes through one publisher task, which is
//! the only writer of the [`SessionSnapshot`]. Components send
//! [`StateUpdate`]s; the UI (or any other observer) holds a
//! `watch::Receiver<SessionSnapshot>` and is notified on every change.

use crate::types::RunSessionState;
use pulse_core::Track;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Collaborator behind an error message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSource {
    /// Remote player or its catalog
    Playback,
    /// Heart-rate sensor
    Monitor,
}

/// A change to published state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StateUpdate {
    /// Lifecycle state changed
    SessionState(RunSessionState),

    /// Now playing changed, with the sequencer's history after the change
    TrackChanged {
        /// The new current track
        current: Track,
        /// Play history, oldest first
        history: Vec<Track>,
    },

    /// Remote player started or stopped
    PlayingChanged(bool),

    /// Latest sample, whether or not it counted toward metrics
    HeartRate(u32),

    /// Running metrics after an active sample
    Metrics {
        /// Integer mean of active samples
        average: u32,
        /// Highest active sample
        max: u32,
    },

    /// Ticker fired
    Elapsed(Duration),

    /// Lookahead slot changed
    Lookahead(Option<Track>),

    /// A collaborator failed
    Error {
        /// Which collaborator
        source: ErrorSource,
        /// Error message
        message: String,
    },

    /// `source` worked again; clears its error if that is the one shown
    ClearError(ErrorSource),

    /// Start-of-session reset
    Reset,
}

/// Snapshot of everything the UI shows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Lifecycle state
    pub state: RunSessionState,

    /// Track the controller last started
    pub current_track: Option<Track>,

    /// Whether the remote player is playing
    pub is_playing: bool,

    /// Latest sample
    pub current_heart_rate: Option<u32>,

    /// Integer mean of active samples
    pub average_heart_rate: Option<u32>,

    /// Highest active sample
    pub max_heart_rate: Option<u32>,

    /// Active time, pauses excluded
    pub elapsed: Duration,

    /// Tracks played, oldest first
    pub tracks_played: Vec<Track>,

    /// Track staged to play next
    pub up_next: Option<Track>,

    /// Last collaborator failure
    pub error_message: Option<String>,

    /// Collaborator that produced `error_message`
    pub error_source: Option<ErrorSource>,
}

impl SessionSnapshot {
    /// Fold one update into the snapshot
    pub fn apply(&mut self, update: StateUpdate) {
        match update {
            StateUpdate::SessionState(state) => self.state = state,
            StateUpdate::TrackChanged { current, history } => {
                self.current_track = Some(current);
                self.tracks_played = history;
            }
            StateUpdate::PlayingChanged(playing) => self.is_playing = playing,
            StateUpdate::HeartRate(bpm) => self.current_heart_rate = Some(bpm),
            StateUpdate::Metrics { average, max } => {
                self.average_heart_rate = Some(average);
                self.max_heart_rate = Some(max);
            }
            StateUpdate::Elapsed(elapsed) => self.elapsed = elapsed,
            StateUpdate::Lookahead(track) => self.up_next = track,
            StateUpdate::Error { source, message } => {
                self.error_message = Some(message);
                self.error_source = Some(source);
            }
            StateUpdate::ClearError(source) => {
                if self.error_source == Some(source) {
                    self.error_message = None;
                    self.error_source = None;
                }
            }
            StateUpdate::Reset => {
                // Keep the live sensor reading; everything else is per-run
                let current_heart_rate = self.current_heart_rate;
                *self = Self {
                    current_heart_rate,
                    ..Self::default()
                };
            }
        }
    }
}

/// Sending half of the publisher
///
/// Cheap to clone. Sends never block and are dropped silently once the
/// publisher task is gone.
#[derive(Debug, Clone)]
pub struct StatePublisher {
    tx: mpsc::UnboundedSender<StateUpdate>,
}

impl StatePublisher {
    /// Spawn the publisher task
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn() -> (Self, watch::Receiver<SessionSnapshot>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<StateUpdate>();
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());

        tokio::spawn(async move {
            while let Some(update) = rx.recv().await {
                snapshot_tx.send_modify(|snapshot| snapshot.apply(update));
            }
            tracing::debug!("State publisher stopped");
        });

        (Self { tx }, snapshot_rx)
    }

    /// Publish an update
    pub fn publish(&self, update: StateUpdate) {
        let _ = self.tx.send(update);
    }

    /// Report a collaborator failure to the error observable
    pub fn report_error(&self, source: ErrorSource, error: impl std::fmt::Display) {
        let message = error.to_string();
        tracing::warn!(?source, "{}", message);
        self.publish(StateUpdate::Error { source, message });
    }

    /// `source` succeeded; drop its stale error message
    pub fn clear_error(&self, source: ErrorSource) {
        self.publish(StateUpdate::ClearError(source));
    }
}
