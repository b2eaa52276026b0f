//! Error types for the playback controller

use crate::types::RunSessionState;
use pulse_core::PulseError;
use thiserror::Error;

/// Session errors
///
/// Collaborator failures do not show up here; they go to the error
/// observable. These are the failures a caller can act on.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Lifecycle call made from a state that does not allow it
    #[error("Cannot {action} a session that is {from}")]
    InvalidTransition {
        /// State the session was in
        from: RunSessionState,
        /// What was attempted
        action: &'static str,
    },

    /// The navigation sequencer has shut down
    #[error("Navigation sequencer is no longer running")]
    SequencerClosed,

    /// Core error
    #[error(transparent)]
    Core(#[from] PulseError),
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;
