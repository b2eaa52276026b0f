/// Core error types for PulseTempo
use thiserror::Error;

/// Result type alias using `PulseError`
pub type Result<T> = std::result::Result<T, PulseError>;

/// Core error type for PulseTempo
///
/// Every failure a collaborator can report to the controller maps onto one of
/// these variants. The controller turns them into a user-visible message and
/// keeps the session running.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PulseError {
    /// The external catalog has no playable item for this song
    #[error("Track not found in catalog: {title} by {artist}")]
    CatalogNotFound {
        /// Title that was searched for
        title: String,
        /// Artist that was searched for
        artist: String,
    },

    /// Remote player refused a command
    #[error("Playback error: {0}")]
    Playback(String),

    /// Heart-rate (or cadence) monitoring failed
    #[error("Monitoring error: {0}")]
    Monitor(String),

    /// BPM analysis service failed
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl PulseError {
    /// Create a catalog lookup failure
    pub fn catalog_not_found(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self::CatalogNotFound {
            title: title.into(),
            artist: artist.into(),
        }
    }

    /// Create a playback error
    pub fn playback(msg: impl Into<String>) -> Self {
        Self::Playback(msg.into())
    }

    /// Create a monitoring error
    pub fn monitor(msg: impl Into<String>) -> Self {
        Self::Monitor(msg.into())
    }

    /// Create an analysis error
    pub fn analysis(msg: impl Into<String>) -> Self {
        Self::Analysis(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether this is a catalog miss (as opposed to a player failure)
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::CatalogNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_miss_message_names_the_song() {
        let err = PulseError::catalog_not_found("Run Boy Run", "Woodkid");
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "Track not found in catalog: Run Boy Run by Woodkid"
        );
    }

    #[test]
    fn playback_error_is_not_a_catalog_miss() {
        let err = PulseError::playback("queue locked");
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "Playback error: queue locked");
    }
}
