/// ID types for PulseTempo entities
use serde::{Deserialize, Serialize};
use std::fmt;

/// Track identifier
///
/// Stable within one catalog only. The remote catalog hands out different ids
/// for the library copy and the catalog copy of the same song, so never use
/// this to decide whether two tracks are the same recording; see
/// [`Track::is_same_song`](crate::types::Track::is_same_song).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    /// Create a new track ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TrackId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TrackId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_id_serializes_as_plain_string() {
        let id = TrackId::new("i.abc123");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"i.abc123\"");

        let back: TrackId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert_eq!(back.to_string(), "i.abc123");
    }
}
