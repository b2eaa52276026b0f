/// Remote catalog and player transport types
use crate::types::{Track, TrackId};
use serde::{Deserialize, Serialize};

/// A resolved, playable item in the external catalog
///
/// Produced by [`PlaybackProvider::resolve_catalog_item`](crate::PlaybackProvider::resolve_catalog_item).
/// `catalog_id` is whatever the remote player needs to enqueue the item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRef {
    /// Player-side identifier
    pub catalog_id: String,

    /// Pool track this item was resolved from
    pub track_id: TrackId,

    /// Title as reported by the catalog
    pub title: String,

    /// Artist as reported by the catalog
    pub artist: String,
}

impl CatalogRef {
    /// Build a reference for a pool track
    pub fn for_track(catalog_id: impl Into<String>, track: &Track) -> Self {
        Self {
            catalog_id: catalog_id.into(),
            track_id: track.id.clone(),
            title: track.title.clone(),
            artist: track.artist.clone(),
        }
    }
}

/// What the remote player is doing right now
///
/// Decides how the lookahead slot can be replaced: a live queue takes a
/// non-destructive insert, anything else needs a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportState {
    /// Playing with a live queue
    Playing,

    /// Paused mid-track
    Paused {
        /// Whether the player still holds its queue
        queue_loaded: bool,
    },

    /// Nothing loaded
    Stopped,
}

impl TransportState {
    /// Whether the player will accept an insert after the current entry
    pub fn has_active_queue(self) -> bool {
        match self {
            TransportState::Playing => true,
            TransportState::Paused { queue_loaded } => queue_loaded,
            TransportState::Stopped => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_queue_by_transport_state() {
        assert!(TransportState::Playing.has_active_queue());
        assert!(TransportState::Paused { queue_loaded: true }.has_active_queue());
        assert!(!TransportState::Paused { queue_loaded: false }.has_active_queue());
        assert!(!TransportState::Stopped.has_active_queue());
    }

    #[test]
    fn catalog_ref_keeps_pool_identity() {
        let track = Track::new("l.42", "Till I Collapse", "Eminem");
        let item = CatalogRef::for_track("am:1440", &track);
        assert_eq!(item.track_id, track.id);
        assert_eq!(item.catalog_id, "am:1440");
    }
}
