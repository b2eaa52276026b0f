/// Collaborator traits for PulseTempo
///
/// The controller talks to the outside world only through these. Concrete
/// transports (HealthKit, wearable messaging, the streaming service SDK, the
/// BPM analysis backend) live in the embedding application.
use crate::error::Result;
use crate::types::{BpmEstimate, CatalogRef, DeviceSelector, Track, TransportState};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Event pushed by a heart-rate provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    /// A new reading, in beats (or steps) per minute
    Sample(u32),

    /// The sensor reported a problem; monitoring may continue
    Error(String),
}

/// Source of live heart-rate (or cadence) samples
///
/// Implementers push readings into the sink handed to [`start`](Self::start)
/// until [`stop`](Self::stop) is called. The provider holds no reference back
/// to the controller.
#[async_trait]
pub trait HeartRateProvider: Send + Sync {
    /// Begin streaming samples from `device` into `sink`
    ///
    /// # Errors
    /// Returns an error if the sensor cannot be opened or permission is denied
    async fn start(&self, device: &DeviceSelector, sink: mpsc::Sender<MonitorEvent>) -> Result<()>;

    /// Stop streaming; must be safe to call when not started
    async fn stop(&self);
}

/// Remote player and catalog
///
/// Every method is a request to an external system and may fail. The
/// controller reports failures and never retries them.
#[async_trait]
pub trait PlaybackProvider: Send + Sync {
    /// Look the track up in the external catalog by title and artist
    ///
    /// # Errors
    /// Returns [`PulseError::CatalogNotFound`](crate::PulseError::CatalogNotFound)
    /// when there is no playable match
    async fn resolve_catalog_item(&self, track: &Track) -> Result<CatalogRef>;

    /// Replace current playback with `item`
    async fn play(&self, item: &CatalogRef) -> Result<()>;

    /// Pause playback
    async fn pause(&self) -> Result<()>;

    /// Resume paused playback
    async fn resume(&self) -> Result<()>;

    /// Stop playback and drop the queue
    async fn stop(&self) -> Result<()>;

    /// Insert `item` directly after the current entry, leaving the current
    /// entry untouched
    async fn insert_after_current(&self, item: &CatalogRef) -> Result<()>;

    /// Discard the queue and rebuild it as `current` followed by `next`
    async fn rebuild_queue(&self, current: &CatalogRef, next: &CatalogRef) -> Result<()>;

    /// Current transport state of the player
    async fn transport_state(&self) -> TransportState;
}

/// External tempo analysis service
#[async_trait]
pub trait BpmAnalyzer: Send + Sync {
    /// Estimate the tempo of `track`
    ///
    /// # Errors
    /// Returns [`PulseError::Analysis`](crate::PulseError::Analysis) if the
    /// preview cannot be fetched or analysed
    async fn analyze(&self, track: &Track) -> Result<BpmEstimate>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PulseError;
    use std::sync::Arc;

    struct FixedSensor(Vec<u32>);

    #[async_trait]
    impl HeartRateProvider for FixedSensor {
        async fn start(
            &self,
            _device: &DeviceSelector,
            sink: mpsc::Sender<MonitorEvent>,
        ) -> Result<()> {
            for bpm in &self.0 {
                sink.send(MonitorEvent::Sample(*bpm))
                    .await
                    .map_err(|e| PulseError::monitor(e.to_string()))?;
            }
            Ok(())
        }

        async fn stop(&self) {}
    }

    #[tokio::test]
    async fn provider_is_object_safe_and_pushes_into_sink() {
        let sensor: Arc<dyn HeartRateProvider> = Arc::new(FixedSensor(vec![110, 112]));
        let (tx, mut rx) = mpsc::channel(4);

        sensor.start(&DeviceSelector::Default, tx).await.unwrap();

        assert_eq!(rx.recv().await, Some(MonitorEvent::Sample(110)));
        assert_eq!(rx.recv().await, Some(MonitorEvent::Sample(112)));
        sensor.stop().await;
    }
}
