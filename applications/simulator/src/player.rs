//! Simulated streaming player
//!
//! Resolves pool tracks against an in-memory catalog that uses its own ids,
//! plays them for a time-scaled fraction of their duration, and advances
//! through its queue on its own. Every automatic advance is reported as a
//! now-playing event carrying the catalog's copy of the track.

use crate::config::SimulationSettings;
use async_trait::async_trait;
use pulse_core::{CatalogRef, PlaybackProvider, PulseError, Result, Track, TransportState};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

/// Length used for tracks without a duration
const FALLBACK_DURATION: Duration = Duration::from_secs(180);

#[derive(Debug)]
struct PlayerState {
    now_playing: Option<CatalogRef>,
    queue: VecDeque<CatalogRef>,
    transport: TransportState,
    /// Wall-clock end of the current track while playing
    ends_at: Option<Instant>,
    /// Time left on the current track while paused
    remaining: Option<Duration>,
    timer: Option<JoinHandle<()>>,
}

struct Inner {
    catalog: HashMap<String, Track>,
    settings: SimulationSettings,
    state: Mutex<PlayerState>,
    now_playing_tx: mpsc::UnboundedSender<Track>,
}

pub struct SimulatedPlayer {
    inner: Arc<Inner>,
}

impl SimulatedPlayer {
    /// Build a player whose catalog holds every pool track
    ///
    /// Returns the player and the stream of now-playing reports.
    pub fn new(
        pool: &[Track],
        settings: SimulationSettings,
    ) -> (Self, mpsc::UnboundedReceiver<Track>) {
        let (now_playing_tx, now_playing_rx) = mpsc::unbounded_channel();
        let catalog = pool
            .iter()
            .map(|t| (Inner::key(&t.title, &t.artist), t.clone()))
            .collect();

        let player = Self {
            inner: Arc::new(Inner {
                catalog,
                settings,
                state: Mutex::new(PlayerState {
                    now_playing: None,
                    queue: VecDeque::new(),
                    transport: TransportState::Stopped,
                    ends_at: None,
                    remaining: None,
                    timer: None,
                }),
                now_playing_tx,
            }),
        };
        (player, now_playing_rx)
    }

    /// Catalog item that is currently loaded
    pub fn now_playing(&self) -> Option<CatalogRef> {
        self.inner.state().now_playing.clone()
    }

    /// Items queued after the current one
    pub fn queued(&self) -> Vec<CatalogRef> {
        self.inner.state().queue.iter().cloned().collect()
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, PlayerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn key(title: &str, artist: &str) -> String {
        title.to_lowercase() + "\u{1f}" + &artist.to_lowercase()
    }

    fn duration_of(&self, item: &CatalogRef) -> Duration {
        let length = self
            .catalog
            .get(&Self::key(&item.title, &item.artist))
            .map(|t| t.duration())
            .filter(|d| !d.is_zero())
            .unwrap_or(FALLBACK_DURATION);
        self.settings.real(length)
    }

    /// Start the end-of-track timer for `after`
    fn arm(self: &Arc<Self>, state: &mut PlayerState, after: Duration) {
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        let ends_at = Instant::now() + after;
        state.ends_at = Some(ends_at);
        state.remaining = None;

        let inner = Arc::clone(self);
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep_until(ends_at).await;
            inner.advance(ends_at);
        }));
    }

    fn disarm(state: &mut PlayerState) {
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.ends_at = None;
    }

    /// Current track finished: move to the next queued item
    fn advance(self: &Arc<Self>, ended_at: Instant) {
        let mut state = self.state();
        // Re-armed or paused while this timer was firing
        if state.ends_at != Some(ended_at) {
            return;
        }
        state.timer = None;

        match state.queue.pop_front() {
            Some(next) => {
                let length = self.duration_of(&next);
                info!(title = %next.title, "Player advanced");
                state.now_playing = Some(next.clone());
                self.arm(&mut state, length);
                drop(state);

                // Report the catalog's copy, as a real service would
                let reported = Track::new(next.catalog_id.as_str(), next.title, next.artist);
                let _ = self.now_playing_tx.send(reported);
            }
            None => {
                debug!("Queue ran out");
                state.now_playing = None;
                state.transport = TransportState::Stopped;
                state.ends_at = None;
            }
        }
    }
}

#[async_trait]
impl PlaybackProvider for SimulatedPlayer {
    async fn resolve_catalog_item(&self, track: &Track) -> Result<CatalogRef> {
        let key = Inner::key(&track.title, &track.artist);
        match self.inner.catalog.get(&key) {
            Some(found) => Ok(CatalogRef::for_track(format!("sim:{}", found.id), track)),
            None => Err(PulseError::catalog_not_found(&track.title, &track.artist)),
        }
    }

    async fn play(&self, item: &CatalogRef) -> Result<()> {
        let length = self.inner.duration_of(item);
        let mut state = self.inner.state();
        state.now_playing = Some(item.clone());
        state.queue.clear();
        state.transport = TransportState::Playing;
        self.inner.arm(&mut state, length);
        info!(title = %item.title, "Player started");
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        let mut state = self.inner.state();
        if state.transport != TransportState::Playing {
            return Ok(());
        }
        state.remaining = state
            .ends_at
            .map(|end| end.saturating_duration_since(Instant::now()));
        Inner::disarm(&mut state);
        state.transport = TransportState::Paused {
            queue_loaded: state.now_playing.is_some(),
        };
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        let mut state = self.inner.state();
        if !matches!(state.transport, TransportState::Paused { .. }) {
            return Err(PulseError::playback("nothing to resume"));
        }
        let Some(current) = state.now_playing.clone() else {
            return Err(PulseError::playback("nothing to resume"));
        };
        let left = state
            .remaining
            .take()
            .unwrap_or_else(|| self.inner.duration_of(&current));
        state.transport = TransportState::Playing;
        self.inner.arm(&mut state, left);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let mut state = self.inner.state();
        Inner::disarm(&mut state);
        state.now_playing = None;
        state.queue.clear();
        state.remaining = None;
        state.transport = TransportState::Stopped;
        info!("Player stopped");
        Ok(())
    }

    async fn insert_after_current(&self, item: &CatalogRef) -> Result<()> {
        let mut state = self.inner.state();
        if !state.transport.has_active_queue() {
            return Err(PulseError::playback("no active queue to insert into"));
        }
        state.queue.push_front(item.clone());
        debug!(title = %item.title, "Inserted after current");
        Ok(())
    }

    async fn rebuild_queue(&self, current: &CatalogRef, next: &CatalogRef) -> Result<()> {
        let length = self.inner.duration_of(current);
        let mut state = self.inner.state();
        let same_current = state.now_playing.as_ref() == Some(current);
        state.now_playing = Some(current.clone());
        state.queue.clear();
        state.queue.push_back(next.clone());
        match state.transport {
            TransportState::Paused { .. } => {
                state.transport = TransportState::Paused { queue_loaded: true };
            }
            // Swapping only the queued item keeps the current track's position
            TransportState::Playing if same_current => {}
            TransportState::Playing | TransportState::Stopped => {
                state.transport = TransportState::Playing;
                self.inner.arm(&mut state, length);
            }
        }
        debug!(current = %current.title, next = %next.title, "Queue rebuilt");
        Ok(())
    }

    async fn transport_state(&self) -> TransportState {
        self.inner.state().transport
    }
}
