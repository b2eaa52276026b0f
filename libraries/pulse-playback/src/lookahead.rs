//! Lookahead queue coordinator
//!
//! Keeps exactly one upcoming track in the remote player's queue, chosen for
//! the current heart rate, and swaps it as the heart rate drifts. The
//! currently playing entry is never touched.
//!
//! # Replace protocol
//!
//! ```text
//! sample -> peek best candidate -> same as slot? -> no-op
//!                                      |
//!                                      v
//!                         stage in slot, spawn replace task
//!                                      |
//!          wait out remaining warm-up (player just started playing)
//!                                      |
//!          still monitoring and slot unchanged?  else abandon
//!                                      |
//!          resolve catalog item         (miss -> report, free slot)
//!                                      |
//!          live queue, nothing placed yet? insert after current
//!                                    : rebuild(current, next)
//! ```
//!
//! The rebuild anchor is the catalog item this controller last started or
//! staged, never a fresh "now playing" lookup. Once a staged item is in the
//! remote queue, a newer candidate replaces it through a rebuild rather than
//! a second insert, so the queue never holds two controller-placed tracks.
//! Queue edits run one at a time.

use crate::events::{ErrorSource, StatePublisher, StateUpdate};
use crate::navigation::NavigationHandle;
use pulse_core::{CatalogRef, PlaybackProvider, PulseError, Track};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct GateState {
    /// When the player last started playback from a play request
    playback_started: Option<Instant>,
    /// Catalog item currently loaded as the playing entry
    current_item: Option<CatalogRef>,
    /// Track staged to play next
    slot: Option<Track>,
    /// Item this controller put after the current entry, until it starts
    placed: Option<CatalogRef>,
    /// Bumped whenever an in-flight replace must give up
    generation: u64,
    /// Bumped whenever the remote queue is replaced wholesale
    epoch: u64,
}

/// Shared lookahead slot and warm-up gate
///
/// The coordinator owns it; the navigation sequencer holds a clone so it can
/// report playback starts and track changes.
#[derive(Debug, Clone)]
pub struct QueueGate {
    state: Arc<Mutex<GateState>>,
    publisher: StatePublisher,
}

impl QueueGate {
    /// Create an empty gate
    pub fn new(publisher: StatePublisher) -> Self {
        Self {
            state: Arc::new(Mutex::new(GateState::default())),
            publisher,
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        // Gate state stays consistent even if a holder panicked
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The player accepted a play request for `item`
    ///
    /// Starts the warm-up interval. A play replaces the remote queue, so the
    /// slot is emptied and any replace still in flight is abandoned.
    pub fn playback_started(&self, item: CatalogRef) {
        let had_slot = {
            let mut gate = self.lock();
            gate.playback_started = Some(Instant::now());
            gate.current_item = Some(item);
            gate.placed = None;
            gate.generation += 1;
            gate.epoch += 1;
            gate.slot.take().is_some()
        };
        if had_slot {
            self.publisher.publish(StateUpdate::Lookahead(None));
        }
    }

    /// The player moved on to `track` by itself
    ///
    /// If that was the staged track, the slot is consumed and its catalog
    /// item becomes the rebuild anchor.
    pub fn track_started(&self, track: &Track) {
        let consumed = {
            let mut gate = self.lock();
            if gate
                .placed
                .as_ref()
                .is_some_and(|item| item.track_id == track.id)
            {
                gate.current_item = gate.placed.take();
            }
            if gate.slot.as_ref() == Some(track) {
                gate.slot = None;
                true
            } else {
                false
            }
        };
        if consumed {
            debug!(track = %track.id, "Staged track started playing");
            self.publisher.publish(StateUpdate::Lookahead(None));
        }
    }

    /// Currently staged track
    pub fn slot(&self) -> Option<Track> {
        self.lock().slot.clone()
    }

    fn clear(&self) {
        let mut gate = self.lock();
        let generation = gate.generation + 1;
        let epoch = gate.epoch + 1;
        *gate = GateState {
            generation,
            epoch,
            ..GateState::default()
        };
    }

    /// Stage `candidate` unless it is already staged; returns its generation
    fn stage(&self, candidate: &Track) -> Option<u64> {
        let mut gate = self.lock();
        if gate.slot.as_ref() == Some(candidate) {
            return None;
        }
        gate.slot = Some(candidate.clone());
        gate.generation += 1;
        Some(gate.generation)
    }

    /// Free the slot if `generation` still owns it
    fn release(&self, generation: u64) {
        let released = {
            let mut gate = self.lock();
            if gate.generation == generation {
                gate.slot = None;
                true
            } else {
                false
            }
        };
        if released {
            self.publisher.publish(StateUpdate::Lookahead(None));
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    fn ready_at(&self, warmup: Duration) -> Option<Instant> {
        self.lock().playback_started.map(|started| started + warmup)
    }

    fn current_item(&self) -> Option<CatalogRef> {
        self.lock().current_item.clone()
    }

    fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    fn has_placed(&self) -> bool {
        self.lock().placed.is_some()
    }

    /// `item` landed in the remote queue after the current entry
    ///
    /// Recorded even when a newer candidate took the slot meanwhile, since
    /// the edit happened regardless. Ignored if the queue was replaced since.
    fn commit(&self, epoch: u64, item: CatalogRef) {
        let mut gate = self.lock();
        if gate.epoch == epoch {
            gate.placed = Some(item);
        }
    }
}

/// What a heart-rate change did to the lookahead slot
#[derive(Debug)]
pub enum LookaheadOutcome {
    /// Not monitoring, or nothing to stage
    Inactive,

    /// Best candidate is already staged
    Unchanged,

    /// Candidate staged; the task performs the remote replace
    Scheduled {
        /// Newly staged track
        track: Track,
        /// Replace task
        task: JoinHandle<ReplaceOutcome>,
    },
}

/// How a replace task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// Inserted after the current entry
    Inserted,

    /// Queue rebuilt around the cached current item
    Rebuilt,

    /// Nothing is playing yet; the next sample will try again
    NotPlaying,

    /// A newer candidate or a play request took over
    Superseded,

    /// Monitoring stopped while waiting
    Cancelled,

    /// Catalog miss or player failure, already reported
    Failed,
}

/// Maintains the single-track lookahead for the remote player
#[derive(Clone)]
pub struct LookaheadCoordinator {
    shared: Arc<Shared>,
}

struct Shared {
    playback: Arc<dyn PlaybackProvider>,
    navigator: NavigationHandle,
    gate: QueueGate,
    warmup: Duration,
    monitoring: AtomicBool,
    publisher: StatePublisher,
    /// Held for the whole of each remote queue edit
    editing: tokio::sync::Mutex<()>,
}

impl LookaheadCoordinator {
    /// Create a coordinator that is not yet monitoring
    pub fn new(
        playback: Arc<dyn PlaybackProvider>,
        navigator: NavigationHandle,
        gate: QueueGate,
        warmup: Duration,
        publisher: StatePublisher,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                playback,
                navigator,
                gate,
                warmup,
                monitoring: AtomicBool::new(false),
                publisher,
                editing: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Clear the slot and the warm-up gate and start reacting to samples
    pub fn start_monitoring(&self) {
        self.shared.gate.clear();
        self.shared.monitoring.store(true, Ordering::SeqCst);
    }

    /// Stop reacting to samples
    ///
    /// Returns once no queue edit is in flight; pending replaces give up
    /// without touching the player.
    pub async fn stop_monitoring(&self) {
        self.shared.monitoring.store(false, Ordering::SeqCst);
        self.shared.gate.clear();
        self.shared.publisher.publish(StateUpdate::Lookahead(None));
        let _editing = self.shared.editing.lock().await;
    }

    /// Whether samples currently drive the lookahead
    pub fn is_monitoring(&self) -> bool {
        self.shared.monitoring.load(Ordering::SeqCst)
    }

    /// Currently staged track
    pub fn slot(&self) -> Option<Track> {
        self.shared.gate.slot()
    }

    /// Re-target the lookahead slot for `heart_rate`
    pub async fn on_heart_rate_changed(&self, heart_rate: u32) -> LookaheadOutcome {
        if !self.is_monitoring() {
            return LookaheadOutcome::Inactive;
        }

        let candidate = match self.shared.navigator.peek_best(heart_rate).await {
            Ok(Some(track)) => track,
            Ok(None) | Err(_) => return LookaheadOutcome::Inactive,
        };

        let Some(generation) = self.shared.gate.stage(&candidate) else {
            return LookaheadOutcome::Unchanged;
        };

        info!(track = %candidate.id, heart_rate, "Staging next track");
        self.shared
            .publisher
            .publish(StateUpdate::Lookahead(Some(candidate.clone())));

        let shared = Arc::clone(&self.shared);
        let track = candidate.clone();
        let task = tokio::spawn(async move { shared.replace_next(track, generation).await });

        LookaheadOutcome::Scheduled {
            track: candidate,
            task,
        }
    }
}

impl Shared {
    fn still_wanted(&self, generation: u64) -> Option<ReplaceOutcome> {
        if !self.monitoring.load(Ordering::SeqCst) {
            return Some(ReplaceOutcome::Cancelled);
        }
        if !self.gate.is_current(generation) {
            return Some(ReplaceOutcome::Superseded);
        }
        None
    }

    async fn replace_next(&self, candidate: Track, generation: u64) -> ReplaceOutcome {
        let Some(ready_at) = self.gate.ready_at(self.warmup) else {
            debug!("No playback started yet, not staging");
            self.gate.release(generation);
            return ReplaceOutcome::NotPlaying;
        };

        if Instant::now() < ready_at {
            debug!(
                wait_ms = ready_at.saturating_duration_since(Instant::now()).as_millis() as u64,
                "Waiting for player warm-up"
            );
            tokio::time::sleep_until(ready_at).await;
        }
        if let Some(outcome) = self.still_wanted(generation) {
            return outcome;
        }

        let item = match self.playback.resolve_catalog_item(&candidate).await {
            Ok(item) => item,
            Err(e) => {
                self.publisher.report_error(ErrorSource::Playback, e);
                self.gate.release(generation);
                return ReplaceOutcome::Failed;
            }
        };
        if let Some(outcome) = self.still_wanted(generation) {
            return outcome;
        }

        let transport = self.playback.transport_state().await;

        let _editing = self.editing.lock().await;
        if let Some(outcome) = self.still_wanted(generation) {
            return outcome;
        }
        let epoch = self.gate.epoch();

        let result = if transport.has_active_queue() && !self.gate.has_placed() {
            self.playback
                .insert_after_current(&item)
                .await
                .map(|()| ReplaceOutcome::Inserted)
        } else {
            if transport.has_active_queue() {
                debug!(track = %candidate.id, "Replacing the track already queued");
            }
            match self.gate.current_item() {
                Some(current) => self
                    .playback
                    .rebuild_queue(&current, &item)
                    .await
                    .map(|()| ReplaceOutcome::Rebuilt),
                None => Err(PulseError::playback(
                    "no loaded item to rebuild the queue around",
                )),
            }
        };

        match result {
            Ok(outcome) => {
                debug!(track = %candidate.id, ?outcome, "Lookahead replaced");
                self.gate.commit(epoch, item);
                self.publisher.clear_error(ErrorSource::Playback);
                outcome
            }
            Err(e) => {
                self.publisher.report_error(ErrorSource::Playback, e);
                self.gate.release(generation);
                ReplaceOutcome::Failed
            }
        }
    }
}
