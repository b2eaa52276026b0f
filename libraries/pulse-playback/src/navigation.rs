//! Navigation sequencer
//!
//! A single worker task owns the play history and the played set. Every
//! navigation (skip next, skip previous, external track start, initial pick)
//! is posted to it as a command and handled to completion, in submission
//! order, before the next one is looked at.
//!
//! The worker never awaits a collaborator. Catalog lookup and the play
//! request run in their own task so a slow catalog cannot stall navigation.
//! Each play carries a ticket; a play whose ticket is no longer the newest
//! (superseded, or cancelled by pause or stop) never reaches the player.

use crate::error::{Result, SessionError};
use crate::events::{ErrorSource, StatePublisher, StateUpdate};
use crate::history::{PlayHistory, PlayedEntry, PlayedSet};
use crate::lookahead::QueueGate;
use crate::selection::{peek_best, select_best};
use pulse_core::{PlaybackProvider, Track};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info};

/// Result of a navigation request
#[derive(Debug, Clone, PartialEq)]
pub enum NavigationOutcome {
    /// A play request was issued for this track
    Playing(Track),

    /// An externally started track was appended to history
    Recorded(Track),

    /// The reported track already was the current one
    AlreadyCurrent,

    /// Dropped: same direction accepted less than one debounce window ago
    Debounced,

    /// Skip previous with fewer than two history entries
    NotEnoughHistory,

    /// Nothing to navigate from (empty history or empty pool)
    Idle,
}

impl NavigationOutcome {
    /// Whether the request changed history
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Playing(_) | Self::Recorded(_))
    }
}

/// Copy of the sequencer's state
#[derive(Debug, Clone, Default)]
pub struct NavigationSnapshot {
    /// Play history, oldest first
    pub history: Vec<PlayedEntry>,

    /// Played ids
    pub played: PlayedSet,
}

impl NavigationSnapshot {
    /// Current track, if anything played yet
    pub fn current(&self) -> Option<&Track> {
        self.history.last().map(|e| &e.track)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Next,
    Previous,
}

/// Per-direction debounce windows
#[derive(Debug)]
struct Debounce {
    window: Duration,
    last_next: Option<Instant>,
    last_previous: Option<Instant>,
}

impl Debounce {
    fn new(window: Duration) -> Self {
        Self {
            window,
            last_next: None,
            last_previous: None,
        }
    }

    fn last(&mut self, direction: Direction) -> &mut Option<Instant> {
        match direction {
            Direction::Next => &mut self.last_next,
            Direction::Previous => &mut self.last_previous,
        }
    }

    fn is_open(&mut self, direction: Direction, at: Instant) -> bool {
        let window = self.window;
        match *self.last(direction) {
            Some(last) => at.saturating_duration_since(last) >= window,
            None => true,
        }
    }

    fn mark(&mut self, direction: Direction, at: Instant) {
        *self.last(direction) = Some(at);
    }

    fn reset(&mut self) {
        self.last_next = None;
        self.last_previous = None;
    }
}

/// Play request tickets shared with the playback tasks
#[derive(Debug, Default)]
struct PlayTickets {
    /// Newest ticket; older ones are superseded or cancelled
    latest: AtomicU64,
    /// Highest ticket whose play request was handed to the player
    delivered: AtomicU64,
    /// Held from the ticket check until the play request returns
    sending: tokio::sync::Mutex<()>,
}

impl PlayTickets {
    fn issue(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Invalidate every outstanding ticket; returns the newest one
    fn revoke(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst)
    }

    fn is_latest(&self, ticket: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket
    }
}

enum Command {
    Reset {
        pool: Vec<Track>,
        reply: oneshot::Sender<()>,
    },
    RecordExternalTrackStart {
        track: Track,
        heart_rate: Option<u32>,
        reply: oneshot::Sender<NavigationOutcome>,
    },
    SkipToNext {
        heart_rate: u32,
        at: Instant,
        reply: oneshot::Sender<NavigationOutcome>,
    },
    SkipToPrevious {
        at: Instant,
        reply: oneshot::Sender<NavigationOutcome>,
    },
    PlayBest {
        heart_rate: u32,
        reply: oneshot::Sender<NavigationOutcome>,
    },
    PlayTrack {
        track: Track,
        heart_rate: Option<u32>,
        reply: oneshot::Sender<NavigationOutcome>,
    },
    PeekBest {
        heart_rate: u32,
        reply: oneshot::Sender<Option<Track>>,
    },
    ReplayCurrent {
        reply: oneshot::Sender<Option<Track>>,
    },
    RevokePlays {
        reply: oneshot::Sender<u64>,
    },
    Snapshot {
        reply: oneshot::Sender<NavigationSnapshot>,
    },
}

/// Handle to the navigation sequencer
///
/// Cheap to clone. The worker exits once every handle is dropped.
#[derive(Debug, Clone)]
pub struct NavigationHandle {
    tx: mpsc::UnboundedSender<Command>,
    tickets: Arc<PlayTickets>,
}

impl NavigationHandle {
    /// Spawn the sequencer worker
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        debounce: Duration,
        history_size: usize,
        playback: Arc<dyn PlaybackProvider>,
        gate: QueueGate,
        publisher: StatePublisher,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let tickets = Arc::new(PlayTickets::default());
        let sequencer = Sequencer {
            pool: Vec::new(),
            history: PlayHistory::new(history_size),
            played: PlayedSet::new(),
            debounce: Debounce::new(debounce),
            playback,
            gate,
            publisher,
            tickets: Arc::clone(&tickets),
        };
        tokio::spawn(sequencer.run(rx));
        Self { tx, tickets }
    }

    /// Replace the pool and clear history, played set and debounce state
    pub async fn reset(&self, pool: Vec<Track>) -> Result<()> {
        self.request(|reply| Command::Reset { pool, reply }).await
    }

    /// The remote player reports `track` as now playing
    pub async fn record_external_track_start(
        &self,
        track: Track,
        heart_rate: Option<u32>,
    ) -> Result<NavigationOutcome> {
        self.request(|reply| Command::RecordExternalTrackStart {
            track,
            heart_rate,
            reply,
        })
        .await
    }

    /// Skip to the best track for `heart_rate`
    pub async fn skip_to_next(&self, heart_rate: u32) -> Result<NavigationOutcome> {
        let at = Instant::now();
        self.request(|reply| Command::SkipToNext {
            heart_rate,
            at,
            reply,
        })
        .await
    }

    /// Go back to the previous track
    pub async fn skip_to_previous(&self) -> Result<NavigationOutcome> {
        let at = Instant::now();
        self.request(|reply| Command::SkipToPrevious { at, reply })
            .await
    }

    /// Select the best track for `heart_rate` and play it, without debounce
    pub async fn play_best(&self, heart_rate: u32) -> Result<NavigationOutcome> {
        self.request(|reply| Command::PlayBest { heart_rate, reply })
            .await
    }

    /// Play a specific track
    pub async fn play_track(
        &self,
        track: Track,
        heart_rate: Option<u32>,
    ) -> Result<NavigationOutcome> {
        self.request(|reply| Command::PlayTrack {
            track,
            heart_rate,
            reply,
        })
        .await
    }

    /// Best candidate to play after the current track, without marking it
    pub async fn peek_best(&self, heart_rate: u32) -> Result<Option<Track>> {
        self.request(|reply| Command::PeekBest { heart_rate, reply })
            .await
    }

    /// Send a play for the current history entry without touching history
    pub async fn replay_current(&self) -> Result<Option<Track>> {
        self.request(|reply| Command::ReplayCurrent { reply }).await
    }

    /// Keep every play submitted so far from reaching the player
    ///
    /// Returns once no play request is in flight. The result is `true` when
    /// the newest play was cancelled before it was sent, i.e. the player is
    /// not on the current history entry.
    pub async fn cancel_pending_plays(&self) -> Result<bool> {
        let newest = self.request(|reply| Command::RevokePlays { reply }).await?;
        let _sending = self.tickets.sending.lock().await;
        let cancelled = self.tickets.delivered.load(Ordering::SeqCst) < newest;
        if cancelled {
            debug!(ticket = newest, "Pending play cancelled");
        }
        Ok(cancelled)
    }

    /// Copy of history and played set
    pub async fn snapshot(&self) -> Result<NavigationSnapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .map_err(|_| SessionError::SequencerClosed)?;
        rx.await.map_err(|_| SessionError::SequencerClosed)
    }
}

/// Worker state; lives inside the sequencer task only
struct Sequencer {
    pool: Vec<Track>,
    history: PlayHistory,
    played: PlayedSet,
    debounce: Debounce,
    playback: Arc<dyn PlaybackProvider>,
    gate: QueueGate,
    publisher: StatePublisher,
    tickets: Arc<PlayTickets>,
}

impl Sequencer {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            self.handle(command);
        }
        debug!("Navigation sequencer stopped");
    }

    fn handle(&mut self, command: Command) {
        // A dropped reply receiver only means the caller stopped waiting
        match command {
            Command::Reset { pool, reply } => {
                self.reset(pool);
                let _ = reply.send(());
            }
            Command::RecordExternalTrackStart {
                track,
                heart_rate,
                reply,
            } => {
                let _ = reply.send(self.record_external_track_start(track, heart_rate));
            }
            Command::SkipToNext {
                heart_rate,
                at,
                reply,
            } => {
                let _ = reply.send(self.skip_to_next(heart_rate, at));
            }
            Command::SkipToPrevious { at, reply } => {
                let _ = reply.send(self.skip_to_previous(at));
            }
            Command::PlayBest { heart_rate, reply } => {
                let _ = reply.send(self.play_best(heart_rate));
            }
            Command::PlayTrack {
                track,
                heart_rate,
                reply,
            } => {
                let _ = reply.send(self.play_track(track, heart_rate));
            }
            Command::PeekBest { heart_rate, reply } => {
                let _ = reply.send(self.peek_best(heart_rate));
            }
            Command::ReplayCurrent { reply } => {
                let current = self.history.current().map(|e| e.track.clone());
                if let Some(track) = &current {
                    debug!(track = %track.id, "Replaying current track");
                    self.send_play(track.clone());
                }
                let _ = reply.send(current);
            }
            Command::RevokePlays { reply } => {
                let _ = reply.send(self.tickets.revoke());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(NavigationSnapshot {
                    history: self.history.entries().cloned().collect(),
                    played: self.played.clone(),
                });
            }
        }
    }

    fn reset(&mut self, pool: Vec<Track>) {
        debug!(pool = pool.len(), "Resetting navigation state");
        self.pool = pool;
        self.history.clear();
        self.played.clear();
        self.debounce.reset();
    }

    fn record_external_track_start(
        &mut self,
        track: Track,
        heart_rate: Option<u32>,
    ) -> NavigationOutcome {
        self.played.insert(track.id.clone());

        if self.history.is_current(&track.id) {
            return NavigationOutcome::AlreadyCurrent;
        }

        debug!(track = %track.id, "Recording externally started track");
        self.history.push(PlayedEntry::now(track.clone(), heart_rate));
        self.publish_current(&track);
        self.gate.track_started(&track);
        NavigationOutcome::Recorded(track)
    }

    fn skip_to_next(&mut self, heart_rate: u32, at: Instant) -> NavigationOutcome {
        if !self.debounce.is_open(Direction::Next, at) {
            debug!("Skip next debounced");
            return NavigationOutcome::Debounced;
        }
        if self.history.is_empty() || self.pool.is_empty() {
            return NavigationOutcome::Idle;
        }

        // A one-track pool has nowhere to skip to
        let candidates = self.candidates();
        if candidates.is_empty() {
            return NavigationOutcome::Idle;
        }

        self.debounce.mark(Direction::Next, at);
        let next = select_best(&candidates, &mut self.played, heart_rate).clone();
        info!(track = %next.id, heart_rate, "Skipping to next track");
        self.play_track(next, Some(heart_rate))
    }

    fn skip_to_previous(&mut self, at: Instant) -> NavigationOutcome {
        if !self.debounce.is_open(Direction::Previous, at) {
            debug!("Skip previous debounced");
            return NavigationOutcome::Debounced;
        }
        let Some((current, previous)) = self.history.pop_current_and_previous() else {
            return NavigationOutcome::NotEnoughHistory;
        };

        self.debounce.mark(Direction::Previous, at);
        self.played.remove(&current.track.id);
        self.played.remove(&previous.track.id);
        info!(track = %previous.track.id, "Skipping back to previous track");
        self.play_track(previous.track, previous.heart_rate_at_start)
    }

    fn play_best(&mut self, heart_rate: u32) -> NavigationOutcome {
        if self.pool.is_empty() {
            return NavigationOutcome::Idle;
        }
        let best = select_best(&self.pool, &mut self.played, heart_rate).clone();
        self.play_track(best, Some(heart_rate))
    }

    fn play_track(&mut self, track: Track, heart_rate: Option<u32>) -> NavigationOutcome {
        self.history
            .push(PlayedEntry::now(track.clone(), heart_rate));
        self.played.insert(track.id.clone());
        self.publish_current(&track);
        self.send_play(track.clone());
        NavigationOutcome::Playing(track)
    }

    fn send_play(&self, track: Track) {
        let ticket = self.tickets.issue();
        tokio::spawn(start_playback(
            Arc::clone(&self.playback),
            self.gate.clone(),
            self.publisher.clone(),
            Arc::clone(&self.tickets),
            ticket,
            track,
        ));
    }

    /// Pool minus the track that is playing now
    fn candidates(&self) -> Vec<Track> {
        self.pool
            .iter()
            .filter(|t| !self.history.is_current(&t.id))
            .cloned()
            .collect()
    }

    fn peek_best(&self, heart_rate: u32) -> Option<Track> {
        let candidates = self.candidates();
        if candidates.is_empty() {
            return None;
        }
        Some(peek_best(&candidates, &self.played, heart_rate).clone())
    }

    fn publish_current(&self, track: &Track) {
        self.publisher.publish(StateUpdate::TrackChanged {
            current: track.clone(),
            history: self.history.tracks(),
        });
    }
}

/// Resolve and play `track`, unless its ticket was superseded or revoked
async fn start_playback(
    playback: Arc<dyn PlaybackProvider>,
    gate: QueueGate,
    publisher: StatePublisher,
    tickets: Arc<PlayTickets>,
    ticket: u64,
    track: Track,
) {
    let item = match playback.resolve_catalog_item(&track).await {
        Ok(item) => item,
        Err(e) => {
            if tickets.is_latest(ticket) {
                publisher.report_error(ErrorSource::Playback, e);
            }
            return;
        }
    };

    let _sending = tickets.sending.lock().await;
    if !tickets.is_latest(ticket) {
        debug!(track = %track.id, "Play request dropped before it was sent");
        return;
    }
    tickets.delivered.fetch_max(ticket, Ordering::SeqCst);

    match playback.play(&item).await {
        Ok(()) => {
            gate.playback_started(item);
            publisher.publish(StateUpdate::PlayingChanged(true));
            publisher.clear_error(ErrorSource::Playback);
        }
        Err(e) => publisher.report_error(ErrorSource::Playback, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debounce_is_per_direction() {
        let mut debounce = Debounce::new(Duration::from_millis(300));
        let t0 = Instant::now();

        assert!(debounce.is_open(Direction::Next, t0));
        debounce.mark(Direction::Next, t0);

        let t1 = t0 + Duration::from_millis(50);
        assert!(!debounce.is_open(Direction::Next, t1));
        assert!(debounce.is_open(Direction::Previous, t1));

        let t2 = t0 + Duration::from_millis(300);
        assert!(debounce.is_open(Direction::Next, t2));
    }

    #[test]
    fn revoked_tickets_are_no_longer_latest() {
        let tickets = PlayTickets::default();
        let first = tickets.issue();
        assert!(tickets.is_latest(first));

        assert_eq!(tickets.revoke(), first);
        assert!(!tickets.is_latest(first));

        let second = tickets.issue();
        assert!(second > first);
        assert!(tickets.is_latest(second));
    }

    #[test]
    fn outcome_acceptance() {
        let t = Track::new("a", "A", "X");
        assert!(NavigationOutcome::Playing(t.clone()).is_accepted());
        assert!(NavigationOutcome::Recorded(t).is_accepted());
        assert!(!NavigationOutcome::Debounced.is_accepted());
        assert!(!NavigationOutcome::AlreadyCurrent.is_accepted());
    }
}
