//! Run session - lifecycle orchestration
//!
//! Owns the session state machine, the elapsed-time ticker, the heart-rate
//! buffer, and the wiring from the heart-rate stream into the lookahead
//! coordinator.
//!
//! ```text
//! NotStarted --start--> Active <--pause/resume--> Paused
//!      \                  |                        |
//!       \---------------stop (any state)-----------+--> Completed
//! ```
//!
//! Lifecycle calls are serialized behind one async lock, so a burst of
//! start/pause/resume/stop taps always leaves the ticker and the monitor in
//! a state that matches the session state.

use crate::error::{Result, SessionError};
use crate::events::{ErrorSource, SessionSnapshot, StatePublisher, StateUpdate};
use crate::lookahead::{LookaheadCoordinator, LookaheadOutcome, QueueGate};
use crate::metrics::HeartRateBuffer;
use crate::navigation::{NavigationHandle, NavigationOutcome, NavigationSnapshot};
use crate::types::{RunSessionState, SessionConfig};
use chrono::{DateTime, Utc};
use pulse_core::{
    HeartRateProvider, MonitorEvent, PlaybackProvider, PulseError, RunSummary, Track,
};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Buffered samples between the provider and the session
const MONITOR_CHANNEL_CAPACITY: usize = 64;

/// Active-time clock that freezes while paused
#[derive(Debug, Default, Clone, Copy)]
struct SessionClock {
    accumulated: Duration,
    active_since: Option<Instant>,
}

impl SessionClock {
    fn run(&mut self, now: Instant) {
        if self.active_since.is_none() {
            self.active_since = Some(now);
        }
    }

    fn freeze(&mut self, now: Instant) {
        if let Some(since) = self.active_since.take() {
            self.accumulated += now.saturating_duration_since(since);
        }
    }

    fn elapsed(&self, now: Instant) -> Duration {
        self.accumulated
            + self
                .active_since
                .map_or(Duration::ZERO, |since| now.saturating_duration_since(since))
    }
}

#[derive(Debug, Default)]
struct Core {
    state: RunSessionState,
    samples: HeartRateBuffer,
    current_heart_rate: Option<u32>,
    clock: SessionClock,
    started_at: Option<DateTime<Utc>>,
    ticker: Option<JoinHandle<()>>,
    monitor: Option<JoinHandle<()>>,
    summary: Option<RunSummary>,
    /// Pause cancelled a play before it reached the player
    replay_on_resume: bool,
}

struct Shared {
    config: SessionConfig,
    pool: Vec<Track>,
    heart_rate: Arc<dyn HeartRateProvider>,
    playback: Arc<dyn PlaybackProvider>,
    navigator: NavigationHandle,
    lookahead: LookaheadCoordinator,
    publisher: StatePublisher,
    snapshot: watch::Receiver<SessionSnapshot>,
    lifecycle: tokio::sync::Mutex<()>,
    core: Mutex<Core>,
}

/// A single run, from start to summary
///
/// Collaborators are injected; the session holds the only references the
/// controller keeps to them, and they hold none back.
pub struct RunSession {
    shared: Arc<Shared>,
}

impl RunSession {
    /// Create a session over `pool`
    ///
    /// Spawns the publisher and navigation tasks, so it must be called from
    /// within a tokio runtime.
    ///
    /// # Panics
    /// Panics if `pool` is empty.
    pub fn new(
        config: SessionConfig,
        pool: Vec<Track>,
        heart_rate: Arc<dyn HeartRateProvider>,
        playback: Arc<dyn PlaybackProvider>,
    ) -> Self {
        assert!(!pool.is_empty(), "run session needs a non-empty track pool");

        let (publisher, snapshot) = StatePublisher::spawn();
        let gate = QueueGate::new(publisher.clone());
        let navigator = NavigationHandle::spawn(
            config.navigation_debounce(),
            config.history_size,
            Arc::clone(&playback),
            gate.clone(),
            publisher.clone(),
        );
        let lookahead = LookaheadCoordinator::new(
            Arc::clone(&playback),
            navigator.clone(),
            gate,
            config.queue_warmup(),
            publisher.clone(),
        );

        Self {
            shared: Arc::new(Shared {
                config,
                pool,
                heart_rate,
                playback,
                navigator,
                lookahead,
                publisher,
                snapshot,
                lifecycle: tokio::sync::Mutex::new(()),
                core: Mutex::new(Core::default()),
            }),
        }
    }

    /// NotStarted -> Active
    ///
    /// Resets all per-run state, starts the ticker and the heart-rate
    /// subscription, and plays the best track for the default heart rate.
    /// A sensor that refuses to start is reported and the run continues
    /// without live samples.
    pub async fn start(&self) -> Result<()> {
        let _lifecycle = self.shared.lifecycle.lock().await;
        let shared = &self.shared;

        {
            let mut core = shared.core();
            if core.state != RunSessionState::NotStarted {
                return Err(SessionError::InvalidTransition {
                    from: core.state,
                    action: "start",
                });
            }
            core.samples.clear();
            core.summary = None;
            core.replay_on_resume = false;
            core.started_at = Some(Utc::now());
            core.clock = SessionClock::default();
            core.clock.run(Instant::now());
            core.state = RunSessionState::Active;
        }
        info!(pool = shared.pool.len(), metric = %shared.config.metric, "Run started");
        shared.publisher.publish(StateUpdate::Reset);
        shared
            .publisher
            .publish(StateUpdate::SessionState(RunSessionState::Active));

        shared.navigator.reset(shared.pool.clone()).await?;
        shared.lookahead.start_monitoring();
        Shared::start_ticker(shared);
        Shared::start_monitor(shared).await;

        let outcome = shared
            .navigator
            .play_best(shared.config.default_heart_rate)
            .await?;
        debug!(?outcome, "Initial selection");
        Ok(())
    }

    /// Active -> Paused
    ///
    /// Stops the ticker and pauses the player. Heart-rate monitoring keeps
    /// running.
    pub async fn pause(&self) -> Result<()> {
        let _lifecycle = self.shared.lifecycle.lock().await;
        self.shared.pause_locked().await
    }

    /// Paused -> Active
    pub async fn resume(&self) -> Result<()> {
        let _lifecycle = self.shared.lifecycle.lock().await;
        self.shared.resume_locked().await
    }

    /// Pause when active, resume when paused, otherwise do nothing
    pub async fn toggle_play_pause(&self) -> Result<()> {
        let _lifecycle = self.shared.lifecycle.lock().await;
        match self.state() {
            RunSessionState::Active => self.shared.pause_locked().await,
            RunSessionState::Paused => self.shared.resume_locked().await,
            RunSessionState::NotStarted | RunSessionState::Completed => Ok(()),
        }
    }

    /// Any state -> Completed
    ///
    /// Cancels the ticker and the heart-rate subscription before anything
    /// else, then waits out in-flight queue edits and drops plays that have
    /// not reached the player, so nothing restarts it after the final stop.
    /// Then computes the final summary. Idempotent: later calls return
    /// the same summary without recomputing it.
    pub async fn stop(&self) -> Result<RunSummary> {
        let _lifecycle = self.shared.lifecycle.lock().await;
        let shared = &self.shared;

        let (was_in_progress, elapsed, ticker, monitor) = {
            let mut core = shared.core();
            if core.state == RunSessionState::Completed {
                if let Some(summary) = core.summary.clone() {
                    return Ok(summary);
                }
            }
            let was_in_progress = core.state.is_in_progress();
            let now = Instant::now();
            core.clock.freeze(now);
            core.state = RunSessionState::Completed;
            (
                was_in_progress,
                core.clock.elapsed(now),
                core.ticker.take(),
                core.monitor.take(),
            )
        };

        if let Some(ticker) = ticker {
            ticker.abort();
        }
        if let Some(monitor) = monitor {
            monitor.abort();
        }
        shared.lookahead.stop_monitoring().await;
        if let Err(e) = shared.navigator.cancel_pending_plays().await {
            warn!("Could not cancel pending plays: {}", e);
        }
        shared
            .publisher
            .publish(StateUpdate::SessionState(RunSessionState::Completed));
        shared.publisher.publish(StateUpdate::Elapsed(elapsed));

        shared.heart_rate.stop().await;
        if was_in_progress {
            match shared.playback.stop().await {
                Ok(()) => shared.publisher.publish(StateUpdate::PlayingChanged(false)),
                Err(e) => shared.publisher.report_error(ErrorSource::Playback, e),
            }
        }

        let tracks = match shared.navigator.snapshot().await {
            Ok(snapshot) => snapshot.history.iter().map(|e| e.to_run_track()).collect(),
            Err(e) => {
                warn!("Could not read play history for summary: {}", e);
                Vec::new()
            }
        };

        let summary = {
            let mut core = shared.core();
            let summary = RunSummary {
                started_at: core.started_at,
                ended_at: Utc::now(),
                active_duration_secs: elapsed.as_secs(),
                metric: shared.config.metric,
                average: core.samples.average(),
                max: core.samples.max(),
                sample_count: core.samples.len(),
                tracks,
            };
            core.summary = Some(summary.clone());
            summary
        };

        info!(
            duration_secs = summary.active_duration_secs,
            average = ?summary.average,
            max = ?summary.max,
            tracks = summary.tracks.len(),
            "Run completed"
        );
        Ok(summary)
    }

    /// Skip to the best track for the latest heart rate
    ///
    /// Ignored unless the run is active or paused.
    pub async fn skip_to_next(&self) -> Result<NavigationOutcome> {
        let (state, heart_rate) = {
            let core = self.shared.core();
            (core.state, core.current_heart_rate)
        };
        if !state.is_in_progress() {
            return Ok(NavigationOutcome::Idle);
        }
        let target = heart_rate.unwrap_or(self.shared.config.default_heart_rate);
        self.shared.navigator.skip_to_next(target).await
    }

    /// Go back to the previous track
    ///
    /// Ignored unless the run is active or paused.
    pub async fn skip_to_previous(&self) -> Result<NavigationOutcome> {
        if !self.state().is_in_progress() {
            return Ok(NavigationOutcome::Idle);
        }
        self.shared.navigator.skip_to_previous().await
    }

    /// The remote player reports a new now-playing song
    ///
    /// The reported track is matched to the pool by id, then by title and
    /// artist, before it is recorded.
    pub async fn now_playing_changed(&self, reported: Track) -> Result<NavigationOutcome> {
        let (state, heart_rate) = {
            let core = self.shared.core();
            (core.state, core.current_heart_rate)
        };
        if !state.is_in_progress() {
            return Ok(NavigationOutcome::Idle);
        }
        let track = self.shared.match_pool_track(reported);
        self.shared
            .navigator
            .record_external_track_start(track, heart_rate)
            .await
    }

    /// Feed one sample directly, as if it came from the provider
    pub async fn ingest_heart_rate(&self, bpm: u32) -> Option<LookaheadOutcome> {
        self.shared.handle_heart_rate(bpm).await
    }

    /// Current lifecycle state
    pub fn state(&self) -> RunSessionState {
        self.shared.core().state
    }

    /// Latest sample in any state
    pub fn current_heart_rate(&self) -> Option<u32> {
        self.shared.core().current_heart_rate
    }

    /// Integer mean of active samples
    pub fn average_heart_rate(&self) -> Option<u32> {
        self.shared.core().samples.average()
    }

    /// Highest active sample
    pub fn max_heart_rate(&self) -> Option<u32> {
        self.shared.core().samples.max()
    }

    /// Number of active samples
    pub fn sample_count(&self) -> usize {
        self.shared.core().samples.len()
    }

    /// Active time so far
    pub fn elapsed(&self) -> Duration {
        self.shared.core().clock.elapsed(Instant::now())
    }

    /// Final summary, once completed
    pub fn summary(&self) -> Option<RunSummary> {
        self.shared.core().summary.clone()
    }

    /// Track staged to play next
    pub fn up_next(&self) -> Option<Track> {
        self.shared.lookahead.slot()
    }

    /// Copy of history and played set
    pub async fn navigation(&self) -> Result<NavigationSnapshot> {
        self.shared.navigator.snapshot().await
    }

    /// Subscribe to published state
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.snapshot.clone()
    }

    /// Latest published state
    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    /// Session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// Track pool
    pub fn pool(&self) -> &[Track] {
        &self.shared.pool
    }
}

impl Shared {
    fn core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn match_pool_track(&self, reported: Track) -> Track {
        self.pool
            .iter()
            .find(|t| t.id == reported.id)
            .or_else(|| self.pool.iter().find(|t| t.is_same_song(&reported)))
            .cloned()
            .unwrap_or(reported)
    }

    async fn handle_heart_rate(&self, bpm: u32) -> Option<LookaheadOutcome> {
        let metrics = {
            let mut core = self.core();
            core.current_heart_rate = Some(bpm);
            if core.state == RunSessionState::Active {
                core.samples.push(bpm);
                core.samples.average().zip(core.samples.max())
            } else {
                None
            }
        };

        self.publisher.publish(StateUpdate::HeartRate(bpm));
        let (average, max) = metrics?;
        self.publisher.publish(StateUpdate::Metrics { average, max });

        Some(self.lookahead.on_heart_rate_changed(bpm).await)
    }

    async fn pause_locked(&self) -> Result<()> {
        let elapsed = {
            let mut core = self.core();
            if core.state != RunSessionState::Active {
                return Err(SessionError::InvalidTransition {
                    from: core.state,
                    action: "pause",
                });
            }
            let now = Instant::now();
            core.clock.freeze(now);
            core.state = RunSessionState::Paused;
            if let Some(ticker) = core.ticker.take() {
                ticker.abort();
            }
            core.clock.elapsed(now)
        };
        info!("Run paused");
        self.publisher
            .publish(StateUpdate::SessionState(RunSessionState::Paused));
        self.publisher.publish(StateUpdate::Elapsed(elapsed));

        // A play still resolving must not start the player behind the pause
        let cancelled = match self.navigator.cancel_pending_plays().await {
            Ok(cancelled) => cancelled,
            Err(e) => {
                warn!("Could not cancel pending plays: {}", e);
                false
            }
        };
        self.core().replay_on_resume = cancelled;

        match self.playback.pause().await {
            Ok(()) => self.publisher.publish(StateUpdate::PlayingChanged(false)),
            Err(e) => self.publisher.report_error(ErrorSource::Playback, e),
        }
        Ok(())
    }

    async fn resume_locked(self: &Arc<Self>) -> Result<()> {
        let replay = {
            let mut core = self.core();
            if core.state != RunSessionState::Paused {
                return Err(SessionError::InvalidTransition {
                    from: core.state,
                    action: "resume",
                });
            }
            core.clock.run(Instant::now());
            core.state = RunSessionState::Active;
            std::mem::take(&mut core.replay_on_resume)
        };
        info!("Run resumed");
        self.publisher
            .publish(StateUpdate::SessionState(RunSessionState::Active));
        Shared::start_ticker(self);

        // The player never got the current track; send it now
        if replay {
            let track = self.navigator.replay_current().await?;
            debug!(track = ?track.map(|t| t.id), "Replayed track cancelled by pause");
            return Ok(());
        }

        match self.playback.resume().await {
            Ok(()) => self.publisher.publish(StateUpdate::PlayingChanged(true)),
            Err(e) => self.publisher.report_error(ErrorSource::Playback, e),
        }
        Ok(())
    }

    fn start_ticker(shared: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(shared);
        let period = shared.config.tick_interval();

        let ticker = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(shared) = weak.upgrade() else { break };
                let elapsed = {
                    let core = shared.core();
                    if core.state != RunSessionState::Active {
                        break;
                    }
                    core.clock.elapsed(Instant::now())
                };
                shared.publisher.publish(StateUpdate::Elapsed(elapsed));
            }
        });

        if let Some(old) = shared.core().ticker.replace(ticker) {
            old.abort();
        }
    }

    async fn start_monitor(shared: &Arc<Self>) {
        let (tx, mut rx) = mpsc::channel(MONITOR_CHANNEL_CAPACITY);
        let weak: Weak<Self> = Arc::downgrade(shared);

        let monitor = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let Some(shared) = weak.upgrade() else { break };
                match event {
                    MonitorEvent::Sample(bpm) => {
                        shared.handle_heart_rate(bpm).await;
                    }
                    MonitorEvent::Error(message) => {
                        shared
                            .publisher
                            .report_error(ErrorSource::Monitor, PulseError::monitor(message));
                    }
                }
            }
            debug!("Heart-rate monitor stopped");
        });

        if let Some(old) = shared.core().monitor.replace(monitor) {
            old.abort();
        }

        if let Err(e) = shared.heart_rate.start(&shared.config.device, tx).await {
            warn!("Heart-rate monitoring unavailable, continuing without live samples");
            shared.publisher.report_error(ErrorSource::Monitor, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_excludes_paused_time() {
        let t0 = Instant::now();
        let mut clock = SessionClock::default();

        clock.run(t0);
        clock.freeze(t0 + Duration::from_secs(10));
        assert_eq!(clock.elapsed(t0 + Duration::from_secs(60)), Duration::from_secs(10));

        clock.run(t0 + Duration::from_secs(60));
        assert_eq!(clock.elapsed(t0 + Duration::from_secs(65)), Duration::from_secs(15));
    }

    #[test]
    fn clock_run_is_idempotent() {
        let t0 = Instant::now();
        let mut clock = SessionClock::default();
        clock.run(t0);
        clock.run(t0 + Duration::from_secs(5));
        assert_eq!(clock.elapsed(t0 + Duration::from_secs(7)), Duration::from_secs(7));
    }
}
