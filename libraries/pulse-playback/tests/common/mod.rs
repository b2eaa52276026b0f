//! Shared fakes for integration tests

use async_trait::async_trait;
use pulse_core::{
    CatalogRef, DeviceSelector, HeartRateProvider, MonitorEvent, PlaybackProvider, PulseError,
    Result, Track, TrackId, TransportState,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

// ===== Test Helpers =====

pub fn create_test_track(id: &str, bpm: u32) -> Track {
    Track::new(id, format!("Track {id}"), "Test Artist")
        .with_bpm(bpm)
        .with_duration(200)
}

pub fn id(id: &str) -> TrackId {
    TrackId::new(id)
}

/// Let spawned tasks run without moving the clock
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition was not reached");
}

/// Give spawned tasks a chance to run
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

// ===== Fake player =====

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Resolve(TrackId),
    Play(TrackId),
    Pause,
    Resume,
    Stop,
    Insert(TrackId),
    Rebuild { current: TrackId, next: TrackId },
}

/// Remote player that records every request
pub struct FakePlayer {
    calls: Mutex<Vec<Call>>,
    transport: Mutex<TransportState>,
    missing: Mutex<HashSet<TrackId>>,
    fail_plays: AtomicBool,
    resolve_delay: Mutex<Duration>,
}

impl FakePlayer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            transport: Mutex::new(TransportState::Playing),
            missing: Mutex::new(HashSet::new()),
            fail_plays: AtomicBool::new(false),
            resolve_delay: Mutex::new(Duration::ZERO),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn plays(&self) -> Vec<TrackId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Play(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    /// Queue edits: inserts and rebuilds
    pub fn queue_edits(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Insert(_) | Call::Rebuild { .. }))
            .collect()
    }

    pub fn set_transport(&self, state: TransportState) {
        *self.transport.lock().unwrap() = state;
    }

    /// Make catalog lookups for `id` fail
    pub fn mark_missing(&self, id: &str) {
        self.missing.lock().unwrap().insert(TrackId::new(id));
    }

    pub fn fail_plays(&self, fail: bool) {
        self.fail_plays.store(fail, Ordering::SeqCst);
    }

    /// Make every catalog lookup take `delay`
    pub fn slow_resolve(&self, delay: Duration) {
        *self.resolve_delay.lock().unwrap() = delay;
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PlaybackProvider for FakePlayer {
    async fn resolve_catalog_item(&self, track: &Track) -> Result<CatalogRef> {
        self.record(Call::Resolve(track.id.clone()));
        let delay = *self.resolve_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.missing.lock().unwrap().contains(&track.id) {
            return Err(PulseError::catalog_not_found(&track.title, &track.artist));
        }
        Ok(CatalogRef::for_track(format!("cat.{}", track.id), track))
    }

    async fn play(&self, item: &CatalogRef) -> Result<()> {
        if self.fail_plays.load(Ordering::SeqCst) {
            return Err(PulseError::playback("player unavailable"));
        }
        self.record(Call::Play(item.track_id.clone()));
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.record(Call::Pause);
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        self.record(Call::Resume);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.record(Call::Stop);
        Ok(())
    }

    async fn insert_after_current(&self, item: &CatalogRef) -> Result<()> {
        self.record(Call::Insert(item.track_id.clone()));
        Ok(())
    }

    async fn rebuild_queue(&self, current: &CatalogRef, next: &CatalogRef) -> Result<()> {
        self.record(Call::Rebuild {
            current: current.track_id.clone(),
            next: next.track_id.clone(),
        });
        Ok(())
    }

    async fn transport_state(&self) -> TransportState {
        *self.transport.lock().unwrap()
    }
}

// ===== Fake sensor =====

/// Heart-rate sensor driven by the test
pub struct FakeSensor {
    sink: Mutex<Option<mpsc::Sender<MonitorEvent>>>,
    refuse_start: bool,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl FakeSensor {
    pub fn new() -> Arc<Self> {
        Self::build(false)
    }

    /// A sensor whose start always fails (permission denied)
    pub fn refusing() -> Arc<Self> {
        Self::build(true)
    }

    fn build(refuse_start: bool) -> Arc<Self> {
        Arc::new(Self {
            sink: Mutex::new(None),
            refuse_start,
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        })
    }

    /// Push a sample; false when not streaming
    pub async fn send(&self, bpm: u32) -> bool {
        self.emit(MonitorEvent::Sample(bpm)).await
    }

    pub async fn emit(&self, event: MonitorEvent) -> bool {
        let sink = self.sink.lock().unwrap().clone();
        match sink {
            Some(sink) => sink.send(event).await.is_ok(),
            None => false,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.sink.lock().unwrap().is_some()
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HeartRateProvider for FakeSensor {
    async fn start(&self, _device: &DeviceSelector, sink: mpsc::Sender<MonitorEvent>) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.refuse_start {
            return Err(PulseError::monitor("heart rate permission denied"));
        }
        *self.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    async fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.sink.lock().unwrap().take();
    }
}
