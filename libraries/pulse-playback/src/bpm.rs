//! Cached tempo lookup for pool tracks
//!
//! Tracks without a known BPM score zero, so a pool is usually annotated
//! once before a run. Analysis goes to an external service; results are kept
//! in an LRU cache keyed by track id.

use lru::LruCache;
use pulse_core::{BpmAnalyzer, BpmEstimate, Result, Track, TrackId};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

/// Default number of cached estimates
pub const DEFAULT_CACHE_SIZE: usize = 1024;

/// Default analysis attempts per track
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Default delay before the second attempt; grows linearly after that
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);

/// Pick the estimate to keep
///
/// The incoming estimate wins only when its confidence is strictly higher.
/// Unknown confidence counts as zero.
pub fn merge_estimate(existing: Option<&BpmEstimate>, incoming: BpmEstimate) -> BpmEstimate {
    match existing {
        Some(current) if incoming.confidence_or_zero() <= current.confidence_or_zero() => {
            *current
        }
        _ => incoming,
    }
}

/// Tempo resolver with caching and bounded retry
pub struct BpmResolver {
    analyzer: Arc<dyn BpmAnalyzer>,
    cache: Mutex<LruCache<TrackId, BpmEstimate>>,
    attempts: u32,
    backoff: Duration,
}

impl BpmResolver {
    /// Create a resolver with default cache size and retry policy
    pub fn new(analyzer: Arc<dyn BpmAnalyzer>) -> Self {
        Self::with_policy(analyzer, DEFAULT_CACHE_SIZE, DEFAULT_ATTEMPTS, DEFAULT_BACKOFF)
    }

    /// Create a resolver with an explicit cache size and retry policy
    ///
    /// # Arguments
    /// * `cache_size` - Maximum cached estimates (0 is treated as 1)
    /// * `attempts` - Analysis attempts per track (at least 1)
    /// * `backoff` - Delay after the first failure; the n-th retry waits n times this
    pub fn with_policy(
        analyzer: Arc<dyn BpmAnalyzer>,
        cache_size: usize,
        attempts: u32,
        backoff: Duration,
    ) -> Self {
        let capacity = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            analyzer,
            cache: Mutex::new(LruCache::new(capacity)),
            attempts: attempts.max(1),
            backoff,
        }
    }

    fn cache(&self) -> MutexGuard<'_, LruCache<TrackId, BpmEstimate>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Cached estimate for `id`
    pub fn cached(&self, id: &TrackId) -> Option<BpmEstimate> {
        self.cache().get(id).copied()
    }

    /// Merge an estimate obtained elsewhere into the cache
    ///
    /// Returns the estimate that is kept.
    pub fn record(&self, id: TrackId, estimate: BpmEstimate) -> BpmEstimate {
        let mut cache = self.cache();
        let kept = merge_estimate(cache.get(&id), estimate);
        cache.put(id, kept);
        kept
    }

    /// Estimate the tempo of `track`, from cache or by analysis
    ///
    /// # Errors
    /// Returns the last analysis error once all attempts failed
    pub async fn resolve(&self, track: &Track) -> Result<BpmEstimate> {
        if let Some(hit) = self.cached(&track.id) {
            return Ok(hit);
        }

        let mut attempt = 1;
        loop {
            match self.analyzer.analyze(track).await {
                Ok(estimate) => {
                    debug!(track = %track.id, bpm = estimate.bpm, attempt, "Tempo analyzed");
                    return Ok(self.record(track.id.clone(), estimate));
                }
                Err(e) if attempt < self.attempts => {
                    debug!(track = %track.id, attempt, "Tempo analysis failed, retrying: {}", e);
                    tokio::time::sleep(self.backoff * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Fill in missing tempos across `pool`
    ///
    /// Tracks that already carry a BPM are left alone. Tracks whose analysis
    /// keeps failing stay unscored.
    pub async fn annotate_pool(&self, pool: Vec<Track>) -> Vec<Track> {
        let mut annotated = Vec::with_capacity(pool.len());
        for track in pool {
            if track.is_scored() {
                annotated.push(track);
                continue;
            }
            match self.resolve(&track).await {
                Ok(estimate) => {
                    let bpm = estimate.whole_bpm();
                    annotated.push(track.with_bpm(bpm));
                }
                Err(e) => {
                    warn!(track = %track.id, "Leaving track unscored: {}", e);
                    annotated.push(track);
                }
            }
        }
        annotated
    }
}
