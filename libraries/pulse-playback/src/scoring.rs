//! Track scoring against a target heart rate
//!
//! Composite score in `[0, 1]`:
//!
//! ```text
//! score = 0.6 * bpm_proximity + 0.2 * variety + 0.2 * energy_alignment
//! ```
//!
//! Unscored tracks (no BPM) always score 0. Any scored track gets at least
//! the variety term, so it always beats an unscored one.

use crate::history::PlayedSet;
use pulse_core::Track;

/// Weight of tempo proximity to the target
pub const PROXIMITY_WEIGHT: f64 = 0.6;

/// Weight of the replay penalty
pub const VARIETY_WEIGHT: f64 = 0.2;

/// Weight of tempo fit to the effort zone
pub const ENERGY_WEIGHT: f64 = 0.2;

/// Tempo distance at which proximity drops to zero
const TEMPO_TOLERANCE: f64 = 50.0;

/// Heart rate treated as 100% effort
const HEART_RATE_CEILING: f64 = 200.0;

/// Variety term for a track that was already played
const REPLAY_VARIETY: f64 = 0.5;

/// Score `track` for `target_heart_rate`
///
/// Pure and deterministic.
pub fn score(track: &Track, target_heart_rate: u32, played: &PlayedSet) -> f64 {
    let Some(bpm) = track.bpm else {
        return 0.0;
    };

    let variety = if played.contains(&track.id) {
        REPLAY_VARIETY
    } else {
        1.0
    };

    PROXIMITY_WEIGHT * bpm_proximity(bpm, target_heart_rate)
        + VARIETY_WEIGHT * variety
        + ENERGY_WEIGHT * energy_alignment(bpm, target_heart_rate)
}

/// `max(0, 1 - |bpm - target| / 50)`
pub fn bpm_proximity(bpm: u32, target_heart_rate: u32) -> f64 {
    closeness(bpm, f64::from(target_heart_rate))
}

/// Fit of the track tempo to the tempo ideal for the current effort zone
pub fn energy_alignment(bpm: u32, target_heart_rate: u32) -> f64 {
    closeness(bpm, f64::from(ideal_tempo(target_heart_rate)))
}

/// Ideal track tempo for an effort zone
///
/// Effort is the heart rate as a fraction of a 200 bpm ceiling:
/// below 70% -> 100, below 80% -> 130, below 90% -> 150, else 170.
pub fn ideal_tempo(target_heart_rate: u32) -> u32 {
    let effort = f64::from(target_heart_rate) / HEART_RATE_CEILING;
    if effort < 0.70 {
        100
    } else if effort < 0.80 {
        130
    } else if effort < 0.90 {
        150
    } else {
        170
    }
}

fn closeness(bpm: u32, anchor: f64) -> f64 {
    (1.0 - (f64::from(bpm) - anchor).abs() / TEMPO_TOLERANCE).max(0.0)
}
