//! Best-track selection over a pool
//!
//! Replaces the shuffle step of a conventional player: the next track is
//! whichever unplayed pool track scores highest for the current target.

use crate::history::PlayedSet;
use crate::scoring::score;
use pulse_core::Track;

/// Pick the best unplayed track and mark it played
///
/// If every pool track was already played, the played set is cleared first
/// and the whole pool is considered again, so selection never starves.
/// Ties go to the track that comes first in the pool.
///
/// # Panics
/// Panics if `pool` is empty. Callers guarantee a non-empty pool.
pub fn select_best<'a>(pool: &'a [Track], played: &mut PlayedSet, target_heart_rate: u32) -> &'a Track {
    assert!(!pool.is_empty(), "select_best called with an empty pool");

    if pool.iter().all(|t| played.contains(&t.id)) {
        tracing::debug!(pool = pool.len(), "Pool exhausted, resetting played set");
        played.clear();
    }

    let best = best_unplayed(pool, played, target_heart_rate);
    played.insert(best.id.clone());
    best
}

/// Pick the track `select_best` would pick, without touching the played set
///
/// An exhausted pool is ranked as a whole, with the replay penalty applied.
///
/// # Panics
/// Panics if `pool` is empty.
pub fn peek_best<'a>(pool: &'a [Track], played: &PlayedSet, target_heart_rate: u32) -> &'a Track {
    assert!(!pool.is_empty(), "peek_best called with an empty pool");

    if pool.iter().all(|t| played.contains(&t.id)) {
        return max_by_score(pool.iter(), played, target_heart_rate);
    }
    best_unplayed(pool, played, target_heart_rate)
}

/// Pool sorted by score, best first, with scores
///
/// Used for display and diagnostics; does not affect selection state.
pub fn rank<'a>(pool: &'a [Track], played: &PlayedSet, target_heart_rate: u32) -> Vec<(&'a Track, f64)> {
    let mut ranked: Vec<_> = pool
        .iter()
        .map(|t| (t, score(t, target_heart_rate, played)))
        .collect();
    // Stable sort keeps pool order among equal scores
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}

fn best_unplayed<'a>(pool: &'a [Track], played: &PlayedSet, target_heart_rate: u32) -> &'a Track {
    max_by_score(
        pool.iter().filter(|t| !played.contains(&t.id)),
        played,
        target_heart_rate,
    )
}

fn max_by_score<'a>(
    candidates: impl Iterator<Item = &'a Track>,
    played: &PlayedSet,
    target_heart_rate: u32,
) -> &'a Track {
    let mut best: Option<(&Track, f64)> = None;
    for track in candidates {
        let s = score(track, target_heart_rate, played);
        match best {
            Some((_, best_score)) if s <= best_score => {}
            _ => best = Some((track, s)),
        }
    }
    // Callers only pass non-empty candidate sets
    best.map(|(t, _)| t)
        .unwrap_or_else(|| unreachable!("no candidates to select from"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::TrackId;

    fn track(id: &str, bpm: Option<u32>) -> Track {
        let t = Track::new(id, format!("Track {}", id), "Artist");
        match bpm {
            Some(b) => t.with_bpm(b),
            None => t,
        }
    }

    #[test]
    fn picks_closest_tempo_at_155() {
        let pool = vec![track("slow", Some(100)), track("fast", Some(150))];
        let mut played = PlayedSet::new();

        let best = select_best(&pool, &mut played, 155);
        assert_eq!(best.id.as_str(), "fast");
        assert!(played.contains(&TrackId::new("fast")));
    }

    #[test]
    fn skips_played_tracks() {
        let pool = vec![track("slow", Some(100)), track("fast", Some(150))];
        let mut played: PlayedSet = [TrackId::new("fast")].into_iter().collect();

        let best = select_best(&pool, &mut played, 155);
        assert_eq!(best.id.as_str(), "slow");
        assert_eq!(played.len(), 2);
    }

    #[test]
    fn exhaustion_resets_played_set() {
        let pool = vec![track("a", Some(120)), track("b", Some(160))];
        let mut played: PlayedSet = pool.iter().map(|t| t.id.clone()).collect();

        let best = select_best(&pool, &mut played, 160);
        assert_eq!(best.id.as_str(), "b");
        // Cleared, then the winner marked
        assert_eq!(played.len(), 1);
        assert!(played.contains(&TrackId::new("b")));
    }

    #[test]
    fn scored_beats_unscored() {
        let pool = vec![track("none", None), track("far", Some(220))];
        let mut played = PlayedSet::new();
        assert_eq!(select_best(&pool, &mut played, 90).id.as_str(), "far");
    }

    #[test]
    fn all_unscored_pool_still_selects() {
        let pool = vec![track("x", None), track("y", None)];
        let mut played = PlayedSet::new();
        assert_eq!(select_best(&pool, &mut played, 140).id.as_str(), "x");
        assert_eq!(select_best(&pool, &mut played, 140).id.as_str(), "y");
    }

    #[test]
    fn tie_goes_to_first_in_pool() {
        let pool = vec![track("first", Some(130)), track("second", Some(130))];
        let mut played = PlayedSet::new();
        assert_eq!(select_best(&pool, &mut played, 150).id.as_str(), "first");
    }

    #[test]
    fn peek_does_not_mark() {
        let pool = vec![track("a", Some(120)), track("b", Some(160))];
        let played = PlayedSet::new();

        let peeked = peek_best(&pool, &played, 165);
        assert_eq!(peeked.id.as_str(), "b");
        assert!(played.is_empty());
    }

    #[test]
    fn peek_on_exhausted_pool_ranks_everything() {
        let pool = vec![track("a", Some(120)), track("b", Some(160))];
        let played: PlayedSet = pool.iter().map(|t| t.id.clone()).collect();

        assert_eq!(peek_best(&pool, &played, 165).id.as_str(), "b");
        assert_eq!(played.len(), 2);
    }

    #[test]
    fn rank_orders_best_first() {
        let pool = vec![track("a", Some(90)), track("b", Some(150)), track("c", None)];
        let ranked = rank(&pool, &PlayedSet::new(), 155);
        let ids: Vec<_> = ranked.iter().map(|(t, _)| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    #[should_panic(expected = "empty pool")]
    fn empty_pool_is_a_programming_error() {
        let mut played = PlayedSet::new();
        select_best(&[], &mut played, 120);
    }
}
