//! Property-based tests for scoring, selection and history
//!
//! Uses proptest to verify invariants across many random inputs.
//! No shallow tests - every property test verifies meaningful invariants.

use proptest::prelude::*;
use pulse_core::Track;
use pulse_playback::{peek_best, rank, score, select_best, PlayHistory, PlayedEntry, PlayedSet};
use std::collections::HashSet;

// ===== Helpers =====

fn arbitrary_track() -> impl Strategy<Value = Track> {
    (
        "[a-z0-9]{1,8}",                   // id
        "[A-Za-z ]{1,20}",                 // title
        proptest::option::of(60u32..=220), // bpm
    )
        .prop_map(|(id, title, bpm)| {
            let track = Track::new(id, title, "Artist");
            match bpm {
                Some(bpm) => track.with_bpm(bpm),
                None => track,
            }
        })
}

/// Pool with unique ids
fn arbitrary_pool() -> impl Strategy<Value = Vec<Track>> {
    prop::collection::vec(arbitrary_track(), 1..30).prop_map(|tracks| {
        let mut seen = HashSet::new();
        tracks
            .into_iter()
            .filter(|t| seen.insert(t.id.clone()))
            .collect()
    })
}

// ===== Property Tests =====

proptest! {
    /// Property: Scores stay within [0, 1] and are deterministic
    #[test]
    fn score_is_bounded_and_deterministic(
        track in arbitrary_track(),
        target in 0u32..260,
        played_before in any::<bool>(),
    ) {
        let mut played = PlayedSet::new();
        if played_before {
            played.insert(track.id.clone());
        }

        let first = score(&track, target, &played);
        let second = score(&track, target, &played);

        prop_assert!((0.0..=1.0).contains(&first), "score {} out of range", first);
        prop_assert_eq!(first, second);
        if track.bpm.is_none() {
            prop_assert_eq!(first, 0.0);
        }
    }

    /// Property: Selection never starves - one full pass plays every track once
    #[test]
    fn selection_covers_pool_before_repeating(
        pool in arbitrary_pool(),
        targets in prop::collection::vec(60u32..200, 1..10),
    ) {
        let mut played = PlayedSet::new();
        let mut picked = HashSet::new();

        for i in 0..pool.len() {
            let target = targets[i % targets.len()];
            let best = select_best(&pool, &mut played, target);
            prop_assert!(picked.insert(best.id.clone()), "track {} picked twice", best.id);
        }
        prop_assert_eq!(picked.len(), pool.len());

        // Exhausted pool resets instead of failing
        let again = select_best(&pool, &mut played, targets[0]);
        prop_assert!(pool.contains(again));
        prop_assert_eq!(played.len(), 1);
    }

    /// Property: Selected track has the maximum score among unplayed tracks
    #[test]
    fn selection_picks_a_top_scorer(pool in arbitrary_pool(), target in 60u32..200) {
        let mut played = PlayedSet::new();
        let ranked = rank(&pool, &played, target);
        let top_score = ranked[0].1;

        let best = select_best(&pool, &mut played, target);
        prop_assert_eq!(score(best, target, &PlayedSet::new()), top_score);
    }

    /// Property: Peeking agrees with selecting and leaves state untouched
    #[test]
    fn peek_matches_select(pool in arbitrary_pool(), target in 60u32..200, warmup in 0usize..5) {
        let mut played = PlayedSet::new();
        for _ in 0..warmup.min(pool.len().saturating_sub(1)) {
            select_best(&pool, &mut played, target);
        }

        let before = played.clone();
        let peeked = peek_best(&pool, &played, target).clone();
        prop_assert_eq!(&played, &before);

        let selected = select_best(&pool, &mut played, target);
        prop_assert_eq!(&peeked, selected);
    }

    /// Property: History never holds consecutive duplicates and never
    /// exceeds its bound
    #[test]
    fn history_invariants_hold(
        picks in prop::collection::vec(0usize..6, 1..200),
        max_size in 2usize..20,
    ) {
        let tracks: Vec<Track> = (0..6)
            .map(|i| Track::new(format!("t{i}"), format!("Track {i}"), "Artist"))
            .collect();
        let mut history = PlayHistory::new(max_size);

        for pick in picks {
            history.push(PlayedEntry::now(tracks[pick].clone(), None));

            prop_assert!(history.len() <= max_size);
            let ids: Vec<_> = history.entries().map(|e| e.track.id.clone()).collect();
            prop_assert!(ids.windows(2).all(|w| w[0] != w[1]), "consecutive duplicate in {:?}", ids);
            prop_assert_eq!(history.current().map(|e| &e.track), Some(&tracks[pick]));
        }
    }
}
