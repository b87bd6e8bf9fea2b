//! Keyword-set overlap score.
//!
//! The score of N sets is the size of their common intersection divided by
//! the size of the smallest set, counting distinct members only. It lies in
//! `[0, 1]`, ignores order and duplicates, and is `0.0` whenever there is
//! nothing to compare.

use std::collections::HashSet;

use graphctx_shared::KeywordSet;

/// Overlap score across every set in `sets`.
///
/// `0.0` for an empty list or if any set is empty; `1.0` for a single
/// non-empty set.
pub fn similarity(sets: &[KeywordSet]) -> f64 {
    overlap(sets.iter().map(Vec::as_slice))
}

/// [`similarity`] of exactly two sets, without building a list.
pub fn pair_similarity(a: &[String], b: &[String]) -> f64 {
    overlap([a, b])
}

fn overlap<'a>(sets: impl IntoIterator<Item = &'a [String]>) -> f64 {
    let mut sets = sets.into_iter();
    let Some(first) = sets.next() else {
        return 0.0;
    };

    let mut common: HashSet<&str> = first.iter().map(String::as_str).collect();
    let mut smallest = common.len();

    for set in sets {
        let distinct: HashSet<&str> = set.iter().map(String::as_str).collect();
        smallest = smallest.min(distinct.len());
        common.retain(|word| distinct.contains(word));
    }

    if smallest == 0 {
        return 0.0;
    }
    common.len() as f64 / smallest as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(words: &[&str]) -> KeywordSet {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn single_set_is_one() {
        assert_eq!(similarity(&[set(&["weather", "week"])]), 1.0);
    }

    #[test]
    fn empty_inputs_score_zero() {
        assert_eq!(similarity(&[]), 0.0);
        assert_eq!(similarity(&[set(&["weather"]), set(&[])]), 0.0);
        assert_eq!(similarity(&[set(&[])]), 0.0);
        assert_eq!(pair_similarity(&[], &set(&["weather"])), 0.0);
    }

    #[test]
    fn order_independent() {
        let a = set(&["weather", "week", "city"]);
        let b = set(&["week", "forecast"]);
        assert_eq!(similarity(&[a.clone(), b.clone()]), similarity(&[b.clone(), a.clone()]));
        assert_eq!(pair_similarity(&a, &b), pair_similarity(&b, &a));
        assert_eq!(pair_similarity(&a, &b), 0.5);
    }

    #[test]
    fn divides_by_smallest_distinct_set() {
        let a = set(&["weather", "weather", "week"]);
        let b = set(&["weather", "forecast", "week", "rain"]);
        assert_eq!(pair_similarity(&a, &b), 1.0);

        let c = set(&["a", "b", "c", "d", "e"]);
        let d = set(&["a", "b", "x", "y", "z"]);
        assert!((pair_similarity(&c, &d) - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn three_way_intersection() {
        let sets = [
            set(&["weather", "week", "rain"]),
            set(&["weather", "rain"]),
            set(&["weather", "sun", "wind"]),
        ];
        assert_eq!(similarity(&sets), 0.5);
    }
}
