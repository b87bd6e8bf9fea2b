//! Pool fan-out: racing candidates against a target, and extracting a page.
//!
//! The two patterns are separate operations:
//!
//! - **race**: [`ConcurrentMatcher::find_match`] returns the first candidate
//!   to finish above the threshold and aborts the rest. Which qualifying
//!   candidate wins depends on scheduling.
//! - **full map**: [`BatchExtractor::extract_batch`] waits for every job and
//!   files each result under its node id.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use graphctx_shared::{KeywordSet, Node, Result};
use tokio::task::JoinSet;
use tracing::{debug, instrument};

use crate::cache::{BatchKeywords, RetrievalCache};
use crate::keywords::KeywordExtractor;
use crate::pool::{WorkerPool, joined};
use crate::similarity::pair_similarity;

// ---------------------------------------------------------------------------
// ConcurrentMatcher
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ConcurrentMatcher {
    pool: WorkerPool,
}

impl ConcurrentMatcher {
    pub fn new(pool: WorkerPool) -> Self {
        Self { pool }
    }

    /// Race every candidate against `target`; the first to finish with a
    /// score strictly above `threshold` wins.
    ///
    /// This is not a best match: with several qualifying candidates any of
    /// them may be returned. Use [`score_all`](Self::score_all) when the
    /// answer must not depend on scheduling.
    #[instrument(skip_all, fields(candidates = candidates.len(), threshold = threshold))]
    pub async fn find_match(
        &self,
        target: &KeywordSet,
        candidates: HashMap<String, KeywordSet>,
        threshold: f64,
    ) -> Result<Option<String>> {
        if candidates.is_empty() {
            return Ok(None);
        }

        let target = Arc::new(target.clone());
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut tasks = JoinSet::new();

        for (id, keywords) in candidates {
            let target = Arc::clone(&target);
            let cancelled = Arc::clone(&cancelled);
            self.pool.spawn(&mut tasks, move || {
                if cancelled.load(Ordering::Relaxed) {
                    return (id, None);
                }
                let score = pair_similarity(&target, &keywords);
                (id, Some(score))
            });
        }

        while let Some(result) = tasks.join_next().await {
            let (id, score) = joined(result)?;
            let Some(score) = score else { continue };
            if score > threshold {
                cancelled.store(true, Ordering::Relaxed);
                tasks.abort_all();
                debug!(%id, score, "candidate matched");
                return Ok(Some(id));
            }
        }
        Ok(None)
    }

    /// Score every candidate and return the highest scorer strictly above
    /// `threshold`, ties going to the smallest id.
    ///
    /// Deterministic, but always pays for the whole batch.
    #[instrument(skip_all, fields(candidates = candidates.len(), threshold = threshold))]
    pub async fn score_all(
        &self,
        target: &KeywordSet,
        candidates: HashMap<String, KeywordSet>,
        threshold: f64,
    ) -> Result<Option<String>> {
        let target = Arc::new(target.clone());
        let mut tasks = JoinSet::new();

        for (id, keywords) in candidates {
            let target = Arc::clone(&target);
            self.pool.spawn(&mut tasks, move || {
                let score = pair_similarity(&target, &keywords);
                (id, score)
            });
        }

        let mut best: Option<(String, f64)> = None;
        while let Some(result) = tasks.join_next().await {
            let (id, score) = joined(result)?;
            if score <= threshold {
                continue;
            }
            let better = match &best {
                None => true,
                Some((best_id, best_score)) => {
                    score > *best_score || (score == *best_score && id < *best_id)
                }
            };
            if better {
                best = Some((id, score));
            }
        }
        Ok(best.map(|(id, _)| id))
    }
}

// ---------------------------------------------------------------------------
// BatchExtractor
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct BatchExtractor {
    pool: WorkerPool,
    extractor: KeywordExtractor,
    cache: Arc<RetrievalCache>,
}

impl BatchExtractor {
    pub fn new(pool: WorkerPool, extractor: KeywordExtractor, cache: Arc<RetrievalCache>) -> Self {
        Self {
            pool,
            extractor,
            cache,
        }
    }

    /// Keywords of every node in `nodes`, by node id.
    ///
    /// Waits for the whole batch. Each node goes through the text cache, so
    /// content seen on an earlier page is not tagged again. Nodes whose
    /// content yields no keywords are left out: they can never match.
    #[instrument(skip_all, fields(nodes = nodes.len()))]
    pub async fn extract_batch(&self, nodes: &[Node]) -> Result<BatchKeywords> {
        let mut tasks = JoinSet::new();
        for node in nodes {
            let extractor = self.extractor.clone();
            let cache = Arc::clone(&self.cache);
            let id = node.id.clone();
            let content = node.content.clone();
            self.pool.spawn(&mut tasks, move || {
                let keywords = extractor.extract_cached(&cache, &content);
                (id, keywords)
            });
        }

        let mut batch = BatchKeywords::with_capacity(nodes.len());
        while let Some(result) = tasks.join_next().await {
            let (id, keywords) = joined(result)?;
            match keywords {
                Some(keywords) if !keywords.is_empty() => {
                    batch.insert(id, keywords);
                }
                _ => {}
            }
        }
        debug!(extracted = batch.len(), "batch extracted");
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use graphctx_nlp::load_engine;

    fn set(words: &[&str]) -> KeywordSet {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn matcher() -> ConcurrentMatcher {
        ConcurrentMatcher::new(WorkerPool::new(4))
    }

    #[tokio::test]
    async fn finds_the_only_qualifying_candidate() {
        let mut candidates = HashMap::new();
        for i in 0..50 {
            candidates.insert(format!("noise-{i}"), set(&["garlic", "recipe"]));
        }
        candidates.insert("hit".to_string(), set(&["weather", "forecast", "week"]));

        let found = matcher()
            .find_match(&set(&["weather", "week"]), candidates, 0.4)
            .await
            .unwrap();
        assert_eq!(found.as_deref(), Some("hit"));
    }

    #[tokio::test]
    async fn score_equal_to_threshold_does_not_match() {
        let candidates = HashMap::from([
            ("a".to_string(), set(&["a", "b", "x", "y", "z"])),
            ("b".to_string(), set(&["q"])),
        ]);
        let target = set(&["a", "b", "c", "d", "e"]);

        let m = matcher();
        assert_eq!(m.find_match(&target, candidates.clone(), 0.4).await.unwrap(), None);
        assert_eq!(m.score_all(&target, candidates, 0.4).await.unwrap(), None);
    }

    #[tokio::test]
    async fn any_qualifying_candidate_may_win_the_race() {
        let candidates = HashMap::from([
            ("a".to_string(), set(&["weather"])),
            ("b".to_string(), set(&["weather", "week"])),
            ("c".to_string(), set(&["garlic"])),
        ]);
        let found = matcher()
            .find_match(&set(&["weather", "week"]), candidates, 0.4)
            .await
            .unwrap()
            .unwrap();
        assert!(found == "a" || found == "b");
    }

    #[tokio::test]
    async fn first_match_aborts_queued_candidates() {
        let pool = WorkerPool::new(1);
        let m = ConcurrentMatcher::new(pool.clone());
        let candidates: HashMap<_, _> = (0..200)
            .map(|i| (format!("n{i}"), set(&["weather", "week"])))
            .collect();

        let found = m
            .find_match(&set(&["weather"]), candidates, 0.4)
            .await
            .unwrap();
        assert!(found.is_some());

        // Let any job already handed to a blocking thread finish.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(pool.dispatched(), 200);
        assert!(pool.completed() < 200, "ran {} jobs", pool.completed());
    }

    #[tokio::test]
    async fn empty_candidates_dispatch_nothing() {
        let pool = WorkerPool::new(2);
        let m = ConcurrentMatcher::new(pool.clone());
        let found = m.find_match(&set(&["weather"]), HashMap::new(), 0.4).await.unwrap();
        assert_eq!(found, None);
        assert_eq!(pool.dispatched(), 0);
    }

    #[tokio::test]
    async fn score_all_picks_best_and_breaks_ties_by_id() {
        let target = set(&["weather", "week", "rain"]);
        let candidates = HashMap::from([
            ("partial".to_string(), set(&["weather", "garlic"])),
            ("zeta".to_string(), set(&["weather", "week", "rain"])),
            ("alpha".to_string(), set(&["rain", "week", "weather", "wind"])),
        ]);
        let best = matcher().score_all(&target, candidates, 0.4).await.unwrap();
        assert_eq!(best.as_deref(), Some("alpha"));
    }

    #[tokio::test]
    async fn extract_batch_associates_by_id() {
        let pool = WorkerPool::new(3);
        let extractor = KeywordExtractor::new(load_engine("en_rules").unwrap());
        let batch_extractor =
            BatchExtractor::new(pool.clone(), extractor, Arc::new(RetrievalCache::new(16)));

        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let nodes = vec![
            Node::new("b", "Weather forecast for next week", base),
            Node::new("c", "Pack an umbrella for the rain", base + Duration::minutes(1)),
            Node::new("d", "and then it was", base + Duration::minutes(2)),
        ];

        let batch = batch_extractor.extract_batch(&nodes).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch["b"], set(&["Weather", "forecast", "week"]));
        assert_eq!(batch["c"], set(&["Pack", "umbrella", "rain"]));
        assert!(!batch.contains_key("d"));
        assert_eq!(pool.dispatched(), 3);
    }

    #[tokio::test]
    async fn overlapping_pages_reuse_node_keywords() {
        let cache = Arc::new(RetrievalCache::new(16));
        let extractor = KeywordExtractor::new(load_engine("en_rules").unwrap());
        let batch_extractor = BatchExtractor::new(WorkerPool::new(2), extractor, Arc::clone(&cache));

        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let b = Node::new("b", "Weather forecast for next week", base);
        let c = Node::new("c", "Pack an umbrella for the rain", base + Duration::minutes(1));
        let e = Node::new("e", "Garlic bread recipe", base + Duration::minutes(2));

        batch_extractor.extract_batch(&[c.clone(), b]).await.unwrap();
        assert_eq!(cache.stats().text_hits, 0);

        let shifted = batch_extractor.extract_batch(&[e, c]).await.unwrap();
        assert_eq!(shifted["c"], set(&["Pack", "umbrella", "rain"]));
        let stats = cache.stats();
        assert_eq!(stats.text_hits, 1);
        assert_eq!(stats.text_misses, 3);
    }
}
