//! Retrieval memoization.
//!
//! Two bounded LRU maps shared by every request on an engine:
//!
//! - **text**: request or node text to its extracted keywords (including
//!   "no keywords", so empty texts are not re-tokenized);
//! - **batch**: a page of nodes to its per-node keyword map, keyed by
//!   [`batch_key`] rather than by the page itself.
//!
//! Eviction is purely size-based: the least recently used entry goes when a
//! new key arrives at capacity. There is no TTL.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use graphctx_shared::{KeywordSet, Node};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

/// Per-node keywords for one page, by node id.
pub type BatchKeywords = HashMap<String, KeywordSet>;

/// Stable identity of a page of nodes: hex SHA-256 over its ordered
/// `(id, content hash)` pairs.
///
/// Two pages share a key only if they hold the same nodes with the same
/// content in the same order.
pub fn batch_key(nodes: &[Node]) -> String {
    let mut hasher = Sha256::new();
    for node in nodes {
        hasher.update(node.id.as_bytes());
        hasher.update([0u8]);
        hasher.update(node.content_hash().as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Lru
// ---------------------------------------------------------------------------

struct Lru<K, V> {
    entries: HashMap<K, (V, u64)>,
    capacity: usize,
    tick: u64,
}

impl<K: Eq + Hash + Clone, V: Clone> Lru<K, V> {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            capacity: capacity.max(1),
            tick: 0,
        }
    }

    fn get<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.tick += 1;
        let tick = self.tick;
        self.entries.get_mut(key).map(|(value, last_used)| {
            *last_used = tick;
            value.clone()
        })
    }

    fn insert(&mut self, key: K, value: V) {
        self.tick += 1;
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_lru();
        }
        self.entries.insert(key, (value, self.tick));
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, (_, last_used))| *last_used)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

// ---------------------------------------------------------------------------
// RetrievalCache
// ---------------------------------------------------------------------------

/// Hit/miss counters, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub text_hits: u64,
    pub text_misses: u64,
    pub batch_hits: u64,
    pub batch_misses: u64,
}

/// Process-lifetime keyword cache. Internally locked; share it behind an `Arc`.
pub struct RetrievalCache {
    text: Mutex<Lru<String, Option<KeywordSet>>>,
    batch: Mutex<Lru<String, BatchKeywords>>,
    text_hits: AtomicU64,
    text_misses: AtomicU64,
    batch_hits: AtomicU64,
    batch_misses: AtomicU64,
}

impl RetrievalCache {
    /// Both maps hold at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            text: Mutex::new(Lru::new(capacity)),
            batch: Mutex::new(Lru::new(capacity)),
            text_hits: AtomicU64::new(0),
            text_misses: AtomicU64::new(0),
            batch_hits: AtomicU64::new(0),
            batch_misses: AtomicU64::new(0),
        }
    }

    /// Cached keywords for `text`. The outer `None` is a miss; the inner one
    /// is a cached "no keywords".
    pub fn keywords(&self, text: &str) -> Option<Option<KeywordSet>> {
        let hit = self.text.lock().get(text);
        record(&self.text_hits, &self.text_misses, hit.is_some());
        hit
    }

    pub fn put_keywords(&self, text: &str, keywords: Option<KeywordSet>) {
        self.text.lock().insert(text.to_string(), keywords);
    }

    /// Cached per-node keywords for the page identified by `key`.
    pub fn batch(&self, key: &str) -> Option<BatchKeywords> {
        let hit = self.batch.lock().get(key);
        record(&self.batch_hits, &self.batch_misses, hit.is_some());
        hit
    }

    pub fn put_batch(&self, key: String, keywords: BatchKeywords) {
        self.batch.lock().insert(key, keywords);
    }

    /// Entries currently held, as `(text, batch)`.
    pub fn len(&self) -> (usize, usize) {
        (self.text.lock().len(), self.batch.lock().len())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            text_hits: self.text_hits.load(Ordering::Relaxed),
            text_misses: self.text_misses.load(Ordering::Relaxed),
            batch_hits: self.batch_hits.load(Ordering::Relaxed),
            batch_misses: self.batch_misses.load(Ordering::Relaxed),
        }
    }
}

fn record(hits: &AtomicU64, misses: &AtomicU64, hit: bool) {
    if hit {
        hits.fetch_add(1, Ordering::Relaxed);
    } else {
        misses.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn node(id: &str, content: &str) -> Node {
        Node::new(id, content, Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn batch_key_tracks_ids_content_and_order() {
        let a = node("a", "weather forecast");
        let b = node("b", "umbrella");

        let key = batch_key(&[a.clone(), b.clone()]);
        assert_eq!(key.len(), 64);
        assert_eq!(key, batch_key(&[a.clone(), b.clone()]));
        assert_ne!(key, batch_key(&[b.clone(), a.clone()]));
        assert_ne!(key, batch_key(&[a.clone(), node("b", "raincoat")]));
        assert_ne!(key, batch_key(&[a, node("c", "umbrella")]));
    }

    #[test]
    fn batch_key_separates_field_boundaries() {
        assert_ne!(
            batch_key(&[node("ab", "c")]),
            batch_key(&[node("a", "bc")])
        );
    }

    #[test]
    fn caches_absent_keywords() {
        let cache = RetrievalCache::new(4);
        assert_eq!(cache.keywords("the of"), None);
        cache.put_keywords("the of", None);
        assert_eq!(cache.keywords("the of"), Some(None));

        let stats = cache.stats();
        assert_eq!(stats.text_hits, 1);
        assert_eq!(stats.text_misses, 1);
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = RetrievalCache::new(2);
        cache.put_keywords("one", Some(vec!["one".into()]));
        cache.put_keywords("two", Some(vec!["two".into()]));

        // Touch "one" so "two" becomes the eviction candidate.
        assert!(cache.keywords("one").is_some());
        cache.put_keywords("three", Some(vec!["three".into()]));

        assert!(cache.keywords("one").is_some());
        assert!(cache.keywords("two").is_none());
        assert!(cache.keywords("three").is_some());
        assert_eq!(cache.len().0, 2);
    }

    #[test]
    fn overwrite_does_not_evict() {
        let cache = RetrievalCache::new(2);
        cache.put_batch("k1".into(), BatchKeywords::new());
        cache.put_batch("k2".into(), BatchKeywords::new());
        cache.put_batch("k1".into(), BatchKeywords::from([("a".into(), vec!["x".into()])]));

        assert_eq!(cache.len().1, 2);
        let batch = cache.batch("k1").expect("still cached");
        assert_eq!(batch["a"], vec!["x".to_string()]);
        assert!(cache.batch("k2").is_some());
        assert_eq!(cache.stats().batch_hits, 2);
    }
}
