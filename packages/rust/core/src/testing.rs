//! Store fixtures shared by the engine tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use graphctx_nlp::load_engine;
use graphctx_shared::{Node, Result};
use graphctx_storage::{ContextStore, MemoryStore};

use crate::keywords::KeywordExtractor;

/// Wraps a store and counts every call made through it.
#[derive(Default)]
pub struct CountingStore {
    pub inner: MemoryStore,
    pub fetches: AtomicUsize,
    pub expansions: AtomicUsize,
    /// Sleep before every fetch, to exercise timeouts.
    pub fetch_delay: Option<Duration>,
}

impl CountingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn expansions(&self) -> usize {
        self.expansions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContextStore for CountingStore {
    async fn fetch_recent(&self, offset: usize, limit: usize) -> Result<Vec<Node>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.fetch_recent(offset, limit).await
    }

    async fn expand(&self, anchor_id: &str, depth: u32) -> Result<Vec<Node>> {
        self.expansions.fetch_add(1, Ordering::SeqCst);
        self.inner.expand(anchor_id, depth).await
    }
}

pub fn minutes(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + chrono::Duration::minutes(n)
}

pub fn extractor() -> KeywordExtractor {
    KeywordExtractor::new(load_engine("en_rules").unwrap())
}

/// B ("weather forecast") linked to C ("umbrella"); A is unrelated and alone.
pub fn weather_graph() -> Arc<CountingStore> {
    let store = MemoryStore::new();
    store.add_node(Node::new("a", "Cooking recipes with garlic", minutes(0)));
    store.add_node(Node::new("b", "Weather forecast for next week", minutes(1)));
    store.add_node(Node::new("c", "Pack an umbrella for the rain", minutes(2)));
    store.link("b", "c").unwrap();
    Arc::new(CountingStore::new(store))
}
