//! Anchor search: page through the store newest first until a node matches.

use std::sync::Arc;

use graphctx_shared::{KeywordSet, Node, Result};
use graphctx_storage::ContextStore;
use tracing::{debug, info, instrument, warn};

use crate::cache::{BatchKeywords, RetrievalCache, batch_key};
use crate::keywords::KeywordExtractor;
use crate::matcher::{BatchExtractor, ConcurrentMatcher};

#[derive(Clone)]
pub struct AnchorSearch {
    store: Arc<dyn ContextStore>,
    extractor: KeywordExtractor,
    batch: BatchExtractor,
    matcher: ConcurrentMatcher,
    cache: Arc<RetrievalCache>,
    match_threshold: f64,
}

impl AnchorSearch {
    pub fn new(
        store: Arc<dyn ContextStore>,
        extractor: KeywordExtractor,
        batch: BatchExtractor,
        matcher: ConcurrentMatcher,
        cache: Arc<RetrievalCache>,
        match_threshold: f64,
    ) -> Self {
        Self {
            store,
            extractor,
            batch,
            matcher,
            cache,
            match_threshold,
        }
    }

    /// Id of the first node found to match `request_text`, or `None` when the
    /// text has no keywords, the store runs out, or `max_rounds` pages were
    /// searched without a match.
    ///
    /// `max_rounds: None` keeps paging until the store returns an empty page.
    pub async fn find_anchor(
        &self,
        request_text: &str,
        page_size: usize,
        max_rounds: Option<u32>,
    ) -> Result<Option<String>> {
        match self.extractor.extract_cached(&self.cache, request_text) {
            Some(target) if !target.is_empty() => {
                self.find_anchor_for(&target, page_size, max_rounds).await
            }
            _ => {
                debug!("request has no keywords, skipping search");
                Ok(None)
            }
        }
    }

    /// [`find_anchor`](Self::find_anchor) with keywords already extracted.
    #[instrument(skip_all, fields(keywords = target.len(), page_size = page_size, max_rounds = ?max_rounds))]
    pub async fn find_anchor_for(
        &self,
        target: &KeywordSet,
        page_size: usize,
        max_rounds: Option<u32>,
    ) -> Result<Option<String>> {
        if target.is_empty() {
            return Ok(None);
        }

        info!("starting anchor search");
        let mut offset = 0usize;
        let mut round = 0u32;

        loop {
            if max_rounds.is_some_and(|cap| round >= cap) {
                warn!(rounds = round, "round cap reached without a match");
                return Ok(None);
            }

            let page = self.store.fetch_recent(offset, page_size).await?;
            if page.is_empty() {
                info!(rounds = round, "store exhausted without a match");
                return Ok(None);
            }
            round += 1;

            let candidates = self.page_keywords(&page).await?;
            debug!(round, offset, fetched = page.len(), candidates = candidates.len(), "scoring page");

            if let Some(id) = self
                .matcher
                .find_match(target, candidates, self.match_threshold)
                .await?
            {
                info!(anchor = %id, rounds = round, "anchor found");
                return Ok(Some(id));
            }

            offset += page_size;
        }
    }

    async fn page_keywords(&self, page: &[Node]) -> Result<BatchKeywords> {
        let key = batch_key(page);
        if let Some(cached) = self.cache.batch(&key) {
            debug!(nodes = page.len(), "batch cache hit");
            return Ok(cached);
        }
        let extracted = self.batch.extract_batch(page).await?;
        self.cache.put_batch(key, extracted.clone());
        Ok(extracted)
    }
}
