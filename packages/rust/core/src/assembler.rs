//! Context assembly.
//!
//! Finds the anchor for a request, expands around it in the graph, and turns
//! the related nodes into the final list of content strings under one of the
//! three [`ContextMode`] policies. Every "no context" outcome is `None`;
//! an assembled list is never empty.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use graphctx_shared::{
    ContextMode, ContextRequest, GraphContextError, KeywordSet, MAX_SEARCH_DEPTH, Node, Result,
};
use graphctx_storage::ContextStore;
use tracing::{debug, info, instrument};

use crate::cache::{RetrievalCache, batch_key};
use crate::keywords::KeywordExtractor;
use crate::matcher::BatchExtractor;
use crate::search::AnchorSearch;
use crate::similarity::pair_similarity;

/// Search and expansion settings for one assembler.
#[derive(Debug, Clone, Copy)]
pub struct AssembleConfig {
    pub page_size: usize,
    pub max_rounds: Option<u32>,
    pub search_depth: u32,
    pub filter_threshold: f64,
}

#[derive(Clone)]
pub struct ContextAssembler {
    store: Arc<dyn ContextStore>,
    search: AnchorSearch,
    extractor: KeywordExtractor,
    batch: BatchExtractor,
    cache: Arc<RetrievalCache>,
    config: AssembleConfig,
}

impl ContextAssembler {
    pub fn new(
        store: Arc<dyn ContextStore>,
        search: AnchorSearch,
        extractor: KeywordExtractor,
        batch: BatchExtractor,
        cache: Arc<RetrievalCache>,
        config: AssembleConfig,
    ) -> Self {
        Self {
            store,
            search,
            extractor,
            batch,
            cache,
            config,
        }
    }

    /// Assemble context for `request` under its mode.
    #[instrument(skip_all, fields(mode = %request.mode, restricted = request.restricted_words.len()))]
    pub async fn assemble(&self, request: &ContextRequest) -> Result<Option<Vec<String>>> {
        let context = match request.mode {
            ContextMode::Unrestricted => self.unrestricted(&request.text).await?,
            ContextMode::Restricted => {
                self.restricted(&request.text, &request.restricted_words)
                    .await?
            }
            ContextMode::Filtered => self.filtered(&request.text).await?,
        };

        match &context {
            Some(items) => info!(items = items.len(), "context assembled"),
            None => info!("no context available"),
        }
        Ok(context)
    }

    /// Content of every node within `depth` hops of `anchor_id`, or `None` if
    /// the anchor has no neighbours.
    pub async fn related(&self, anchor_id: &str, depth: u32) -> Result<Option<Vec<String>>> {
        let nodes = self.related_nodes(anchor_id, depth).await?;
        Ok(non_empty(nodes.into_iter().map(|n| n.content).collect()))
    }

    /// Related content of the request's anchor, verbatim.
    pub async fn unrestricted(&self, text: &str) -> Result<Option<Vec<String>>> {
        let nodes = self.anchor_context(text).await?;
        Ok(non_empty(nodes.into_iter().map(|n| n.content).collect()))
    }

    /// [`unrestricted`](Self::unrestricted), minus every item that contains
    /// any of `restricted_words` (case-insensitive substring match).
    pub async fn restricted(
        &self,
        text: &str,
        restricted_words: &BTreeSet<String>,
    ) -> Result<Option<Vec<String>>> {
        let Some(context) = self.unrestricted(text).await? else {
            return Ok(None);
        };
        Ok(non_empty(drop_restricted(context, restricted_words)))
    }

    /// [`unrestricted`](Self::unrestricted), keeping only items whose keywords
    /// overlap the request's by at least the filter threshold.
    pub async fn filtered(&self, text: &str) -> Result<Option<Vec<String>>> {
        let Some(target) = self.request_keywords(text) else {
            return Ok(None);
        };
        let nodes = self.anchor_context(text).await?;
        if nodes.is_empty() {
            return Ok(None);
        }

        let kept = self.keep_relevant(&target, nodes).await?;
        Ok(non_empty(kept))
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn request_keywords(&self, text: &str) -> Option<KeywordSet> {
        self.extractor
            .extract_cached(&self.cache, text)
            .filter(|keywords| !keywords.is_empty())
    }

    /// Nodes related to the request's anchor; empty when there is no anchor.
    async fn anchor_context(&self, text: &str) -> Result<Vec<Node>> {
        let anchor = self
            .search
            .find_anchor(text, self.config.page_size, self.config.max_rounds)
            .await?;
        match anchor {
            Some(anchor_id) => self.related_nodes(&anchor_id, self.config.search_depth).await,
            None => Ok(Vec::new()),
        }
    }

    async fn related_nodes(&self, anchor_id: &str, depth: u32) -> Result<Vec<Node>> {
        validate_depth(depth)?;
        let expanded = self.store.expand(anchor_id, depth).await?;

        let mut seen = HashSet::new();
        let nodes: Vec<Node> = expanded
            .into_iter()
            .filter(|node| node.id != anchor_id && seen.insert(node.id.clone()))
            .collect();
        debug!(anchor_id, depth, related = nodes.len(), "expanded anchor");
        Ok(nodes)
    }

    async fn keep_relevant(&self, target: &KeywordSet, nodes: Vec<Node>) -> Result<Vec<String>> {
        let key = batch_key(&nodes);
        let keywords = match self.cache.batch(&key) {
            Some(cached) => cached,
            None => {
                let extracted = self.batch.extract_batch(&nodes).await?;
                self.cache.put_batch(key, extracted.clone());
                extracted
            }
        };

        let threshold = self.config.filter_threshold;
        Ok(nodes
            .into_iter()
            .filter(|node| {
                keywords
                    .get(&node.id)
                    .is_some_and(|kw| pair_similarity(target, kw) >= threshold)
            })
            .map(|node| node.content)
            .collect())
    }
}

/// Expansion depth must be between 1 and [`MAX_SEARCH_DEPTH`].
pub fn validate_depth(depth: u32) -> Result<()> {
    if depth == 0 || depth > MAX_SEARCH_DEPTH {
        return Err(GraphContextError::config(format!(
            "search depth must be between 1 and {MAX_SEARCH_DEPTH}, got {depth}"
        )));
    }
    Ok(())
}

/// Drop every item containing any restricted word, ignoring case.
pub fn drop_restricted(context: Vec<String>, restricted_words: &BTreeSet<String>) -> Vec<String> {
    let words: Vec<String> = restricted_words
        .iter()
        .map(|w| w.to_lowercase())
        .filter(|w| !w.is_empty())
        .collect();
    context
        .into_iter()
        .filter(|item| {
            let item = item.to_lowercase();
            !words.iter().any(|w| item.contains(w.as_str()))
        })
        .collect()
}

fn non_empty(items: Vec<String>) -> Option<Vec<String>> {
    (!items.is_empty()).then_some(items)
}
