//! The public retrieval entry point.

use std::sync::Arc;
use std::time::{Duration, Instant};

use graphctx_nlp::NlpEngine;
use graphctx_shared::{
    ContextMode, ContextRequest, GraphContextError, KeywordSet, Result, RetrievalConfig,
};
use graphctx_storage::ContextStore;
use tracing::{info, instrument, warn};

use crate::assembler::{AssembleConfig, ContextAssembler};
use crate::cache::{CacheStats, RetrievalCache};
use crate::keywords::KeywordExtractor;
use crate::matcher::{BatchExtractor, ConcurrentMatcher};
use crate::pool::WorkerPool;
use crate::search::AnchorSearch;

/// Retrieval engine over one store, one NLP engine and one worker pool.
///
/// Cheap to share behind an `Arc`: the only mutable state is the internally
/// locked [`RetrievalCache`].
pub struct ContextEngine {
    assembler: ContextAssembler,
    extractor: KeywordExtractor,
    cache: Arc<RetrievalCache>,
    pool: WorkerPool,
    config: RetrievalConfig,
}

impl ContextEngine {
    /// Engine with a pool of [`WorkerPool::default_size`] workers.
    ///
    /// Fails with a config error if `config` does not validate.
    pub fn new(
        store: Arc<dyn ContextStore>,
        nlp: Arc<dyn NlpEngine>,
        config: RetrievalConfig,
    ) -> Result<Self> {
        Self::with_pool(store, nlp, config, WorkerPool::default())
    }

    pub fn with_pool(
        store: Arc<dyn ContextStore>,
        nlp: Arc<dyn NlpEngine>,
        config: RetrievalConfig,
        pool: WorkerPool,
    ) -> Result<Self> {
        config.validate()?;

        let extractor = KeywordExtractor::new(nlp);
        let cache = Arc::new(RetrievalCache::new(config.cache_capacity));
        let batch = BatchExtractor::new(pool.clone(), extractor.clone(), Arc::clone(&cache));
        let search = AnchorSearch::new(
            Arc::clone(&store),
            extractor.clone(),
            batch.clone(),
            ConcurrentMatcher::new(pool.clone()),
            Arc::clone(&cache),
            config.match_threshold,
        );
        let assembler = ContextAssembler::new(
            store,
            search,
            extractor.clone(),
            batch,
            Arc::clone(&cache),
            AssembleConfig {
                page_size: config.page_size,
                max_rounds: config.max_rounds,
                search_depth: config.search_depth,
                filter_threshold: config.filter_threshold,
            },
        );

        info!(
            nlp = extractor.engine_name(),
            workers = pool.size(),
            cache_capacity = config.cache_capacity,
            "context engine ready"
        );

        Ok(Self {
            assembler,
            extractor,
            cache,
            pool,
            config,
        })
    }

    /// Context for `request_text` under `mode`, or `None` if nothing relevant
    /// was found.
    ///
    /// `restricted_words` only matters in [`ContextMode::Restricted`]. With
    /// `search_timeout_ms` configured, running out of time is
    /// [`GraphContextError::Timeout`], never `None`.
    pub async fn get_context<I, S>(
        &self,
        request_text: &str,
        mode: ContextMode,
        restricted_words: I,
    ) -> Result<Option<Vec<String>>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let request = ContextRequest::new(request_text, mode).restrict(restricted_words);
        self.get_context_for(&request).await
    }

    #[instrument(skip_all, fields(mode = %request.mode, timeout_ms = ?self.config.search_timeout_ms))]
    pub async fn get_context_for(&self, request: &ContextRequest) -> Result<Option<Vec<String>>> {
        let Some(budget_ms) = self.config.search_timeout_ms else {
            return self.assembler.assemble(request).await;
        };

        let started = Instant::now();
        match tokio::time::timeout(
            Duration::from_millis(budget_ms),
            self.assembler.assemble(request),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                warn!(elapsed_ms, budget_ms, "context retrieval timed out");
                Err(GraphContextError::Timeout { elapsed_ms })
            }
        }
    }

    /// Keywords the engine would search with for `text`.
    pub fn keywords(&self, text: &str) -> Option<KeywordSet> {
        self.extractor.extract_cached(&self.cache, text)
    }

    pub fn assembler(&self) -> &ContextAssembler {
        &self.assembler
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
