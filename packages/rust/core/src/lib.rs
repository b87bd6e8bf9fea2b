//! Graph context retrieval.
//!
//! Given free text, [`ContextEngine`] extracts its keywords, pages through
//! the store newest first until some node's keywords overlap enough (the
//! anchor), expands the graph around that anchor, and returns the related
//! content under the requested [`ContextMode`](graphctx_shared::ContextMode).

pub mod assembler;
pub mod cache;
pub mod engine;
pub mod keywords;
pub mod matcher;
pub mod pool;
pub mod search;
pub mod similarity;

#[cfg(test)]
mod testing;

pub use assembler::{AssembleConfig, ContextAssembler};
pub use cache::{CacheStats, RetrievalCache, batch_key};
pub use engine::ContextEngine;
pub use keywords::KeywordExtractor;
pub use matcher::{BatchExtractor, ConcurrentMatcher};
pub use pool::WorkerPool;
pub use search::AnchorSearch;
pub use similarity::{pair_similarity, similarity};
