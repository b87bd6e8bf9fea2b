//! Shared types, error model, and configuration for graphctx.
//!
//! This crate is the foundation depended on by all other graphctx crates.
//! It provides:
//! - [`GraphContextError`]: the unified error type
//! - Domain types ([`Node`], [`KeywordSet`], [`ContextMode`], [`ContextRequest`])
//! - Configuration ([`AppConfig`], [`RetrievalConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, NlpConfig, RetrievalConfig, RetrievalSection, StoreConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{GraphContextError, Result};
pub use types::{
    CORE_MULTIPLIER, ContextMode, ContextRequest, DEFAULT_CACHE_CAPACITY,
    DEFAULT_FILTER_THRESHOLD, DEFAULT_MATCH_THRESHOLD, DEFAULT_PAGE_SIZE, DEFAULT_SEARCH_DEPTH,
    KeywordSet, MAX_SEARCH_DEPTH, MAX_WORKERS, Node, content_hash,
};
