//! Core domain types for graph context retrieval.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{GraphContextError, Result};

/// Minimum similarity (exclusive) for a candidate to become the anchor.
/// Kept tolerant to avoid false negatives while searching.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.4;

/// Minimum similarity (inclusive) for a context item to survive filtering.
/// Kept strict to avoid false positives in the final context.
pub const DEFAULT_FILTER_THRESHOLD: f64 = 0.6;

/// Nodes fetched per search round.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Default number of hops expanded around the anchor.
pub const DEFAULT_SEARCH_DEPTH: u32 = 2;

/// Deeper expansion is rejected: the result set grows faster than its relevance.
pub const MAX_SEARCH_DEPTH: u32 = 2;

/// Entries kept per retrieval cache before LRU eviction.
pub const DEFAULT_CACHE_CAPACITY: usize = 128;

/// Workers per logical core in the matching/extraction pool.
pub const CORE_MULTIPLIER: usize = 2;

/// Hard ceiling on the worker pool size.
pub const MAX_WORKERS: usize = 32;

/// Keywords (nouns) extracted from a text, in original order.
///
/// Scoring treats it as a set: order and duplicates are irrelevant.
pub type KeywordSet = Vec<String>;

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A read-only snapshot of a content node as returned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Stable node identifier.
    pub id: String,
    /// Free-text content of the node.
    pub content: String,
    /// Recency key; search pages newest first.
    pub timestamp: DateTime<Utc>,
}

impl Node {
    pub fn new(id: impl Into<String>, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            timestamp,
        }
    }

    /// Hex SHA-256 of this node's content.
    pub fn content_hash(&self) -> String {
        content_hash(&self.content)
    }
}

/// Hex-encoded SHA-256 digest of a content string.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// ContextMode
// ---------------------------------------------------------------------------

/// Assembly policy applied to the nodes expanded around the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextMode {
    /// Every related node's content, verbatim.
    Unrestricted,
    /// Related content minus anything mentioning a restricted word.
    Restricted,
    /// Related content whose keywords overlap the request's strongly enough.
    #[default]
    Filtered,
}

impl ContextMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unrestricted => "unrestricted",
            Self::Restricted => "restricted",
            Self::Filtered => "filtered",
        }
    }
}

impl std::fmt::Display for ContextMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContextMode {
    type Err = GraphContextError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "unrestricted" => Ok(Self::Unrestricted),
            "restricted" => Ok(Self::Restricted),
            "filtered" => Ok(Self::Filtered),
            other => Err(GraphContextError::config(format!(
                "invalid mode '{other}': use 'unrestricted', 'restricted', or 'filtered'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// ContextRequest
// ---------------------------------------------------------------------------

/// A single inbound context request. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRequest {
    /// Free-text request, typically the user's prompt.
    pub text: String,
    /// Assembly policy.
    #[serde(default)]
    pub mode: ContextMode,
    /// Words whose presence excludes a content item in restricted mode.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub restricted_words: BTreeSet<String>,
}

impl ContextRequest {
    pub fn new(text: impl Into<String>, mode: ContextMode) -> Self {
        Self {
            text: text.into(),
            mode,
            restricted_words: BTreeSet::new(),
        }
    }

    /// Add restricted words (builder style).
    pub fn restrict<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.restricted_words
            .extend(words.into_iter().map(Into::into));
        self
    }
}
