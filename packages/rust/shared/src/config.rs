//! Application configuration for graphctx.
//!
//! User config lives at `~/.graphctx/graphctx.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GraphContextError, Result};
use crate::types::{
    ContextMode, DEFAULT_CACHE_CAPACITY, DEFAULT_FILTER_THRESHOLD, DEFAULT_MATCH_THRESHOLD,
    DEFAULT_PAGE_SIZE, DEFAULT_SEARCH_DEPTH, MAX_SEARCH_DEPTH,
};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "graphctx.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".graphctx";

/// Default database file name inside the config directory.
const DB_FILE_NAME: &str = "graph.db";

// ---------------------------------------------------------------------------
// Config structs (matching graphctx.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Retrieval tuning.
    #[serde(default)]
    pub retrieval: RetrievalSection,

    /// Context store location.
    #[serde(default)]
    pub store: StoreConfig,

    /// NLP engine selection.
    #[serde(default)]
    pub nlp: NlpConfig,
}

/// `[retrieval]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSection {
    /// Similarity a candidate must strictly exceed to become the anchor.
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,

    /// Similarity a context item must reach in filtered mode.
    #[serde(default = "default_filter_threshold")]
    pub filter_threshold: f64,

    /// Nodes fetched per search round.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Hops expanded around the anchor (1 or 2).
    #[serde(default = "default_search_depth")]
    pub search_depth: u32,

    /// Entries per retrieval cache.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Round cap for the widening search; `0` searches until the store is exhausted.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Wall-clock budget for one context request, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_timeout_ms: Option<u64>,

    /// Mode used when the caller does not pick one.
    #[serde(default)]
    pub default_mode: ContextMode,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            match_threshold: default_match_threshold(),
            filter_threshold: default_filter_threshold(),
            page_size: default_page_size(),
            search_depth: default_search_depth(),
            cache_capacity: default_cache_capacity(),
            max_rounds: default_max_rounds(),
            search_timeout_ms: None,
            default_mode: ContextMode::default(),
        }
    }
}

fn default_match_threshold() -> f64 {
    DEFAULT_MATCH_THRESHOLD
}
fn default_filter_threshold() -> f64 {
    DEFAULT_FILTER_THRESHOLD
}
fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}
fn default_search_depth() -> u32 {
    DEFAULT_SEARCH_DEPTH
}
fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}
// Policy of the CLI layer; the engine itself never caps rounds.
fn default_max_rounds() -> u32 {
    50
}

/// `[store]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the libSQL database. Defaults to `~/.graphctx/graph.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
}

impl StoreConfig {
    /// Resolve the database path, falling back to the config directory.
    pub fn resolved_db_path(&self) -> Result<PathBuf> {
        match &self.db_path {
            Some(p) => Ok(PathBuf::from(p)),
            None => Ok(config_dir()?.join(DB_FILE_NAME)),
        }
    }
}

/// `[nlp]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NlpConfig {
    /// NLP engine name.
    #[serde(default = "default_nlp_model")]
    pub model: String,
}

impl Default for NlpConfig {
    fn default() -> Self {
        Self {
            model: default_nlp_model(),
        }
    }
}

fn default_nlp_model() -> String {
    "en_rules".into()
}

// ---------------------------------------------------------------------------
// Retrieval config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime retrieval configuration, merged from config file + CLI flags.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalConfig {
    pub match_threshold: f64,
    pub filter_threshold: f64,
    pub page_size: usize,
    pub search_depth: u32,
    pub cache_capacity: usize,
    /// `None` searches until the store runs out of nodes.
    pub max_rounds: Option<u32>,
    pub search_timeout_ms: Option<u64>,
}

impl Default for RetrievalConfig {
    /// Library defaults: no round cap, no timeout.
    fn default() -> Self {
        Self {
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            filter_threshold: DEFAULT_FILTER_THRESHOLD,
            page_size: DEFAULT_PAGE_SIZE,
            search_depth: DEFAULT_SEARCH_DEPTH,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            max_rounds: None,
            search_timeout_ms: None,
        }
    }
}

impl From<&AppConfig> for RetrievalConfig {
    fn from(config: &AppConfig) -> Self {
        let r = &config.retrieval;
        Self {
            match_threshold: r.match_threshold,
            filter_threshold: r.filter_threshold,
            page_size: r.page_size,
            search_depth: r.search_depth,
            cache_capacity: r.cache_capacity,
            max_rounds: (r.max_rounds > 0).then_some(r.max_rounds),
            search_timeout_ms: r.search_timeout_ms,
        }
    }
}

impl RetrievalConfig {
    /// Reject settings the engine cannot honour.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("match_threshold", self.match_threshold),
            ("filter_threshold", self.filter_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(GraphContextError::config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.filter_threshold < self.match_threshold {
            return Err(GraphContextError::config(format!(
                "filter_threshold ({}) must not be looser than match_threshold ({})",
                self.filter_threshold, self.match_threshold
            )));
        }
        if self.page_size == 0 {
            return Err(GraphContextError::config("page_size must be at least 1"));
        }
        if self.search_depth == 0 || self.search_depth > MAX_SEARCH_DEPTH {
            return Err(GraphContextError::config(format!(
                "search_depth must be between 1 and {MAX_SEARCH_DEPTH}, got {}",
                self.search_depth
            )));
        }
        if self.cache_capacity == 0 {
            return Err(GraphContextError::config("cache_capacity must be at least 1"));
        }
        if self.max_rounds == Some(0) {
            return Err(GraphContextError::config("max_rounds must be at least 1"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.graphctx/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| GraphContextError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.graphctx/graphctx.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| GraphContextError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        GraphContextError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| GraphContextError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| GraphContextError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| GraphContextError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("match_threshold"));
        assert!(toml_str.contains("en_rules"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.retrieval.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(parsed.retrieval.max_rounds, 50);
        assert_eq!(parsed.nlp.model, "en_rules");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[retrieval]
page_size = 25
default_mode = "restricted"

[store]
db_path = "/tmp/graph.db"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.retrieval.page_size, 25);
        assert_eq!(config.retrieval.default_mode, ContextMode::Restricted);
        assert_eq!(config.retrieval.match_threshold, DEFAULT_MATCH_THRESHOLD);
        assert_eq!(
            config.store.resolved_db_path().unwrap(),
            PathBuf::from("/tmp/graph.db")
        );
    }

    #[test]
    fn retrieval_config_from_app_config() {
        let app = AppConfig::default();
        let retrieval = RetrievalConfig::from(&app);
        assert_eq!(retrieval.search_depth, 2);
        assert_eq!(retrieval.cache_capacity, 128);
        assert_eq!(retrieval.max_rounds, Some(50));
        assert!(retrieval.validate().is_ok());
    }

    #[test]
    fn zero_max_rounds_means_unbounded() {
        let mut app = AppConfig::default();
        app.retrieval.max_rounds = 0;
        assert_eq!(RetrievalConfig::from(&app).max_rounds, None);
    }

    #[test]
    fn library_defaults_are_unbounded() {
        let config = RetrievalConfig::default();
        assert_eq!(config.max_rounds, None);
        assert_eq!(config.search_timeout_ms, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_rejects_bad_settings() {
        let too_deep = RetrievalConfig {
            search_depth: 3,
            ..RetrievalConfig::default()
        };
        assert!(too_deep.validate().unwrap_err().to_string().contains("search_depth"));

        let loose_filter = RetrievalConfig {
            filter_threshold: 0.2,
            ..RetrievalConfig::default()
        };
        assert!(loose_filter.validate().is_err());

        let empty_page = RetrievalConfig {
            page_size: 0,
            ..RetrievalConfig::default()
        };
        assert!(empty_page.validate().is_err());

        let out_of_range = RetrievalConfig {
            match_threshold: 1.5,
            ..RetrievalConfig::default()
        };
        assert!(out_of_range.validate().is_err());
    }

    #[test]
    fn invalid_mode_in_file_fails_to_parse() {
        let toml_str = r#"
[retrieval]
default_mode = "fuzzy"
"#;
        assert!(toml::from_str::<AppConfig>(toml_str).is_err());
    }
}
