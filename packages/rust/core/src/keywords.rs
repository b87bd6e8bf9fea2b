//! Free text to keyword set.

use std::sync::Arc;

use graphctx_nlp::{NlpEngine, Token};
use graphctx_shared::KeywordSet;
use tracing::debug;

use crate::cache::RetrievalCache;

/// Reduces text to its common nouns using an injected [`NlpEngine`].
#[derive(Clone)]
pub struct KeywordExtractor {
    engine: Arc<dyn NlpEngine>,
}

impl KeywordExtractor {
    pub fn new(engine: Arc<dyn NlpEngine>) -> Self {
        Self { engine }
    }

    /// Common nouns of `text` as written, in original order.
    ///
    /// Non-alphabetic tokens and stop words are dropped first; if nothing
    /// survives the result is `None`. The survivors are re-joined with single
    /// spaces and tagged again, so the tagger sees the minimized sentence.
    /// The result may be empty when words survive but none is a noun.
    pub fn extract(&self, text: &str) -> Option<KeywordSet> {
        let minimized: Vec<String> = self
            .engine
            .tokenize_and_tag(text)
            .into_iter()
            .filter(|token| token.is_alphabetic && !self.engine.is_stop_word(&token.text))
            .map(|token| token.text)
            .collect();

        if minimized.is_empty() {
            return None;
        }

        let keywords = self
            .engine
            .tokenize_and_tag(&minimized.join(" "))
            .into_iter()
            .filter(Token::is_common_noun)
            .map(|token| token.text)
            .collect();
        Some(keywords)
    }

    /// [`extract`](Self::extract) through the text cache.
    pub fn extract_cached(&self, cache: &RetrievalCache, text: &str) -> Option<KeywordSet> {
        if let Some(cached) = cache.keywords(text) {
            debug!(chars = text.len(), "keyword cache hit");
            return cached;
        }
        let keywords = self.extract(text);
        cache.put_keywords(text, keywords.clone());
        keywords
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }
}
