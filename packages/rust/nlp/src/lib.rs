//! NLP capability used by keyword extraction.
//!
//! The retrieval engine only needs two things from an NLP model: a tokenizer
//! that tags parts of speech, and the stop-word set of the active language.
//! [`NlpEngine`] is that seam. [`RuleBasedTagger`] is the built-in English
//! engine: deterministic, dependency-free, and good enough to separate common
//! nouns from everything else.

mod stop_words;
mod tagger;

use std::sync::Arc;

use graphctx_shared::{GraphContextError, Result};

pub use stop_words::{ENGLISH_STOP_WORDS, is_english_stop_word};
pub use tagger::RuleBasedTagger;

/// Name of the built-in English engine.
pub const RULE_BASED_ENGLISH: &str = "en_rules";

/// Coarse part-of-speech tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartOfSpeech {
    /// Common noun.
    Noun,
    ProperNoun,
    Verb,
    Adjective,
    Adverb,
    Number,
    Punctuation,
    /// Determiners, pronouns, prepositions, conjunctions, auxiliaries.
    Function,
    Other,
}

/// A tagged token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Surface text as it appeared in the input.
    pub text: String,
    /// Every character is alphabetic.
    pub is_alphabetic: bool,
    pub lowercase: String,
    pub pos: PartOfSpeech,
}

impl Token {
    pub fn is_common_noun(&self) -> bool {
        self.pos == PartOfSpeech::Noun
    }
}

/// Tokenizer + tagger + stop-word list for one language model.
pub trait NlpEngine: Send + Sync {
    /// Model name, as selected in config.
    fn name(&self) -> &str;

    /// Split `text` into tokens and tag each one.
    fn tokenize_and_tag(&self, text: &str) -> Vec<Token>;

    /// Case-insensitive stop-word check.
    fn is_stop_word(&self, word: &str) -> bool;
}

/// Resolve an engine by model name.
///
/// An unknown model is a configuration error: callers do this once at startup.
pub fn load_engine(model: &str) -> Result<Arc<dyn NlpEngine>> {
    match model {
        RULE_BASED_ENGLISH => {
            tracing::debug!(model, "loaded NLP engine");
            Ok(Arc::new(RuleBasedTagger::new()))
        }
        other => Err(GraphContextError::config(format!(
            "unsupported NLP model '{other}' (available: {RULE_BASED_ENGLISH})"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_builtin_engine() {
        let engine = load_engine("en_rules").expect("load engine");
        assert_eq!(engine.name(), RULE_BASED_ENGLISH);
    }

    #[test]
    fn unknown_model_is_config_error() {
        let err = load_engine("en_core_web_sm").err().expect("should fail");
        assert!(matches!(err, GraphContextError::Config { .. }));
        assert!(err.to_string().contains("en_core_web_sm"));
    }
}
