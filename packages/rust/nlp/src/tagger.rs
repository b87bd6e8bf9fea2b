//! Rule-based English tokenizer and part-of-speech tagger.
//!
//! Tags come from, in order: closed-class lexicon, capitalisation, open-class
//! lexicons, suffix rules, and finally a noun default. Nouns are the largest
//! open class in English, so unknown words fall through to them.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::stop_words::is_english_stop_word;
use crate::{NlpEngine, PartOfSpeech, RULE_BASED_ENGLISH, Token};

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\p{L}\p{M}]+(?:'[\p{L}]+)?|\p{N}+(?:[.,]\p{N}+)*|[^\s\p{L}\p{M}\p{N}]")
        .expect("valid regex")
});

const FUNCTION_WORDS: &[&str] = &[
    "a", "an", "the", "this", "that", "these", "those", "i", "you", "he", "she", "it", "we",
    "they", "me", "him", "her", "us", "them", "my", "your", "his", "its", "our", "their",
    "in", "on", "at", "by", "for", "with", "about", "from", "to", "of", "into", "over",
    "under", "and", "or", "but", "nor", "so", "if", "because", "is", "are", "was", "were",
    "be", "been", "being", "am", "do", "does", "did", "have", "has", "had", "will",
    "would", "shall", "should", "can", "could", "may", "might", "must",
];

const VERBS: &[&str] = &[
    "like", "want", "need", "know", "think", "come", "look", "find", "tell", "ask", "feel",
    "leave", "mean", "let", "begin", "help", "talk", "turn", "start", "hear", "play", "run",
    "live", "believe", "hold", "bring", "happen", "write", "provide", "sit", "stand",
    "lose", "pay", "meet", "include", "continue", "learn", "lead", "understand", "follow",
    "create", "speak", "read", "allow", "add", "spend", "grow", "open", "walk", "win",
    "offer", "remember", "love", "consider", "appear", "buy", "wait", "serve", "die",
    "send", "expect", "build", "stay", "fall", "reach", "kill", "remain", "suggest",
    "raise", "sell", "require", "decide", "pull", "eat", "cook", "bake", "drink", "sleep",
    "try", "seems", "looks", "likes", "wants", "needs", "knows", "thinks", "comes",
    "goes", "went", "gone", "took", "taken", "gave", "given", "got", "made", "said",
    "saw", "seen", "knew", "known", "thought", "came", "told", "felt", "left", "brought",
    "wrote", "written", "sat", "stood", "lost", "paid", "met", "led", "spoke", "ate",
    "grew", "won", "bought", "built", "fell", "sold", "ran",
];

const ADJECTIVES: &[&str] = &[
    "good", "new", "old", "great", "little", "long", "big", "high", "small", "large",
    "young", "important", "bad", "able", "early", "late", "right", "wrong", "real", "best",
    "better", "sure", "free", "true", "whole", "clear", "hot", "cold", "warm", "cool",
    "sunny", "rainy", "cloudy", "windy", "happy", "sad", "easy", "hard", "strong", "short",
    "low", "red", "blue", "green", "black", "white", "nice", "fine", "fresh", "quick",
    "slow", "rich", "poor", "full", "dark", "light", "heavy", "open", "public", "private",
    "local", "recent", "current", "tasty", "delicious",
];

// Words the suffix rules would mistag.
const NOUN_EXCEPTIONS: &[&str] = &[
    "thing", "morning", "evening", "building", "spring", "string", "meeting", "wedding",
    "ceiling", "clothing", "painting", "family", "italy", "reply", "supply", "assembly",
    "speed", "creed", "breed", "vegetable", "timetable",
];

static FUNCTION_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| FUNCTION_WORDS.iter().copied().collect());
static VERB_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| VERBS.iter().copied().collect());
static ADJECTIVE_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| ADJECTIVES.iter().copied().collect());
static NOUN_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| NOUN_EXCEPTIONS.iter().copied().collect());

/// Built-in deterministic English engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedTagger;

impl RuleBasedTagger {
    pub fn new() -> Self {
        Self
    }

    fn tag(&self, text: &str, lowercase: &str, position: usize) -> PartOfSpeech {
        let Some(first) = text.chars().next() else {
            return PartOfSpeech::Other;
        };

        if !text.chars().all(char::is_alphabetic) {
            if text.chars().all(|c| c.is_numeric() || c == '.' || c == ',') {
                return PartOfSpeech::Number;
            }
            if text.chars().all(|c| c.is_ascii_punctuation()) {
                return PartOfSpeech::Punctuation;
            }
            return PartOfSpeech::Other;
        }

        if FUNCTION_SET.contains(lowercase) {
            return PartOfSpeech::Function;
        }

        // Sentence-initial capitals carry no information.
        if first.is_uppercase() && position > 0 {
            return PartOfSpeech::ProperNoun;
        }
        if text.chars().count() > 1 && text.chars().all(char::is_uppercase) {
            return PartOfSpeech::ProperNoun;
        }

        if NOUN_SET.contains(lowercase) {
            return PartOfSpeech::Noun;
        }
        if VERB_SET.contains(lowercase) {
            return PartOfSpeech::Verb;
        }
        if ADJECTIVE_SET.contains(lowercase) {
            return PartOfSpeech::Adjective;
        }

        suffix_tag(lowercase)
    }
}

fn suffix_tag(word: &str) -> PartOfSpeech {
    let len = word.chars().count();
    if len > 4 && word.ends_with("ly") {
        return PartOfSpeech::Adverb;
    }
    if len > 4 && (word.ends_with("ing") || word.ends_with("ed")) {
        return PartOfSpeech::Verb;
    }
    const ADJ_SUFFIXES: &[&str] = &["ous", "ful", "ive", "able", "ible", "less", "ical", "ish"];
    if len > 5 && ADJ_SUFFIXES.iter().any(|s| word.ends_with(s)) {
        return PartOfSpeech::Adjective;
    }
    PartOfSpeech::Noun
}

impl NlpEngine for RuleBasedTagger {
    fn name(&self) -> &str {
        RULE_BASED_ENGLISH
    }

    fn tokenize_and_tag(&self, text: &str) -> Vec<Token> {
        TOKEN_RE
            .find_iter(text)
            .enumerate()
            .map(|(position, m)| {
                let surface = m.as_str();
                let lowercase = surface.to_lowercase();
                let pos = self.tag(surface, &lowercase, position);
                Token {
                    text: surface.to_string(),
                    is_alphabetic: surface.chars().all(char::is_alphabetic),
                    lowercase,
                    pos,
                }
            })
            .collect()
    }

    fn is_stop_word(&self, word: &str) -> bool {
        is_english_stop_word(word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(text: &str) -> Vec<(String, PartOfSpeech)> {
        RuleBasedTagger::new()
            .tokenize_and_tag(text)
            .into_iter()
            .map(|t| (t.text, t.pos))
            .collect()
    }

    #[test]
    fn splits_words_numbers_and_punctuation() {
        let tokens = RuleBasedTagger::new().tokenize_and_tag("Rain at 3.5 mm, today!");
        let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["Rain", "at", "3.5", "mm", ",", "today", "!"]);
        assert!(tokens[0].is_alphabetic);
        assert!(!tokens[2].is_alphabetic);
        assert_eq!(tokens[2].pos, PartOfSpeech::Number);
        assert_eq!(tokens[4].pos, PartOfSpeech::Punctuation);
        assert_eq!(tokens[0].lowercase, "rain");
    }

    #[test]
    fn capitalised_mid_sentence_is_proper_noun() {
        let tagged = tags("weather like New York City week");
        assert_eq!(tagged[0].1, PartOfSpeech::Noun);
        assert_eq!(tagged[1].1, PartOfSpeech::Verb);
        assert_eq!(tagged[2].1, PartOfSpeech::ProperNoun);
        assert_eq!(tagged[3].1, PartOfSpeech::ProperNoun);
        assert_eq!(tagged[4].1, PartOfSpeech::ProperNoun);
        assert_eq!(tagged[5].1, PartOfSpeech::Noun);
    }

    #[test]
    fn sentence_initial_capital_uses_lexicon() {
        let tagged = tags("Weather forecast");
        assert_eq!(tagged[0].1, PartOfSpeech::Noun);
        assert_eq!(tagged[1].1, PartOfSpeech::Noun);

        let tagged = tags("Quickly cooked");
        assert_eq!(tagged[0].1, PartOfSpeech::Adverb);
        assert_eq!(tagged[1].1, PartOfSpeech::Verb);
    }

    #[test]
    fn suffix_rules_and_exceptions() {
        assert_eq!(suffix_tag("cooking"), PartOfSpeech::Verb);
        assert_eq!(suffix_tag("dangerous"), PartOfSpeech::Adjective);
        assert_eq!(suffix_tag("garlic"), PartOfSpeech::Noun);
        let tagged = tags("morning meeting");
        assert!(tagged.iter().all(|(_, pos)| *pos == PartOfSpeech::Noun));
    }

    #[test]
    fn every_noun_exception_overrides_a_suffix_rule() {
        for word in NOUN_EXCEPTIONS {
            assert_ne!(suffix_tag(word), PartOfSpeech::Noun, "{word} needs no exception");
        }
    }

    #[test]
    fn tagging_is_deterministic() {
        let text = "What is the weather like in New York City next week?";
        assert_eq!(tags(text), tags(text));
    }
}
