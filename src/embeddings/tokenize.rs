//! Word tokenizer shared by the offline encoders.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

// Stop words add noise and don't help with lexical matching
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "do",
    "does", "did", "will", "would", "should", "could", "what", "which", "who", "where", "when",
    "why", "how", "this", "that", "these", "those",
];

fn word_regex() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"[\p{L}\p{N}]+").expect("static regex is valid"))
}

fn stop_words() -> &'static HashSet<&'static str> {
    static STOP: OnceLock<HashSet<&'static str>> = OnceLock::new();
    STOP.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

/// Lowercased word tokens in text order, stop words removed.
pub fn tokenize(text: &str) -> Vec<String> {
    let stop = stop_words();
    word_regex()
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|t| !stop.contains(t.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_lowercases_and_drops_stop_words() {
        assert_eq!(
            tokenize("Does Vitamin D reduce infection?"),
            vec!["vitamin", "d", "reduce", "infection"]
        );
    }

    #[test]
    fn test_tokenize_punctuation_and_numbers() {
        assert_eq!(tokenize("COVID-19, (2020)"), vec!["covid", "19", "2020"]);
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("the of and").is_empty());
    }
}
