//! Text normalization into keyword sets

use std::collections::BTreeSet;

use crate::base::Keyword;

/// Turns text into a set of normalized tokens
pub trait Normalizer {
    /// Tokens used when indexing documents (with sub-tokens)
    fn normalize(&self, text: &str) -> BTreeSet<Keyword>;

    /// Tokens used for queries (no sub-token expansion)
    fn normalize_surface(&self, text: &str) -> BTreeSet<Keyword>;
}

const PUNCTUATION: &str = "<>()[]{}'\"_.,;:!?$%&-*~^/\\";

/// English stopwords
pub const STOPWORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "that'll",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "don't", "should", "should've", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn",
    "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn",
    "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan",
    "shan't", "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't",
    "wouldn", "wouldn't",
];

/// Lowercases, strips punctuation around whitespace-separated tokens and
/// removes English stopwords
#[derive(Clone, Copy, Default)]
pub struct DefaultNormalizer;

impl DefaultNormalizer {
    fn tokens(&self, text: &str, with_sub_tokens: bool) -> BTreeSet<Keyword> {
        let lowercase = text.to_lowercase();
        let mut tokens = BTreeSet::new();

        for token in lowercase.split_whitespace() {
            let stripped = token.trim_matches(|c: char| PUNCTUATION.contains(c));
            tokens.insert(stripped.to_string());

            if with_sub_tokens {
                // Maximal runs of word characters
                tokens.extend(
                    stripped
                        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
                        .filter(|s| !s.is_empty())
                        .map(str::to_string),
                );
            }
        }

        tokens.retain(|t| !t.is_empty() && !STOPWORDS.contains(&t.as_str()));
        tokens
    }
}

impl Normalizer for DefaultNormalizer {
    fn normalize(&self, text: &str) -> BTreeSet<Keyword> {
        self.tokens(text, true)
    }

    fn normalize_surface(&self, text: &str) -> BTreeSet<Keyword> {
        self.tokens(text, false)
    }
}
