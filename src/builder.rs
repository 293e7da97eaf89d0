//! First phase: from raw documents to an inverted index

use std::collections::BTreeSet;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::base::{Corpus, DocId, InvertedIndex, Keyword};
use crate::normalizer::Normalizer;

/// A document as received from the source; only documents carrying text are
/// indexed
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RawDocument {
    pub id: DocId,
    #[serde(default)]
    pub text: Option<String>,
}

impl RawDocument {
    pub fn new(id: impl Into<DocId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: Some(text.into()),
        }
    }
}

/// Normalizes the documents, returning the corpus and the set of all its
/// keywords
pub fn parse<'a, I>(documents: I, normalizer: &dyn Normalizer) -> (Corpus, BTreeSet<Keyword>)
where
    I: IntoIterator<Item = &'a RawDocument>,
{
    let mut corpus = Corpus::new();
    let mut keywords = BTreeSet::new();

    for document in documents {
        if let Some(text) = &document.text {
            let tokens = normalizer.normalize(text);
            keywords.extend(tokens.iter().cloned());
            corpus.insert(document.id.clone(), tokens);
        }
    }

    debug!(
        "Parsed {} documents ({} keywords)",
        corpus.len(),
        keywords.len()
    );
    (corpus, keywords)
}

/// Builds the inverted index of a corpus
///
/// Every keyword gets an entry, even if no document contains it.
pub fn invert(corpus: &Corpus, keywords: &BTreeSet<Keyword>) -> InvertedIndex {
    let mut inverted_index: InvertedIndex = keywords
        .iter()
        .map(|keyword| (keyword.clone(), BTreeSet::new()))
        .collect();

    for (doc_id, tokens) in corpus {
        for token in tokens {
            inverted_index
                .entry(token.clone())
                .or_default()
                .insert(doc_id.clone());
        }
    }

    inverted_index
}
