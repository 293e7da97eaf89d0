use std::collections::BTreeSet;

use log::debug;
use rand::{rngs::StdRng, SeedableRng};

use crate::chooser::SeededChooser;
use crate::documents::{create_document, TestDocument};
use encrypted_index::{
    base::{DocId, InvertedIndex},
    builder::RawDocument,
    normalizer::DefaultNormalizer,
    EncryptedIndex, IndexOptions,
};

pub struct TestIndex {
    pub documents: Vec<TestDocument>,
    /// Posting lists computed directly from the generated words
    pub inverted_index: InvertedIndex,
    pub index: EncryptedIndex,
}

impl TestIndex {
    pub fn new(
        vocabulary_size: usize,
        document_count: usize,
        lambda_words: f64,
        max_words: usize,
        seed: Option<u64>,
        options: IndexOptions,
    ) -> Self {
        let mut rng = if let Some(seed) = seed {
            StdRng::seed_from_u64(seed)
        } else {
            StdRng::from_entropy()
        };

        let mut documents = Vec::new();
        let mut inverted_index = InvertedIndex::new();
        for _ in 0..document_count {
            let document = create_document(lambda_words, max_words, vocabulary_size, &mut rng);
            for word in document.words.iter() {
                inverted_index
                    .entry(word.clone())
                    .or_default()
                    .insert(document.id.clone());
            }
            documents.push(document);
        }

        let raw: Vec<RawDocument> = documents.iter().map(|d| d.raw()).collect();
        let mut chooser = SeededChooser::new(seed.unwrap_or(0));
        let index =
            EncryptedIndex::build_with_chooser(&raw, &DefaultNormalizer, options, &mut chooser)
                .expect("Error while building the index");

        debug!(
            "Test index: {} documents, {} keywords",
            documents.len(),
            inverted_index.len()
        );

        Self {
            documents,
            inverted_index,
            index,
        }
    }

    pub fn raw_documents(&self) -> Vec<RawDocument> {
        self.documents.iter().map(|d| d.raw()).collect()
    }
}

/// Checks that every posting list of the index resolves (locally) to the
/// expected one
pub fn check_local_index(index: &EncryptedIndex, expected: &InvertedIndex) {
    for (keyword, doc_ids) in expected {
        let observed = index
            .lookup_local(keyword)
            .expect("Error while resolving a location");
        assert_eq!(&observed, doc_ids, "Posting lists differ for {}", keyword);
    }
}

/// Documents containing every word
pub fn expected_conjunction(expected: &InvertedIndex, words: &[&str]) -> BTreeSet<DocId> {
    let mut result: Option<BTreeSet<DocId>> = None;
    for word in words {
        let doc_ids = expected.get(*word).cloned().unwrap_or_default();
        result = Some(match result {
            None => doc_ids,
            Some(previous) => previous.intersection(&doc_ids).cloned().collect(),
        });
    }
    result.unwrap_or_default()
}
