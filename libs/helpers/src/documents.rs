use rand::{distributions::Alphanumeric, Rng, RngCore};
use rand_distr::{Distribution, Poisson};
use std::cmp::min;

use encrypted_index::{base::DocId, builder::RawDocument};

pub struct TestDocument {
    pub id: DocId,
    pub words: Vec<String>,
}

impl TestDocument {
    pub fn raw(&self) -> RawDocument {
        RawDocument::new(self.id.clone(), self.words.join(" "))
    }
}

/// A word of the test vocabulary; never a stopword
pub fn vocabulary_word(ix: usize) -> String {
    format!("w{}", ix)
}

/// An identifier shaped like a room event ID (44 characters)
pub fn event_id(rng: &mut dyn RngCore) -> DocId {
    let suffix: String = (0..43).map(|_| char::from(rng.sample(Alphanumeric))).collect();
    format!("${}", suffix)
}

pub fn create_document(
    lambda_words: f64,
    max_words: usize,
    vocabulary_size: usize,
    rng: &mut dyn RngCore,
) -> TestDocument {
    let poi = Poisson::new(lambda_words).unwrap();
    let num_words = 1 + poi.sample(rng) as usize;

    let word_ids =
        rand::seq::index::sample(rng, vocabulary_size, min(num_words, max_words)).into_vec();

    TestDocument {
        id: event_id(rng),
        words: word_ids.into_iter().map(vocabulary_word).collect(),
    }
}
