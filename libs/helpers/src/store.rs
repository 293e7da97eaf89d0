use std::cell::Cell;
use std::collections::HashMap;

use thiserror::Error;

use encrypted_index::{
    base::{BlobReference, DocId, InvertedIndex, LookupTable},
    BlobContent, BlobStore,
};

#[derive(Debug, Error)]
pub enum MockStoreError {
    #[error("Blob {0} does not exist")]
    NotFound(String),

    #[error("Blob of {size} bytes exceeds the limit of {limit} bytes")]
    TooLarge { size: usize, limit: usize },
}

/// In-memory blob store, with an optional size limit
#[derive(Default)]
pub struct MockStore {
    blobs: HashMap<BlobReference, Vec<u8>>,
    counter: usize,
    limit: Option<usize>,
    fetches: Cell<usize>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects blobs of `limit` bytes or more
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Number of fetch calls so far
    pub fn fetches(&self) -> usize {
        self.fetches.get()
    }

    pub fn content(&self, reference: &str) -> BlobContent {
        BlobContent::from_bytes(&self.blobs[reference]).expect("Stored blob is malformed")
    }
}

impl BlobStore for MockStore {
    type Error = MockStoreError;

    fn upload(&mut self, data: Vec<u8>) -> Result<BlobReference, Self::Error> {
        if let Some(limit) = self.limit {
            if data.len() >= limit {
                return Err(MockStoreError::TooLarge {
                    size: data.len(),
                    limit,
                });
            }
        }

        let reference = format!("mock://blobs/{}", self.counter);
        self.counter += 1;
        self.blobs.insert(reference.clone(), data);
        Ok(reference)
    }

    fn fetch(&self, reference: &str) -> Result<Vec<u8>, Self::Error> {
        self.fetches.set(self.fetches.get() + 1);
        self.blobs
            .get(reference)
            .cloned()
            .ok_or_else(|| MockStoreError::NotFound(reference.to_string()))
    }
}

/// Resolves every remote location of a lookup table against the store
pub fn resolve_remote(lookup_table: &LookupTable, store: &MockStore) -> InvertedIndex {
    lookup_table
        .iter()
        .map(|(keyword, locations)| {
            let mut doc_ids = std::collections::BTreeSet::<DocId>::new();
            for location in locations {
                let reference = location
                    .blob_reference()
                    .expect("Location should be remote");
                let content = store.content(reference);
                doc_ids.extend(
                    content
                        .chunk(location)
                        .expect("Location does not match its blob")
                        .iter()
                        .cloned(),
                );
            }
            (keyword.clone(), doc_ids)
        })
        .collect()
}
