//! Blob stores and the drivers pumping the protocols against them
//!
//! The engines never perform I/O. The drivers below are the simplest
//! callers: they upload or fetch blobs one at a time, in the calling thread.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::base::{BlobReference, DocId, LookupTable};
use crate::blob::BlobContent;
use crate::error::{Error, Result};
use crate::merge::IndexMerge;
use crate::search::EncryptedSearch;
use crate::storage::IndexStorage;

/// A size-limited, untrusted store of opaque blobs
pub trait BlobStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Stores a blob, returning its reference
    fn upload(&mut self, data: Vec<u8>) -> std::result::Result<BlobReference, Self::Error>;

    fn fetch(&self, reference: &str) -> std::result::Result<Vec<u8>, Self::Error>;
}

fn store_error<E: std::error::Error + Send + Sync + 'static>(e: E) -> Error {
    Error::Store(Box::new(e))
}

fn fetch_content<S: BlobStore>(store: &S, reference: &str) -> Result<BlobContent> {
    let data = store.fetch(reference).map_err(store_error)?;
    BlobContent::from_bytes(&data)
}

impl IndexStorage {
    /// Uploads every blob and rewrites the lookup table
    pub fn upload_all<S: BlobStore>(&mut self, store: &mut S) -> Result<&LookupTable> {
        while let Some((data, ticket)) = self.next_blob()? {
            let reference = store.upload(data).map_err(store_error)?;
            self.complete(ticket, reference)?;
        }
        self.update_lookup_table()
    }
}

impl IndexMerge {
    /// Fetches the blobs of every keyword
    ///
    /// Blobs shared by several keywords are fetched once.
    pub fn fetch_all<S: BlobStore>(&mut self, store: &S) -> Result<()> {
        let mut cache: BTreeMap<BlobReference, BlobContent> = BTreeMap::new();

        while let Some((references, ticket)) = self.next_keyword() {
            for reference in references {
                if !cache.contains_key(&reference) {
                    let content = fetch_content(store, &reference)?;
                    cache.insert(reference.clone(), content);
                }
                self.complete(&ticket, &reference, &cache[&reference])?;
            }
        }

        debug!("Fetched {} blobs for the merge", cache.len());
        Ok(())
    }
}

impl EncryptedSearch {
    /// Runs a whole query: lookup, fetch and locate
    pub fn search<S: BlobStore>(&mut self, store: &S, query: &str) -> Result<BTreeSet<DocId>> {
        let references = self.lookup(query);

        let mut fetched = BTreeMap::new();
        for reference in references {
            let content = fetch_content(store, &reference)?;
            fetched.insert(reference, content);
        }

        self.locate(&fetched)
    }
}
