//! Two-phase search over uploaded indices
//!
//! [EncryptedSearch::lookup] gives the blobs a query needs, which the caller
//! fetches; [EncryptedSearch::locate] then extracts the matching document IDs
//! from the fetched blobs. Query tokens are combined conjunctively.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::base::{ensure_remote, BlobReference, DocId, Keyword, LookupTable};
use crate::blob::BlobContent;
use crate::error::{Error, Result};
use crate::location::Location;
use crate::normalizer::{DefaultNormalizer, Normalizer};

/// Token => blob reference => locations
type QueryLocations = BTreeMap<Keyword, BTreeMap<BlobReference, Vec<Location>>>;

pub struct EncryptedSearch {
    lookup_tables: Vec<LookupTable>,
    normalizer: Box<dyn Normalizer>,

    /// Locations of the current query
    query: Option<QueryLocations>,
}

impl EncryptedSearch {
    /// A search scope over lookup tables with remote locations
    pub fn new(lookup_tables: Vec<LookupTable>) -> Result<Self> {
        Self::with_normalizer(lookup_tables, Box::new(DefaultNormalizer))
    }

    pub fn with_normalizer(
        lookup_tables: Vec<LookupTable>,
        normalizer: Box<dyn Normalizer>,
    ) -> Result<Self> {
        ensure_remote(&lookup_tables)?;
        Ok(Self {
            lookup_tables,
            normalizer,
            query: None,
        })
    }

    /// Starts a new query, returning the references of the blobs to fetch
    pub fn lookup(&mut self, query: &str) -> BTreeSet<BlobReference> {
        let mut locations = QueryLocations::new();
        let mut references = BTreeSet::new();

        for token in self.normalizer.normalize_surface(query) {
            let by_reference = locations.entry(token.clone()).or_default();
            for lookup_table in &self.lookup_tables {
                for location in lookup_table.get(&token).into_iter().flatten() {
                    if let Some(reference) = location.blob_reference() {
                        references.insert(reference.to_string());
                        by_reference
                            .entry(reference.to_string())
                            .or_default()
                            .push(location.clone());
                    }
                }
            }
        }

        debug!(
            "Query with {} tokens needs {} blobs",
            locations.len(),
            references.len()
        );
        self.query = Some(locations);
        references
    }

    /// Document IDs containing every token of the current query
    ///
    /// A token found in no lookup table makes the result empty.
    pub fn locate(&self, fetched: &BTreeMap<BlobReference, BlobContent>) -> Result<BTreeSet<DocId>> {
        let query = self.query.as_ref().ok_or(Error::NoActiveQuery)?;

        let mut result: Option<BTreeSet<DocId>> = None;
        for by_reference in query.values() {
            let mut doc_ids = BTreeSet::new();
            for (reference, locations) in by_reference {
                let content = fetched
                    .get(reference)
                    .ok_or_else(|| Error::MissingBlob(reference.clone()))?;
                for location in locations {
                    doc_ids.extend(content.chunk(location)?.iter().cloned());
                }
            }

            result = Some(match result {
                None => doc_ids,
                Some(previous) => previous.intersection(&doc_ids).cloned().collect(),
            });
        }

        Ok(result.unwrap_or_default())
    }
}
