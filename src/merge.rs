//! Merges several uploaded indices into a fresh one
//!
//! The posting lists of each keyword are rebuilt from the blobs the lookup
//! tables point to, then the combined inverted index is distributed anew so
//! that the merged index hides posting list volumes like any other.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use log::{debug, info};

use crate::base::{ensure_remote, BlobReference, InvertedIndex, Keyword, LookupTable};
use crate::blob::BlobContent;
use crate::error::{Error, Result};
use crate::index::{EncryptedIndex, IndexOptions};
use crate::location::Location;
use crate::utils::random::{OsChooser, SecureChooser};

/// Handed out with the blob references of a keyword, and given back with
/// each fetched blob
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchTicket {
    keyword: Keyword,
}

/// A keyword whose blobs are being fetched
struct PendingKeyword {
    waiting: BTreeMap<BlobReference, Vec<Location>>,
    delivered: BTreeSet<BlobReference>,
}

pub struct IndexMerge {
    options: IndexOptions,
    lookup_tables: Vec<LookupTable>,
    keywords: BTreeSet<Keyword>,

    /// Keywords not handed out yet
    remaining: VecDeque<Keyword>,

    pending: BTreeMap<Keyword, PendingKeyword>,
    inverted_index: InvertedIndex,
}

impl IndexMerge {
    /// Prepares the merge of lookup tables whose locations are all remote;
    /// the merged index is built with `options`
    pub fn new(lookup_tables: Vec<LookupTable>, options: IndexOptions) -> Result<Self> {
        ensure_remote(&lookup_tables)?;

        let keywords: BTreeSet<Keyword> = lookup_tables
            .iter()
            .flat_map(|lookup_table| lookup_table.keys().cloned())
            .collect();

        debug!(
            "Merging {} lookup tables ({} keywords)",
            lookup_tables.len(),
            keywords.len()
        );

        Ok(Self {
            options,
            remaining: keywords.iter().cloned().collect(),
            keywords,
            lookup_tables,
            pending: BTreeMap::new(),
            inverted_index: InvertedIndex::new(),
        })
    }

    /// Union of the keywords of all the lookup tables
    pub fn keywords(&self) -> &BTreeSet<Keyword> {
        &self.keywords
    }

    /// The posting lists rebuilt so far
    pub fn inverted_index(&self) -> &InvertedIndex {
        &self.inverted_index
    }

    /// Number of keywords still waiting to be handed out or completed
    pub fn remaining(&self) -> usize {
        self.remaining.len() + self.pending.len()
    }

    /// Gives the blobs to fetch for the next keyword, or `None` when every
    /// keyword was handed out
    ///
    /// A keyword without any location is complete as soon as it is handed
    /// out.
    pub fn next_keyword(&mut self) -> Option<(BTreeSet<BlobReference>, FetchTicket)> {
        let keyword = self.remaining.pop_front()?;

        let mut waiting: BTreeMap<BlobReference, Vec<Location>> = BTreeMap::new();
        for lookup_table in &self.lookup_tables {
            for location in lookup_table.get(&keyword).into_iter().flatten() {
                if let Some(reference) = location.blob_reference() {
                    waiting
                        .entry(reference.to_string())
                        .or_default()
                        .push(location.clone());
                }
            }
        }

        let references: BTreeSet<BlobReference> = waiting.keys().cloned().collect();
        self.inverted_index.entry(keyword.clone()).or_default();
        if !waiting.is_empty() {
            self.pending.insert(
                keyword.clone(),
                PendingKeyword {
                    waiting,
                    delivered: BTreeSet::new(),
                },
            );
        }

        Some((references, FetchTicket { keyword }))
    }

    /// Adds the document IDs found in a fetched blob to the posting list of
    /// the ticket's keyword
    pub fn complete(
        &mut self,
        ticket: &FetchTicket,
        reference: &str,
        content: &BlobContent,
    ) -> Result<()> {
        if !self.pending.contains_key(&ticket.keyword) {
            return Err(if self.inverted_index.contains_key(&ticket.keyword) {
                Error::AlreadyCompleted(reference.to_string())
            } else {
                Error::UnknownTicket
            });
        }
        let pending = self
            .pending
            .get_mut(&ticket.keyword)
            .ok_or(Error::UnknownTicket)?;

        if pending.delivered.contains(reference) {
            return Err(Error::AlreadyCompleted(reference.to_string()));
        }
        let locations = pending
            .waiting
            .get(reference)
            .ok_or_else(|| Error::UnexpectedReference(reference.to_string()))?;

        let mut doc_ids = Vec::new();
        for location in locations {
            doc_ids.extend(content.chunk(location)?.iter().cloned());
        }

        pending.waiting.remove(reference);
        pending.delivered.insert(reference.to_string());
        let done = pending.waiting.is_empty();

        self.inverted_index
            .entry(ticket.keyword.clone())
            .or_default()
            .extend(doc_ids);
        if done {
            self.pending.remove(&ticket.keyword);
        }
        Ok(())
    }

    /// Builds the merged index once every keyword is complete
    pub fn finish(self) -> Result<EncryptedIndex> {
        self.finish_with_chooser(&mut OsChooser::new())
    }

    pub fn finish_with_chooser(self, chooser: &mut dyn SecureChooser) -> Result<EncryptedIndex> {
        let remaining = self.remaining();
        if remaining > 0 {
            return Err(Error::IncompleteFetch(remaining));
        }

        let mut index = EncryptedIndex::new(self.options);
        index.calc_params(&self.inverted_index);
        index.distribute(&self.inverted_index, chooser)?;

        info!(
            "Merged {} lookup tables: {} keywords, {} postings",
            self.lookup_tables.len(),
            index.keywords().len(),
            index.size()
        );
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn lookup_table(entries: &[(&str, Vec<Location>)]) -> LookupTable {
        entries
            .iter()
            .map(|(k, locations)| (k.to_string(), locations.clone()))
            .collect()
    }

    #[test]
    fn test_rejects_local_locations() {
        let table = lookup_table(&[("a", vec![Location::local(0, 0, 0, 1)])]);
        let r = IndexMerge::new(vec![table], IndexOptions::default());
        assert!(matches!(r, Err(Error::RemoteLocationExpected)));
    }

    #[test]
    fn test_protocol() {
        let level = BlobContent::Level(vec![ids(&["x", "y"]), ids(&["z"])]);
        let bucket = BlobContent::Bucket(ids(&["u", "v", "w"]));

        let t1 = lookup_table(&[
            ("a", vec![Location::remote("L", Some(0), 0, 2)]),
            ("b", vec![]),
        ]);
        let t2 = lookup_table(&[(
            "a",
            vec![
                Location::remote("B", None, 1, 2),
                Location::remote("L", Some(1), 0, 1),
            ],
        )]);

        let mut merge = IndexMerge::new(vec![t1, t2], IndexOptions::default()).unwrap();
        assert_eq!(merge.keywords(), &set(&["a", "b"]));

        let (references, ticket) = merge.next_keyword().unwrap();
        assert_eq!(references, set(&["B", "L"]));

        assert!(matches!(
            merge.complete(&ticket, "C", &bucket),
            Err(Error::UnexpectedReference(_))
        ));
        merge.complete(&ticket, "L", &level).unwrap();
        assert!(matches!(
            merge.complete(&ticket, "L", &level),
            Err(Error::AlreadyCompleted(_))
        ));

        let (references, empty_ticket) = merge.next_keyword().unwrap();
        assert!(references.is_empty());
        assert!(merge.next_keyword().is_none());

        // "a" still waits for "B"
        assert_eq!(merge.remaining(), 1);
        merge.complete(&ticket, "B", &bucket).unwrap();
        assert!(matches!(
            merge.complete(&ticket, "B", &bucket),
            Err(Error::AlreadyCompleted(_))
        ));
        assert!(matches!(
            merge.complete(&empty_ticket, "L", &level),
            Err(Error::AlreadyCompleted(_))
        ));
        assert!(matches!(
            merge.complete(&FetchTicket { keyword: "zz".to_string() }, "L", &level),
            Err(Error::UnknownTicket)
        ));

        assert_eq!(merge.inverted_index()["a"], set(&["x", "y", "z", "v", "w"]));
        assert!(merge.inverted_index()["b"].is_empty());

        let index = merge.finish().unwrap();
        assert_eq!(index.size(), 5);
        assert_eq!(index.keywords().len(), 2);
        assert!(!index.lookup_table().contains_key("b"));
    }

    #[test]
    fn test_finish_too_early() {
        let table = lookup_table(&[("a", vec![Location::remote("L", Some(0), 0, 1)])]);
        let mut merge = IndexMerge::new(vec![table], IndexOptions::default()).unwrap();
        let _ = merge.next_keyword().unwrap();

        assert!(matches!(merge.finish(), Err(Error::IncompleteFetch(1))));
    }

    #[test]
    fn test_merge_with_itself() {
        let level = BlobContent::Level(vec![ids(&["x", "y"]), ids(&["z"])]);
        let table = lookup_table(&[("a", vec![Location::remote("L", Some(0), 0, 2)])]);

        let run = |tables: Vec<LookupTable>| {
            let mut merge = IndexMerge::new(tables, IndexOptions::default()).unwrap();
            while let Some((references, ticket)) = merge.next_keyword() {
                for reference in references {
                    merge.complete(&ticket, &reference, &level).unwrap();
                }
            }
            merge.inverted_index().clone()
        };

        assert_eq!(run(vec![table.clone()]), run(vec![table.clone(), table]));
    }
}
