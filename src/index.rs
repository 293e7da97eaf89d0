//! Main data structure used to describe an encrypted index
//!
//! The inverted index is turned into two structures: a datastore (levels of
//! fixed-capacity buckets) and a lookup table from keywords to the locations
//! of the chunks of their posting lists. Chunks are placed in random buckets
//! among those that can hold them, so that bucket sizes do not reveal the
//! length of posting lists.

use std::collections::{BTreeMap, BTreeSet};

use derivative::Derivative;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::base::{Datastore, DocId, InvertedIndex, Keyword, LevelIndex, LookupTable};
use crate::builder::{invert, parse, RawDocument};
use crate::error::{Error, Result};
use crate::level::{level_infos, LevelInfos};
use crate::location::{Location, Place};
use crate::normalizer::Normalizer;
use crate::utils::random::{OsChooser, SecureChooser};

#[derive(Derivative, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[derivative(Default)]
pub struct IndexOptions {
    /// Space/read efficiency tradeoff: number of levels
    #[derivative(Default(value = "2"))]
    pub s: usize,

    /// Locality: maximum number of chunks a posting list is split into
    #[derivative(Default(value = "1"))]
    pub locality: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EncryptedIndex {
    options: IndexOptions,
    keywords: BTreeSet<Keyword>,

    /// Sum of the posting list lengths
    size: usize,

    levels: LevelInfos,
    datastore: Datastore,
    lookup_table: LookupTable,
}

impl EncryptedIndex {
    /// Creates an empty index
    pub fn new(options: IndexOptions) -> Self {
        Self {
            options,
            keywords: BTreeSet::new(),
            size: 0,
            levels: LevelInfos::new(),
            datastore: Datastore::new(),
            lookup_table: LookupTable::new(),
        }
    }

    /// Builds an index from raw documents, placing chunks with the
    /// operating system's secure random source
    pub fn build(
        documents: &[RawDocument],
        normalizer: &dyn Normalizer,
        options: IndexOptions,
    ) -> Result<Self> {
        Self::build_with_chooser(documents, normalizer, options, &mut OsChooser::new())
    }

    pub fn build_with_chooser(
        documents: &[RawDocument],
        normalizer: &dyn Normalizer,
        options: IndexOptions,
        chooser: &mut dyn SecureChooser,
    ) -> Result<Self> {
        let (corpus, keywords) = parse(documents, normalizer);
        let inverted_index = invert(&corpus, &keywords);
        Self::from_inverted_index(&inverted_index, options, chooser)
    }

    /// Builds an index from an inverted index
    pub fn from_inverted_index(
        inverted_index: &InvertedIndex,
        options: IndexOptions,
        chooser: &mut dyn SecureChooser,
    ) -> Result<Self> {
        let mut index = Self::new(options);
        index.calc_params(inverted_index);
        index.distribute(inverted_index, chooser)?;

        info!(
            "Index built: {} keywords, {} postings, {} levels",
            index.keywords.len(),
            index.size,
            index.levels.len()
        );
        Ok(index)
    }

    /// Computes the index size and the parameters of each level
    pub fn calc_params(&mut self, inverted_index: &InvertedIndex) -> &LevelInfos {
        self.size = inverted_index.values().map(|postings| postings.len()).sum();
        self.levels = level_infos(self.size, self.options.s, self.options.locality);

        for (l, info) in self.levels.iter() {
            debug!(
                "Level {}: {} buckets of {} (last {}), chunks of {}",
                l,
                info.number_of_buckets,
                info.large_bucket_size,
                info.small_bucket_size,
                info.large_chunk_size
            );
        }
        &self.levels
    }

    /// The smallest level whose chunks split `length` postings into at most
    /// `locality` chunks
    fn choose_level(&self, length: usize) -> Option<LevelIndex> {
        let locality = self.options.locality.max(1);
        self.levels
            .iter()
            .find(|(_, info)| info.large_chunk_size.saturating_mul(locality) >= length)
            .map(|(&l, _)| l)
    }

    /// Places every posting list into the levels, filling the datastore and
    /// the lookup table
    ///
    /// Must follow [EncryptedIndex::calc_params] on the same inverted index.
    pub fn distribute(
        &mut self,
        inverted_index: &InvertedIndex,
        chooser: &mut dyn SecureChooser,
    ) -> Result<()> {
        self.keywords = inverted_index.keys().cloned().collect();
        self.lookup_table = LookupTable::new();
        self.datastore = self
            .levels
            .iter()
            .map(|(&l, info)| (l, vec![Vec::new(); info.number_of_buckets]))
            .collect();

        // Remaining capacity of each bucket
        let mut remaining: BTreeMap<LevelIndex, Vec<usize>> = self
            .levels
            .iter()
            .map(|(&l, info)| {
                (
                    l,
                    (0..info.number_of_buckets)
                        .map(|b| info.bucket_capacity(b))
                        .collect(),
                )
            })
            .collect();

        for (keyword, postings) in inverted_index {
            if postings.is_empty() {
                continue;
            }

            let level = self.choose_level(postings.len()).ok_or_else(|| {
                Error::CapacityExhausted {
                    level: self.levels.keys().next_back().copied().unwrap_or(0),
                    chunk_length: postings.len(),
                }
            })?;
            let chunk_size = self.levels[&level].large_chunk_size;

            let (Some(buckets), Some(capacities)) =
                (self.datastore.get_mut(&level), remaining.get_mut(&level))
            else {
                return Err(Error::CapacityExhausted {
                    level,
                    chunk_length: chunk_size,
                });
            };

            let postings: Vec<&DocId> = postings.iter().collect();
            let mut locations = Vec::new();

            for chunk in postings.chunks(chunk_size) {
                let candidates: Vec<usize> = capacities
                    .iter()
                    .enumerate()
                    .filter(|(_, capacity)| **capacity >= chunk.len())
                    .map(|(b, _)| b)
                    .collect();

                if candidates.is_empty() {
                    return Err(Error::CapacityExhausted {
                        level,
                        chunk_length: chunk.len(),
                    });
                }

                let b = candidates[chooser.choose_one(candidates.len())];
                let start_of_chunk = buckets[b].len();
                buckets[b].extend(chunk.iter().map(|&doc_id| doc_id.clone()));
                capacities[b] -= chunk.len();

                locations.push(Location::local(level, b, start_of_chunk, chunk.len()));
            }

            self.lookup_table.insert(keyword.clone(), locations);
        }

        debug!(
            "Distributed {} posting lists over {} levels",
            self.lookup_table.len(),
            self.datastore.len()
        );
        Ok(())
    }

    pub fn options(&self) -> IndexOptions {
        self.options
    }

    pub fn keywords(&self) -> &BTreeSet<Keyword> {
        &self.keywords
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn levels(&self) -> &LevelInfos {
        &self.levels
    }

    pub fn datastore(&self) -> &Datastore {
        &self.datastore
    }

    pub fn lookup_table(&self) -> &LookupTable {
        &self.lookup_table
    }

    /// Replaces the lookup table, e.g. with the remote locations obtained
    /// once the datastore has been uploaded
    pub fn set_lookup_table(&mut self, lookup_table: LookupTable) {
        self.lookup_table = lookup_table;
    }

    /// Extracts the chunk pointed to by a local location
    pub fn resolve(&self, location: &Location) -> Result<&[DocId]> {
        match location.place {
            Place::Local {
                level_index,
                bucket_index,
            } => {
                let bucket = self
                    .datastore
                    .get(&level_index)
                    .and_then(|level| level.get(bucket_index))
                    .ok_or_else(|| {
                        Error::LocationFormat(format!(
                            "no bucket at {} in the local datastore",
                            location
                        ))
                    })?;
                Ok(location.slice(bucket))
            }
            Place::Remote { .. } => Err(Error::LocalLocationExpected),
        }
    }

    /// Searches a keyword in the local datastore
    pub fn lookup_local(&self, keyword: &str) -> Result<BTreeSet<DocId>> {
        let mut doc_ids = BTreeSet::new();
        if let Some(locations) = self.lookup_table.get(keyword) {
            for location in locations {
                doc_ids.extend(self.resolve(location)?.iter().cloned());
            }
        }
        Ok(doc_ids)
    }
}
