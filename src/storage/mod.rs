//! Fragmentation of the datastore into blobs for remote storage
//!
//! The datastore of an index is cut into blobs whose encoded size is under a
//! cutoff. Blobs are then pulled one at a time by the caller, which uploads
//! them and reports the blob reference it obtained. Once every blob has been
//! reported, the lookup table is rewritten so that each location points to
//! the remote blob(s) holding its chunk.

mod rewrite;
pub mod split;

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::base::{BlobReference, LevelIndex, LookupTable};
use crate::blob::BlobContent;
use crate::error::{Error, Result};
use crate::index::EncryptedIndex;

use self::split::{segregate_levels, split_large_buckets, split_large_levels};

/// Default blob cutoff (in bytes)
pub const DEFAULT_CUTOFF: usize = 50 * 1024;

/// Identifies a blob produced by the fragmentation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BlobId {
    /// A whole level
    Level(LevelIndex),
    /// A run of buckets of a level, starting at `first_bucket`
    LevelFraction {
        level: LevelIndex,
        first_bucket: usize,
    },
    /// A run of document IDs of a bucket, starting at `offset`
    BucketFraction {
        level: LevelIndex,
        bucket: usize,
        offset: usize,
    },
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BlobId::Level(l) => write!(f, "({})", l),
            BlobId::LevelFraction {
                level,
                first_bucket,
            } => write!(f, "({}, {})", level, first_bucket),
            BlobId::BucketFraction {
                level,
                bucket,
                offset,
            } => write!(f, "({}, {}, {})", level, bucket, offset),
        }
    }
}

/// Handed out with each blob, and given back once the blob is uploaded
#[derive(Debug, PartialEq, Eq)]
pub struct UploadTicket {
    id: BlobId,
}

impl UploadTicket {
    pub fn blob_id(&self) -> BlobId {
        self.id
    }
}

pub struct IndexStorage {
    cutoff: usize,

    /// Lookup table with local locations
    local_lookup_table: LookupTable,

    /// Lookup table with remote locations, once rewritten
    lookup_table: Option<LookupTable>,

    files: BTreeMap<BlobId, BlobContent>,

    /// Blobs not handed out yet
    queue: VecDeque<BlobId>,

    /// Blobs handed out but not reported as uploaded
    pending: BTreeSet<BlobId>,

    references: BTreeMap<BlobId, BlobReference>,
}

impl IndexStorage {
    /// Fragments the datastore of an index, so that every blob encodes to
    /// strictly less than `cutoff` bytes
    pub fn new(index: &EncryptedIndex, cutoff: usize) -> Result<Self> {
        let (whole_levels, large_levels) = segregate_levels(index.datastore(), cutoff)?;
        let (level_fractions, large_buckets) = split_large_levels(&large_levels, cutoff)?;
        let bucket_fractions = split_large_buckets(&large_buckets, cutoff)?;

        info!(
            "Datastore fragmented: {} levels, {} level fractions, {} bucket fractions (cutoff {})",
            whole_levels.len(),
            level_fractions.len(),
            bucket_fractions.len(),
            cutoff
        );

        let mut files = BTreeMap::new();
        for (l, level) in whole_levels {
            files.insert(BlobId::Level(l), BlobContent::Level(level));
        }
        for ((level, first_bucket), buckets) in level_fractions {
            files.insert(
                BlobId::LevelFraction {
                    level,
                    first_bucket,
                },
                BlobContent::Level(buckets),
            );
        }
        for ((level, bucket, offset), ids) in bucket_fractions {
            files.insert(
                BlobId::BucketFraction {
                    level,
                    bucket,
                    offset,
                },
                BlobContent::Bucket(ids),
            );
        }

        Ok(Self {
            cutoff,
            local_lookup_table: index.lookup_table().clone(),
            lookup_table: None,
            queue: files.keys().copied().collect(),
            files,
            pending: BTreeSet::new(),
            references: BTreeMap::new(),
        })
    }

    pub fn cutoff(&self) -> usize {
        self.cutoff
    }

    /// All the blobs of the fragmented datastore
    pub fn files(&self) -> &BTreeMap<BlobId, BlobContent> {
        &self.files
    }

    /// References of the blobs uploaded so far
    pub fn references(&self) -> &BTreeMap<BlobId, BlobReference> {
        &self.references
    }

    /// Number of blobs not uploaded yet
    pub fn remaining(&self) -> usize {
        self.queue.len() + self.pending.len()
    }

    /// Gives the next blob to upload, encoded, or `None` if every blob was
    /// handed out
    ///
    /// Several blobs can be taken before completing them.
    pub fn next_blob(&mut self) -> Result<Option<(Vec<u8>, UploadTicket)>> {
        let Some(id) = self.queue.pop_front() else {
            return Ok(None);
        };

        let data = self.files[&id].to_bytes()?;
        debug!("Handing out blob {} ({} bytes)", id, data.len());
        self.pending.insert(id);

        Ok(Some((data, UploadTicket { id })))
    }

    /// Records the reference under which a blob was uploaded
    pub fn complete(&mut self, ticket: UploadTicket, reference: BlobReference) -> Result<()> {
        if self.references.contains_key(&ticket.id) {
            return Err(Error::AlreadyCompleted(ticket.id.to_string()));
        }
        if !self.pending.remove(&ticket.id) {
            return Err(Error::UnknownTicket);
        }

        self.references.insert(ticket.id, reference);
        Ok(())
    }

    /// Rewrites the lookup table with remote locations
    ///
    /// Fails if some blobs have not been uploaded.
    pub fn update_lookup_table(&mut self) -> Result<&LookupTable> {
        let remaining = self.remaining();
        if remaining > 0 {
            return Err(Error::IncompleteUpload(remaining));
        }

        let mut lookup_table = LookupTable::new();
        for (keyword, locations) in &self.local_lookup_table {
            let mut remote = Vec::with_capacity(locations.len());
            for location in locations {
                remote.extend(self.convert_location(location)?);
            }
            lookup_table.insert(keyword.clone(), remote);
        }

        info!(
            "Lookup table rewritten ({} keywords, {} blobs)",
            lookup_table.len(),
            self.references.len()
        );
        Ok(&*self.lookup_table.insert(lookup_table))
    }

    /// The rewritten lookup table, if [IndexStorage::update_lookup_table]
    /// succeeded
    pub fn lookup_table(&self) -> Option<&LookupTable> {
        self.lookup_table.as_ref()
    }

    pub fn into_lookup_table(self) -> Option<LookupTable> {
        self.lookup_table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::InvertedIndex;
    use crate::location::Location;

    const EVENT_ID: &str = "$vBjjKk3mrIEPHvoIedB4Cc9kL0tWLKNXYgCRb2HAyGs";

    fn tiny_index() -> EncryptedIndex {
        let ii: InvertedIndex = [("a", 3usize), ("b", 1), ("c", 2)]
            .iter()
            .map(|(k, n)| {
                (
                    k.to_string(),
                    (0..*n).map(|i| format!("{}{}", EVENT_ID, i)).collect(),
                )
            })
            .collect();
        EncryptedIndex::from_inverted_index(
            &ii,
            Default::default(),
            &mut crate::utils::random::OsChooser::new(),
        )
        .unwrap()
    }

    fn upload_everything(storage: &mut IndexStorage) {
        let mut n = 0;
        while let Some((_, ticket)) = storage.next_blob().unwrap() {
            storage.complete(ticket, format!("blob/{}", n)).unwrap();
            n += 1;
        }
    }

    #[test]
    fn test_blob_id_order() {
        assert!(
            BlobId::Level(9)
                < BlobId::LevelFraction {
                    level: 0,
                    first_bucket: 0
                }
        );
        assert!(
            BlobId::BucketFraction {
                level: 1,
                bucket: 0,
                offset: 9
            } < BlobId::BucketFraction {
                level: 1,
                bucket: 1,
                offset: 0
            }
        );
        assert_eq!(
            BlobId::BucketFraction {
                level: 1,
                bucket: 2,
                offset: 3
            }
            .to_string(),
            "(1, 2, 3)"
        );
    }

    #[test]
    fn test_empty_index() {
        let index = EncryptedIndex::new(Default::default());
        let mut storage = IndexStorage::new(&index, 200).unwrap();

        assert!(storage.files().is_empty());
        assert!(storage.next_blob().unwrap().is_none());
        assert!(storage.update_lookup_table().unwrap().is_empty());
    }

    #[test]
    fn test_blobs_under_cutoff() {
        let index = tiny_index();
        for cutoff in [100, 200, 1000] {
            let mut storage = IndexStorage::new(&index, cutoff).unwrap();
            while let Some((data, _)) = storage.next_blob().unwrap() {
                assert!(data.len() < cutoff);
            }
        }
    }

    #[test]
    fn test_tickets() {
        let index = tiny_index();
        let mut storage = IndexStorage::new(&index, 1000).unwrap();
        let count = storage.files().len();

        let (_, ticket) = storage.next_blob().unwrap().unwrap();
        let id = ticket.blob_id();

        assert!(matches!(
            storage.update_lookup_table(),
            Err(Error::IncompleteUpload(n)) if n == count
        ));

        storage.complete(ticket, "blob/0".to_string()).unwrap();
        assert!(matches!(
            storage.complete(UploadTicket { id }, "blob/1".to_string()),
            Err(Error::AlreadyCompleted(_))
        ));
        assert!(matches!(
            storage.complete(UploadTicket { id: BlobId::Level(99) }, "blob/1".to_string()),
            Err(Error::UnknownTicket)
        ));
        assert_eq!(storage.references()[&id], "blob/0");
    }

    #[test]
    fn test_rewrite_whole_levels() {
        let index = tiny_index();
        let mut storage = IndexStorage::new(&index, 10_000).unwrap();
        assert!(storage.files().keys().all(|id| matches!(id, BlobId::Level(_))));
        upload_everything(&mut storage);

        let lookup_table = storage.update_lookup_table().unwrap().clone();
        for (keyword, locations) in index.lookup_table() {
            let remote = &lookup_table[keyword];
            assert_eq!(remote.len(), locations.len());
            for (local, remote) in locations.iter().zip(remote) {
                assert!(remote.is_remote());
                assert_eq!(remote.bucket_index(), local.bucket_index());
                assert_eq!(remote.start_of_chunk, local.start_of_chunk);
                assert_eq!(remote.chunk_length, local.chunk_length);
            }
        }
    }

    #[test]
    fn test_rewrite_bucket_fractions() {
        // One bucket of 7 IDs is cut into runs at offsets 0, 3, 6
        let mut storage = IndexStorage {
            cutoff: 200,
            local_lookup_table: LookupTable::new(),
            lookup_table: None,
            files: BTreeMap::new(),
            queue: VecDeque::new(),
            pending: BTreeSet::new(),
            references: BTreeMap::new(),
        };
        for (offset, len) in [(0, 3), (3, 3), (6, 1)] {
            let id = BlobId::BucketFraction {
                level: 2,
                bucket: 0,
                offset,
            };
            storage
                .files
                .insert(id, BlobContent::Bucket(vec![EVENT_ID.to_string(); len]));
            storage.references.insert(id, format!("f{}", offset));
        }

        let converted = storage
            .convert_location(&Location::local(2, 0, 2, 3))
            .unwrap();
        assert_eq!(
            converted,
            vec![
                Location::remote("f0", None, 2, 1),
                Location::remote("f3", None, 0, 2),
            ]
        );

        // A chunk ending on a run boundary does not touch the next run
        let converted = storage
            .convert_location(&Location::local(2, 0, 3, 3))
            .unwrap();
        assert_eq!(converted, vec![Location::remote("f3", None, 0, 3)]);
    }
}
