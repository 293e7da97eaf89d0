//! Where a chunk of a posting list lives
//!
//! A [Location] points to the slice `[start_of_chunk, start_of_chunk +
//! chunk_length)` of a bucket. The bucket is either part of the local
//! datastore (level + bucket index) or stored in a remote blob, in which case
//! the blob is either a whole bucket (no bucket index) or a run of buckets.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::base::{BlobReference, DocId, LevelIndex};
use crate::error::{Error, Result};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Place {
    /// A bucket of the local datastore
    Local {
        level_index: LevelIndex,
        bucket_index: usize,
    },

    /// A remote blob, holding a bucket (`bucket_index` is `None`) or a
    /// sequence of buckets
    Remote {
        blob_reference: BlobReference,
        bucket_index: Option<usize>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "SerializedLocation", into = "SerializedLocation")]
pub struct Location {
    pub place: Place,
    pub start_of_chunk: usize,
    pub chunk_length: usize,
}

impl Location {
    pub fn local(
        level_index: LevelIndex,
        bucket_index: usize,
        start_of_chunk: usize,
        chunk_length: usize,
    ) -> Self {
        Self {
            place: Place::Local {
                level_index,
                bucket_index,
            },
            start_of_chunk,
            chunk_length,
        }
    }

    pub fn remote(
        blob_reference: impl Into<BlobReference>,
        bucket_index: Option<usize>,
        start_of_chunk: usize,
        chunk_length: usize,
    ) -> Self {
        Self {
            place: Place::Remote {
                blob_reference: blob_reference.into(),
                bucket_index,
            },
            start_of_chunk,
            chunk_length,
        }
    }

    /// Builds a location from loose fields, failing with
    /// [Error::LocationFormat] when the fields required by the variant are
    /// missing
    pub fn new(
        is_remote: bool,
        blob_reference: Option<BlobReference>,
        level_index: Option<LevelIndex>,
        bucket_index: Option<usize>,
        start_of_chunk: usize,
        chunk_length: usize,
    ) -> Result<Self> {
        Self::try_from(SerializedLocation {
            is_remote: Some(is_remote),
            blob_reference,
            level_index,
            bucket_index,
            start_of_chunk,
            chunk_length,
        })
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.place, Place::Remote { .. })
    }

    pub fn blob_reference(&self) -> Option<&str> {
        match &self.place {
            Place::Remote { blob_reference, .. } => Some(blob_reference),
            Place::Local { .. } => None,
        }
    }

    pub fn level_index(&self) -> Option<LevelIndex> {
        match self.place {
            Place::Local { level_index, .. } => Some(level_index),
            Place::Remote { .. } => None,
        }
    }

    pub fn bucket_index(&self) -> Option<usize> {
        match self.place {
            Place::Local { bucket_index, .. } => Some(bucket_index),
            Place::Remote { bucket_index, .. } => bucket_index,
        }
    }

    /// The range of positions covered within the bucket
    pub fn range(&self) -> Range<usize> {
        self.start_of_chunk..self.start_of_chunk.saturating_add(self.chunk_length)
    }

    /// Extracts the chunk from its bucket
    ///
    /// The range is clipped to the bucket, so a location reaching past the
    /// end of the bucket yields the identifiers that are there.
    pub fn slice<'a>(&self, bucket: &'a [DocId]) -> &'a [DocId] {
        let end = self.range().end.min(bucket.len());
        let start = self.start_of_chunk.min(end);
        &bucket[start..end]
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.place {
            Place::Local {
                level_index,
                bucket_index,
            } => write!(
                f,
                "({}, {}, {}, {})",
                level_index, bucket_index, self.start_of_chunk, self.chunk_length
            ),
            Place::Remote {
                blob_reference,
                bucket_index,
            } => match bucket_index {
                Some(b) => write!(
                    f,
                    "({}, {}, {}, {})",
                    blob_reference, b, self.start_of_chunk, self.chunk_length
                ),
                None => write!(
                    f,
                    "({}, -, {}, {})",
                    blob_reference, self.start_of_chunk, self.chunk_length
                ),
            },
        }
    }
}

/// The flat object form of a location, used at persistence and hand-off
/// boundaries
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct SerializedLocation {
    /// Inferred from `blob_reference` when absent
    #[serde(default)]
    pub is_remote: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_reference: Option<BlobReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_index: Option<LevelIndex>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_index: Option<usize>,

    pub start_of_chunk: usize,
    pub chunk_length: usize,
}

impl TryFrom<SerializedLocation> for Location {
    type Error = Error;

    fn try_from(raw: SerializedLocation) -> Result<Self> {
        let is_remote = raw.is_remote.unwrap_or(raw.blob_reference.is_some());

        let place = if is_remote {
            let blob_reference = raw.blob_reference.ok_or_else(|| {
                Error::LocationFormat(
                    "blob reference not provided for a remote location".to_string(),
                )
            })?;
            Place::Remote {
                blob_reference,
                bucket_index: raw.bucket_index,
            }
        } else {
            match (raw.level_index, raw.bucket_index) {
                (Some(level_index), Some(bucket_index)) => Place::Local {
                    level_index,
                    bucket_index,
                },
                _ => {
                    return Err(Error::LocationFormat(
                        "level or bucket index not provided for a local location".to_string(),
                    ))
                }
            }
        };

        Ok(Location {
            place,
            start_of_chunk: raw.start_of_chunk,
            chunk_length: raw.chunk_length,
        })
    }
}

impl From<Location> for SerializedLocation {
    fn from(location: Location) -> Self {
        let (is_remote, blob_reference, level_index, bucket_index) = match location.place {
            Place::Local {
                level_index,
                bucket_index,
            } => (false, None, Some(level_index), Some(bucket_index)),
            Place::Remote {
                blob_reference,
                bucket_index,
            } => (true, Some(blob_reference), None, bucket_index),
        };

        SerializedLocation {
            is_remote: Some(is_remote),
            blob_reference,
            level_index,
            bucket_index,
            start_of_chunk: location.start_of_chunk,
            chunk_length: location.chunk_length,
        }
    }
}
