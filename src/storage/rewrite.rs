use crate::base::{Len, LevelIndex};
use crate::error::{Error, Result};
use crate::location::{Location, Place};

use super::{BlobId, IndexStorage};

impl IndexStorage {
    fn reference(&self, id: &BlobId) -> Result<&str> {
        self.references
            .get(id)
            .map(|r| r.as_str())
            .ok_or_else(|| Error::MissingBlob(id.to_string()))
    }

    /// Maps a local location to the remote location(s) covering the same
    /// document IDs
    ///
    /// A chunk of a fragmented bucket can span several runs, in which case
    /// one location is produced per run it intersects.
    pub(super) fn convert_location(&self, location: &Location) -> Result<Vec<Location>> {
        let (l, b) = match location.place {
            Place::Local {
                level_index,
                bucket_index,
            } => (level_index, bucket_index),
            Place::Remote { .. } => return Err(Error::LocalLocationExpected),
        };

        if let Some(reference) = self.references.get(&BlobId::Level(l)) {
            return Ok(vec![Location::remote(
                reference.clone(),
                Some(b),
                location.start_of_chunk,
                location.chunk_length,
            )]);
        }

        let fractions = self.bucket_fractions(l, b);
        if !fractions.is_empty() {
            let start = location.start_of_chunk;
            let end = start + location.chunk_length;

            let mut locations = Vec::new();
            for (id, offset, length) in fractions {
                let lo = start.max(offset);
                let hi = end.min(offset + length);
                if lo < hi {
                    locations.push(Location::remote(
                        self.reference(&id)?,
                        None,
                        lo - offset,
                        hi - lo,
                    ));
                }
            }
            return Ok(locations);
        }

        // The fraction holding bucket b is the one starting last before it
        let first_bucket = self
            .files
            .range(
                BlobId::LevelFraction {
                    level: l,
                    first_bucket: 0,
                }..=BlobId::LevelFraction {
                    level: l,
                    first_bucket: b,
                },
            )
            .next_back()
            .and_then(|(id, content)| match id {
                BlobId::LevelFraction { first_bucket, .. } if b < first_bucket + content.len() => {
                    Some(*first_bucket)
                }
                _ => None,
            })
            .ok_or_else(|| Error::MissingBlob(location.to_string()))?;

        let id = BlobId::LevelFraction {
            level: l,
            first_bucket,
        };
        Ok(vec![Location::remote(
            self.reference(&id)?,
            Some(b - first_bucket),
            location.start_of_chunk,
            location.chunk_length,
        )])
    }

    /// Runs of a fragmented bucket as (blob, offset, length), by offset
    fn bucket_fractions(&self, level: LevelIndex, bucket: usize) -> Vec<(BlobId, usize, usize)> {
        self.files
            .range(
                BlobId::BucketFraction {
                    level,
                    bucket,
                    offset: 0,
                }..=BlobId::BucketFraction {
                    level,
                    bucket,
                    offset: usize::MAX,
                },
            )
            .filter_map(|(id, content)| match id {
                BlobId::BucketFraction { offset, .. } => Some((*id, *offset, content.len())),
                _ => None,
            })
            .collect()
    }
}
