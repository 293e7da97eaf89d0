//! Splits the datastore into blobs smaller than the cutoff
//!
//! Three passes: levels small enough are kept whole, the other levels are cut
//! into runs of buckets, and buckets too large for any run are cut into runs
//! of document IDs.

use std::collections::BTreeMap;

use log::debug;

use crate::base::{Bucket, Datastore, DocId, LevelIndex};
use crate::error::{Error, Result};
use crate::utils::buffer::estimate_size;

/// Size of the enclosing brackets of an encoded list
const LIST_OVERHEAD: usize = 2;

/// Size of the separator between two encoded elements
const SEPARATOR: usize = 2;

pub type WholeLevels = BTreeMap<LevelIndex, Vec<Bucket>>;

/// (level, first bucket) => buckets
pub type LevelFractions = BTreeMap<(LevelIndex, usize), Vec<Bucket>>;

/// (level, bucket) => bucket
pub type LargeBuckets = BTreeMap<(LevelIndex, usize), Bucket>;

/// (level, bucket, offset of the first ID) => document IDs
pub type BucketFractions = BTreeMap<(LevelIndex, usize, usize), Bucket>;

/// Separates the levels that fit in one blob from the others
pub fn segregate_levels(
    datastore: &Datastore,
    cutoff: usize,
) -> Result<(WholeLevels, WholeLevels)> {
    let mut whole = WholeLevels::new();
    let mut large = WholeLevels::new();

    for (&l, level) in datastore {
        let level_size = estimate_size(level)?;
        if level_size < cutoff {
            whole.insert(l, level.clone());
        } else {
            debug!("Level {} is too large ({} bytes)", l, level_size);
            large.insert(l, level.clone());
        }
    }

    Ok((whole, large))
}

/// Cuts one level into runs of buckets, setting apart the buckets that
/// cannot be stored in a run of their own
fn divide_level(
    l: LevelIndex,
    level: &[Bucket],
    cutoff: usize,
    fractions: &mut LevelFractions,
    large_buckets: &mut LargeBuckets,
) -> Result<()> {
    let mut start = 0;
    let mut current: Vec<Bucket> = Vec::new();
    let mut size = LIST_OVERHEAD;

    for (b, bucket) in level.iter().enumerate() {
        let bucket_size = estimate_size(bucket)?;

        if LIST_OVERHEAD + bucket_size >= cutoff {
            large_buckets.insert((l, b), bucket.clone());

            if !current.is_empty() {
                fractions.insert((l, start), std::mem::take(&mut current));
            }
            start = b + 1;
            size = LIST_OVERHEAD;
            continue;
        }

        let added = if current.is_empty() {
            bucket_size
        } else {
            bucket_size + SEPARATOR
        };

        if size + added < cutoff {
            current.push(bucket.clone());
            size += added;
        } else {
            fractions.insert((l, start), std::mem::take(&mut current));
            start = b;
            current.push(bucket.clone());
            size = LIST_OVERHEAD + bucket_size;
        }
    }

    if !current.is_empty() {
        fractions.insert((l, start), current);
    }
    Ok(())
}

/// Cuts large levels into runs of buckets
pub fn split_large_levels(
    large_levels: &WholeLevels,
    cutoff: usize,
) -> Result<(LevelFractions, LargeBuckets)> {
    let mut fractions = LevelFractions::new();
    let mut large_buckets = LargeBuckets::new();

    for (&l, level) in large_levels {
        divide_level(l, level, cutoff, &mut fractions, &mut large_buckets)?;
    }

    Ok((fractions, large_buckets))
}

/// Cuts oversized buckets into equal runs of document IDs
///
/// The number of runs starts at `ceil(size / cutoff)` and grows until every
/// run is under the cutoff.
pub fn split_large_buckets(large_buckets: &LargeBuckets, cutoff: usize) -> Result<BucketFractions> {
    let mut fractions = BucketFractions::new();

    for (&(l, b), bucket) in large_buckets {
        let mut count = estimate_size(bucket)?.div_ceil(cutoff).max(1);

        loop {
            let length = bucket.len().div_ceil(count).max(1);
            let runs: Vec<&[DocId]> = bucket.chunks(length).collect();
            let sizes = runs
                .iter()
                .map(|run| estimate_size(run))
                .collect::<Result<Vec<_>>>()?;
            let largest = sizes.into_iter().max().unwrap_or(0);

            if largest < cutoff {
                debug!(
                    "Bucket ({}, {}) split into {} runs of {}",
                    l,
                    b,
                    runs.len(),
                    length
                );
                for (i, run) in runs.into_iter().enumerate() {
                    fractions.insert((l, b, i * length), run.to_vec());
                }
                break;
            }

            if length == 1 {
                return Err(Error::BlobTooSmall {
                    cutoff,
                    size: largest,
                });
            }
            count += 1;
        }
    }

    Ok(fractions)
}
