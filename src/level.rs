//! Sizing of the index levels
//!
//! Each level holds an array of `2 * (size + 2^l)` slots, cut into buckets of
//! `2^(l+1)` slots (the last one being possibly smaller). Posting lists are
//! cut into chunks of at most `2^l` identifiers before being placed into a
//! level.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::base::LevelIndex;

/// Level index => parameters of the level
pub type LevelInfos = BTreeMap<LevelIndex, LevelInfo>;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelInfo {
    pub array_size: usize,
    pub large_bucket_size: usize,
    pub number_of_large_buckets: usize,
    /// Capacity of the trailing bucket (0 if there is none)
    pub small_bucket_size: usize,
    pub number_of_buckets: usize,
    pub large_chunk_size: usize,
}

impl LevelInfo {
    pub fn new(level_index: LevelIndex, size: usize) -> Self {
        let large_chunk_size = 1usize << level_index;
        let array_size = 2 * (size + large_chunk_size);

        let large_bucket_size = large_chunk_size << 1;
        let number_of_large_buckets = array_size / large_bucket_size;
        let small_bucket_size = array_size % large_bucket_size;
        let number_of_buckets = number_of_large_buckets + usize::from(small_bucket_size != 0);

        Self {
            array_size,
            large_bucket_size,
            number_of_large_buckets,
            small_bucket_size,
            number_of_buckets,
            large_chunk_size,
        }
    }

    /// Capacity of the bucket at the given position
    pub fn bucket_capacity(&self, bucket_index: usize) -> usize {
        if bucket_index < self.number_of_large_buckets {
            self.large_bucket_size
        } else {
            self.small_bucket_size
        }
    }
}

/// `ceil(log2(size))`, for `size > 0`
pub fn ceil_log2(size: usize) -> LevelIndex {
    debug_assert!(size > 0);
    (usize::BITS - (size - 1).leading_zeros()) as LevelIndex
}

/// Chooses the levels of an index holding `size` postings
///
/// With `l0 = ceil(log2(size))` and `p = ceil(l0 / s)`, the levels are
/// `l0, l0 - p, l0 - 2p, ...` (`s` of them, negative ones dropped), plus
/// level 0 when `locality > 1`.
pub fn level_infos(size: usize, s: usize, locality: usize) -> LevelInfos {
    if size == 0 {
        return LevelInfos::new();
    }

    let s = s.max(1);
    let l0 = ceil_log2(size) as usize;
    let p = l0.div_ceil(s).max(1);

    let mut levels: LevelInfos = (0..s)
        .map(|i| i * p)
        .take_while(|&offset| offset <= l0)
        .map(|offset| {
            let l = (l0 - offset) as LevelIndex;
            (l, LevelInfo::new(l, size))
        })
        .collect();

    if locality > 1 {
        levels.entry(0).or_insert_with(|| LevelInfo::new(0, size));
    }

    levels
}
