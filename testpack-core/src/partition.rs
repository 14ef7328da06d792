// Copyright (c) The testpack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sharding test classes across several machines.
//!
//! Hashes test names with a fixed xxhash64 seed to get a platform-independent, stable partition.

use crate::errors::ShardParseError;
use std::str::FromStr;
use xxhash_rust::xxh64::xxh64;

/// A shard assignment `{index, total}` with `0 <= index < total`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ShardAssignment {
    index: u64,
    total: u64,
}

impl ShardAssignment {
    /// Creates a new shard assignment. Returns `None` if `total == 0` or `index >= total`.
    pub fn new(index: u64, total: u64) -> Option<Self> {
        if total == 0 || index >= total {
            return None;
        }
        Some(Self { index, total })
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Whether the test class `full_class_name` belongs to this shard.
    ///
    /// `stableHash(C) mod total == index`. The hash is fixed to xxhash64 with a zero seed so
    /// results are stable across processes and platforms.
    pub fn contains_class(&self, full_class_name: &str) -> bool {
        stable_hash(full_class_name) % self.total == self.index
    }
}

/// Platform-independent stable hash used for shard assignment.
pub fn stable_hash(s: &str) -> u64 {
    xxh64(s.as_bytes(), 0)
}

impl FromStr for ShardAssignment {
    type Err = ShardParseError;

    /// Parses `"index/total"`, e.g. `"0/3"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(2, '/');
        let index_str = parts.next().unwrap_or_default();
        let total_str = parts
            .next()
            .ok_or_else(|| ShardParseError::new(s, "missing '/'"))?;

        let index: u64 = index_str
            .parse()
            .map_err(|_| ShardParseError::new(s, "index is not a non-negative integer"))?;
        let total: u64 = total_str
            .parse()
            .map_err(|_| ShardParseError::new(s, "total is not a non-negative integer"))?;

        ShardAssignment::new(index, total).ok_or_else(|| ShardParseError::new(s, "index must be less than total, and total must be nonzero"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_shard_specs() {
        let s: ShardAssignment = "0/3".parse().unwrap();
        assert_eq!((s.index(), s.total()), (0, 3));
    }

    #[test]
    fn rejects_out_of_range_or_malformed() {
        assert!("3/3".parse::<ShardAssignment>().is_err());
        assert!("0/0".parse::<ShardAssignment>().is_err());
        assert!("a/3".parse::<ShardAssignment>().is_err());
        assert!("0".parse::<ShardAssignment>().is_err());
    }

    #[test]
    fn partition_of_three_classes_across_three_shards_is_disjoint_and_total() {
        let classes = ["FirstTest", "SecondTest", "ThirdTest"];
        let shards: Vec<ShardAssignment> = (0..3)
            .map(|i| ShardAssignment::new(i, 3).unwrap())
            .collect();

        let mut seen = Vec::new();
        for shard in &shards {
            let matching: Vec<&str> = classes
                .iter()
                .copied()
                .filter(|c| shard.contains_class(c))
                .collect();
            assert_eq!(matching.len(), 1, "each shard gets exactly one class here");
            seen.extend(matching);
        }
        seen.sort_unstable();
        let mut expected = classes.to_vec();
        expected.sort_unstable();
        assert_eq!(seen, expected);
    }

    #[test]
    fn shard_index_beyond_class_count_yields_empty_shard_not_error() {
        let shard = ShardAssignment::new(7, 10).unwrap();
        let classes = ["FirstTest", "SecondTest", "ThirdTest"];
        assert!(classes.iter().all(|c| !shard.contains_class(c)));
    }

    #[test]
    fn hash_is_stable() {
        assert_eq!(stable_hash("org.example.Foo"), stable_hash("org.example.Foo"));
    }
}
