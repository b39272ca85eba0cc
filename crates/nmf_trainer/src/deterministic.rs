//! Deterministic utilities for reproducible training
//!
//! Every random draw in the trainer comes from a `StdRng` seeded through
//! [`derive_seed`], so independent streams (one per tree, one for the split,
//! one for the validation slice, one for the network) never depend on scheduling order.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::cmp::Ordering;

/// Named random streams derived from the run seed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Split,
    Tree(u64),
    Network,
    Validation,
}

impl Stream {
    fn id(self) -> u64 {
        match self {
            Stream::Split => 0,
            Stream::Network => 1,
            Stream::Validation => 2,
            Stream::Tree(index) => 3 + index,
        }
    }
}

/// Mix the run seed with a stream id (xxhash64-style avalanche)
pub fn derive_seed(seed: u64, stream: Stream) -> u64 {
    const PRIME1: u64 = 0x9E3779B185EBCA87;
    const PRIME2: u64 = 0xC2B2AE3D27D4EB4F;
    const PRIME3: u64 = 0x165667B19E3779F9;
    const PRIME5: u64 = 0x85EBCA77C2B2AE63;

    let mut h = seed.wrapping_add(PRIME5);
    h = h.wrapping_add(stream.id().wrapping_mul(PRIME3));
    h = h.rotate_left(17).wrapping_mul(PRIME2);

    h ^= h >> 33;
    h = h.wrapping_mul(PRIME1);
    h ^= h >> 29;
    h = h.wrapping_mul(PRIME2);
    h ^= h >> 32;

    h
}

/// Seeded generator for one stream
pub fn stream_rng(seed: u64, stream: Stream) -> StdRng {
    StdRng::seed_from_u64(derive_seed(seed, stream))
}

/// Deterministic tie-breaker for split selection
///
/// When two candidate splits have the same impurity decrease the one with
/// the lower feature index wins, then the lower threshold.
#[derive(Debug, Clone, Copy)]
pub struct SplitTieBreaker {
    pub feature_idx: usize,
    pub threshold: f32,
}

impl SplitTieBreaker {
    pub fn new(feature_idx: usize, threshold: f32) -> Self {
        Self {
            feature_idx,
            threshold,
        }
    }
}

impl PartialEq for SplitTieBreaker {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SplitTieBreaker {}

impl PartialOrd for SplitTieBreaker {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SplitTieBreaker {
    fn cmp(&self, other: &Self) -> Ordering {
        self.feature_idx
            .cmp(&other.feature_idx)
            .then_with(|| self.threshold.total_cmp(&other.threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_stream_determinism() {
        let mut rng1 = stream_rng(42, Stream::Tree(3));
        let mut rng2 = stream_rng(42, Stream::Tree(3));

        for _ in 0..100 {
            assert_eq!(rng1.gen::<u64>(), rng2.gen::<u64>());
        }
    }

    #[test]
    fn test_streams_are_distinct() {
        let seeds = [
            derive_seed(42, Stream::Split),
            derive_seed(42, Stream::Network),
            derive_seed(42, Stream::Validation),
            derive_seed(42, Stream::Tree(0)),
            derive_seed(42, Stream::Tree(1)),
        ];
        for i in 0..seeds.len() {
            for j in i + 1..seeds.len() {
                assert_ne!(seeds[i], seeds[j]);
            }
        }
    }

    #[test]
    fn test_different_seeds() {
        assert_ne!(derive_seed(42, Stream::Split), derive_seed(43, Stream::Split));
    }

    #[test]
    fn test_tie_breaker_ordering() {
        let t1 = SplitTieBreaker::new(0, 0.5);
        let t2 = SplitTieBreaker::new(0, 1.5);
        let t3 = SplitTieBreaker::new(1, 0.25);

        assert!(t1 < t2);
        assert!(t1 < t3);
        assert!(t2 < t3);
    }
}
