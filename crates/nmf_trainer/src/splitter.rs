//! Stratified train/test partitioning
//!
//! Each class contributes `round(n × test_fraction)` of its rows to the test
//! partition, clamped so the class also keeps at least one training row.
//! Rows are drawn with a seeded `StdRng`, so a fixed seed and row order
//! always produce the same partition.

use rand::seq::SliceRandom;
use signaura_nmf_core::LabelCodec;
use std::collections::BTreeMap;

use crate::deterministic::{stream_rng, Stream};
use crate::errors::{Result, TrainerError};

/// Disjoint row indices, each sorted ascending
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Number of test rows for a class of `n` rows
pub fn class_test_count(n: usize, test_fraction: f64) -> usize {
    let raw = (n as f64 * test_fraction).round() as usize;
    raw.clamp(1, n.saturating_sub(1).max(1))
}

/// Partition rows by their encoded labels `y`
///
/// `codec` is only used to name a class in a [`TrainerError::Stratification`].
pub fn stratified_split(
    y: &[usize],
    codec: &LabelCodec,
    test_fraction: f64,
    seed: u64,
) -> Result<Split> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(TrainerError::Config(format!(
            "test_fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }

    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (row, &class) in y.iter().enumerate() {
        by_class.entry(class).or_default().push(row);
    }

    for (&class, rows) in &by_class {
        if rows.len() < 2 {
            let label = codec
                .decode(class)
                .map(str::to_string)
                .unwrap_or_else(|_| format!("#{}", class));
            return Err(TrainerError::Stratification {
                label,
                count: rows.len(),
            });
        }
    }

    let mut rng = stream_rng(seed, Stream::Split);
    let mut train = Vec::with_capacity(y.len());
    let mut test = Vec::new();
    for (_class, mut rows) in by_class {
        let test_n = class_test_count(rows.len(), test_fraction);
        rows.shuffle(&mut rng);
        test.extend_from_slice(&rows[..test_n]);
        train.extend_from_slice(&rows[test_n..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok(Split { train, test })
}

/// Carve the trailing `fraction` of `indices` off as a validation slice
///
/// Returns `(fit, validation)`. The fit part always keeps at least one row.
pub fn holdout_tail(indices: &[usize], fraction: f64) -> (Vec<usize>, Vec<usize>) {
    if indices.is_empty() || fraction <= 0.0 {
        return (indices.to_vec(), Vec::new());
    }
    let keep = ((indices.len() as f64) * (1.0 - fraction)).floor() as usize;
    let keep = keep.clamp(1, indices.len());
    (indices[..keep].to_vec(), indices[keep..].to_vec())
}

/// Shuffle `indices` with the validation stream, then take the tail
///
/// Used on the sorted training partition so a class-ordered file still
/// yields a mixed validation slice.
pub fn shuffled_holdout(indices: &[usize], fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut shuffled = indices.to_vec();
    shuffled.shuffle(&mut stream_rng(seed, Stream::Validation));
    holdout_tail(&shuffled, fraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn labels(counts: &[usize]) -> (Vec<usize>, LabelCodec) {
        let names: Vec<String> = (0..counts.len()).map(|i| format!("class_{i}")).collect();
        // Interleave classes so rows of one class are not contiguous.
        let mut y = Vec::new();
        let max = counts.iter().copied().max().unwrap_or(0);
        for round in 0..max {
            for (class, &count) in counts.iter().enumerate() {
                if round < count {
                    y.push(class);
                }
            }
        }
        (y, LabelCodec::fit(&names))
    }

    #[test]
    fn test_balanced_split_sizes() {
        let (y, codec) = labels(&[20, 20, 20]);
        let split = stratified_split(&y, &codec, 0.2, 42).unwrap();
        assert_eq!(split.train.len(), 48);
        assert_eq!(split.test.len(), 12);
        for class in 0..3 {
            let in_test = split.test.iter().filter(|&&i| y[i] == class).count();
            assert_eq!(in_test, 4);
        }
    }

    #[test]
    fn test_split_is_reproducible() {
        let (y, codec) = labels(&[7, 11, 5]);
        let a = stratified_split(&y, &codec, 0.3, 42).unwrap();
        let b = stratified_split(&y, &codec, 0.3, 42).unwrap();
        assert_eq!(a, b);
        let c = stratified_split(&y, &codec, 0.3, 43).unwrap();
        assert_eq!(c.test.len(), a.test.len());
    }

    #[test]
    fn test_singleton_class_fails() {
        let (y, codec) = labels(&[5, 1]);
        let err = stratified_split(&y, &codec, 0.2, 42).unwrap_err();
        assert!(matches!(
            err,
            TrainerError::Stratification { label, count: 1 } if label == "class_1"
        ));
    }

    #[test]
    fn test_two_rows_go_one_each_way() {
        let (y, codec) = labels(&[2, 2]);
        let split = stratified_split(&y, &codec, 0.1, 42).unwrap();
        assert_eq!(split.test.len(), 2);
        assert_eq!(split.train.len(), 2);
    }

    #[test]
    fn test_invalid_fraction() {
        let (y, codec) = labels(&[4, 4]);
        assert!(matches!(
            stratified_split(&y, &codec, 1.0, 42),
            Err(TrainerError::Config(_))
        ));
    }

    #[test]
    fn test_holdout_tail() {
        let rows: Vec<usize> = (0..10).collect();
        let (fit, val) = holdout_tail(&rows, 0.2);
        assert_eq!(fit, (0..8).collect::<Vec<_>>());
        assert_eq!(val, vec![8, 9]);

        let (fit, val) = holdout_tail(&[3], 0.5);
        assert_eq!(fit, vec![3]);
        assert!(val.is_empty());
    }

    #[test]
    fn test_shuffled_holdout_mixes_sorted_classes() {
        // Four classes of ten rows each, stored class by class.
        let rows: Vec<usize> = (0..40).collect();
        let class_of = |i: usize| i / 10;

        let (fit, val) = shuffled_holdout(&rows, 0.2, 42);
        assert_eq!(fit.len(), 32);
        assert_eq!(val.len(), 8);

        let mut all: Vec<usize> = fit.iter().chain(&val).copied().collect();
        all.sort_unstable();
        assert_eq!(all, rows);

        let val_classes: BTreeSet<usize> = val.iter().map(|&i| class_of(i)).collect();
        assert!(val_classes.len() > 1);

        assert_eq!(shuffled_holdout(&rows, 0.2, 42), (fit, val));
    }

    proptest! {
        #[test]
        fn split_partitions_every_class(
            counts in prop::collection::vec(2usize..25, 2..6),
            fraction in 0.05f64..0.95,
            seed in any::<u64>(),
        ) {
            let (y, codec) = labels(&counts);
            let split = stratified_split(&y, &codec, fraction, seed).unwrap();

            let train: BTreeSet<usize> = split.train.iter().copied().collect();
            let test: BTreeSet<usize> = split.test.iter().copied().collect();
            prop_assert!(train.is_disjoint(&test));
            prop_assert_eq!(train.len() + test.len(), y.len());
            prop_assert_eq!(split.train.len() + split.test.len(), y.len());

            for (class, &n) in counts.iter().enumerate() {
                let in_test = split.test.iter().filter(|&&i| y[i] == class).count();
                prop_assert!(in_test >= 1 && in_test < n);
                prop_assert!((in_test as f64 - n as f64 * fraction).abs() <= 1.0);
            }
        }
    }
}
