//! Feature column schema shared by training and inference.
//!
//! The order of [`FEATURE_COLUMNS`] is part of the artifact contract: a
//! consumer must build its feature vectors in exactly this order.

/// Number of features per sample
pub const FEATURE_DIM: usize = 6;

/// Ordered feature column names
pub const FEATURE_COLUMNS: [&str; FEATURE_DIM] = [
    "eyebrow_raise",
    "mouth_open",
    "head_tilt",
    "head_nod",
    "head_shake",
    "shoulder_lean",
];

/// Name of the column holding the symbolic label
pub const LABEL_COLUMN: &str = "label";

/// Owned copy of the feature column names, as stored in bundles
pub fn feature_names() -> Vec<String> {
    FEATURE_COLUMNS.iter().map(|name| (*name).to_string()).collect()
}

/// Index of the highest probability; the lowest index wins ties
pub fn argmax(values: &[f32]) -> usize {
    let mut best = 0usize;
    let mut best_val = f32::NEG_INFINITY;
    for (idx, &v) in values.iter().enumerate() {
        if v > best_val {
            best_val = v;
            best = idx;
        }
    }
    best
}

/// Numerically stable softmax
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    if logits.is_empty() {
        return Vec::new();
    }
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum == 0.0 || !sum.is_finite() {
        return vec![1.0 / logits.len() as f32; logits.len()];
    }
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_names_match_columns() {
        let names = feature_names();
        assert_eq!(names.len(), FEATURE_DIM);
        assert_eq!(names[0], "eyebrow_raise");
        assert_eq!(names[5], "shoulder_lean");
    }

    #[test]
    fn test_argmax_prefers_lowest_index_on_tie() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), 1);
        assert_eq!(argmax(&[0.5, 0.5]), 0);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let out = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = out.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(out[2] > out[1] && out[1] > out[0]);
    }
}
