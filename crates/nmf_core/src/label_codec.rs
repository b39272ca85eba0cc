//! Bijective mapping between symbolic labels and class indices.
//!
//! The codec is fitted once per training run from the sorted set of distinct
//! labels and is persisted next to every exported model, so index `k` always
//! decodes to the same label regardless of which backend produced it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use crate::errors::{CoreError, Result};

/// Sorted, duplicate-free list of labels; the position is the class index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCodec {
    classes: Vec<String>,
}

impl LabelCodec {
    /// Build the codec from every label observed in the dataset.
    ///
    /// Row order does not matter: labels are deduplicated and sorted.
    pub fn fit<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let unique: BTreeSet<String> = labels
            .into_iter()
            .map(|label| label.as_ref().to_string())
            .collect();
        Self {
            classes: unique.into_iter().collect(),
        }
    }

    /// Rebuild a codec from an `index -> label` map.
    ///
    /// Keys must be exactly `0..n` and labels must be distinct.
    pub fn from_mapping(mapping: &BTreeMap<usize, String>) -> Result<Self> {
        let mut classes = Vec::with_capacity(mapping.len());
        for (expected, (&index, label)) in mapping.iter().enumerate() {
            if index != expected {
                return Err(CoreError::InvalidArtifact(format!(
                    "label mapping is not contiguous: expected index {expected}, found {index}"
                )));
            }
            classes.push(label.clone());
        }
        let codec = Self { classes };
        codec.validate()?;
        Ok(codec)
    }

    /// Check the bijection invariant
    pub fn validate(&self) -> Result<()> {
        let unique: BTreeSet<&str> = self.classes.iter().map(String::as_str).collect();
        if unique.len() != self.classes.len() {
            return Err(CoreError::InvalidArtifact(
                "label codec contains duplicate labels".to_string(),
            ));
        }
        Ok(())
    }

    pub fn encode(&self, label: &str) -> Result<usize> {
        self.classes
            .iter()
            .position(|class| class == label)
            .ok_or_else(|| CoreError::UnknownLabel(label.to_string()))
    }

    pub fn decode(&self, index: usize) -> Result<&str> {
        self.classes
            .get(index)
            .map(String::as_str)
            .ok_or(CoreError::IndexOutOfRange {
                index,
                len: self.classes.len(),
            })
    }

    /// Number of classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Labels in index order
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Ordered `index -> label` map
    pub fn to_mapping(&self) -> BTreeMap<usize, String> {
        self.classes.iter().cloned().enumerate().collect()
    }

    /// Render the mapping as pretty JSON with decimal string keys
    pub fn to_mapping_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_mapping())?)
    }

    pub fn from_mapping_json(json: &str) -> Result<Self> {
        let mapping: BTreeMap<usize, String> = serde_json::from_str(json)?;
        Self::from_mapping(&mapping)
    }

    /// Write the label mapping file consumed by non-Rust runtimes
    pub fn write_mapping<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_mapping_json()?)?;
        Ok(())
    }

    pub fn read_mapping<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_mapping_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fit_sorts_and_deduplicates() {
        let codec = LabelCodec::fit(["question", "affirmation", "question", "negation"]);
        assert_eq!(codec.classes(), &["affirmation", "negation", "question"]);
        assert_eq!(codec.encode("affirmation").unwrap(), 0);
        assert_eq!(codec.encode("question").unwrap(), 2);
    }

    #[test]
    fn test_fit_is_independent_of_row_order() {
        let a = LabelCodec::fit(["b", "a", "c"]);
        let b = LabelCodec::fit(["c", "c", "a", "b"]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_unknown_label() {
        let codec = LabelCodec::fit(["yes", "no"]);
        let err = codec.encode("maybe").unwrap_err();
        assert!(matches!(err, CoreError::UnknownLabel(label) if label == "maybe"));
    }

    #[test]
    fn test_index_out_of_range() {
        let codec = LabelCodec::fit(["yes", "no"]);
        let err = codec.decode(2).unwrap_err();
        assert!(matches!(err, CoreError::IndexOutOfRange { index: 2, len: 2 }));
    }

    #[test]
    fn test_mapping_json_uses_string_keys() {
        let codec = LabelCodec::fit(["question", "affirmation"]);
        let json = codec.to_mapping_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["0"], "affirmation");
        assert_eq!(value["1"], "question");

        let restored = LabelCodec::from_mapping_json(&json).unwrap();
        assert_eq!(restored, codec);
    }

    #[test]
    fn test_mapping_file_orders_keys_numerically() {
        let labels: Vec<String> = (0..12).map(|i| format!("label_{i:02}")).collect();
        let codec = LabelCodec::fit(&labels);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("label_mapping.json");
        codec.write_mapping(&path).unwrap();

        let restored = LabelCodec::read_mapping(&path).unwrap();
        assert_eq!(restored, codec);
        assert_eq!(restored.decode(10).unwrap(), "label_10");
    }

    #[test]
    fn test_from_mapping_rejects_gaps() {
        let mut mapping = BTreeMap::new();
        mapping.insert(0, "a".to_string());
        mapping.insert(2, "b".to_string());
        assert!(matches!(
            LabelCodec::from_mapping(&mapping),
            Err(CoreError::InvalidArtifact(_))
        ));
    }

    #[test]
    fn test_from_mapping_rejects_duplicates() {
        let mut mapping = BTreeMap::new();
        mapping.insert(0, "a".to_string());
        mapping.insert(1, "a".to_string());
        assert!(LabelCodec::from_mapping(&mapping).is_err());
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(labels in prop::collection::vec("[a-z]{1,8}", 1..20)) {
            let codec = LabelCodec::fit(&labels);
            for label in &labels {
                let index = codec.encode(label).unwrap();
                prop_assert_eq!(codec.decode(index).unwrap(), label.as_str());
            }
        }
    }
}
