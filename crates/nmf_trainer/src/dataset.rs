//! CSV dataset loading
//!
//! Reads a headered CSV with the six NMF feature columns and a `label`
//! column. Columns are matched by name, so extra columns (timestamps,
//! annotator ids) are ignored and column order does not matter.

use signaura_nmf_core::{LabelCodec, FEATURE_COLUMNS, LABEL_COLUMN};
use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::{Result, TrainerError};

/// One labelled row
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    pub features: Vec<f32>,
    pub label: String,
}

/// Per-feature summary used for the run log
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureStats {
    pub name: String,
    pub min: f32,
    pub max: f32,
    pub mean: f32,
}

/// Loaded dataset in file order
#[derive(Clone, Debug)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    pub samples: Vec<Sample>,
}

/// Feature matrix and encoded targets, row-aligned with the dataset
#[derive(Clone, Debug)]
pub struct EncodedDataset {
    pub x: Vec<Vec<f32>>,
    pub y: Vec<usize>,
}

impl EncodedDataset {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Rows selected by `indices`, in that order
    pub fn subset(&self, indices: &[usize]) -> EncodedDataset {
        EncodedDataset {
            x: indices.iter().map(|&i| self.x[i].clone()).collect(),
            y: indices.iter().map(|&i| self.y[i]).collect(),
        }
    }
}

impl Dataset {
    /// Load the standard NMF training file
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_csv_with_columns(path, &FEATURE_COLUMNS, LABEL_COLUMN)
    }

    /// Load a CSV using an explicit feature column order and label column
    pub fn from_csv_with_columns<P: AsRef<Path>>(
        path: P,
        feature_columns: &[&str],
        label_column: &str,
    ) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| TrainerError::DataLoad(format!("cannot open {}: {}", path.display(), e)))?;

        let headers = reader
            .headers()
            .map_err(|e| TrainerError::DataLoad(format!("cannot read header: {}", e)))?
            .clone();
        let column_index = |name: &str| -> Result<usize> {
            headers.iter().position(|h| h == name).ok_or_else(|| {
                TrainerError::DataLoad(format!("missing required column {:?}", name))
            })
        };
        let feature_idx = feature_columns
            .iter()
            .map(|&name| column_index(name))
            .collect::<Result<Vec<usize>>>()?;
        let label_idx = column_index(label_column)?;

        let mut samples = Vec::new();
        for (row_idx, record) in reader.records().enumerate() {
            // Data starts on line 2, after the header.
            let line = row_idx + 2;
            let record =
                record.map_err(|e| TrainerError::DataLoad(format!("line {}: {}", line, e)))?;

            let mut features = Vec::with_capacity(feature_idx.len());
            for (&col, name) in feature_idx.iter().zip(feature_columns) {
                let raw = record.get(col).unwrap_or("");
                if raw.is_empty() {
                    return Err(TrainerError::DataLoad(format!(
                        "line {}: missing value for {}",
                        line, name
                    )));
                }
                let value: f32 = raw.parse().map_err(|_| {
                    TrainerError::DataLoad(format!("line {}: invalid {} value {:?}", line, name, raw))
                })?;
                if !value.is_finite() {
                    return Err(TrainerError::DataLoad(format!(
                        "line {}: non-finite {} value",
                        line, name
                    )));
                }
                features.push(value);
            }

            let label = record.get(label_idx).unwrap_or("");
            if label.is_empty() {
                return Err(TrainerError::DataLoad(format!("line {}: missing label", line)));
            }

            samples.push(Sample {
                features,
                label: label.to_string(),
            });
        }

        if samples.is_empty() {
            return Err(TrainerError::DataLoad(format!(
                "{} contains no data rows",
                path.display()
            )));
        }

        let dataset = Self {
            feature_names: feature_columns.iter().map(|s| s.to_string()).collect(),
            samples,
        };

        let classes = dataset.class_distribution().len();
        if classes < 2 {
            return Err(TrainerError::InsufficientData(format!(
                "label column has {} distinct value(s), at least 2 are required",
                classes
            )));
        }

        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn feature_count(&self) -> usize {
        self.feature_names.len()
    }

    /// Sample count per label, ordered by label
    pub fn class_distribution(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for sample in &self.samples {
            *counts.entry(sample.label.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Fit the label codec on every label in the file
    pub fn fit_codec(&self) -> LabelCodec {
        LabelCodec::fit(self.samples.iter().map(|s| s.label.as_str()))
    }

    /// Encode labels through `codec`
    pub fn encode(&self, codec: &LabelCodec) -> Result<EncodedDataset> {
        let mut x = Vec::with_capacity(self.len());
        let mut y = Vec::with_capacity(self.len());
        for sample in &self.samples {
            x.push(sample.features.clone());
            y.push(codec.encode(&sample.label)?);
        }
        Ok(EncodedDataset { x, y })
    }

    /// Min / max / mean per feature column
    pub fn feature_stats(&self) -> Vec<FeatureStats> {
        let n = self.len().max(1) as f32;
        self.feature_names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let mut min = f32::INFINITY;
                let mut max = f32::NEG_INFINITY;
                let mut sum = 0.0f32;
                for sample in &self.samples {
                    let v = sample.features[i];
                    min = min.min(v);
                    max = max.max(v);
                    sum += v;
                }
                FeatureStats {
                    name: name.clone(),
                    min,
                    max,
                    mean: sum / n,
                }
            })
            .collect()
    }
}
