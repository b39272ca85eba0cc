//! Test-set evaluation
//!
//! Accuracy, per-class precision/recall/F1 with macro and weighted
//! averages, a confusion matrix, and the model's feature importances in
//! feature column order.

use signaura_nmf_core::{Classifier, CoreError, LabelCodec};
use std::fmt;

use crate::dataset::EncodedDataset;
use crate::errors::Result;

/// Row-major `K×K` counts, `truth * K + predicted`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub n_classes: usize,
    pub counts: Vec<u32>,
}

impl ConfusionMatrix {
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            counts: vec![0; n_classes * n_classes],
        }
    }

    pub fn add(&mut self, truth: usize, predicted: usize) {
        if truth >= self.n_classes || predicted >= self.n_classes {
            return;
        }
        let idx = truth * self.n_classes + predicted;
        self.counts[idx] = self.counts[idx].saturating_add(1);
    }

    pub fn get(&self, truth: usize, predicted: usize) -> u32 {
        self.counts[truth * self.n_classes + predicted]
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }

    pub fn correct(&self) -> u32 {
        (0..self.n_classes).map(|c| self.get(c, c)).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureImportance {
    pub feature: String,
    pub score: f64,
}

/// Evaluation of one classifier on the test partition
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub per_class: Vec<ClassMetrics>,
    pub macro_avg: AverageMetrics,
    pub weighted_avg: AverageMetrics,
    pub confusion: ConfusionMatrix,
    /// Present only for models that track split usage
    pub feature_importances: Option<Vec<FeatureImportance>>,
}

fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Score `model` on `data`; class names come from `codec`
pub fn evaluate<M: Classifier + ?Sized>(
    model: &M,
    data: &EncodedDataset,
    codec: &LabelCodec,
    feature_names: &[String],
) -> Result<EvaluationReport> {
    let k = codec.len();
    let mut confusion = ConfusionMatrix::new(k);
    for (x, &truth) in data.x.iter().zip(&data.y) {
        confusion.add(truth, model.predict(x)?);
    }

    let mut per_class = Vec::with_capacity(k);
    for class in 0..k {
        let tp = confusion.get(class, class) as f64;
        let support: u32 = (0..k).map(|p| confusion.get(class, p)).sum();
        let predicted: u32 = (0..k).map(|t| confusion.get(t, class)).sum();
        let precision = ratio(tp, predicted as f64);
        let recall = ratio(tp, support as f64);
        per_class.push(ClassMetrics {
            label: codec.decode(class)?.to_string(),
            precision,
            recall,
            f1: ratio(2.0 * precision * recall, precision + recall),
            support,
        });
    }

    let total = confusion.total() as f64;
    let macro_avg = AverageMetrics {
        precision: ratio(per_class.iter().map(|c| c.precision).sum(), k as f64),
        recall: ratio(per_class.iter().map(|c| c.recall).sum(), k as f64),
        f1: ratio(per_class.iter().map(|c| c.f1).sum(), k as f64),
    };
    let weighted = |f: fn(&ClassMetrics) -> f64| {
        ratio(
            per_class.iter().map(|c| f(c) * c.support as f64).sum(),
            total,
        )
    };
    let weighted_avg = AverageMetrics {
        precision: weighted(|c| c.precision),
        recall: weighted(|c| c.recall),
        f1: weighted(|c| c.f1),
    };

    let feature_importances = match model.feature_importances() {
        Some(scores) if scores.len() != feature_names.len() => {
            return Err(CoreError::FeatureDimension {
                expected: feature_names.len(),
                got: scores.len(),
            }
            .into());
        }
        Some(scores) => Some(
            feature_names
                .iter()
                .zip(scores)
                .map(|(name, &score)| FeatureImportance {
                    feature: name.clone(),
                    score,
                })
                .collect(),
        ),
        None => None,
    };

    Ok(EvaluationReport {
        accuracy: ratio(confusion.correct() as f64, total),
        per_class,
        macro_avg,
        weighted_avg,
        confusion,
        feature_importances,
    })
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .per_class
            .iter()
            .map(|c| c.label.len())
            .chain(["weighted avg".len()])
            .max()
            .unwrap_or(12);
        let support = self.confusion.total();

        writeln!(
            f,
            "{:>width$}  {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for c in &self.per_class {
            writeln!(
                f,
                "{:>width$}  {:>9.2} {:>9.2} {:>9.2} {:>9}",
                c.label, c.precision, c.recall, c.f1, c.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$}  {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, support
        )?;
        for (name, avg) in [("macro avg", self.macro_avg), ("weighted avg", self.weighted_avg)] {
            writeln!(
                f,
                "{:>width$}  {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, avg.precision, avg.recall, avg.f1, support
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TrainerError;

    /// Predicts class 1 iff feature 0 is above 0.5
    struct Threshold {
        importances: Option<Vec<f64>>,
    }

    impl Classifier for Threshold {
        fn n_classes(&self) -> usize {
            2
        }
        fn n_features(&self) -> usize {
            2
        }
        fn predict_proba(&self, features: &[f32]) -> signaura_nmf_core::Result<Vec<f32>> {
            Ok(if features[0] > 0.5 {
                vec![0.0, 1.0]
            } else {
                vec![1.0, 0.0]
            })
        }
        fn feature_importances(&self) -> Option<&[f64]> {
            self.importances.as_deref()
        }
    }

    /// Always predicts class 0
    struct Constant;

    impl Classifier for Constant {
        fn n_classes(&self) -> usize {
            3
        }
        fn n_features(&self) -> usize {
            1
        }
        fn predict_proba(&self, _features: &[f32]) -> signaura_nmf_core::Result<Vec<f32>> {
            Ok(vec![0.5, 0.25, 0.25])
        }
    }

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("f{i}")).collect()
    }

    #[test]
    fn test_perfect_separation() {
        let codec = LabelCodec::fit(["no", "yes"]);
        let data = EncodedDataset {
            x: vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![0.2, 0.0], vec![0.9, 1.0]],
            y: vec![0, 1, 0, 1],
        };
        let model = Threshold {
            importances: Some(vec![0.75, 0.25]),
        };
        let report = evaluate(&model, &data, &codec, &names(2)).unwrap();

        assert_eq!(report.accuracy, 1.0);
        for class in &report.per_class {
            assert_eq!(class.precision, 1.0);
            assert_eq!(class.recall, 1.0);
            assert_eq!(class.f1, 1.0);
            assert_eq!(class.support, 2);
        }
        assert_eq!(report.macro_avg.f1, 1.0);
        let importances = report.feature_importances.unwrap();
        assert_eq!(importances[0].feature, "f0");
        assert_eq!(importances[1].score, 0.25);
    }

    #[test]
    fn test_importance_names_must_match() {
        let codec = LabelCodec::fit(["no", "yes"]);
        let data = EncodedDataset {
            x: vec![vec![0.0, 1.0], vec![1.0, 0.0]],
            y: vec![0, 1],
        };
        let model = Threshold {
            importances: Some(vec![0.5, 0.3, 0.2]),
        };
        let err = evaluate(&model, &data, &codec, &names(2)).unwrap_err();
        assert!(matches!(
            err,
            TrainerError::Core(CoreError::FeatureDimension {
                expected: 2,
                got: 3
            })
        ));
    }

    #[test]
    fn test_unpredicted_class_scores_zero() {
        let codec = LabelCodec::fit(["a", "b", "c"]);
        let data = EncodedDataset {
            x: vec![vec![0.0]; 4],
            y: vec![0, 0, 1, 2],
        };
        let report = evaluate(&Constant, &data, &codec, &names(1)).unwrap();

        assert_eq!(report.accuracy, 0.5);
        assert_eq!(report.per_class[0].precision, 0.5);
        assert_eq!(report.per_class[0].recall, 1.0);
        assert_eq!(report.per_class[1].precision, 0.0);
        assert_eq!(report.per_class[1].f1, 0.0);
        assert_eq!(report.confusion.get(2, 0), 1);
        assert!(report.feature_importances.is_none());
        assert!((report.weighted_avg.recall - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_test_set() {
        let codec = LabelCodec::fit(["a", "b"]);
        let data = EncodedDataset {
            x: Vec::new(),
            y: Vec::new(),
        };
        let model = Threshold { importances: None };
        let report = evaluate(&model, &data, &codec, &names(2)).unwrap();
        assert_eq!(report.accuracy, 0.0);
        assert_eq!(report.macro_avg, AverageMetrics::default());
    }

    #[test]
    fn test_report_table() {
        let codec = LabelCodec::fit(["affirmation", "negation"]);
        let data = EncodedDataset {
            x: vec![vec![0.0, 0.0], vec![1.0, 0.0]],
            y: vec![0, 1],
        };
        let model = Threshold { importances: None };
        let table = evaluate(&model, &data, &codec, &names(2)).unwrap().to_string();
        assert!(table.contains("precision"));
        assert!(table.contains("affirmation"));
        assert!(table.contains("weighted avg"));
        assert!(table.lines().any(|l| l.trim_start().starts_with("accuracy")));
    }
}
