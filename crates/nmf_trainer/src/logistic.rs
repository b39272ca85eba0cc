//! Multinomial logistic regression trainer
//!
//! Full-batch gradient descent on the mean cross-entropy plus an L2 term
//! `||W||² / (2·C·n)`. Features are standardized first; the mean and
//! scale travel with the model.

use signaura_nmf_core::features::softmax;
use signaura_nmf_core::LogisticModel;
use tracing::{debug, info};

use crate::config::LogisticSettings;
use crate::dataset::EncodedDataset;
use crate::errors::{Result, TrainerError};

pub struct LogisticTrainer {
    settings: LogisticSettings,
}

impl LogisticTrainer {
    pub fn new(settings: LogisticSettings) -> Self {
        Self { settings }
    }

    pub fn fit(&self, data: &EncodedDataset, n_classes: usize) -> Result<LogisticModel> {
        if data.is_empty() {
            return Err(TrainerError::InsufficientData(
                "cannot fit logistic regression on an empty partition".to_string(),
            ));
        }
        let n = data.len();
        let d = data.x[0].len();
        let (feature_mean, feature_scale) = feature_mean_scale(&data.x, d);
        let x: Vec<Vec<f32>> = data
            .x
            .iter()
            .map(|row| {
                row.iter()
                    .zip(feature_mean.iter().zip(&feature_scale))
                    .map(|(&v, (&m, &s))| (v - m) / s)
                    .collect()
            })
            .collect();

        let mut weights = vec![0.0f32; n_classes * d];
        let mut bias = vec![0.0f32; n_classes];
        let lr = self.settings.learning_rate;
        let l2 = 1.0 / (self.settings.c * n as f32);
        let inv_n = 1.0 / n as f32;

        let mut iterations = 0;
        for iter in 0..self.settings.max_iter {
            iterations = iter + 1;
            let mut grad_w = vec![0.0f32; weights.len()];
            let mut grad_b = vec![0.0f32; n_classes];

            for (row, &target) in x.iter().zip(&data.y) {
                let logits: Vec<f32> = (0..n_classes)
                    .map(|c| {
                        let base = c * d;
                        bias[c] + (0..d).map(|i| weights[base + i] * row[i]).sum::<f32>()
                    })
                    .collect();
                let probs = softmax(&logits);
                for c in 0..n_classes {
                    let diff = probs[c] - if c == target { 1.0 } else { 0.0 };
                    let base = c * d;
                    for i in 0..d {
                        grad_w[base + i] += diff * row[i];
                    }
                    grad_b[c] += diff;
                }
            }

            let mut max_grad = 0.0f32;
            for (g, w) in grad_w.iter_mut().zip(&weights) {
                *g = *g * inv_n + l2 * w;
                max_grad = max_grad.max(g.abs());
            }
            for g in grad_b.iter_mut() {
                *g *= inv_n;
                max_grad = max_grad.max(g.abs());
            }

            for (w, g) in weights.iter_mut().zip(&grad_w) {
                *w -= lr * g;
            }
            for (b, g) in bias.iter_mut().zip(&grad_b) {
                *b -= lr * g;
            }

            if !max_grad.is_finite() {
                return Err(TrainerError::Training(
                    "logistic regression diverged".to_string(),
                ));
            }
            if max_grad < self.settings.tolerance {
                debug!("Converged after {} iterations", iterations);
                break;
            }
        }
        info!("Logistic regression finished after {} iterations", iterations);

        let model = LogisticModel {
            n_classes,
            n_features: d,
            weights,
            bias,
            feature_mean,
            feature_scale,
        };
        model.validate()?;
        Ok(model)
    }
}

/// Column mean and population standard deviation; zero spread maps to 1
fn feature_mean_scale(rows: &[Vec<f32>], d: usize) -> (Vec<f32>, Vec<f32>) {
    let n = rows.len().max(1) as f32;
    let mut mean = vec![0.0f32; d];
    for row in rows {
        for i in 0..d {
            mean[i] += row[i];
        }
    }
    mean.iter_mut().for_each(|m| *m /= n);

    let mut scale = vec![0.0f32; d];
    for row in rows {
        for i in 0..d {
            let diff = row[i] - mean[i];
            scale[i] += diff * diff;
        }
    }
    for s in &mut scale {
        *s = (*s / n).sqrt();
        if *s <= f32::EPSILON {
            *s = 1.0;
        }
    }
    (mean, scale)
}
