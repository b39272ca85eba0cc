//! Feed-forward network trainer
//!
//! Dense ReLU hidden layers, dropout after the first hidden layer and a
//! softmax output, trained with Adam on sparse categorical cross-entropy.
//! The backend sits behind the `neural` cargo feature; [`probe_backend`]
//! is the single availability check the pipeline performs.

use signaura_nmf_core::features::argmax;
use signaura_nmf_core::{Classifier, NetworkModel};

use crate::config::NeuralSettings;
use crate::dataset::EncodedDataset;
use crate::errors::{Result, TrainerError};

#[cfg(feature = "neural")]
use rand::{rngs::StdRng, seq::SliceRandom, Rng};
#[cfg(feature = "neural")]
use signaura_nmf_core::{Activation, DenseLayer, Layer};
#[cfg(feature = "neural")]
use tracing::debug;

#[cfg(feature = "neural")]
use crate::deterministic::{stream_rng, Stream};

#[cfg(feature = "neural")]
const ADAM_BETA1: f32 = 0.9;
#[cfg(feature = "neural")]
const ADAM_BETA2: f32 = 0.999;
#[cfg(feature = "neural")]
const ADAM_EPSILON: f32 = 1e-7;
const PROB_FLOOR: f32 = 1e-7;

/// Check whether the network backend can be used for this run
pub fn probe_backend(settings: &NeuralSettings, seed: u64) -> Result<NeuralBackend> {
    if !cfg!(feature = "neural") {
        return Err(TrainerError::BackendUnavailable(
            "built without the `neural` feature".to_string(),
        ));
    }
    if !settings.enabled {
        return Err(TrainerError::BackendUnavailable(
            "disabled by configuration".to_string(),
        ));
    }
    Ok(NeuralBackend {
        settings: settings.clone(),
        seed,
    })
}

/// Metrics recorded after one epoch
#[derive(Debug, Clone, PartialEq)]
pub struct EpochStats {
    pub epoch: usize,
    pub loss: f32,
    pub accuracy: f32,
    pub val_loss: Option<f32>,
    pub val_accuracy: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochStats>,
}

impl TrainingHistory {
    pub fn last(&self) -> Option<&EpochStats> {
        self.epochs.last()
    }
}

/// Available network backend
#[derive(Debug, Clone)]
pub struct NeuralBackend {
    settings: NeuralSettings,
    #[cfg_attr(not(feature = "neural"), allow(dead_code))]
    seed: u64,
}

/// Adam moments for one dense layer
#[cfg(feature = "neural")]
struct AdamSlot {
    m_w: Vec<f32>,
    v_w: Vec<f32>,
    m_b: Vec<f32>,
    v_b: Vec<f32>,
}

#[cfg(feature = "neural")]
impl AdamSlot {
    fn new(layer: &DenseLayer) -> Self {
        Self {
            m_w: vec![0.0; layer.weights.len()],
            v_w: vec![0.0; layer.weights.len()],
            m_b: vec![0.0; layer.bias.len()],
            v_b: vec![0.0; layer.bias.len()],
        }
    }
}

#[cfg(feature = "neural")]
fn adam_update(params: &mut [f32], grads: &[f32], m: &mut [f32], v: &mut [f32], lr_t: f32) {
    for i in 0..params.len() {
        let g = grads[i];
        m[i] = ADAM_BETA1 * m[i] + (1.0 - ADAM_BETA1) * g;
        v[i] = ADAM_BETA2 * v[i] + (1.0 - ADAM_BETA2) * g * g;
        params[i] -= lr_t * m[i] / (v[i].sqrt() + ADAM_EPSILON);
    }
}

/// Gradient accumulator matching a dense layer's shapes
#[cfg(feature = "neural")]
struct LayerGrad {
    w: Vec<f32>,
    b: Vec<f32>,
}

/// Forward-pass state kept for backpropagation
#[cfg(feature = "neural")]
struct Trace {
    /// Input to each dense layer, then the final probabilities
    activations: Vec<Vec<f32>>,
    /// Pre-activation outputs per dense layer
    pre: Vec<Vec<f32>>,
    /// Scaled dropout masks per dense layer (empty when no dropout follows)
    masks: Vec<Vec<f32>>,
}

impl NeuralBackend {
    pub fn settings(&self) -> &NeuralSettings {
        &self.settings
    }

    /// Without the `neural` feature no backend is ever probed successfully
    #[cfg(not(feature = "neural"))]
    pub fn fit(
        &self,
        _train: &EncodedDataset,
        _validation: Option<&EncodedDataset>,
        _n_classes: usize,
    ) -> Result<(NetworkModel, TrainingHistory)> {
        Err(TrainerError::BackendUnavailable(
            "built without the `neural` feature".to_string(),
        ))
    }

    /// Train on `train`, reporting metrics on `validation` when present
    #[cfg(feature = "neural")]
    pub fn fit(
        &self,
        train: &EncodedDataset,
        validation: Option<&EncodedDataset>,
        n_classes: usize,
    ) -> Result<(NetworkModel, TrainingHistory)> {
        if train.is_empty() {
            return Err(TrainerError::InsufficientData(
                "cannot fit a network on an empty partition".to_string(),
            ));
        }
        let input_dim = train.x[0].len();
        let mut rng = stream_rng(self.seed, Stream::Network);
        let (mut dense, dropout) = self.init_layers(input_dim, n_classes, &mut rng);
        let mut slots: Vec<AdamSlot> = dense.iter().map(AdamSlot::new).collect();

        let lr = self.settings.learning_rate;
        let batch_size = self.settings.batch_size.max(1);
        let mut history = TrainingHistory::default();
        let mut order: Vec<usize> = (0..train.len()).collect();
        let mut step = 0i32;

        for epoch in 1..=self.settings.epochs {
            order.shuffle(&mut rng);
            let mut loss_sum = 0.0f32;
            let mut correct = 0usize;

            for batch in order.chunks(batch_size) {
                let mut grads: Vec<LayerGrad> = dense
                    .iter()
                    .map(|l| LayerGrad {
                        w: vec![0.0; l.weights.len()],
                        b: vec![0.0; l.bias.len()],
                    })
                    .collect();

                for &idx in batch {
                    let target = train.y[idx];
                    let trace = forward_train(&dense, &dropout, &train.x[idx], &mut rng);
                    let probs = &trace.activations[dense.len()];
                    loss_sum += -probs[target].max(PROB_FLOOR).ln();
                    if argmax(probs) == target {
                        correct += 1;
                    }
                    backward(&dense, &trace, target, &mut grads);
                }

                step += 1;
                let lr_t = lr * (1.0 - ADAM_BETA2.powi(step)).sqrt() / (1.0 - ADAM_BETA1.powi(step));
                let inv = 1.0 / batch.len() as f32;
                for ((layer, grad), slot) in dense.iter_mut().zip(&mut grads).zip(&mut slots) {
                    grad.w.iter_mut().for_each(|g| *g *= inv);
                    grad.b.iter_mut().for_each(|g| *g *= inv);
                    adam_update(&mut layer.weights, &grad.w, &mut slot.m_w, &mut slot.v_w, lr_t);
                    adam_update(&mut layer.bias, &grad.b, &mut slot.m_b, &mut slot.v_b, lr_t);
                }
            }

            let loss = loss_sum / train.len() as f32;
            if !loss.is_finite() {
                return Err(TrainerError::Training(format!(
                    "network loss diverged at epoch {}",
                    epoch
                )));
            }

            let (val_loss, val_accuracy) = match validation.filter(|v| !v.is_empty()) {
                Some(val) => {
                    let model = assemble(input_dim, &dense, &dropout);
                    let (l, a) = evaluate_network(&model, val)?;
                    (Some(l), Some(a))
                }
                None => (None, None),
            };

            let stats = EpochStats {
                epoch,
                loss,
                accuracy: correct as f32 / train.len() as f32,
                val_loss,
                val_accuracy,
            };
            debug!(
                "epoch {}/{} loss={:.4} acc={:.4} val_loss={:?} val_acc={:?}",
                epoch, self.settings.epochs, stats.loss, stats.accuracy, stats.val_loss, stats.val_accuracy
            );
            history.epochs.push(stats);
        }

        let model = assemble(input_dim, &dense, &dropout);
        model.validate()?;
        Ok((model, history))
    }

    /// Glorot-uniform kernels, zero biases
    #[cfg(feature = "neural")]
    fn init_layers(
        &self,
        input_dim: usize,
        n_classes: usize,
        rng: &mut StdRng,
    ) -> (Vec<DenseLayer>, Vec<f32>) {
        let mut widths: Vec<(usize, Activation)> = self
            .settings
            .hidden_units
            .iter()
            .map(|&u| (u, Activation::Relu))
            .collect();
        widths.push((n_classes, Activation::Softmax));

        let mut layers = Vec::with_capacity(widths.len());
        let mut dropout = vec![0.0f32; widths.len()];
        let mut fan_in = input_dim;
        for (i, (units, activation)) in widths.into_iter().enumerate() {
            let limit = (6.0 / (fan_in + units) as f32).sqrt();
            let weights = (0..units * fan_in)
                .map(|_| rng.gen_range(-limit..limit))
                .collect();
            layers.push(DenseLayer {
                input_dim: fan_in,
                units,
                activation,
                weights,
                bias: vec![0.0; units],
            });
            if i == 0 && activation == Activation::Relu {
                dropout[i] = self.settings.dropout;
            }
            fan_in = units;
        }
        (layers, dropout)
    }
}

#[cfg(feature = "neural")]
fn forward_train(dense: &[DenseLayer], dropout: &[f32], x: &[f32], rng: &mut StdRng) -> Trace {
    let mut activations = Vec::with_capacity(dense.len() + 1);
    let mut pre = Vec::with_capacity(dense.len());
    let mut masks = Vec::with_capacity(dense.len());
    activations.push(x.to_vec());

    for (layer, &rate) in dense.iter().zip(dropout) {
        let input = activations.last().map(Vec::as_slice).unwrap_or(&[]);
        let z = layer.linear(input);
        let mut a = z.clone();
        layer.activation.apply(&mut a);

        let mask = if rate > 0.0 {
            let keep_scale = 1.0 / (1.0 - rate);
            let mask: Vec<f32> = (0..a.len())
                .map(|_| if rng.gen::<f32>() >= rate { keep_scale } else { 0.0 })
                .collect();
            a.iter_mut().zip(&mask).for_each(|(v, m)| *v *= m);
            mask
        } else {
            Vec::new()
        };

        pre.push(z);
        masks.push(mask);
        activations.push(a);
    }

    Trace {
        activations,
        pre,
        masks,
    }
}

#[cfg(feature = "neural")]
fn backward(dense: &[DenseLayer], trace: &Trace, target: usize, grads: &mut [LayerGrad]) {
    let last = dense.len() - 1;
    // Softmax + cross-entropy gradient w.r.t. the output logits.
    let mut delta: Vec<f32> = trace.activations[dense.len()]
        .iter()
        .enumerate()
        .map(|(c, &p)| p - if c == target { 1.0 } else { 0.0 })
        .collect();

    for l in (0..=last).rev() {
        let layer = &dense[l];
        let input = &trace.activations[l];
        for u in 0..layer.units {
            let base = u * layer.input_dim;
            for i in 0..layer.input_dim {
                grads[l].w[base + i] += delta[u] * input[i];
            }
            grads[l].b[u] += delta[u];
        }

        if l == 0 {
            break;
        }

        let mut prev = vec![0.0f32; layer.input_dim];
        for u in 0..layer.units {
            let base = u * layer.input_dim;
            for i in 0..layer.input_dim {
                prev[i] += layer.weights[base + i] * delta[u];
            }
        }
        let mask = &trace.masks[l - 1];
        if !mask.is_empty() {
            prev.iter_mut().zip(mask).for_each(|(d, m)| *d *= m);
        }
        if dense[l - 1].activation == Activation::Relu {
            prev.iter_mut()
                .zip(&trace.pre[l - 1])
                .for_each(|(d, &z)| {
                    if z <= 0.0 {
                        *d = 0.0;
                    }
                });
        }
        delta = prev;
    }
}

#[cfg(feature = "neural")]
fn assemble(input_dim: usize, dense: &[DenseLayer], dropout: &[f32]) -> NetworkModel {
    let mut layers = Vec::with_capacity(dense.len() + 1);
    for (layer, &rate) in dense.iter().zip(dropout) {
        layers.push(Layer::Dense(layer.clone()));
        if rate > 0.0 {
            layers.push(Layer::Dropout { rate });
        }
    }
    NetworkModel { input_dim, layers }
}

/// Mean cross-entropy and accuracy of `model` on `data` (inference mode)
pub fn evaluate_network(model: &NetworkModel, data: &EncodedDataset) -> Result<(f32, f32)> {
    if data.is_empty() {
        return Ok((0.0, 0.0));
    }
    let mut loss = 0.0f32;
    let mut correct = 0usize;
    for (x, &y) in data.x.iter().zip(&data.y) {
        let probs = model.predict_proba(x)?;
        loss += -probs[y].max(PROB_FLOOR).ln();
        if argmax(&probs) == y {
            correct += 1;
        }
    }
    let n = data.len() as f32;
    Ok((loss / n, correct as f32 / n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "neural")]
    fn toy_data(n: usize) -> EncodedDataset {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..n {
            let class = i % 3;
            let mut row = vec![0.0f32; 6];
            row[class * 2] = 1.0;
            x.push(row);
            y.push(class);
        }
        EncodedDataset { x, y }
    }

    #[cfg(feature = "neural")]
    fn settings(epochs: usize) -> NeuralSettings {
        NeuralSettings {
            epochs,
            learning_rate: 0.01,
            ..Default::default()
        }
    }

    #[cfg(not(feature = "neural"))]
    #[test]
    fn test_probe_fails_without_feature() {
        let err = probe_backend(&NeuralSettings::default(), 42).unwrap_err();
        assert!(matches!(err, TrainerError::BackendUnavailable(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_probe_respects_config() {
        let disabled = NeuralSettings {
            enabled: false,
            ..Default::default()
        };
        let err = probe_backend(&disabled, 42).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[cfg(feature = "neural")]
    #[test]
    fn test_architecture() {
        let backend = probe_backend(&settings(1), 42).unwrap();
        let (model, history) = backend.fit(&toy_data(12), None, 3).unwrap();

        assert_eq!(history.epochs.len(), 1);
        assert_eq!(model.input_dim, 6);
        let kinds: Vec<String> = model
            .layers
            .iter()
            .map(|l| match l {
                Layer::Dense(d) => format!("dense{}:{}", d.units, d.activation.as_str()),
                Layer::Dropout { rate } => format!("dropout{}", rate),
            })
            .collect();
        assert_eq!(kinds, vec!["dense16:relu", "dropout0.3", "dense8:relu", "dense3:softmax"]);
        assert!(model.dense_layers().all(|d| d.bias.len() == d.units));
    }

    #[cfg(feature = "neural")]
    #[test]
    fn test_learns_and_records_history() {
        let backend = probe_backend(&settings(100), 42).unwrap();
        let train = toy_data(30);
        let val = toy_data(9);
        let (model, history) = backend.fit(&train, Some(&val), 3).unwrap();

        let first = &history.epochs[0];
        let last = history.last().unwrap();
        assert!(last.loss < first.loss);
        assert!(last.val_loss.is_some());

        let (_, accuracy) = evaluate_network(&model, &val).unwrap();
        assert_eq!(accuracy, 1.0);
    }

    #[cfg(feature = "neural")]
    #[test]
    fn test_seeded_training_is_deterministic() {
        let backend = probe_backend(&settings(3), 5).unwrap();
        let data = toy_data(12);
        let (a, _) = backend.fit(&data, None, 3).unwrap();
        let (b, _) = backend.fit(&data, None, 3).unwrap();
        assert_eq!(a, b);
    }
}
