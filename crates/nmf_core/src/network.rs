//! Feed-forward network built from dense and dropout layers.
//!
//! Dropout only matters while training; inference treats it as identity.

use serde::{Deserialize, Serialize};

use crate::classifier::{check_dimension, Classifier};
use crate::errors::{CoreError, Result};
use crate::features::softmax;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Linear,
    Relu,
    Softmax,
}

impl Activation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Activation::Linear => "linear",
            Activation::Relu => "relu",
            Activation::Softmax => "softmax",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "linear" => Some(Activation::Linear),
            "relu" => Some(Activation::Relu),
            "softmax" => Some(Activation::Softmax),
            _ => None,
        }
    }

    /// Apply the activation to a full layer output
    pub fn apply(&self, values: &mut Vec<f32>) {
        match self {
            Activation::Linear => {}
            Activation::Relu => {
                for v in values.iter_mut() {
                    *v = v.max(0.0);
                }
            }
            Activation::Softmax => *values = softmax(values),
        }
    }
}

/// Fully connected layer; `weights` is row-major `[unit][input]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub input_dim: usize,
    pub units: usize,
    pub activation: Activation,
    pub weights: Vec<f32>,
    pub bias: Vec<f32>,
}

impl DenseLayer {
    /// Pre-activation output `W·x + b`
    pub fn linear(&self, input: &[f32]) -> Vec<f32> {
        (0..self.units)
            .map(|u| {
                let row = &self.weights[u * self.input_dim..(u + 1) * self.input_dim];
                self.bias[u] + row.iter().zip(input).map(|(w, x)| w * x).sum::<f32>()
            })
            .collect()
    }

    pub fn forward(&self, input: &[f32]) -> Vec<f32> {
        let mut out = self.linear(input);
        self.activation.apply(&mut out);
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Layer {
    Dense(DenseLayer),
    Dropout { rate: f32 },
}

/// Sequential classifier network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkModel {
    pub input_dim: usize,
    pub layers: Vec<Layer>,
}

impl NetworkModel {
    pub fn dense_layers(&self) -> impl Iterator<Item = &DenseLayer> {
        self.layers.iter().filter_map(|layer| match layer {
            Layer::Dense(dense) => Some(dense),
            Layer::Dropout { .. } => None,
        })
    }

    /// Check layer chaining and that the network ends in a softmax
    pub fn validate(&self) -> Result<()> {
        let mut width = self.input_dim;
        let mut last_activation = None;
        for (i, layer) in self.layers.iter().enumerate() {
            match layer {
                Layer::Dense(dense) => {
                    if dense.input_dim != width {
                        return Err(CoreError::InvalidModel(format!(
                            "layer {} expects {} inputs, previous layer has {}",
                            i, dense.input_dim, width
                        )));
                    }
                    if dense.weights.len() != dense.units * dense.input_dim
                        || dense.bias.len() != dense.units
                    {
                        return Err(CoreError::InvalidModel(format!(
                            "layer {} parameter shape mismatch",
                            i
                        )));
                    }
                    width = dense.units;
                    last_activation = Some(dense.activation);
                }
                Layer::Dropout { rate } => {
                    if !(0.0..1.0).contains(rate) {
                        return Err(CoreError::InvalidModel(format!(
                            "layer {} dropout rate {} outside [0, 1)",
                            i, rate
                        )));
                    }
                }
            }
        }
        if last_activation != Some(Activation::Softmax) {
            return Err(CoreError::InvalidModel(
                "network must end in a softmax dense layer".to_string(),
            ));
        }
        if width < 2 {
            return Err(CoreError::InvalidModel(format!(
                "network needs at least 2 outputs, has {}",
                width
            )));
        }
        Ok(())
    }
}

impl Classifier for NetworkModel {
    fn n_classes(&self) -> usize {
        self.dense_layers().last().map_or(0, |dense| dense.units)
    }

    fn n_features(&self) -> usize {
        self.input_dim
    }

    fn predict_proba(&self, features: &[f32]) -> Result<Vec<f32>> {
        check_dimension(features, self.input_dim)?;
        let mut activations = features.to_vec();
        for dense in self.dense_layers() {
            activations = dense.forward(&activations);
        }
        Ok(activations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_network() -> NetworkModel {
        NetworkModel {
            input_dim: 2,
            layers: vec![
                Layer::Dense(DenseLayer {
                    input_dim: 2,
                    units: 2,
                    activation: Activation::Relu,
                    weights: vec![1.0, 0.0, 0.0, 1.0],
                    bias: vec![0.0, 0.0],
                }),
                Layer::Dropout { rate: 0.5 },
                Layer::Dense(DenseLayer {
                    input_dim: 2,
                    units: 2,
                    activation: Activation::Softmax,
                    weights: vec![4.0, 0.0, 0.0, 4.0],
                    bias: vec![0.0, 0.0],
                }),
            ],
        }
    }

    #[test]
    fn test_forward_ignores_dropout() {
        let net = tiny_network();
        net.validate().unwrap();
        let proba = net.predict_proba(&[1.0, 0.0]).unwrap();
        let sum: f32 = proba.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert_eq!(net.predict(&[1.0, 0.0]).unwrap(), 0);
        assert_eq!(net.predict(&[0.0, 1.0]).unwrap(), 1);
        assert_eq!(net.n_classes(), 2);
    }

    #[test]
    fn test_validate_requires_softmax_head() {
        let mut net = tiny_network();
        if let Some(Layer::Dense(last)) = net.layers.last_mut() {
            last.activation = Activation::Relu;
        }
        assert!(net.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_broken_chain() {
        let mut net = tiny_network();
        net.input_dim = 3;
        assert!(net.validate().is_err());
    }
}
