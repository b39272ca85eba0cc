//! Runtime-portable network export in the TensorFlow.js layers-model layout.
//!
//! A portable network is a directory with `model.json` (topology, weight
//! manifest and label metadata) and one binary shard of little-endian
//! float32 weights. Kernels are stored `[input, units]` as browser runtimes
//! expect; [`DenseLayer`] keeps them `[unit][input]`, so both directions
//! transpose.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use crate::errors::{CoreError, Result};
use crate::label_codec::LabelCodec;
use crate::network::{Activation, DenseLayer, Layer, NetworkModel};

/// Topology and manifest file name
pub const MODEL_JSON: &str = "model.json";

/// Weight shard file name
pub const WEIGHTS_SHARD: &str = "group1-shard1of1.bin";

const FORMAT: &str = "layers-model";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelJson {
    format: String,
    generated_by: String,
    #[serde(default)]
    converted_by: Option<String>,
    model_topology: Topology,
    weights_manifest: Vec<WeightGroup>,
    #[serde(default)]
    user_defined_metadata: Option<PortableMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Topology {
    class_name: String,
    config: SequentialConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SequentialConfig {
    name: String,
    layers: Vec<LayerSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LayerSpec {
    class_name: String,
    config: LayerConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LayerConfig {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    units: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    activation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    use_bias: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rate: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    batch_input_shape: Option<Vec<Option<usize>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dtype: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WeightGroup {
    paths: Vec<String>,
    weights: Vec<WeightSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WeightSpec {
    name: String,
    shape: Vec<usize>,
    dtype: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PortableMetadata {
    labels: BTreeMap<usize, String>,
    #[serde(default)]
    feature_names: Vec<String>,
}

/// Network plus the label mapping and feature order it was trained with
#[derive(Debug, Clone, PartialEq)]
pub struct PortableNetwork {
    pub network: NetworkModel,
    pub codec: LabelCodec,
    pub feature_names: Vec<String>,
}

impl PortableNetwork {
    pub fn new(network: NetworkModel, codec: LabelCodec, feature_names: Vec<String>) -> Result<Self> {
        network.validate()?;
        let outputs = network.dense_layers().last().map_or(0, |dense| dense.units);
        if outputs != codec.len() {
            return Err(CoreError::InvalidModel(format!(
                "network has {} outputs but codec has {} labels",
                outputs,
                codec.len()
            )));
        }
        Ok(Self {
            network,
            codec,
            feature_names,
        })
    }

    /// Render `model.json` and the weight shard
    pub fn render(&self, generated_by: &str) -> Result<(String, Vec<u8>)> {
        let mut layers = Vec::with_capacity(self.network.layers.len());
        let mut manifest = Vec::new();
        let mut shard = Vec::new();
        let mut dense_count = 0usize;
        let mut dropout_count = 0usize;

        for layer in &self.network.layers {
            match layer {
                Layer::Dense(dense) => {
                    let name = keras_name("dense", dense_count);
                    let batch_input_shape =
                        (dense_count == 0).then(|| vec![None, Some(self.network.input_dim)]);
                    dense_count += 1;

                    layers.push(LayerSpec {
                        class_name: "Dense".to_string(),
                        config: LayerConfig {
                            name: name.clone(),
                            units: Some(dense.units),
                            activation: Some(dense.activation.as_str().to_string()),
                            use_bias: Some(true),
                            batch_input_shape,
                            dtype: Some("float32".to_string()),
                            ..Default::default()
                        },
                    });

                    for i in 0..dense.input_dim {
                        for u in 0..dense.units {
                            let w = dense.weights[u * dense.input_dim + i];
                            shard.extend_from_slice(&w.to_le_bytes());
                        }
                    }
                    for b in &dense.bias {
                        shard.extend_from_slice(&b.to_le_bytes());
                    }
                    manifest.push(WeightSpec {
                        name: format!("{}/kernel", name),
                        shape: vec![dense.input_dim, dense.units],
                        dtype: "float32".to_string(),
                    });
                    manifest.push(WeightSpec {
                        name: format!("{}/bias", name),
                        shape: vec![dense.units],
                        dtype: "float32".to_string(),
                    });
                }
                Layer::Dropout { rate } => {
                    let name = keras_name("dropout", dropout_count);
                    dropout_count += 1;
                    layers.push(LayerSpec {
                        class_name: "Dropout".to_string(),
                        config: LayerConfig {
                            name,
                            rate: Some(*rate),
                            ..Default::default()
                        },
                    });
                }
            }
        }

        let model_json = ModelJson {
            format: FORMAT.to_string(),
            generated_by: generated_by.to_string(),
            converted_by: None,
            model_topology: Topology {
                class_name: "Sequential".to_string(),
                config: SequentialConfig {
                    name: "nmf_classifier".to_string(),
                    layers,
                },
            },
            weights_manifest: vec![WeightGroup {
                paths: vec![WEIGHTS_SHARD.to_string()],
                weights: manifest,
            }],
            user_defined_metadata: Some(PortableMetadata {
                labels: self.codec.to_mapping(),
                feature_names: self.feature_names.clone(),
            }),
        };

        Ok((serde_json::to_string_pretty(&model_json)?, shard))
    }

    /// Write `model.json` and the shard into `dir` (created if missing)
    pub fn save<P: AsRef<Path>>(&self, dir: P, generated_by: &str) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let (json, shard) = self.render(generated_by)?;
        fs::write(dir.join(MODEL_JSON), json)?;
        fs::write(dir.join(WEIGHTS_SHARD), shard)?;
        Ok(())
    }

    /// Load a portable network directory
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let json = fs::read_to_string(dir.join(MODEL_JSON))?;
        let parsed: ModelJson = serde_json::from_str(&json)?;
        let mut weights = Vec::new();
        for group in &parsed.weights_manifest {
            for path in &group.paths {
                weights.extend(fs::read(dir.join(path))?);
            }
        }
        Self::from_parsed(parsed, &weights)
    }

    /// Parse an in-memory `model.json` and concatenated weight bytes
    pub fn parse(model_json: &str, weights: &[u8]) -> Result<Self> {
        Self::from_parsed(serde_json::from_str(model_json)?, weights)
    }

    fn from_parsed(parsed: ModelJson, bytes: &[u8]) -> Result<Self> {
        if parsed.format != FORMAT {
            return Err(CoreError::InvalidArtifact(format!(
                "unsupported format {:?}",
                parsed.format
            )));
        }
        if bytes.len() % 4 != 0 {
            return Err(CoreError::InvalidArtifact(
                "weight data is not a whole number of float32 values".to_string(),
            ));
        }
        let values: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        // Manifest order is storage order across all groups.
        let mut offsets: HashMap<&str, (usize, &[usize])> = HashMap::new();
        let mut cursor = 0usize;
        for spec in parsed.weights_manifest.iter().flat_map(|g| &g.weights) {
            if spec.dtype != "float32" {
                return Err(CoreError::InvalidArtifact(format!(
                    "weight {} has unsupported dtype {}",
                    spec.name, spec.dtype
                )));
            }
            offsets.insert(spec.name.as_str(), (cursor, spec.shape.as_slice()));
            cursor += spec.shape.iter().product::<usize>();
        }
        if cursor != values.len() {
            return Err(CoreError::InvalidArtifact(format!(
                "manifest describes {} values but shard holds {}",
                cursor,
                values.len()
            )));
        }

        let mut layers = Vec::new();
        let mut input_dim = None;
        let mut width = 0usize;
        for spec in &parsed.model_topology.config.layers {
            let config = &spec.config;
            match spec.class_name.as_str() {
                "Dense" => {
                    let in_dim = if let Some(shape) = &config.batch_input_shape {
                        let dim = shape.last().copied().flatten().ok_or_else(|| {
                            CoreError::InvalidArtifact("input shape has no feature dimension".to_string())
                        })?;
                        input_dim.get_or_insert(dim);
                        dim
                    } else {
                        width
                    };
                    let units = config.units.ok_or_else(|| {
                        CoreError::InvalidArtifact(format!("dense layer {} has no units", config.name))
                    })?;
                    let activation_name = config.activation.as_deref().unwrap_or("linear");
                    let activation = Activation::parse(activation_name).ok_or_else(|| {
                        CoreError::InvalidArtifact(format!("unsupported activation {}", activation_name))
                    })?;

                    let kernel = lookup(&offsets, &values, &format!("{}/kernel", config.name), &[in_dim, units])?;
                    let bias = lookup(&offsets, &values, &format!("{}/bias", config.name), &[units])?;
                    let mut weights = vec![0.0f32; units * in_dim];
                    for i in 0..in_dim {
                        for u in 0..units {
                            weights[u * in_dim + i] = kernel[i * units + u];
                        }
                    }
                    layers.push(Layer::Dense(DenseLayer {
                        input_dim: in_dim,
                        units,
                        activation,
                        weights,
                        bias: bias.to_vec(),
                    }));
                    width = units;
                }
                "Dropout" => layers.push(Layer::Dropout {
                    rate: config.rate.unwrap_or(0.0),
                }),
                other => {
                    return Err(CoreError::InvalidArtifact(format!(
                        "unsupported layer type {}",
                        other
                    )))
                }
            }
        }

        let metadata = parsed.user_defined_metadata.ok_or_else(|| {
            CoreError::InvalidArtifact("model.json carries no label metadata".to_string())
        })?;
        let codec = LabelCodec::from_mapping(&metadata.labels)?;
        let network = NetworkModel {
            input_dim: input_dim.unwrap_or(0),
            layers,
        };
        Self::new(network, codec, metadata.feature_names)
    }
}

fn keras_name(base: &str, index: usize) -> String {
    if index == 0 {
        base.to_string()
    } else {
        format!("{}_{}", base, index)
    }
}

fn lookup<'a>(
    offsets: &HashMap<&str, (usize, &[usize])>,
    values: &'a [f32],
    name: &str,
    expected_shape: &[usize],
) -> Result<&'a [f32]> {
    let (offset, shape) = offsets
        .get(name)
        .ok_or_else(|| CoreError::InvalidArtifact(format!("missing weight {}", name)))?;
    if *shape != expected_shape {
        return Err(CoreError::InvalidArtifact(format!(
            "weight {} has shape {:?}, expected {:?}",
            name, shape, expected_shape
        )));
    }
    let len: usize = shape.iter().product();
    Ok(&values[*offset..*offset + len])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Classifier;

    fn sample_network() -> NetworkModel {
        NetworkModel {
            input_dim: 3,
            layers: vec![
                Layer::Dense(DenseLayer {
                    input_dim: 3,
                    units: 2,
                    activation: Activation::Relu,
                    weights: vec![0.1, 0.2, 0.3, -0.4, 0.5, -0.6],
                    bias: vec![0.01, -0.02],
                }),
                Layer::Dropout { rate: 0.3 },
                Layer::Dense(DenseLayer {
                    input_dim: 2,
                    units: 2,
                    activation: Activation::Softmax,
                    weights: vec![1.5, -0.5, -1.0, 2.0],
                    bias: vec![0.0, 0.1],
                }),
            ],
        }
    }

    #[test]
    fn test_save_and_load_preserves_network_and_labels() {
        let codec = LabelCodec::fit(["affirmation", "negation"]);
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let portable = PortableNetwork::new(sample_network(), codec.clone(), names).unwrap();

        let dir = tempfile::tempdir().unwrap();
        portable.save(dir.path(), "test").unwrap();
        assert!(dir.path().join(MODEL_JSON).is_file());
        assert!(dir.path().join(WEIGHTS_SHARD).is_file());

        let loaded = PortableNetwork::load(dir.path()).unwrap();
        assert_eq!(loaded, portable);
        assert_eq!(loaded.codec, codec);

        let x = [1.0, 0.5, -1.0];
        assert_eq!(
            loaded.network.predict_proba(&x).unwrap(),
            portable.network.predict_proba(&x).unwrap()
        );
    }

    #[test]
    fn test_kernel_is_written_input_major() {
        let codec = LabelCodec::fit(["x", "y"]);
        let portable = PortableNetwork::new(sample_network(), codec, Vec::new()).unwrap();
        let (json, shard) = portable.render("test").unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let first = &value["weightsManifest"][0]["weights"][0];
        assert_eq!(first["name"], "dense/kernel");
        assert_eq!(first["shape"], serde_json::json!([3, 2]));
        assert_eq!(value["modelTopology"]["config"]["layers"][1]["class_name"], "Dropout");
        assert_eq!(value["userDefinedMetadata"]["labels"]["1"], "y");

        // kernel[0][1] is the weight from input 0 to unit 1
        let second = f32::from_le_bytes([shard[4], shard[5], shard[6], shard[7]]);
        assert_eq!(second, -0.4);
    }

    #[test]
    fn test_truncated_shard_is_rejected() {
        let codec = LabelCodec::fit(["x", "y"]);
        let portable = PortableNetwork::new(sample_network(), codec, Vec::new()).unwrap();
        let (json, shard) = portable.render("test").unwrap();
        let err = PortableNetwork::parse(&json, &shard[..shard.len() - 4]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidArtifact(_)));
    }

    #[test]
    fn test_output_count_must_match_codec() {
        let codec = LabelCodec::fit(["x", "y", "z"]);
        assert!(PortableNetwork::new(sample_network(), codec, Vec::new()).is_err());
    }
}
