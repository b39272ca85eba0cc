//! End-to-end training run
//!
//! load → split → fit → evaluate → (network) → export, strictly in order.
//! Everything the run needs comes from the [`PipelineConfig`] argument.

use signaura_nmf_core::{LabelCodec, ModelBundle, PortableNetwork, Prediction};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::dataset::{Dataset, EncodedDataset};
use crate::errors::Result;
use crate::estimator::Estimator;
use crate::evaluator::{evaluate, EvaluationReport};
use crate::exporter::{ExportedArtifacts, Exporter};
use crate::neural::{evaluate_network, probe_backend, NeuralBackend, TrainingHistory};
use crate::splitter::{shuffled_holdout, stratified_split, Split};

/// Canonical gestures predicted after every run
pub const EXAMPLE_INPUTS: [(&str, [f32; 6]); 6] = [
    ("Eyebrow raise only", [1.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
    ("Eyebrow + mouth open", [1.0, 1.0, 0.0, 0.0, 0.0, 0.0]),
    ("Head nod", [0.0, 0.0, 0.0, 1.0, 0.0, 0.0]),
    ("Head shake", [0.0, 0.0, 0.0, 0.0, 1.0, 0.0]),
    ("Eyebrow + nod", [1.0, 0.0, 0.0, 1.0, 0.0, 0.0]),
    ("Neutral", [0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
];

#[derive(Debug, Clone, PartialEq)]
pub struct ExamplePrediction {
    pub description: String,
    pub features: Vec<f32>,
    pub prediction: Prediction,
}

#[derive(Debug, Clone)]
pub struct NeuralOutcome {
    /// Accuracy on the test partition
    pub test_accuracy: f64,
    pub history: TrainingHistory,
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub samples: usize,
    pub split: Split,
    pub bundle: ModelBundle,
    pub report: EvaluationReport,
    /// `None` when the network backend was unavailable
    pub neural: Option<NeuralOutcome>,
    pub artifacts: ExportedArtifacts,
    pub examples: Vec<ExamplePrediction>,
}

pub fn run(config: &PipelineConfig) -> Result<PipelineOutcome> {
    config.validate()?;

    let backend = match probe_backend(&config.neural, config.seed) {
        Ok(backend) => Some(backend),
        Err(err) if err.is_recoverable() => {
            warn!("Skipping neural network: {}", err);
            None
        }
        Err(err) => return Err(err),
    };

    info!("Loading dataset from {}", config.dataset_path.display());
    let dataset = Dataset::from_csv(&config.dataset_path)?;
    log_dataset(&dataset);

    let codec = dataset.fit_codec();
    let encoded = dataset.encode(&codec)?;
    info!("Classes: {:?}", codec.classes());
    info!("Number of classes: {}", codec.len());

    let split = stratified_split(&encoded.y, &codec, config.test_fraction, config.seed)?;
    let train = encoded.subset(&split.train);
    let test = encoded.subset(&split.test);
    info!("Training samples: {}", train.len());
    info!("Test samples: {}", test.len());

    let estimator = Estimator::from_config(config)?;
    info!("Training {} classifier...", estimator.kind());
    let model = estimator.fit(&train, codec.len())?;
    let bundle = ModelBundle::new(
        model,
        codec.clone(),
        dataset.feature_names.clone(),
        train.len(),
        chrono::Utc::now().timestamp(),
    )?;
    info!("Model hash: {}", bundle.metadata().model_hash);

    let report = evaluate(&bundle, &test, &codec, &dataset.feature_names)?;
    info!("Accuracy: {:.2}%", report.accuracy * 100.0);
    info!("Classification Report:\n{}", report);
    if let Some(importances) = &report.feature_importances {
        info!("Feature Importances:");
        for item in importances {
            info!("  {}: {:.4}", item.feature, item.score);
        }
    }

    let (neural, portable) = match &backend {
        Some(backend) => {
            let (outcome, portable) =
                train_network(backend, config, &encoded, &split, &test, &codec, &dataset.feature_names)?;
            (Some(outcome), Some(portable))
        }
        None => (None, None),
    };

    let artifacts = Exporter::new(&config.output_dir).export(&bundle, portable.as_ref())?;
    if let Some(dir) = &artifacts.network_dir {
        info!(
            "Load in the browser with tf.loadLayersModel('{}/model.json')",
            dir.display()
        );
    }

    let examples = predict_examples(&bundle)?;

    Ok(PipelineOutcome {
        samples: dataset.len(),
        split,
        bundle,
        report,
        neural,
        artifacts,
        examples,
    })
}

fn log_dataset(dataset: &Dataset) {
    info!("Dataset preview:");
    info!("  {} | label", dataset.feature_names.join(" | "));
    for sample in dataset.samples.iter().take(5) {
        let values: Vec<String> = sample.features.iter().map(|v| v.to_string()).collect();
        info!("  {} | {}", values.join(" | "), sample.label);
    }

    info!("Label distribution:");
    for (label, count) in dataset.class_distribution() {
        info!("  {}: {}", label, count);
    }
    info!(
        "Feature matrix shape: ({}, {})",
        dataset.len(),
        dataset.feature_count()
    );
    for stat in dataset.feature_stats() {
        debug!(
            "  {}: min={}, max={}, mean={:.3}",
            stat.name,
            stat.min,
            stat.max,
            stat.mean
        );
    }
}

fn train_network(
    backend: &NeuralBackend,
    config: &PipelineConfig,
    encoded: &EncodedDataset,
    split: &Split,
    test: &EncodedDataset,
    codec: &LabelCodec,
    feature_names: &[String],
) -> Result<(NeuralOutcome, PortableNetwork)> {
    info!("Training neural network...");
    let (fit_rows, val_rows) =
        shuffled_holdout(&split.train, config.neural.validation_fraction, config.seed);
    let fit = encoded.subset(&fit_rows);
    let validation = encoded.subset(&val_rows);

    let (network, history) = backend.fit(&fit, Some(&validation), codec.len())?;
    let (_, accuracy) = evaluate_network(&network, test)?;
    info!("Neural network test accuracy: {:.2}%", accuracy * 100.0);

    let portable = PortableNetwork::new(network, codec.clone(), feature_names.to_vec())?;
    Ok((
        NeuralOutcome {
            test_accuracy: accuracy as f64,
            history,
        },
        portable,
    ))
}

fn predict_examples(bundle: &ModelBundle) -> Result<Vec<ExamplePrediction>> {
    info!("Example predictions:");
    EXAMPLE_INPUTS
        .iter()
        .map(|(description, features)| {
            let prediction = bundle.predict_label(features)?;
            info!("  {} -> {}", description, prediction.label);
            Ok(ExamplePrediction {
                description: description.to_string(),
                features: features.to_vec(),
                prediction,
            })
        })
        .collect()
}
