//! SignAura NMF Trainer - offline training for the NMF interpretation classifier
//!
//! Loads labelled non-manual-feature vectors, fits a classical classifier
//! (and optionally a small feed-forward network), evaluates it on a
//! stratified hold-out and exports artifacts whose label indices agree.

pub mod cart;
pub mod config;
pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod estimator;
pub mod evaluator;
pub mod exporter;
pub mod forest;
pub mod logistic;
pub mod neural;
pub mod pipeline;
pub mod splitter;

pub use config::{ForestSettings, LogisticSettings, NeuralSettings, PipelineConfig};
pub use dataset::{Dataset, EncodedDataset, FeatureStats, Sample};
pub use deterministic::{derive_seed, stream_rng, SplitTieBreaker, Stream};
pub use errors::{Result, TrainerError};
pub use estimator::Estimator;
pub use evaluator::{evaluate, ConfusionMatrix, EvaluationReport};
pub use exporter::{ExportedArtifacts, Exporter};
pub use forest::ForestTrainer;
pub use logistic::LogisticTrainer;
pub use neural::{probe_backend, NeuralBackend, TrainingHistory};
pub use pipeline::{run, ExamplePrediction, PipelineOutcome};
pub use splitter::{holdout_tail, shuffled_holdout, stratified_split, Split};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
