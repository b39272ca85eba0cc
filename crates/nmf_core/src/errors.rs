//! Error types for the NMF core crate

use thiserror::Error;

/// Errors raised while encoding labels, running inference or reading artifacts
#[derive(Error, Debug)]
pub enum CoreError {
    /// Label was not part of the fitted codec domain
    #[error("Unknown label: {0:?}")]
    UnknownLabel(String),

    /// Class index does not resolve to a label
    #[error("Class index {index} out of range (codec has {len} labels)")]
    IndexOutOfRange { index: usize, len: usize },

    /// Model type name is not one of the supported classical models
    #[error("Unsupported model type: {0:?} (expected \"random_forest\" or \"logistic\")")]
    UnsupportedModelType(String),

    /// Feature vector has the wrong number of entries
    #[error("Expected {expected} features, got {got}")]
    FeatureDimension { expected: usize, got: usize },

    /// Fitted model state is structurally inconsistent
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// An exported artifact could not be interpreted
    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary bundle encoding error
    #[error("Binary encoding error: {0}")]
    Binary(#[from] bincode::Error),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
