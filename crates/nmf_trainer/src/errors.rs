use signaura_nmf_core::CoreError;
use thiserror::Error;

/// Errors returned by the training pipeline.
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("dataset error: {0}")]
    DataLoad(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("cannot stratify: class {label:?} has {count} sample(s), at least 2 are required")]
    Stratification { label: String, count: usize },

    #[error("unsupported model type: {0:?} (expected \"random_forest\" or \"logistic\")")]
    UnsupportedModelType(String),

    #[error("neural backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("training error: {0}")]
    Training(String),

    #[error("export error: {0}")]
    Export(String),

    #[error(transparent)]
    Core(CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrainerError {
    /// Only a missing neural backend is handled locally; everything else aborts the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TrainerError::BackendUnavailable(_))
    }
}

impl From<CoreError> for TrainerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnsupportedModelType(name) => TrainerError::UnsupportedModelType(name),
            other => TrainerError::Core(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, TrainerError>;
