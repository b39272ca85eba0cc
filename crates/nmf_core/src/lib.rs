//! SignAura NMF Core
//!
//! Everything an inference runtime needs to use a trained non-manual-feature
//! classifier: the feature column schema, the label codec, the fitted model
//! types and the exported artifact formats.
//!
//! Modules:
//! - `features`: Feature column order and small numeric helpers
//! - `label_codec`: Label <-> class index bijection and its mapping file
//! - `classifier`: The `Classifier` capability and the classical model variants
//! - `tree` / `forest`: Random forest inference
//! - `logistic`: Multinomial logistic regression inference
//! - `network`: Feed-forward network inference
//! - `bundle`: Binary model bundle (model + codec + feature order)
//! - `portable`: Browser-portable network directory
//! - `serialization`: Canonical JSON hashing

pub mod bundle;
pub mod classifier;
pub mod errors;
pub mod features;
pub mod forest;
pub mod label_codec;
pub mod logistic;
pub mod network;
pub mod portable;
pub mod serialization;
pub mod tree;

pub use bundle::{BundleMetadata, ModelBundle, Prediction};
pub use classifier::{ClassicalModel, Classifier, ModelKind};
pub use errors::{CoreError, Result};
pub use features::{feature_names, FEATURE_COLUMNS, FEATURE_DIM, LABEL_COLUMN};
pub use forest::RandomForestModel;
pub use label_codec::LabelCodec;
pub use logistic::LogisticModel;
pub use network::{Activation, DenseLayer, Layer, NetworkModel};
pub use portable::PortableNetwork;
pub use tree::{Node, Tree};

/// Crate version string recorded in exported artifacts
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
