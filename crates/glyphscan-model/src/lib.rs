//! Model layer for glyphscan.
//!
//! This crate provides everything the recognition cascade needs to turn a
//! fixed-size glyph sample into a label, and everything the offline tooling
//! needs to produce those models:
//! - HOG feature extraction
//! - one-vs-rest linear SVM classifiers
//! - the `GlyphModel` artifact (raw pixels or HOG, then SVM) behind the `Predictor` trait
//! - stratified grid-search cross-validation over joint feature/SVM parameters
//! - a file-backed model store (bincode or JSON)

pub mod hog;
pub mod metrics;
pub mod pipeline;
pub mod selection;
pub mod store;
pub mod svm;

mod error;
mod predictor;

pub use error::ModelError;
pub use hog::{BlockNorm, HogConfig};
pub use metrics::{ConfusionMatrix, accuracy};
pub use pipeline::{FeatureTransform, GlyphModel, ModelMetadata, PipelineParams};
pub use predictor::{Label, Predictor};
pub use selection::{
    FoldPlan, GridSearch, ModelFamily, ParamGrid, ScoredCombination, SearchOutcome, TrainingSet,
};
pub use store::{ArtifactFormat, FileStore, ModelStore};
pub use svm::{LinearSvm, SvmParams};

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
