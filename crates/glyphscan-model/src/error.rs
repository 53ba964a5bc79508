//! Error types for the model layer.

use thiserror::Error;

/// Errors that can occur while extracting features, training, predicting,
/// or persisting models.
#[derive(Error, Debug)]
pub enum ModelError {
    /// A feature or classifier configuration cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input batch has the wrong shape or content.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The artifact expects a different input or feature dimensionality.
    #[error("incompatible model: expected {expected} values per sample, got {actual}")]
    Incompatible { expected: usize, actual: usize },

    /// Training could not produce a model.
    #[error("training failed: {0}")]
    Training(String),

    /// The stored artifact could not be decoded.
    #[error("corrupt model artifact: {0}")]
    Corrupt(String),

    /// The stored artifact was written by an unknown format version.
    #[error("unsupported artifact version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// I/O error when reading or writing artifacts.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary encoding error.
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    /// JSON encoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
