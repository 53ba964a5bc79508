//! Error types for the glyphscan-core library.

use std::path::PathBuf;

use thiserror::Error;

use crate::ocr::CascadeStage;

/// Main error type for the glyphscan library.
#[derive(Error, Debug)]
pub enum GlyphError {
    /// The input image cannot be used.
    #[error("input error: {0}")]
    Input(#[from] InputError),

    /// A model artifact needed by a cascade stage is missing, unreadable or
    /// incompatible.
    #[error("model artifact for the {stage} stage: {source}")]
    Artifact {
        stage: CascadeStage,
        #[source]
        source: glyphscan_model::ModelError,
    },

    /// Dataset loading or preparation error.
    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetError),

    /// Error from the model layer outside of the cascade.
    #[error("model error: {0}")]
    Model(#[from] glyphscan_model::ModelError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl GlyphError {
    /// Wrap a model error as an artifact failure of `stage`.
    pub fn artifact(stage: CascadeStage, source: glyphscan_model::ModelError) -> Self {
        GlyphError::Artifact { stage, source }
    }
}

/// Errors related to input images.
#[derive(Error, Debug)]
pub enum InputError {
    /// The file could not be decoded as an image.
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The image has no pixels.
    #[error("image is empty")]
    Empty,

    /// Pixel data does not match the stated dimensions.
    #[error("invalid image dimensions: {0}")]
    InvalidDimensions(String),
}

/// Errors related to labeled datasets.
#[derive(Error, Debug)]
pub enum DatasetError {
    /// Dataset root does not exist.
    #[error("dataset not found: {0}")]
    NotFound(PathBuf),

    /// No usable samples were found.
    #[error("no samples found in {0}")]
    NoSamples(String),

    /// A directory or label does not map to a known class.
    #[error("unknown class: {0}")]
    UnknownClass(String),

    /// Invalid train/test split fraction.
    #[error("invalid split fraction {0}, expected a value in [0, 1)")]
    InvalidSplit(f32),

    /// Datasets with different sample shapes cannot be combined.
    #[error("sample shape mismatch: {0:?} vs {1:?}")]
    ShapeMismatch((usize, usize), (usize, usize)),

    /// Directory scan pattern error.
    #[error("invalid scan pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

/// Result type for the glyphscan library.
pub type Result<T> = std::result::Result<T, GlyphError>;
