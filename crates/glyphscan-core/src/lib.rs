//! Core library for glyphscan character recognition.
//!
//! This crate provides:
//! - Page image loading and preprocessing (TV denoising, Otsu binarisation, closing)
//! - Connected-component glyph segmentation
//! - The recognition cascade: segment, filter text, classify characters, reassemble
//! - Layout reassembly of classified glyphs
//! - Labeled dataset loading for training

pub mod dataset;
pub mod error;
pub mod models;
pub mod ocr;

pub use dataset::{DatasetLoader, DirectoryLoader, LabeledDataset};
pub use error::{GlyphError, Result};
pub use models::candidate::{BoundingBox, Candidate, CandidateSet, ClassifiedCandidate, ClassifiedSet};
pub use models::config::GlyphConfig;
pub use ocr::{Cascade, CascadeReport, Layout, LayoutGlyph, PageImage, Segmenter};

/// Re-export model types.
pub use glyphscan_model::{FileStore, GlyphModel, Label, ModelStore, Predictor};
