//! The persisted model artifact: a feature transform followed by a linear SVM.

use chrono::{DateTime, Utc};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::hog::HogConfig;
use crate::predictor::{Label, Predictor};
use crate::svm::{LinearSvm, SvmParams};
use crate::{ModelError, Result};

/// Feature stage applied to flattened samples before the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeatureTransform {
    /// Raw pixel intensities.
    Raw,
    /// HOG descriptor.
    Hog(HogConfig),
}

impl Default for FeatureTransform {
    fn default() -> Self {
        FeatureTransform::Hog(HogConfig::default())
    }
}

impl From<HogConfig> for FeatureTransform {
    fn from(hog: HogConfig) -> Self {
        FeatureTransform::Hog(hog)
    }
}

impl FeatureTransform {
    /// HOG configuration, if this is a HOG transform.
    pub fn hog(&self) -> Option<&HogConfig> {
        match self {
            FeatureTransform::Raw => None,
            FeatureTransform::Hog(hog) => Some(hog),
        }
    }

    /// Check the transform against a sample shape.
    pub fn validate(&self, shape: (usize, usize)) -> Result<()> {
        self.feature_len(shape).map(|_| ())
    }

    /// Length of the feature vector produced for samples of `shape`.
    pub fn feature_len(&self, shape: (usize, usize)) -> Result<usize> {
        match self {
            FeatureTransform::Raw if shape.0 == 0 || shape.1 == 0 => Err(ModelError::InvalidConfig(
                format!("{:?} sample has no pixels", shape),
            )),
            FeatureTransform::Raw => Ok(shape.0 * shape.1),
            FeatureTransform::Hog(hog) => hog.feature_len(shape),
        }
    }

    /// Transform a batch of flattened samples, one row per sample.
    pub fn extract_batch(&self, samples: ArrayView2<'_, f32>, shape: (usize, usize)) -> Result<Array2<f32>> {
        match self {
            FeatureTransform::Raw => {
                let expected = shape.0 * shape.1;
                if samples.ncols() != expected {
                    return Err(ModelError::Incompatible {
                        expected,
                        actual: samples.ncols(),
                    });
                }
                Ok(samples.to_owned())
            }
            FeatureTransform::Hog(hog) => hog.extract_batch(samples, shape),
        }
    }
}

impl std::fmt::Display for FeatureTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureTransform::Raw => write!(f, "raw"),
            FeatureTransform::Hog(hog) => write!(
                f,
                "orientations={} pixels_per_cell={:?} cells_per_block={:?}",
                hog.orientations, hog.pixels_per_cell, hog.cells_per_block
            ),
        }
    }
}

/// Joint feature-extraction and classifier parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineParams {
    pub features: FeatureTransform,
    pub svm: SvmParams,
}

impl PipelineParams {
    pub fn new(features: impl Into<FeatureTransform>, svm: SvmParams) -> Self {
        Self {
            features: features.into(),
            svm,
        }
    }

    /// Classifier on raw pixels.
    pub fn raw(svm: SvmParams) -> Self {
        Self::new(FeatureTransform::Raw, svm)
    }
}

impl std::fmt::Display for PipelineParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} C={}", self.features, self.svm.c)
    }
}

/// Descriptive information stored alongside a trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Human readable model name.
    pub name: String,

    /// When training finished.
    pub trained_at: DateTime<Utc>,

    /// Number of training samples.
    pub training_samples: usize,

    /// Mean cross-validated accuracy, when the model came out of a search.
    pub cv_score: Option<f64>,
}

/// A trained glyph classifier operating on flattened grayscale samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlyphModel {
    sample_shape: (usize, usize),
    params: PipelineParams,
    classifier: LinearSvm,
    metadata: ModelMetadata,
}

impl GlyphModel {
    /// Extract features from `samples` and train the classifier on them.
    ///
    /// # Arguments
    /// * `samples` - One flattened `sample_shape` image per row
    /// * `labels` - One label per row
    /// * `sample_shape` - Sample dimensions as (rows, cols)
    /// * `params` - Feature and classifier parameters
    pub fn fit(
        samples: ArrayView2<'_, f32>,
        labels: &[Label],
        sample_shape: (usize, usize),
        params: PipelineParams,
    ) -> Result<Self> {
        let features = params.features.extract_batch(samples, sample_shape)?;
        let classifier = LinearSvm::fit(features.view(), labels, &params.svm)?;

        debug!(
            "Fitted glyph model on {} samples ({} features each): {}",
            samples.nrows(),
            features.ncols(),
            params
        );

        Ok(Self {
            sample_shape,
            params,
            classifier,
            metadata: ModelMetadata {
                name: "glyph-model".to_string(),
                trained_at: Utc::now(),
                training_samples: samples.nrows(),
                cv_score: None,
            },
        })
    }

    /// Set the model name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.metadata.name = name.into();
        self
    }

    /// Record the cross-validated score the model was selected with.
    pub fn with_cv_score(mut self, score: f64) -> Self {
        self.metadata.cv_score = Some(score);
        self
    }

    pub fn sample_shape(&self) -> (usize, usize) {
        self.sample_shape
    }

    pub fn params(&self) -> &PipelineParams {
        &self.params
    }

    pub fn classes(&self) -> &[Label] {
        self.classifier.classes()
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// Check that the feature transform and classifier agree on dimensionality.
    pub fn validate(&self) -> Result<()> {
        let len = self.params.features.feature_len(self.sample_shape)?;
        if len != self.classifier.feature_len() {
            return Err(ModelError::Incompatible {
                expected: self.classifier.feature_len(),
                actual: len,
            });
        }
        Ok(())
    }
}

impl Predictor for GlyphModel {
    fn predict(&self, samples: ArrayView2<'_, f32>) -> Result<Vec<Label>> {
        if samples.nrows() == 0 {
            return Ok(Vec::new());
        }

        let features = self.params.features.extract_batch(samples, self.sample_shape)?;
        self.classifier.predict(features.view())
    }

    fn input_len(&self) -> Option<usize> {
        Some(self.sample_shape.0 * self.sample_shape.1)
    }
}
