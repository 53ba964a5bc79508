//! Configuration structures for segmentation, recognition and training.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use glyphscan_model::{BlockNorm, ParamGrid};

/// Main configuration for glyphscan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlyphConfig {
    /// Segmentation configuration.
    pub segmentation: SegmentationConfig,

    /// Layout rendering configuration.
    pub layout: LayoutConfig,

    /// Offline training configuration.
    pub training: TrainingConfig,

    /// Model configuration.
    pub models: ModelConfig,
}

/// Which side of the Otsu threshold is ink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Dark glyphs on a light page: ink is at or below the threshold.
    DarkOnLight,
    /// Light glyphs on a dark page: ink is above the threshold.
    LightOnDark,
}

/// Pixel adjacency used when labeling connected components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    /// Edge neighbours only.
    Four,
    /// Edge and corner neighbours.
    Eight,
}

/// Segmentation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Total-variation denoising weight (larger is smoother).
    pub denoise_weight: f32,

    /// Relative energy change at which denoising stops.
    pub denoise_tolerance: f32,

    /// Maximum denoising iterations.
    pub denoise_max_iter: usize,

    /// Ink polarity.
    pub polarity: Polarity,

    /// Side of the square closing element (0 or 1 disables closing).
    pub closing_size: usize,

    /// Component adjacency.
    pub connectivity: Connectivity,

    /// Components with this many pixels or fewer are ignored.
    pub min_area: usize,

    /// Margin added around each component before cropping.
    pub margin: usize,

    /// Canonical sample shape as (rows, cols).
    pub sample_shape: (usize, usize),
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            denoise_weight: 0.1,
            denoise_tolerance: 2e-4,
            denoise_max_iter: 200,
            polarity: Polarity::DarkOnLight,
            closing_size: 2,
            connectivity: Connectivity::Eight,
            min_area: 10,
            margin: 3,
            sample_shape: (20, 20),
        }
    }
}

/// Layout rendering configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Baselines closer than this many pixels belong to the same line.
    pub line_tolerance: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self { line_tolerance: 10.0 }
    }
}

/// Offline training configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of cross-validation folds.
    pub folds: usize,

    /// Seed for dataset shuffling, splitting and fold assignment.
    pub seed: u64,

    /// Shuffle samples before assigning folds.
    pub shuffle_folds: bool,

    /// Fraction of the dataset held out as a test set.
    pub test_fraction: f32,

    /// Maximum number of samples to load (0 = unlimited).
    pub limit: usize,

    /// Block normalisation for every HOG configuration in the grid.
    pub block_norm: BlockNorm,

    /// Coordinate descent tolerance.
    pub svm_tolerance: f32,

    /// Coordinate descent pass limit.
    pub svm_max_iter: usize,

    /// Parameter grid for model selection.
    pub grid: ParamGrid,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            folds: 3,
            seed: 10,
            shuffle_folds: false,
            test_fraction: 0.1,
            limit: 0,
            block_norm: BlockNorm::default(),
            svm_tolerance: 1e-3,
            svm_max_iter: 1000,
            grid: ParamGrid::default(),
        }
    }
}

/// Model file locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory containing model files.
    pub model_dir: PathBuf,

    /// Text/no-text detector file name.
    pub text_model: String,

    /// Character classifier file name.
    pub char_model: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            text_model: "text-detector.bin".to_string(),
            char_model: "char-classifier.bin".to_string(),
        }
    }
}

impl GlyphConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }

    /// Get full path to a model file.
    pub fn model_path(&self, model_name: &str) -> PathBuf {
        self.models.model_dir.join(model_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = GlyphConfig::default();
        config.segmentation.polarity = Polarity::LightOnDark;
        config.training.grid.c = vec![0.5];
        config.save(&path).unwrap();

        assert_eq!(GlyphConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: GlyphConfig =
            serde_json::from_str(r#"{"segmentation": {"margin": 5, "connectivity": "four"}}"#).unwrap();

        assert_eq!(config.segmentation.margin, 5);
        assert_eq!(config.segmentation.connectivity, Connectivity::Four);
        assert_eq!(config.segmentation.min_area, 10);
        assert_eq!(config.training.folds, 3);
        assert_eq!(config.model_path("x.bin"), PathBuf::from("models").join("x.bin"));
    }
}
