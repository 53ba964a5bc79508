//! The recognition cascade: segment, filter text, classify, reassemble.
//!
//! Every stage is its own immutable value and every transition borrows the
//! previous stage, so intermediate results stay inspectable and any stage can
//! be re-run with a different predictor.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{GlyphError, Result};
use crate::models::candidate::{CandidateSet, ClassifiedSet};
use crate::models::config::GlyphConfig;
use glyphscan_model::{Label, ModelError, ModelStore, Predictor};

use super::preprocessing::PageImage;
use super::reassembly::{self, Layout};
use super::segmenter::Segmenter;

/// Label the text detector gives to text candidates.
pub const TEXT_LABEL: Label = '1';

/// Stages of the cascade, named in errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeStage {
    Segmentation,
    TextFilter,
    Classification,
    Reassembly,
}

impl fmt::Display for CascadeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CascadeStage::Segmentation => "segmentation",
            CascadeStage::TextFilter => "text filter",
            CascadeStage::Classification => "classification",
            CascadeStage::Reassembly => "reassembly",
        };
        f.write_str(name)
    }
}

/// Run `predictor` over every candidate and check it answered once per
/// candidate.
fn predict_labels<P: Predictor + ?Sized>(
    stage: CascadeStage,
    predictor: &P,
    candidates: &CandidateSet,
) -> Result<Vec<Label>> {
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let (rows, cols) = candidates.sample_shape();
    if let Some(expected) = predictor.input_len() {
        if expected != rows * cols {
            return Err(GlyphError::artifact(
                stage,
                ModelError::Incompatible {
                    expected,
                    actual: rows * cols,
                },
            ));
        }
    }

    let batch = candidates.flattened();
    let labels = predictor
        .predict(batch.view())
        .map_err(|e| GlyphError::artifact(stage, e))?;

    if labels.len() != candidates.len() {
        return Err(GlyphError::artifact(
            stage,
            ModelError::InvalidInput(format!(
                "predictor returned {} labels for {} candidates",
                labels.len(),
                candidates.len()
            )),
        ));
    }

    Ok(labels)
}

/// Candidates straight out of segmentation.
#[derive(Debug, Clone, PartialEq)]
pub struct Segmented {
    candidates: CandidateSet,
}

impl Segmented {
    pub fn new(candidates: CandidateSet) -> Self {
        Self { candidates }
    }

    /// Segment `image`.
    pub fn from_image(segmenter: &Segmenter, image: &PageImage) -> Result<Self> {
        Ok(Self::new(segmenter.segment(image)?))
    }

    pub fn candidates(&self) -> &CandidateSet {
        &self.candidates
    }

    /// Keep the candidates the text detector labels as text.
    pub fn filter_text<P: Predictor + ?Sized>(&self, detector: &P) -> Result<TextFiltered> {
        let labels = predict_labels(CascadeStage::TextFilter, detector, &self.candidates)?;
        let keep: Vec<bool> = labels.iter().map(|l| *l == TEXT_LABEL).collect();
        let candidates = self.candidates.select(&keep);
        let discarded = self.candidates.len() - candidates.len();

        info!(
            "Text filter retained {} candidates, discarded {}",
            candidates.len(),
            discarded
        );

        Ok(TextFiltered {
            candidates,
            discarded,
        })
    }
}

/// Candidates the text detector accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFiltered {
    candidates: CandidateSet,
    discarded: usize,
}

impl TextFiltered {
    pub fn candidates(&self) -> &CandidateSet {
        &self.candidates
    }

    /// Number of candidates the text detector rejected.
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// Attach a character to every candidate.
    pub fn classify<P: Predictor + ?Sized>(&self, classifier: &P) -> Result<Classified> {
        let labels = predict_labels(CascadeStage::Classification, classifier, &self.candidates)?;
        let set = ClassifiedSet::from_labels(&self.candidates, labels);
        debug!("Classified {} candidates", set.len());
        Ok(Classified { set })
    }
}

/// Candidates with their predicted characters.
#[derive(Debug, Clone, PartialEq)]
pub struct Classified {
    set: ClassifiedSet,
}

impl Classified {
    pub fn set(&self) -> &ClassifiedSet {
        &self.set
    }

    /// Place the glyphs in layout coordinates.
    pub fn reassemble(&self) -> Layout {
        reassembly::reassemble(&self.set)
    }
}

/// Output of every stage of one cascade run.
#[derive(Debug, Clone)]
pub struct CascadeReport {
    pub segmented: Segmented,
    pub filtered: TextFiltered,
    pub classified: Classified,
    pub layout: Layout,
    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

impl CascadeReport {
    /// Predicted characters in candidate order.
    pub fn text(&self) -> String {
        self.classified.set().text()
    }
}

/// Full recognition cascade.
pub struct Cascade {
    segmenter: Segmenter,
    text_detector: Option<Box<dyn Predictor>>,
    char_classifier: Option<Box<dyn Predictor>>,
}

/// Builder for Cascade.
#[derive(Default)]
pub struct CascadeBuilder {
    segmenter: Segmenter,
    text_detector: Option<Box<dyn Predictor>>,
    char_classifier: Option<Box<dyn Predictor>>,
}

impl CascadeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the segmenter.
    pub fn with_segmenter(mut self, segmenter: Segmenter) -> Self {
        self.segmenter = segmenter;
        self
    }

    /// Set the text/no-text detector.
    pub fn with_text_detector(mut self, detector: impl Predictor + 'static) -> Self {
        self.text_detector = Some(Box::new(detector));
        self
    }

    /// Set the character classifier.
    pub fn with_char_classifier(mut self, classifier: impl Predictor + 'static) -> Self {
        self.char_classifier = Some(Box::new(classifier));
        self
    }

    pub fn build(self) -> Cascade {
        Cascade {
            segmenter: self.segmenter,
            text_detector: self.text_detector,
            char_classifier: self.char_classifier,
        }
    }
}

impl Cascade {
    pub fn builder() -> CascadeBuilder {
        CascadeBuilder::new()
    }

    /// Build a cascade from configuration, loading both models from `store`.
    ///
    /// Model files are resolved under `models.model_dir`.
    pub fn from_config(config: &GlyphConfig, store: &dyn ModelStore) -> Result<Self> {
        let load = |name: &str, stage: CascadeStage| {
            let id = config.model_path(name);
            let model = store
                .load(&id.to_string_lossy())
                .map_err(|e| GlyphError::artifact(stage, e))?;
            debug!(
                "Loaded {} model '{}' from {} ({})",
                stage,
                model.metadata().name,
                id.display(),
                model.params()
            );
            Ok::<_, GlyphError>(model)
        };

        let text = load(&config.models.text_model, CascadeStage::TextFilter)?;
        let chars = load(&config.models.char_model, CascadeStage::Classification)?;

        Ok(Self::builder()
            .with_segmenter(Segmenter::new(config.segmentation.clone()))
            .with_text_detector(text)
            .with_char_classifier(chars)
            .build())
    }

    pub fn segmenter(&self) -> &Segmenter {
        &self.segmenter
    }

    /// Run every stage on `image`.
    pub fn run(&self, image: &PageImage) -> Result<CascadeReport> {
        let start = Instant::now();
        let (rows, cols) = image.dim();
        info!("Processing image: {}x{}", cols, rows);

        let text_detector = self
            .text_detector
            .as_deref()
            .ok_or_else(|| GlyphError::Config("no text detector configured".to_string()))?;
        let char_classifier = self
            .char_classifier
            .as_deref()
            .ok_or_else(|| GlyphError::Config("no character classifier configured".to_string()))?;

        let segmented = Segmented::from_image(&self.segmenter, image)?;
        let filtered = segmented.filter_text(text_detector)?;
        let classified = filtered.classify(char_classifier)?;
        let layout = classified.reassemble();

        let processing_time_ms = start.elapsed().as_millis() as u64;
        info!(
            "Recognized {} glyphs in {}ms",
            layout.len(),
            processing_time_ms
        );

        Ok(CascadeReport {
            segmented,
            filtered,
            classified,
            layout,
            processing_time_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::candidate::{BoundingBox, Candidate};
    use glyphscan_model::{FileStore, GlyphModel, HogConfig, PipelineParams, SvmParams};
    use ndarray::{Array2, ArrayView2};
    use pretty_assertions::assert_eq;

    /// Labels each sample by its mean intensity.
    struct Threshold {
        below: Label,
        above: Label,
    }

    impl Predictor for Threshold {
        fn predict(&self, samples: ArrayView2<'_, f32>) -> glyphscan_model::Result<Vec<Label>> {
            Ok(samples
                .rows()
                .into_iter()
                .map(|row| if row.mean().unwrap_or(0.0) < 0.5 { self.below } else { self.above })
                .collect())
        }
    }

    /// Labels by position in the batch.
    struct Sequence(Vec<Label>);

    impl Predictor for Sequence {
        fn predict(&self, samples: ArrayView2<'_, f32>) -> glyphscan_model::Result<Vec<Label>> {
            Ok(self.0.iter().copied().take(samples.nrows()).collect())
        }
    }

    fn candidates(values: &[f32]) -> CandidateSet {
        let items = values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let bbox = BoundingBox::new(2, i * 6, 7, i * 6 + 5);
                Candidate {
                    bbox,
                    crop_box: bbox,
                    sample: Array2::from_elem((4, 4), *v),
                }
            })
            .collect();
        CandidateSet::new((10, 40), (4, 4), items)
    }

    fn small_cells() -> PipelineParams {
        let hog = HogConfig {
            pixels_per_cell: (2, 2),
            ..HogConfig::default()
        };
        PipelineParams::new(hog, SvmParams::default())
    }

    /// A model trained on one class always predicts it.
    fn constant_model(label: Label) -> GlyphModel {
        let samples = Array2::from_shape_fn((4, 16), |(i, j)| ((i + j) % 3) as f32 / 2.0);
        GlyphModel::fit(samples.view(), &[label; 4], (4, 4), small_cells()).unwrap()
    }

    #[test]
    fn test_filter_keeps_text_in_order() {
        let segmented = Segmented::new(candidates(&[0.1, 0.9, 0.2, 0.3]));
        let filtered = segmented
            .filter_text(&Threshold { below: '1', above: '0' })
            .unwrap();

        let boxes = segmented.candidates().boxes();
        assert_eq!(filtered.candidates().boxes(), vec![boxes[0], boxes[2], boxes[3]]);
        assert_eq!(filtered.discarded(), 1);
    }

    #[test]
    fn test_always_zero_filter_empties_cascade() {
        let segmented = Segmented::new(candidates(&[0.1, 0.2, 0.3]));
        let filtered = segmented.filter_text(&constant_model('0')).unwrap();

        assert!(filtered.candidates().is_empty());
        assert_eq!(filtered.discarded(), 3);

        let classified = filtered.classify(&Sequence(vec!['x'])).unwrap();
        assert!(classified.set().is_empty());
        assert!(classified.reassemble().is_empty());
    }

    #[test]
    fn test_counts_are_monotone_and_order_preserved() {
        let segmented = Segmented::new(candidates(&[0.1, 0.9, 0.2, 0.8, 0.3]));
        let filtered = segmented
            .filter_text(&Threshold { below: '1', above: '0' })
            .unwrap();
        let classified = filtered.classify(&Sequence(vec!['a', 'b', 'c'])).unwrap();
        let layout = classified.reassemble();

        assert!(segmented.candidates().len() >= filtered.candidates().len());
        assert_eq!(filtered.candidates().len(), classified.set().len());
        assert_eq!(classified.set().len(), layout.len());
        assert_eq!(classified.set().text(), "abc");
        let xs: Vec<i64> = layout.glyphs.iter().map(|g| g.x).collect();
        assert_eq!(xs, vec![0, 12, 24]);
    }

    #[test]
    fn test_empty_set_passes_through() {
        let segmented = Segmented::new(CandidateSet::new((10, 10), (4, 4), Vec::new()));
        let filtered = segmented.filter_text(&Sequence(Vec::new())).unwrap();
        let classified = filtered.classify(&Sequence(Vec::new())).unwrap();
        assert_eq!(classified.reassemble(), Layout::default());
    }

    #[test]
    fn test_label_count_mismatch_is_artifact_error() {
        let segmented = Segmented::new(candidates(&[0.1, 0.2]));
        let err = segmented.filter_text(&Sequence(vec!['1'])).unwrap_err();
        assert!(matches!(
            err,
            GlyphError::Artifact {
                stage: CascadeStage::TextFilter,
                ..
            }
        ));
    }

    #[test]
    fn test_incompatible_model_is_artifact_error() {
        let segmented = Segmented::new(candidates(&[0.1]));
        let samples = Array2::<f32>::zeros((2, 36));
        let model = GlyphModel::fit(samples.view(), &['a', 'a'], (6, 6), small_cells()).unwrap();

        let filtered = TextFiltered {
            candidates: segmented.candidates().clone(),
            discarded: 0,
        };
        let err = filtered.classify(&model).unwrap_err();

        assert!(matches!(
            err,
            GlyphError::Artifact {
                stage: CascadeStage::Classification,
                source: ModelError::Incompatible {
                    expected: 36,
                    actual: 16
                }
            }
        ));
    }

    #[test]
    fn test_run_blank_image() {
        let cascade = Cascade::builder()
            .with_text_detector(Sequence(Vec::new()))
            .with_char_classifier(Sequence(Vec::new()))
            .build();
        let image = PageImage::from_array(Array2::ones((40, 40))).unwrap();

        let report = cascade.run(&image).unwrap();

        assert!(report.segmented.candidates().is_empty());
        assert!(report.layout.is_empty());
        assert_eq!(report.text(), "");
    }

    #[test]
    fn test_run_requires_predictors() {
        let image = PageImage::from_array(Array2::ones((8, 8))).unwrap();
        let err = Cascade::builder().build().run(&image).unwrap_err();
        assert!(matches!(err, GlyphError::Config(_)));
    }

    #[test]
    fn test_missing_artifact_names_stage() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        let err = Cascade::from_config(&GlyphConfig::default(), &store)
            .err()
            .unwrap();

        assert!(matches!(
            err,
            GlyphError::Artifact {
                stage: CascadeStage::TextFilter,
                source: ModelError::Io(_)
            }
        ));
        assert!(err.to_string().contains("text filter"));
    }

    #[test]
    fn test_from_config_resolves_model_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let mut config = GlyphConfig::default();
        config.models.model_dir = "trained".into();
        config.models.text_model = "text.json".to_string();
        config.models.char_model = "chars.bin".to_string();

        store.save(&constant_model('0'), "trained/text.json").unwrap();
        let err = Cascade::from_config(&config, &store).err().unwrap();
        assert!(matches!(
            err,
            GlyphError::Artifact {
                stage: CascadeStage::Classification,
                ..
            }
        ));

        store.save(&constant_model('a'), "trained/chars.bin").unwrap();
        let cascade = Cascade::from_config(&config, &store).unwrap();
        let report = cascade
            .run(&PageImage::from_array(Array2::ones((20, 20))).unwrap())
            .unwrap();
        assert!(report.layout.is_empty());
    }
}
