//! Cross-validated grid search over joint feature and SVM parameters.
//!
//! Feature extraction and classifier regularisation interact, so the grid is
//! the full Cartesian product of both parameter sets. Folds are stratified by
//! class. Each
//! (combination, fold) pair is an independent unit of work executed on the
//! rayon pool; scores are reduced once every unit has finished.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::{Array2, ArrayView2, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::hog::HogConfig;
use crate::metrics::accuracy;
use crate::pipeline::{FeatureTransform, GlyphModel, PipelineParams};
use crate::predictor::Label;
use crate::svm::LinearSvm;
use crate::{ModelError, Result};

/// Labeled samples the search trains and scores on.
#[derive(Debug, Clone, Copy)]
pub struct TrainingSet<'a> {
    samples: ArrayView2<'a, f32>,
    labels: &'a [Label],
    sample_shape: (usize, usize),
}

impl<'a> TrainingSet<'a> {
    /// Wrap index-aligned samples and labels.
    pub fn new(
        samples: ArrayView2<'a, f32>,
        labels: &'a [Label],
        sample_shape: (usize, usize),
    ) -> Result<Self> {
        if samples.nrows() != labels.len() {
            return Err(ModelError::InvalidInput(format!(
                "{} samples but {} labels",
                samples.nrows(),
                labels.len()
            )));
        }
        let expected = sample_shape.0 * sample_shape.1;
        if samples.ncols() != expected {
            return Err(ModelError::Incompatible {
                expected,
                actual: samples.ncols(),
            });
        }
        Ok(Self {
            samples,
            labels,
            sample_shape,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn samples(&self) -> ArrayView2<'a, f32> {
        self.samples
    }

    pub fn labels(&self) -> &'a [Label] {
        self.labels
    }

    pub fn sample_shape(&self) -> (usize, usize) {
        self.sample_shape
    }
}

/// Searchable model family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelFamily {
    /// Linear SVM on raw pixels; only `C` is searched.
    #[serde(rename = "linearsvc")]
    LinearSvc,
    /// HOG followed by a linear SVM.
    #[default]
    #[serde(rename = "linearsvc-hog")]
    LinearSvcHog,
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelFamily::LinearSvc => write!(f, "linearsvc"),
            ModelFamily::LinearSvcHog => write!(f, "linearsvc-hog"),
        }
    }
}

impl FromStr for ModelFamily {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "linearsvc" => Ok(ModelFamily::LinearSvc),
            "linearsvc-hog" => Ok(ModelFamily::LinearSvcHog),
            other => Err(format!(
                "unknown model family '{}', expected linearsvc or linearsvc-hog",
                other
            )),
        }
    }
}

/// Values to search for each parameter.
///
/// The HOG fields are ignored for [`ModelFamily::LinearSvc`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamGrid {
    pub family: ModelFamily,
    pub orientations: Vec<usize>,
    pub pixels_per_cell: Vec<(usize, usize)>,
    pub cells_per_block: Vec<(usize, usize)>,
    pub c: Vec<f32>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            family: ModelFamily::LinearSvcHog,
            orientations: vec![2, 4, 5, 10],
            pixels_per_cell: vec![(2, 2), (4, 4), (5, 5)],
            cells_per_block: vec![(2, 2), (4, 4), (5, 5)],
            c: vec![0.01, 0.05, 0.1, 0.5, 1.0, 1.5, 2.0, 5.0, 10.0],
        }
    }
}

impl ParamGrid {
    /// Raw-pixel grid: `C` from 0.01 to 1.49 in steps of 0.01.
    pub fn raw() -> Self {
        Self {
            family: ModelFamily::LinearSvc,
            c: (1..150).map(|i| i as f32 / 100.0).collect(),
            ..Self::default()
        }
    }

    /// Grid holding exactly one combination.
    pub fn single(params: &PipelineParams) -> Self {
        match params.features {
            FeatureTransform::Raw => Self {
                c: vec![params.svm.c],
                ..Self::raw()
            },
            FeatureTransform::Hog(hog) => Self {
                family: ModelFamily::LinearSvcHog,
                orientations: vec![hog.orientations],
                pixels_per_cell: vec![hog.pixels_per_cell],
                cells_per_block: vec![hog.cells_per_block],
                c: vec![params.svm.c],
            },
        }
    }

    /// Number of combinations.
    pub fn len(&self) -> usize {
        match self.family {
            ModelFamily::LinearSvc => self.c.len(),
            ModelFamily::LinearSvcHog => {
                self.orientations.len() * self.pixels_per_cell.len() * self.cells_per_block.len() * self.c.len()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every combination, with fields not covered by the grid taken from `template`.
    ///
    /// `C` varies fastest, then cells per block, pixels per cell, orientations.
    /// HOG combinations keep the template's block normalisation.
    pub fn combinations(&self, template: &PipelineParams) -> Vec<PipelineParams> {
        let mut out = Vec::with_capacity(self.len());
        if self.family == ModelFamily::LinearSvc {
            for &c in &self.c {
                let mut params = *template;
                params.features = FeatureTransform::Raw;
                params.svm.c = c;
                out.push(params);
            }
            return out;
        }

        let base = template.features.hog().copied().unwrap_or_default();
        for &orientations in &self.orientations {
            for &pixels_per_cell in &self.pixels_per_cell {
                for &cells_per_block in &self.cells_per_block {
                    for &c in &self.c {
                        let mut params = *template;
                        params.features = FeatureTransform::Hog(HogConfig {
                            orientations,
                            pixels_per_cell,
                            cells_per_block,
                            ..base
                        });
                        params.svm.c = c;
                        out.push(params);
                    }
                }
            }
        }
        out
    }
}

/// Assignment of sample indices to k folds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldPlan {
    folds: Vec<Vec<usize>>,
}

impl FoldPlan {
    /// Split sample indices into `k` folds stratified by label.
    ///
    /// Indices are grouped by class in order of first appearance and, with a
    /// seed, shuffled within each class. The grouped sequence is then dealt
    /// round-robin, so every fold holds each class in proportion and fold
    /// sizes differ by at most one. Indices within a fold are ascending.
    pub fn new(labels: &[Label], k: usize, seed: Option<u64>) -> Result<Self> {
        let n = labels.len();
        if k < 2 {
            return Err(ModelError::InvalidConfig(format!("need at least 2 folds, got {}", k)));
        }
        if n < k {
            return Err(ModelError::InvalidConfig(format!(
                "cannot split {} samples into {} folds",
                n, k
            )));
        }

        let mut classes: Vec<(Label, Vec<usize>)> = Vec::new();
        for (i, &label) in labels.iter().enumerate() {
            match classes.iter_mut().find(|(l, _)| *l == label) {
                Some((_, members)) => members.push(i),
                None => classes.push((label, vec![i])),
            }
        }

        let mut rng = seed.map(StdRng::seed_from_u64);
        let mut folds = vec![Vec::with_capacity(n / k + 1); k];
        let mut next = 0;
        for (label, members) in &mut classes {
            if members.len() < k {
                warn!(
                    "Class '{}' has {} samples, fewer than {} folds",
                    label,
                    members.len(),
                    k
                );
            }
            if let Some(rng) = rng.as_mut() {
                members.shuffle(rng);
            }
            for &i in members.iter() {
                folds[next % k].push(i);
                next += 1;
            }
        }
        for fold in &mut folds {
            fold.sort_unstable();
        }

        Ok(Self { folds })
    }

    pub fn k(&self) -> usize {
        self.folds.len()
    }

    /// Held-out indices of fold `fold`.
    pub fn test(&self, fold: usize) -> &[usize] {
        &self.folds[fold]
    }

    /// Training indices of fold `fold`: every other fold, in fold order.
    pub fn train(&self, fold: usize) -> Vec<usize> {
        self.folds
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != fold)
            .flat_map(|(_, f)| f.iter().copied())
            .collect()
    }
}

/// Cross-validation results for one parameter combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCombination {
    pub params: PipelineParams,
    pub fold_scores: Vec<f64>,
    pub mean: f64,
    pub std: f64,
}

impl ScoredCombination {
    fn new(params: PipelineParams, fold_scores: Vec<f64>) -> Self {
        let n = fold_scores.len() as f64;
        let mean = fold_scores.iter().sum::<f64>() / n;
        let var = fold_scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        Self {
            params,
            fold_scores,
            mean,
            std: var.sqrt(),
        }
    }
}

/// Result of a grid search.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Winning combination.
    pub best: ScoredCombination,
    /// Winning combination refit on the full training set.
    pub model: GlyphModel,
    /// Every evaluated combination, best first.
    pub ranking: Vec<ScoredCombination>,
    /// Combinations that could not be evaluated, with the reason.
    pub skipped: Vec<(PipelineParams, String)>,
}

/// Grid search with k-fold cross-validation.
#[derive(Debug, Clone)]
pub struct GridSearch {
    folds: usize,
    seed: Option<u64>,
}

impl Default for GridSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl GridSearch {
    /// Three folds, no shuffling.
    pub fn new() -> Self {
        Self { folds: 3, seed: None }
    }

    /// Set the number of folds.
    pub fn with_folds(mut self, folds: usize) -> Self {
        self.folds = folds;
        self
    }

    /// Shuffle fold assignment with the given seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Fold plan used for a dataset with these labels.
    pub fn fold_plan(&self, labels: &[Label]) -> Result<FoldPlan> {
        FoldPlan::new(labels, self.folds, self.seed)
    }

    /// Run the search.
    pub fn search(
        &self,
        data: &TrainingSet<'_>,
        template: &PipelineParams,
        grid: &ParamGrid,
    ) -> Result<SearchOutcome> {
        self.search_with_progress(data, template, grid, &|_, _| {})
    }

    /// Run the search, calling `progress(done, total)` as units complete.
    pub fn search_with_progress(
        &self,
        data: &TrainingSet<'_>,
        template: &PipelineParams,
        grid: &ParamGrid,
        progress: &(dyn Fn(usize, usize) + Sync),
    ) -> Result<SearchOutcome> {
        let shape = data.sample_shape();
        let plan = self.fold_plan(data.labels())?;

        let mut candidates = Vec::new();
        let mut skipped = Vec::new();
        for params in grid.combinations(template) {
            match params.features.validate(shape) {
                Ok(()) => candidates.push(params),
                Err(e) => {
                    warn!("Skipping {}: {}", params, e);
                    skipped.push((params, e.to_string()));
                }
            }
        }

        if candidates.is_empty() {
            return Err(ModelError::InvalidConfig(format!(
                "no parameter combination is usable for {:?} samples",
                shape
            )));
        }

        info!(
            "Grid search: {} combinations x {} folds on {} samples ({} skipped)",
            candidates.len(),
            plan.k(),
            data.len(),
            skipped.len()
        );

        let features = feature_cache(data, &candidates)?;

        let units: Vec<(usize, usize)> = (0..candidates.len())
            .flat_map(|c| (0..plan.k()).map(move |f| (c, f)))
            .collect();
        let total = units.len();
        let done = AtomicUsize::new(0);

        let scores = units
            .par_iter()
            .map(|&(c, f)| {
                let params = &candidates[c];
                let score = score_fold(&features[&params.features], data.labels(), &plan, f, params)?;
                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                progress(finished, total);
                Ok(score)
            })
            .collect::<Result<Vec<f64>>>()?;

        let mut ranking: Vec<ScoredCombination> = candidates
            .iter()
            .zip(scores.chunks(plan.k()))
            .map(|(params, fold_scores)| ScoredCombination::new(*params, fold_scores.to_vec()))
            .collect();

        let mut best = 0;
        for (i, scored) in ranking.iter().enumerate() {
            debug!(
                "{}: mean={:.4} std={:.4} folds={:?}",
                scored.params, scored.mean, scored.std, scored.fold_scores
            );
            if scored.mean > ranking[best].mean {
                best = i;
            }
        }
        let best = ranking[best].clone();

        info!("Best combination: {} (mean accuracy {:.4})", best.params, best.mean);

        let model = GlyphModel::fit(data.samples(), data.labels(), shape, best.params)?
            .with_cv_score(best.mean);

        ranking.sort_by(|a, b| b.mean.total_cmp(&a.mean));

        Ok(SearchOutcome {
            best,
            model,
            ranking,
            skipped,
        })
    }
}

/// Features of the whole dataset for each distinct feature transform.
fn feature_cache(
    data: &TrainingSet<'_>,
    candidates: &[PipelineParams],
) -> Result<HashMap<FeatureTransform, Array2<f32>>> {
    let mut transforms: Vec<FeatureTransform> = Vec::new();
    for params in candidates {
        if !transforms.contains(&params.features) {
            transforms.push(params.features);
        }
    }

    debug!("Extracting features for {} transforms", transforms.len());

    transforms
        .par_iter()
        .map(|transform| {
            transform
                .extract_batch(data.samples(), data.sample_shape())
                .map(|features| (*transform, features))
        })
        .collect()
}

fn score_fold(
    features: &Array2<f32>,
    labels: &[Label],
    plan: &FoldPlan,
    fold: usize,
    params: &PipelineParams,
) -> Result<f64> {
    let train = plan.train(fold);
    let test = plan.test(fold);

    let train_labels: Vec<Label> = train.iter().map(|&i| labels[i]).collect();
    let test_labels: Vec<Label> = test.iter().map(|&i| labels[i]).collect();

    let svm = LinearSvm::fit(
        features.select(Axis(0), &train).view(),
        &train_labels,
        &params.svm,
    )?;
    let predicted = svm.predict(features.select(Axis(0), test).view())?;

    Ok(accuracy(&test_labels, &predicted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::Predictor;
    use crate::svm::SvmParams;
    use pretty_assertions::assert_eq;

    /// 8x8 samples of three stroke directions with a little per-sample variation.
    fn strokes(n: usize) -> (Array2<f32>, Vec<Label>) {
        let mut samples = Array2::<f32>::ones((n, 64));
        let mut labels = Vec::with_capacity(n);
        for i in 0..n {
            let offset = 2 + (i / 3) % 4;
            for k in 0..8 {
                let (r, c) = match i % 3 {
                    0 => (k, offset),
                    1 => (offset, k),
                    _ => (k, k),
                };
                samples[[i, r * 8 + c]] = 0.0;
            }
            labels.push(['|', '-', '\\'][i % 3]);
        }
        (samples, labels)
    }

    fn fold_labels(plan: &FoldPlan, labels: &[Label], fold: usize) -> Vec<Label> {
        plan.test(fold).iter().map(|&i| labels[i]).collect()
    }

    #[test]
    fn test_fold_plan_sizes() {
        let plan = FoldPlan::new(&['a'; 10], 3, None).unwrap();
        assert_eq!(plan.test(0), &[0, 3, 6, 9]);
        assert_eq!(plan.test(1), &[1, 4, 7]);
        assert_eq!(plan.test(2), &[2, 5, 8]);
        assert_eq!(plan.train(1), vec![0, 3, 6, 9, 2, 5, 8]);
    }

    #[test]
    fn test_class_grouped_labels_are_stratified() {
        let labels: Vec<Label> = ['|', '-', '\\']
            .into_iter()
            .flat_map(|l| std::iter::repeat_n(l, 4))
            .collect();

        for seed in [None, Some(10)] {
            let plan = FoldPlan::new(&labels, 3, seed).unwrap();
            for fold in 0..3 {
                let mut held_out = fold_labels(&plan, &labels, fold);
                held_out.sort_unstable();
                held_out.dedup();
                assert_eq!(held_out, vec!['-', '\\', '|']);
                assert_eq!(plan.test(fold).len(), 4);
            }
        }
    }

    #[test]
    fn test_class_grouped_search_scores_every_fold() {
        let (samples, labels) = strokes(12);
        let order: Vec<usize> = (0..12).map(|i| (i % 4) * 3 + i / 4).collect();
        let samples = samples.select(Axis(0), &order);
        let labels: Vec<Label> = order.iter().map(|&i| labels[i]).collect();
        assert_eq!(&labels[..4], &['|'; 4]);

        let params = PipelineParams::new(HogConfig::new(4, (4, 4), (1, 1)), SvmParams::with_c(1.0));
        let data = TrainingSet::new(samples.view(), &labels, (8, 8)).unwrap();
        let outcome = GridSearch::new()
            .search(&data, &params, &ParamGrid::single(&params))
            .unwrap();

        assert_eq!(outcome.best.fold_scores.len(), 3);
        assert!(outcome.best.fold_scores.iter().all(|&s| s > 0.0), "{:?}", outcome.best.fold_scores);
    }

    #[test]
    fn test_seeded_fold_plan_is_reproducible() {
        let labels: Vec<Label> = (0..30).map(|i| ['x', 'y'][i % 2]).collect();
        let a = FoldPlan::new(&labels, 3, Some(10)).unwrap();
        let b = FoldPlan::new(&labels, 3, Some(10)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, FoldPlan::new(&labels, 3, None).unwrap());

        let mut all: Vec<usize> = (0..3).flat_map(|f| a.test(f).to_vec()).collect();
        all.sort_unstable();
        assert_eq!(all, (0..30).collect::<Vec<_>>());
    }

    #[test]
    fn test_fold_plan_rejects_too_few_samples() {
        assert!(FoldPlan::new(&['a', 'b'], 3, None).is_err());
        assert!(FoldPlan::new(&['a'; 10], 1, None).is_err());
    }

    #[test]
    fn test_grid_combinations() {
        let grid = ParamGrid {
            family: ModelFamily::LinearSvcHog,
            orientations: vec![2, 4],
            pixels_per_cell: vec![(4, 4)],
            cells_per_block: vec![(1, 1), (2, 2)],
            c: vec![0.1, 1.0, 10.0],
        };
        let combos = grid.combinations(&PipelineParams::new(HogConfig::default(), SvmParams::default()));

        let hog = |i: usize| *combos[i].features.hog().unwrap();

        assert_eq!(combos.len(), 12);
        assert_eq!(grid.len(), 12);
        assert_eq!(hog(0).orientations, 2);
        assert_eq!(combos[0].svm.c, 0.1);
        assert_eq!(combos[1].svm.c, 1.0);
        assert_eq!(hog(3).cells_per_block, (2, 2));
        assert_eq!(hog(11).orientations, 4);
    }

    #[test]
    fn test_raw_grid_varies_only_c() {
        let grid = ParamGrid::raw();
        let combos = grid.combinations(&PipelineParams::default());

        assert_eq!(grid.len(), 149);
        assert_eq!(combos.len(), 149);
        assert!(combos.iter().all(|p| p.features == FeatureTransform::Raw));
        assert_eq!(combos[0].svm.c, 0.01);
        assert_eq!(combos[148].svm.c, 1.49);
        assert_eq!("linearsvc".parse::<ModelFamily>().unwrap(), ModelFamily::LinearSvc);
        assert!("svc".parse::<ModelFamily>().is_err());
    }

    #[test]
    fn test_raw_pixel_search() {
        let (samples, labels) = strokes(24);
        let data = TrainingSet::new(samples.view(), &labels, (8, 8)).unwrap();
        let grid = ParamGrid {
            c: vec![0.1, 1.0],
            ..ParamGrid::raw()
        };

        let outcome = GridSearch::new()
            .search(&data, &PipelineParams::default(), &grid)
            .unwrap();

        assert_eq!(outcome.ranking.len(), 2);
        assert!(outcome.skipped.is_empty());
        assert_eq!(outcome.model.params().features, FeatureTransform::Raw);
        assert_eq!(outcome.model.predict(samples.view()).unwrap().len(), 24);
    }

    #[test]
    fn test_single_combination_matches_manual_cross_validation() {
        let (samples, labels) = strokes(24);
        let params = PipelineParams::new(HogConfig::new(4, (4, 4), (1, 1)), SvmParams::with_c(0.5));
        let data = TrainingSet::new(samples.view(), &labels, (8, 8)).unwrap();

        let outcome = GridSearch::new()
            .search(&data, &params, &ParamGrid::single(&params))
            .unwrap();

        let plan = FoldPlan::new(&labels, 3, None).unwrap();
        let mut manual = Vec::new();
        for fold in 0..3 {
            let train = plan.train(fold);
            let test = plan.test(fold);
            let train_labels: Vec<Label> = train.iter().map(|&i| labels[i]).collect();
            let test_labels: Vec<Label> = test.iter().map(|&i| labels[i]).collect();
            let model =
                GlyphModel::fit(samples.select(Axis(0), &train).view(), &train_labels, (8, 8), params)
                    .unwrap();
            let predicted = model.predict(samples.select(Axis(0), test).view()).unwrap();
            manual.push(accuracy(&test_labels, &predicted));
        }
        let manual_mean = manual.iter().sum::<f64>() / 3.0;

        assert_eq!(outcome.ranking.len(), 1);
        assert_eq!(outcome.best.params, params);
        assert_eq!(outcome.best.fold_scores, manual);
        assert!((outcome.best.mean - manual_mean).abs() < 1e-12);
        assert_eq!(outcome.model.metadata().cv_score, Some(outcome.best.mean));
    }

    #[test]
    fn test_search_picks_highest_mean_and_skips_invalid() {
        let (samples, labels) = strokes(30);
        let data = TrainingSet::new(samples.view(), &labels, (8, 8)).unwrap();
        let template = PipelineParams::new(HogConfig::default(), SvmParams::default());
        let grid = ParamGrid {
            family: ModelFamily::LinearSvcHog,
            orientations: vec![1, 4],
            pixels_per_cell: vec![(4, 4)],
            cells_per_block: vec![(1, 1), (3, 3)],
            c: vec![1.0],
        };

        let outcome = GridSearch::new().with_seed(10).search(&data, &template, &grid).unwrap();

        // 3x3 blocks do not fit a 2x2 cell grid.
        assert_eq!(outcome.skipped.len(), 2);
        assert_eq!(outcome.ranking.len(), 2);
        assert!(outcome.ranking[0].mean >= outcome.ranking[1].mean);
        assert_eq!(outcome.best, outcome.ranking[0]);
        assert_eq!(outcome.model.params(), &outcome.best.params);
    }

    #[test]
    fn test_search_fails_when_nothing_is_valid() {
        let (samples, labels) = strokes(9);
        let data = TrainingSet::new(samples.view(), &labels, (8, 8)).unwrap();
        let template = PipelineParams::new(HogConfig::default(), SvmParams::default());
        let grid = ParamGrid {
            family: ModelFamily::LinearSvcHog,
            orientations: vec![4],
            pixels_per_cell: vec![(5, 5)],
            cells_per_block: vec![(2, 2)],
            c: vec![1.0],
        };

        assert!(matches!(
            GridSearch::new().search(&data, &template, &grid),
            Err(ModelError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_progress_reports_every_unit() {
        let (samples, labels) = strokes(12);
        let data = TrainingSet::new(samples.view(), &labels, (8, 8)).unwrap();
        let template = PipelineParams::new(HogConfig::new(4, (4, 4), (1, 1)), SvmParams::default());
        let grid = ParamGrid {
            c: vec![0.1, 1.0],
            ..ParamGrid::single(&template)
        };
        let calls = AtomicUsize::new(0);

        GridSearch::new()
            .search_with_progress(&data, &template, &grid, &|_, total| {
                assert_eq!(total, 6);
                calls.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();

        assert_eq!(calls.load(Ordering::Relaxed), 6);
    }
}
