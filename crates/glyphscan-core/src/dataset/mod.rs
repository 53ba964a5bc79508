//! Labeled glyph datasets for training and evaluation.

mod directory;

pub use directory::DirectoryLoader;

use std::collections::BTreeMap;

use ndarray::{Array2, ArrayView2, Axis, concatenate};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::error::{DatasetError, GlyphError, Result};
use glyphscan_model::{Label, TrainingSet};

/// Number of classes in Chars74K-style `SampleNNN` directories.
const SAMPLE_CLASSES: usize = 62;

/// Source of labeled samples.
pub trait DatasetLoader {
    /// Load every sample with its label.
    fn load(&self) -> Result<LabeledDataset>;
}

/// Flattened samples and their labels, index-aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledDataset {
    samples: Array2<f32>,
    labels: Vec<Label>,
    sample_shape: (usize, usize),
}

impl LabeledDataset {
    pub fn new(samples: Array2<f32>, labels: Vec<Label>, sample_shape: (usize, usize)) -> Result<Self> {
        // Reuse the model layer's shape checks.
        TrainingSet::new(samples.view(), &labels, sample_shape)?;
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

    /// One flattened sample per row.
    pub fn samples(&self) -> ArrayView2<'_, f32> {
        self.samples.view()
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Sample shape as (rows, cols).
    pub fn sample_shape(&self) -> (usize, usize) {
        self.sample_shape
    }

    /// Sample `index` reshaped to the sample shape.
    pub fn image(&self, index: usize) -> Option<ArrayView2<'_, f32>> {
        let row = self.samples.outer_iter().nth(index)?;
        row.into_shape_with_order(self.sample_shape).ok()
    }

    /// Number of samples per label.
    pub fn class_counts(&self) -> BTreeMap<Label, usize> {
        let mut counts = BTreeMap::new();
        for label in &self.labels {
            *counts.entry(*label).or_insert(0) += 1;
        }
        counts
    }

    /// Borrow as grid-search input.
    pub fn as_training_set(&self) -> Result<TrainingSet<'_>> {
        Ok(TrainingSet::new(self.samples.view(), &self.labels, self.sample_shape)?)
    }

    /// Keep the first `n` samples (0 keeps everything).
    pub fn limit(self, n: usize) -> Self {
        if n == 0 || n >= self.len() {
            return self;
        }
        let indices: Vec<usize> = (0..n).collect();
        self.select(&indices)
    }

    /// Split into `(train, test)` holding out `floor(len * test_fraction)`
    /// samples picked with `seed`. Training samples keep their order.
    pub fn split(&self, test_fraction: f32, seed: u64) -> Result<(Self, Self)> {
        if !(0.0..1.0).contains(&test_fraction) {
            return Err(DatasetError::InvalidSplit(test_fraction).into());
        }

        let total = self.len();
        let k = (total as f64 * test_fraction as f64).floor() as usize;

        let mut order: Vec<usize> = (0..total).collect();
        order.shuffle(&mut StdRng::seed_from_u64(seed));
        let test: Vec<usize> = order[..k].to_vec();

        let mut held_out = vec![false; total];
        for &i in &test {
            held_out[i] = true;
        }
        let train: Vec<usize> = (0..total).filter(|i| !held_out[*i]).collect();

        Ok((self.select(&train), self.select(&test)))
    }

    /// Give every sample the same label.
    pub fn relabel(mut self, label: Label) -> Self {
        self.labels.iter_mut().for_each(|l| *l = label);
        self
    }

    /// Concatenate with `other` and shuffle the result with `seed`.
    pub fn merge(self, other: Self, seed: u64) -> Result<Self> {
        if self.sample_shape != other.sample_shape {
            return Err(DatasetError::ShapeMismatch(self.sample_shape, other.sample_shape).into());
        }

        let samples = concatenate(Axis(0), &[self.samples.view(), other.samples.view()])
            .map_err(|e| GlyphError::Config(e.to_string()))?;
        let mut labels = self.labels;
        labels.extend(other.labels);

        Self::new(samples, labels, self.sample_shape).map(|merged| merged.shuffled(seed))
    }

    /// Reorder samples with `seed`.
    pub fn shuffled(&self, seed: u64) -> Self {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(&mut StdRng::seed_from_u64(seed));
        self.select(&order)
    }

    fn select(&self, indices: &[usize]) -> Self {
        Self {
            samples: self.samples.select(Axis(0), indices),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
            sample_shape: self.sample_shape,
        }
    }
}

/// Map a class directory name to a label.
///
/// Accepts a single ASCII letter or digit (case folded) or a `SampleNNN`
/// directory numbered 1-62: digits first, then upper and lower case letters
/// which both fold to lowercase.
pub fn normalize_label(name: &str) -> Option<Label> {
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return c.is_ascii_alphanumeric().then(|| c.to_ascii_lowercase());
    }

    let number: usize = name.strip_prefix("Sample")?.parse().ok()?;
    match number {
        1..=10 => char::from_digit((number - 1) as u32, 10),
        11..=SAMPLE_CLASSES => {
            let offset = (number - 11) % 26;
            Some((b'a' + offset as u8) as char)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dataset(n: usize) -> LabeledDataset {
        let samples = Array2::from_shape_fn((n, 4), |(i, _)| i as f32);
        let labels = (0..n).map(|i| (b'a' + (i % 3) as u8) as char).collect();
        LabeledDataset::new(samples, labels, (2, 2)).unwrap()
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("7"), Some('7'));
        assert_eq!(normalize_label("Q"), Some('q'));
        assert_eq!(normalize_label("Sample001"), Some('0'));
        assert_eq!(normalize_label("Sample010"), Some('9'));
        assert_eq!(normalize_label("Sample011"), Some('a'));
        assert_eq!(normalize_label("Sample036"), Some('z'));
        assert_eq!(normalize_label("Sample037"), Some('a'));
        assert_eq!(normalize_label("Sample062"), Some('z'));
        assert_eq!(normalize_label("Sample063"), None);
        assert_eq!(normalize_label("-"), None);
        assert_eq!(normalize_label("airplane"), None);
    }

    #[test]
    fn test_new_rejects_misaligned_labels() {
        let result = LabeledDataset::new(Array2::zeros((3, 4)), vec!['a'], (2, 2));
        assert!(matches!(result, Err(GlyphError::Model(_))));
    }

    #[test]
    fn test_split_sizes_and_disjointness() {
        let data = dataset(20);
        let (train, test) = data.split(0.25, 10).unwrap();

        assert_eq!(train.len(), 15);
        assert_eq!(test.len(), 5);

        let mut ids: Vec<i64> = train
            .samples()
            .column(0)
            .iter()
            .chain(test.samples().column(0).iter())
            .map(|v| *v as i64)
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..20).collect::<Vec<_>>());

        // Training order follows the source order.
        let train_ids: Vec<f32> = train.samples().column(0).to_vec();
        assert!(train_ids.windows(2).all(|w| w[0] < w[1]));

        assert_eq!(data.split(0.25, 10).unwrap(), (train, test));
    }

    #[test]
    fn test_split_rejects_bad_fraction() {
        assert!(matches!(
            dataset(4).split(1.0, 0),
            Err(GlyphError::Dataset(DatasetError::InvalidSplit(_)))
        ));
        let (train, test) = dataset(4).split(0.0, 0).unwrap();
        assert_eq!((train.len(), test.len()), (4, 0));
    }

    #[test]
    fn test_merge_relabels_text_and_background() {
        let text = dataset(6).relabel('1');
        let background = dataset(4).relabel('0');

        let merged = text.merge(background, 10).unwrap();

        assert_eq!(merged.len(), 10);
        let counts = merged.class_counts();
        assert_eq!(counts.get(&'1'), Some(&6));
        assert_eq!(counts.get(&'0'), Some(&4));
    }

    #[test]
    fn test_merge_rejects_shape_mismatch() {
        let other = LabeledDataset::new(Array2::zeros((1, 9)), vec!['a'], (3, 3)).unwrap();
        assert!(matches!(
            dataset(2).merge(other, 0),
            Err(GlyphError::Dataset(DatasetError::ShapeMismatch((2, 2), (3, 3))))
        ));
    }

    #[test]
    fn test_limit_and_image_view() {
        let data = dataset(5).limit(2);
        assert_eq!(data.len(), 2);
        assert_eq!(data.image(1).unwrap().dim(), (2, 2));
        assert!(data.image(2).is_none());
        assert_eq!(dataset(5).limit(0).len(), 5);
        assert_eq!(data.as_training_set().unwrap().len(), 2);
    }
}
