//! Datasets stored as one directory of PNG images per class.

use std::path::{Path, PathBuf};

use ndarray::Array2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use crate::error::{DatasetError, Result};
use crate::ocr::PageImage;
use crate::ocr::preprocessing;
use glyphscan_model::Label;

use super::{DatasetLoader, LabeledDataset, normalize_label};

/// Loads `root/<class>/*.png`.
///
/// `<class>` is a single character or a `SampleNNN` directory. With a fixed
/// label every PNG below `root` is loaded with that label instead, which is
/// how background (non-text) sets are read.
#[derive(Debug, Clone)]
pub struct DirectoryLoader {
    root: PathBuf,
    sample_shape: (usize, usize),
    seed: u64,
    limit: usize,
    label: Option<Label>,
}

impl DirectoryLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sample_shape: (20, 20),
            seed: 10,
            limit: 0,
            label: None,
        }
    }

    /// Set the sample shape images are resized to.
    pub fn with_sample_shape(mut self, shape: (usize, usize)) -> Self {
        self.sample_shape = shape;
        self
    }

    /// Set the shuffle seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Load at most `limit` images (0 = unlimited).
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Give every image `label` regardless of its directory.
    pub fn with_label(mut self, label: Label) -> Self {
        self.label = Some(label);
        self
    }

    /// Image paths with their labels, in path order.
    fn entries(&self) -> Result<Vec<(PathBuf, Label)>> {
        let root = self.root.to_string_lossy();
        let pattern = match self.label {
            Some(_) => format!("{}/**/*.png", glob::Pattern::escape(&root)),
            None => format!("{}/*/*.png", glob::Pattern::escape(&root)),
        };

        let mut paths: Vec<PathBuf> = glob::glob(&pattern)
            .map_err(DatasetError::from)?
            .filter_map(|entry| entry.ok())
            .collect();
        paths.sort();

        let mut entries = Vec::with_capacity(paths.len());
        for path in paths {
            let label = match self.label {
                Some(label) => label,
                None => class_of(&path)?,
            };
            entries.push((path, label));
        }
        Ok(entries)
    }

    fn load_sample(&self, path: &Path) -> Option<Array2<f32>> {
        let page = match PageImage::open(path) {
            Ok(page) => page,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                return None;
            }
        };

        let (rows, cols) = page.dim();
        if rows * cols < self.sample_shape.0 * self.sample_shape.1 {
            debug!("Skipping {}: {}x{} is smaller than a sample", path.display(), rows, cols);
            return None;
        }

        match preprocessing::resize(page.pixels(), self.sample_shape) {
            Ok(sample) => Some(sample),
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// Label from the name of the directory holding `path`.
fn class_of(path: &Path) -> Result<Label> {
    let name = path
        .parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    normalize_label(&name).ok_or_else(|| DatasetError::UnknownClass(name).into())
}

impl DatasetLoader for DirectoryLoader {
    fn load(&self) -> Result<LabeledDataset> {
        if !self.root.is_dir() {
            return Err(DatasetError::NotFound(self.root.clone()).into());
        }

        let mut entries = self.entries()?;
        if self.limit > 0 {
            entries.truncate(self.limit);
        }
        debug!("Found {} images in {}", entries.len(), self.root.display());

        let len = self.sample_shape.0 * self.sample_shape.1;
        let mut values = Vec::with_capacity(entries.len() * len);
        let mut labels = Vec::with_capacity(entries.len());
        for (path, label) in &entries {
            if let Some(sample) = self.load_sample(path) {
                values.extend(sample.iter().copied());
                labels.push(*label);
            }
        }

        if labels.is_empty() {
            return Err(DatasetError::NoSamples(self.root.display().to_string()).into());
        }

        let samples = Array2::from_shape_vec((labels.len(), len), values)
            .map_err(|e| DatasetError::NoSamples(e.to_string()))?;

        let mut order: Vec<usize> = (0..labels.len()).collect();
        order.shuffle(&mut StdRng::seed_from_u64(self.seed));
        let samples = samples.select(ndarray::Axis(0), &order);
        let labels = order.iter().map(|&i| labels[i]).collect();

        let dataset = LabeledDataset::new(samples, labels, self.sample_shape)?;
        info!(
            "Loaded {} images each {:?} pixels from {}",
            dataset.len(),
            self.sample_shape,
            self.root.display()
        );
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GlyphError;
    use image::{GrayImage, Luma};
    use pretty_assertions::assert_eq;

    fn write_png(dir: &Path, name: &str, size: u32, value: u8) {
        std::fs::create_dir_all(dir).unwrap();
        GrayImage::from_pixel(size, size, Luma([value]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn test_load_class_directories() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("A"), "1.png", 24, 0);
        write_png(&dir.path().join("A"), "2.png", 24, 0);
        write_png(&dir.path().join("Sample001"), "1.png", 30, 255);
        // Too small to be a sample.
        write_png(&dir.path().join("b"), "1.png", 8, 128);

        let data = DirectoryLoader::new(dir.path())
            .with_sample_shape((10, 10))
            .load()
            .unwrap();

        assert_eq!(data.len(), 3);
        assert_eq!(data.sample_shape(), (10, 10));
        assert_eq!(data.class_counts().into_iter().collect::<Vec<_>>(), vec![('0', 1), ('a', 2)]);
        for (row, label) in data.samples().outer_iter().zip(data.labels()) {
            let expected = if *label == 'a' { 0.0 } else { 1.0 };
            assert!(row.iter().all(|v| (v - expected).abs() < 1e-6));
        }
    }

    #[test]
    fn test_shuffle_is_seeded() {
        let dir = tempfile::tempdir().unwrap();
        for (i, class) in ["0", "1", "2", "3", "4", "5"].iter().enumerate() {
            write_png(&dir.path().join(class), "x.png", 12, (i * 40) as u8);
        }

        let loader = DirectoryLoader::new(dir.path()).with_sample_shape((4, 4));
        let first = loader.load().unwrap();
        let second = loader.load().unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 6);
    }

    #[test]
    fn test_fixed_label_and_limit() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("airplane"), "1.png", 16, 10);
        write_png(&dir.path().join("frog").join("deep"), "2.png", 16, 20);
        write_png(dir.path(), "3.png", 16, 30);

        let all = DirectoryLoader::new(dir.path())
            .with_sample_shape((8, 8))
            .with_label('0')
            .load()
            .unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.labels().iter().all(|l| *l == '0'));

        let limited = DirectoryLoader::new(dir.path())
            .with_sample_shape((8, 8))
            .with_label('0')
            .with_limit(2)
            .load()
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_unknown_class_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("airplane"), "1.png", 16, 10);

        let err = DirectoryLoader::new(dir.path()).load().unwrap_err();
        assert!(matches!(err, GlyphError::Dataset(DatasetError::UnknownClass(name)) if name == "airplane"));
    }

    #[test]
    fn test_missing_and_empty_roots() {
        let dir = tempfile::tempdir().unwrap();

        let missing = DirectoryLoader::new(dir.path().join("nope")).load().unwrap_err();
        assert!(matches!(missing, GlyphError::Dataset(DatasetError::NotFound(_))));

        let empty = DirectoryLoader::new(dir.path()).load().unwrap_err();
        assert!(matches!(empty, GlyphError::Dataset(DatasetError::NoSamples(_))));
    }
}
