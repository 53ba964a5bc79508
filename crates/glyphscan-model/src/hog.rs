//! Histogram-of-oriented-gradients feature extraction.
//!
//! The descriptor follows the classic Dalal-Triggs layout: per-pixel central
//! difference gradients, unsigned orientation histograms per cell, and
//! overlapping blocks of cells normalised independently and concatenated.

use ndarray::{Array1, Array2, Array3, ArrayView2, s};
use serde::{Deserialize, Serialize};

use crate::{ModelError, Result};

const NORM_EPS: f32 = 1e-5;
const HYS_CLIP: f32 = 0.2;

/// Per-block normalisation scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockNorm {
    L1,
    L1Sqrt,
    L2,
    L2Hys,
}

impl Default for BlockNorm {
    fn default() -> Self {
        BlockNorm::L2Hys
    }
}

/// HOG configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct HogConfig {
    /// Number of orientation bins over `[0, 180)` degrees.
    pub orientations: usize,

    /// Cell size in pixels as (rows, cols).
    pub pixels_per_cell: (usize, usize),

    /// Block size in cells as (rows, cols).
    pub cells_per_block: (usize, usize),

    /// Block normalisation.
    pub block_norm: BlockNorm,
}

impl Default for HogConfig {
    fn default() -> Self {
        Self {
            orientations: 10,
            pixels_per_cell: (5, 5),
            cells_per_block: (2, 2),
            block_norm: BlockNorm::L2Hys,
        }
    }
}

impl HogConfig {
    /// Create a configuration with the default block normalisation.
    pub fn new(
        orientations: usize,
        pixels_per_cell: (usize, usize),
        cells_per_block: (usize, usize),
    ) -> Self {
        Self {
            orientations,
            pixels_per_cell,
            cells_per_block,
            block_norm: BlockNorm::default(),
        }
    }

    /// Set block normalisation.
    pub fn with_block_norm(mut self, block_norm: BlockNorm) -> Self {
        self.block_norm = block_norm;
        self
    }

    fn cell_grid(&self, shape: (usize, usize)) -> (usize, usize) {
        (shape.0 / self.pixels_per_cell.0, shape.1 / self.pixels_per_cell.1)
    }

    fn block_grid(&self, shape: (usize, usize)) -> Result<(usize, usize)> {
        if self.orientations == 0 {
            return Err(ModelError::InvalidConfig("orientations must be positive".to_string()));
        }
        if self.pixels_per_cell.0 == 0 || self.pixels_per_cell.1 == 0 {
            return Err(ModelError::InvalidConfig("pixels_per_cell must be positive".to_string()));
        }
        if self.cells_per_block.0 == 0 || self.cells_per_block.1 == 0 {
            return Err(ModelError::InvalidConfig("cells_per_block must be positive".to_string()));
        }

        let (cells_r, cells_c) = self.cell_grid(shape);
        if cells_r < self.cells_per_block.0 || cells_c < self.cells_per_block.1 {
            return Err(ModelError::InvalidConfig(format!(
                "{:?} sample holds {}x{} cells of {:?} pixels, fewer than a {:?} block",
                shape, cells_r, cells_c, self.pixels_per_cell, self.cells_per_block
            )));
        }

        Ok((
            cells_r - self.cells_per_block.0 + 1,
            cells_c - self.cells_per_block.1 + 1,
        ))
    }

    /// Check the configuration against a sample shape.
    pub fn validate(&self, shape: (usize, usize)) -> Result<()> {
        self.block_grid(shape).map(|_| ())
    }

    /// Length of the descriptor produced for samples of `shape`.
    pub fn feature_len(&self, shape: (usize, usize)) -> Result<usize> {
        let (blocks_r, blocks_c) = self.block_grid(shape)?;
        Ok(blocks_r * blocks_c * self.cells_per_block.0 * self.cells_per_block.1 * self.orientations)
    }

    /// Compute the descriptor of a single sample.
    pub fn extract(&self, sample: ArrayView2<'_, f32>) -> Result<Array1<f32>> {
        let shape = sample.dim();
        let (blocks_r, blocks_c) = self.block_grid(shape)?;
        let histograms = self.cell_histograms(sample);

        let (br, bc) = self.cells_per_block;
        let block_len = br * bc * self.orientations;
        let mut features = Vec::with_capacity(blocks_r * blocks_c * block_len);
        let mut block = Vec::with_capacity(block_len);

        for r in 0..blocks_r {
            for c in 0..blocks_c {
                block.clear();
                block.extend(histograms.slice(s![r..r + br, c..c + bc, ..]).iter().copied());
                normalize_block(&mut block, self.block_norm);
                features.extend_from_slice(&block);
            }
        }

        Ok(Array1::from(features))
    }

    /// Compute descriptors for a batch of flattened samples.
    ///
    /// Each row of `samples` must hold `shape.0 * shape.1` values in row-major
    /// order. The output has one descriptor per row.
    pub fn extract_batch(
        &self,
        samples: ArrayView2<'_, f32>,
        shape: (usize, usize),
    ) -> Result<Array2<f32>> {
        let expected = shape.0 * shape.1;
        if samples.ncols() != expected {
            return Err(ModelError::Incompatible {
                expected,
                actual: samples.ncols(),
            });
        }

        let len = self.feature_len(shape)?;
        let mut out = Array2::<f32>::zeros((samples.nrows(), len));

        for (row, mut target) in samples.rows().into_iter().zip(out.rows_mut()) {
            let sample = row
                .to_owned()
                .into_shape_with_order(shape)
                .map_err(|e| ModelError::InvalidInput(e.to_string()))?;
            target.assign(&self.extract(sample.view())?);
        }

        Ok(out)
    }

    /// Mean gradient magnitude per (cell row, cell col, orientation bin).
    fn cell_histograms(&self, sample: ArrayView2<'_, f32>) -> Array3<f32> {
        let (rows, cols) = sample.dim();
        let (cells_r, cells_c) = self.cell_grid((rows, cols));
        let (cell_h, cell_w) = self.pixels_per_cell;
        let bins = self.orientations;
        let bin_width = 180.0 / bins as f32;
        let cell_area = (cell_h * cell_w) as f32;

        let mut hist = Array3::<f32>::zeros((cells_r, cells_c, bins));

        for r in 0..cells_r * cell_h {
            for c in 0..cols.min(cells_c * cell_w) {
                let g_row = if r > 0 && r + 1 < rows {
                    sample[[r + 1, c]] - sample[[r - 1, c]]
                } else {
                    0.0
                };
                let g_col = if c > 0 && c + 1 < cols {
                    sample[[r, c + 1]] - sample[[r, c - 1]]
                } else {
                    0.0
                };

                let magnitude = g_row.hypot(g_col);
                if magnitude == 0.0 {
                    continue;
                }

                let angle = g_row.atan2(g_col).to_degrees().rem_euclid(180.0);
                let bin = ((angle / bin_width) as usize).min(bins - 1);
                hist[[r / cell_h, c / cell_w, bin]] += magnitude / cell_area;
            }
        }

        hist
    }
}

fn normalize_block(block: &mut [f32], norm: BlockNorm) {
    match norm {
        BlockNorm::L1 => {
            let sum: f32 = block.iter().map(|v| v.abs()).sum::<f32>() + NORM_EPS;
            block.iter_mut().for_each(|v| *v /= sum);
        }
        BlockNorm::L1Sqrt => {
            let sum: f32 = block.iter().map(|v| v.abs()).sum::<f32>() + NORM_EPS;
            block.iter_mut().for_each(|v| *v = (*v / sum).sqrt());
        }
        BlockNorm::L2 => l2_normalize(block),
        BlockNorm::L2Hys => {
            l2_normalize(block);
            block.iter_mut().for_each(|v| *v = v.min(HYS_CLIP));
            l2_normalize(block);
        }
    }
}

fn l2_normalize(block: &mut [f32]) {
    let norm = (block.iter().map(|v| v * v).sum::<f32>() + NORM_EPS * NORM_EPS).sqrt();
    block.iter_mut().for_each(|v| *v /= norm);
}
