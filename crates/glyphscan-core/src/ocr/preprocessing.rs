//! Page image loading and preprocessing.

use std::path::Path;

use image::{DynamicImage, ImageBuffer, Luma, imageops::FilterType};
use ndarray::{Array2, ArrayView2, Zip};
use tracing::debug;

use crate::error::InputError;
use crate::models::candidate::BoundingBox;
use crate::models::config::Polarity;

/// Number of histogram bins used for Otsu thresholding.
const OTSU_BINS: usize = 256;

/// Grayscale page image with intensities in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PageImage {
    pixels: Array2<f32>,
}

impl PageImage {
    /// Decode an image file and convert it to grayscale.
    pub fn open(path: &Path) -> Result<Self, InputError> {
        let image = image::open(path).map_err(|source| InputError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded {} ({}x{})", path.display(), image.width(), image.height());
        Self::from_dynamic(&image)
    }

    /// Convert a decoded image to grayscale.
    pub fn from_dynamic(image: &DynamicImage) -> Result<Self, InputError> {
        let luma = image.to_luma32f();
        let (width, height) = luma.dimensions();
        let pixels = Array2::from_shape_vec((height as usize, width as usize), luma.into_raw())
            .map_err(|e| InputError::InvalidDimensions(e.to_string()))?;
        Self::from_array(pixels)
    }

    /// Wrap a `(rows, cols)` array of intensities in `[0, 1]`.
    pub fn from_array(pixels: Array2<f32>) -> Result<Self, InputError> {
        if pixels.is_empty() {
            return Err(InputError::Empty);
        }
        if pixels.iter().any(|v| !v.is_finite()) {
            return Err(InputError::InvalidDimensions("non-finite intensity".to_string()));
        }
        Ok(Self {
            pixels: pixels.mapv(|v| v.clamp(0.0, 1.0)),
        })
    }

    pub fn pixels(&self) -> ArrayView2<'_, f32> {
        self.pixels.view()
    }

    /// Size as (rows, cols).
    pub fn dim(&self) -> (usize, usize) {
        self.pixels.dim()
    }

    /// View of the pixels inside `bbox`.
    pub fn crop(&self, bbox: &BoundingBox) -> ArrayView2<'_, f32> {
        self.pixels
            .slice(ndarray::s![bbox.row_min..bbox.row_max, bbox.col_min..bbox.col_max])
    }
}

/// Resize a crop to `(rows, cols)` with a triangle (bilinear) filter.
pub fn resize(crop: ArrayView2<'_, f32>, (rows, cols): (usize, usize)) -> Result<Array2<f32>, InputError> {
    let (h, w) = crop.dim();
    let data: Vec<f32> = crop.iter().copied().collect();
    let buffer: ImageBuffer<Luma<f32>, Vec<f32>> = ImageBuffer::from_raw(w as u32, h as u32, data)
        .ok_or_else(|| InputError::InvalidDimensions(format!("cannot resize {}x{} crop", h, w)))?;

    let resized = image::imageops::resize(&buffer, cols as u32, rows as u32, FilterType::Triangle);

    Array2::from_shape_vec((rows, cols), resized.into_raw())
        .map_err(|e| InputError::InvalidDimensions(e.to_string()))
}

/// Total-variation denoising (Chambolle's projection algorithm).
///
/// Iterates until the relative energy change drops below `tolerance` or
/// `max_iter` iterations have run. A non-positive weight returns the input.
pub fn denoise_tv(image: ArrayView2<'_, f32>, weight: f32, tolerance: f32, max_iter: usize) -> Array2<f32> {
    if weight <= 0.0 {
        return image.to_owned();
    }

    let (rows, cols) = image.dim();
    let size = (rows * cols) as f64;
    let tau = 0.25f32;

    let mut p_row = Array2::<f32>::zeros((rows, cols));
    let mut p_col = Array2::<f32>::zeros((rows, cols));
    let mut g_row = Array2::<f32>::zeros((rows, cols));
    let mut g_col = Array2::<f32>::zeros((rows, cols));
    let mut out = image.to_owned();

    let mut initial_energy = 0.0f64;
    let mut previous_energy = 0.0f64;

    for i in 0..max_iter {
        let mut energy = 0.0f64;

        if i > 0 {
            // out = image - div(p)
            for r in 0..rows {
                for c in 0..cols {
                    let mut d = -p_row[[r, c]] - p_col[[r, c]];
                    if r > 0 {
                        d += p_row[[r - 1, c]];
                    }
                    if c > 0 {
                        d += p_col[[r, c - 1]];
                    }
                    energy += (d as f64) * (d as f64);
                    out[[r, c]] = image[[r, c]] + d;
                }
            }
        }

        for r in 0..rows {
            for c in 0..cols {
                g_row[[r, c]] = if r + 1 < rows { out[[r + 1, c]] - out[[r, c]] } else { 0.0 };
                g_col[[r, c]] = if c + 1 < cols { out[[r, c + 1]] - out[[r, c]] } else { 0.0 };
            }
        }

        let mut norm_sum = 0.0f64;
        Zip::from(&mut p_row)
            .and(&mut p_col)
            .and(&g_row)
            .and(&g_col)
            .for_each(|pr, pc, gr, gc| {
                let norm = gr.hypot(*gc);
                norm_sum += norm as f64;
                let factor = 1.0 + norm * tau / weight;
                *pr = (*pr - tau * gr) / factor;
                *pc = (*pc - tau * gc) / factor;
            });

        energy = (energy + weight as f64 * norm_sum) / size;

        if i == 0 {
            initial_energy = energy;
            previous_energy = energy;
        } else if (previous_energy - energy).abs() <= tolerance as f64 * initial_energy {
            debug!("TV denoising converged after {} iterations", i + 1);
            break;
        } else {
            previous_energy = energy;
        }
    }

    out
}

/// Global threshold maximising the between-class variance of the histogram.
///
/// Returns `None` for an image with a single intensity.
pub fn otsu_threshold(image: ArrayView2<'_, f32>) -> Option<f32> {
    let (min, max) = image
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    if !(max > min) {
        return None;
    }

    let width = (max - min) as f64 / OTSU_BINS as f64;
    let mut hist = [0f64; OTSU_BINS];
    for v in image.iter() {
        let bin = (((*v - min) as f64 / width) as usize).min(OTSU_BINS - 1);
        hist[bin] += 1.0;
    }
    let centers: Vec<f64> = (0..OTSU_BINS)
        .map(|i| min as f64 + width * (i as f64 + 0.5))
        .collect();

    // Class weights and means for "below or at bin i" and "at or above bin i".
    let mut weight_low = [0f64; OTSU_BINS];
    let mut mean_low = [0f64; OTSU_BINS];
    let (mut count, mut sum) = (0.0, 0.0);
    for i in 0..OTSU_BINS {
        count += hist[i];
        sum += hist[i] * centers[i];
        weight_low[i] = count;
        mean_low[i] = if count > 0.0 { sum / count } else { 0.0 };
    }

    let mut weight_high = [0f64; OTSU_BINS];
    let mut mean_high = [0f64; OTSU_BINS];
    let (mut count, mut sum) = (0.0, 0.0);
    for i in (0..OTSU_BINS).rev() {
        count += hist[i];
        sum += hist[i] * centers[i];
        weight_high[i] = count;
        mean_high[i] = if count > 0.0 { sum / count } else { 0.0 };
    }

    let mut best = 0;
    let mut best_variance = f64::NEG_INFINITY;
    for i in 0..OTSU_BINS - 1 {
        let variance = weight_low[i] * weight_high[i + 1] * (mean_low[i] - mean_high[i + 1]).powi(2);
        if variance > best_variance {
            best_variance = variance;
            best = i;
        }
    }

    Some(centers[best] as f32)
}

/// Ink mask for `image` given a threshold. No threshold means no ink.
pub fn binarize(image: ArrayView2<'_, f32>, threshold: Option<f32>, polarity: Polarity) -> Array2<bool> {
    match threshold {
        None => Array2::from_elem(image.dim(), false),
        Some(t) => image.mapv(|v| match polarity {
            Polarity::DarkOnLight => v <= t,
            Polarity::LightOnDark => v > t,
        }),
    }
}

/// Morphological closing with a `size` x `size` square.
///
/// Neighbours outside the image are ignored by both the dilation and the
/// erosion, so every ink pixel of `mask` stays ink.
pub fn closing(mask: ArrayView2<'_, bool>, size: usize) -> Array2<bool> {
    if size <= 1 {
        return mask.to_owned();
    }

    let (rows, cols) = mask.dim();
    let low = (size as isize - 1) / 2;
    let offsets: Vec<isize> = (-low..size as isize - low).collect();

    let shifted = |r: usize, dr: isize, c: usize, dc: isize| -> Option<(usize, usize)> {
        let rr = r.checked_add_signed(dr)?;
        let cc = c.checked_add_signed(dc)?;
        (rr < rows && cc < cols).then_some((rr, cc))
    };

    let dilated = Array2::from_shape_fn((rows, cols), |(r, c)| {
        offsets.iter().any(|&dr| {
            offsets
                .iter()
                .any(|&dc| shifted(r, -dr, c, -dc).is_some_and(|p| mask[p]))
        })
    });

    Array2::from_shape_fn((rows, cols), |(r, c)| {
        offsets.iter().all(|&dr| {
            offsets
                .iter()
                .all(|&dc| shifted(r, dr, c, dc).is_none_or(|p| dilated[p]))
        })
    })
}
