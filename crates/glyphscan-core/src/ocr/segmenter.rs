//! Connected-component glyph segmentation.

use ndarray::{Array2, ArrayView2};
use tracing::debug;

use crate::error::Result;
use crate::models::candidate::{BoundingBox, Candidate, CandidateSet};
use crate::models::config::{Connectivity, SegmentationConfig};

use super::preprocessing::{self, PageImage};

/// Label given to pixels that only exist because of the closing.
pub const EXCLUDED: i32 = -1;

/// Intermediate masks of a segmentation run.
#[derive(Debug, Clone)]
pub struct Foreground {
    /// Denoised intensities.
    pub denoised: Array2<f32>,
    /// Otsu threshold of the denoised image, `None` without contrast.
    pub threshold: Option<f32>,
    /// Ink mask before closing.
    pub binary: Array2<bool>,
    /// Ink mask after closing.
    pub closed: Array2<bool>,
}

/// Component label map.
///
/// `0` is background, [`EXCLUDED`] marks closing-only pixels and components
/// are numbered from `1` in row-major discovery order.
#[derive(Debug, Clone)]
pub struct LabelMap {
    pub labels: Array2<i32>,
    pub count: usize,
}

#[derive(Debug, Clone, Copy)]
struct Region {
    area: usize,
    row_min: usize,
    col_min: usize,
    row_max: usize,
    col_max: usize,
}

impl Region {
    fn empty() -> Self {
        Self {
            area: 0,
            row_min: usize::MAX,
            col_min: usize::MAX,
            row_max: 0,
            col_max: 0,
        }
    }

    fn add(&mut self, r: usize, c: usize) {
        self.area += 1;
        self.row_min = self.row_min.min(r);
        self.col_min = self.col_min.min(c);
        self.row_max = self.row_max.max(r + 1);
        self.col_max = self.col_max.max(c + 1);
    }

    fn bbox(&self) -> BoundingBox {
        BoundingBox::new(self.row_min, self.col_min, self.row_max, self.col_max)
    }
}

/// Splits a page into candidate glyph regions.
#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    config: SegmentationConfig,
}

impl Segmenter {
    pub fn new(config: SegmentationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// Denoise, threshold and close the page.
    pub fn foreground(&self, image: &PageImage) -> Foreground {
        let denoised = preprocessing::denoise_tv(
            image.pixels(),
            self.config.denoise_weight,
            self.config.denoise_tolerance,
            self.config.denoise_max_iter,
        );
        let threshold = preprocessing::otsu_threshold(denoised.view());
        let binary = preprocessing::binarize(denoised.view(), threshold, self.config.polarity);
        let closed = preprocessing::closing(binary.view(), self.config.closing_size);

        debug!("Otsu threshold: {:?}", threshold);

        Foreground {
            denoised,
            threshold,
            binary,
            closed,
        }
    }

    /// Label the components of `foreground.closed`, excluding pixels added
    /// by the closing.
    pub fn label(&self, foreground: &Foreground) -> LabelMap {
        let mut map = label_components(foreground.closed.view(), self.config.connectivity);
        ndarray::Zip::from(&mut map.labels)
            .and(&foreground.binary)
            .and(&foreground.closed)
            .for_each(|label, before, after| {
                if before ^ after {
                    *label = EXCLUDED;
                }
            });
        map
    }

    /// Find candidate glyphs in `image`.
    pub fn segment(&self, image: &PageImage) -> Result<CandidateSet> {
        let dims = image.dim();
        let foreground = self.foreground(image);
        let map = self.label(&foreground);

        let mut regions = vec![Region::empty(); map.count];
        for ((r, c), label) in map.labels.indexed_iter() {
            if *label > 0 {
                regions[*label as usize - 1].add(r, c);
            }
        }

        let mut candidates = Vec::new();
        for region in regions.iter().filter(|r| r.area > self.config.min_area) {
            let bbox = region.bbox();
            let Some(crop_box) = bbox.expand_clamped(self.config.margin, dims) else {
                debug!("Dropping zero-area crop for {:?}", bbox);
                continue;
            };

            let sample = preprocessing::resize(image.crop(&crop_box), self.config.sample_shape)?;
            candidates.push(Candidate {
                bbox,
                crop_box,
                sample,
            });
        }

        debug!(
            "Segmented {} components into {} candidates",
            map.count,
            candidates.len()
        );

        Ok(CandidateSet::new(dims, self.config.sample_shape, candidates))
    }
}

/// Label connected components of `mask` in row-major discovery order.
pub fn label_components(mask: ArrayView2<'_, bool>, connectivity: Connectivity) -> LabelMap {
    let (rows, cols) = mask.dim();
    let mut labels = Array2::<i32>::zeros((rows, cols));
    let mut count = 0usize;

    let neighbours: &[(isize, isize)] = match connectivity {
        Connectivity::Four => &[(-1, 0), (1, 0), (0, -1), (0, 1)],
        Connectivity::Eight => &[
            (-1, -1),
            (-1, 0),
            (-1, 1),
            (0, -1),
            (0, 1),
            (1, -1),
            (1, 0),
            (1, 1),
        ],
    };

    for r in 0..rows {
        for c in 0..cols {
            if !mask[[r, c]] || labels[[r, c]] != 0 {
                continue;
            }

            count += 1;
            let label = count as i32;
            labels[[r, c]] = label;
            let mut stack = vec![(r, c)];

            while let Some((y, x)) = stack.pop() {
                for &(dy, dx) in neighbours {
                    let (Some(ny), Some(nx)) = (y.checked_add_signed(dy), x.checked_add_signed(dx)) else {
                        continue;
                    };
                    if ny >= rows || nx >= cols || !mask[[ny, nx]] || labels[[ny, nx]] != 0 {
                        continue;
                    }
                    labels[[ny, nx]] = label;
                    stack.push((ny, nx));
                }
            }
        }
    }

    LabelMap { labels, count }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn page(rows: usize, cols: usize, ink: &[(usize, usize, usize, usize)]) -> PageImage {
        let pixels = Array2::from_shape_fn((rows, cols), |(r, c)| {
            let inked = ink
                .iter()
                .any(|&(r0, c0, r1, c1)| r >= r0 && r < r1 && c >= c0 && c < c1);
            if inked { 0.0 } else { 1.0 }
        });
        PageImage::from_array(pixels).unwrap()
    }

    #[test]
    fn test_blank_image_has_no_candidates() {
        let set = Segmenter::default().segment(&page(40, 40, &[])).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.image_size(), (40, 40));
    }

    #[test]
    fn test_single_square() {
        let set = Segmenter::default()
            .segment(&page(40, 40, &[(15, 15, 25, 25)]))
            .unwrap();

        assert_eq!(set.len(), 1);
        let candidate = &set.candidates()[0];
        let bbox = candidate.bbox;
        assert!(bbox.row_min.abs_diff(15) <= 1 && bbox.col_min.abs_diff(15) <= 1);
        assert!(bbox.row_max.abs_diff(25) <= 1 && bbox.col_max.abs_diff(25) <= 1);
        assert_eq!(candidate.crop_box, bbox.expand_clamped(3, (40, 40)).unwrap());
        assert_eq!(candidate.sample().dim(), (20, 20));
    }

    #[test]
    fn test_boxes_stay_inside_image() {
        let set = Segmenter::default()
            .segment(&page(30, 30, &[(0, 0, 6, 6), (24, 22, 30, 30), (10, 12, 16, 18)]))
            .unwrap();

        assert_eq!(set.len(), 3);
        for candidate in &set {
            for bbox in [candidate.bbox, candidate.crop_box] {
                assert!(bbox.row_min < bbox.row_max && bbox.row_max <= 30);
                assert!(bbox.col_min < bbox.col_max && bbox.col_max <= 30);
            }
        }
    }

    #[test]
    fn test_candidates_in_discovery_order() {
        let set = Segmenter::default()
            .segment(&page(40, 60, &[(20, 5, 30, 15), (5, 40, 15, 50)]))
            .unwrap();

        let rows: Vec<usize> = set.boxes().iter().map(|b| b.row_min).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0] < rows[1]);
    }

    #[test]
    fn test_small_components_are_ignored() {
        let set = Segmenter::default()
            .segment(&page(40, 40, &[(5, 5, 8, 8), (20, 20, 30, 30)]))
            .unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_connectivity() {
        let mut mask = Array2::from_elem((3, 3), false);
        mask[[0, 0]] = true;
        mask[[1, 1]] = true;
        mask[[2, 2]] = true;

        assert_eq!(label_components(mask.view(), Connectivity::Eight).count, 1);
        let four = label_components(mask.view(), Connectivity::Four);
        assert_eq!(four.count, 3);
        assert_eq!(four.labels[[2, 2]], 3);
    }

    #[test]
    fn test_closing_pixels_are_excluded() {
        let segmenter = Segmenter::default();
        let mut binary = Array2::from_elem((5, 7), false);
        for c in [1, 2, 4, 5] {
            binary[[2, c]] = true;
        }
        let closed = preprocessing::closing(binary.view(), 2);
        let foreground = Foreground {
            denoised: Array2::zeros((5, 7)),
            threshold: None,
            closed,
            binary,
        };

        let map = segmenter.label(&foreground);

        assert_eq!(map.count, 1);
        assert_eq!(map.labels[[2, 3]], EXCLUDED);
        assert_eq!(map.labels[[2, 1]], 1);
        assert_eq!(map.labels[[2, 5]], 1);
    }
}
