//! Candidate glyph regions as they flow through the cascade.

use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use glyphscan_model::Label;

/// Axis-aligned box in source image coordinates.
///
/// `row_max` and `col_max` are exclusive, so a non-empty box always has
/// `row_min < row_max` and `col_min < col_max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub row_min: usize,
    pub col_min: usize,
    pub row_max: usize,
    pub col_max: usize,
}

impl BoundingBox {
    pub fn new(row_min: usize, col_min: usize, row_max: usize, col_max: usize) -> Self {
        Self {
            row_min,
            col_min,
            row_max,
            col_max,
        }
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.row_max.saturating_sub(self.row_min)
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.col_max.saturating_sub(self.col_min)
    }

    /// Area in pixels.
    pub fn area(&self) -> usize {
        self.height() * self.width()
    }

    /// Check if the box covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }

    /// Grow the box by `margin` on every side and clamp it to an image of
    /// `(rows, cols)`.
    ///
    /// Returns `None` when nothing of the grown box lies inside the image.
    pub fn expand_clamped(&self, margin: usize, (rows, cols): (usize, usize)) -> Option<Self> {
        let clamped = Self {
            row_min: self.row_min.saturating_sub(margin).min(rows),
            col_min: self.col_min.saturating_sub(margin).min(cols),
            row_max: (self.row_max + margin).min(rows),
            col_max: (self.col_max + margin).min(cols),
        };
        (!clamped.is_empty()).then_some(clamped)
    }

    /// Coordinates as `[row_min, col_min, row_max, col_max]`.
    pub fn to_array(&self) -> [usize; 4] {
        [self.row_min, self.col_min, self.row_max, self.col_max]
    }
}

/// A region proposed by segmentation as a possible glyph.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Tight box of the connected component.
    pub bbox: BoundingBox,
    /// Margin-expanded, clamped box the sample was cropped from.
    pub crop_box: BoundingBox,
    /// Crop resized to the canonical sample shape.
    pub sample: Array2<f32>,
}

impl Candidate {
    /// The fullscale sample.
    pub fn sample(&self) -> ArrayView2<'_, f32> {
        self.sample.view()
    }

    /// The sample flattened in row-major order.
    pub fn flattened(&self) -> Array1<f32> {
        self.sample.iter().copied().collect()
    }
}

/// Candidates from one image, in discovery order.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateSet {
    image_size: (usize, usize),
    sample_shape: (usize, usize),
    candidates: Vec<Candidate>,
}

impl CandidateSet {
    pub fn new(image_size: (usize, usize), sample_shape: (usize, usize), candidates: Vec<Candidate>) -> Self {
        Self {
            image_size,
            sample_shape,
            candidates,
        }
    }

    /// Source image size as (rows, cols).
    pub fn image_size(&self) -> (usize, usize) {
        self.image_size
    }

    /// Sample shape as (rows, cols).
    pub fn sample_shape(&self) -> (usize, usize) {
        self.sample_shape
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candidate> {
        self.candidates.iter()
    }

    /// Bounding boxes in candidate order.
    pub fn boxes(&self) -> Vec<BoundingBox> {
        self.candidates.iter().map(|c| c.bbox).collect()
    }

    /// All samples flattened, one row per candidate.
    pub fn flattened(&self) -> Array2<f32> {
        let len = self.sample_shape.0 * self.sample_shape.1;
        let mut batch = Array2::<f32>::zeros((self.candidates.len(), len));
        for (mut row, candidate) in batch.rows_mut().into_iter().zip(&self.candidates) {
            row.iter_mut()
                .zip(candidate.sample.iter())
                .for_each(|(dst, src)| *dst = *src);
        }
        batch
    }

    /// New set holding the candidates whose `keep` flag is set.
    pub fn select(&self, keep: &[bool]) -> Self {
        let candidates = self
            .candidates
            .iter()
            .zip(keep)
            .filter(|(_, keep)| **keep)
            .map(|(c, _)| c.clone())
            .collect();
        Self::new(self.image_size, self.sample_shape, candidates)
    }
}

impl<'a> IntoIterator for &'a CandidateSet {
    type Item = &'a Candidate;
    type IntoIter = std::slice::Iter<'a, Candidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.iter()
    }
}

/// A candidate together with its predicted character.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedCandidate {
    pub candidate: Candidate,
    pub label: Label,
}

/// Classified candidates from one image, in discovery order.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedSet {
    image_size: (usize, usize),
    items: Vec<ClassifiedCandidate>,
}

impl ClassifiedSet {
    pub fn new(image_size: (usize, usize), items: Vec<ClassifiedCandidate>) -> Self {
        Self { image_size, items }
    }

    /// Pair each candidate of `set` with the label at the same position.
    pub fn from_labels(set: &CandidateSet, labels: Vec<Label>) -> Self {
        let items = set
            .iter()
            .cloned()
            .zip(labels)
            .map(|(candidate, label)| ClassifiedCandidate { candidate, label })
            .collect();
        Self::new(set.image_size(), items)
    }

    pub fn image_size(&self) -> (usize, usize) {
        self.image_size
    }

    pub fn items(&self) -> &[ClassifiedCandidate] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Predicted labels in candidate order.
    pub fn labels(&self) -> Vec<Label> {
        self.items.iter().map(|i| i.label).collect()
    }

    /// Predicted labels joined in candidate order.
    pub fn text(&self) -> String {
        self.items.iter().map(|i| i.label).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn candidate(r: usize, c: usize, value: f32) -> Candidate {
        let bbox = BoundingBox::new(r, c, r + 4, c + 3);
        Candidate {
            bbox,
            crop_box: bbox,
            sample: Array2::from_elem((2, 2), value),
        }
    }

    #[test]
    fn test_expand_clamped_at_edges() {
        let bbox = BoundingBox::new(1, 2, 6, 8);
        assert_eq!(
            bbox.expand_clamped(3, (20, 9)),
            Some(BoundingBox::new(0, 0, 9, 9))
        );
        assert_eq!(
            bbox.expand_clamped(3, (40, 40)),
            Some(BoundingBox::new(0, 0, 9, 11))
        );
    }

    #[test]
    fn test_expand_clamped_outside_image() {
        let bbox = BoundingBox::new(30, 30, 32, 32);
        assert_eq!(bbox.expand_clamped(1, (20, 20)), None);
    }

    #[test]
    fn test_flattened_batch_keeps_order() {
        let set = CandidateSet::new((10, 10), (2, 2), vec![candidate(0, 0, 0.25), candidate(5, 5, 0.75)]);

        let batch = set.flattened();

        assert_eq!(batch.dim(), (2, 4));
        assert!(batch.row(0).iter().all(|v| *v == 0.25));
        assert!(batch.row(1).iter().all(|v| *v == 0.75));
        assert_eq!(set.candidates()[1].flattened().len(), 4);
    }

    #[test]
    fn test_select_and_classify() {
        let set = CandidateSet::new(
            (10, 10),
            (2, 2),
            vec![candidate(0, 0, 0.1), candidate(1, 1, 0.2), candidate(2, 2, 0.3)],
        );

        let kept = set.select(&[true, false, true]);
        assert_eq!(kept.boxes(), vec![set.boxes()[0], set.boxes()[2]]);
        assert_eq!(set.len(), 3);

        let classified = ClassifiedSet::from_labels(&kept, vec!['a', 'b']);
        assert_eq!(classified.text(), "ab");
        assert_eq!(classified.items()[1].candidate.bbox, set.boxes()[2]);
    }
}
