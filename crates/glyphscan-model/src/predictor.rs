//! The single capability every trained model exposes.

use ndarray::ArrayView2;

use crate::Result;

/// A class label: one character from `0-9`/`a-z`, or `0`/`1` for the
/// text detector.
pub type Label = char;

/// Trait for trained predictors.
///
/// The recognition cascade uses the same trait for the text/no-text filter and
/// the character classifier; which role a predictor plays depends only on
/// which artifact was loaded.
pub trait Predictor: Send + Sync {
    /// Predict one label per row of `samples`.
    ///
    /// # Arguments
    /// * `samples` - One flattened sample per row
    ///
    /// # Returns
    /// Labels in row order. An empty batch yields an empty vector.
    fn predict(&self, samples: ArrayView2<'_, f32>) -> Result<Vec<Label>>;

    /// Number of values per row the predictor expects, if fixed.
    fn input_len(&self) -> Option<usize> {
        None
    }
}

impl<P: Predictor + ?Sized> Predictor for Box<P> {
    fn predict(&self, samples: ArrayView2<'_, f32>) -> Result<Vec<Label>> {
        (**self).predict(samples)
    }

    fn input_len(&self) -> Option<usize> {
        (**self).input_len()
    }
}

impl<P: Predictor + ?Sized> Predictor for &P {
    fn predict(&self, samples: ArrayView2<'_, f32>) -> Result<Vec<Label>> {
        (**self).predict(samples)
    }

    fn input_len(&self) -> Option<usize> {
        (**self).input_len()
    }
}
