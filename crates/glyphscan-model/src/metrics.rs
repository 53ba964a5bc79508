//! Classification metrics.

use std::collections::BTreeSet;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::predictor::Label;

/// Fraction of positions where `predicted` matches `truth`.
///
/// Returns 0.0 for empty input.
pub fn accuracy(truth: &[Label], predicted: &[Label]) -> f64 {
    let total = truth.len().min(predicted.len());
    if total == 0 {
        return 0.0;
    }
    let correct = truth
        .iter()
        .zip(predicted)
        .filter(|(t, p)| t == p)
        .count();
    correct as f64 / total as f64
}

/// Counts of (true label, predicted label) pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Sorted union of true and predicted labels.
    pub labels: Vec<Label>,
    /// `counts[[t, p]]` is the number of samples of class `labels[t]`
    /// predicted as `labels[p]`.
    pub counts: Array2<usize>,
}

impl ConfusionMatrix {
    pub fn new(truth: &[Label], predicted: &[Label]) -> Self {
        let labels: Vec<Label> = truth
            .iter()
            .chain(predicted)
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut counts = Array2::<usize>::zeros((labels.len(), labels.len()));
        for (t, p) in truth.iter().zip(predicted) {
            // Both are present by construction.
            let ti = labels.binary_search(t).unwrap_or_default();
            let pi = labels.binary_search(p).unwrap_or_default();
            counts[[ti, pi]] += 1;
        }

        Self { labels, counts }
    }

    /// Accuracy recovered from the diagonal.
    pub fn accuracy(&self) -> f64 {
        let total: usize = self.counts.sum();
        if total == 0 {
            return 0.0;
        }
        self.counts.diag().sum() as f64 / total as f64
    }

    /// Per-class recall, in label order.
    pub fn recall(&self) -> Vec<(Label, f64)> {
        self.labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let row: usize = self.counts.row(i).sum();
                let recall = if row == 0 {
                    0.0
                } else {
                    self.counts[[i, i]] as f64 / row as f64
                };
                (*label, recall)
            })
            .collect()
    }
}
