//! One-vs-rest linear support vector machine.
//!
//! Each binary problem minimises the L2-regularised squared hinge loss with
//! dual coordinate descent (Hsieh et al., 2008). Samples are visited in index
//! order, so training is a pure function of the data and parameters.

use std::collections::BTreeSet;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::predictor::Label;
use crate::{ModelError, Result};

/// Linear SVM training parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvmParams {
    /// Inverse regularisation strength.
    pub c: f32,

    /// Stopping tolerance on the projected-gradient spread.
    pub tol: f32,

    /// Maximum passes over the training data per binary problem.
    pub max_iter: usize,

    /// Value of the constant feature used to learn the intercept.
    pub bias: f32,
}

impl Default for SvmParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            tol: 1e-3,
            max_iter: 1000,
            bias: 1.0,
        }
    }
}

impl SvmParams {
    /// Create parameters with the given regularisation strength.
    pub fn with_c(c: f32) -> Self {
        Self {
            c,
            ..Self::default()
        }
    }
}

/// Trained linear classifier.
///
/// With two classes a single hyperplane separates `classes[1]` (positive side)
/// from `classes[0]`. With more classes there is one hyperplane per class and
/// the highest decision value wins. A model trained on a single class always
/// predicts that class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearSvm {
    classes: Vec<Label>,
    weights: Array2<f32>,
    intercepts: Array1<f32>,
    params: SvmParams,
}

impl LinearSvm {
    /// Train a classifier on one feature vector per row.
    pub fn fit(features: ArrayView2<'_, f32>, labels: &[Label], params: &SvmParams) -> Result<Self> {
        if features.nrows() != labels.len() {
            return Err(ModelError::InvalidInput(format!(
                "{} feature rows but {} labels",
                features.nrows(),
                labels.len()
            )));
        }
        if labels.is_empty() {
            return Err(ModelError::Training("no training samples".to_string()));
        }
        if !(params.c > 0.0) {
            return Err(ModelError::InvalidConfig(format!("C must be positive, got {}", params.c)));
        }

        let classes: Vec<Label> = labels.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        let dim = features.ncols();

        let positives: Vec<Label> = match classes.len() {
            1 => Vec::new(),
            2 => vec![classes[1]],
            _ => classes.clone(),
        };

        let mut weights = Array2::<f32>::zeros((positives.len(), dim));
        let mut intercepts = Array1::<f32>::zeros(positives.len());

        for (k, positive) in positives.iter().enumerate() {
            let targets: Vec<f64> = labels
                .iter()
                .map(|l| if l == positive { 1.0 } else { -1.0 })
                .collect();
            let (w, b) = train_binary(features, &targets, params);
            weights.row_mut(k).assign(&w);
            intercepts[k] = b;
        }

        debug!(
            "Trained linear SVM: {} classes, {} hyperplanes, {} features, C={}",
            classes.len(),
            positives.len(),
            dim,
            params.c
        );

        Ok(Self {
            classes,
            weights,
            intercepts,
            params: *params,
        })
    }

    /// Classes known to the model, sorted.
    pub fn classes(&self) -> &[Label] {
        &self.classes
    }

    /// Number of features per input row.
    pub fn feature_len(&self) -> usize {
        self.weights.ncols()
    }

    /// Parameters the model was trained with.
    pub fn params(&self) -> &SvmParams {
        &self.params
    }

    /// Decision values, one column per hyperplane.
    pub fn decision_function(&self, features: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        if features.ncols() != self.feature_len() {
            return Err(ModelError::Incompatible {
                expected: self.feature_len(),
                actual: features.ncols(),
            });
        }

        let mut scores = features.dot(&self.weights.t());
        scores += &self.intercepts.view().insert_axis(Axis(0));
        Ok(scores)
    }

    /// Predict one label per row.
    pub fn predict(&self, features: ArrayView2<'_, f32>) -> Result<Vec<Label>> {
        let scores = self.decision_function(features)?;

        let labels = scores
            .rows()
            .into_iter()
            .map(|row| match self.classes.len() {
                1 => self.classes[0],
                2 => {
                    if row[0] > 0.0 {
                        self.classes[1]
                    } else {
                        self.classes[0]
                    }
                }
                _ => self.classes[argmax(row)],
            })
            .collect();

        Ok(labels)
    }
}

/// First index of the maximum value.
fn argmax(row: ArrayView1<'_, f32>) -> usize {
    let mut best = 0;
    for (i, v) in row.iter().enumerate() {
        if *v > row[best] {
            best = i;
        }
    }
    best
}

fn train_binary(x: ArrayView2<'_, f32>, y: &[f64], params: &SvmParams) -> (Array1<f32>, f32) {
    let (n, dim) = x.dim();
    let diag = 0.5 / params.c as f64;
    let bias = params.bias as f64;

    let mut w = vec![0.0f64; dim];
    let mut b = 0.0f64;
    let mut alpha = vec![0.0f64; n];

    let q_diag: Vec<f64> = x
        .rows()
        .into_iter()
        .map(|row| row.iter().map(|v| (*v as f64) * (*v as f64)).sum::<f64>() + bias * bias + diag)
        .collect();

    let mut converged = false;
    let mut passes = 0;

    while passes < params.max_iter {
        passes += 1;
        let mut pg_max = f64::NEG_INFINITY;
        let mut pg_min = f64::INFINITY;

        for i in 0..n {
            let row = x.row(i);
            let margin = row
                .iter()
                .zip(&w)
                .map(|(xv, wv)| *xv as f64 * wv)
                .sum::<f64>()
                + b * bias;

            let g = y[i] * margin - 1.0 + diag * alpha[i];
            let pg = if alpha[i] == 0.0 { g.min(0.0) } else { g };

            pg_max = pg_max.max(pg);
            pg_min = pg_min.min(pg);

            if pg.abs() > 1e-12 {
                let old = alpha[i];
                alpha[i] = (old - g / q_diag[i]).max(0.0);
                let delta = (alpha[i] - old) * y[i];
                for (wv, xv) in w.iter_mut().zip(row.iter()) {
                    *wv += delta * *xv as f64;
                }
                b += delta * bias;
            }
        }

        if pg_max - pg_min < params.tol as f64 {
            converged = true;
            break;
        }
    }

    if !converged {
        debug!("Coordinate descent stopped after {} passes without converging", passes);
    }

    let w = Array1::from_iter(w.into_iter().map(|v| v as f32));
    (w, (b * bias) as f32)
}
