//! Gradient-boosted regression trees with squared-error loss.
//!
//! Boosting follows the usual second-order formulation: each round fits a tree to the
//! gradients of the current ensemble, with L1/L2 leaf regularization, a minimum
//! split gain and per-tree row/column subsampling. Training is deterministic for a
//! given seed.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ModelError;
use crate::features::Dataset;
use crate::regressor::Regressor;
use crate::tree::{GrowInput, GrowParams, RegressionTree, grow};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostParams {
    /// Boosting rounds per fit (and per warm start).
    pub n_estimators: u32,
    pub max_depth: u32,
    pub learning_rate: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub reg_alpha: f64,
    pub reg_lambda: f64,
    pub min_child_weight: f64,
    pub gamma: f64,
    pub seed: u64,
}

impl Default for BoostParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: 5,
            learning_rate: 0.05,
            subsample: 0.9,
            colsample_bytree: 0.9,
            reg_alpha: 0.0,
            reg_lambda: 1.0,
            min_child_weight: 1.0,
            gamma: 0.0,
            seed: 42,
        }
    }
}

impl BoostParams {
    pub fn validate(&self) -> Result<(), ModelError> {
        let fraction = |name: &str, v: f64| {
            if v > 0.0 && v <= 1.0 {
                Ok(())
            } else {
                Err(ModelError::InvalidInput(format!("{name} must be in (0, 1], got {v}")))
            }
        };
        if self.n_estimators == 0 {
            return Err(ModelError::InvalidInput("n_estimators must be >= 1".to_string()));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(ModelError::InvalidInput(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        fraction("subsample", self.subsample)?;
        fraction("colsample_bytree", self.colsample_bytree)?;
        for (name, v) in [
            ("reg_alpha", self.reg_alpha),
            ("reg_lambda", self.reg_lambda),
            ("min_child_weight", self.min_child_weight),
            ("gamma", self.gamma),
        ] {
            if !(v >= 0.0 && v.is_finite()) {
                return Err(ModelError::InvalidInput(format!("{name} must be >= 0, got {v}")));
            }
        }
        Ok(())
    }

    fn grow_params(&self) -> GrowParams {
        GrowParams {
            max_depth: self.max_depth,
            learning_rate: self.learning_rate,
            reg_alpha: self.reg_alpha,
            reg_lambda: self.reg_lambda,
            min_child_weight: self.min_child_weight,
            gamma: self.gamma,
        }
    }
}

/// Serializable tree ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    params: BoostParams,
    n_features: usize,
    base_score: f64,
    trees: Vec<RegressionTree>,
}

impl GradientBoostedTrees {
    /// Fit a fresh ensemble. The base score is the target mean.
    pub fn fit(params: BoostParams, data: &Dataset) -> Result<Self, ModelError> {
        params.validate()?;
        let n_features = check_dataset(data, None)?;
        let base_score = data.targets.iter().sum::<f64>() / data.len() as f64;

        let mut model = Self {
            params,
            n_features,
            base_score,
            trees: Vec::with_capacity(params.n_estimators as usize),
        };
        model.boost(data, params.n_estimators);
        Ok(model)
    }

    pub fn params(&self) -> &BoostParams {
        &self.params
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        self.base_score + self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
    }

    fn boost(&mut self, data: &Dataset, rounds: u32) {
        let n_rows = data.len();
        let grow_params = self.params.grow_params();
        let mut predictions: Vec<f64> = data.rows.iter().map(|r| self.predict_row(r)).collect();
        let hess = vec![1.0; n_rows];

        for _ in 0..rounds {
            // Seeded per tree so a warm start continues the sequence it would have had.
            let mut rng = StdRng::seed_from_u64(self.params.seed.wrapping_add(self.trees.len() as u64));
            let sample = draw(&mut rng, n_rows, self.params.subsample);
            let features = draw(&mut rng, self.n_features, self.params.colsample_bytree);

            let grad: Vec<f64> = predictions
                .iter()
                .zip(&data.targets)
                .map(|(p, y)| p - y)
                .collect();
            let input = GrowInput {
                rows: &data.rows,
                grad: &grad,
                hess: &hess,
            };
            let tree = grow(&input, sample, &features, &grow_params);

            for (p, row) in predictions.iter_mut().zip(&data.rows) {
                *p += tree.predict_row(row);
            }
            self.trees.push(tree);
        }
        debug!(rows = n_rows, rounds, trees = self.trees.len(), "boosting rounds finished");
    }
}

impl Regressor for GradientBoostedTrees {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        rows.iter()
            .map(|row| {
                if row.len() != self.n_features {
                    return Err(ModelError::ShapeMismatch {
                        expected: self.n_features,
                        found: row.len(),
                    });
                }
                Ok(self.predict_row(row))
            })
            .collect()
    }

    /// Adds `n_estimators` more rounds on top of the existing trees.
    fn warm_start(&mut self, data: &Dataset) -> Result<(), ModelError> {
        check_dataset(data, Some(self.n_features))?;
        self.boost(data, self.params.n_estimators);
        Ok(())
    }
}

/// Sorted random subset of `0..n` of size `ceil(n * fraction)`, at least 1.
fn draw(rng: &mut StdRng, n: usize, fraction: f64) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }
    let amount = ((n as f64 * fraction).ceil() as usize).clamp(1, n);
    if amount == n {
        return (0..n).collect();
    }
    let mut picked = index::sample(rng, n, amount).into_vec();
    picked.sort_unstable();
    picked
}

fn check_dataset(data: &Dataset, expected_width: Option<usize>) -> Result<usize, ModelError> {
    if data.is_empty() {
        return Err(ModelError::InsufficientData("no training rows".to_string()));
    }
    if data.rows.len() != data.targets.len() {
        return Err(ModelError::InvalidInput(format!(
            "{} rows but {} targets",
            data.rows.len(),
            data.targets.len()
        )));
    }
    let width = expected_width.unwrap_or(data.rows[0].len());
    if let Some(row) = data.rows.iter().find(|r| r.len() != width) {
        return Err(ModelError::ShapeMismatch {
            expected: width,
            found: row.len(),
        });
    }
    if data.targets.iter().any(|y| !y.is_finite()) {
        return Err(ModelError::InvalidInput("targets must be finite".to_string()));
    }
    Ok(width)
}
