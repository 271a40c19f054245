//! Bounded hyperparameter search under time-series cross-validation.

use std::ops::Range;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ModelError;
use crate::features::Dataset;
use crate::gbt::{BoostParams, GradientBoostedTrees};
use crate::metrics::mean_absolute_error;
use crate::regressor::Regressor;

/// Inclusive bounds for every tuned parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSpace {
    pub n_estimators: (u32, u32),
    pub max_depth: (u32, u32),
    /// Sampled log-uniformly.
    pub learning_rate: (f64, f64),
    pub subsample: (f64, f64),
    pub colsample_bytree: (f64, f64),
    pub reg_alpha: (f64, f64),
    pub reg_lambda: (f64, f64),
    pub min_child_weight: (f64, f64),
    pub gamma: (f64, f64),
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self {
            n_estimators: (100, 400),
            max_depth: (3, 8),
            learning_rate: (0.01, 0.15),
            subsample: (0.8, 1.0),
            colsample_bytree: (0.8, 1.0),
            reg_alpha: (0.0, 0.1),
            reg_lambda: (0.5, 2.0),
            min_child_weight: (1.0, 4.0),
            gamma: (0.0, 0.5),
        }
    }
}

impl SearchSpace {
    pub fn validate(&self) -> Result<(), ModelError> {
        let ordered = |name: &str, lo: f64, hi: f64| {
            if lo.is_finite() && hi.is_finite() && lo <= hi {
                Ok(())
            } else {
                Err(ModelError::InvalidInput(format!("search bound {name} is not an ordered pair ({lo}, {hi})")))
            }
        };
        ordered("n_estimators", self.n_estimators.0 as f64, self.n_estimators.1 as f64)?;
        ordered("max_depth", self.max_depth.0 as f64, self.max_depth.1 as f64)?;
        ordered("learning_rate", self.learning_rate.0, self.learning_rate.1)?;
        ordered("subsample", self.subsample.0, self.subsample.1)?;
        ordered("colsample_bytree", self.colsample_bytree.0, self.colsample_bytree.1)?;
        ordered("reg_alpha", self.reg_alpha.0, self.reg_alpha.1)?;
        ordered("reg_lambda", self.reg_lambda.0, self.reg_lambda.1)?;
        ordered("min_child_weight", self.min_child_weight.0, self.min_child_weight.1)?;
        ordered("gamma", self.gamma.0, self.gamma.1)?;
        if self.learning_rate.0 <= 0.0 {
            return Err(ModelError::InvalidInput("learning_rate lower bound must be positive".to_string()));
        }
        if self.n_estimators.0 == 0 {
            return Err(ModelError::InvalidInput("n_estimators lower bound must be >= 1".to_string()));
        }
        Ok(())
    }

    fn sample(&self, rng: &mut StdRng, seed: u64) -> BoostParams {
        let (lr_lo, lr_hi) = self.learning_rate;
        BoostParams {
            n_estimators: rng.gen_range(self.n_estimators.0..=self.n_estimators.1),
            max_depth: rng.gen_range(self.max_depth.0..=self.max_depth.1),
            learning_rate: rng.gen_range(lr_lo.ln()..=lr_hi.ln()).exp(),
            subsample: rng.gen_range(self.subsample.0..=self.subsample.1),
            colsample_bytree: rng.gen_range(self.colsample_bytree.0..=self.colsample_bytree.1),
            reg_alpha: rng.gen_range(self.reg_alpha.0..=self.reg_alpha.1),
            reg_lambda: rng.gen_range(self.reg_lambda.0..=self.reg_lambda.1),
            min_child_weight: rng.gen_range(self.min_child_weight.0..=self.min_child_weight.1),
            gamma: rng.gen_range(self.gamma.0..=self.gamma.1),
            seed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    pub trials: u32,
    pub cv_splits: usize,
    pub seed: u64,
    pub space: SearchSpace,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            trials: 1,
            cv_splits: 3,
            seed: 42,
            space: SearchSpace::default(),
        }
    }
}

impl TuningConfig {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.trials == 0 {
            return Err(ModelError::InvalidInput("trials must be >= 1".to_string()));
        }
        if self.cv_splits < 2 {
            return Err(ModelError::InvalidInput("cv_splits must be >= 2".to_string()));
        }
        self.space.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TuningOutcome {
    pub best_params: BoostParams,
    /// Mean cross-validated MAE of the best trial.
    pub best_mae: f64,
    pub trials: u32,
}

/// Expanding-window folds over time-ordered rows.
///
/// Each fold tests on the next `n / (splits + 1)` rows and trains on everything
/// before them; the last fold ends at `n`.
pub fn time_series_splits(n: usize, splits: usize) -> Result<Vec<(Range<usize>, Range<usize>)>, ModelError> {
    if splits == 0 {
        return Err(ModelError::InvalidInput("splits must be >= 1".to_string()));
    }
    let test_size = n / (splits + 1);
    if test_size == 0 {
        return Err(ModelError::InsufficientData(format!(
            "{n} rows cannot be split into {splits} time-series folds"
        )));
    }
    let first_test = n - splits * test_size;
    Ok((0..splits)
        .map(|k| {
            let start = first_test + k * test_size;
            (0..start, start..start + test_size)
        })
        .collect())
}

/// Random search minimizing cross-validated MAE.
pub fn tune(data: &Dataset, config: &TuningConfig) -> Result<TuningOutcome, ModelError> {
    config.validate()?;
    let folds = time_series_splits(data.len(), config.cv_splits)?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut best: Option<(BoostParams, f64)> = None;

    for trial in 0..config.trials {
        let params = config.space.sample(&mut rng, config.seed);
        let mut fold_mae = Vec::with_capacity(folds.len());
        for (train, test) in &folds {
            let model = GradientBoostedTrees::fit(params, &data.slice(train.clone()))?;
            let holdout = data.slice(test.clone());
            let predicted = model.predict(&holdout.rows)?;
            fold_mae.push(mean_absolute_error(&holdout.targets, &predicted)?);
        }
        let score = fold_mae.iter().sum::<f64>() / fold_mae.len() as f64;
        debug!(trial, mae = score, "tuning trial finished");

        if score.is_finite() && best.as_ref().is_none_or(|(_, b)| score < *b) {
            best = Some((params, score));
        }
    }

    let Some((best_params, best_mae)) = best else {
        return Err(ModelError::InvalidInput("no trial produced a finite score".to_string()));
    };
    info!(trials = config.trials, best_mae, "hyperparameter search finished");
    Ok(TuningOutcome {
        best_params,
        best_mae,
        trials: config.trials,
    })
}
