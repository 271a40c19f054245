//! Model preparation: reuse the stored artifact or fit a fresh, tuned one.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ForecastError, ModelError};
use crate::features::{FeatureSchema, FeatureSet};
use crate::gbt::{BoostParams, GradientBoostedTrees};
use crate::metrics::ValidationMetrics;
use crate::regressor::Regressor;
use crate::tuning::{TuningConfig, TuningOutcome, tune};

/// Persistence seam for the serialized model artifact.
pub trait ModelStore: Send + Sync {
    fn load(&self) -> Result<Option<GradientBoostedTrees>, ModelError>;
    fn save(&self, model: &GradientBoostedTrees) -> Result<(), ModelError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelRefresh {
    /// Use the stored model when one fits the current feature schema.
    ReuseStored,
    /// Always tune and fit a new model.
    Refit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ModelSource {
    Loaded,
    /// `tuning` is `None` when the training set was too small for cross-validation
    /// and default parameters were used.
    Fitted { tuning: Option<TuningOutcome> },
}

#[derive(Debug, Clone)]
pub struct PreparedModel {
    pub model: GradientBoostedTrees,
    pub source: ModelSource,
    /// Held-out metrics; `None` when the test window is empty.
    pub validation: Option<ValidationMetrics>,
}

/// Load or fit the model for `features`, persist it when freshly fitted, and score it
/// on the held-out test rows.
///
/// A fitted model is saved regardless of its validation score.
pub fn prepare_model(
    store: &dyn ModelStore,
    features: &FeatureSet,
    refresh: ModelRefresh,
    tuning: &TuningConfig,
) -> Result<PreparedModel, ForecastError> {
    let stored = match refresh {
        ModelRefresh::ReuseStored => match store.load()? {
            Some(model) if model.n_features() == features.schema.width() => Some(model),
            Some(model) => {
                warn!(
                    stored = model.n_features(),
                    expected = features.schema.width(),
                    "stored model does not match the feature schema; refitting"
                );
                None
            }
            None => None,
        },
        ModelRefresh::Refit => None,
    };

    let (model, source) = match stored {
        Some(model) => {
            info!(trees = model.tree_count(), "reusing stored model");
            (model, ModelSource::Loaded)
        }
        None => {
            let (model, outcome) = fit_tuned(features, tuning)?;
            store.save(&model)?;
            info!(trees = model.tree_count(), "fitted and saved model");
            (model, ModelSource::Fitted { tuning: outcome })
        }
    };

    let validation = if features.test.is_empty() {
        None
    } else {
        let predicted = model.predict(&features.test.rows)?;
        let metrics = ValidationMetrics::compute(&features.test.targets, &predicted)?;
        info!(
            mae = metrics.mae,
            rmse = metrics.rmse,
            r2 = metrics.r2,
            mape = metrics.mape,
            samples = metrics.samples,
            "validation metrics"
        );
        Some(metrics)
    };

    Ok(PreparedModel {
        model,
        source,
        validation,
    })
}

fn fit_tuned(
    features: &FeatureSet,
    tuning: &TuningConfig,
) -> Result<(GradientBoostedTrees, Option<TuningOutcome>), ForecastError> {
    if features.train.is_empty() {
        return Err(ForecastError::ModelUnavailable("no training data".to_string()));
    }

    let outcome = match tune(&features.train, tuning) {
        Ok(outcome) => Some(outcome),
        Err(ModelError::InsufficientData(reason)) => {
            warn!(rows = features.train.len(), %reason, "too little history to tune; using default parameters");
            None
        }
        Err(err) => return Err(ForecastError::ModelUnavailable(err.to_string())),
    };
    let params = outcome.map(|o| o.best_params).unwrap_or(BoostParams {
        seed: tuning.seed,
        ..BoostParams::default()
    });

    let model = GradientBoostedTrees::fit(params, &features.train)
        .map_err(|err| ForecastError::ModelUnavailable(err.to_string()))?;
    Ok((model, outcome))
}

/// Load the stored model for forecasting without fitting.
pub fn load_model(store: &dyn ModelStore, schema: &FeatureSchema) -> Result<GradientBoostedTrees, ForecastError> {
    let Some(model) = store.load()? else {
        return Err(ForecastError::ModelUnavailable("no trained model is stored".to_string()));
    };
    if model.n_features() != schema.width() {
        return Err(ForecastError::ModelUnavailable(format!(
            "stored model expects {} features but the current panel produces {}; retrain first",
            model.n_features(),
            schema.width()
        )));
    }
    Ok(model)
}
