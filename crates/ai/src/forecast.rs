//! Walk-forward multi-step forecasting.
//!
//! Each step advances every anchored SKU by one month, derives features from the
//! SKU's history (actuals followed by the predictions of earlier steps), predicts,
//! and optionally warm-starts the model on the step's own predictions before the
//! next step. Model, training set and per-SKU histories are threaded through the
//! steps as plain values.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use stockpulse_core::Sku;
use stockpulse_core::calendar::add_months;

use crate::error::{ForecastError, ModelError};
use crate::features::{Dataset, FeatureSchema, FeatureSet, LagFeatures};
use crate::regressor::Regressor;

/// One predicted month for one SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub product_sku: Sku,
    pub forecast_date: NaiveDate,
    pub predicted_sales: u64,
    /// Last actual monthly quantity of the SKU in the panel.
    pub current_sales: i64,
    /// Month of `current_sales`.
    pub current_date_col: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastRequest {
    /// Restrict the run to these SKUs; `None` forecasts every anchored SKU.
    pub skus: Option<Vec<Sku>>,
    pub n_steps: u32,
    pub retrain_each_step: bool,
}

impl ForecastRequest {
    pub fn all(n_steps: u32, retrain_each_step: bool) -> Self {
        Self {
            skus: None,
            n_steps,
            retrain_each_step,
        }
    }
}

/// Records plus the model and training set as they stand after the last step.
#[derive(Debug)]
pub struct ForecastRun<R> {
    pub records: Vec<ForecastRecord>,
    pub model: R,
    pub train: Dataset,
}

#[derive(Debug, Clone)]
struct Track {
    sku: Sku,
    date: NaiveDate,
    history: Vec<f64>,
    current_sales: i64,
    current_date: NaiveDate,
}

struct StepState<R> {
    model: R,
    train: Dataset,
    tracks: Vec<Track>,
}

/// Run `request.n_steps` forecast steps from the anchors of `features`.
///
/// Output is ordered by (SKU, forecast date). A failing step aborts the whole run.
pub fn forecast<R: Regressor>(
    model: R,
    train: Dataset,
    features: &FeatureSet,
    request: &ForecastRequest,
) -> Result<ForecastRun<R>, ForecastError> {
    if request.n_steps == 0 {
        return Err(ForecastError::Validation("n_steps must be >= 1".to_string()));
    }
    if model.n_features() != features.schema.width() {
        return Err(ForecastError::Model(ModelError::ShapeMismatch {
            expected: features.schema.width(),
            found: model.n_features(),
        }));
    }

    let tracks = select_tracks(features, request.skus.as_deref())?;
    if tracks.is_empty() {
        warn!("no anchored SKUs to forecast");
        return Ok(ForecastRun {
            records: Vec::new(),
            model,
            train,
        });
    }
    info!(
        skus = tracks.len(),
        steps = request.n_steps,
        retrain = request.retrain_each_step,
        anchor = %features.latest_date,
        "starting forecast"
    );

    let mut state = StepState { model, train, tracks };
    let mut records = Vec::with_capacity(state.tracks.len() * request.n_steps as usize);
    for step in 1..=request.n_steps {
        let (next, step_records) = advance(state, step, &features.schema, request.retrain_each_step)?;
        records.extend(step_records);
        state = next;
    }

    records.sort_by(|a, b| {
        a.product_sku
            .cmp(&b.product_sku)
            .then(a.forecast_date.cmp(&b.forecast_date))
    });
    Ok(ForecastRun {
        records,
        model: state.model,
        train: state.train,
    })
}

fn select_tracks(features: &FeatureSet, skus: Option<&[Sku]>) -> Result<Vec<Track>, ForecastError> {
    let wanted: Option<BTreeSet<&Sku>> = match skus {
        Some(list) => {
            if let Some(unknown) = list.iter().find(|s| !features.last_actuals.contains_key(*s)) {
                return Err(ForecastError::Validation(format!("unknown sku {unknown}")));
            }
            Some(list.iter().collect())
        }
        None => None,
    };

    let tracks: Vec<Track> = features
        .anchors
        .iter()
        .filter(|a| wanted.as_ref().is_none_or(|w| w.contains(&a.product_sku)))
        .map(|a| {
            let (current_sales, current_date) = features
                .last_actuals
                .get(&a.product_sku)
                .map(|l| (l.total_quantity, l.sales_date))
                .unwrap_or((a.total_quantity, a.sales_date));
            Track {
                sku: a.product_sku.clone(),
                date: a.sales_date,
                history: a.history.clone(),
                current_sales,
                current_date,
            }
        })
        .collect();

    if let Some(wanted) = &wanted {
        for sku in wanted.iter().filter(|s| !tracks.iter().any(|t| &t.sku == **s)) {
            warn!(sku = %sku, "sku has no sales at the latest panel month; skipped");
        }
    }
    Ok(tracks)
}

fn advance<R: Regressor>(
    state: StepState<R>,
    step: u32,
    schema: &FeatureSchema,
    retrain: bool,
) -> Result<(StepState<R>, Vec<ForecastRecord>), ForecastError> {
    let StepState {
        mut model,
        mut train,
        mut tracks,
    } = state;

    let mut rows = Vec::with_capacity(tracks.len());
    for track in &mut tracks {
        track.date = add_months(track.date, 1).map_err(|err| ForecastError::StepFailed {
            step,
            source: ModelError::InvalidInput(err.to_string()),
        })?;
        rows.push(schema.encode(&track.sku, &LagFeatures::from_history(&track.history)));
    }

    let raw = model
        .predict(&rows)
        .map_err(|source| ForecastError::StepFailed { step, source })?;
    if raw.len() != rows.len() {
        return Err(ForecastError::StepFailed {
            step,
            source: ModelError::ShapeMismatch {
                expected: rows.len(),
                found: raw.len(),
            },
        });
    }

    let mut records = Vec::with_capacity(tracks.len());
    for ((track, row), prediction) in tracks.iter_mut().zip(rows).zip(raw) {
        if !prediction.is_finite() {
            return Err(ForecastError::StepFailed {
                step,
                source: ModelError::InvalidInput(format!("non-finite prediction for {}", track.sku)),
            });
        }
        let predicted = prediction.round_ties_even().max(0.0);
        track.history.push(predicted);
        if retrain {
            train.push(row, predicted);
        }
        records.push(ForecastRecord {
            product_sku: track.sku.clone(),
            forecast_date: track.date,
            predicted_sales: predicted as u64,
            current_sales: track.current_sales,
            current_date_col: track.current_date,
        });
    }

    let forecast_date = tracks.first().map(|t| t.date);
    debug!(step, forecast_date = ?forecast_date, skus = tracks.len(), "forecast step predicted");

    if retrain {
        model
            .warm_start(&train)
            .map_err(|source| ForecastError::StepFailed { step, source })?;
        debug!(step, train_rows = train.len(), "model warm-started on extended training set");
    }

    Ok((StepState { model, train, tracks }, records))
}
