use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{Span, field, info, instrument};

use stockpulse_ai::{
    FeatureSet, ForecastRecord, ForecastRequest, ModelRefresh, ModelSource, ValidationMetrics, build_features,
    forecast, load_model, prepare_model,
};
use stockpulse_core::{RunId, Sku};

use super::{PipelineError, Pipelines};
use crate::store::TableStore;

/// Caller-facing forecast request; unset fields fall back to the forecast settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastOptions {
    pub skus: Option<Vec<Sku>>,
    pub steps: Option<u32>,
    pub retrain_each_step: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub run_id: RunId,
    #[serde(flatten)]
    pub source: ModelSource,
    pub validation: Option<ValidationMetrics>,
    pub forecasts: Vec<ForecastRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastOutcome {
    pub run_id: RunId,
    pub forecasts: Vec<ForecastRecord>,
}

impl<S: TableStore> Pipelines<S> {
    /// Build features from the stored panel, prepare a model, forecast and store
    /// the result.
    #[instrument(name = "train", skip_all, fields(run_id = field::Empty, refresh = ?refresh))]
    pub async fn train(&self, refresh: ModelRefresh, options: ForecastOptions) -> Result<TrainingReport, PipelineError> {
        let run_id = RunId::new();
        Span::current().record("run_id", field::display(run_id));

        let request = self.forecast_request(options);
        let features = self.features().await?;
        let prepared = prepare_model(self.models.as_ref(), &features, refresh, &self.settings.tuning)?;
        let run = forecast(prepared.model, features.train.clone(), &features, &request)?;

        self.tables.replace_forecasts(run_id, &run.records, Utc::now()).await?;
        info!(records = run.records.len(), "training run stored forecasts");

        Ok(TrainingReport {
            run_id,
            source: prepared.source,
            validation: prepared.validation,
            forecasts: run.records,
        })
    }

    /// Forecast with the stored model only; never fits.
    #[instrument(name = "forecast", skip_all, fields(run_id = field::Empty))]
    pub async fn forecast(&self, options: ForecastOptions) -> Result<ForecastOutcome, PipelineError> {
        let run_id = RunId::new();
        Span::current().record("run_id", field::display(run_id));

        let request = self.forecast_request(options);
        let features = self.features().await?;
        let model = load_model(self.models.as_ref(), &features.schema)?;
        let run = forecast(model, features.train.clone(), &features, &request)?;

        self.tables.replace_forecasts(run_id, &run.records, Utc::now()).await?;
        info!(records = run.records.len(), "forecast stored");

        Ok(ForecastOutcome {
            run_id,
            forecasts: run.records,
        })
    }

    /// Stored forecasts ordered by (SKU, forecast date).
    pub async fn forecasts(&self) -> Result<Vec<ForecastRecord>, PipelineError> {
        let mut records: Vec<ForecastRecord> = self
            .tables
            .forecasts()
            .await?
            .into_iter()
            .map(|row| row.record)
            .collect();
        records.sort_by(|a, b| (&a.product_sku, a.forecast_date).cmp(&(&b.product_sku, b.forecast_date)));
        Ok(records)
    }

    #[instrument(skip(self))]
    pub async fn clear_forecasts(&self) -> Result<u64, PipelineError> {
        let removed = self.tables.clear_forecasts().await?;
        info!(removed, "forecasts cleared");
        Ok(removed)
    }

    async fn features(&self) -> Result<FeatureSet, PipelineError> {
        let panel = self.tables.sales_panel().await?;
        if panel.is_empty() {
            return Err(PipelineError::Validation("no training data".to_string()));
        }
        Ok(build_features(&panel, &self.settings.forecast.feature_config())?)
    }

    fn forecast_request(&self, options: ForecastOptions) -> ForecastRequest {
        ForecastRequest {
            skus: options.skus,
            n_steps: options.steps.unwrap_or(self.settings.forecast.default_steps),
            retrain_each_step: options
                .retrain_each_step
                .unwrap_or(self.settings.forecast.retrain_each_step),
        }
    }
}
