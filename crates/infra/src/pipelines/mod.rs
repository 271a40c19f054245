//! Application-level orchestration.
//!
//! Each pipeline loads what it needs through [`Tables`], runs the pure domain
//! logic, and writes its outputs only after they are fully computed:
//!
//! ```text
//! stock snapshots ─▶ generate_report ─▶ apply_activity_flags ─▶ replenishment_records + stock_snapshot
//! transactions + master ─▶ build_panel ─▶ merge_panels ─▶ sales_panel
//! sales_panel ─▶ build_features ─▶ prepare_model / load_model ─▶ forecast ─▶ forecast_records
//! ```
//!
//! Nothing is retried; a failure is returned to the caller as a [`PipelineError`].

mod forecasting;
mod sales;
mod stock;

use std::sync::Arc;

use stockpulse_ai::{ForecastError, ModelError, ModelStore};
use stockpulse_core::DomainError;

use crate::config::Settings;
use crate::ingest::IngestError;
use crate::store::{PersistenceError, TableStore};
use crate::tables::Tables;

pub use forecasting::{ForecastOptions, ForecastOutcome, TrainingReport};
pub use sales::SalesIngestSummary;
pub use stock::{OverrideOutcome, StockLevelFilter, StockReport, StockSort};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Missing or malformed input; not retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// No usable model for a forecast request.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error(transparent)]
    Forecast(ForecastError),

    /// The run must be treated as not committed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl From<ForecastError> for PipelineError {
    fn from(err: ForecastError) -> Self {
        match err {
            ForecastError::Validation(msg) => PipelineError::Validation(msg),
            ForecastError::ModelUnavailable(msg) => PipelineError::ModelUnavailable(msg),
            other => PipelineError::Forecast(other),
        }
    }
}

impl From<ModelError> for PipelineError {
    fn from(err: ModelError) -> Self {
        PipelineError::Forecast(ForecastError::Model(err))
    }
}

impl From<DomainError> for PipelineError {
    fn from(err: DomainError) -> Self {
        PipelineError::Validation(err.to_string())
    }
}

/// Entry point for every pipeline, over one table store and one model store.
pub struct Pipelines<S> {
    tables: Tables<S>,
    models: Arc<dyn ModelStore>,
    settings: Settings,
}

impl<S: TableStore> Pipelines<S> {
    pub fn new(store: S, models: Arc<dyn ModelStore>, settings: Settings) -> Self {
        Self {
            tables: Tables::new(store),
            models,
            settings,
        }
    }

    pub fn tables(&self) -> &Tables<S> {
        &self.tables
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}
