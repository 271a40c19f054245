//! Infrastructure layer: table persistence, model artifacts, CSV ingestion,
//! configuration, and the pipelines that wire them to the domain crates.

pub mod config;
pub mod ingest;
pub mod model_store;
pub mod pipelines;
pub mod store;
pub mod tables;


pub use config::{ForecastSettings, Settings, SettingsError};
pub use ingest::IngestError;
pub use model_store::{FileModelStore, InMemoryModelStore};
pub use pipelines::{
    ForecastOptions, ForecastOutcome, OverrideOutcome, PipelineError, Pipelines, SalesIngestSummary, StockLevelFilter,
    StockReport, StockSort, TrainingReport,
};
pub use store::{InMemoryTableStore, PersistenceError, PostgresTableStore, TableStore};
pub use tables::Tables;
