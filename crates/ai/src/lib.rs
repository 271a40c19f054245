//! `stockpulse-ai`
//!
//! **Responsibility:** monthly sales forecasting.
//!
//! - Feature construction from the dense sales panel (lags, trailing means, SKU indicators).
//! - Gradient-boosted regression trees with bounded hyperparameter search.
//! - Model preparation (reuse the stored artifact or fit a new one) and held-out metrics.
//! - The walk-forward forecast loop.
//!
//! The crate performs no I/O of its own; model artifacts go through [`ModelStore`].

pub mod error;
pub mod features;
pub mod forecast;
pub mod gbt;
pub mod metrics;
pub mod regressor;
pub mod training;
pub mod tree;
pub mod tuning;

pub use error::{ForecastError, ModelError};
pub use features::{AnchorRow, Dataset, FeatureConfig, FeatureSchema, FeatureSet, LagFeatures, build_features};
pub use forecast::{ForecastRecord, ForecastRequest, ForecastRun, forecast};
pub use gbt::{BoostParams, GradientBoostedTrees};
pub use metrics::ValidationMetrics;
pub use regressor::Regressor;
pub use training::{ModelRefresh, ModelSource, ModelStore, PreparedModel, load_model, prepare_model};
pub use tuning::{SearchSpace, TuningConfig, TuningOutcome, time_series_splits, tune};
