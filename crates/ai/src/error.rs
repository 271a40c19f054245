use thiserror::Error;

use stockpulse_core::DomainError;

/// Failures of the regression model itself (fit, predict, storage).
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid model input: {0}")]
    InvalidInput(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("feature width mismatch (expected {expected}, found {found})")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("model storage failed: {0}")]
    Storage(String),
}

/// Failures of feature construction, model preparation or the forecast loop.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("invalid forecast input: {0}")]
    Validation(String),

    /// No usable model: nothing stored and fitting was not possible.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// One forecast step failed; no partial forecast is returned.
    #[error("forecast step {step} failed: {source}")]
    StepFailed {
        step: u32,
        #[source]
        source: ModelError,
    },

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl From<DomainError> for ForecastError {
    fn from(err: DomainError) -> Self {
        ForecastError::Validation(err.to_string())
    }
}
