use crate::error::ModelError;
use crate::features::Dataset;

/// A fitted regression model the forecast loop can predict with and keep training.
pub trait Regressor {
    /// Width of the feature rows the model was fitted on.
    fn n_features(&self) -> usize;

    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, ModelError>;

    /// Continue training from the current state on `data`; must not start from scratch.
    fn warm_start(&mut self, data: &Dataset) -> Result<(), ModelError>;
}
