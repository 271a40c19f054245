//! Regression error metrics for held-out validation.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

fn check_lengths(actual: &[f64], predicted: &[f64]) -> Result<(), ModelError> {
    if actual.len() != predicted.len() {
        return Err(ModelError::ShapeMismatch {
            expected: actual.len(),
            found: predicted.len(),
        });
    }
    if actual.is_empty() {
        return Err(ModelError::InsufficientData("no samples to score".to_string()));
    }
    Ok(())
}

pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> Result<f64, ModelError> {
    check_lengths(actual, predicted)?;
    let total: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).abs()).sum();
    Ok(total / actual.len() as f64)
}

pub fn root_mean_squared_error(actual: &[f64], predicted: &[f64]) -> Result<f64, ModelError> {
    check_lengths(actual, predicted)?;
    let total: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum();
    Ok((total / actual.len() as f64).sqrt())
}

/// Mean absolute percentage error as a fraction; zero actuals are guarded by `f64::EPSILON`.
pub fn mean_absolute_percentage_error(actual: &[f64], predicted: &[f64]) -> Result<f64, ModelError> {
    check_lengths(actual, predicted)?;
    let total: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs() / a.abs().max(f64::EPSILON))
        .sum();
    Ok(total / actual.len() as f64)
}

/// Coefficient of determination. A constant target scores 1.0 when predicted
/// exactly and 0.0 otherwise.
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> Result<f64, ModelError> {
    check_lengths(actual, predicted)?;
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_res: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
    pub mape: f64,
    pub samples: usize,
}

impl ValidationMetrics {
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Result<Self, ModelError> {
        Ok(Self {
            mae: mean_absolute_error(actual, predicted)?,
            rmse: root_mean_squared_error(actual, predicted)?,
            r2: r2_score(actual, predicted)?,
            mape: mean_absolute_percentage_error(actual, predicted)?,
            samples: actual.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_metrics() {
        let actual = [10.0, 20.0, 30.0];
        let predicted = [12.0, 18.0, 30.0];
        let m = ValidationMetrics::compute(&actual, &predicted).unwrap();
        assert!((m.mae - 4.0 / 3.0).abs() < 1e-12);
        assert!((m.rmse - (8.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!((m.r2 - (1.0 - 8.0 / 200.0)).abs() < 1e-12);
        assert!((m.mape - (0.2 + 0.1) / 3.0).abs() < 1e-12);
        assert_eq!(m.samples, 3);
    }

    #[test]
    fn constant_target_r2() {
        assert_eq!(r2_score(&[5.0, 5.0], &[5.0, 5.0]).unwrap(), 1.0);
        assert_eq!(r2_score(&[5.0, 5.0], &[4.0, 5.0]).unwrap(), 0.0);
    }

    #[test]
    fn zero_actual_does_not_divide_by_zero() {
        let mape = mean_absolute_percentage_error(&[0.0], &[0.0]).unwrap();
        assert_eq!(mape, 0.0);
        assert!(mean_absolute_percentage_error(&[0.0], &[1.0]).unwrap().is_finite());
    }

    #[test]
    fn mismatched_or_empty_inputs_fail() {
        assert!(mean_absolute_error(&[1.0], &[]).is_err());
        assert!(mean_absolute_error(&[], &[]).is_err());
    }
}
