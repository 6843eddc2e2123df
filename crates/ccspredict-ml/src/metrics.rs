//! Regression metrics.

use serde::{Deserialize, Serialize};

use ccspredict_common::{CcsError, Result, TrainingTable};

use crate::model::FittedModel;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub r_squared: f64,
    pub mae: f64,
    pub mse: f64,
    pub rmse: f64,
}

impl RegressionMetrics {
    pub fn is_finite(&self) -> bool {
        [self.r_squared, self.mae, self.mse, self.rmse].iter().all(|v| v.is_finite())
    }
}

/// Metrics of `predicted` against `actual`.
///
/// When the targets have no variance R² is 1.0 for a perfect fit and 0.0
/// otherwise.
pub fn regression_metrics(actual: &[f64], predicted: &[f64]) -> Result<RegressionMetrics> {
    if actual.is_empty() {
        return Err(CcsError::Data("cannot compute metrics on zero rows".to_string()));
    }
    if actual.len() != predicted.len() {
        return Err(CcsError::Data(format!(
            "{} targets but {} predictions",
            actual.len(),
            predicted.len()
        )));
    }

    let n = actual.len() as f64;
    let mean = actual.iter().sum::<f64>() / n;

    let mut abs_sum = 0.0;
    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for (&y, &p) in actual.iter().zip(predicted) {
        let err = y - p;
        abs_sum += err.abs();
        ss_res += err * err;
        ss_tot += (y - mean) * (y - mean);
    }

    let r_squared = if ss_tot == 0.0 {
        if ss_res == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - ss_res / ss_tot
    };
    let mse = ss_res / n;

    Ok(RegressionMetrics {
        r_squared,
        mae: abs_sum / n,
        mse,
        rmse: mse.sqrt(),
    })
}

/// Score `model` on every row of `table`.
pub fn evaluate(model: &dyn FittedModel, table: &TrainingTable) -> Result<RegressionMetrics> {
    let predicted = model.predict_batch(&table.features())?;
    regression_metrics(&table.targets(), &predicted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        let m = regression_metrics(&[1.0, 2.0, 3.0, 4.0], &[1.0, 2.0, 4.0, 2.0]).unwrap();
        // residuals 0, 0, -1, 2 ; mean 2.5 ; ss_tot 5
        assert!((m.mae - 0.75).abs() < 1e-12);
        assert!((m.mse - 1.25).abs() < 1e-12);
        assert!((m.rmse - 1.25f64.sqrt()).abs() < 1e-12);
        assert!((m.r_squared - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_perfect_fit() {
        let m = regression_metrics(&[3.0, 5.0], &[3.0, 5.0]).unwrap();
        assert_eq!(m.r_squared, 1.0);
        assert_eq!(m.rmse, 0.0);
    }

    #[test]
    fn test_constant_target() {
        assert_eq!(regression_metrics(&[2.0, 2.0], &[2.0, 2.0]).unwrap().r_squared, 1.0);
        let off = regression_metrics(&[2.0, 2.0], &[2.0, 3.0]).unwrap();
        assert_eq!(off.r_squared, 0.0);
        assert!(off.is_finite());
    }

    #[test]
    fn test_length_mismatch_and_empty() {
        assert!(regression_metrics(&[1.0], &[1.0, 2.0]).is_err());
        assert!(regression_metrics(&[], &[]).is_err());
    }
}
