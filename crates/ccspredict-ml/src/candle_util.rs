//! Shared plumbing for the candle backends.

use candle_core::{DType, Device, Tensor};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarMap};
use serde::{Deserialize, Serialize};
use tracing::debug;

use ccspredict_common::CcsError;

/// Weights of every candle model live in this file.
pub const PAYLOAD_FILE: &str = "model.safetensors";

pub fn model_error(e: candle_core::Error) -> CcsError {
    CcsError::Model(e.to_string())
}

pub fn device() -> Device {
    Device::Cpu
}

/// `(rows, columns)` f32 matrix.
pub fn matrix(rows: &[Vec<f64>], width: usize, device: &Device) -> candle_core::Result<Tensor> {
    let flat: Vec<f32> = rows.iter().flat_map(|r| r.iter().map(|&v| v as f32)).collect();
    Tensor::from_vec(flat, (rows.len(), width), device)
}

/// `(n, 1)` f32 column.
pub fn column(values: &[f64], device: &Device) -> candle_core::Result<Tensor> {
    let flat: Vec<f32> = values.iter().map(|&v| v as f32).collect();
    Tensor::from_vec(flat, (values.len(), 1), device)
}

pub fn to_f64(output: &Tensor) -> candle_core::Result<Vec<f64>> {
    Ok(output
        .flatten_all()?
        .to_dtype(DType::F32)?
        .to_vec1::<f32>()?
        .into_iter()
        .map(f64::from)
        .collect())
}

/// Standardization of the regression target. CCS values are in the
/// hundreds; the networks train on zero-mean, unit-variance targets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetScale {
    pub mean: f64,
    pub std: f64,
}

impl TargetScale {
    pub fn fit(targets: &[f64]) -> Self {
        let n = targets.len().max(1) as f64;
        let mean = targets.iter().sum::<f64>() / n;
        let var = targets.iter().map(|y| (y - mean) * (y - mean)).sum::<f64>() / n;
        let std = if var > 0.0 { var.sqrt() } else { 1.0 };
        Self { mean, std }
    }

    pub fn apply(&self, targets: &[f64]) -> Vec<f64> {
        targets.iter().map(|y| (y - self.mean) / self.std).collect()
    }

    pub fn invert(&self, values: Vec<f64>) -> Vec<f64> {
        values.into_iter().map(|v| v * self.std + self.mean).collect()
    }
}

/// Full-batch AdamW over every variable in `varmap`. Returns the last loss.
pub fn optimize<F>(
    varmap: &VarMap,
    learning_rate: f64,
    weight_decay: f64,
    epochs: usize,
    loss_fn: F,
) -> candle_core::Result<f32>
where
    F: Fn() -> candle_core::Result<Tensor>,
{
    let mut opt = AdamW::new(
        varmap.all_vars(),
        ParamsAdamW {
            lr: learning_rate,
            weight_decay,
            ..Default::default()
        },
    )?;

    let mut last = f32::NAN;
    for epoch in 0..epochs {
        let loss = loss_fn()?;
        opt.backward_step(&loss)?;
        last = loss.to_scalar::<f32>()?;
        if epoch % 100 == 0 {
            debug!(epoch, loss = last, "Training step");
        }
    }
    Ok(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_scale_round_trip() {
        let scale = TargetScale::fit(&[100.0, 200.0, 300.0]);
        let z = scale.apply(&[100.0, 300.0]);
        assert!(z[0] < 0.0 && z[1] > 0.0);
        let back = scale.invert(z);
        assert!((back[0] - 100.0).abs() < 1e-9);
        assert!((back[1] - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_constant_targets_keep_unit_std() {
        let scale = TargetScale::fit(&[5.0, 5.0]);
        assert_eq!(scale.std, 1.0);
        assert_eq!(scale.apply(&[5.0]), vec![0.0]);
    }

    #[test]
    fn test_matrix_shape() {
        let t = matrix(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]], 2, &device()).unwrap();
        assert_eq!(t.dims(), &[3, 2]);
        assert_eq!(to_f64(&t).unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }
}
