//! Linear support vector regression.
//!
//! A single linear layer trained on the epsilon-insensitive loss with an L2
//! penalty on the weights, using candle autograd and AdamW.

use std::path::Path;

use candle_core::{DType, Module};
use candle_nn::{linear, Linear, VarBuilder, VarMap};
use serde::{Deserialize, Serialize};
use tracing::info;

use ccspredict_common::{Result, TrainingTable};

use crate::candle_util::{self, model_error, TargetScale, PAYLOAD_FILE};
use crate::model::{training_rows, FittedModel, ModelKind, Trainer};
use crate::scaler::MinMaxScaler;

fn default_epsilon() -> f64 {
    0.1
}

fn default_l2() -> f64 {
    1e-3
}

fn default_learning_rate() -> f64 {
    0.01
}

fn default_epochs() -> usize {
    500
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearSvrParams {
    /// Half-width of the insensitive tube, in standardized target units.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    #[serde(default = "default_l2")]
    pub l2: f64,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_epochs")]
    pub epochs: usize,
}

impl Default for LinearSvrParams {
    fn default() -> Self {
        Self {
            epsilon: default_epsilon(),
            l2: default_l2(),
            learning_rate: default_learning_rate(),
            epochs: default_epochs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LinearSvrState {
    #[serde(flatten)]
    params: LinearSvrParams,
    target: TargetScale,
}

fn build(varmap: &VarMap, n_features: usize) -> candle_core::Result<Linear> {
    let vb = VarBuilder::from_varmap(varmap, DType::F32, &candle_util::device());
    linear(n_features, 1, vb.pp("svr"))
}

pub struct LinearSvrTrainer {
    params: LinearSvrParams,
}

impl LinearSvrTrainer {
    pub fn new(params: LinearSvrParams) -> Self {
        Self { params }
    }

    fn train(&self, scaled: &[Vec<f64>], targets: &[f64], width: usize) -> candle_core::Result<(VarMap, Linear, f32)> {
        let device = candle_util::device();
        let varmap = VarMap::new();
        let layer = build(&varmap, width)?;

        let x = candle_util::matrix(scaled, width, &device)?;
        let y = candle_util::column(targets, &device)?;
        let (epsilon, l2) = (self.params.epsilon, self.params.l2);

        let loss = candle_util::optimize(&varmap, self.params.learning_rate, 0.0, self.params.epochs, || {
            let residual = (layer.forward(&x)? - &y)?;
            let insensitive = residual.abs()?.affine(1.0, -epsilon)?.relu()?.mean_all()?;
            let penalty = layer.weight().sqr()?.sum_all()?.affine(l2, 0.0)?;
            insensitive + penalty
        })?;
        Ok((varmap, layer, loss))
    }
}

impl Trainer for LinearSvrTrainer {
    fn kind(&self) -> ModelKind {
        ModelKind::LinearSvr
    }

    fn fit(&self, table: &TrainingTable) -> Result<Box<dyn FittedModel>> {
        let (rows, targets) = training_rows(table)?;
        let scaler = MinMaxScaler::fit(&rows)?;
        let scaled = scaler.transform_all(&rows)?;
        let target = TargetScale::fit(&targets);

        let (varmap, layer, loss) = self
            .train(&scaled, &target.apply(&targets), scaler.width())
            .map_err(model_error)?;
        info!(rows = targets.len(), loss, "Linear SVR fitted");

        Ok(Box::new(LinearSvrModel {
            state: LinearSvrState {
                params: self.params.clone(),
                target,
            },
            scaler,
            varmap,
            layer,
        }))
    }
}

pub struct LinearSvrModel {
    state: LinearSvrState,
    scaler: MinMaxScaler,
    varmap: VarMap,
    layer: Linear,
}

impl LinearSvrModel {
    pub fn load(dir: &Path, params: serde_json::Value, scaler: MinMaxScaler) -> Result<Self> {
        let state: LinearSvrState = serde_json::from_value(params)?;
        let mut varmap = VarMap::new();
        let layer = build(&varmap, scaler.width()).map_err(model_error)?;
        varmap.load(dir.join(PAYLOAD_FILE)).map_err(model_error)?;
        Ok(Self {
            state,
            scaler,
            varmap,
            layer,
        })
    }
}

impl FittedModel for LinearSvrModel {
    fn kind(&self) -> ModelKind {
        ModelKind::LinearSvr
    }

    fn scaler(&self) -> &MinMaxScaler {
        &self.scaler
    }

    fn params(&self) -> serde_json::Value {
        serde_json::to_value(&self.state).unwrap_or_default()
    }

    fn predict_scaled(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        let x = candle_util::matrix(rows, self.scaler.width(), &candle_util::device()).map_err(model_error)?;
        let out = self.layer.forward(&x).and_then(|t| candle_util::to_f64(&t)).map_err(model_error)?;
        Ok(self.state.target.invert(out))
    }

    fn save_payload(&self, dir: &Path) -> Result<()> {
        self.varmap.save(dir.join(PAYLOAD_FILE)).map_err(model_error)
    }
}
