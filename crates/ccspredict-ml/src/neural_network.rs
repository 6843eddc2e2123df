//! Multilayer perceptron regression.

use std::path::Path;

use candle_core::{DType, Module, Tensor};
use candle_nn::{linear, loss, Linear, VarBuilder, VarMap};
use serde::{Deserialize, Serialize};
use tracing::info;

use ccspredict_common::{CcsError, Result, TrainingTable};

use crate::candle_util::{self, model_error, TargetScale, PAYLOAD_FILE};
use crate::model::{training_rows, FittedModel, ModelKind, Trainer};
use crate::scaler::MinMaxScaler;

fn default_hidden() -> Vec<usize> {
    vec![64, 32]
}

fn default_learning_rate() -> f64 {
    5e-3
}

fn default_weight_decay() -> f64 {
    1e-4
}

fn default_epochs() -> usize {
    300
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuralNetworkParams {
    /// Width of each hidden layer.
    #[serde(default = "default_hidden")]
    pub hidden: Vec<usize>,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_weight_decay")]
    pub weight_decay: f64,
    #[serde(default = "default_epochs")]
    pub epochs: usize,
}

impl Default for NeuralNetworkParams {
    fn default() -> Self {
        Self {
            hidden: default_hidden(),
            learning_rate: default_learning_rate(),
            weight_decay: default_weight_decay(),
            epochs: default_epochs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NeuralNetworkState {
    #[serde(flatten)]
    params: NeuralNetworkParams,
    target: TargetScale,
}

/// ReLU hidden layers followed by one linear output.
struct Mlp {
    layers: Vec<Linear>,
}

impl Mlp {
    fn new(varmap: &VarMap, n_features: usize, hidden: &[usize]) -> candle_core::Result<Self> {
        let vb = VarBuilder::from_varmap(varmap, DType::F32, &candle_util::device());
        let mut layers = Vec::with_capacity(hidden.len() + 1);
        let mut input = n_features;
        for (i, &width) in hidden.iter().chain(std::iter::once(&1)).enumerate() {
            layers.push(linear(input, width, vb.pp(format!("layer{i}")))?);
            input = width;
        }
        Ok(Self { layers })
    }
}

impl Module for Mlp {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let last = self.layers.len() - 1;
        let mut h = xs.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            h = layer.forward(&h)?;
            if i < last {
                h = h.relu()?;
            }
        }
        Ok(h)
    }
}

pub struct NeuralNetworkTrainer {
    params: NeuralNetworkParams,
}

impl NeuralNetworkTrainer {
    pub fn new(params: NeuralNetworkParams) -> Self {
        Self { params }
    }

    fn train(&self, scaled: &[Vec<f64>], targets: &[f64], width: usize) -> candle_core::Result<(VarMap, Mlp, f32)> {
        let device = candle_util::device();
        let varmap = VarMap::new();
        let mlp = Mlp::new(&varmap, width, &self.params.hidden)?;

        let x = candle_util::matrix(scaled, width, &device)?;
        let y = candle_util::column(targets, &device)?;

        let last = candle_util::optimize(
            &varmap,
            self.params.learning_rate,
            self.params.weight_decay,
            self.params.epochs,
            || loss::mse(&mlp.forward(&x)?, &y),
        )?;
        Ok((varmap, mlp, last))
    }
}

impl Trainer for NeuralNetworkTrainer {
    fn kind(&self) -> ModelKind {
        ModelKind::NeuralNetwork
    }

    fn fit(&self, table: &TrainingTable) -> Result<Box<dyn FittedModel>> {
        if self.params.hidden.contains(&0) {
            return Err(CcsError::Config("hidden layer widths must be positive".to_string()));
        }
        let (rows, targets) = training_rows(table)?;
        let scaler = MinMaxScaler::fit(&rows)?;
        let scaled = scaler.transform_all(&rows)?;
        let target = TargetScale::fit(&targets);

        let (varmap, mlp, loss) = self
            .train(&scaled, &target.apply(&targets), scaler.width())
            .map_err(model_error)?;
        info!(
            rows = targets.len(),
            hidden = ?self.params.hidden,
            loss,
            "Neural network fitted"
        );

        Ok(Box::new(NeuralNetworkModel {
            state: NeuralNetworkState {
                params: self.params.clone(),
                target,
            },
            scaler,
            varmap,
            mlp,
        }))
    }
}

pub struct NeuralNetworkModel {
    state: NeuralNetworkState,
    scaler: MinMaxScaler,
    varmap: VarMap,
    mlp: Mlp,
}

impl NeuralNetworkModel {
    pub fn load(dir: &Path, params: serde_json::Value, scaler: MinMaxScaler) -> Result<Self> {
        let state: NeuralNetworkState = serde_json::from_value(params)?;
        let mut varmap = VarMap::new();
        let mlp = Mlp::new(&varmap, scaler.width(), &state.params.hidden).map_err(model_error)?;
        varmap.load(dir.join(PAYLOAD_FILE)).map_err(model_error)?;
        Ok(Self {
            state,
            scaler,
            varmap,
            mlp,
        })
    }
}

impl FittedModel for NeuralNetworkModel {
    fn kind(&self) -> ModelKind {
        ModelKind::NeuralNetwork
    }

    fn scaler(&self) -> &MinMaxScaler {
        &self.scaler
    }

    fn params(&self) -> serde_json::Value {
        serde_json::to_value(&self.state).unwrap_or_default()
    }

    fn predict_scaled(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        let x = candle_util::matrix(rows, self.scaler.width(), &candle_util::device()).map_err(model_error)?;
        let out = self.mlp.forward(&x).and_then(|t| candle_util::to_f64(&t)).map_err(model_error)?;
        Ok(self.state.target.invert(out))
    }

    fn save_payload(&self, dir: &Path) -> Result<()> {
        self.varmap.save(dir.join(PAYLOAD_FILE)).map_err(model_error)
    }
}
