//! Gradient-boosted regression trees.

use std::path::Path;

use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use serde::{Deserialize, Serialize};
use tracing::info;

use ccspredict_common::{CcsError, Result, TrainingTable};

use crate::model::{training_rows, FittedModel, ModelKind, Trainer};
use crate::scaler::MinMaxScaler;

pub const PAYLOAD_FILE: &str = "model.json";

fn default_iterations() -> usize {
    100
}

fn default_max_depth() -> u32 {
    6
}

fn default_shrinkage() -> f32 {
    0.1
}

fn default_min_leaf_size() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingParams {
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    /// Learning rate.
    #[serde(default = "default_shrinkage")]
    pub shrinkage: f32,
    #[serde(default = "default_min_leaf_size")]
    pub min_leaf_size: usize,
}

impl Default for GradientBoostingParams {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            max_depth: default_max_depth(),
            shrinkage: default_shrinkage(),
            min_leaf_size: default_min_leaf_size(),
        }
    }
}

pub struct GradientBoostingTrainer {
    params: GradientBoostingParams,
}

impl GradientBoostingTrainer {
    pub fn new(params: GradientBoostingParams) -> Self {
        Self { params }
    }
}

fn config_for(params: &GradientBoostingParams, n_features: usize) -> Config {
    let mut cfg = Config::new();
    cfg.set_feature_size(n_features);
    cfg.set_max_depth(params.max_depth as _);
    cfg.set_iterations(params.iterations as _);
    cfg.set_shrinkage(params.shrinkage as _);
    cfg.set_min_leaf_size(params.min_leaf_size as _);
    cfg.set_loss("SquaredError");
    cfg
}

fn to_f32(row: &[f64]) -> Vec<f32> {
    row.iter().map(|&v| v as f32).collect()
}

impl Trainer for GradientBoostingTrainer {
    fn kind(&self) -> ModelKind {
        ModelKind::GradientBoosting
    }

    fn fit(&self, table: &TrainingTable) -> Result<Box<dyn FittedModel>> {
        let (rows, targets) = training_rows(table)?;
        let scaler = MinMaxScaler::fit(&rows)?;
        let scaled = scaler.transform_all(&rows)?;

        let mut data: DataVec = scaled
            .iter()
            .zip(&targets)
            .map(|(row, &y)| Data::new_training_data(to_f32(row), 1.0, y as f32, None))
            .collect();

        let mut model = GBDT::new(&config_for(&self.params, scaler.width()));
        model.fit(&mut data);
        info!(
            rows = data.len(),
            iterations = self.params.iterations,
            "Gradient boosting model fitted"
        );

        Ok(Box::new(GradientBoostingModel {
            params: self.params.clone(),
            scaler,
            model,
        }))
    }
}

pub struct GradientBoostingModel {
    params: GradientBoostingParams,
    scaler: MinMaxScaler,
    model: GBDT,
}

impl GradientBoostingModel {
    pub fn load(dir: &Path, params: serde_json::Value, scaler: MinMaxScaler) -> Result<Self> {
        let params: GradientBoostingParams = serde_json::from_value(params)?;
        let path = payload_path(dir)?;
        let model = GBDT::load_model(&path)
            .map_err(|e| CcsError::Model(format!("cannot load gradient boosting model from {path}: {e}")))?;
        Ok(Self { params, scaler, model })
    }
}

fn payload_path(dir: &Path) -> Result<String> {
    let path = dir.join(PAYLOAD_FILE);
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| CcsError::Model(format!("model path is not valid UTF-8: {}", path.display())))
}

impl FittedModel for GradientBoostingModel {
    fn kind(&self) -> ModelKind {
        ModelKind::GradientBoosting
    }

    fn scaler(&self) -> &MinMaxScaler {
        &self.scaler
    }

    fn params(&self) -> serde_json::Value {
        serde_json::to_value(&self.params).unwrap_or_default()
    }

    fn predict_scaled(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        let data: DataVec = rows.iter().map(|row| Data::new_test_data(to_f32(row), None)).collect();
        Ok(self.model.predict(&data).into_iter().map(f64::from).collect())
    }

    fn save_payload(&self, dir: &Path) -> Result<()> {
        let path = payload_path(dir)?;
        self.model
            .save_model(&path)
            .map_err(|e| CcsError::Model(format!("cannot save gradient boosting model to {path}: {e}")))
    }
}
