//! Random forest regression.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{RandomForestRegressor, RandomForestRegressorParameters};
use smartcore::linalg::basic::matrix::DenseMatrix;
use tracing::info;

use ccspredict_common::{CcsError, Result, TrainingTable};

use crate::model::{training_rows, FittedModel, ModelKind, Trainer};
use crate::scaler::MinMaxScaler;

pub const PAYLOAD_FILE: &str = "model.json";

type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

fn default_n_trees() -> usize {
    100
}

fn default_min_samples_leaf() -> usize {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestParams {
    #[serde(default = "default_n_trees")]
    pub n_trees: usize,
    #[serde(default = "default_min_samples_leaf")]
    pub min_samples_leaf: usize,
    #[serde(default)]
    pub max_depth: Option<u16>,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        Self {
            n_trees: default_n_trees(),
            min_samples_leaf: default_min_samples_leaf(),
            max_depth: None,
        }
    }
}

pub struct RandomForestTrainer {
    params: RandomForestParams,
    seed: u64,
}

impl RandomForestTrainer {
    pub fn new(params: RandomForestParams, seed: u64) -> Self {
        Self { params, seed }
    }

    fn parameters(&self) -> RandomForestRegressorParameters {
        let mut parameters = RandomForestRegressorParameters::default()
            .with_n_trees(self.params.n_trees as _)
            .with_min_samples_leaf(self.params.min_samples_leaf as _)
            .with_seed(self.seed);
        if let Some(depth) = self.params.max_depth {
            parameters = parameters.with_max_depth(depth as _);
        }
        parameters
    }
}

fn matrix(rows: &[Vec<f64>]) -> DenseMatrix<f64> {
    DenseMatrix::from_2d_vec(&rows.to_vec())
}

impl Trainer for RandomForestTrainer {
    fn kind(&self) -> ModelKind {
        ModelKind::RandomForest
    }

    fn fit(&self, table: &TrainingTable) -> Result<Box<dyn FittedModel>> {
        let (rows, targets) = training_rows(table)?;
        let scaler = MinMaxScaler::fit(&rows)?;
        let x = matrix(&scaler.transform_all(&rows)?);

        let forest = Forest::fit(&x, &targets, self.parameters())
            .map_err(|e| CcsError::Model(format!("random forest training failed: {e}")))?;
        info!(rows = targets.len(), trees = self.params.n_trees, "Random forest fitted");

        Ok(Box::new(RandomForestModel {
            params: self.params.clone(),
            scaler,
            forest,
        }))
    }
}

pub struct RandomForestModel {
    params: RandomForestParams,
    scaler: MinMaxScaler,
    forest: Forest,
}

impl RandomForestModel {
    pub fn load(dir: &Path, params: serde_json::Value, scaler: MinMaxScaler) -> Result<Self> {
        let params: RandomForestParams = serde_json::from_value(params)?;
        let file = File::open(dir.join(PAYLOAD_FILE))?;
        let forest: Forest = serde_json::from_reader(BufReader::new(file))?;
        Ok(Self { params, scaler, forest })
    }
}

impl FittedModel for RandomForestModel {
    fn kind(&self) -> ModelKind {
        ModelKind::RandomForest
    }

    fn scaler(&self) -> &MinMaxScaler {
        &self.scaler
    }

    fn params(&self) -> serde_json::Value {
        serde_json::to_value(&self.params).unwrap_or_default()
    }

    fn predict_scaled(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        self.forest
            .predict(&matrix(rows))
            .map_err(|e| CcsError::Model(format!("random forest prediction failed: {e}")))
    }

    fn save_payload(&self, dir: &Path) -> Result<()> {
        let file = File::create(dir.join(PAYLOAD_FILE))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &self.forest)?;
        writer.flush()?;
        Ok(())
    }
}
