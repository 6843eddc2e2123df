//! Trainer and fitted-model interfaces.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use ccspredict_common::{CcsError, FeatureVector, Result, TrainingTable};

use crate::gradient_boosting::{GradientBoostingParams, GradientBoostingTrainer};
use crate::linear_svr::{LinearSvrParams, LinearSvrTrainer};
use crate::neural_network::{NeuralNetworkParams, NeuralNetworkTrainer};
use crate::random_forest::{RandomForestParams, RandomForestTrainer};
use crate::scaler::MinMaxScaler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    GradientBoosting,
    RandomForest,
    LinearSvr,
    NeuralNetwork,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::GradientBoosting,
        ModelKind::LinearSvr,
        ModelKind::RandomForest,
        ModelKind::NeuralNetwork,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::GradientBoosting => "gradient_boosting",
            ModelKind::RandomForest => "random_forest",
            ModelKind::LinearSvr => "linear_svr",
            ModelKind::NeuralNetwork => "neural_network",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = CcsError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| CcsError::Config(format!("unknown model kind: {s}")))
    }
}

/// A trained regressor.
///
/// Backends implement the `*_scaled` / payload methods; scaling, width
/// checks and single-row prediction are shared.
pub trait FittedModel: Send + Sync {
    fn kind(&self) -> ModelKind;

    fn scaler(&self) -> &MinMaxScaler;

    /// Hyperparameters plus any learned state that is not in the payload.
    fn params(&self) -> serde_json::Value;

    /// Predict on rows that are already min-max scaled.
    fn predict_scaled(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>>;

    /// Write the backend payload into `dir`.
    fn save_payload(&self, dir: &Path) -> Result<()>;

    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    fn n_features(&self) -> usize {
        self.scaler().width()
    }

    fn predict_batch(&self, rows: &[&[f64]]) -> Result<Vec<f64>> {
        let scaled = rows
            .iter()
            .map(|row| self.scaler().transform(row))
            .collect::<Result<Vec<_>>>()?;
        self.predict_scaled(&scaled)
    }

    fn predict(&self, features: &FeatureVector) -> Result<f64> {
        self.predict_batch(&[features.as_slice()])?
            .first()
            .copied()
            .ok_or_else(|| CcsError::Model(format!("{} returned no prediction", self.name())))
    }
}

/// Fits one kind of model on a training table.
pub trait Trainer: Send + Sync {
    fn kind(&self) -> ModelKind;

    fn fit(&self, table: &TrainingTable) -> Result<Box<dyn FittedModel>>;
}

fn default_models() -> Vec<ModelKind> {
    ModelKind::ALL.to_vec()
}

fn default_test_fraction() -> f64 {
    0.2
}

/// Which models to train and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    #[serde(default = "default_models")]
    pub models: Vec<ModelKind>,
    /// Share of rows held out for evaluation.
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
    /// Seed for the train/test shuffle and every seeded backend.
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub gradient_boosting: GradientBoostingParams,
    #[serde(default)]
    pub random_forest: RandomForestParams,
    #[serde(default)]
    pub linear_svr: LinearSvrParams,
    #[serde(default)]
    pub neural_network: NeuralNetworkParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            models: default_models(),
            test_fraction: default_test_fraction(),
            seed: 0,
            gradient_boosting: GradientBoostingParams::default(),
            random_forest: RandomForestParams::default(),
            linear_svr: LinearSvrParams::default(),
            neural_network: NeuralNetworkParams::default(),
        }
    }
}

/// Build the trainer for `kind` from its section of `config`.
pub fn trainer_for(kind: ModelKind, config: &TrainingConfig) -> Box<dyn Trainer> {
    match kind {
        ModelKind::GradientBoosting => Box::new(GradientBoostingTrainer::new(config.gradient_boosting.clone())),
        ModelKind::RandomForest => Box::new(RandomForestTrainer::new(config.random_forest.clone(), config.seed)),
        ModelKind::LinearSvr => Box::new(LinearSvrTrainer::new(config.linear_svr.clone())),
        ModelKind::NeuralNetwork => Box::new(NeuralNetworkTrainer::new(config.neural_network.clone())),
    }
}

/// Feature rows and targets of a table, rejecting empty or ragged input.
pub(crate) fn training_rows(table: &TrainingTable) -> Result<(Vec<&[f64]>, Vec<f64>)> {
    if table.is_empty() {
        return Err(CcsError::Data("cannot train on an empty table".to_string()));
    }
    Ok((table.features(), table.targets()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_parse_back() {
        for kind in ModelKind::ALL {
            assert_eq!(kind.as_str().parse::<ModelKind>().unwrap(), kind);
        }
        assert_eq!("Random-Forest".parse::<ModelKind>().unwrap(), ModelKind::RandomForest);
        assert!("fast_tree".parse::<ModelKind>().is_err());
    }

    #[test]
    fn test_training_config_defaults() {
        let cfg: TrainingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, TrainingConfig::default());
        assert_eq!(cfg.models.len(), 4);
        assert_eq!(cfg.test_fraction, 0.2);
        assert_eq!(cfg.random_forest.n_trees, 100);
        assert_eq!(cfg.random_forest.min_samples_leaf, 10);
    }
}
