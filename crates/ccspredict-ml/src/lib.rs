//! ccspredict-ml — Regression backends behind one training interface.
//!
//! Every backend implements [`Trainer`] and produces a [`FittedModel`].
//! Features are min-max scaled with statistics from the training split;
//! the scaler is stored with the model so prediction applies the same
//! transform.
//!
//! Backends:
//! - `gradient_boosting`: gradient-boosted regression trees (`gbdt`)
//! - `random_forest`: random forest regressor (`smartcore`)
//! - `linear_svr`: linear support vector regression trained with candle
//! - `neural_network`: multilayer perceptron trained with candle

pub mod model;
pub mod scaler;
pub mod metrics;
pub mod gradient_boosting;
pub mod random_forest;
mod candle_util;
pub mod linear_svr;
pub mod neural_network;
pub mod persistence;

pub use model::{trainer_for, FittedModel, ModelKind, Trainer, TrainingConfig};
pub use scaler::MinMaxScaler;
pub use metrics::{evaluate, regression_metrics, RegressionMetrics};
pub use persistence::{load_model, save_model, ModelManifest, SavedModel};
