//! Saving and loading trained models.
//!
//! Each model lives in its own directory:
//! - `manifest.json`: kind, feature schema, scaler, backend parameters and
//!   the evaluation metrics of the run that produced it
//! - a backend payload, `model.json` for tree ensembles or
//!   `model.safetensors` for candle models

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use ccspredict_common::{CcsError, Result};
use ccspredict_features::FeatureSchema;

use crate::gradient_boosting::GradientBoostingModel;
use crate::linear_svr::LinearSvrModel;
use crate::metrics::RegressionMetrics;
use crate::model::{FittedModel, ModelKind};
use crate::neural_network::NeuralNetworkModel;
use crate::random_forest::RandomForestModel;
use crate::scaler::MinMaxScaler;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelManifest {
    pub kind: ModelKind,
    /// Training run that produced the model.
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub schema: FeatureSchema,
    pub scaler: MinMaxScaler,
    pub params: serde_json::Value,
    #[serde(default)]
    pub metrics: Option<RegressionMetrics>,
}

/// A model restored from disk together with its manifest.
pub struct SavedModel {
    pub manifest: ModelManifest,
    pub model: Box<dyn FittedModel>,
}

impl std::fmt::Debug for SavedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SavedModel").field("manifest", &self.manifest).finish()
    }
}

/// Write `model` into `dir`, creating it if needed.
pub fn save_model(
    model: &dyn FittedModel,
    schema: &FeatureSchema,
    metrics: Option<RegressionMetrics>,
    run_id: Uuid,
    dir: &Path,
) -> Result<ModelManifest> {
    if schema.total_width() != Some(model.n_features()) {
        return Err(CcsError::Model(format!(
            "{} expects {} features but the schema describes {:?}",
            model.name(),
            model.n_features(),
            schema.total_width()
        )));
    }

    fs::create_dir_all(dir)?;
    model.save_payload(dir)?;

    let manifest = ModelManifest {
        kind: model.kind(),
        run_id,
        created_at: Utc::now(),
        schema: schema.clone(),
        scaler: model.scaler().clone(),
        params: model.params(),
        metrics,
    };
    let mut writer = BufWriter::new(File::create(dir.join(MANIFEST_FILE))?);
    serde_json::to_writer_pretty(&mut writer, &manifest)?;
    writer.flush()?;

    info!(model = model.name(), dir = %dir.display(), "Model saved");
    Ok(manifest)
}

/// Restore whatever kind of model `dir` holds.
pub fn load_model(dir: &Path) -> Result<SavedModel> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let file = File::open(&manifest_path)
        .map_err(|e| CcsError::Model(format!("cannot open {}: {e}", manifest_path.display())))?;
    let manifest: ModelManifest = serde_json::from_reader(BufReader::new(file))?;

    let params = manifest.params.clone();
    let scaler = manifest.scaler.clone();
    let model: Box<dyn FittedModel> = match manifest.kind {
        ModelKind::GradientBoosting => Box::new(GradientBoostingModel::load(dir, params, scaler)?),
        ModelKind::RandomForest => Box::new(RandomForestModel::load(dir, params, scaler)?),
        ModelKind::LinearSvr => Box::new(LinearSvrModel::load(dir, params, scaler)?),
        ModelKind::NeuralNetwork => Box::new(NeuralNetworkModel::load(dir, params, scaler)?),
    };

    info!(model = model.name(), dir = %dir.display(), "Model loaded");
    Ok(SavedModel { manifest, model })
}
