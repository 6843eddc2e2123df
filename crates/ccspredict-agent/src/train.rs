//! Training run: load data, prepare features, fit, evaluate and save models.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use ccspredict_chem::{ProviderRegistry, StructureNormalizer};
use ccspredict_data::load_sources;
use ccspredict_features::{prepare_training_table, FeaturePipeline, FeatureSchema, PreparationReport};
use ccspredict_ml::{evaluate, save_model, trainer_for, FittedModel, ModelKind, RegressionMetrics};

use crate::config::Config;

#[derive(Debug, Clone)]
pub struct ModelReport {
    pub kind: ModelKind,
    /// `None` when no rows were held out.
    pub metrics: Option<RegressionMetrics>,
    pub dir: PathBuf,
}

pub struct TrainingOutcome {
    pub run_id: Uuid,
    pub preparation: PreparationReport,
    pub train_rows: usize,
    pub test_rows: usize,
    pub reports: Vec<ModelReport>,
    /// Fitted models with the schema they were trained on.
    pub models: Vec<(FeatureSchema, Box<dyn FittedModel>)>,
}

#[instrument(skip_all, fields(files = config.data.files.len()))]
pub async fn run_training(
    config: &Config,
    normalizer: Arc<dyn StructureNormalizer>,
    registry: ProviderRegistry,
) -> anyhow::Result<TrainingOutcome> {
    let run_id = Uuid::new_v4();
    info!(%run_id, "Starting training run");

    let records = load_sources(&config.data.files, config.data.delimiter_byte()?)
        .await
        .context("loading data files")?;

    let pipeline = FeaturePipeline::new(registry, config.features.pipeline_config());
    pipeline.configure(&config.features.scalars, &config.features.fingerprints)?;

    let (table, preparation) =
        prepare_training_table(&pipeline, normalizer.as_ref(), records, &config.data.adducts).await?;
    if table.len() < 2 {
        anyhow::bail!(
            "only {} usable examples after preparation ({} rows read, {} filtered by adduct, {} skipped)",
            table.len(),
            preparation.total,
            preparation.filtered_by_adduct,
            preparation.skipped.len()
        );
    }

    let schema = pipeline.schema()?;
    let (train, test) = table.split(config.training.test_fraction, config.training.seed)?;
    info!(train = train.len(), test = test.len(), "Split training table");
    let train = Arc::new(train);

    let mut reports = Vec::new();
    let mut models = Vec::new();
    for &kind in &config.training.models {
        let trainer = trainer_for(kind, &config.training);
        let rows = Arc::clone(&train);
        let model = tokio::task::spawn_blocking(move || trainer.fit(&rows))
            .await
            .context("training task panicked")?
            .with_context(|| format!("training {kind}"))?;

        let metrics = if test.is_empty() {
            warn!(model = %kind, "No held-out rows, skipping evaluation");
            None
        } else {
            Some(evaluate(model.as_ref(), &test)?)
        };

        let dir = config.output.models_dir.join(kind.as_str());
        save_model(model.as_ref(), &schema, metrics, run_id, &dir)?;

        reports.push(ModelReport { kind, metrics, dir });
        models.push((schema.clone(), model));
    }

    Ok(TrainingOutcome {
        run_id,
        preparation,
        train_rows: train.len(),
        test_rows: test.len(),
        reports,
        models,
    })
}

/// Human-readable summary of a training run.
pub fn summary(outcome: &TrainingOutcome) -> String {
    let p = &outcome.preparation;
    let mut out = format!(
        "Run {}: {} rows read, {} filtered by adduct, {} skipped, {} train / {} test\n",
        outcome.run_id,
        p.total,
        p.filtered_by_adduct,
        p.skipped.len(),
        outcome.train_rows,
        outcome.test_rows
    );
    for report in &outcome.reports {
        match &report.metrics {
            Some(m) => out.push_str(&format!(
                "{:<18} R²: {:.4}  MAE: {:.3}  MSE: {:.3}  RMSE: {:.3}  saved to {}\n",
                report.kind.as_str(),
                m.r_squared,
                m.mae,
                m.mse,
                m.rmse,
                report.dir.display()
            )),
            None => out.push_str(&format!(
                "{:<18} not evaluated  saved to {}\n",
                report.kind.as_str(),
                report.dir.display()
            )),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccspredict_test_utils::{MockNormalizer, StaticProvider};
    use ccspredict_ml::load_model;

    use crate::service::PredictionService;

    fn fixture(dir: &std::path::Path) -> (Config, Arc<dyn StructureNormalizer>, ProviderRegistry) {
        let mut csv = String::from("Adduct;MZ;Smiles;InChI;CcsValue\n");
        let mut smiles = Vec::new();
        for i in 0..30 {
            let s = format!("C{}O", "C".repeat(i));
            let (a, b) = (i as f64, (i % 4) as f64);
            csv.push_str(&format!("[M+H]+;{};{};;{}\n", 40 + i, s, 110.0 + 3.0 * a + b));
            smiles.push((s, a, b));
        }
        // Sodium adducts are filtered out by default.
        csv.push_str("[M+Na]+;1;CO;;99.0\n");

        let provider = smiles.iter().fold(StaticProvider::new("p"), |p, (s, a, b)| {
            p.with(s, [("A", (*a).into()), ("B", (*b).into())])
        });
        let normalizer = MockNormalizer::new().with_canonical(smiles.iter().map(|(s, _, _)| s.as_str()));

        let data = dir.join("ccs.csv");
        std::fs::write(&data, csv).unwrap();

        let mut config = Config::default();
        config.data.files = vec![data];
        config.features.scalars = vec!["A".to_string(), "B".to_string()];
        config.features.fingerprints = Vec::new();
        config.training.models = vec![ModelKind::GradientBoosting, ModelKind::RandomForest];
        config.training.gradient_boosting.iterations = 10;
        config.training.random_forest.n_trees = 5;
        config.training.random_forest.min_samples_leaf = 2;
        config.output.models_dir = dir.join("models");

        let registry = ProviderRegistry::new().with(Arc::new(provider));
        (config, Arc::new(normalizer), registry)
    }

    #[tokio::test]
    async fn test_training_run_saves_evaluated_models() {
        let dir = tempfile::tempdir().unwrap();
        let (config, normalizer, registry) = fixture(dir.path());

        let outcome = run_training(&config, normalizer.clone(), registry.clone()).await.unwrap();
        assert_eq!(outcome.preparation.total, 31);
        assert_eq!(outcome.preparation.filtered_by_adduct, 1);
        assert_eq!(outcome.train_rows + outcome.test_rows, 30);
        assert_eq!(outcome.test_rows, 6);
        assert_eq!(outcome.reports.len(), 2);
        assert!(outcome.reports.iter().all(|r| r.metrics.map_or(false, |m| m.is_finite())));

        let saved = load_model(&config.output.models_dir.join("random_forest")).unwrap();
        assert_eq!(saved.manifest.run_id, outcome.run_id);
        assert_eq!(saved.manifest.schema.scalars, vec!["A", "B"]);

        let summary = summary(&outcome);
        assert!(summary.contains("gradient_boosting"));
        assert!(summary.contains("RMSE"));

        let service = PredictionService::load(
            &config.output.models_dir,
            &config.training.models,
            normalizer,
            registry,
            &config.features.pipeline_config(),
        )
        .unwrap();
        let predictions = service.predict("CCCO").await.unwrap();
        assert_eq!(predictions.len(), 2);
        assert!(predictions.iter().all(|p| p.value.is_finite()));
    }

    #[tokio::test]
    async fn test_too_few_examples_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (mut config, normalizer, registry) = fixture(dir.path());
        config.data.adducts.exact = vec!["[M+K]+".to_string()];
        config.data.adducts.contains = Vec::new();

        assert!(run_training(&config, normalizer, registry).await.is_err());
    }
}
