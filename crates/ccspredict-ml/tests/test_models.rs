//! Fit, evaluate and persist every backend on a synthetic CCS table.

use ccspredict_common::{FeatureVector, LabeledExample, Provenance, TrainingTable};
use ccspredict_features::FeatureSchema;
use ccspredict_ml::{evaluate, load_model, save_model, trainer_for, ModelKind, TrainingConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

const WIDTH: usize = 6;

/// 100 molecules whose "CCS" grows with mass-like features plus noise.
fn synthetic_table() -> TrainingTable {
    let mut rng = StdRng::seed_from_u64(7);
    let examples = (0..100)
        .map(|i| {
            let mut features: Vec<f64> = (0..WIDTH - 1).map(|_| rng.gen_range(0.0..1.0)).collect();
            // One binary fingerprint-like column.
            features.push(if i % 3 == 0 { 1.0 } else { 0.0 });
            let target = 120.0 + 80.0 * features[0] + 30.0 * features[1] - 10.0 * features[5] + rng.gen_range(-2.0..2.0);
            LabeledExample {
                features: FeatureVector::new(features),
                target,
                provenance: Provenance {
                    smiles: format!("C{i}"),
                    adduct: Some("[M+H]+".to_string()),
                    mz: None,
                },
            }
        })
        .collect();
    TrainingTable::from_examples(examples).unwrap()
}

fn fast_config() -> TrainingConfig {
    let mut cfg = TrainingConfig::default();
    cfg.gradient_boosting.iterations = 30;
    cfg.random_forest.n_trees = 20;
    cfg.linear_svr.epochs = 200;
    cfg.neural_network.epochs = 150;
    cfg
}

fn schema() -> FeatureSchema {
    FeatureSchema {
        scalars: (0..WIDTH).map(|i| format!("f{i}")).collect(),
        fingerprints: Vec::new(),
    }
}

#[test]
fn test_every_backend_yields_finite_metrics() {
    let table = synthetic_table();
    let (train, test) = table.split(0.2, 0).unwrap();
    let cfg = fast_config();

    for kind in ModelKind::ALL {
        let model = trainer_for(kind, &cfg).fit(&train).unwrap();
        assert_eq!(model.kind(), kind);
        assert_eq!(model.n_features(), WIDTH);

        let metrics = evaluate(model.as_ref(), &test).unwrap();
        assert!(metrics.is_finite(), "{kind}: {metrics:?}");
        assert!(metrics.rmse >= 0.0);
        assert!(metrics.mae >= 0.0);
        assert!((metrics.rmse * metrics.rmse - metrics.mse).abs() < 1e-6 * metrics.mse.max(1.0));
    }
}

#[test]
fn test_tree_models_learn_the_trend() {
    let table = synthetic_table();
    let (train, test) = table.split(0.2, 0).unwrap();
    let model = trainer_for(ModelKind::GradientBoosting, &fast_config()).fit(&train).unwrap();
    let metrics = evaluate(model.as_ref(), &test).unwrap();
    assert!(metrics.r_squared > 0.5, "{metrics:?}");
}

#[test]
fn test_saved_models_predict_identically() {
    let table = synthetic_table();
    let cfg = fast_config();
    let dir = tempfile::tempdir().unwrap();
    let run_id = Uuid::new_v4();
    let probe = table.examples()[3].features.clone();

    for kind in ModelKind::ALL {
        let model = trainer_for(kind, &cfg).fit(&table).unwrap();
        let metrics = evaluate(model.as_ref(), &table).unwrap();
        let model_dir = dir.path().join(kind.as_str());

        save_model(model.as_ref(), &schema(), Some(metrics), run_id, &model_dir).unwrap();
        let restored = load_model(&model_dir).unwrap();

        assert_eq!(restored.manifest.kind, kind);
        assert_eq!(restored.manifest.run_id, run_id);
        assert_eq!(restored.manifest.schema, schema());
        let saved = restored.manifest.metrics.unwrap();
        assert!((saved.rmse - metrics.rmse).abs() < 1e-9);

        let before = model.predict(&probe).unwrap();
        let after = restored.model.predict(&probe).unwrap();
        assert!((before - after).abs() < 1e-6, "{kind}: {before} vs {after}");
    }
}

#[test]
fn test_save_rejects_schema_of_other_width() {
    let table = synthetic_table();
    let model = trainer_for(ModelKind::RandomForest, &fast_config()).fit(&table).unwrap();
    let narrow = FeatureSchema {
        scalars: vec!["f0".to_string()],
        fingerprints: Vec::new(),
    };
    let dir = tempfile::tempdir().unwrap();
    assert!(save_model(model.as_ref(), &narrow, None, Uuid::new_v4(), dir.path()).is_err());
}

#[test]
fn test_prediction_checks_width() {
    let table = synthetic_table();
    let model = trainer_for(ModelKind::LinearSvr, &fast_config()).fit(&table).unwrap();
    assert!(model.predict(&FeatureVector::new(vec![0.0; WIDTH - 1])).is_err());
}

#[test]
fn test_empty_table_is_rejected() {
    let cfg = fast_config();
    for kind in ModelKind::ALL {
        assert!(trainer_for(kind, &cfg).fit(&TrainingTable::new()).is_err());
    }
}

#[test]
fn test_missing_model_dir() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_model(&dir.path().join("nothing")).is_err());
}
