//! Prediction service: one structure in, one CCS estimate per model out.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use ccspredict_chem::{resolve_structure, ProviderRegistry, StructureNormalizer};
use ccspredict_common::{CcsPrediction, Result, Structure};
use ccspredict_features::{FeaturePipeline, FeatureSchema, PipelineConfig};
use ccspredict_ml::{load_model, FittedModel, ModelKind};

/// Models that share one feature schema, and the pipeline that feeds them.
struct ModelGroup {
    pipeline: FeaturePipeline,
    models: Vec<Box<dyn FittedModel>>,
}

pub struct PredictionService {
    normalizer: Arc<dyn StructureNormalizer>,
    groups: Vec<ModelGroup>,
}

impl PredictionService {
    /// Build from trained models and the schema each was trained with.
    pub fn new(
        normalizer: Arc<dyn StructureNormalizer>,
        registry: ProviderRegistry,
        config: &PipelineConfig,
        models: Vec<(FeatureSchema, Box<dyn FittedModel>)>,
    ) -> Result<Self> {
        let mut schemas: Vec<FeatureSchema> = Vec::new();
        let mut groups: Vec<ModelGroup> = Vec::new();

        for (schema, model) in models {
            match schemas.iter().position(|s| *s == schema) {
                Some(i) => groups[i].models.push(model),
                None => {
                    let pipeline = FeaturePipeline::from_schema(registry.clone(), config.clone(), &schema)?;
                    schemas.push(schema);
                    groups.push(ModelGroup {
                        pipeline,
                        models: vec![model],
                    });
                }
            }
        }

        Ok(Self { normalizer, groups })
    }

    /// Load every model of `kinds` found under `models_dir`. Kinds without
    /// a saved model are skipped with a warning.
    pub fn load(
        models_dir: &Path,
        kinds: &[ModelKind],
        normalizer: Arc<dyn StructureNormalizer>,
        registry: ProviderRegistry,
        config: &PipelineConfig,
    ) -> Result<Self> {
        let mut models = Vec::new();
        for kind in kinds {
            let dir = models_dir.join(kind.as_str());
            if !dir.exists() {
                warn!(model = %kind, dir = %dir.display(), "No saved model, skipping");
                continue;
            }
            let saved = load_model(&dir)?;
            models.push((saved.manifest.schema, saved.model));
        }
        info!(models = models.len(), "Prediction models loaded");
        Self::new(normalizer, registry, config, models)
    }

    pub fn model_names(&self) -> Vec<&'static str> {
        self.groups
            .iter()
            .flat_map(|g| g.models.iter().map(|m| m.name()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Validate, canonicalize and featurize `input`, then ask every model.
    pub async fn predict(&self, input: &str) -> Result<Vec<CcsPrediction>> {
        let input = input.trim();
        let structure = if input.starts_with("InChI=") {
            Structure::from_inchi(input)
        } else {
            Structure::from_smiles(input)
        };
        let smiles = resolve_structure(self.normalizer.as_ref(), &structure).await?;

        let mut predictions = Vec::new();
        for group in &self.groups {
            let features = group.pipeline.compute_feature_vector(&smiles).await?;
            for model in &group.models {
                predictions.push(CcsPrediction::new(model.name(), model.predict(&features)?));
            }
        }
        Ok(predictions)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ccspredict_test_utils::{MockNormalizer, StaticProvider};
    use ccspredict_common::{CcsError, DescriptorValue};
    use ccspredict_features::FingerprintSpec;
    use ccspredict_ml::MinMaxScaler;

    /// Linear stand-in model: 100 + 10 × sum of scaled features.
    pub(crate) struct SumModel {
        kind: ModelKind,
        scaler: MinMaxScaler,
    }

    impl SumModel {
        pub(crate) fn new(kind: ModelKind, width: usize) -> Self {
            let lo = vec![0.0; width];
            let hi = vec![1.0; width];
            let rows = [lo.as_slice(), hi.as_slice()];
            Self {
                kind,
                scaler: MinMaxScaler::fit(&rows).unwrap(),
            }
        }
    }

    impl FittedModel for SumModel {
        fn kind(&self) -> ModelKind {
            self.kind
        }

        fn scaler(&self) -> &MinMaxScaler {
            &self.scaler
        }

        fn params(&self) -> serde_json::Value {
            serde_json::Value::Null
        }

        fn predict_scaled(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
            Ok(rows.iter().map(|r| 100.0 + 10.0 * r.iter().sum::<f64>()).collect())
        }

        fn save_payload(&self, _dir: &Path) -> Result<()> {
            Ok(())
        }
    }

    pub(crate) fn schema() -> FeatureSchema {
        FeatureSchema {
            scalars: vec!["A".to_string()],
            fingerprints: vec![FingerprintSpec {
                name: "FP".to_string(),
                width: Some(2),
            }],
        }
    }

    pub(crate) fn service() -> PredictionService {
        let normalizer = MockNormalizer::new()
            .with("OCC", "CCO")
            .with("InChI=1S/C2H6O/c1-2-3/h3H,2H2,1H3", "CCO");
        let provider = StaticProvider::new("p").with("CCO", [
            ("A", 1.0.into()),
            ("FP", DescriptorValue::Vector(vec![1.0, 0.0])),
        ]);
        let registry = ProviderRegistry::new().with(Arc::new(provider));
        let models = [ModelKind::GradientBoosting, ModelKind::RandomForest]
            .into_iter()
            .map(|kind| (schema(), Box::new(SumModel::new(kind, 3)) as Box<dyn FittedModel>))
            .collect();
        PredictionService::new(Arc::new(normalizer), registry, &PipelineConfig::default(), models).unwrap()
    }

    #[tokio::test]
    async fn test_every_model_answers_in_square_angstrom() {
        let service = service();
        assert_eq!(service.model_names(), vec!["gradient_boosting", "random_forest"]);

        let predictions = service.predict("OCC").await.unwrap();
        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[0].model, "gradient_boosting");
        assert_eq!(predictions[0].value, 120.0);
        assert_eq!(predictions[1].unit, "Å²");
    }

    #[tokio::test]
    async fn test_inchi_and_smiles_agree() {
        let service = service();
        let from_smiles = service.predict("OCC").await.unwrap();
        let from_inchi = service.predict("InChI=1S/C2H6O/c1-2-3/h3H,2H2,1H3").await.unwrap();
        assert_eq!(from_smiles, from_inchi);
    }

    #[tokio::test]
    async fn test_invalid_structure_is_reported() {
        let service = service();
        assert!(matches!(service.predict("C1CC(").await, Err(CcsError::InvalidStructure(_))));
        assert!(matches!(service.predict("   ").await, Err(CcsError::InvalidStructure(_))));
    }

    #[test]
    fn test_missing_model_dirs_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let service = PredictionService::load(
            dir.path(),
            &ModelKind::ALL,
            Arc::new(MockNormalizer::new()),
            ProviderRegistry::new(),
            &PipelineConfig::default(),
        )
        .unwrap();
        assert!(service.is_empty());
    }
}
