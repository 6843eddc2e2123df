//! Feature vector assembly.
//!
//! A [`FeaturePipeline`] owns an ordered provider registry and, once
//! configured, a fixed schema: scalar names first, then fingerprint names.
//! For each molecule every relevant provider runs concurrently, outputs are
//! merged in registration order, and the configured names are read out of
//! the merged set into one flat vector.
//!
//! Fingerprint widths are set-once cells. The first molecule to report a
//! fingerprint fixes its width for the lifetime of the pipeline unless the
//! width was pre-declared, and every later molecule must agree.

use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

use futures_util::future::join_all;
use tracing::{debug, warn};

use ccspredict_chem::{DescriptorProvider, ProviderRegistry};
use ccspredict_common::{CanonicalSmiles, CcsError, DescriptorSet, DescriptorValue, FeatureVector, Result};

use crate::merge::merge_descriptor_sets;
use crate::schema::{CollisionPolicy, FeatureSchema, FingerprintSpec, PipelineConfig};

struct FingerprintSlot {
    name: String,
    width: OnceLock<usize>,
}

struct Configured {
    scalars: Vec<String>,
    fingerprints: Vec<FingerprintSlot>,
    /// Providers that supply at least one configured name, in registration order.
    active: Vec<Arc<dyn DescriptorProvider>>,
    /// Every configured name, for filtering provider output.
    wanted: BTreeSet<String>,
}

impl Configured {
    fn same_names(&self, scalars: &[String], fingerprints: &[String]) -> bool {
        self.scalars == scalars
            && self.fingerprints.len() == fingerprints.len()
            && self.fingerprints.iter().zip(fingerprints).all(|(slot, name)| &slot.name == name)
    }
}

pub struct FeaturePipeline {
    registry: ProviderRegistry,
    config: PipelineConfig,
    state: OnceLock<Configured>,
}

impl std::fmt::Debug for FeaturePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeaturePipeline")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("schema", &self.schema().ok())
            .finish()
    }
}

impl FeaturePipeline {
    pub fn new(registry: ProviderRegistry, config: PipelineConfig) -> Self {
        Self {
            registry,
            config,
            state: OnceLock::new(),
        }
    }

    /// Rebuild a pipeline that produces vectors identical in shape to the
    /// ones described by `schema`. Widths recorded in the schema take
    /// precedence over widths in `config`.
    pub fn from_schema(registry: ProviderRegistry, mut config: PipelineConfig, schema: &FeatureSchema) -> Result<Self> {
        for fp in &schema.fingerprints {
            if let Some(width) = fp.width {
                config.fingerprint_widths.insert(fp.name.clone(), width);
            }
        }
        let pipeline = Self::new(registry, config);
        pipeline.configure(&schema.scalars, &schema.fingerprint_names())?;
        Ok(pipeline)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn is_configured(&self) -> bool {
        self.state.get().is_some()
    }

    /// Declare the schema. Calling again with the same names is a no-op;
    /// different names fail with `SchemaChanged`.
    pub fn configure<S: AsRef<str>>(&self, scalars: &[S], fingerprints: &[S]) -> Result<()> {
        let scalars: Vec<String> = scalars.iter().map(|s| s.as_ref().to_string()).collect();
        let fingerprints: Vec<String> = fingerprints.iter().map(|s| s.as_ref().to_string()).collect();

        if let Some(existing) = self.state.get() {
            return if existing.same_names(&scalars, &fingerprints) {
                Ok(())
            } else {
                Err(CcsError::SchemaChanged)
            };
        }

        let configured = self.build(scalars.clone(), fingerprints.clone())?;

        // A concurrent configure may have won the race.
        if let Err(rejected) = self.state.set(configured) {
            drop(rejected);
            let existing = self.state.get().ok_or(CcsError::NotConfigured)?;
            if !existing.same_names(&scalars, &fingerprints) {
                return Err(CcsError::SchemaChanged);
            }
        }

        debug!(
            scalars = scalars.len(),
            fingerprints = fingerprints.len(),
            "Feature pipeline configured"
        );
        Ok(())
    }

    fn build(&self, scalars: Vec<String>, fingerprints: Vec<String>) -> Result<Configured> {
        let mut wanted = BTreeSet::new();
        for name in scalars.iter().chain(&fingerprints) {
            if !wanted.insert(name.clone()) {
                return Err(CcsError::Config(format!("feature {name} is configured twice")));
            }

            let suppliers = self.registry.suppliers_of(name);
            match suppliers.as_slice() {
                [] => return Err(CcsError::UnknownFeature(name.clone())),
                [_] => {}
                [first, .., last] => match self.config.collision_policy {
                    CollisionPolicy::Reject => {
                        return Err(CcsError::DescriptorCollision {
                            name: name.clone(),
                            first: first.to_string(),
                            second: suppliers[1].to_string(),
                        })
                    }
                    CollisionPolicy::LastWriterWins => {
                        warn!(
                            feature = %name,
                            providers = ?suppliers,
                            winner = %last,
                            "Descriptor supplied by several providers, last registered wins"
                        );
                    }
                },
            }
        }

        let active = self
            .registry
            .providers()
            .iter()
            .filter(|p| p.supported_names().iter().any(|n| wanted.contains(n)))
            .cloned()
            .collect();

        let fingerprints = fingerprints
            .into_iter()
            .map(|name| {
                let width = OnceLock::new();
                if let Some(&declared) = self.config.fingerprint_widths.get(&name) {
                    let _ = width.set(declared);
                }
                FingerprintSlot { name, width }
            })
            .collect();

        Ok(Configured {
            scalars,
            fingerprints,
            active,
            wanted,
        })
    }

    fn configured(&self) -> Result<&Configured> {
        self.state.get().ok_or(CcsError::NotConfigured)
    }

    /// Snapshot of the configured names and the widths known so far.
    pub fn schema(&self) -> Result<FeatureSchema> {
        let state = self.configured()?;
        Ok(FeatureSchema {
            scalars: state.scalars.clone(),
            fingerprints: state
                .fingerprints
                .iter()
                .map(|slot| FingerprintSpec {
                    name: slot.name.clone(),
                    width: slot.width.get().copied(),
                })
                .collect(),
        })
    }

    /// `#scalars + Σ fingerprint widths`, once every width is known.
    pub fn feature_vector_length(&self) -> Option<usize> {
        self.schema().ok()?.total_width()
    }

    /// Per-position column names, once every width is known.
    pub fn feature_names(&self) -> Option<Vec<String>> {
        self.schema().ok()?.feature_names()
    }

    /// Compute the feature vector for one canonical structure.
    pub async fn compute_feature_vector(&self, smiles: &CanonicalSmiles) -> Result<FeatureVector> {
        let state = self.configured()?;
        let merged = self.collect_descriptors(state, smiles).await?;

        let width = state.scalars.len()
            + state
                .fingerprints
                .iter()
                .map(|slot| slot.width.get().copied().unwrap_or(0))
                .sum::<usize>();
        let mut values = Vec::with_capacity(width);

        for name in &state.scalars {
            match merged.get(name) {
                Some(DescriptorValue::Scalar(v)) => values.push(*v),
                Some(DescriptorValue::Vector(_)) => {
                    return Err(CcsError::ShapeMismatch {
                        name: name.clone(),
                        expected: "scalar",
                    })
                }
                None => return Err(CcsError::MissingFeature(name.clone())),
            }
        }

        for slot in &state.fingerprints {
            let bits = match merged.get(&slot.name) {
                Some(DescriptorValue::Vector(bits)) => bits,
                Some(DescriptorValue::Scalar(_)) => {
                    return Err(CcsError::ShapeMismatch {
                        name: slot.name.clone(),
                        expected: "vector",
                    })
                }
                None => return Err(CcsError::MissingFeature(slot.name.clone())),
            };

            let expected = *slot.width.get_or_init(|| {
                debug!(fingerprint = %slot.name, width = bits.len(), "Fingerprint width established");
                bits.len()
            });
            if bits.len() != expected {
                return Err(CcsError::FingerprintLengthMismatch {
                    name: slot.name.clone(),
                    expected,
                    actual: bits.len(),
                });
            }
            values.extend_from_slice(bits);
        }

        Ok(FeatureVector::new(values))
    }

    /// Run the active providers concurrently under the molecule timeout and
    /// merge their outputs in registration order.
    async fn collect_descriptors(&self, state: &Configured, smiles: &CanonicalSmiles) -> Result<DescriptorSet> {
        let timeout = self.config.molecule_timeout();
        let calls = state.active.iter().map(|p| p.compute(smiles));

        let results = tokio::time::timeout(timeout, join_all(calls))
            .await
            .map_err(|_| CcsError::Timeout(timeout.as_secs_f64().ceil() as u64))?;

        let mut sets = Vec::with_capacity(results.len());
        for (provider, result) in state.active.iter().zip(results) {
            let mut set = result?;
            set.retain(|name, _| state.wanted.contains(name));
            check_finite(provider.name(), &set)?;
            sets.push(set);
        }
        Ok(merge_descriptor_sets(sets))
    }
}

fn check_finite(provider: &str, set: &DescriptorSet) -> Result<()> {
    for (name, value) in set {
        let finite = match value {
            DescriptorValue::Scalar(v) => v.is_finite(),
            DescriptorValue::Vector(v) => v.iter().all(|x| x.is_finite()),
        };
        if !finite {
            return Err(CcsError::Provider {
                provider: provider.to_string(),
                reason: format!("non-finite value for {name}"),
            });
        }
    }
    Ok(())
}
