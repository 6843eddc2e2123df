//! In-memory chemistry doubles shared by the ccspredict test suites.
//!
//! [`MockNormalizer`] and [`StaticProvider`] stand in for the RDKit bridge
//! so pipeline, training and prediction tests run without Python.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;

use ccspredict_common::{CanonicalSmiles, CcsError, DescriptorSet, DescriptorValue, Result};

use ccspredict_chem::{DescriptorProvider, StructureNormalizer, Validation};

// ── Normalizer ───────────────────────────────────────────────────────────────

/// Normalizer backed by an explicit input → canonical SMILES table.
///
/// Every canonical SMILES normalizes to itself. Inputs starting with
/// `InChI=` validate as InChI, everything else as SMILES.
#[derive(Debug, Clone, Default)]
pub struct MockNormalizer {
    table: HashMap<String, String>,
}

impl MockNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `input` to `canonical`.
    pub fn with(mut self, input: &str, canonical: &str) -> Self {
        self.table.insert(input.to_string(), canonical.to_string());
        self.table.insert(canonical.to_string(), canonical.to_string());
        self
    }

    /// Register SMILES that are already canonical.
    pub fn with_canonical<I, S>(mut self, smiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for s in smiles {
            let s = s.as_ref().to_string();
            self.table.insert(s.clone(), s);
        }
        self
    }
}

#[async_trait]
impl StructureNormalizer for MockNormalizer {
    async fn validate(&self, text: &str) -> Result<Validation> {
        let known = self.table.contains_key(text.trim());
        let inchi = text.trim().starts_with("InChI=");
        Ok(Validation {
            smiles: known && !inchi,
            inchi: known && inchi,
        })
    }

    async fn normalize(&self, text: &str) -> Result<CanonicalSmiles> {
        match self.table.get(text.trim()) {
            Some(canonical) => CanonicalSmiles::new(canonical.clone()),
            None => Err(CcsError::InvalidStructure(format!("unknown structure: {text}"))),
        }
    }
}

// ── Provider ─────────────────────────────────────────────────────────────────

/// Provider that returns canned descriptor sets per canonical SMILES.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    name: String,
    supported: BTreeSet<String>,
    values: HashMap<String, DescriptorSet>,
    fallback: Option<DescriptorSet>,
    failing: HashSet<String>,
    delay: Option<Duration>,
}

impl StaticProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Declare names without giving values for them.
    pub fn supports<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.supported.extend(names.into_iter().map(|s| s.as_ref().to_string()));
        self
    }

    /// Values emitted for `smiles`. Their names become supported names.
    pub fn with<I>(mut self, smiles: &str, entries: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, DescriptorValue)>,
    {
        let set: DescriptorSet = entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        self.supported.extend(set.keys().cloned());
        self.values.insert(smiles.to_string(), set);
        self
    }

    /// Values emitted for any SMILES without its own entry.
    pub fn with_fallback<I>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, DescriptorValue)>,
    {
        let set: DescriptorSet = entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        self.supported.extend(set.keys().cloned());
        self.fallback = Some(set);
        self
    }

    /// Make computation fail for `smiles`, like a valence error would.
    pub fn fail_on(mut self, smiles: &str) -> Self {
        self.failing.insert(smiles.to_string());
        self
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl DescriptorProvider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_names(&self) -> BTreeSet<String> {
        self.supported.clone()
    }

    async fn compute(&self, smiles: &CanonicalSmiles) -> Result<DescriptorSet> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(smiles.as_str()) {
            return Err(CcsError::Provider {
                provider: self.name.clone(),
                reason: format!("cannot compute descriptors for {smiles}"),
            });
        }
        Ok(self
            .values
            .get(smiles.as_str())
            .or(self.fallback.as_ref())
            .cloned()
            .unwrap_or_default())
    }
}
