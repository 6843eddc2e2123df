//! Descriptor provider interface and the ordered provider registry.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;

use ccspredict_common::{CanonicalSmiles, DescriptorSet, Result};

/// Common interface for all descriptor and fingerprint providers.
///
/// Implementations must be safe to call concurrently. Providers that wrap a
/// chemistry engine either hold no engine state or create it per call.
#[async_trait]
pub trait DescriptorProvider: Send + Sync {
    /// Stable provider name, used in logs and collision reports.
    fn name(&self) -> &str;

    /// Every descriptor or fingerprint name this provider can emit.
    fn supported_names(&self) -> BTreeSet<String>;

    /// Compute descriptors for one canonical structure.
    async fn compute(&self, smiles: &CanonicalSmiles) -> Result<DescriptorSet>;
}

/// Providers in priority order. A provider registered later wins a name
/// collision against one registered earlier.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn DescriptorProvider>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers.iter().map(|p| p.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a provider with the next-higher priority.
    pub fn register(&mut self, provider: Arc<dyn DescriptorProvider>) -> &mut Self {
        self.providers.push(provider);
        self
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, provider: Arc<dyn DescriptorProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn providers(&self) -> &[Arc<dyn DescriptorProvider>] {
        &self.providers
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Names of the providers that declare `name`, lowest priority first.
    pub fn suppliers_of(&self, name: &str) -> Vec<&str> {
        self.providers
            .iter()
            .filter(|p| p.supported_names().contains(name))
            .map(|p| p.name())
            .collect()
    }

    /// Union of every provider's supported names.
    pub fn supported_names(&self) -> BTreeSet<String> {
        self.providers
            .iter()
            .flat_map(|p| p.supported_names())
            .collect()
    }
}
