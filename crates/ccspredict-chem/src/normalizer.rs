//! Structure validation and canonicalization.

use async_trait::async_trait;
use tracing::debug;

use ccspredict_common::{CanonicalSmiles, CcsError, Result, Structure};

/// Which notations a piece of text parses as. Each is judged on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Validation {
    pub smiles: bool,
    pub inchi: bool,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.smiles || self.inchi
    }
}

/// Common interface for structure normalizers.
#[async_trait]
pub trait StructureNormalizer: Send + Sync {
    /// Classify `text` as SMILES and/or InChI.
    async fn validate(&self, text: &str) -> Result<Validation>;

    /// Convert a valid SMILES or InChI into one canonical SMILES.
    ///
    /// Fails with [`CcsError::InvalidStructure`] if the text does not parse.
    /// Normalizing an already canonical SMILES returns it unchanged.
    async fn normalize(&self, text: &str) -> Result<CanonicalSmiles>;
}

/// Turn a raw [`Structure`] into a canonical SMILES.
///
/// Uses the SMILES when one is given and the InChI otherwise. The identifier
/// is validated before it is normalized, so a garbage structure never
/// reaches descriptor computation.
pub async fn resolve_structure(
    normalizer: &dyn StructureNormalizer,
    structure: &Structure,
) -> Result<CanonicalSmiles> {
    let identifier = structure.identifier()?;

    let validation = normalizer.validate(identifier).await?;
    if !validation.is_valid() {
        return Err(CcsError::InvalidStructure(format!(
            "not a valid SMILES or InChI: {identifier}"
        )));
    }

    let canonical = normalizer.normalize(identifier).await?;
    debug!(input = identifier, canonical = %canonical, "Normalized structure");
    Ok(canonical)
}
