//! Structure identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CcsError, Result};

/// Raw structure identifiers as they arrive from a data file or a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Structure {
    /// SMILES.
    pub primary: Option<String>,
    /// InChI, used when no SMILES is given.
    pub alternate: Option<String>,
}

impl Structure {
    pub fn new(primary: Option<String>, alternate: Option<String>) -> Self {
        Self {
            primary: primary.filter(|s| !s.trim().is_empty()),
            alternate: alternate.filter(|s| !s.trim().is_empty()),
        }
    }

    pub fn from_smiles(smiles: impl Into<String>) -> Self {
        Self::new(Some(smiles.into()), None)
    }

    pub fn from_inchi(inchi: impl Into<String>) -> Self {
        Self::new(None, Some(inchi.into()))
    }

    /// The identifier that has to go through the normalizer: the SMILES if
    /// present, otherwise the InChI.
    pub fn identifier(&self) -> Result<&str> {
        self.primary
            .as_deref()
            .or(self.alternate.as_deref())
            .map(str::trim)
            .ok_or_else(|| CcsError::InvalidStructure("no SMILES or InChI given".to_string()))
    }
}

/// A SMILES string produced by the structure normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalSmiles(String);

impl CanonicalSmiles {
    /// Wrap a normalizer output. Empty strings are rejected.
    pub fn new(smiles: impl Into<String>) -> Result<Self> {
        let smiles = smiles.into();
        if smiles.trim().is_empty() {
            return Err(CcsError::InvalidStructure("empty canonical SMILES".to_string()));
        }
        Ok(Self(smiles))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalSmiles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalSmiles {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
