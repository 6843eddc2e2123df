//! ccspredict-chem — Chemistry collaborators for the feature pipeline.
//!
//! Structure parsing, canonicalization and descriptor math all happen in
//! RDKit; this crate only speaks to it:
//! 1. Validating and canonicalizing SMILES / InChI input
//! 2. Computing named scalar descriptors per provider group
//! 3. Computing fixed-width fingerprint bit vectors
//!
//! Everything is reached through the [`StructureNormalizer`] and
//! [`DescriptorProvider`] traits so the pipeline can run against in-memory
//! doubles (see the `ccspredict-test-utils` crate).

pub mod normalizer;
pub mod provider;
pub mod fingerprint;
pub mod rdkit;

pub use normalizer::{resolve_structure, StructureNormalizer, Validation};
pub use provider::{DescriptorProvider, ProviderRegistry};
pub use fingerprint::FingerprintKind;
pub use rdkit::{rdkit_registry, DescriptorGroup, RdkitProvider, RdkitToolkit};
