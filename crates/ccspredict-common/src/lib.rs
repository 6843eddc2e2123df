//! ccspredict-common — Shared types, errors, and traits used across all ccspredict crates.

pub mod error;
pub mod entities;
pub mod descriptor;
pub mod structure;

// Re-export commonly used types
pub use error::{CcsError, Result};
pub use entities::{CcsPrediction, CcsRecord, FeatureVector, LabeledExample, Provenance, TrainingTable, CCS_UNIT};
pub use descriptor::{DescriptorSet, DescriptorValue};
pub use structure::{CanonicalSmiles, Structure};
