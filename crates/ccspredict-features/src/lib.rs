//! ccspredict-features — Turns provider outputs into model-ready rows.
//!
//! The same [`FeaturePipeline`] configuration is used at training and at
//! inference time; its [`FeatureSchema`] snapshot travels with every trained
//! model so both sides produce vectors of identical length and meaning.

pub mod schema;
pub mod merge;
pub mod pipeline;
pub mod batch;

pub use schema::{CollisionPolicy, FeatureSchema, FingerprintSpec, PipelineConfig};
pub use pipeline::FeaturePipeline;
pub use batch::{prepare_training_table, AdductFilter, PreparationReport, SkippedRow};
