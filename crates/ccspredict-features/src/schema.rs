//! Feature schema snapshot and pipeline settings.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use ccspredict_chem::FingerprintKind;
use ccspredict_common::{CcsError, Result};

/// What to do when two providers declare the same configured name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// The provider registered last supplies the value. A warning is logged
    /// once at configure time.
    #[default]
    LastWriterWins,
    /// Configuration fails with `DescriptorCollision`.
    Reject,
}

fn default_concurrency() -> usize {
    8
}

fn default_molecule_timeout_secs() -> f64 {
    30.0
}

/// Runtime settings for a [`FeaturePipeline`](crate::FeaturePipeline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub collision_policy: CollisionPolicy,
    /// Molecules prepared at once during batch preparation.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Upper bound on one molecule's provider phase.
    #[serde(default = "default_molecule_timeout_secs")]
    pub molecule_timeout_secs: f64,
    /// Pre-declared fingerprint widths. Fingerprints not listed here take
    /// the width of the first molecule that reports them.
    #[serde(default)]
    pub fingerprint_widths: BTreeMap<String, usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            collision_policy: CollisionPolicy::default(),
            concurrency: default_concurrency(),
            molecule_timeout_secs: default_molecule_timeout_secs(),
            fingerprint_widths: BTreeMap::new(),
        }
    }
}

impl PipelineConfig {
    pub fn with_collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.collision_policy = policy;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_molecule_timeout(mut self, timeout: Duration) -> Self {
        self.molecule_timeout_secs = timeout.as_secs_f64();
        self
    }

    pub fn with_fingerprint_width(mut self, name: &str, width: usize) -> Self {
        self.fingerprint_widths.insert(name.to_string(), width);
        self
    }

    /// Pre-declare the widths of every built-in fingerprint kind.
    pub fn with_declared_fingerprints(mut self) -> Self {
        for kind in FingerprintKind::ALL {
            self.fingerprint_widths
                .entry(kind.name().to_string())
                .or_insert(kind.width());
        }
        self
    }

    /// Reject settings that would disable the per-molecule timeout.
    pub fn validate(&self) -> Result<()> {
        if !self.molecule_timeout_secs.is_finite() || self.molecule_timeout_secs <= 0.0 {
            return Err(CcsError::Config(format!(
                "molecule_timeout_secs must be a positive number of seconds, got {}",
                self.molecule_timeout_secs
            )));
        }
        Ok(())
    }

    pub fn molecule_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.molecule_timeout_secs).unwrap_or(Duration::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintSpec {
    pub name: String,
    /// `None` until the first molecule has been computed.
    pub width: Option<usize>,
}

/// Serializable description of a configured pipeline: which names, in which
/// order, with which fingerprint widths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub scalars: Vec<String>,
    pub fingerprints: Vec<FingerprintSpec>,
}

impl FeatureSchema {
    /// Total vector width, if every fingerprint width is known.
    pub fn total_width(&self) -> Option<usize> {
        self.fingerprints
            .iter()
            .try_fold(self.scalars.len(), |acc, fp| fp.width.map(|w| acc + w))
    }

    /// One name per vector position; fingerprint bits are named `Name[i]`.
    pub fn feature_names(&self) -> Option<Vec<String>> {
        let mut names = self.scalars.clone();
        for fp in &self.fingerprints {
            let width = fp.width?;
            names.extend((0..width).map(|i| format!("{}[{}]", fp.name, i)));
        }
        Some(names)
    }

    pub fn fingerprint_names(&self) -> Vec<String> {
        self.fingerprints.iter().map(|f| f.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(width: Option<usize>) -> FeatureSchema {
        FeatureSchema {
            scalars: vec!["A".into(), "B".into()],
            fingerprints: vec![FingerprintSpec {
                name: "FP".into(),
                width,
            }],
        }
    }

    #[test]
    fn test_total_width_needs_every_width() {
        assert_eq!(schema(None).total_width(), None);
        assert_eq!(schema(Some(3)).total_width(), Some(5));
    }

    #[test]
    fn test_feature_names_expand_fingerprints() {
        let names = schema(Some(2)).feature_names().unwrap();
        assert_eq!(names, vec!["A", "B", "FP[0]", "FP[1]"]);
    }

    #[test]
    fn test_timeout_must_be_positive_and_finite() {
        assert!(PipelineConfig::default().validate().is_ok());
        for secs in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let cfg = PipelineConfig {
                molecule_timeout_secs: secs,
                ..PipelineConfig::default()
            };
            assert!(matches!(cfg.validate(), Err(CcsError::Config(_))), "{secs}");
        }
    }

    #[test]
    fn test_config_defaults_when_omitted() {
        let cfg: PipelineConfig = from_json("{}");
        assert_eq!(cfg, PipelineConfig::default());
        assert_eq!(cfg.concurrency, 8);
        assert_eq!(cfg.molecule_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_declared_fingerprints_keep_explicit_widths() {
        let cfg = PipelineConfig::default()
            .with_fingerprint_width("MorganFingerprint", 1024)
            .with_declared_fingerprints();
        assert_eq!(cfg.fingerprint_widths["MorganFingerprint"], 1024);
        assert_eq!(cfg.fingerprint_widths["MACCSFingerprint"], 167);
    }

    fn from_json(json: &str) -> PipelineConfig {
        serde_json::from_str(json).unwrap()
    }
}
