//! Configuration loading for ccspredict.
//! Reads ccspredict.toml from the current directory or the path in CCSPREDICT_CONFIG.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use ccspredict_chem::FingerprintKind;
use ccspredict_features::{AdductFilter, PipelineConfig};
use ccspredict_ml::TrainingConfig;

pub const DEFAULT_CONFIG_FILE: &str = "ccspredict.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub chemistry: ChemistryConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Data files, merged in order before the train/test split.
    #[serde(default = "default_data_files")]
    pub files: Vec<PathBuf>,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default)]
    pub adducts: AdductFilter,
}

fn default_data_files() -> Vec<PathBuf> {
    vec![PathBuf::from("data/training.csv"), PathBuf::from("data/test.csv")]
}
fn default_delimiter() -> char { ';' }

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            files: default_data_files(),
            delimiter: default_delimiter(),
            adducts: AdductFilter::default(),
        }
    }
}

impl DataConfig {
    pub fn delimiter_byte(&self) -> anyhow::Result<u8> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(|b| b.is_ascii())
            .ok_or_else(|| anyhow::anyhow!("data.delimiter must be a single ASCII character, got {:?}", self.delimiter))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChemistryConfig {
    /// Interpreter with RDKit installed.
    #[serde(default = "default_python")]
    pub python: String,
}

fn default_python() -> String { "python3".to_string() }

impl Default for ChemistryConfig {
    fn default() -> Self {
        Self { python: default_python() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default = "default_scalars")]
    pub scalars: Vec<String>,
    #[serde(default = "default_fingerprints")]
    pub fingerprints: Vec<String>,
    #[serde(flatten)]
    pub pipeline: PipelineConfig,
}

fn default_scalars() -> Vec<String> {
    [
        "HallKierAlpha",
        "Kappa1",
        "Kappa2",
        "Kappa3",
        "Chi0v",
        "Chi1v",
        "Chi2v",
        "Chi3v",
        "TPSA",
        "LabuteASA",
        "ExactMolWt",
        "NumHeavyAtoms",
        "FractionCSP3",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_fingerprints() -> Vec<String> {
    vec![
        FingerprintKind::Morgan.name().to_string(),
        FingerprintKind::Maccs.name().to_string(),
    ]
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            scalars: default_scalars(),
            fingerprints: default_fingerprints(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl FeaturesConfig {
    /// Pipeline settings with the built-in fingerprint widths pre-declared.
    pub fn pipeline_config(&self) -> PipelineConfig {
        self.pipeline.clone().with_declared_fingerprints()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// One sub-directory per trained model kind.
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,
}

fn default_models_dir() -> PathBuf { PathBuf::from("models") }

impl Default for OutputConfig {
    fn default() -> Self {
        Self { models_dir: default_models_dir() }
    }
}


impl Config {
    /// Load configuration from ccspredict.toml.
    /// An explicit path (flag or CCSPREDICT_CONFIG) must exist; a missing
    /// default file yields the built-in defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => match std::env::var("CCSPREDICT_CONFIG") {
                Ok(p) => PathBuf::from(p),
                Err(_) => {
                    let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                    if !default.exists() {
                        tracing::debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                        return Ok(Self::default());
                    }
                    default
                }
            },
        };

        if !path.exists() {
            anyhow::bail!(
                "Config file not found: {}\n\
                 Copy ccspredict.example.toml to ccspredict.toml and edit it.",
                path.display()
            );
        }

        let content = std::fs::read_to_string(&path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.data.delimiter_byte()?;
        self.features.pipeline.validate()?;
        if !(0.0..1.0).contains(&self.training.test_fraction) {
            anyhow::bail!("training.test_fraction must be in [0, 1), got {}", self.training.test_fraction);
        }
        if self.training.models.is_empty() {
            anyhow::bail!("training.models must name at least one model");
        }
        if self.features.scalars.is_empty() && self.features.fingerprints.is_empty() {
            anyhow::bail!("features must name at least one scalar or fingerprint");
        }
        Ok(())
    }
}
