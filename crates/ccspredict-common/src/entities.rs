//! Feature vectors, labeled examples and training tables.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{CcsError, Result};

/// Unit attached to every CCS value.
pub const CCS_UNIT: &str = "Å²";

/// Fixed-width numeric model input for one molecule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// One raw row of a CCS data file.
///
/// Field names are the lower-cased column headers. Unparseable numbers are
/// read as missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CcsRecord {
    #[serde(default)]
    pub adduct: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub mz: Option<f64>,
    #[serde(default)]
    pub smiles: Option<String>,
    #[serde(default)]
    pub inchi: Option<String>,
    #[serde(default, rename = "ccsvalue", alias = "ccs", deserialize_with = "csv::invalid_option")]
    pub ccs: Option<f64>,
}

/// Where a labeled example came from. Never used as a feature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub smiles: String,
    pub adduct: Option<String>,
    pub mz: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledExample {
    pub features: FeatureVector,
    /// Measured CCS in Å².
    pub target: f64,
    pub provenance: Provenance,
}

/// Ordered labeled examples that all share one feature width.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingTable {
    examples: Vec<LabeledExample>,
}

impl TrainingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_examples(examples: Vec<LabeledExample>) -> Result<Self> {
        let mut table = Self::new();
        for example in examples {
            table.push(example)?;
        }
        Ok(table)
    }

    /// Append an example, rejecting one whose width differs from the table's.
    pub fn push(&mut self, example: LabeledExample) -> Result<()> {
        if let Some(width) = self.width() {
            if example.features.len() != width {
                return Err(CcsError::Data(format!(
                    "example for {} has {} features, table has {}",
                    example.provenance.smiles,
                    example.features.len(),
                    width
                )));
            }
        }
        self.examples.push(example);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Feature width, `None` for an empty table.
    pub fn width(&self) -> Option<usize> {
        self.examples.first().map(|e| e.features.len())
    }

    pub fn examples(&self) -> &[LabeledExample] {
        &self.examples
    }

    pub fn features(&self) -> Vec<&[f64]> {
        self.examples.iter().map(|e| e.features.as_slice()).collect()
    }

    pub fn targets(&self) -> Vec<f64> {
        self.examples.iter().map(|e| e.target).collect()
    }

    /// Shuffle with `seed` and split off `test_fraction` of the rows as the
    /// evaluation subset. Returns `(train, evaluation)`.
    pub fn split(&self, test_fraction: f64, seed: u64) -> Result<(TrainingTable, TrainingTable)> {
        if !(0.0..1.0).contains(&test_fraction) {
            return Err(CcsError::Config(format!(
                "test fraction must be in [0, 1), got {test_fraction}"
            )));
        }

        let mut indices: Vec<usize> = (0..self.examples.len()).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let n_test = (self.examples.len() as f64 * test_fraction).round() as usize;
        let (test_idx, train_idx) = indices.split_at(n_test);

        let pick = |idx: &[usize]| TrainingTable {
            examples: idx.iter().map(|&i| self.examples[i].clone()).collect(),
        };
        Ok((pick(train_idx), pick(test_idx)))
    }
}

/// A single model's CCS estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CcsPrediction {
    pub model: String,
    pub value: f64,
    pub unit: String,
}

impl CcsPrediction {
    pub fn new(model: impl Into<String>, value: f64) -> Self {
        Self {
            model: model.into(),
            value,
            unit: CCS_UNIT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example(width: usize, target: f64) -> LabeledExample {
        LabeledExample {
            features: FeatureVector::new(vec![target; width]),
            target,
            provenance: Provenance::default(),
        }
    }

    #[test]
    fn test_push_rejects_width_drift() {
        let mut table = TrainingTable::new();
        table.push(example(3, 1.0)).unwrap();
        assert!(table.push(example(2, 2.0)).is_err());
        assert_eq!(table.len(), 1);
        assert_eq!(table.width(), Some(3));
    }

    #[test]
    fn test_split_is_seeded_and_complete() {
        let table = TrainingTable::from_examples((0..100).map(|i| example(2, i as f64)).collect()).unwrap();
        let (train, test) = table.split(0.2, 0).unwrap();
        assert_eq!(train.len(), 80);
        assert_eq!(test.len(), 20);

        let (train_again, _) = table.split(0.2, 0).unwrap();
        assert_eq!(train.targets(), train_again.targets());

        let mut all: Vec<f64> = train.targets().into_iter().chain(test.targets()).collect();
        all.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(all, (0..100).map(|i| i as f64).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_rejects_bad_fraction() {
        let table = TrainingTable::new();
        assert!(table.split(1.0, 0).is_err());
        assert!(table.split(-0.1, 0).is_err());
    }

    #[test]
    fn test_prediction_unit() {
        assert_eq!(CcsPrediction::new("random_forest", 151.2).unit, "Å²");
    }
}
