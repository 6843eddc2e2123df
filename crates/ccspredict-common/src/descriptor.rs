//! Descriptor values produced by providers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One named provider output: a scalar descriptor or a fingerprint vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DescriptorValue {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl DescriptorValue {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            DescriptorValue::Scalar(v) => Some(*v),
            DescriptorValue::Vector(_) => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[f64]> {
        match self {
            DescriptorValue::Scalar(_) => None,
            DescriptorValue::Vector(v) => Some(v),
        }
    }

    /// Number of feature positions this value occupies.
    pub fn width(&self) -> usize {
        match self {
            DescriptorValue::Scalar(_) => 1,
            DescriptorValue::Vector(v) => v.len(),
        }
    }
}

impl From<f64> for DescriptorValue {
    fn from(v: f64) -> Self {
        DescriptorValue::Scalar(v)
    }
}

impl From<Vec<f64>> for DescriptorValue {
    fn from(v: Vec<f64>) -> Self {
        DescriptorValue::Vector(v)
    }
}

/// Name → value map emitted by a single provider for a single molecule.
/// Names are case-sensitive.
pub type DescriptorSet = BTreeMap<String, DescriptorValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_json_shapes() {
        let set: DescriptorSet =
            serde_json::from_str(r#"{"TPSA": 20.23, "MACCSFingerprint": [0.0, 1.0, 1.0]}"#).unwrap();
        assert_eq!(set["TPSA"], DescriptorValue::Scalar(20.23));
        assert_eq!(set["MACCSFingerprint"].width(), 3);
        assert!(set["MACCSFingerprint"].as_scalar().is_none());
    }
}
