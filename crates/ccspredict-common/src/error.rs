use thiserror::Error;

#[derive(Debug, Error)]
pub enum CcsError {
    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    #[error("Missing feature: {0}")]
    MissingFeature(String),

    #[error("Fingerprint length mismatch for {name}: expected {expected}, got {actual}")]
    FingerprintLengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Feature schema already configured with different names")]
    SchemaChanged,

    #[error("Feature pipeline is not configured")]
    NotConfigured,

    #[error("No provider supplies feature: {0}")]
    UnknownFeature(String),

    #[error("Descriptor {name} is supplied by both {first} and {second}")]
    DescriptorCollision {
        name: String,
        first: String,
        second: String,
    },

    #[error("Feature {name} has the wrong shape: expected {expected}")]
    ShapeMismatch { name: String, expected: &'static str },

    #[error("Provider {provider} failed: {reason}")]
    Provider { provider: String, reason: String },

    #[error("Descriptor computation timed out after {0}s")]
    Timeout(u64),

    #[error("Chemistry toolkit error: {0}")]
    Toolkit(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl CcsError {
    /// Whether the error only concerns one molecule.
    ///
    /// Batch preparation skips the molecule and continues on these; every
    /// other variant points at a configuration defect and aborts the run.
    pub fn is_per_molecule(&self) -> bool {
        matches!(
            self,
            CcsError::InvalidStructure(_)
                | CcsError::MissingFeature(_)
                | CcsError::Provider { .. }
                | CcsError::Timeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CcsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_molecule_classification() {
        assert!(CcsError::MissingFeature("TPSA".into()).is_per_molecule());
        assert!(CcsError::InvalidStructure("C1CC".into()).is_per_molecule());
        assert!(CcsError::Timeout(30).is_per_molecule());
        assert!(!CcsError::SchemaChanged.is_per_molecule());
        // A fingerprint configured as a scalar fails every molecule alike.
        assert!(!CcsError::ShapeMismatch {
            name: "MACCSFingerprint".into(),
            expected: "scalar",
        }
        .is_per_molecule());
        assert!(!CcsError::FingerprintLengthMismatch {
            name: "MorganFingerprint".into(),
            expected: 2048,
            actual: 1024,
        }
        .is_per_molecule());
    }

    #[test]
    fn test_length_mismatch_message_names_fingerprint() {
        let err = CcsError::FingerprintLengthMismatch {
            name: "MACCSFingerprint".into(),
            expected: 167,
            actual: 166,
        };
        let msg = err.to_string();
        assert!(msg.contains("MACCSFingerprint"));
        assert!(msg.contains("167"));
    }
}
