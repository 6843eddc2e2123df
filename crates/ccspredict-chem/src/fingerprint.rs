//! Fingerprint schema constants.
//!
//! Widths are part of the model input contract. Training and inference must
//! agree on them, so they are declared here once and pre-declared to the
//! feature pipeline.

use serde::{Deserialize, Serialize};

/// Morgan (ECFP-like) radius.
pub const MORGAN_RADIUS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FingerprintKind {
    Morgan,
    Maccs,
    AtomPair,
    TopologicalTorsion,
}

impl FingerprintKind {
    pub const ALL: [FingerprintKind; 4] = [
        FingerprintKind::Morgan,
        FingerprintKind::Maccs,
        FingerprintKind::AtomPair,
        FingerprintKind::TopologicalTorsion,
    ];

    /// Feature name as emitted by the providers.
    pub fn name(&self) -> &'static str {
        match self {
            FingerprintKind::Morgan => "MorganFingerprint",
            FingerprintKind::Maccs => "MACCSFingerprint",
            FingerprintKind::AtomPair => "AtomPairFingerprint",
            FingerprintKind::TopologicalTorsion => "TopologicalTorsionFingerprint",
        }
    }

    /// Number of bits in the vector.
    pub fn width(&self) -> usize {
        match self {
            FingerprintKind::Morgan => 2048,
            FingerprintKind::Maccs => 167,
            FingerprintKind::AtomPair => 2048,
            FingerprintKind::TopologicalTorsion => 2048,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

/// Declared width for a fingerprint feature name, if it is a known kind.
pub fn declared_width(name: &str) -> Option<usize> {
    FingerprintKind::from_name(name).map(|k| k.width())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for kind in FingerprintKind::ALL {
            assert_eq!(FingerprintKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(declared_width("MACCSFingerprint"), Some(167));
        assert_eq!(declared_width("Kappa1"), None);
    }
}
