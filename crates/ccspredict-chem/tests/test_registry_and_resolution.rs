//! Provider registry ordering and structure resolution against in-memory doubles.

use std::sync::Arc;

use ccspredict_chem::{resolve_structure, ProviderRegistry, StructureNormalizer};
use ccspredict_common::{CcsError, Structure};
use ccspredict_test_utils::{MockNormalizer, StaticProvider};

fn normalizer() -> MockNormalizer {
    MockNormalizer::new()
        .with("OCC", "CCO")
        .with("InChI=1S/C2H6O/c1-2-3/h3H,2H2,1H3", "CCO")
}

#[test]
fn test_suppliers_in_registration_order() {
    let registry = ProviderRegistry::new()
        .with(Arc::new(StaticProvider::new("rdkit").supports(["TPSA", "LogP"])))
        .with(Arc::new(StaticProvider::new("override").supports(["TPSA"])));

    assert_eq!(registry.suppliers_of("TPSA"), vec!["rdkit", "override"]);
    assert_eq!(registry.suppliers_of("LogP"), vec!["rdkit"]);
    assert!(registry.suppliers_of("Kappa1").is_empty());
    assert_eq!(registry.supported_names().len(), 2);
}

#[tokio::test]
async fn test_resolve_prefers_smiles() {
    let structure = Structure::new(Some("OCC".into()), Some("InChI=garbage".into()));
    let smiles = resolve_structure(&normalizer(), &structure).await.unwrap();
    assert_eq!(smiles.as_str(), "CCO");
}

#[tokio::test]
async fn test_resolve_falls_back_to_inchi() {
    let structure = Structure::from_inchi("InChI=1S/C2H6O/c1-2-3/h3H,2H2,1H3");
    let smiles = resolve_structure(&normalizer(), &structure).await.unwrap();
    assert_eq!(smiles.as_str(), "CCO");
}

#[tokio::test]
async fn test_resolve_rejects_unparseable() {
    let structure = Structure::from_smiles("C1CC(");
    let err = resolve_structure(&normalizer(), &structure).await.unwrap_err();
    assert!(matches!(err, CcsError::InvalidStructure(_)));
}

#[tokio::test]
async fn test_inchi_normalization_is_idempotent() {
    let n = normalizer();
    let once = n.normalize("InChI=1S/C2H6O/c1-2-3/h3H,2H2,1H3").await.unwrap();
    let twice = n.normalize(once.as_str()).await.unwrap();
    assert_eq!(once, twice);
}
