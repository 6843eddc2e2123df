//! RDKit-backed normalizer and descriptor providers.
//!
//! RDKit runs in a short-lived Python process per call: the request goes in
//! on stdin as JSON and the answer comes back on stdout. No process or
//! molecule handle outlives a call, so concurrent callers never share engine
//! state.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use ccspredict_common::{CanonicalSmiles, CcsError, DescriptorSet, Result};

use crate::normalizer::{StructureNormalizer, Validation};
use crate::provider::{DescriptorProvider, ProviderRegistry};

const BRIDGE_SCRIPT: &str = include_str!("../scripts/rdkit_bridge.py");

// ── Bridge protocol ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct BridgeRequest<'a> {
    op: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    group: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    body: serde_json::Value,
}

/// What RDKit said about a request it could run.
#[derive(Debug)]
enum BridgeReply<T> {
    Accepted(T),
    Rejected(String),
}

#[derive(Debug, Deserialize)]
struct ValidateBody {
    smiles: bool,
    inchi: bool,
}

#[derive(Debug, Deserialize)]
struct NormalizeBody {
    smiles: String,
}

#[derive(Debug, Deserialize)]
struct DescriptorsBody {
    descriptors: DescriptorSet,
}

fn decode_reply<T: DeserializeOwned>(stdout: &[u8]) -> Result<BridgeReply<T>> {
    let envelope: Envelope = serde_json::from_slice(stdout)
        .map_err(|e| CcsError::Toolkit(format!("unreadable RDKit bridge response: {e}")))?;

    if !envelope.ok {
        let reason = envelope.error.unwrap_or_else(|| "unspecified RDKit error".to_string());
        return Ok(BridgeReply::Rejected(reason));
    }

    let body = serde_json::from_value(envelope.body)
        .map_err(|e| CcsError::Toolkit(format!("unexpected RDKit bridge payload: {e}")))?;
    Ok(BridgeReply::Accepted(body))
}

fn is_missing_toolkit(stderr: &str) -> bool {
    stderr.contains("ModuleNotFoundError") || stderr.contains("ImportError")
}

// ── Toolkit ─────────────────────────────────────────────────────────────────

/// Wrapper for RDKit execution through a Python interpreter.
#[derive(Debug, Clone)]
pub struct RdkitToolkit {
    python: PathBuf,
}

impl RdkitToolkit {
    /// Create a toolkit that runs the bridge with `python`.
    pub fn new<P: AsRef<Path>>(python: P) -> Self {
        Self {
            python: python.as_ref().to_path_buf(),
        }
    }

    pub fn python(&self) -> &Path {
        &self.python
    }

    /// Confirm that the interpreter starts and RDKit imports.
    pub async fn check(&self) -> Result<()> {
        let reply = self
            .call::<ValidateBody>(&BridgeRequest {
                op: "validate",
                text: "C",
                group: None,
            })
            .await?;
        match reply {
            BridgeReply::Accepted(body) if body.smiles => {}
            BridgeReply::Accepted(_) => {
                return Err(CcsError::Toolkit("RDKit bridge could not parse methane".to_string()))
            }
            BridgeReply::Rejected(reason) => {
                return Err(CcsError::Toolkit(format!("RDKit bridge unusable: {reason}")))
            }
        }
        info!("RDKit bridge available via {:?}", self.python);
        Ok(())
    }

    async fn call<T: DeserializeOwned>(&self, request: &BridgeRequest<'_>) -> Result<BridgeReply<T>> {
        let mut child = Command::new(&self.python)
            .arg("-c")
            .arg(BRIDGE_SCRIPT)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CcsError::Toolkit(format!("failed to start {:?}: {e}", self.python)))?;

        let payload = serde_json::to_vec(request)?;
        if let Some(mut stdin) = child.stdin.take() {
            // A bridge that dies early is diagnosed from its exit status below.
            if let Err(e) = stdin.write_all(&payload).await {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
            }
        }

        let output = child.wait_with_output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_missing_toolkit(&stderr) {
                return Err(CcsError::Toolkit(format!("RDKit is not importable: {}", stderr.trim())));
            }
            return Ok(BridgeReply::Rejected(format!(
                "RDKit bridge exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        decode_reply(&output.stdout)
    }
}

#[async_trait]
impl StructureNormalizer for RdkitToolkit {
    async fn validate(&self, text: &str) -> Result<Validation> {
        let request = BridgeRequest { op: "validate", text, group: None };
        match self.call::<ValidateBody>(&request).await? {
            BridgeReply::Accepted(body) => Ok(Validation {
                smiles: body.smiles,
                inchi: body.inchi,
            }),
            BridgeReply::Rejected(reason) => {
                debug!("Validation rejected {}: {}", text, reason);
                Ok(Validation::default())
            }
        }
    }

    async fn normalize(&self, text: &str) -> Result<CanonicalSmiles> {
        let request = BridgeRequest { op: "normalize", text, group: None };
        match self.call::<NormalizeBody>(&request).await? {
            BridgeReply::Accepted(body) => CanonicalSmiles::new(body.smiles),
            BridgeReply::Rejected(reason) => Err(CcsError::InvalidStructure(reason)),
        }
    }
}

// ── Providers ───────────────────────────────────────────────────────────────

/// RDKit descriptor families, each served by its own provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorGroup {
    Topological,
    Geometric,
    Physicochemical,
    Electronic,
    Fingerprint,
}

impl DescriptorGroup {
    /// Registration order of the default registry.
    pub const ALL: [DescriptorGroup; 5] = [
        DescriptorGroup::Topological,
        DescriptorGroup::Geometric,
        DescriptorGroup::Physicochemical,
        DescriptorGroup::Electronic,
        DescriptorGroup::Fingerprint,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DescriptorGroup::Topological => "topological",
            DescriptorGroup::Geometric => "geometric",
            DescriptorGroup::Physicochemical => "physicochemical",
            DescriptorGroup::Electronic => "electronic",
            DescriptorGroup::Fingerprint => "fingerprint",
        }
    }

    fn provider_name(&self) -> &'static str {
        match self {
            DescriptorGroup::Topological => "rdkit.topological",
            DescriptorGroup::Geometric => "rdkit.geometric",
            DescriptorGroup::Physicochemical => "rdkit.physicochemical",
            DescriptorGroup::Electronic => "rdkit.electronic",
            DescriptorGroup::Fingerprint => "rdkit.fingerprint",
        }
    }

    pub fn names(&self) -> &'static [&'static str] {
        match self {
            DescriptorGroup::Topological => &[
                "HallKierAlpha", "Kappa1", "Kappa2", "Kappa3",
                "Chi0v", "Chi1v", "Chi2v", "Chi3v", "Chi4v",
            ],
            DescriptorGroup::Geometric => &["TPSA", "LabuteASA"],
            DescriptorGroup::Physicochemical => &[
                "MolWt", "ExactMolWt", "MolLogP", "NumHDonors", "NumHAcceptors",
                "NumRotatableBonds", "NumHeavyAtoms", "FractionCSP3",
            ],
            DescriptorGroup::Electronic => &[
                "MaxPartialCharge", "MinPartialCharge", "MeanPartialCharge", "NumRadicalElectrons",
            ],
            DescriptorGroup::Fingerprint => &[
                "MorganFingerprint", "MACCSFingerprint",
                "AtomPairFingerprint", "TopologicalTorsionFingerprint",
            ],
        }
    }
}

/// One RDKit descriptor family exposed as a [`DescriptorProvider`].
#[derive(Debug, Clone)]
pub struct RdkitProvider {
    toolkit: RdkitToolkit,
    group: DescriptorGroup,
}

impl RdkitProvider {
    pub fn new(toolkit: RdkitToolkit, group: DescriptorGroup) -> Self {
        Self { toolkit, group }
    }

    pub fn group(&self) -> DescriptorGroup {
        self.group
    }
}

#[async_trait]
impl DescriptorProvider for RdkitProvider {
    fn name(&self) -> &str {
        self.group.provider_name()
    }

    fn supported_names(&self) -> BTreeSet<String> {
        self.group.names().iter().map(|s| s.to_string()).collect()
    }

    async fn compute(&self, smiles: &CanonicalSmiles) -> Result<DescriptorSet> {
        let request = BridgeRequest {
            op: "descriptors",
            text: smiles.as_str(),
            group: Some(self.group.as_str()),
        };
        match self.toolkit.call::<DescriptorsBody>(&request).await? {
            BridgeReply::Accepted(body) => Ok(body.descriptors),
            BridgeReply::Rejected(reason) => {
                warn!(provider = self.name(), smiles = %smiles, "Descriptor computation failed: {}", reason);
                Err(CcsError::Provider {
                    provider: self.name().to_string(),
                    reason,
                })
            }
        }
    }
}

/// Registry with every RDKit group, in [`DescriptorGroup::ALL`] order.
pub fn rdkit_registry(toolkit: &RdkitToolkit) -> ProviderRegistry {
    DescriptorGroup::ALL
        .into_iter()
        .fold(ProviderRegistry::new(), |registry, group| {
            registry.with(Arc::new(RdkitProvider::new(toolkit.clone(), group)))
        })
}
