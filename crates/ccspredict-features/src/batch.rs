//! Batch preparation of labeled training data.

use futures_util::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use ccspredict_chem::{resolve_structure, StructureNormalizer};
use ccspredict_common::{CcsError, CcsRecord, LabeledExample, Provenance, Result, Structure, TrainingTable};

use crate::pipeline::FeaturePipeline;

fn default_exact() -> Vec<String> {
    vec!["[M+H]+".to_string()]
}

fn default_contains() -> Vec<String> {
    vec!["H2O".to_string()]
}

/// Which adduct labels are admitted into training.
///
/// A label passes if it equals one of `exact` or contains one of
/// `contains`. Rows without a label only pass when `accept_all` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdductFilter {
    #[serde(default = "default_exact")]
    pub exact: Vec<String>,
    #[serde(default = "default_contains")]
    pub contains: Vec<String>,
    #[serde(default)]
    pub accept_all: bool,
}

impl Default for AdductFilter {
    fn default() -> Self {
        Self {
            exact: default_exact(),
            contains: default_contains(),
            accept_all: false,
        }
    }
}

impl AdductFilter {
    pub fn accept_all() -> Self {
        Self {
            exact: Vec::new(),
            contains: Vec::new(),
            accept_all: true,
        }
    }

    pub fn accepts(&self, adduct: Option<&str>) -> bool {
        if self.accept_all {
            return true;
        }
        let Some(adduct) = adduct.map(str::trim) else {
            return false;
        };
        self.exact.iter().any(|e| e == adduct) || self.contains.iter().any(|c| adduct.contains(c.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    /// Zero-based position in the input records.
    pub row: usize,
    pub reason: String,
}

/// Outcome counts of one batch preparation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparationReport {
    pub total: usize,
    pub filtered_by_adduct: usize,
    pub accepted: usize,
    pub skipped: Vec<SkippedRow>,
}

enum RowOutcome {
    Accepted(LabeledExample),
    Skipped(SkippedRow),
}

/// Turn raw records into a training table.
///
/// Rows are filtered by adduct, their structure is resolved to canonical
/// SMILES (InChI is used when SMILES is missing) and their feature vector is
/// computed, up to `concurrency` molecules at a time. Output order follows
/// input order. Per-molecule failures are recorded in the report and the row
/// is dropped; any other error aborts the whole preparation.
#[instrument(skip_all, fields(records = records.len()))]
pub async fn prepare_training_table(
    pipeline: &FeaturePipeline,
    normalizer: &dyn StructureNormalizer,
    records: Vec<CcsRecord>,
    filter: &AdductFilter,
) -> Result<(TrainingTable, PreparationReport)> {
    let mut report = PreparationReport {
        total: records.len(),
        ..Default::default()
    };

    let mut candidates = Vec::with_capacity(records.len());
    for (row, record) in records.into_iter().enumerate() {
        if !filter.accepts(record.adduct.as_deref()) {
            report.filtered_by_adduct += 1;
            continue;
        }
        candidates.push((row, record));
    }

    let concurrency = pipeline.config().concurrency.max(1);
    let outcomes: Vec<RowOutcome> = stream::iter(candidates)
        .map(|(row, record)| prepare_row(pipeline, normalizer, row, record))
        .buffered(concurrency)
        .try_collect()
        .await?;

    let mut table = TrainingTable::new();
    for outcome in outcomes {
        match outcome {
            RowOutcome::Accepted(example) => {
                table.push(example)?;
                report.accepted += 1;
            }
            RowOutcome::Skipped(skip) => report.skipped.push(skip),
        }
    }

    info!(
        total = report.total,
        filtered = report.filtered_by_adduct,
        accepted = report.accepted,
        skipped = report.skipped.len(),
        "Training table prepared"
    );
    Ok((table, report))
}

async fn prepare_row(
    pipeline: &FeaturePipeline,
    normalizer: &dyn StructureNormalizer,
    row: usize,
    record: CcsRecord,
) -> Result<RowOutcome> {
    let skip = |reason: String| {
        warn!(row, %reason, "Skipping molecule");
        Ok(RowOutcome::Skipped(SkippedRow { row, reason }))
    };

    let target = match record.ccs {
        None => return skip("missing CCS value".to_string()),
        Some(v) if !v.is_finite() => return skip(format!("non-finite CCS value {v}")),
        Some(v) => v,
    };

    let structure = Structure::new(record.smiles, record.inchi);
    let computed = async {
        let smiles = resolve_structure(normalizer, &structure).await?;
        let features = pipeline.compute_feature_vector(&smiles).await?;
        Ok::<_, CcsError>((smiles, features))
    }
    .await;

    match computed {
        Ok((smiles, features)) => Ok(RowOutcome::Accepted(LabeledExample {
            features,
            target,
            provenance: Provenance {
                smiles: smiles.to_string(),
                adduct: record.adduct,
                mz: record.mz,
            },
        })),
        Err(e) if e.is_per_molecule() => skip(e.to_string()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_matches_protonated_and_water_adducts() {
        let filter = AdductFilter::default();
        assert!(filter.accepts(Some("[M+H]+")));
        assert!(filter.accepts(Some("[M+H-H2O]+")));
        assert!(!filter.accepts(Some("[M+Na]+")));
        assert!(!filter.accepts(Some("[M+H]")));
        assert!(!filter.accepts(None));
    }

    #[test]
    fn test_accept_all_filter() {
        let filter = AdductFilter::accept_all();
        assert!(filter.accepts(Some("[M+Na]+")));
        assert!(filter.accepts(None));
    }
}
