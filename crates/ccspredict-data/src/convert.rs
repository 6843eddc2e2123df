//! CCSbase export conversion.

use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use serde::Serialize;
use tracing::{info, warn};

use ccspredict_common::{CcsError, Result};

use crate::loader::DEFAULT_DELIMITER;

// Zero-based CCSbase column positions.
const INCHI_COLUMN: usize = 3;
const MZ_COLUMN: usize = 6;
const ADDUCT_COLUMN: usize = 7;
const CCS_COLUMN: usize = 11;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConversionReport {
    pub written: usize,
    pub skipped: usize,
}

#[derive(Serialize)]
struct OutputRow<'a> {
    #[serde(rename = "Adduct")]
    adduct: &'a str,
    #[serde(rename = "MZ")]
    mz: &'a str,
    #[serde(rename = "Smiles")]
    smiles: &'a str,
    #[serde(rename = "InChI")]
    inchi: &'a str,
    #[serde(rename = "CcsValue")]
    ccs: &'a str,
}

/// Rewrite a comma-separated CCSbase export at `input` into the
/// `;`-delimited working format at `output`.
///
/// SMILES is left empty; structures are resolved from the InChI later.
/// Rows too short to hold every needed column are skipped.
pub async fn convert_ccsbase(input: &Path, output: &Path) -> Result<ConversionReport> {
    let content = tokio::fs::read_to_string(input)
        .await
        .map_err(|e| CcsError::Data(format!("cannot read {}: {e}", input.display())))?;

    let (bytes, report) = convert_content(&content)?;
    tokio::fs::write(output, bytes).await?;

    info!(
        written = report.written,
        skipped = report.skipped,
        "Converted {:?} to {:?}",
        input,
        output
    );
    Ok(report)
}

fn convert_content(content: &str) -> Result<(Vec<u8>, ConversionReport)> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b',')
        .flexible(true)
        .from_reader(content.as_bytes());
    let mut writer = WriterBuilder::new()
        .delimiter(DEFAULT_DELIMITER)
        .from_writer(Vec::new());

    let mut report = ConversionReport::default();
    for (line, row) in reader.records().enumerate() {
        let row = row?;
        if row.len() <= CCS_COLUMN {
            warn!(row = line + 1, columns = row.len(), "CCSbase row too short, skipped");
            report.skipped += 1;
            continue;
        }
        let field = |i: usize| row.get(i).unwrap_or("").trim();
        writer.serialize(OutputRow {
            adduct: field(ADDUCT_COLUMN),
            mz: field(MZ_COLUMN),
            smiles: "",
            inchi: field(INCHI_COLUMN),
            ccs: field(CCS_COLUMN),
        })?;
        report.written += 1;
    }

    // An empty export still gets a header row.
    if report.written == 0 {
        writer.write_record(["Adduct", "MZ", "Smiles", "InChI", "CcsValue"])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| CcsError::Data(format!("cannot flush converted rows: {}", e.error())))?;
    Ok((bytes, report))
}
