//! Delimited CCS table loading.

use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, info, warn};

use ccspredict_common::{CcsError, CcsRecord, Result};

pub const DEFAULT_DELIMITER: u8 = b';';

/// Load every row of one data file.
///
/// Header names are matched case-insensitively. Rows may be shorter than
/// the header; missing or unparseable numbers are read as absent. Rows that
/// cannot be read at all are logged and dropped.
pub async fn load_records(path: &Path, delimiter: u8) -> Result<Vec<CcsRecord>> {
    debug!("Loading CCS records from {:?}", path);

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CcsError::Data(format!("cannot read {}: {e}", path.display())))?;
    let records = parse_records(&content, delimiter)?;

    info!("Loaded {} records from {:?}", records.len(), path);
    Ok(records)
}

/// Load and concatenate several files in the given order.
pub async fn load_sources<P: AsRef<Path>>(paths: &[P], delimiter: u8) -> Result<Vec<CcsRecord>> {
    let mut all = Vec::new();
    for path in paths {
        all.extend(load_records(path.as_ref(), delimiter).await?);
    }
    Ok(all)
}

fn parse_records(content: &str, delimiter: u8) -> Result<Vec<CcsRecord>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(content.as_bytes());

    let headers: StringRecord = reader.headers()?.iter().map(|h| h.to_lowercase()).collect();
    if !headers.iter().any(|h| h == "ccsvalue" || h == "ccs") {
        return Err(CcsError::Data(format!(
            "no CcsValue column in header {:?}",
            headers.iter().collect::<Vec<_>>()
        )));
    }

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row?;
        match row.deserialize::<CcsRecord>(Some(&headers)) {
            Ok(record) => records.push(record),
            Err(e) => warn!(row = line + 1, error = %e, "Unreadable row dropped"),
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
Adduct;MZ;Smiles;InChI;CcsValue
[M+H]+;47.0491;CCO;;133.2
[M+Na]+;69.0310;CCO;InChI=1S/C2H6O/c1-2-3/h3H,2H2,1H3;141.9
[M+H]+;n/a;;InChI=1S/CH4/h1H4;
[M+H]+;17.0
";

    #[test]
    fn test_parse_sample() {
        let records = parse_records(SAMPLE, b';').unwrap();
        assert_eq!(records.len(), 4);

        assert_eq!(records[0].adduct.as_deref(), Some("[M+H]+"));
        assert_eq!(records[0].mz, Some(47.0491));
        assert_eq!(records[0].smiles.as_deref(), Some("CCO"));
        assert_eq!(records[0].ccs, Some(133.2));

        assert_eq!(records[1].inchi.as_deref(), Some("InChI=1S/C2H6O/c1-2-3/h3H,2H2,1H3"));

        assert_eq!(records[2].mz, None);
        assert_eq!(records[2].ccs, None);

        // Short row.
        assert_eq!(records[3].mz, Some(17.0));
        assert_eq!(records[3].smiles, None);
        assert_eq!(records[3].ccs, None);
    }

    #[test]
    fn test_header_case_is_ignored() {
        let records = parse_records("ADDUCT,mz,SMILES,inchi,ccsvalue\n[M+H]+,1,C,,2.5\n", b',').unwrap();
        assert_eq!(records[0].smiles.as_deref(), Some("C"));
        assert_eq!(records[0].ccs, Some(2.5));
    }

    #[test]
    fn test_missing_target_column_is_rejected() {
        assert!(matches!(parse_records("Adduct;Smiles\n[M+H]+;C\n", b';'), Err(CcsError::Data(_))));
    }

    #[tokio::test]
    async fn test_sources_are_concatenated_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let train = dir.path().join("training.csv");
        let test = dir.path().join("test.csv");
        std::fs::File::create(&train).unwrap().write_all(SAMPLE.as_bytes()).unwrap();
        std::fs::write(&test, "Adduct;MZ;Smiles;InChI;CcsValue\n[M+H]+;1;CCN;;150.0\n").unwrap();

        let records = load_sources(&[&train, &test], DEFAULT_DELIMITER).await.unwrap();
        assert_eq!(records.len(), 5);
        assert_eq!(records[4].smiles.as_deref(), Some("CCN"));
    }

    #[tokio::test]
    async fn test_missing_file_is_data_error() {
        let err = load_records(Path::new("/nonexistent/ccs.csv"), DEFAULT_DELIMITER)
            .await
            .unwrap_err();
        assert!(matches!(err, CcsError::Data(_)));
    }
}
