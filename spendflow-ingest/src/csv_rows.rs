//! Read uploaded statement CSVs into raw rows.
//!
//! Column layouts vary by bank, so rows stay as ordered header/value
//! pairs; the categorizer works from the serialized row, not the schema.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

use crate::types::RawRow;

/// Read a statement CSV from any reader. Blank rows are skipped; short
/// rows are padded against the header (bank exports are sloppy).
pub fn read_csv_rows_from_reader<R: Read>(reader: R) -> Result<Vec<RawRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .context("reading CSV header")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let fields = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), record.get(i).unwrap_or("").trim().to_string()))
            .collect();
        rows.push(RawRow::Csv { fields });
    }

    Ok(rows)
}

pub fn read_csv_rows(path: impl AsRef<Path>) -> Result<Vec<RawRow>> {
    let file = std::fs::File::open(path.as_ref())
        .with_context(|| format!("opening {}", path.as_ref().display()))?;
    read_csv_rows_from_reader(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Date,Description,Amount,Bank
01/05/2026,STARBUCKS #1234,5.50,Chase
01/06/2026,SHELL OIL 5744,40.00,Chase
,,,
01/07/2026,NETFLIX.COM,15.49,Chase
";

    #[test]
    fn test_read_rows_skips_blanks() {
        let rows = read_csv_rows_from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].field("Description"), Some("STARBUCKS #1234"));
        assert_eq!(rows[2].field("amount"), Some("15.49"));
    }

    #[test]
    fn test_short_rows_padded() {
        let data = "Date,Description,Amount\n01/05/2026,COFFEE\n";
        let rows = read_csv_rows_from_reader(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].field("Amount"), Some(""));
    }

    #[test]
    fn test_raw_text_round_trip() {
        let rows = read_csv_rows_from_reader(SAMPLE.as_bytes()).unwrap();
        let text = rows[0].raw_text();
        assert!(text.contains("\"Date\": \"01/05/2026\""));
        assert!(text.contains("\"Bank\": \"Chase\""));
    }
}
