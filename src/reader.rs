/*!
 * Raw claim batch readers
 *
 * Loads raw claim batches from JSON (an array of objects keyed by raw field
 * name) or CSV (a header row of raw field names, one claim per row). Nothing
 * here validates claims; records come back exactly as submitted apart from
 * CSV cells being typed.
 */

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use csv::ReaderBuilder;
use tracing::debug;

use crate::data_types::{RawClaimRecord, RawValue};
use crate::schema::ClaimSchema;
use crate::{ClaimsError, ErrorContext, Result};

/// Reader for raw claim batch files
pub struct ClaimReader {
    /// Whether to check CSV headers against the required claim fields
    validate_headers: bool,
}

impl Default for ClaimReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimReader {
    /// Create a new reader with header validation enabled
    pub fn new() -> Self {
        Self {
            validate_headers: true,
        }
    }

    /// Enable or disable header validation
    pub fn with_header_validation(mut self, validate: bool) -> Self {
        self.validate_headers = validate;
        self
    }

    /// Load a batch, choosing the format by file extension (`.csv` or JSON)
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Vec<RawClaimRecord>> {
        let path = path.as_ref();
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);

        if is_csv {
            self.load_csv(path)
        } else {
            self.load_json(path)
        }
    }

    /// Load a batch from a JSON array file
    pub fn load_json<P: AsRef<Path>>(&self, path: P) -> Result<Vec<RawClaimRecord>> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ClaimsError::file_not_found_with_suggestion(path.to_path_buf()));
        }

        let file = File::open(path)?;
        let records: Vec<RawClaimRecord> =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| ClaimsError::Json {
                message: format!("Claim batch is not a JSON array of objects: {}", e),
                source: e,
                context: ErrorContext::for_file(path),
            })?;

        debug!(path = %path.display(), records = records.len(), "loaded JSON claim batch");
        Ok(records)
    }

    /// Parse a batch from JSON text
    pub fn parse_json(&self, json: &str) -> Result<Vec<RawClaimRecord>> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a batch from a CSV file
    ///
    /// Empty cells are left out of the record. Cells made only of ASCII digits
    /// become integers so numeric identifiers validate the same way as in JSON.
    pub fn load_csv<P: AsRef<Path>>(&self, path: P) -> Result<Vec<RawClaimRecord>> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ClaimsError::file_not_found_with_suggestion(path.to_path_buf()));
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if self.validate_headers {
            ClaimSchema::validate_headers(&headers)?;
        }

        let mut records = Vec::new();
        for (row_index, result) in reader.records().enumerate() {
            let row = result.map_err(|e| csv_error(e, path, row_index))?;

            let record: RawClaimRecord = headers
                .iter()
                .zip(row.iter())
                .filter(|(_, cell)| !cell.is_empty())
                .map(|(header, cell)| (header.clone(), csv_cell(cell)))
                .collect();
            records.push(record);
        }

        debug!(path = %path.display(), records = records.len(), "loaded CSV claim batch");
        Ok(records)
    }
}

fn csv_cell(cell: &str) -> RawValue {
    if cell.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(number) = cell.parse::<i128>() {
            return RawValue::Integer(number);
        }
    }
    RawValue::String(cell.to_string())
}

fn csv_error(err: csv::Error, path: &Path, row_index: usize) -> ClaimsError {
    let line = err.position().map(|pos| pos.line() as usize);
    ClaimsError::CsvParse {
        message: err.to_string(),
        line,
        column: None,
        context: ErrorContext {
            file_path: Some(path.to_path_buf()),
            line_number: line,
            column_name: None,
            record_index: Some(row_index),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Service Date,Submitted Procedure,Quadrant,Plan Group #,Subscriber#,Provider NPI,Provider Fees,Allowed Fees,Member Coinsurance,Member Copay";

    #[test]
    fn test_load_csv_types_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("claims.csv");
        std::fs::write(
            &path,
            format!("{}\n3/28/18 0:00,D0180,,GRP-1000,3730189502,1497775530,$100.00,$100.00,$0.00,$0.00\n", HEADER),
        )
        .unwrap();

        let records = ClaimReader::new().load(&path).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.get("Provider NPI"), Some(&RawValue::Integer(1497775530)));
        assert_eq!(record.get("Plan Group #"), Some(&RawValue::String("GRP-1000".to_string())));
        assert_eq!(record.get("Provider Fees"), Some(&RawValue::String("$100.00".to_string())));
        assert!(record.get("Quadrant").is_none());
    }

    #[test]
    fn test_load_csv_rejects_missing_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("claims.csv");
        std::fs::write(&path, "Service Date,Quadrant\n3/28/18 0:00,UR\n").unwrap();

        assert!(matches!(
            ClaimReader::new().load_csv(&path),
            Err(ClaimsError::SchemaMismatch { .. })
        ));
        assert_eq!(
            ClaimReader::new().with_header_validation(false).load_csv(&path).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_load_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("claims.json");
        std::fs::write(&path, r#"[{"Provider NPI": 1497775530, "Quadrant": "UR"}, {}]"#).unwrap();

        let records = ClaimReader::new().load(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("Provider NPI"), Some(&RawValue::Integer(1497775530)));
        assert!(records[1].is_empty());
    }

    #[test]
    fn test_load_json_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            ClaimReader::new().load(&missing),
            Err(ClaimsError::FileNotFound { .. })
        ));

        let not_array = dir.path().join("object.json");
        std::fs::write(&not_array, r#"{"Provider NPI": 1}"#).unwrap();
        assert!(matches!(ClaimReader::new().load(&not_array), Err(ClaimsError::Json { .. })));
    }

    #[test]
    fn test_csv_cell() {
        assert_eq!(csv_cell("12345"), RawValue::Integer(12345));
        assert_eq!(csv_cell("-12"), RawValue::String("-12".to_string()));
        assert_eq!(csv_cell("12345678901234567890"), RawValue::Integer(12345678901234567890));
        let too_long = "9".repeat(40);
        assert_eq!(csv_cell(&too_long), RawValue::String(too_long.clone()));
    }
}
