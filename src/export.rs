/*!
 * Export functionality for stored claims
 *
 * Provides JSON, JSON Lines, CSV, and SQL exports of persisted claims.
 */

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::NaiveDateTime;
use tracing::debug;

use crate::data_types::ValidatedClaim;
use crate::schema::{ClaimSchema, ColumnKind};
use crate::{ClaimsError, ExportFormat, Result};

/// Timestamp layout used by the text exports
const EXPORT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Trait for implementing claim exporters
pub trait ClaimExporter {
    /// Export the claims
    fn export(&self, claims: &[ValidatedClaim], path: &Path) -> Result<()>;

    /// Get the export format
    fn format(&self) -> ExportFormat;
}

/// JSON exporter for claims
pub struct JsonExporter {
    /// Whether to pretty-print the JSON
    pub pretty_print: bool,
    /// Whether to export as JSON Lines (one claim per line)
    pub json_lines: bool,
}

impl Default for JsonExporter {
    fn default() -> Self {
        Self {
            pretty_print: true,
            json_lines: false,
        }
    }
}

impl JsonExporter {
    /// Create a new JSON exporter
    pub fn new() -> Self {
        Self::default()
    }

    /// Set pretty printing
    pub fn with_pretty_print(mut self, pretty: bool) -> Self {
        self.pretty_print = pretty;
        self
    }

    /// Set JSON Lines format
    pub fn as_json_lines(mut self) -> Self {
        self.json_lines = true;
        self.pretty_print = false;
        self
    }
}

impl ClaimExporter for JsonExporter {
    fn export(&self, claims: &[ValidatedClaim], path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        if self.json_lines {
            for claim in claims {
                let json = serde_json::to_string(claim)?;
                writeln!(writer, "{}", json)?;
            }
        } else if self.pretty_print {
            serde_json::to_writer_pretty(&mut writer, claims)?;
        } else {
            serde_json::to_writer(&mut writer, claims)?;
        }

        writer.flush()?;
        Ok(())
    }

    fn format(&self) -> ExportFormat {
        if self.json_lines {
            ExportFormat::JsonLines
        } else {
            ExportFormat::Json
        }
    }
}

/// CSV exporter for claims, one row per claim in column order
pub struct CsvExporter {
    /// Whether to include headers
    pub include_headers: bool,
    /// Field delimiter
    pub delimiter: u8,
}

impl Default for CsvExporter {
    fn default() -> Self {
        Self {
            include_headers: true,
            delimiter: b',',
        }
    }
}

impl CsvExporter {
    /// Create a new CSV exporter
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the field delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set whether to write a header row
    pub fn with_headers(mut self, include: bool) -> Self {
        self.include_headers = include;
        self
    }
}

impl ClaimExporter for CsvExporter {
    fn export(&self, claims: &[ValidatedClaim], path: &Path) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_path(path)?;

        if self.include_headers {
            writer.write_record(ClaimSchema::column_names())?;
        }

        for claim in claims {
            writer.write_record(&csv_row(claim))?;
        }

        writer.flush()?;
        Ok(())
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::Csv
    }
}

fn csv_row(claim: &ValidatedClaim) -> Vec<String> {
    vec![
        claim.id.map(|id| id.to_string()).unwrap_or_default(),
        claim.unique_claim_id.clone(),
        format_datetime(&claim.service_date),
        claim.submitted_procedure.clone(),
        claim.quadrant.clone().unwrap_or_default(),
        claim.plan_group_number.clone(),
        claim.subscriber_number.clone(),
        claim.provider_npi.to_string(),
        claim.provider_fees.to_string(),
        claim.allowed_fees.to_string(),
        claim.member_coinsurance.to_string(),
        claim.member_copay.to_string(),
        claim.net_fee.to_string(),
    ]
}

/// SQL exporter for claims
pub struct SqlExporter {
    /// SQL dialect to use
    pub dialect: SqlDialect,
    /// Target table name
    pub table_name: String,
    /// Rows per INSERT statement
    pub batch_size: usize,
    /// Whether to include CREATE TABLE statements
    pub include_schema: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqlDialect {
    #[default]
    PostgreSQL,
    SQLite,
}

impl SqlDialect {
    fn column_type(&self, kind: ColumnKind) -> &'static str {
        match (self, kind) {
            (SqlDialect::PostgreSQL, ColumnKind::Identity) => "SERIAL PRIMARY KEY",
            (SqlDialect::SQLite, ColumnKind::Identity) => "INTEGER PRIMARY KEY AUTOINCREMENT",
            (SqlDialect::PostgreSQL, ColumnKind::Text) => "VARCHAR NOT NULL",
            (SqlDialect::PostgreSQL, ColumnKind::OptionalText) => "VARCHAR",
            (SqlDialect::SQLite, ColumnKind::Text) => "TEXT NOT NULL",
            (SqlDialect::SQLite, ColumnKind::OptionalText) => "TEXT",
            (SqlDialect::PostgreSQL, ColumnKind::Timestamp) => "TIMESTAMP NOT NULL",
            (SqlDialect::SQLite, ColumnKind::Timestamp) => "TEXT NOT NULL",
            (_, ColumnKind::Money) => "NUMERIC(12, 2) NOT NULL",
        }
    }
}

impl Default for SqlExporter {
    fn default() -> Self {
        Self {
            dialect: SqlDialect::PostgreSQL,
            table_name: ClaimSchema::TABLE_NAME.to_string(),
            batch_size: 1000,
            include_schema: true,
        }
    }
}

impl SqlExporter {
    /// Create a new SQL exporter
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the SQL dialect
    pub fn with_dialect(mut self, dialect: SqlDialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Set the table name
    pub fn with_table_name<S: Into<String>>(mut self, name: S) -> Self {
        self.table_name = name.into();
        self
    }

    /// Set the number of rows per INSERT
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set whether to emit the schema before the data
    pub fn with_schema(mut self, include: bool) -> Self {
        self.include_schema = include;
        self
    }

    /// CREATE TABLE and CREATE INDEX statements for the claim table
    pub fn schema_sql(&self) -> String {
        let columns: Vec<String> = ClaimSchema::columns()
            .into_iter()
            .map(|(name, kind)| format!("  {} {}", name, self.dialect.column_type(kind)))
            .collect();

        let mut sql = format!("-- Claim schema for {:?}\n\n", self.dialect);
        sql.push_str(&format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n);\n\n",
            self.table_name,
            columns.join(",\n")
        ));
        for column in ClaimSchema::indexed_columns() {
            sql.push_str(&format!(
                "CREATE INDEX IF NOT EXISTS idx_{}_{} ON {}({});\n",
                self.table_name, column, self.table_name, column
            ));
        }
        sql
    }

    fn write_inserts(&self, writer: &mut dyn Write, claims: &[ValidatedClaim]) -> Result<()> {
        // id is left to the target database
        let columns = ClaimSchema::column_names()[1..].join(", ");

        for chunk in claims.chunks(self.batch_size) {
            writeln!(writer, "INSERT INTO {} ({}) VALUES", self.table_name, columns)?;

            for (i, claim) in chunk.iter().enumerate() {
                let values = format!(
                    "({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {})",
                    sql_string(Some(&claim.unique_claim_id)),
                    sql_string(Some(&format_datetime(&claim.service_date))),
                    sql_string(Some(&claim.submitted_procedure)),
                    sql_string(claim.quadrant.as_deref()),
                    sql_string(Some(&claim.plan_group_number)),
                    sql_string(Some(&claim.subscriber_number)),
                    sql_string(Some(claim.provider_npi.as_str())),
                    claim.provider_fees,
                    claim.allowed_fees,
                    claim.member_coinsurance,
                    claim.member_copay,
                    claim.net_fee,
                );

                let terminator = if i + 1 < chunk.len() { ',' } else { ';' };
                writeln!(writer, "  {}{}", values, terminator)?;
            }
        }

        Ok(())
    }
}

impl ClaimExporter for SqlExporter {
    fn export(&self, claims: &[ValidatedClaim], path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        if self.include_schema {
            writeln!(writer, "{}", self.schema_sql())?;
        }

        writeln!(writer, "-- Claim data")?;
        self.write_inserts(&mut writer, claims)?;
        writer.flush()?;
        Ok(())
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::Sql
    }
}

// SQL helper functions
fn sql_string(value: Option<&str>) -> String {
    match value {
        Some(s) => format!("'{}'", s.replace('\'', "''")),
        None => "NULL".to_string(),
    }
}

fn format_datetime(value: &NaiveDateTime) -> String {
    value.format(EXPORT_DATETIME_FORMAT).to_string()
}

/// Export claims in the given format
pub fn export_claims<P: AsRef<Path>>(
    claims: &[ValidatedClaim],
    path: P,
    format: ExportFormat,
    pretty: bool,
) -> Result<()> {
    let path = path.as_ref();
    let exporter: Box<dyn ClaimExporter> = match format {
        ExportFormat::Json => Box::new(JsonExporter::new().with_pretty_print(pretty)),
        ExportFormat::JsonLines => Box::new(JsonExporter::new().as_json_lines()),
        ExportFormat::Csv => Box::new(CsvExporter::new()),
        ExportFormat::Sql => Box::new(SqlExporter::new()),
    };

    exporter.export(claims, path).map_err(|e| match e {
        ClaimsError::Io { message, .. } => ClaimsError::Export {
            message: format!("Failed to write {}: {}", path.display(), message),
            format,
            suggestion: Some("Check that the output directory exists and is writable".to_string()),
        },
        other => other,
    })?;

    debug!(path = %path.display(), claims = claims.len(), %format, "claims exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::Npi;
    use rust_decimal::Decimal;

    fn claim(id: i64, quadrant: Option<&str>, plan: &str) -> ValidatedClaim {
        ValidatedClaim {
            id: Some(id),
            unique_claim_id: "0b9f9a8e-batch".to_string(),
            service_date: NaiveDateTime::parse_from_str("03/28/18 16:00", "%m/%d/%y %H:%M").unwrap(),
            submitted_procedure: "D0180".to_string(),
            quadrant: quadrant.map(str::to_string),
            plan_group_number: plan.to_string(),
            subscriber_number: "3730189502".to_string(),
            provider_npi: Npi("1497775530".to_string()),
            provider_fees: Decimal::new(10000, 2),
            allowed_fees: Decimal::new(10000, 2),
            member_coinsurance: Decimal::new(0, 2),
            member_copay: Decimal::new(0, 2),
            net_fee: Decimal::new(0, 2),
        }
    }

    #[test]
    fn test_json_export_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("claims.json");
        let claims = vec![claim(1, Some("UR"), "GRP-1000"), claim(2, None, "GRP-1001")];

        export_claims(&claims, &path, ExportFormat::Json, true).unwrap();

        let loaded: Vec<ValidatedClaim> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, claims);
    }

    #[test]
    fn test_json_lines_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("claims.jsonl");
        let claims = vec![claim(1, None, "GRP-1000"), claim(2, None, "GRP-1001")];

        let exporter = JsonExporter::new().as_json_lines();
        assert_eq!(exporter.format(), ExportFormat::JsonLines);
        exporter.export(&claims, &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn test_csv_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("claims.csv");

        CsvExporter::new().export(&[claim(7, None, "GRP-1000")], &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next().unwrap(), ClaimSchema::column_names().join(","));
        assert_eq!(
            lines.next().unwrap(),
            "7,0b9f9a8e-batch,2018-03-28 16:00:00,D0180,,GRP-1000,3730189502,1497775530,100.00,100.00,0.00,0.00,0.00"
        );
    }

    #[test]
    fn test_sql_schema_has_indexes() {
        let sql = SqlExporter::new().with_dialect(SqlDialect::SQLite).schema_sql();
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS claim ("));
        assert!(sql.contains("id INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(sql.contains("net_fee NUMERIC(12, 2) NOT NULL"));
        for column in ClaimSchema::indexed_columns() {
            assert!(sql.contains(&format!("idx_claim_{}", column)));
        }
    }

    #[test]
    fn test_sql_inserts_are_batched_and_escaped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("claims.sql");
        let claims = vec![
            claim(1, None, "O'Brien"),
            claim(2, Some("UL"), "GRP-1001"),
            claim(3, None, "GRP-1002"),
        ];

        SqlExporter::new()
            .with_schema(false)
            .with_batch_size(2)
            .export(&claims, &path)
            .unwrap();

        let sql = std::fs::read_to_string(&path).unwrap();
        assert_eq!(sql.matches("INSERT INTO claim").count(), 2);
        assert!(sql.contains("'O''Brien'"));
        assert!(sql.contains("NULL, 'O''Brien'"));
        assert!(sql.contains("'UL'"));
        assert!(!sql.contains("CREATE TABLE"));
    }
}
