/*!
 * Error handling for dental claim ingestion
 *
 * Provides detailed error types with context, suggestions, and the structured
 * per-record violation lists produced when a claim batch is rejected.
 */

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use serde::{Serialize, Deserialize};

use crate::data_types::RecordViolations;

/// Claims library result type
pub type Result<T> = std::result::Result<T, ClaimsError>;

/// Error types with context and suggestions
#[derive(Error, Debug)]
pub enum ClaimsError {
    /// File I/O errors with context
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
        context: ErrorContext,
    },

    /// CSV parsing errors with location information
    #[error("CSV parsing error at line {line:?}: {message}")]
    CsvParse {
        message: String,
        line: Option<usize>,
        column: Option<String>,
        context: ErrorContext,
    },

    /// JSON decoding or encoding errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
        context: ErrorContext,
    },

    /// A currency field could not be parsed; the whole batch is rejected
    #[error("Malformed currency in record {record_index}, field '{field}': {reason}")]
    MalformedCurrency {
        record_index: usize,
        field: String,
        value: String,
        reason: String,
    },

    /// One or more records failed validation; the whole batch is rejected
    #[error("Claim batch rejected: {} record(s) failed validation", .failures.len())]
    Validation {
        failures: Vec<RecordViolations>,
    },

    /// Invalid NPI with format guidance
    #[error("Invalid NPI '{npi}': {reason}")]
    InvalidNpi {
        npi: String,
        reason: String,
        suggestion: String,
    },

    /// Storage collaborator failure, propagated unmodified
    #[error("Store error: {message}")]
    Store {
        message: String,
        context: ErrorContext,
    },

    /// File not found with suggestions
    #[error("File not found: {path}")]
    FileNotFound {
        path: PathBuf,
        suggestion: String,
    },

    /// Input header mismatch with details
    #[error("Schema mismatch: {message}")]
    SchemaMismatch {
        message: String,
        missing_columns: Vec<String>,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        suggestion: Option<String>,
    },

    /// Export errors
    #[error("Export error: {message}")]
    Export {
        message: String,
        format: ExportFormat,
        suggestion: Option<String>,
    },

    /// Generic errors with custom message
    #[error("{message}")]
    Custom {
        message: String,
        suggestion: Option<String>,
    },
}

/// Error context providing additional information
#[derive(Debug, Default, Clone)]
pub struct ErrorContext {
    pub file_path: Option<PathBuf>,
    pub line_number: Option<usize>,
    pub column_name: Option<String>,
    pub record_index: Option<usize>,
}

impl ErrorContext {
    /// Context pointing at a file
    pub fn for_file<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            file_path: Some(path.into()),
            ..Default::default()
        }
    }
}

/// Export format for claim data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    JsonLines,
    Csv,
    Sql,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Json => write!(f, "JSON"),
            ExportFormat::JsonLines => write!(f, "JSON Lines"),
            ExportFormat::Csv => write!(f, "CSV"),
            ExportFormat::Sql => write!(f, "SQL"),
        }
    }
}

impl ClaimsError {
    /// Create a file not found error with helpful suggestion
    pub fn file_not_found_with_suggestion(path: PathBuf) -> Self {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let suggestion = match extension {
            "json" => format!(
                "Check if the file exists at '{}'. Claim batches are JSON arrays of objects, \
                one object per claim.",
                path.display()
            ),
            "csv" => format!(
                "Check if the file exists at '{}'. CSV batches need a header row naming each claim field.",
                path.display()
            ),
            _ => format!(
                "Check if the file exists at '{}'. Make sure the path is correct and you have read permissions.",
                path.display()
            ),
        };

        Self::FileNotFound { path, suggestion }
    }

    /// Create an invalid NPI error with validation details
    pub fn invalid_npi(npi: &str) -> Self {
        let (reason, suggestion) = if npi.is_empty() {
            ("NPI cannot be empty".to_string(),
             "Provide a valid 10-digit NPI number".to_string())
        } else if !npi.chars().all(|c| c.is_ascii_digit()) {
            ("NPI must contain only digits".to_string(),
             "Remove any non-numeric characters from the NPI".to_string())
        } else if npi.len() != 10 {
            (format!("NPI must be exactly 10 digits, found {}", npi.len()),
             "Ensure the NPI is exactly 10 digits without spaces or special characters".to_string())
        } else {
            ("Invalid NPI format".to_string(),
             "Verify the NPI number is correct".to_string())
        };

        Self::InvalidNpi {
            npi: npi.to_string(),
            reason,
            suggestion,
        }
    }

    /// Create a malformed currency error for one record field
    pub fn malformed_currency(record_index: usize, field: &str, value: &str, reason: &str) -> Self {
        Self::MalformedCurrency {
            record_index,
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a batch validation failure from per-record violations
    pub fn validation_failed(failures: Vec<RecordViolations>) -> Self {
        Self::Validation { failures }
    }

    /// Create a store error
    pub fn store<S: Into<String>>(message: S) -> Self {
        Self::Store {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create a store error tied to a backing file
    pub fn store_file<S: Into<String>>(message: S, path: PathBuf) -> Self {
        Self::Store {
            message: message.into(),
            context: ErrorContext::for_file(path),
        }
    }

    /// Create a schema mismatch error listing missing columns
    pub fn missing_columns(missing_columns: Vec<String>) -> Self {
        Self::SchemaMismatch {
            message: format!("Missing required claim columns: {}", missing_columns.join(", ")),
            missing_columns,
        }
    }

    /// Per-record violations, if this is a validation failure
    pub fn violations(&self) -> Option<&[RecordViolations]> {
        match self {
            Self::Validation { failures } => Some(failures),
            _ => None,
        }
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            Self::FileNotFound { suggestion, .. } => {
                format!("{}\n\nSuggestion: {}", self, suggestion)
            }
            Self::InvalidNpi { suggestion, .. } => {
                format!("{}\n\nSuggestion: {}", self, suggestion)
            }
            Self::MalformedCurrency { value, .. } => {
                format!(
                    "{}\n\nReceived: {:?}\nExpected a currency amount such as \"$100.00\"",
                    self, value
                )
            }
            Self::Validation { failures } => {
                let mut message = self.to_string();
                for failure in failures {
                    for violation in &failure.violations {
                        message.push_str(&format!(
                            "\n  record {}: {} [{}] {}",
                            failure.record_index,
                            violation.field,
                            violation.kind.as_code(),
                            violation.message
                        ));
                        if let Some(input) = &violation.input {
                            message.push_str(&format!(" (input: {})", input));
                        }
                    }
                }
                message
            }
            Self::SchemaMismatch { missing_columns, .. } if !missing_columns.is_empty() => {
                format!(
                    "{}\n\nSuggestion: add the missing columns to the header row; \
                    names are matched case-insensitively after normalization",
                    self
                )
            }
            Self::Configuration { suggestion: Some(sug), .. }
            | Self::Export { suggestion: Some(sug), .. }
            | Self::Custom { suggestion: Some(sug), .. } => {
                format!("{}\n\nSuggestion: {}", self, sug)
            }
            _ => self.to_string(),
        }
    }
}

// Convenience conversions
impl From<std::io::Error> for ClaimsError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: err,
            context: ErrorContext::default(),
        }
    }
}

impl From<csv::Error> for ClaimsError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|pos| pos.line() as usize);

        Self::CsvParse {
            message: err.to_string(),
            line,
            column: None,
            context: ErrorContext::default(),
        }
    }
}

impl From<serde_json::Error> for ClaimsError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
            source: err,
            context: ErrorContext::default(),
        }
    }
}

impl From<config::ConfigError> for ClaimsError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration {
            message: err.to_string(),
            suggestion: Some("Check CLAIMS_* environment variables and the config file for typos".to_string()),
        }
    }
}

impl From<tempfile::PersistError> for ClaimsError {
    fn from(err: tempfile::PersistError) -> Self {
        Self::store(format!("Failed to replace store file: {}", err.error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::{RawValue, Violation, ViolationKind};

    #[test]
    fn test_invalid_npi_reasons() {
        match ClaimsError::invalid_npi("123456789") {
            ClaimsError::InvalidNpi { reason, .. } => assert!(reason.contains("found 9")),
            other => panic!("unexpected error: {other:?}"),
        }
        match ClaimsError::invalid_npi("-123456789") {
            ClaimsError::InvalidNpi { reason, .. } => assert_eq!(reason, "NPI must contain only digits"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validation_user_message_lists_every_violation() {
        let err = ClaimsError::validation_failed(vec![RecordViolations {
            record_index: 2,
            violations: vec![Violation {
                field: "provider_npi".to_string(),
                kind: ViolationKind::InvalidProviderNpi,
                message: "Provider NPI must be a 10 digit number".to_string(),
                input: Some(RawValue::Integer(123456789)),
            }],
        }]);

        let message = err.user_message();
        assert!(message.starts_with("Claim batch rejected: 1 record(s) failed validation"));
        assert!(message.contains("record 2: provider_npi [invalid_provider_npi]"));
        assert!(message.contains("(input: 123456789)"));
        assert_eq!(err.violations().map(|v| v.len()), Some(1));
    }
}
