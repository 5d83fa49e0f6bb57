/*!
 * Schema definitions for dental claim data
 *
 * This module contains the canonical input field set, the persisted claim
 * column layout, and the indexes the ranking aggregation relies on.
 */

use crate::data_types::ClaimField;
use crate::normalize::normalize_field_name;

/// Storage type of a persisted claim column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Store-assigned integer primary key
    Identity,
    Text,
    OptionalText,
    Timestamp,
    /// Exact decimal with two fractional digits
    Money,
}

/// Persisted claim table schema
pub struct ClaimSchema;

impl ClaimSchema {
    /// Table name used by storage and SQL export
    pub const TABLE_NAME: &'static str = "claim";

    /// Persisted columns in order, with their kinds
    pub fn columns() -> Vec<(&'static str, ColumnKind)> {
        vec![
            ("id", ColumnKind::Identity),
            ("unique_claim_id", ColumnKind::Text),
            ("service_date", ColumnKind::Timestamp),
            ("submitted_procedure", ColumnKind::Text),
            ("quadrant", ColumnKind::OptionalText),
            ("plan_group_number", ColumnKind::Text),
            ("subscriber_number", ColumnKind::Text),
            ("provider_npi", ColumnKind::Text),
            ("provider_fees", ColumnKind::Money),
            ("allowed_fees", ColumnKind::Money),
            ("member_coinsurance", ColumnKind::Money),
            ("member_copay", ColumnKind::Money),
            ("net_fee", ColumnKind::Money),
        ]
    }

    /// Get all persisted column names in order
    pub fn column_names() -> Vec<&'static str> {
        Self::columns().into_iter().map(|(name, _)| name).collect()
    }

    pub fn column_count() -> usize {
        Self::columns().len()
    }

    /// Columns carrying a secondary index
    pub fn indexed_columns() -> Vec<&'static str> {
        vec![
            "submitted_procedure",
            "plan_group_number",
            "subscriber_number",
            "provider_npi",
            "unique_claim_id",
        ]
    }

    /// Canonical fields a submitted claim must carry
    pub fn required_input_fields() -> Vec<ClaimField> {
        ClaimField::ALL.into_iter().filter(|f| !f.is_optional()).collect()
    }

    /// Validate that an input header row covers every required claim field
    ///
    /// Headers are compared after normalization, so `"Provider NPI"` satisfies
    /// `provider_npi`. Extra columns are allowed here; the validator decides
    /// what to do with them.
    pub fn validate_headers(headers: &[String]) -> Result<(), crate::ClaimsError> {
        let normalized: Vec<String> = headers.iter().map(|h| normalize_field_name(h)).collect();

        let missing: Vec<String> = Self::required_input_fields()
            .into_iter()
            .map(|f| f.as_name())
            .filter(|name| !normalized.iter().any(|h| h == name))
            .map(str::to_string)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(crate::ClaimsError::missing_columns(missing))
        }
    }
}
