/*!
 * Field name normalization
 *
 * Claim submissions spell field names inconsistently ("Provider NPI",
 * "provider_npi", "Subscriber #"). Every key is mapped to lowercase snake case
 * before it is matched against the canonical claim fields.
 */

use regex::Regex;
use tracing::debug;

use crate::data_types::{ClaimField, NormalizedClaimRecord, RawClaimRecord};

lazy_static::lazy_static! {
    // Anything that is not an ASCII letter, digit, or hyphen
    static ref NON_NAME_CHARS: Regex = Regex::new(r"[^0-9a-zA-Z-]+").expect("valid field name pattern");
}

/// Normalize one field name to canonical snake case
///
/// Lowercases the name, spells `#` as ` number`, collapses every run of
/// characters other than ASCII letters, digits, or `-` into one underscore.
///
/// ```
/// use dental_claims::normalize::normalize_field_name;
///
/// assert_eq!(normalize_field_name("Provider NPI"), "provider_npi");
/// assert_eq!(normalize_field_name("Plan Group #"), "plan_group_number");
/// assert_eq!(normalize_field_name("provider_npi"), "provider_npi");
/// ```
pub fn normalize_field_name(name: &str) -> String {
    let lowered = name.to_lowercase().replace('#', " number");
    NON_NAME_CHARS.replace_all(&lowered, "_").into_owned()
}

/// Normalize every key of a raw record and split known from unknown fields
///
/// When two raw keys normalize to the same canonical field, the one submitted
/// last wins.
pub fn normalize_record(raw: RawClaimRecord) -> NormalizedClaimRecord {
    let mut normalized = NormalizedClaimRecord::default();

    for (name, value) in raw {
        let canonical = normalize_field_name(&name);
        match ClaimField::from_name(&canonical) {
            Some(field) => {
                if normalized.fields.insert(field, value).is_some() {
                    debug!(field = %field, raw_name = %name, "duplicate claim field after normalization");
                }
            }
            None => normalized.unknown_fields.push((canonical, value)),
        }
    }

    normalized
}

/// Normalize every record of a batch, preserving order
pub fn normalize_batch(records: Vec<RawClaimRecord>) -> Vec<NormalizedClaimRecord> {
    records.into_iter().map(normalize_record).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::RawValue;

    #[test]
    fn test_normalizes_submitted_labels() {
        let cases = [
            ("Provider Fees", "provider_fees"),
            ("Allowed Fees", "allowed_fees"),
            ("Member Coinsurance", "member_coinsurance"),
            ("Member Copay", "member_copay"),
            ("Provider NPI", "provider_npi"),
            ("Submitted Procedure", "submitted_procedure"),
            ("Subscriber Number", "subscriber_number"),
            ("Service Date", "service_date"),
            ("Plan Group Number", "plan_group_number"),
            ("Quadrant", "quadrant"),
        ];
        for (raw, expected) in cases {
            assert_eq!(normalize_field_name(raw), expected);
        }
    }

    #[test]
    fn test_hash_becomes_number() {
        assert_eq!(normalize_field_name("Subscriber#"), "subscriber_number");
        assert_eq!(normalize_field_name("Plan Group #"), "plan_group_number");
    }

    #[test]
    fn test_symbol_runs_collapse_and_hyphens_survive() {
        assert_eq!(normalize_field_name("Member -- Copay"), "member_--_copay");
        assert_eq!(normalize_field_name("member/*copay"), "member_copay");
        assert_eq!(normalize_field_name("MEMBER\tCOPAY"), "member_copay");
        assert_eq!(normalize_field_name("x-ray code"), "x-ray_code");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let names = [
            "Provider NPI",
            "Plan Group #",
            "  Leading and trailing  ",
            "Weird::Name!!",
            "x-ray code",
            "ÜBER field",
            "",
        ];
        for name in names {
            let once = normalize_field_name(name);
            assert_eq!(normalize_field_name(&once), once, "not idempotent for {name:?}");
        }
    }

    #[test]
    fn test_duplicate_keys_keep_last_submitted() {
        let record: RawClaimRecord =
            serde_json::from_str(r#"{"provider_npi": 1111111111, "Provider NPI": 2222222222}"#).unwrap();
        let normalized = normalize_record(record);
        assert_eq!(normalized.get(ClaimField::ProviderNpi), Some(&RawValue::Integer(2222222222)));

        let record: RawClaimRecord =
            serde_json::from_str(r#"{"Provider NPI": 2222222222, "provider_npi": 1111111111}"#).unwrap();
        let normalized = normalize_record(record);
        assert_eq!(normalized.get(ClaimField::ProviderNpi), Some(&RawValue::Integer(1111111111)));
    }

    #[test]
    fn test_normalize_record_splits_unknown_fields() {
        let mut raw = RawClaimRecord::new();
        raw.insert("Provider NPI".to_string(), RawValue::Integer(1234567890));
        raw.insert("Patient Name".to_string(), RawValue::from("Jane"));

        let record = normalize_record(raw);
        assert_eq!(record.get(ClaimField::ProviderNpi), Some(&RawValue::Integer(1234567890)));
        assert_eq!(record.unknown_fields, vec![("patient_name".to_string(), RawValue::from("Jane"))]);
    }
}
