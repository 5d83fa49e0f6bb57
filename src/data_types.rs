/*!
 * Data type definitions for dental claim records
 *
 * Covers every shape a claim passes through: the raw caller-supplied mapping,
 * the normalized record keyed by canonical field, the persisted validated
 * claim, and the derived provider ranking entry.
 */

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Raw field value as received from the caller
///
/// Claim submissions mix strings and integers freely. Integers keep full
/// 128-bit range so long identifiers are not mistaken for non-numbers.
/// Anything else a JSON payload can carry (null, floats, booleans, nested
/// values) lands in `Other` so it can be reported as a field violation instead
/// of failing to decode.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawValue {
    Integer(i128),
    String(String),
    Other(serde_json::Value),
}

impl RawValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RawValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i128> {
        match self {
            RawValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Other(serde_json::Value::Null))
    }

    /// Short type name used in violation messages
    pub fn type_name(&self) -> &'static str {
        match self {
            RawValue::Integer(_) => "integer",
            RawValue::String(_) => "string",
            RawValue::Other(serde_json::Value::Null) => "null",
            RawValue::Other(serde_json::Value::Bool(_)) => "boolean",
            RawValue::Other(serde_json::Value::Number(_)) => "number",
            RawValue::Other(serde_json::Value::Array(_)) => "array",
            RawValue::Other(serde_json::Value::Object(_)) => "object",
            RawValue::Other(serde_json::Value::String(_)) => "string",
        }
    }
}

impl<'de> Deserialize<'de> for RawValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RawValueVisitor)
    }
}

struct RawValueVisitor;

impl<'de> Visitor<'de> for RawValueVisitor {
    type Value = RawValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a claim field value")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<RawValue, E> {
        Ok(RawValue::Integer(i128::from(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<RawValue, E> {
        Ok(RawValue::Integer(i128::from(v)))
    }

    fn visit_i128<E: de::Error>(self, v: i128) -> Result<RawValue, E> {
        Ok(RawValue::Integer(v))
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<RawValue, E> {
        Ok(i128::try_from(v)
            .map(RawValue::Integer)
            .unwrap_or_else(|_| RawValue::String(v.to_string())))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<RawValue, E> {
        Ok(RawValue::Other(serde_json::Value::from(v)))
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<RawValue, E> {
        Ok(RawValue::Other(serde_json::Value::Bool(v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<RawValue, E> {
        Ok(RawValue::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<RawValue, E> {
        Ok(RawValue::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<RawValue, E> {
        Ok(RawValue::Other(serde_json::Value::Null))
    }

    fn visit_none<E: de::Error>(self) -> Result<RawValue, E> {
        Ok(RawValue::Other(serde_json::Value::Null))
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<RawValue, D::Error> {
        RawValue::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, seq: A) -> Result<RawValue, A::Error> {
        serde_json::Value::deserialize(de::value::SeqAccessDeserializer::new(seq)).map(RawValue::Other)
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<RawValue, A::Error> {
        serde_json::Value::deserialize(de::value::MapAccessDeserializer::new(map)).map(RawValue::Other)
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Integer(i) => write!(f, "{}", i),
            RawValue::String(s) => write!(f, "{:?}", s),
            RawValue::Other(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::String(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::String(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Integer(i128::from(value))
    }
}

impl From<i128> for RawValue {
    fn from(value: i128) -> Self {
        RawValue::Integer(value)
    }
}

/// One caller-submitted claim: arbitrary field names mapped to raw values
///
/// Fields keep the order they were submitted in. Inserting an existing name
/// replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawClaimRecord {
    entries: Vec<(String, RawValue)>,
}

impl RawClaimRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, returning the value it replaced
    pub fn insert(&mut self, name: String, value: RawValue) -> Option<RawValue> {
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.entries.iter().find(|(existing, _)| existing == name).map(|(_, v)| v)
    }

    /// Remove a field, keeping the order of the rest
    pub fn remove(&mut self, name: &str) -> Option<RawValue> {
        let position = self.entries.iter().position(|(existing, _)| existing == name)?;
        Some(self.entries.remove(position).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fields in submission order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl std::ops::Index<&str> for RawClaimRecord {
    type Output = RawValue;

    fn index(&self, name: &str) -> &RawValue {
        match self.get(name) {
            Some(value) => value,
            None => panic!("no field named {:?} in claim record", name),
        }
    }
}

impl IntoIterator for RawClaimRecord {
    type Item = (String, RawValue);
    type IntoIter = std::vec::IntoIter<(String, RawValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<(String, RawValue)> for RawClaimRecord {
    fn from_iter<I: IntoIterator<Item = (String, RawValue)>>(iter: I) -> Self {
        let mut record = RawClaimRecord::new();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}

impl Serialize for RawClaimRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RawClaimRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(RawClaimRecordVisitor)
    }
}

struct RawClaimRecordVisitor;

impl<'de> Visitor<'de> for RawClaimRecordVisitor {
    type Value = RawClaimRecord;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a claim object keyed by field name")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RawClaimRecord, A::Error> {
        let mut record = RawClaimRecord::new();
        while let Some((name, value)) = map.next_entry::<String, RawValue>()? {
            record.insert(name, value);
        }
        Ok(record)
    }
}

/// Canonical claim field names
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimField {
    ServiceDate,
    SubmittedProcedure,
    Quadrant,
    PlanGroupNumber,
    SubscriberNumber,
    ProviderNpi,
    ProviderFees,
    AllowedFees,
    MemberCoinsurance,
    MemberCopay,
}

impl ClaimField {
    /// Every canonical input field, in schema order
    pub const ALL: [ClaimField; 10] = [
        ClaimField::ServiceDate,
        ClaimField::SubmittedProcedure,
        ClaimField::Quadrant,
        ClaimField::PlanGroupNumber,
        ClaimField::SubscriberNumber,
        ClaimField::ProviderNpi,
        ClaimField::ProviderFees,
        ClaimField::AllowedFees,
        ClaimField::MemberCoinsurance,
        ClaimField::MemberCopay,
    ];

    /// The four display-formatted currency fields
    pub const CURRENCY: [ClaimField; 4] = [
        ClaimField::ProviderFees,
        ClaimField::AllowedFees,
        ClaimField::MemberCoinsurance,
        ClaimField::MemberCopay,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "service_date" => Some(ClaimField::ServiceDate),
            "submitted_procedure" => Some(ClaimField::SubmittedProcedure),
            "quadrant" => Some(ClaimField::Quadrant),
            "plan_group_number" => Some(ClaimField::PlanGroupNumber),
            "subscriber_number" => Some(ClaimField::SubscriberNumber),
            "provider_npi" => Some(ClaimField::ProviderNpi),
            "provider_fees" => Some(ClaimField::ProviderFees),
            "allowed_fees" => Some(ClaimField::AllowedFees),
            "member_coinsurance" => Some(ClaimField::MemberCoinsurance),
            "member_copay" => Some(ClaimField::MemberCopay),
            _ => None,
        }
    }

    pub fn as_name(&self) -> &'static str {
        match self {
            ClaimField::ServiceDate => "service_date",
            ClaimField::SubmittedProcedure => "submitted_procedure",
            ClaimField::Quadrant => "quadrant",
            ClaimField::PlanGroupNumber => "plan_group_number",
            ClaimField::SubscriberNumber => "subscriber_number",
            ClaimField::ProviderNpi => "provider_npi",
            ClaimField::ProviderFees => "provider_fees",
            ClaimField::AllowedFees => "allowed_fees",
            ClaimField::MemberCoinsurance => "member_coinsurance",
            ClaimField::MemberCopay => "member_copay",
        }
    }

    pub fn is_currency(&self) -> bool {
        Self::CURRENCY.contains(self)
    }

    /// Whether a claim may omit this field
    pub fn is_optional(&self) -> bool {
        matches!(self, ClaimField::Quadrant)
    }
}

impl fmt::Display for ClaimField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_name())
    }
}

/// A claim whose keys have been mapped to canonical field names
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedClaimRecord {
    /// Values keyed by canonical field
    pub fields: BTreeMap<ClaimField, RawValue>,
    /// Normalized names that matched no canonical field, with their values
    pub unknown_fields: Vec<(String, RawValue)>,
}

impl NormalizedClaimRecord {
    pub fn get(&self, field: ClaimField) -> Option<&RawValue> {
        self.fields.get(&field)
    }

    /// Canonical field names present in this record
    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.keys().map(|f| f.as_name()).collect()
    }
}

/// NPI (National Provider Identifier) - 10 digit unique identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Npi(pub String);

impl Npi {
    /// Create a new NPI, validating format
    pub fn new(npi: String) -> Result<Self, crate::ClaimsError> {
        if npi.len() != crate::constants::NPI_LENGTH || !npi.chars().all(|c| c.is_ascii_digit()) {
            return Err(crate::ClaimsError::invalid_npi(&npi));
        }
        Ok(Npi(npi))
    }

    /// Create an NPI from its integer form as submitted on a claim
    pub fn from_integer(npi: i128) -> Result<Self, crate::ClaimsError> {
        Self::new(npi.to_string())
    }

    /// Get the NPI as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Npi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated dental claim, the persisted entity
///
/// `id` is `None` until the store assigns one at insert. `unique_claim_id` is
/// the batch identifier shared by every claim ingested in the same request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedClaim {
    pub id: Option<i64>,
    pub unique_claim_id: String,
    pub service_date: NaiveDateTime,
    pub submitted_procedure: String,
    pub quadrant: Option<String>,
    pub plan_group_number: String,
    pub subscriber_number: String,
    pub provider_npi: Npi,
    pub provider_fees: Decimal,
    pub allowed_fees: Decimal,
    pub member_coinsurance: Decimal,
    pub member_copay: Decimal,
    pub net_fee: Decimal,
}

impl ValidatedClaim {
    /// Whether the store has assigned an identity
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Copy of this claim carrying a store-assigned identity
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// Net fee recomputed from the stored currency fields
    pub fn expected_net_fee(&self) -> Option<Decimal> {
        crate::currency::compute_net_fee(
            self.provider_fees,
            self.allowed_fees,
            self.member_coinsurance,
            self.member_copay,
        )
    }
}

/// One row of the provider ranking: a provider and its summed net fee
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRankingEntry {
    pub provider_npi: String,
    pub total_net_fee: Decimal,
}

/// Category of a field-level validation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    InvalidDate,
    InvalidSubscriberNumber,
    InvalidProviderNpi,
    InvalidProcedureCode,
    MissingOrMalformedField,
    UnknownField,
}

impl ViolationKind {
    pub fn as_code(&self) -> &'static str {
        match self {
            ViolationKind::InvalidDate => "invalid_date",
            ViolationKind::InvalidSubscriberNumber => "invalid_subscriber_number",
            ViolationKind::InvalidProviderNpi => "invalid_provider_npi",
            ViolationKind::InvalidProcedureCode => "invalid_procedure_code",
            ViolationKind::MissingOrMalformedField => "missing_or_malformed_field",
            ViolationKind::UnknownField => "unknown_field",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Normalized field name the failure applies to
    pub field: String,
    pub kind: ViolationKind,
    pub message: String,
    /// Offending raw input, `None` when the field was missing
    pub input: Option<RawValue>,
}

/// All violations found in one record of a rejected batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordViolations {
    /// Zero-based position of the record in the submitted batch
    pub record_index: usize,
    pub violations: Vec<Violation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_value_decoding() {
        let record: RawClaimRecord = serde_json::from_str(
            r#"{"Provider NPI": 2345678901, "Quadrant": "UR", "Copay": 7.5, "Missing": null}"#,
        )
        .unwrap();

        assert_eq!(record["Provider NPI"], RawValue::Integer(2345678901));
        assert_eq!(record["Quadrant"], RawValue::String("UR".to_string()));
        assert_eq!(record["Copay"].type_name(), "number");
        assert!(record["Missing"].is_null());
    }

    #[test]
    fn test_wide_integers_decode_as_integers() {
        let record: RawClaimRecord =
            serde_json::from_str(r#"{"Subscriber Number": 12345678901234567890, "Offset": -42}"#).unwrap();

        assert_eq!(record["Subscriber Number"], RawValue::Integer(12345678901234567890));
        assert_eq!(record["Subscriber Number"].as_integer(), Some(12345678901234567890));
        assert_eq!(record["Offset"], RawValue::Integer(-42));
    }

    #[test]
    fn test_raw_record_keeps_submission_order() {
        let record: RawClaimRecord =
            serde_json::from_str(r#"{"provider_npi": 1, "Quadrant": "UR", "Provider NPI": 2}"#).unwrap();
        let names: Vec<&str> = record.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["provider_npi", "Quadrant", "Provider NPI"]);

        let mut record = record;
        assert_eq!(record.insert("Quadrant".to_string(), "LL".into()), Some(RawValue::from("UR")));
        let names: Vec<&str> = record.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["provider_npi", "Quadrant", "Provider NPI"]);
        assert_eq!(record.len(), 3);

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"provider_npi":1,"Quadrant":"LL","Provider NPI":2}"#);
    }

    #[test]
    fn test_claim_field_names_round_trip() {
        for field in ClaimField::ALL {
            assert_eq!(ClaimField::from_name(field.as_name()), Some(field));
        }
        assert_eq!(ClaimField::from_name("Provider NPI"), None);
        assert!(ClaimField::MemberCopay.is_currency());
        assert!(!ClaimField::ProviderNpi.is_currency());
    }

    #[test]
    fn test_npi_from_integer() {
        assert_eq!(Npi::from_integer(1234567890).unwrap().as_str(), "1234567890");
        assert!(Npi::from_integer(123456789).is_err());
        assert!(Npi::from_integer(-123456789).is_err());
    }

    #[test]
    fn test_npi_serializes_as_plain_string() {
        let npi = Npi::new("2345678901".to_string()).unwrap();
        assert_eq!(serde_json::to_string(&npi).unwrap(), "\"2345678901\"");
    }
}
