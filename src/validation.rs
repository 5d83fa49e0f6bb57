/*!
 * Claim validation
 *
 * Every field rule runs on every record and all violations are collected, so a
 * rejected batch reports everything wrong with it in one pass.
 */

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use crate::config::UnknownFieldPolicy;
use crate::constants::{CURRENCY_SCALE, PROCEDURE_CODE_PREFIX, SERVICE_DATE_FORMAT};
use crate::currency::{with_currency_scale, FeeAmounts};
use crate::data_types::*;
use crate::Result;

/// A normalized claim with its currency fields parsed and net fee derived
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimDraft {
    /// Position of the record in its batch
    pub record_index: usize,
    pub record: NormalizedClaimRecord,
    pub fees: FeeAmounts,
    /// `None` when a currency field is missing
    pub net_fee: Option<Decimal>,
}

impl ClaimDraft {
    /// Parse currency fields and compute the net fee for one record
    pub fn prepare(record_index: usize, record: NormalizedClaimRecord) -> Result<Self> {
        let fees = FeeAmounts::from_record(record_index, &record)?;
        let net_fee = fees.net_fee();
        Ok(Self {
            record_index,
            record,
            fees,
            net_fee,
        })
    }
}

/// Field-by-field claim validator
#[derive(Debug, Clone, Default)]
pub struct ClaimValidator {
    unknown_fields: UnknownFieldPolicy,
}

impl ClaimValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how fields that match no canonical name are handled
    pub fn with_unknown_field_policy(mut self, policy: UnknownFieldPolicy) -> Self {
        self.unknown_fields = policy;
        self
    }

    /// Validate one draft, tagging it with the batch identifier
    ///
    /// Returns the validated claim, or every violation found in field order.
    pub fn validate(
        &self,
        draft: &ClaimDraft,
        batch_id: &str,
    ) -> std::result::Result<ValidatedClaim, Vec<Violation>> {
        let mut violations = Vec::new();
        let record = &draft.record;

        let service_date = validate_service_date(record.get(ClaimField::ServiceDate), &mut violations);
        let submitted_procedure =
            validate_submitted_procedure(record.get(ClaimField::SubmittedProcedure), &mut violations);
        let quadrant = validate_optional_string(ClaimField::Quadrant, record.get(ClaimField::Quadrant), &mut violations);
        let plan_group_number =
            validate_required_string(ClaimField::PlanGroupNumber, record.get(ClaimField::PlanGroupNumber), &mut violations);
        let subscriber_number =
            validate_subscriber_number(record.get(ClaimField::SubscriberNumber), &mut violations);
        let provider_npi = validate_provider_npi(record.get(ClaimField::ProviderNpi), &mut violations);
        let provider_fees = validate_currency(ClaimField::ProviderFees, &draft.fees, &mut violations);
        let allowed_fees = validate_currency(ClaimField::AllowedFees, &draft.fees, &mut violations);
        let member_coinsurance = validate_currency(ClaimField::MemberCoinsurance, &draft.fees, &mut violations);
        let member_copay = validate_currency(ClaimField::MemberCopay, &draft.fees, &mut violations);
        let fees_valid = [&provider_fees, &allowed_fees, &member_coinsurance, &member_copay]
            .iter()
            .all(|fee| fee.is_some());
        if fees_valid && draft.net_fee.is_none() {
            violations.push(Violation {
                field: "net_fee".to_string(),
                kind: ViolationKind::MissingOrMalformedField,
                message: "Net fee is out of range for a currency value".to_string(),
                input: None,
            });
        }

        if self.unknown_fields == UnknownFieldPolicy::Reject {
            for (name, value) in &record.unknown_fields {
                violations.push(Violation {
                    field: name.clone(),
                    kind: ViolationKind::UnknownField,
                    message: "Extra inputs are not permitted".to_string(),
                    input: Some(value.clone()),
                });
            }
        }

        if !violations.is_empty() {
            return Err(violations);
        }

        match (
            service_date,
            submitted_procedure,
            plan_group_number,
            subscriber_number,
            provider_npi,
            provider_fees,
            allowed_fees,
            member_coinsurance,
            member_copay,
            draft.net_fee,
        ) {
            (
                Some(service_date),
                Some(submitted_procedure),
                Some(plan_group_number),
                Some(subscriber_number),
                Some(provider_npi),
                Some(provider_fees),
                Some(allowed_fees),
                Some(member_coinsurance),
                Some(member_copay),
                Some(net_fee),
            ) => Ok(ValidatedClaim {
                id: None,
                unique_claim_id: batch_id.to_string(),
                service_date,
                submitted_procedure,
                quadrant,
                plan_group_number,
                subscriber_number,
                provider_npi,
                provider_fees,
                allowed_fees,
                member_coinsurance,
                member_copay,
                net_fee,
            }),
            // Every None above pushed a violation
            _ => Err(vec![Violation {
                field: "net_fee".to_string(),
                kind: ViolationKind::MissingOrMalformedField,
                message: "Field required".to_string(),
                input: None,
            }]),
        }
    }
}

fn violation(field: ClaimField, kind: ViolationKind, message: &str, input: Option<&RawValue>) -> Violation {
    Violation {
        field: field.as_name().to_string(),
        kind,
        message: message.to_string(),
        input: input.cloned(),
    }
}

fn missing(field: ClaimField) -> Violation {
    violation(field, ViolationKind::MissingOrMalformedField, "Field required", None)
}

fn present(value: Option<&RawValue>) -> Option<&RawValue> {
    value.filter(|v| !v.is_null())
}

fn validate_service_date(value: Option<&RawValue>, violations: &mut Vec<Violation>) -> Option<NaiveDateTime> {
    let field = ClaimField::ServiceDate;
    let Some(value) = present(value) else {
        violations.push(missing(field));
        return None;
    };

    let parsed = value
        .as_str()
        .and_then(|s| NaiveDateTime::parse_from_str(s.trim(), SERVICE_DATE_FORMAT).ok());
    if parsed.is_none() {
        violations.push(violation(
            field,
            ViolationKind::InvalidDate,
            "Service date must be a valid date in MM/DD/YY HH:MM format",
            Some(value),
        ));
    }
    parsed
}

fn validate_submitted_procedure(value: Option<&RawValue>, violations: &mut Vec<Violation>) -> Option<String> {
    let field = ClaimField::SubmittedProcedure;
    let code = validate_required_string(field, value, violations)?;

    if !code.starts_with(PROCEDURE_CODE_PREFIX) {
        violations.push(violation(
            field,
            ViolationKind::InvalidProcedureCode,
            "Submitted procedure must start with 'D'",
            value,
        ));
        return None;
    }
    Some(code)
}

fn validate_required_string(
    field: ClaimField,
    value: Option<&RawValue>,
    violations: &mut Vec<Violation>,
) -> Option<String> {
    let Some(value) = present(value) else {
        violations.push(missing(field));
        return None;
    };

    match value.as_str() {
        Some(s) => Some(s.to_string()),
        None => {
            violations.push(violation(
                field,
                ViolationKind::MissingOrMalformedField,
                "Input should be a valid string",
                Some(value),
            ));
            None
        }
    }
}

fn validate_optional_string(
    field: ClaimField,
    value: Option<&RawValue>,
    violations: &mut Vec<Violation>,
) -> Option<String> {
    present(value)?;
    validate_required_string(field, value, violations)
}

fn validate_subscriber_number(value: Option<&RawValue>, violations: &mut Vec<Violation>) -> Option<String> {
    let field = ClaimField::SubscriberNumber;
    let Some(value) = present(value) else {
        violations.push(missing(field));
        return None;
    };

    match value.as_integer() {
        Some(number) => Some(number.to_string()),
        None => {
            violations.push(violation(
                field,
                ViolationKind::InvalidSubscriberNumber,
                "Subscriber number must be a number",
                Some(value),
            ));
            None
        }
    }
}

fn validate_provider_npi(value: Option<&RawValue>, violations: &mut Vec<Violation>) -> Option<Npi> {
    let field = ClaimField::ProviderNpi;
    let Some(value) = present(value) else {
        violations.push(missing(field));
        return None;
    };

    let Some(number) = value.as_integer() else {
        violations.push(violation(
            field,
            ViolationKind::InvalidProviderNpi,
            "Provider NPI must be a number",
            Some(value),
        ));
        return None;
    };

    match Npi::from_integer(number) {
        Ok(npi) => Some(npi),
        Err(_) => {
            violations.push(violation(
                field,
                ViolationKind::InvalidProviderNpi,
                "Provider NPI must be a 10 digit number",
                Some(value),
            ));
            None
        }
    }
}

fn validate_currency(field: ClaimField, fees: &FeeAmounts, violations: &mut Vec<Violation>) -> Option<Decimal> {
    let Some(parsed) = fees.get(field) else {
        violations.push(missing(field));
        return None;
    };

    if parsed.amount.scale() > CURRENCY_SCALE {
        violations.push(Violation {
            field: field.as_name().to_string(),
            kind: ViolationKind::MissingOrMalformedField,
            message: format!("Decimal input should have no more than {} decimal places", CURRENCY_SCALE),
            input: Some(RawValue::String(parsed.raw.clone())),
        });
        return None;
    }

    let amount = with_currency_scale(parsed.amount);
    if amount.is_none() {
        violations.push(Violation {
            field: field.as_name().to_string(),
            kind: ViolationKind::MissingOrMalformedField,
            message: "Amount is too large for a currency value".to_string(),
            input: Some(RawValue::String(parsed.raw.clone())),
        });
    }
    amount
}
