/*!
 * Currency parsing and net fee derivation
 *
 * Currency fields arrive display formatted (`"$100.00"`). They are parsed into
 * exact decimals so summed fees never drift.
 */

use rust_decimal::Decimal;

use crate::constants::{CURRENCY_SCALE, CURRENCY_SYMBOL};
use crate::data_types::{ClaimField, NormalizedClaimRecord, RawValue};
use crate::{ClaimsError, Result};

/// A parsed currency amount and the text it came from
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCurrency {
    pub amount: Decimal,
    pub raw: String,
}

/// Parse a display-formatted currency string into an exact decimal
///
/// An optional `$` symbol and an optional sign are accepted in either order
/// (`"-$5.25"`, `"$-5.25"`, `"+$5"`). The remainder must be a plain decimal
/// literal. The returned error is the reason only; callers attach record and
/// field context.
pub fn parse_currency(raw: &str) -> std::result::Result<Decimal, String> {
    let trimmed = raw.trim();
    let (sign, rest) = split_sign(trimmed);
    let rest = rest.strip_prefix(CURRENCY_SYMBOL).unwrap_or(rest);
    let (sign, digits) = match sign {
        Some(sign) => (Some(sign), rest),
        None => split_sign(rest),
    };

    if digits.is_empty() {
        return Err("no amount after currency symbol".to_string());
    }
    if !digits.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(format!("'{}' is not a decimal amount", digits));
    }

    let amount = Decimal::from_str_exact(digits)
        .map_err(|e| format!("'{}' is not a decimal amount: {}", digits, e))?;

    Ok(if sign == Some('-') { -amount } else { amount })
}

fn split_sign(text: &str) -> (Option<char>, &str) {
    match text.chars().next() {
        Some(sign @ ('-' | '+')) => (Some(sign), &text[1..]),
        _ => (None, text),
    }
}

/// The four currency amounts of one claim
///
/// A field is `None` when the claim omitted it; the validator reports those.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeeAmounts {
    pub provider_fees: Option<ParsedCurrency>,
    pub allowed_fees: Option<ParsedCurrency>,
    pub member_coinsurance: Option<ParsedCurrency>,
    pub member_copay: Option<ParsedCurrency>,
}

impl FeeAmounts {
    /// Parse the currency fields of a normalized record
    ///
    /// Fails with `MalformedCurrency` when a present value is not a string or
    /// does not parse. Absent and null values are left as `None`.
    pub fn from_record(record_index: usize, record: &NormalizedClaimRecord) -> Result<Self> {
        let mut fees = FeeAmounts::default();

        for field in ClaimField::CURRENCY {
            let Some(value) = record.get(field).filter(|v| !v.is_null()) else {
                continue;
            };
            let parsed = match value {
                RawValue::String(raw) => {
                    let amount = parse_currency(raw).map_err(|reason| {
                        ClaimsError::malformed_currency(record_index, field.as_name(), raw, &reason)
                    })?;
                    ParsedCurrency { amount, raw: raw.clone() }
                }
                other => {
                    return Err(ClaimsError::malformed_currency(
                        record_index,
                        field.as_name(),
                        &other.to_string(),
                        &format!("expected a currency string, found {}", other.type_name()),
                    ));
                }
            };
            *fees.slot_mut(field) = Some(parsed);
        }

        Ok(fees)
    }

    pub fn get(&self, field: ClaimField) -> Option<&ParsedCurrency> {
        match field {
            ClaimField::ProviderFees => self.provider_fees.as_ref(),
            ClaimField::AllowedFees => self.allowed_fees.as_ref(),
            ClaimField::MemberCoinsurance => self.member_coinsurance.as_ref(),
            ClaimField::MemberCopay => self.member_copay.as_ref(),
            _ => None,
        }
    }

    fn slot_mut(&mut self, field: ClaimField) -> &mut Option<ParsedCurrency> {
        match field {
            ClaimField::ProviderFees => &mut self.provider_fees,
            ClaimField::AllowedFees => &mut self.allowed_fees,
            ClaimField::MemberCoinsurance => &mut self.member_coinsurance,
            _ => &mut self.member_copay,
        }
    }

    /// Net fee, if all four amounts are present and the result is a
    /// representable currency value
    pub fn net_fee(&self) -> Option<Decimal> {
        compute_net_fee(
            self.provider_fees.as_ref()?.amount,
            self.allowed_fees.as_ref()?.amount,
            self.member_coinsurance.as_ref()?.amount,
            self.member_copay.as_ref()?.amount,
        )
    }
}

/// `provider_fees + member_coinsurance + member_copay - allowed_fees`
///
/// Exact decimal arithmetic; the result carries at least two fractional digits.
/// Returns `None` when the sum overflows or cannot be held at currency scale.
pub fn compute_net_fee(
    provider_fees: Decimal,
    allowed_fees: Decimal,
    member_coinsurance: Decimal,
    member_copay: Decimal,
) -> Option<Decimal> {
    let net = provider_fees
        .checked_add(member_coinsurance)?
        .checked_add(member_copay)?
        .checked_sub(allowed_fees)?;
    with_currency_scale(net)
}

/// Pad an amount to two fractional digits; wider scales are left untouched
///
/// Returns `None` for amounts too large to carry two fractional digits.
pub fn with_currency_scale(amount: Decimal) -> Option<Decimal> {
    let mut amount = amount;
    if amount.scale() < CURRENCY_SCALE {
        amount.rescale(CURRENCY_SCALE);
        if amount.scale() != CURRENCY_SCALE {
            return None;
        }
    }
    Some(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::RawClaimRecord;
    use crate::normalize::normalize_record;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_currency_strips_symbol() {
        assert_eq!(parse_currency("$100.00").unwrap(), dec("100.00"));
        assert_eq!(parse_currency("7.50").unwrap(), dec("7.50"));
        assert_eq!(parse_currency(" $15 ").unwrap(), dec("15"));
        assert_eq!(parse_currency("-$5.25").unwrap(), dec("-5.25"));
        assert_eq!(parse_currency("$100.00").unwrap().scale(), 2);
    }

    #[test]
    fn test_parse_currency_sign_either_side_of_symbol() {
        assert_eq!(parse_currency("$-5.00").unwrap(), dec("-5.00"));
        assert_eq!(parse_currency("+$5").unwrap(), dec("5"));
        assert_eq!(parse_currency("$+5").unwrap(), dec("5"));
        assert_eq!(parse_currency("-5").unwrap(), dec("-5"));
    }

    #[test]
    fn test_parse_currency_rejects_garbage() {
        for raw in ["", "$", "-$", "$-", "+", "--5", "-$-5", "$$5", "5$", "$abc", "$1,000.00", "USD 10", "$1.2.3", "NaN", "$1e5"] {
            assert!(parse_currency(raw).is_err(), "accepted {raw:?}");
        }
    }

    #[test]
    fn test_net_fee_is_exact() {
        let net = compute_net_fee(dec("150.00"), dec("120.00"), dec("15.00"), dec("7.50")).unwrap();
        assert_eq!(net, dec("52.50"));
        assert_eq!(net.to_string(), "52.50");

        let net = compute_net_fee(dec("0.10"), dec("0.30"), dec("0.10"), dec("0.10")).unwrap();
        assert_eq!(net, Decimal::ZERO);
        assert_eq!(net.to_string(), "0.00");
    }

    #[test]
    fn test_net_fee_scale_padding() {
        let net = compute_net_fee(dec("100"), dec("80"), dec("10"), dec("5")).unwrap();
        assert_eq!(net.to_string(), "35.00");
    }

    #[test]
    fn test_net_fee_out_of_range() {
        assert_eq!(compute_net_fee(Decimal::MAX, Decimal::ZERO, Decimal::ZERO, Decimal::ONE), None);
        assert_eq!(compute_net_fee(Decimal::MIN, Decimal::ONE, Decimal::ZERO, Decimal::ZERO), None);

        // Fits in a decimal but not with two fractional digits
        let huge = dec("500000000000000000000000000");
        assert_eq!(compute_net_fee(huge, Decimal::ZERO, huge, Decimal::ZERO), None);
        assert_eq!(with_currency_scale(dec("79228162514264337593543950335")), None);
        assert_eq!(with_currency_scale(dec("12.345")), Some(dec("12.345")));
    }

    #[test]
    fn test_fee_amounts_overflow_has_no_net_fee() {
        let mut raw = RawClaimRecord::new();
        raw.insert("Provider Fees".into(), "$79228162514264337593543950335".into());
        raw.insert("Allowed Fees".into(), "$0.00".into());
        raw.insert("Member Coinsurance".into(), "$0.00".into());
        raw.insert("Member Copay".into(), "$1.00".into());

        let fees = FeeAmounts::from_record(0, &normalize_record(raw)).unwrap();
        assert!(fees.provider_fees.is_some());
        assert_eq!(fees.net_fee(), None);
    }

    #[test]
    fn test_fee_amounts_from_record() {
        let mut raw = RawClaimRecord::new();
        raw.insert("Provider Fees".into(), "$150.00".into());
        raw.insert("Allowed Fees".into(), "$120.00".into());
        raw.insert("Member Coinsurance".into(), "$15.00".into());
        raw.insert("Member Copay".into(), "$7.50".into());

        let fees = FeeAmounts::from_record(0, &normalize_record(raw)).unwrap();
        assert_eq!(fees.net_fee(), Some(dec("52.50")));
        assert_eq!(fees.get(ClaimField::MemberCopay).unwrap().raw, "$7.50");
    }

    #[test]
    fn test_missing_currency_is_deferred() {
        let mut raw = RawClaimRecord::new();
        raw.insert("Provider Fees".into(), "$150.00".into());

        let fees = FeeAmounts::from_record(0, &normalize_record(raw)).unwrap();
        assert!(fees.provider_fees.is_some());
        assert!(fees.allowed_fees.is_none());
        assert_eq!(fees.net_fee(), None);
    }

    #[test]
    fn test_malformed_currency_names_record_and_field() {
        let mut raw = RawClaimRecord::new();
        raw.insert("Member Copay".into(), "$seven".into());

        match FeeAmounts::from_record(3, &normalize_record(raw)) {
            Err(ClaimsError::MalformedCurrency { record_index, field, value, .. }) => {
                assert_eq!(record_index, 3);
                assert_eq!(field, "member_copay");
                assert_eq!(value, "$seven");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_integer_currency_is_malformed() {
        let mut raw = RawClaimRecord::new();
        raw.insert("Allowed Fees".into(), RawValue::Integer(120));

        assert!(matches!(
            FeeAmounts::from_record(0, &normalize_record(raw)),
            Err(ClaimsError::MalformedCurrency { .. })
        ));
    }
}
