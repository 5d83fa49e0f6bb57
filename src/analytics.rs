/*!
 * Analytics over stored claims
 *
 * Summary statistics and simple lookups for claims already in a store. The
 * provider revenue ranking lives in `ranking`.
 */

use std::collections::{BTreeMap, HashSet};

use rust_decimal::Decimal;

use crate::constants::CURRENCY_SCALE;
use crate::currency::with_currency_scale;
use crate::data_types::{Npi, ValidatedClaim};
use crate::{ClaimsError, Result};

/// Analytics engine over a slice of claims
pub struct ClaimAnalytics<'a> {
    claims: &'a [ValidatedClaim],
}

impl<'a> ClaimAnalytics<'a> {
    /// Create a new analytics engine over claims
    pub fn new(claims: &'a [ValidatedClaim]) -> Self {
        Self { claims }
    }

    /// Get basic statistics about the claims
    ///
    /// Fails when the summed net fee is out of range for a currency value.
    pub fn stats(&self) -> Result<ClaimStats> {
        let batches = self.claims.iter()
            .map(|c| c.unique_claim_id.as_str())
            .collect::<HashSet<_>>()
            .len();

        let providers = self.claims.iter()
            .map(|c| c.provider_npi.as_str())
            .collect::<HashSet<_>>()
            .len();

        let total_net_fee = self
            .claims
            .iter()
            .try_fold(Decimal::ZERO, |total, c| total.checked_add(c.net_fee))
            .and_then(with_currency_scale)
            .ok_or_else(|| ClaimsError::Custom {
                message: "Total net fee across stored claims is out of range for a currency value".to_string(),
                suggestion: Some("Rank providers individually to find the claims with oversized fees".to_string()),
            })?;

        Ok(ClaimStats {
            total_claims: self.claims.len(),
            batches,
            providers,
            total_net_fee,
        })
    }

    /// Claims billed by one provider
    pub fn claims_for_provider(&self, npi: &Npi) -> Vec<&'a ValidatedClaim> {
        self.claims.iter().filter(|c| &c.provider_npi == npi).collect()
    }

    /// Claims ingested together under one batch identifier
    pub fn claims_in_batch(&self, batch_id: &str) -> Vec<&'a ValidatedClaim> {
        self.claims.iter().filter(|c| c.unique_claim_id == batch_id).collect()
    }

    /// Claim count per submitted procedure code
    pub fn claim_count_by_procedure(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for claim in self.claims {
            *counts.entry(claim.submitted_procedure.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Get top N procedure codes by claim count
    pub fn top_procedures(&self, limit: usize) -> Vec<(String, usize)> {
        let mut counts: Vec<_> = self.claim_count_by_procedure().into_iter().collect();
        // stable sort keeps code order among equal counts
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts.truncate(limit);
        counts
    }
}

/// Statistics about stored claims
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimStats {
    pub total_claims: usize,
    pub batches: usize,
    pub providers: usize,
    pub total_net_fee: Decimal,
}

impl ClaimStats {
    /// Print formatted statistics
    pub fn print_summary(&self) {
        println!("=== Claim Store Statistics ===");
        println!("Total Claims: {}", self.total_claims);
        println!("Batches: {}", self.batches);
        println!("Providers: {}", self.providers);
        println!("Total Net Fee: {}", self.total_net_fee);

        if let Some(average) = self.average_net_fee() {
            println!("Average Net Fee per Claim: {}", average);
        }
    }

    /// Mean net fee per claim rounded to cents, `None` when there are no claims
    pub fn average_net_fee(&self) -> Option<Decimal> {
        let count = Decimal::from(u64::try_from(self.total_claims).ok()?);
        let average = self.total_net_fee.checked_div(count)?.round_dp(CURRENCY_SCALE);
        with_currency_scale(average)
    }
}
