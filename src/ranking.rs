/*!
 * Provider ranking by net revenue
 */

use std::collections::HashMap;

use rust_decimal::Decimal;
use tracing::debug;

use crate::constants::DEFAULT_RANKING_LIMIT;
use crate::currency::with_currency_scale;
use crate::data_types::{ProviderRankingEntry, ValidatedClaim};
use crate::store::ClaimStore;
use crate::{ClaimsError, Result};

/// Resolve a caller-supplied limit; absent or non-positive means the default
pub fn effective_limit(limit: Option<i64>, default_limit: usize) -> usize {
    match limit {
        Some(n) if n > 0 => usize::try_from(n).unwrap_or(usize::MAX),
        _ => default_limit,
    }
}

/// Rank providers by summed net fee, highest first
///
/// Ties are broken by provider NPI ascending so the order is stable.
pub fn rank_providers(store: &dyn ClaimStore, limit: Option<i64>) -> Result<Vec<ProviderRankingEntry>> {
    ProviderRanking::new(store).top(limit)
}

/// Ranking aggregator bound to a store
pub struct ProviderRanking<'a> {
    store: &'a dyn ClaimStore,
    default_limit: usize,
}

impl<'a> ProviderRanking<'a> {
    pub fn new(store: &'a dyn ClaimStore) -> Self {
        Self {
            store,
            default_limit: DEFAULT_RANKING_LIMIT,
        }
    }

    /// Override the limit used when the caller gives none
    pub fn with_default_limit(mut self, limit: usize) -> Self {
        if limit > 0 {
            self.default_limit = limit;
        }
        self
    }

    /// Up to `limit` providers by summed net fee
    pub fn top(&self, limit: Option<i64>) -> Result<Vec<ProviderRankingEntry>> {
        let limit = effective_limit(limit, self.default_limit);
        let ranking = self.store.sum_net_fee_by_provider(limit)?;
        debug!(limit, providers = ranking.len(), "provider ranking computed");
        Ok(ranking)
    }
}

/// Group claims by provider, sum net fees, sort descending, truncate
///
/// The grouped-sum-and-sort query the stores answer `sum_net_fee_by_provider`
/// with. Fails with a store error when a provider's total is too large to
/// represent as a currency value.
pub fn aggregate_net_fee_by_provider<'a, I>(claims: I, limit: usize) -> Result<Vec<ProviderRankingEntry>>
where
    I: IntoIterator<Item = &'a ValidatedClaim>,
{
    let mut totals: HashMap<&str, Decimal> = HashMap::new();
    for claim in claims {
        let npi = claim.provider_npi.as_str();
        let total = totals.entry(npi).or_insert(Decimal::ZERO);
        *total = total
            .checked_add(claim.net_fee)
            .ok_or_else(|| total_out_of_range(npi))?;
    }

    let mut ranking = totals
        .into_iter()
        .map(|(npi, total)| -> Result<ProviderRankingEntry> {
            Ok(ProviderRankingEntry {
                provider_npi: npi.to_string(),
                total_net_fee: with_currency_scale(total).ok_or_else(|| total_out_of_range(npi))?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    ranking.sort_by(|a, b| {
        b.total_net_fee
            .cmp(&a.total_net_fee)
            .then_with(|| a.provider_npi.cmp(&b.provider_npi))
    });
    ranking.truncate(limit);
    Ok(ranking)
}

fn total_out_of_range(npi: &str) -> ClaimsError {
    ClaimsError::store(format!(
        "Net fee total for provider {} is out of range for a currency value",
        npi
    ))
}
