/*!
 * Claim batch processing
 *
 * Runs a raw batch through normalization, currency parsing, net fee
 * derivation, and validation, then commits it to the store as one unit.
 * A batch is either persisted whole or rejected whole.
 */

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ClaimsConfig;
use crate::data_types::{NormalizedClaimRecord, RawClaimRecord, RecordViolations, ValidatedClaim};
use crate::normalize::normalize_batch;
use crate::store::ClaimStore;
use crate::validation::{ClaimDraft, ClaimValidator};
use crate::{ClaimsError, Result};

/// Source of batch identifiers
pub trait BatchIdGenerator: Send + Sync {
    fn new_batch_id(&self) -> String;
}

/// Random UUID v4 batch identifiers
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidBatchIdGenerator;

impl BatchIdGenerator for UuidBatchIdGenerator {
    fn new_batch_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Batch ingestion pipeline bound to a store
pub struct ClaimBatchProcessor<'a> {
    store: &'a dyn ClaimStore,
    id_generator: Box<dyn BatchIdGenerator + 'a>,
    validator: ClaimValidator,
    parallel: bool,
}

impl<'a> ClaimBatchProcessor<'a> {
    /// Create a processor with UUID batch ids and default validation
    pub fn new(store: &'a dyn ClaimStore) -> Self {
        Self {
            store,
            id_generator: Box::new(UuidBatchIdGenerator),
            validator: ClaimValidator::new(),
            parallel: cfg!(feature = "parallel"),
        }
    }

    /// Create a processor configured from `config`
    pub fn from_config(store: &'a dyn ClaimStore, config: &ClaimsConfig) -> Self {
        Self::new(store)
            .with_validator(ClaimValidator::new().with_unknown_field_policy(config.unknown_fields))
            .with_parallel(config.parallel_validation)
    }

    /// Use a custom batch id source
    pub fn with_id_generator<G: BatchIdGenerator + 'a>(mut self, generator: G) -> Self {
        self.id_generator = Box::new(generator);
        self
    }

    pub fn with_validator(mut self, validator: ClaimValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Enable or disable parallel per-record work
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel && cfg!(feature = "parallel");
        self
    }

    /// Ingest a raw batch
    ///
    /// Returns the persisted claims in input order. Fails with
    /// `MalformedCurrency` before anything is validated, or with `Validation`
    /// carrying every record's violations; in both cases nothing is stored.
    /// An empty batch returns immediately without touching the store.
    pub fn process_batch(&self, records: Vec<RawClaimRecord>) -> Result<Vec<ValidatedClaim>> {
        if records.is_empty() {
            debug!("empty claim batch, nothing to ingest");
            return Ok(Vec::new());
        }
        let record_count = records.len();

        let normalized = normalize_batch(records);
        let drafts = self.prepare_drafts(normalized)?;

        let batch_id = self.id_generator.new_batch_id();
        let outcomes = self.validate_drafts(&drafts, &batch_id);

        let mut claims = Vec::with_capacity(record_count);
        let mut failures = Vec::new();
        for (draft, outcome) in drafts.iter().zip(outcomes) {
            match outcome {
                Ok(claim) => claims.push(claim),
                Err(violations) => failures.push(RecordViolations {
                    record_index: draft.record_index,
                    violations,
                }),
            }
        }

        if !failures.is_empty() {
            warn!(
                batch_id = %batch_id,
                records = record_count,
                rejected = failures.len(),
                "claim batch rejected"
            );
            return Err(ClaimsError::validation_failed(failures));
        }

        let persisted = self.store.insert_batch(claims)?;
        info!(batch_id = %batch_id, claims = persisted.len(), "claim batch ingested");
        Ok(persisted)
    }

    /// Parse currency fields for every record; the first malformed value in
    /// input order aborts the batch
    fn prepare_drafts(&self, normalized: Vec<NormalizedClaimRecord>) -> Result<Vec<ClaimDraft>> {
        let prepared: Vec<Result<ClaimDraft>> = if self.parallel {
            use rayon::prelude::*;
            normalized
                .into_par_iter()
                .enumerate()
                .map(|(index, record)| ClaimDraft::prepare(index, record))
                .collect()
        } else {
            normalized
                .into_iter()
                .enumerate()
                .map(|(index, record)| ClaimDraft::prepare(index, record))
                .collect()
        };

        prepared.into_iter().collect()
    }

    fn validate_drafts(
        &self,
        drafts: &[ClaimDraft],
        batch_id: &str,
    ) -> Vec<std::result::Result<ValidatedClaim, Vec<crate::data_types::Violation>>> {
        if self.parallel {
            use rayon::prelude::*;
            drafts
                .par_iter()
                .map(|draft| self.validator.validate(draft, batch_id))
                .collect()
        } else {
            drafts
                .iter()
                .map(|draft| self.validator.validate(draft, batch_id))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::{RawValue, ViolationKind};
    use crate::store::InMemoryClaimStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingIds(AtomicUsize);

    impl BatchIdGenerator for CountingIds {
        fn new_batch_id(&self) -> String {
            format!("batch-{}", self.0.fetch_add(1, Ordering::SeqCst))
        }
    }

    fn raw(procedure: &str, npi: i64) -> RawClaimRecord {
        let mut raw = RawClaimRecord::new();
        raw.insert("service_date".into(), "12/01/23 10:00".into());
        raw.insert("submitted_procedure".into(), procedure.into());
        raw.insert("quadrant".into(), "UL".into());
        raw.insert("plan_group_number".into(), "P12345".into());
        raw.insert("subscriber_number".into(), RawValue::Integer(56789));
        raw.insert("provider_npi".into(), npi.into());
        raw.insert("provider_fees".into(), "$100.00".into());
        raw.insert("allowed_fees".into(), "$80.00".into());
        raw.insert("member_coinsurance".into(), "$10.00".into());
        raw.insert("member_copay".into(), "$5.00".into());
        raw
    }

    #[test]
    fn test_batch_shares_one_id() {
        let store = InMemoryClaimStore::new();
        let processor = ClaimBatchProcessor::new(&store).with_id_generator(CountingIds(AtomicUsize::new(0)));

        let first = processor.process_batch(vec![raw("D1", 1234567890), raw("D2", 1234567891)]).unwrap();
        let second = processor.process_batch(vec![raw("D3", 1234567890)]).unwrap();

        assert!(first.iter().all(|c| c.unique_claim_id == "batch-0"));
        assert_eq!(second[0].unique_claim_id, "batch-1");
        assert_eq!(first.iter().map(|c| c.submitted_procedure.as_str()).collect::<Vec<_>>(), vec!["D1", "D2"]);
    }

    #[test]
    fn test_empty_batch_uses_no_id() {
        let store = InMemoryClaimStore::new();
        let ids = CountingIds(AtomicUsize::new(0));
        let processor = ClaimBatchProcessor::new(&store).with_id_generator(ids);

        assert!(processor.process_batch(Vec::new()).unwrap().is_empty());
        let claims = processor.process_batch(vec![raw("D1", 1234567890)]).unwrap();
        assert_eq!(claims[0].unique_claim_id, "batch-0");
    }

    #[test]
    fn test_one_bad_record_rejects_the_batch() {
        for parallel in [false, true] {
            let store = InMemoryClaimStore::new();
            let processor = ClaimBatchProcessor::new(&store).with_parallel(parallel);

            let err = processor
                .process_batch(vec![raw("D1", 1234567890), raw("F1", 123456789), raw("D3", 1234567890)])
                .unwrap_err();

            let failures = err.violations().unwrap();
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].record_index, 1);
            let kinds: Vec<_> = failures[0].violations.iter().map(|v| v.kind).collect();
            assert_eq!(kinds, vec![ViolationKind::InvalidProcedureCode, ViolationKind::InvalidProviderNpi]);
            assert!(store.is_empty().unwrap());
        }
    }

    #[test]
    fn test_malformed_currency_reports_first_record() {
        let store = InMemoryClaimStore::new();
        let processor = ClaimBatchProcessor::new(&store).with_parallel(true);

        let mut bad_one = raw("D1", 1234567890);
        bad_one.insert("member_copay".into(), "$five".into());
        let mut bad_two = raw("D2", 1234567890);
        bad_two.insert("allowed_fees".into(), "eighty".into());

        match processor.process_batch(vec![raw("D0", 1234567890), bad_one, bad_two]) {
            Err(ClaimsError::MalformedCurrency { record_index, field, .. }) => {
                assert_eq!(record_index, 1);
                assert_eq!(field, "member_copay");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(store.is_empty().unwrap());
    }
}
