/*!
 * # Dental Claims Ingestion Library
 *
 * A Rust library for ingesting batches of dental insurance claims and
 * reporting on provider revenue.
 *
 * ## Features
 *
 * - 🧹 **Field Normalization**: Free-form field labels like `"Plan Group #"` map to canonical names
 * - 💵 **Exact Currency**: `"$120.00"`-style strings parse to exact decimals, never floats
 * - 🛡️ **All-or-Nothing Batches**: Every record is validated before any is stored
 * - 📊 **Provider Ranking**: Top providers by summed net fee
 * - 💾 **Multiple Export Formats**: JSON, JSON Lines, CSV, and SQL
 * - ⚡ **Parallel Validation**: Per-record work runs on rayon with the `parallel` feature
 *
 * ## Quick Start
 *
 * ```no_run
 * use dental_claims::prelude::*;
 *
 * # fn main() -> Result<()> {
 * let store = InMemoryClaimStore::new();
 * let processor = ClaimBatchProcessor::new(&store);
 *
 * let batch = ClaimReader::new().load("claims.csv")?;
 * let claims = processor.process_batch(batch)?;
 * println!("Ingested {} claims", claims.len());
 *
 * for entry in rank_providers(&store, Some(10))? {
 *     println!("{} {}", entry.provider_npi, entry.total_net_fee);
 * }
 * # Ok(())
 * # }
 * ```
 *
 * ## Ingesting Claims
 *
 * A batch is a list of raw records keyed by whatever labels the submitter
 * used. Processing normalizes the labels, parses the four currency fields,
 * derives the net fee, validates every record, and only then commits the
 * whole batch under a single batch identifier.
 *
 * ```no_run
 * # use dental_claims::prelude::*;
 * # fn main() -> Result<()> {
 * let store = JsonFileClaimStore::open("claims.json")?;
 * let processor = ClaimBatchProcessor::new(&store);
 *
 * let batch = ClaimReader::new().parse_json(r#"[{
 *     "Service Date": "12/01/23 10:00",
 *     "Submitted Procedure": "D0120",
 *     "Plan Group #": "P12345",
 *     "Subscriber#": 56789,
 *     "Provider NPI": 2345678901,
 *     "Provider Fees": "$120.00",
 *     "Allowed Fees": "$80.00",
 *     "Member Coinsurance": "$10.00",
 *     "Member Copay": "$2.50"
 * }]"#)?;
 *
 * match processor.process_batch(batch) {
 *     Ok(claims) => println!("net fee {}", claims[0].net_fee),
 *     Err(e) => eprintln!("{}", e.user_message()),
 * }
 * # Ok(())
 * # }
 * ```
 *
 * ## Statistics and Export
 *
 * ```no_run
 * # use dental_claims::prelude::*;
 * # fn main() -> Result<()> {
 * # let store = JsonFileClaimStore::open("claims.json")?;
 * let claims = store.all_claims()?;
 * ClaimAnalytics::new(&claims).stats()?.print_summary();
 *
 * SqlExporter::new()
 *     .with_dialect(SqlDialect::SQLite)
 *     .export(&claims, std::path::Path::new("claims.sql"))?;
 * # Ok(())
 * # }
 * ```
 *
 * ## Configuration
 *
 * ```no_run
 * # use dental_claims::prelude::*;
 * # fn main() -> Result<()> {
 * // File (if present) overlaid with CLAIMS_* environment variables
 * let config = ClaimsConfig::load(None)?;
 *
 * // Or build your own
 * let config = ConfigBuilder::new()
 *     .store_path("claims.json")
 *     .unknown_fields(UnknownFieldPolicy::Reject)
 *     .default_ranking_limit(5)
 *     .build();
 * # Ok(())
 * # }
 * ```
 */

// Re-export error types from root
pub use error::{ClaimsError, Result, ErrorContext, ExportFormat};

// Public modules
pub mod data_types;
pub mod normalize;
pub mod currency;
pub mod schema;
pub mod validation;
pub mod processor;
pub mod store;
pub mod ranking;
pub mod reader;
pub mod error;
pub mod analytics;
pub mod export;
pub mod config;

/// Prelude module for convenient imports
///
/// Import everything you need with:
/// ```
/// use dental_claims::prelude::*;
/// ```
pub mod prelude {
    pub use crate::data_types::*;
    pub use crate::normalize::{normalize_field_name, normalize_record};
    pub use crate::processor::{ClaimBatchProcessor, BatchIdGenerator, UuidBatchIdGenerator};
    pub use crate::store::{ClaimStore, InMemoryClaimStore, JsonFileClaimStore};
    pub use crate::ranking::{rank_providers, ProviderRanking};
    pub use crate::reader::ClaimReader;
    pub use crate::schema::ClaimSchema;
    pub use crate::error::{ClaimsError, Result};
    pub use crate::analytics::{ClaimAnalytics, ClaimStats};
    pub use crate::export::{ClaimExporter, JsonExporter, CsvExporter, SqlExporter, SqlDialect};
    pub use crate::config::{ClaimsConfig, ConfigBuilder, UnknownFieldPolicy};
    pub use crate::ExportFormat;
}

/// Claim data constants
pub mod constants {
    /// Digits in a National Provider Identifier
    pub const NPI_LENGTH: usize = 10;

    /// Fractional digits kept on every currency amount
    pub const CURRENCY_SCALE: u32 = 2;

    /// Symbol stripped from currency strings before parsing
    pub const CURRENCY_SYMBOL: char = '$';

    /// Every dental procedure (CDT) code starts with this letter
    pub const PROCEDURE_CODE_PREFIX: char = 'D';

    /// Service date layout, e.g. `03/28/18 16:00`
    pub const SERVICE_DATE_FORMAT: &str = "%m/%d/%y %H:%M";

    /// Providers returned by the ranking when no limit is given
    pub const DEFAULT_RANKING_LIMIT: usize = 10;
}

/// Common recipes and utility functions
pub mod cookbook {
    use crate::prelude::*;
    use std::path::Path;

    /// Open the store named by the configuration
    ///
    /// A configured `store_path` gives a file-backed store; otherwise claims
    /// live in memory for the life of the process.
    pub fn open_store(config: &ClaimsConfig) -> Result<Box<dyn ClaimStore>> {
        match &config.store_path {
            Some(path) => Ok(Box::new(JsonFileClaimStore::open(path)?)),
            None => Ok(Box::new(InMemoryClaimStore::new())),
        }
    }

    /// Read a batch file and ingest it
    ///
    /// # Example
    /// ```no_run
    /// # use dental_claims::prelude::*;
    /// # use dental_claims::cookbook::ingest_file;
    /// # fn main() -> Result<()> {
    /// let config = ClaimsConfig::default();
    /// let store = InMemoryClaimStore::new();
    /// let claims = ingest_file("claims.json", &store, &config)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn ingest_file<P: AsRef<Path>>(
        path: P,
        store: &dyn ClaimStore,
        config: &ClaimsConfig,
    ) -> Result<Vec<ValidatedClaim>> {
        let batch = ClaimReader::new().load(path)?;
        ClaimBatchProcessor::from_config(store, config).process_batch(batch)
    }

    /// Top providers using the configured default limit
    pub fn top_providers(
        store: &dyn ClaimStore,
        config: &ClaimsConfig,
        limit: Option<i64>,
    ) -> Result<Vec<ProviderRankingEntry>> {
        ProviderRanking::new(store)
            .with_default_limit(config.default_ranking_limit)
            .top(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::{ClaimField, Npi};

    #[test]
    fn test_npi_validation() {
        assert!(Npi::new("1234567890".to_string()).is_ok());
        assert!(Npi::new("123".to_string()).is_err());
        assert!(Npi::new("12345678AB".to_string()).is_err());
    }

    #[test]
    fn test_claim_field_names() {
        assert_eq!(ClaimField::from_name("plan_group_number"), Some(ClaimField::PlanGroupNumber));
        assert_eq!(ClaimField::from_name("Plan Group #"), None);
        assert_eq!(ClaimField::ALL.len(), 10);
    }

    #[test]
    fn test_cookbook_in_memory_store() {
        let config = config::ClaimsConfig::default();
        let store = cookbook::open_store(&config).unwrap();
        assert!(store.is_empty().unwrap());
        assert!(cookbook::top_providers(store.as_ref(), &config, None).unwrap().is_empty());
    }
}
