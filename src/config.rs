/*!
 * Configuration support for the claims library
 *
 * Provides runtime configuration options for the ingestion pipeline, the
 * store file used by the CLI, and output defaults.
 */

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

/// Configuration for claim ingestion and reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimsConfig {
    /// JSON file backing the claim store (None = in-memory only)
    #[serde(default)]
    pub store_path: Option<PathBuf>,

    /// Number of providers returned by the ranking when no limit is given
    #[serde(default = "default_ranking_limit")]
    pub default_ranking_limit: usize,

    /// What to do with fields that match no canonical claim field
    #[serde(default)]
    pub unknown_fields: UnknownFieldPolicy,

    /// Whether to validate batch records in parallel
    #[serde(default = "default_parallel_validation")]
    pub parallel_validation: bool,

    /// Default export format
    #[serde(default)]
    pub default_export_format: crate::ExportFormat,

    /// Whether to pretty-print JSON output
    #[serde(default = "default_pretty_json")]
    pub pretty_json: bool,

    /// Log filter used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Handling of fields that normalize to no canonical claim field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnknownFieldPolicy {
    /// Drop them silently
    #[default]
    Ignore,
    /// Report each one as a violation, rejecting the batch
    Reject,
}

impl Default for ClaimsConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            default_ranking_limit: default_ranking_limit(),
            unknown_fields: UnknownFieldPolicy::Ignore,
            parallel_validation: default_parallel_validation(),
            default_export_format: crate::ExportFormat::Json,
            pretty_json: default_pretty_json(),
            log_level: default_log_level(),
        }
    }
}

// Default value functions for serde
fn default_ranking_limit() -> usize {
    crate::constants::DEFAULT_RANKING_LIMIT
}

fn default_parallel_validation() -> bool {
    true
}

fn default_pretty_json() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ClaimsConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    ///
    /// Supported environment variables:
    /// - `CLAIMS_STORE_PATH`: path to the store file
    /// - `CLAIMS_DEFAULT_RANKING_LIMIT`: number
    /// - `CLAIMS_UNKNOWN_FIELDS`: "ignore" or "reject"
    /// - `CLAIMS_PARALLEL_VALIDATION`: "true" or "false"
    /// - `CLAIMS_DEFAULT_EXPORT_FORMAT`: "json", "jsonlines", "csv", or "sql"
    /// - `CLAIMS_PRETTY_JSON`: "true" or "false"
    /// - `CLAIMS_LOG_LEVEL`: tracing filter, e.g. "debug"
    pub fn from_env() -> crate::Result<Self> {
        Self::layered(None)
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(crate::ClaimsError::file_not_found_with_suggestion(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| crate::ClaimsError::Configuration {
                message: format!("Failed to parse config file: {}", e),
                suggestion: Some("Check that the file is valid TOML format".to_string()),
            })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| crate::ClaimsError::Configuration {
                message: format!("Failed to serialize config: {}", e),
                suggestion: None,
            })?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/dental-claims/config.toml` on Unix-like systems
    /// or `%APPDATA%\dental-claims\config.toml` on Windows
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "dental-claims")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load configuration from a file (if present) overlaid with environment
    ///
    /// Priority order:
    /// 1. Environment variables
    /// 2. The given file, or the default config file
    /// 3. Built-in defaults
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(crate::ClaimsError::file_not_found_with_suggestion(path.to_path_buf()));
                }
                Self::layered(Some(path.to_path_buf()))
            }
            None => Self::layered(Self::default_config_path()),
        }
    }

    fn layered(file: Option<PathBuf>) -> crate::Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(config::File::from(file).required(false));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix("CLAIMS").try_parsing(true))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

/// Builder for customizing configuration
pub struct ConfigBuilder {
    config: ClaimsConfig,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    /// Start building a new configuration
    pub fn new() -> Self {
        Self {
            config: ClaimsConfig::default(),
        }
    }

    /// Set the store file
    pub fn store_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.store_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the default ranking limit
    pub fn default_ranking_limit(mut self, limit: usize) -> Self {
        self.config.default_ranking_limit = limit;
        self
    }

    /// Set the unknown field policy
    pub fn unknown_fields(mut self, policy: UnknownFieldPolicy) -> Self {
        self.config.unknown_fields = policy;
        self
    }

    /// Set parallel validation
    pub fn parallel_validation(mut self, enabled: bool) -> Self {
        self.config.parallel_validation = enabled;
        self
    }

    /// Set the default export format
    pub fn default_export_format(mut self, format: crate::ExportFormat) -> Self {
        self.config.default_export_format = format;
        self
    }

    /// Set JSON pretty printing
    pub fn pretty_json(mut self, pretty: bool) -> Self {
        self.config.pretty_json = pretty;
        self
    }

    /// Set the log filter
    pub fn log_level<S: Into<String>>(mut self, level: S) -> Self {
        self.config.log_level = level.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> ClaimsConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ClaimsConfig::default();
        assert_eq!(config.default_ranking_limit, 10);
        assert_eq!(config.unknown_fields, UnknownFieldPolicy::Ignore);
        assert!(config.parallel_validation);
        assert!(config.store_path.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .store_path("claims.json")
            .default_ranking_limit(5)
            .unknown_fields(UnknownFieldPolicy::Reject)
            .parallel_validation(false)
            .pretty_json(false)
            .build();

        assert_eq!(config.store_path, Some(PathBuf::from("claims.json")));
        assert_eq!(config.default_ranking_limit, 5);
        assert_eq!(config.unknown_fields, UnknownFieldPolicy::Reject);
        assert!(!config.parallel_validation);
        assert!(!config.pretty_json);
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = ConfigBuilder::new()
            .unknown_fields(UnknownFieldPolicy::Reject)
            .default_export_format(crate::ExportFormat::Csv)
            .build();
        config.save(&path).unwrap();

        assert_eq!(ClaimsConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "unknown_fields = \"reject\"\n").unwrap();

        let config = ClaimsConfig::from_file(&path).unwrap();
        assert_eq!(config.unknown_fields, UnknownFieldPolicy::Reject);
        assert_eq!(config.default_ranking_limit, 10);
        assert_eq!(config.log_level, "info");
    }
}
