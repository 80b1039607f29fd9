//! Configuration management for LeadScout.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides. Every section is `#[serde(default)]`, so a
//! partial file only needs to name the values it changes.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration.
///
/// This is loaded from `~/.config/leadscout/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Request pacing and block backoff
    pub throttle: ThrottleConfig,
    /// Locality/page loop limits
    pub pagination: PaginationConfig,
    /// Bulk orchestrator settings
    pub runner: RunnerConfig,
    /// Cross-reference matching settings
    pub crossref: CrossRefConfig,
    /// Lead database settings
    pub database: DatabaseConfig,
    /// Log output settings
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, falling back to defaults if
    /// the file does not exist.
    pub fn load_from(config_path: &Path) -> ConfigResult<Self> {
        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(config_path)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `LEADSCOUT_CONCURRENCY`: Override the number of sources run at once
    /// - `LEADSCOUT_TEST_MODE`: Use the short per-source timeout (true/false)
    /// - `LEADSCOUT_DATABASE_PATH`: Override the lead database location
    /// - `LEADSCOUT_LOG`: Override the log filter directive
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `LEADSCOUT_*` environment overrides in place.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("LEADSCOUT_CONCURRENCY") {
            if let Ok(concurrency) = val.parse() {
                self.runner.concurrency = concurrency;
                tracing::debug!("Override runner.concurrency from env: {}", concurrency);
            }
        }

        if let Ok(val) = std::env::var("LEADSCOUT_TEST_MODE") {
            if let Ok(test_mode) = val.parse() {
                self.runner.test_mode = test_mode;
                tracing::debug!("Override runner.test_mode from env: {}", test_mode);
            }
        }

        if let Ok(val) = std::env::var("LEADSCOUT_DATABASE_PATH") {
            tracing::debug!("Override database.path from env: {}", val);
            self.database.path = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("LEADSCOUT_LOG") {
            tracing::debug!("Override logging.filter from env: {}", val);
            self.logging.filter = val;
        }
    }

    /// Reject values that would stall or misconfigure a run.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.runner.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "runner.concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.throttle.min_delay_ms > self.throttle.max_delay_ms {
            return Err(ConfigError::InvalidValue {
                field: "throttle.min_delay_ms".to_string(),
                reason: "must not exceed throttle.max_delay_ms".to_string(),
            });
        }
        if self.throttle.base_backoff_ms > self.throttle.max_backoff_ms {
            return Err(ConfigError::InvalidValue {
                field: "throttle.base_backoff_ms".to_string(),
                reason: "must not exceed throttle.max_backoff_ms".to_string(),
            });
        }
        if self.throttle.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "throttle.backoff_multiplier".to_string(),
                reason: "must be at least 1.0".to_string(),
            });
        }
        for (field, value) in [
            ("crossref.last_name_threshold", self.crossref.last_name_threshold),
            ("crossref.first_name_threshold", self.crossref.first_name_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: "must be between 0.0 and 1.0".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/leadscout/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "leadscout", "leadscout").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/leadscout`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "leadscout", "leadscout").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }

    /// Resolved lead database path: the configured one, or `leads.db` in the
    /// data directory.
    pub fn database_path(&self) -> ConfigResult<PathBuf> {
        match &self.database.path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("leads.db")),
        }
    }
}

/// Request pacing and block backoff settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Lower bound of the randomized delay between requests
    pub min_delay_ms: u64,
    /// Upper bound of the randomized delay between requests
    pub max_delay_ms: u64,
    /// Backoff applied after the first block
    pub base_backoff_ms: u64,
    /// Backoff ceiling
    pub max_backoff_ms: u64,
    /// Growth factor per consecutive block
    pub backoff_multiplier: f64,
    /// Extra growth factor applied to HTTP 429 responses
    pub rate_limit_multiplier: f64,
    /// Give up once this many consecutive failures have been seen
    pub max_consecutive_failures: u32,
    /// Rotate user agent after this many consecutive blocks (0 = never)
    pub rotate_identity_after: u32,
    /// Custom user-agent pool; empty uses the built-in desktop set
    pub user_agents: Vec<String>,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 1_000,
            max_delay_ms: 3_000,
            base_backoff_ms: 2_000,
            max_backoff_ms: 120_000,
            backoff_multiplier: 2.0,
            rate_limit_multiplier: 3.0,
            max_consecutive_failures: 5,
            rotate_identity_after: 2,
            user_agents: Vec::new(),
        }
    }
}

/// Locality/page loop limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Consecutive empty pages tolerated after page 1
    pub empty_page_threshold: u32,
    /// Default page cap per locality (`None` = unbounded)
    pub max_pages_per_locality: Option<u32>,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            empty_page_threshold: 2,
            max_pages_per_locality: None,
        }
    }
}

/// Bulk orchestrator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Per-source deadline in seconds
    pub source_timeout_secs: u64,
    /// Per-source deadline in seconds when `test_mode` is on
    pub test_timeout_secs: u64,
    /// Use the short deadline
    pub test_mode: bool,
    /// Number of sources run at once
    pub concurrency: usize,
    /// Source ids never selected for bulk runs (directory-only sources)
    pub excluded_sources: Vec<String>,
    /// Records per sink upsert call
    pub upsert_batch_size: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            source_timeout_secs: 30 * 60,
            test_timeout_secs: 2 * 60,
            test_mode: false,
            concurrency: 1,
            excluded_sources: Vec::new(),
            upsert_batch_size: 500,
        }
    }
}

/// Cross-reference matching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossRefConfig {
    /// Minimum last-name similarity (also the minimum combined score)
    pub last_name_threshold: f64,
    /// Minimum first-name similarity
    pub first_name_threshold: f64,
    /// Weight of last-name similarity in the combined score
    pub last_name_weight: f64,
    /// Weight of first-name similarity in the combined score
    pub first_name_weight: f64,
    /// Page cap for each locality lookup
    pub max_pages_per_locality: u32,
}

impl Default for CrossRefConfig {
    fn default() -> Self {
        Self {
            last_name_threshold: 0.8,
            first_name_threshold: 0.6,
            last_name_weight: 0.6,
            first_name_weight: 0.4,
            max_pages_per_locality: 10,
        }
    }
}

/// Lead database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file; defaults to `leads.db` in the data directory
    pub path: Option<PathBuf>,
    /// Connection pool size
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: 5,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    /// Colored output
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,leadscout=debug".to_string(),
            ansi: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.runner.concurrency, 1);
        assert_eq!(config.pagination.empty_page_threshold, 2);
        assert!((config.crossref.last_name_threshold - 0.8).abs() < f64::EPSILON);
        assert!((config.crossref.first_name_threshold - 0.6).abs() < f64::EPSILON);
        assert!(!config.runner.test_mode);
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[throttle]"));
        assert!(toml_str.contains("[runner]"));
        assert!(toml_str.contains("[crossref]"));

        let parsed: AppConfig = toml::from_str(&toml_str).expect("parse serialized config");
        assert_eq!(parsed.runner.source_timeout_secs, config.runner.source_timeout_secs);
    }

    #[test]
    fn test_config_load_from_file() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("config.toml");

        let mut config = AppConfig::default();
        config.runner.concurrency = 3;
        config.runner.excluded_sources = vec!["lso-ontario".to_string()];

        let contents = toml::to_string_pretty(&config).expect("serialize config");
        fs::write(&config_path, contents).expect("write config file");

        let loaded = AppConfig::load_from(&config_path).expect("load config");
        assert_eq!(loaded.runner.concurrency, 3);
        assert_eq!(loaded.runner.excluded_sources, vec!["lso-ontario"]);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let tmp = TempDir::new().expect("create temp dir");
        let loaded = AppConfig::load_from(&tmp.path().join("absent.toml")).expect("load");
        assert_eq!(loaded.runner.concurrency, 1);
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("LEADSCOUT_CONCURRENCY", "4");
        std::env::set_var("LEADSCOUT_TEST_MODE", "true");
        std::env::set_var("LEADSCOUT_DATABASE_PATH", "/tmp/leads-test.db");

        let mut config = AppConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.runner.concurrency, 4);
        assert!(config.runner.test_mode);
        assert_eq!(
            config.database_path().expect("database path"),
            PathBuf::from("/tmp/leads-test.db")
        );

        std::env::remove_var("LEADSCOUT_CONCURRENCY");
        std::env::remove_var("LEADSCOUT_TEST_MODE");
        std::env::remove_var("LEADSCOUT_DATABASE_PATH");
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[runner]
test_mode = true

[crossref]
last_name_threshold = 0.9
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert!(config.runner.test_mode);
        assert!((config.crossref.last_name_threshold - 0.9).abs() < f64::EPSILON);
        // These should be defaults
        assert_eq!(config.runner.concurrency, 1);
        assert_eq!(config.throttle.max_consecutive_failures, 5);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = AppConfig::default();
        config.runner.concurrency = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));

        let mut config = AppConfig::default();
        config.throttle.min_delay_ms = 10_000;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.crossref.first_name_threshold = 1.5;
        assert!(config.validate().is_err());
    }
}
