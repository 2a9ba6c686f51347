//! Configuration management for stagecopy
//!
//! Configuration is layered: built-in defaults, then an optional YAML/TOML/JSON
//! file, then `STAGECOPY__*` environment variables. The result is validated
//! before it is handed to the engine.
//!
//! # Examples
//!
//! ```rust
//! use stagecopy_config::{Config, ConfigBuilder};
//!
//! let config = ConfigBuilder::new()
//!     .add_defaults()
//!     .add_source_file("stagecopy.yaml")
//!     .add_env_prefix("STAGECOPY")
//!     .build()
//!     .expect("Failed to load configuration");
//!
//! println!("Workers: {}", config.transfer.workers);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use serde::{Deserialize, Serialize};
use stagecopy_types::{Category, DrainPolicy, RetryPolicy, RunMode, WorkerCount};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod builder;
pub mod error;
pub mod loader;

pub use builder::ConfigBuilder;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

/// Main configuration structure for stagecopy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Worker pool and retry tuning
    pub transfer: TransferConfig,
    /// Destination roots per category, for test and production runs
    pub destinations: DestinationConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Worker pool and retry tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Number of concurrent workers
    pub workers: WorkerCount,
    /// Attempts per file before it is dead-lettered
    pub max_attempts: u32,
    /// Interval between completion checks, in milliseconds
    pub poll_interval_ms: u64,
    /// Criterion for declaring the batch drained
    pub drain_policy: DrainPolicy,
    /// Emit a progress line every this many successful copies
    pub progress_log_every: u64,
}

impl TransferConfig {
    /// Retry policy derived from `max_attempts`
    pub fn retry_policy(&self) -> ConfigResult<RetryPolicy> {
        RetryPolicy::new(self.max_attempts)
            .map_err(|message| ConfigError::invalid_value("transfer.max_attempts", message))
    }

    /// Completion check interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            workers: WorkerCount::default(),
            max_attempts: RetryPolicy::DEFAULT_MAX_ATTEMPTS,
            poll_interval_ms: 3_000,
            drain_policy: DrainPolicy::default(),
            progress_log_every: 500,
        }
    }
}

/// One destination root per category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRoots {
    /// Root for `NC Branches` files
    #[serde(default)]
    pub nc_branch: PathBuf,
    /// Root for `NC Agencies` files
    #[serde(default)]
    pub nc_agency: PathBuf,
    /// Root for `NM Agencies` files
    #[serde(default)]
    pub nm_agency: PathBuf,
    /// Root for `SRCN` files
    #[serde(default)]
    pub srcn: PathBuf,
    /// Root for `MBDOT` files
    #[serde(default)]
    pub mbdot: PathBuf,
}

impl CategoryRoots {
    /// Root configured for `category`; empty when unset
    pub fn get(&self, category: Category) -> &Path {
        match category {
            Category::NcBranch => &self.nc_branch,
            Category::NcAgency => &self.nc_agency,
            Category::NmAgency => &self.nm_agency,
            Category::Srcn => &self.srcn,
            Category::Mbdot => &self.mbdot,
        }
    }

    fn key(category: Category) -> &'static str {
        match category {
            Category::NcBranch => "nc_branch",
            Category::NcAgency => "nc_agency",
            Category::NmAgency => "nm_agency",
            Category::Srcn => "srcn",
            Category::Mbdot => "mbdot",
        }
    }
}

/// Destination roots for both run modes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// Roots used by `--test-run`
    pub test: CategoryRoots,
    /// Roots used by production runs; no defaults
    pub production: CategoryRoots,
}

impl DestinationConfig {
    /// Root set for `mode`
    pub fn roots(&self, mode: RunMode) -> &CategoryRoots {
        match mode {
            RunMode::Test => &self.test,
            RunMode::Production => &self.production,
        }
    }

    /// Root for `category` in `mode`, failing when it is not configured
    pub fn resolve(&self, category: Category, mode: RunMode) -> ConfigResult<&Path> {
        let root = self.roots(mode).get(category);
        if root.as_os_str().is_empty() {
            return Err(ConfigError::missing_required(format!(
                "destinations.{}.{}",
                mode,
                CategoryRoots::key(category)
            )));
        }
        Ok(root)
    }

    /// Fail unless every category has a root in `mode`
    pub fn ensure_complete(&self, mode: RunMode) -> ConfigResult<()> {
        Category::ALL
            .iter()
            .try_for_each(|category| self.resolve(*category, mode).map(|_| ()))
    }
}

impl Default for DestinationConfig {
    fn default() -> Self {
        let test_root = PathBuf::from("staging-test");
        Self {
            test: CategoryRoots {
                nc_branch: test_root.join("Branches"),
                nc_agency: test_root.join("NC Agencies"),
                nm_agency: test_root.join("NM Agencies"),
                srcn: test_root.join("SRCN"),
                mbdot: test_root.join("Branches").join("MBDOT"),
            },
            production: CategoryRoots::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Mirror console output to an hourly rolling file
    pub enable_file_logging: bool,
    /// Directory for rolling log files; platform data directory when unset
    pub log_dir: Option<PathBuf>,
    /// Enable JSON formatting
    pub json_format: bool,
}

impl LoggingConfig {
    /// Directory the rolling file appender writes into
    pub fn resolved_log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("stagecopy")
        })
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            enable_file_logging: true,
            log_dir: None,
            json_format: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_transfer_defaults() {
        let transfer = TransferConfig::default();
        assert_eq!(transfer.max_attempts, 3);
        assert_eq!(transfer.poll_interval(), Duration::from_secs(3));
        assert_eq!(transfer.progress_log_every, 500);
        assert_eq!(transfer.drain_policy, DrainPolicy::Settled);
        assert_eq!(transfer.retry_policy().unwrap().max_attempts(), 3);
    }

    #[test]
    fn test_zero_attempts_is_invalid() {
        let transfer = TransferConfig {
            max_attempts: 0,
            ..TransferConfig::default()
        };
        assert!(transfer.retry_policy().is_err());
    }

    #[rstest]
    #[case(Category::NcBranch, "Branches")]
    #[case(Category::NcAgency, "NC Agencies")]
    #[case(Category::NmAgency, "NM Agencies")]
    #[case(Category::Srcn, "SRCN")]
    #[case(Category::Mbdot, "MBDOT")]
    fn test_default_test_roots(#[case] category: Category, #[case] leaf: &str) {
        let destinations = DestinationConfig::default();
        let root = destinations.resolve(category, RunMode::Test).unwrap();
        assert!(root.ends_with(leaf));
    }

    #[test]
    fn test_production_roots_must_be_configured() {
        let destinations = DestinationConfig::default();
        let err = destinations
            .resolve(Category::Srcn, RunMode::Production)
            .unwrap_err();
        assert!(err.to_string().contains("destinations.production.srcn"));
        assert!(destinations.ensure_complete(RunMode::Production).is_err());
        assert!(destinations.ensure_complete(RunMode::Test).is_ok());
    }

    #[test]
    fn test_explicit_log_dir_wins() {
        let logging = LoggingConfig {
            log_dir: Some(PathBuf::from("/var/log/stagecopy")),
            ..LoggingConfig::default()
        };
        assert_eq!(logging.resolved_log_dir(), PathBuf::from("/var/log/stagecopy"));
        assert!(LoggingConfig::default()
            .resolved_log_dir()
            .ends_with("stagecopy"));
    }
}
