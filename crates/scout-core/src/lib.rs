//! LeadScout Core - Foundation crate for the lead harvesting workspace.
//!
//! This crate provides shared types, error handling, configuration management,
//! logging setup and the metrics recorder that all other LeadScout crates
//! depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes (`SourceId`, `Locality`, `Timestamp`) and run summaries
//! - [`record`] - The normalized directory `Record` and its fill-if-empty merge policy
//! - [`metrics`] - Injected per-source counters and job history
//! - [`logging`] - `tracing-subscriber` initialization
//!
//! # Example
//!
//! ```rust
//! use scout_core::{AppConfig, ContactField, Record};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! assert_eq!(config.runner.concurrency, 1);
//!
//! let mut lead = Record::named("Jane", "Doe");
//! let found = Record::named("Jane", "Doe").with_contact(ContactField::Phone, "555-0100");
//! let filled = lead.fill_if_empty(&found, &ContactField::ALL, "lso-ontario");
//! assert_eq!(filled, vec![ContactField::Phone]);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
#[allow(missing_docs)]
pub mod record;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, CrossRefConfig, DatabaseConfig, LoggingConfig, PaginationConfig, RunnerConfig,
    ThrottleConfig,
};
pub use error::{ConfigError, ConfigResult, CoreError, Result};
pub use metrics::{MetricsRecorder, SourceCounters};
pub use record::{ContactField, Record};
pub use types::{
    normalize_key_part, JobRunSummary, Locality, LocalityKey, SourceId, SourceRunStatus,
    SourceRunSummary, Timestamp, UpsertStats,
};
