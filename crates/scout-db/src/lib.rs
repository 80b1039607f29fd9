//! LeadScout Database Layer
//!
//! Reference `SQLite` lead store behind the runner's sink contract. Uses
//! `SQLx` with embedded migrations.
//!
//! # Architecture
//!
//! - **Leads** ([`leads`]): deduplicated records with idempotent fill-if-empty upserts
//! - **Run history** ([`job_runs`]): one row per orchestrator run plus one per source
//! - **Migrations**: SQL migrations are embedded and versioned using `SQLx`
//! - **Connection Pooling**: configurable pool size (default: 5 connections)
//!
//! # Example
//!
//! ```ignore
//! use scout_db::{leads, Database};
//!
//! let db = Database::new("leads.db").await?;
//! db.run_migrations().await?;
//! let stats = leads::upsert_records(db.pool(), &records, "texas-bar").await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod connection;
pub mod error;
pub mod job_runs;
pub mod leads;
pub mod migrations;

// Re-export commonly used types
pub use error::{DatabaseError, Result};

use connection::DEFAULT_MAX_CONNECTIONS;
use scout_core::DatabaseConfig;
use sqlx::{Pool, Sqlite};
use std::path::Path;

/// High-level database handle.
///
/// Cheap to clone: the underlying pool is reference-counted.
#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open (or create) the database at `path`; `:memory:` for an in-memory store.
    ///
    /// # Errors
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_max_connections(path, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Open with an explicit pool size.
    ///
    /// # Errors
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn with_max_connections(path: impl AsRef<Path>, max_connections: u32) -> Result<Self> {
        let pool = connection::open_pool(path, max_connections).await?;
        Ok(Self { pool })
    }

    /// Open the configured database, creating its parent directory, and migrate it.
    ///
    /// # Errors
    /// Returns `DatabaseError` if the directory cannot be created, the
    /// database cannot be opened, or a migration fails.
    pub async fn open_configured(config: &DatabaseConfig, path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let db = Self::with_max_connections(path, config.max_connections).await?;
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run all pending database migrations.
    ///
    /// # Errors
    /// Returns `DatabaseError::Migration` if any migration fails.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Get the current schema version.
    ///
    /// # Errors
    /// Returns `DatabaseError` if the version cannot be queried.
    pub async fn get_schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(&self.pool).await
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Close the database connection gracefully.
    pub async fn close(self) {
        self.pool.close().await;
        tracing::info!("database pool closed");
    }
}
