//! `SQLite` connection pool setup.

use crate::error::{DatabaseError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;

/// Default pool size.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Open a connection pool on `path` (or `:memory:`), creating the file if needed.
///
/// In-memory databases are limited to a single connection, since every
/// `SQLite` connection to `:memory:` would otherwise see its own empty database.
///
/// # Errors
/// Returns `DatabaseError::Open` if the path is not valid UTF-8 or the
/// database cannot be opened.
pub async fn open_pool(path: impl AsRef<Path>, max_connections: u32) -> Result<Pool<Sqlite>> {
    let path_str = path.as_ref().to_str().ok_or_else(|| {
        DatabaseError::Open("invalid database path: not valid UTF-8".to_string())
    })?;
    let in_memory = path_str == ":memory:";

    let mut connect_options = SqliteConnectOptions::from_str(path_str)
        .map_err(|e| DatabaseError::Open(format!("invalid connection string: {e}")))?
        .foreign_keys(true)
        .create_if_missing(true);
    if !in_memory {
        connect_options = connect_options.journal_mode(SqliteJournalMode::Wal);
    }

    let max_connections = if in_memory { 1 } else { max_connections.max(1) };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(connect_options)
        .await
        .map_err(|e| DatabaseError::Open(format!("failed to open {path_str}: {e}")))?;

    tracing::info!(path = path_str, max_connections, "database pool created");

    Ok(pool)
}
