//! Database migration management.
//!
//! Embeds SQL migrations and provides functions to apply them automatically.
//! Uses `SQLx`'s built-in migration support with compile-time embedding.

use crate::error::{DatabaseError, Result};
use sqlx::{Pool, Sqlite};

/// Run all pending database migrations.
///
/// Applies every migration in `migrations/` not yet recorded in the
/// `_sqlx_migrations` table.
///
/// # Errors
/// Returns `DatabaseError::Migration` if any migration fails to execute.
pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<()> {
    tracing::info!("Running database migrations");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DatabaseError::Migration(format!("migration execution failed: {e}")))?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}

/// Get the current schema version.
///
/// Returns 0 if no migrations have been applied yet or if the migrations
/// table doesn't exist.
///
/// # Errors
/// Returns `DatabaseError` if the migrations table cannot be queried.
pub async fn get_schema_version(pool: &Pool<Sqlite>) -> Result<i64> {
    let table_exists = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?
        > 0;

    if !table_exists {
        return Ok(0);
    }

    let version =
        sqlx::query_scalar::<_, i64>("SELECT COALESCE(MAX(version), 0) FROM _sqlx_migrations")
            .fetch_optional(pool)
            .await?
            .unwrap_or(0);

    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::open_pool;

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = open_pool(":memory:", 1).await.expect("open pool");

        run_migrations(&pool).await.expect("run migrations");

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name != '_sqlx_migrations' ORDER BY name"
        )
        .fetch_all(&pool)
        .await
        .expect("query tables");

        assert_eq!(tables, vec!["job_runs", "leads", "source_runs"]);
    }

    #[tokio::test]
    async fn test_get_schema_version() {
        let pool = open_pool(":memory:", 1).await.expect("open pool");

        let version = get_schema_version(&pool).await.expect("get version");
        assert_eq!(version, 0);

        run_migrations(&pool).await.expect("run migrations");

        let version = get_schema_version(&pool).await.expect("get version");
        assert_eq!(version, 2);
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let pool = open_pool(":memory:", 1).await.expect("open pool");

        run_migrations(&pool).await.expect("first migration run");
        run_migrations(&pool)
            .await
            .expect("second migration run should be idempotent");

        let version = get_schema_version(&pool).await.expect("get version");
        assert_eq!(version, 2);
    }
}
