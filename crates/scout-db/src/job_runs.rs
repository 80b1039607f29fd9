//! Orchestrator run history for trend tracking across days.

use crate::error::{DatabaseError, Result};
use scout_core::{JobRunSummary, SourceRunStatus, SourceRunSummary, Timestamp, UpsertStats};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use tracing::debug;

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_usize(value: i64) -> usize {
    usize::try_from(value).unwrap_or(0)
}

/// Store a finished run and its per-source lines.
///
/// # Errors
/// Returns an error if the run id already exists or a query fails.
pub async fn record_job_run(pool: &Pool<Sqlite>, summary: &JobRunSummary) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO job_runs (id, started_at, completed_at, total_sources, completed, failed,
                               skipped, records, with_email, with_phone, with_website,
                               inserted, updated, unchanged, cancelled)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&summary.id)
    .bind(summary.started_at.to_rfc3339())
    .bind(summary.completed_at.to_rfc3339())
    .bind(to_i64(summary.total_sources))
    .bind(to_i64(summary.completed))
    .bind(to_i64(summary.failed))
    .bind(to_i64(summary.skipped))
    .bind(to_i64(summary.records))
    .bind(to_i64(summary.with_email))
    .bind(to_i64(summary.with_phone))
    .bind(to_i64(summary.with_website))
    .bind(to_i64(summary.upserts.inserted))
    .bind(to_i64(summary.upserts.updated))
    .bind(to_i64(summary.upserts.unchanged))
    .bind(summary.cancelled)
    .execute(&mut *tx)
    .await?;

    for (position, source) in summary.sources.iter().enumerate() {
        sqlx::query(
            "INSERT INTO source_runs (job_id, position, source_id, status, error, records,
                                      inserted, updated, unchanged, duration_ms)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&summary.id)
        .bind(to_i64(position))
        .bind(&source.source_id)
        .bind(source.status.as_str())
        .bind(&source.error)
        .bind(to_i64(source.records))
        .bind(to_i64(source.upserts.inserted))
        .bind(to_i64(source.upserts.updated))
        .bind(to_i64(source.upserts.unchanged))
        .bind(i64::try_from(source.duration_ms).unwrap_or(i64::MAX))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    debug!(
        job_id = %summary.id,
        sources = summary.sources.len(),
        records = summary.records,
        "recorded job run"
    );
    Ok(())
}

/// Most recent runs, newest first, with their per-source lines.
///
/// # Errors
/// Returns an error if a query fails or a stored timestamp is malformed.
pub async fn get_recent(pool: &Pool<Sqlite>, limit: u32) -> Result<Vec<JobRunSummary>> {
    let rows = sqlx::query(
        "SELECT id, started_at, completed_at, total_sources, completed, failed, skipped,
                records, with_email, with_phone, with_website, inserted, updated, unchanged,
                cancelled
         FROM job_runs
         ORDER BY started_at DESC
         LIMIT ?",
    )
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    let mut runs = Vec::with_capacity(rows.len());
    for row in rows {
        let mut summary = parse_job_row(&row)?;
        summary.sources = get_source_runs(pool, &summary.id).await?;
        runs.push(summary);
    }
    Ok(runs)
}

/// Per-source lines of one run, in run order.
///
/// # Errors
/// Returns an error if the query fails.
pub async fn get_source_runs(pool: &Pool<Sqlite>, job_id: &str) -> Result<Vec<SourceRunSummary>> {
    let rows = sqlx::query(
        "SELECT source_id, status, error, records, inserted, updated, unchanged, duration_ms
         FROM source_runs
         WHERE job_id = ?
         ORDER BY position",
    )
    .bind(job_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(parse_source_row).collect()
}

/// Recent outcomes of one source across runs, newest first.
///
/// # Errors
/// Returns an error if the query fails.
pub async fn get_source_history(
    pool: &Pool<Sqlite>,
    source_id: &str,
    limit: u32,
) -> Result<Vec<SourceRunSummary>> {
    let rows = sqlx::query(
        "SELECT s.source_id, s.status, s.error, s.records, s.inserted, s.updated, s.unchanged,
                s.duration_ms
         FROM source_runs s
         JOIN job_runs j ON j.id = s.job_id
         WHERE s.source_id = ?
         ORDER BY j.started_at DESC
         LIMIT ?",
    )
    .bind(source_id)
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    rows.iter().map(parse_source_row).collect()
}

fn parse_timestamp(row: &SqliteRow, column: &str) -> Result<Timestamp> {
    let raw: String = row.try_get(column)?;
    Timestamp::from_rfc3339(&raw)
        .map_err(|e| DatabaseError::Decode(format!("invalid {column} '{raw}': {e}")))
}

fn parse_job_row(row: &SqliteRow) -> Result<JobRunSummary> {
    Ok(JobRunSummary {
        id: row.try_get("id")?,
        started_at: parse_timestamp(row, "started_at")?,
        completed_at: parse_timestamp(row, "completed_at")?,
        total_sources: to_usize(row.try_get("total_sources")?),
        completed: to_usize(row.try_get("completed")?),
        failed: to_usize(row.try_get("failed")?),
        skipped: to_usize(row.try_get("skipped")?),
        records: to_usize(row.try_get("records")?),
        with_email: to_usize(row.try_get("with_email")?),
        with_phone: to_usize(row.try_get("with_phone")?),
        with_website: to_usize(row.try_get("with_website")?),
        upserts: UpsertStats {
            inserted: to_usize(row.try_get("inserted")?),
            updated: to_usize(row.try_get("updated")?),
            unchanged: to_usize(row.try_get("unchanged")?),
        },
        cancelled: row.try_get("cancelled")?,
        sources: Vec::new(),
    })
}

fn parse_source_row(row: &SqliteRow) -> Result<SourceRunSummary> {
    let status: String = row.try_get("status")?;
    let duration_ms: i64 = row.try_get("duration_ms")?;
    Ok(SourceRunSummary {
        source_id: row.try_get("source_id")?,
        status: SourceRunStatus::parse(&status),
        error: row.try_get("error")?,
        records: to_usize(row.try_get("records")?),
        upserts: UpsertStats {
            inserted: to_usize(row.try_get("inserted")?),
            updated: to_usize(row.try_get("updated")?),
            unchanged: to_usize(row.try_get("unchanged")?),
        },
        duration_ms: u64::try_from(duration_ms).unwrap_or(0),
    })
}
