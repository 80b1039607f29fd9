//! Lead storage with idempotent, fill-if-empty upserts.
//!
//! Leads are keyed by [`Record::dedup_key`]. A new key is inserted; an
//! existing lead only gains fields it was missing, so replaying the same
//! batch leaves the store unchanged.

use crate::error::Result;
use chrono::Utc;
use scout_core::{Record, UpsertStats};
use sqlx::{Pool, Row, Sqlite};
use tracing::debug;

/// Upsert a batch of records collected from `source`.
///
/// Runs in a single transaction. Records with no source tag are tagged with
/// `source`, as are their untagged contact fields.
///
/// # Errors
/// Returns an error if a query fails or a stored lead cannot be decoded; the
/// whole batch is rolled back.
pub async fn upsert_records(
    pool: &Pool<Sqlite>,
    records: &[Record],
    source: &str,
) -> Result<UpsertStats> {
    let mut tx = pool.begin().await?;
    let mut stats = UpsertStats::default();
    let now = Utc::now().to_rfc3339();

    for record in records {
        let mut incoming = record.clone();
        if incoming.source.is_empty() {
            incoming.source = source.to_string();
        }
        incoming.tag_contact_sources(source);
        let dedup_key = incoming.dedup_key();

        let existing: Option<String> =
            sqlx::query_scalar("SELECT data FROM leads WHERE dedup_key = ?")
                .bind(&dedup_key)
                .fetch_optional(&mut *tx)
                .await?;

        match existing {
            None => {
                sqlx::query(
                    "INSERT INTO leads (id, dedup_key, source, first_name, last_name, city, state,
                                        registration_number, data, created_at, updated_at)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(uuid::Uuid::new_v4().to_string())
                .bind(&dedup_key)
                .bind(&incoming.source)
                .bind(&incoming.first_name)
                .bind(&incoming.last_name)
                .bind(&incoming.city)
                .bind(&incoming.state)
                .bind(&incoming.registration_number)
                .bind(serde_json::to_string(&incoming)?)
                .bind(&now)
                .bind(&now)
                .execute(&mut *tx)
                .await?;
                stats.inserted += 1;
            }
            Some(data) => {
                let mut stored: Record = serde_json::from_str(&data)?;
                if stored.merge_missing(&incoming) {
                    sqlx::query(
                        "UPDATE leads
                         SET first_name = ?, last_name = ?, city = ?, state = ?,
                             registration_number = ?, data = ?, updated_at = ?
                         WHERE dedup_key = ?",
                    )
                    .bind(&stored.first_name)
                    .bind(&stored.last_name)
                    .bind(&stored.city)
                    .bind(&stored.state)
                    .bind(&stored.registration_number)
                    .bind(serde_json::to_string(&stored)?)
                    .bind(&now)
                    .bind(&dedup_key)
                    .execute(&mut *tx)
                    .await?;
                    stats.updated += 1;
                } else {
                    stats.unchanged += 1;
                }
            }
        }
    }

    tx.commit().await?;

    debug!(
        source,
        inserted = stats.inserted,
        updated = stats.updated,
        unchanged = stats.unchanged,
        "upserted leads"
    );

    Ok(stats)
}

/// Get a lead by its dedup key.
///
/// # Errors
/// Returns an error if the query fails or the stored lead cannot be decoded.
pub async fn get_by_key(pool: &Pool<Sqlite>, dedup_key: &str) -> Result<Option<Record>> {
    let data: Option<String> = sqlx::query_scalar("SELECT data FROM leads WHERE dedup_key = ?")
        .bind(dedup_key)
        .fetch_optional(pool)
        .await?;

    Ok(data.map(|d| serde_json::from_str(&d)).transpose()?)
}

/// All leads first collected from `source`, oldest first.
///
/// # Errors
/// Returns an error if the query fails or a stored lead cannot be decoded.
pub async fn get_by_source(pool: &Pool<Sqlite>, source: &str) -> Result<Vec<Record>> {
    let rows = sqlx::query("SELECT data FROM leads WHERE source = ? ORDER BY created_at, id")
        .bind(source)
        .fetch_all(pool)
        .await?;

    rows.into_iter()
        .map(|row| {
            let data: String = row.try_get("data")?;
            Ok(serde_json::from_str(&data)?)
        })
        .collect()
}

/// Total number of stored leads.
///
/// # Errors
/// Returns an error if the query fails.
pub async fn count(pool: &Pool<Sqlite>) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM leads")
        .fetch_one(pool)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use scout_core::ContactField;

    async fn setup_test_db() -> Database {
        let db = Database::new(":memory:").await.expect("create test database");
        db.run_migrations().await.expect("run migrations");
        db
    }

    fn batch() -> Vec<Record> {
        vec![
            Record::named("Jane", "Doe")
                .with_locality("Austin", "TX")
                .with_registration("24001234"),
            Record::named("John", "Roe")
                .with_locality("Dallas", "TX")
                .with_contact(ContactField::Email, "john@roe.law"),
            Record::named("Ann", "Poe").with_locality("Houston", "TX"),
        ]
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let db = setup_test_db().await;

        let first = upsert_records(db.pool(), &batch(), "texas-bar")
            .await
            .expect("first upsert");
        assert_eq!(first.inserted, 3);
        assert_eq!(first.unchanged, 0);

        let second = upsert_records(db.pool(), &batch(), "texas-bar")
            .await
            .expect("second upsert");
        assert_eq!(second.inserted, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(second.unchanged, 3);

        assert_eq!(count(db.pool()).await.expect("count"), 3);
    }

    #[tokio::test]
    async fn test_upsert_fills_missing_fields_only() {
        let db = setup_test_db().await;
        let original = Record::named("John", "Roe")
            .with_locality("Dallas", "TX")
            .with_contact(ContactField::Email, "john@roe.law");
        upsert_records(db.pool(), &[original.clone()], "texas-bar")
            .await
            .expect("insert");

        let richer = Record::named("John", "Roe")
            .with_locality("Dallas", "TX")
            .with_contact(ContactField::Email, "other@example.com")
            .with_contact(ContactField::Phone, "214-555-0100");
        let stats = upsert_records(db.pool(), &[richer], "martindale")
            .await
            .expect("update");
        assert_eq!(stats.updated, 1);

        let stored = get_by_key(db.pool(), &original.dedup_key())
            .await
            .expect("get")
            .expect("lead exists");
        assert_eq!(stored.email.as_deref(), Some("john@roe.law"));
        assert_eq!(stored.phone.as_deref(), Some("214-555-0100"));
        assert_eq!(
            stored.field_sources.get(&ContactField::Email).map(String::as_str),
            Some("texas-bar")
        );
        assert_eq!(
            stored.field_sources.get(&ContactField::Phone).map(String::as_str),
            Some("martindale")
        );
        assert_eq!(stored.source, "texas-bar");
    }

    #[tokio::test]
    async fn test_duplicates_within_batch_collapse() {
        let db = setup_test_db().await;
        let lead = Record::named("Jane", "Doe").with_locality("Austin", "TX");

        let stats = upsert_records(db.pool(), &[lead.clone(), lead], "texas-bar")
            .await
            .expect("upsert");

        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.unchanged, 1);
        assert_eq!(count(db.pool()).await.expect("count"), 1);
    }

    #[tokio::test]
    async fn test_get_by_source() {
        let db = setup_test_db().await;
        upsert_records(db.pool(), &batch(), "texas-bar")
            .await
            .expect("upsert");

        let leads = get_by_source(db.pool(), "texas-bar").await.expect("query");
        assert_eq!(leads.len(), 3);
        assert!(get_by_source(db.pool(), "florida-bar")
            .await
            .expect("query")
            .is_empty());
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let db = setup_test_db().await;
        assert!(get_by_key(db.pool(), "nobody|nowhere|xx")
            .await
            .expect("query")
            .is_none());
    }
}
