//! Where collected records go.

use crate::error::{Result, RunError};
use async_trait::async_trait;
use scout_core::{JobRunSummary, Record, UpsertStats};
use scout_db::{job_runs, leads, Database};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Idempotent destination for records.
///
/// Upserting the same batch twice must report the second call as unchanged.
#[async_trait]
pub trait LeadSink: Send + Sync {
    /// Store a batch collected from `source`.
    async fn upsert(&self, records: &[Record], source: &str) -> Result<UpsertStats>;

    /// Store the aggregate record of a finished run.
    async fn record_job_run(&self, _summary: &JobRunSummary) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl LeadSink for Database {
    async fn upsert(&self, records: &[Record], source: &str) -> Result<UpsertStats> {
        Ok(leads::upsert_records(self.pool(), records, source).await?)
    }

    async fn record_job_run(&self, summary: &JobRunSummary) -> Result<()> {
        Ok(job_runs::record_job_run(self.pool(), summary).await?)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    leads: HashMap<String, Record>,
    runs: Vec<JobRunSummary>,
}

/// In-process sink with the same merge rules as the SQLite store.
#[derive(Debug, Default)]
pub struct MemorySink {
    state: Mutex<MemoryState>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of distinct leads held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().leads.len()
    }

    /// Whether no leads are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lead stored under `dedup_key`.
    #[must_use]
    pub fn get(&self, dedup_key: &str) -> Option<Record> {
        self.lock().leads.get(dedup_key).cloned()
    }

    /// Recorded runs, oldest first.
    #[must_use]
    pub fn runs(&self) -> Vec<JobRunSummary> {
        self.lock().runs.clone()
    }
}

#[async_trait]
impl LeadSink for MemorySink {
    async fn upsert(&self, records: &[Record], source: &str) -> Result<UpsertStats> {
        let mut state = self.lock();
        let mut stats = UpsertStats::default();

        for record in records {
            let mut incoming = record.clone();
            if incoming.source.is_empty() {
                incoming.source = source.to_string();
            }
            incoming.tag_contact_sources(source);

            match state.leads.get_mut(&incoming.dedup_key()) {
                Some(stored) => {
                    if stored.merge_missing(&incoming) {
                        stats.updated += 1;
                    } else {
                        stats.unchanged += 1;
                    }
                }
                None => {
                    state.leads.insert(incoming.dedup_key(), incoming);
                    stats.inserted += 1;
                }
            }
        }

        Ok(stats)
    }

    async fn record_job_run(&self, summary: &JobRunSummary) -> Result<()> {
        let mut state = self.lock();
        if state.runs.iter().any(|r| r.id == summary.id) {
            return Err(RunError::Sink(format!("run {} already recorded", summary.id)));
        }
        state.runs.push(summary.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_core::ContactField;

    fn batch() -> Vec<Record> {
        vec![
            Record::named("Jane", "Doe").with_locality("Austin", "TX"),
            Record::named("John", "Roe")
                .with_locality("Dallas", "TX")
                .with_contact(ContactField::Email, "john@roe.law"),
        ]
    }

    #[tokio::test]
    async fn test_memory_upsert_is_idempotent() {
        let sink = MemorySink::new();

        let first = sink.upsert(&batch(), "texas-bar").await.expect("first");
        assert_eq!(first.inserted, 2);

        let second = sink.upsert(&batch(), "texas-bar").await.expect("second");
        assert_eq!(second.inserted, 0);
        assert_eq!(second.unchanged, 2);
        assert_eq!(sink.len(), 2);
    }

    #[tokio::test]
    async fn test_memory_upsert_fills_only_empty_fields() {
        let sink = MemorySink::new();
        sink.upsert(&batch(), "texas-bar").await.expect("insert");

        let richer = Record::named("John", "Roe")
            .with_locality("Dallas", "TX")
            .with_contact(ContactField::Email, "other@example.com")
            .with_contact(ContactField::Phone, "214-555-0100");
        let stats = sink.upsert(&[richer.clone()], "martindale").await.expect("merge");
        assert_eq!(stats.updated, 1);

        let stored = sink.get(&richer.dedup_key()).expect("stored");
        assert_eq!(stored.email.as_deref(), Some("john@roe.law"));
        assert_eq!(stored.phone.as_deref(), Some("214-555-0100"));
        assert_eq!(
            stored.field_sources.get(&ContactField::Phone).map(String::as_str),
            Some("martindale")
        );
    }

    #[tokio::test]
    async fn test_database_sink_round_trip() {
        let db = Database::new(":memory:").await.expect("open");
        db.run_migrations().await.expect("migrate");

        let first = db.upsert(&batch(), "texas-bar").await.expect("first");
        let second = db.upsert(&batch(), "texas-bar").await.expect("second");
        assert_eq!(first.inserted, 2);
        assert_eq!(second.unchanged, 2);
    }
}
