//! Integration tests for batch cross-referencing against a canned directory.

use futures::stream::{self, StreamExt};
use scout_core::{ContactField, MetricsRecorder, Record, SourceId};
use scout_source::{
    AdapterDescriptor, SearchContext, SearchItem, SearchOptions, SearchQuery, SearchStream,
    SourceAdapter, SourceError,
};
use scout_xref::{CrossRefOptions, CrossReferenceEngine};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Directory that serves fixed entries per city and logs every search.
struct CannedDirectory {
    descriptor: AdapterDescriptor,
    entries: HashMap<String, Vec<Record>>,
    failing: Vec<String>,
    interrupt: Mutex<Option<CancellationToken>>,
    searches: Mutex<Vec<(String, Option<u32>)>>,
}

impl CannedDirectory {
    fn new() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            "austin".to_string(),
            vec![
                Record::named("John", "Smith")
                    .with_locality("Austin", "TX")
                    .with_contact(ContactField::Email, "john@smithlaw.com")
                    .with_contact(ContactField::Phone, "512-555-0100")
                    .with_contact(ContactField::FirmName, "Smith & Co"),
                Record::named("Maria", "Garcia")
                    .with_locality("Austin", "TX")
                    .with_contact(ContactField::Website, "https://garcia.law"),
            ],
        );
        entries.insert(
            "dallas".to_string(),
            vec![Record::named("Ann", "Poe")
                .with_locality("Dallas", "TX")
                .with_contact(ContactField::Phone, "214-555-0199")],
        );
        entries.insert(
            "houston".to_string(),
            vec![Record::default()
                .with_locality("Houston", "TX")
                .with_contact(ContactField::Email, "intake@firm.example")],
        );
        Self {
            descriptor: AdapterDescriptor::new(
                SourceId::new("texas-bar").expect("valid id"),
                "State Bar of Texas",
                "US",
            )
            .directory_only(),
            entries,
            failing: Vec::new(),
            interrupt: Mutex::new(None),
            searches: Mutex::new(Vec::new()),
        }
    }

    fn failing_for(mut self, city: &str) -> Self {
        self.failing.push(city.to_lowercase());
        self
    }

    /// Cancel `token` once the next search yields its first entry.
    fn interrupting(self, token: CancellationToken) -> Self {
        *self.interrupt.lock().expect("interrupt lock") = Some(token);
        self
    }

    fn searches(&self) -> Vec<(String, Option<u32>)> {
        self.searches.lock().expect("searches lock").clone()
    }
}

impl SourceAdapter for CannedDirectory {
    fn descriptor(&self) -> &AdapterDescriptor {
        &self.descriptor
    }

    fn search(
        &self,
        _query: SearchQuery,
        options: SearchOptions,
        _ctx: SearchContext,
    ) -> SearchStream<'_> {
        let city = options
            .localities
            .first()
            .map(|l| l.city.to_lowercase())
            .unwrap_or_default();
        self.searches
            .lock()
            .expect("searches lock")
            .push((city.clone(), options.max_pages));

        if self.failing.contains(&city) {
            return stream::iter(vec![Err(SourceError::Adapter {
                source_id: self.descriptor.id.clone(),
                reason: "directory unavailable".into(),
            })])
            .boxed();
        }

        let interrupt = self.interrupt.lock().expect("interrupt lock").take();
        let records = self.entries.get(&city).cloned().unwrap_or_default();
        stream::iter(records.into_iter().map(move |r| {
            if let Some(token) = &interrupt {
                token.cancel();
            }
            Ok(SearchItem::Record(r))
        }))
        .boxed()
    }
}

fn sample_leads() -> Vec<Record> {
    vec![
        Record::named("JOHN", "smith").with_locality("Austin", "TX"),
        Record::named("Maria", "Garcia")
            .with_locality("austin ", "tx")
            .with_contact(ContactField::Website, "https://maria.example"),
        Record::named("Ann", "Poe").with_locality("Dallas", "TX"),
        Record::named("Nobody", "Known").with_locality("Austin", "TX"),
        Record::named("No", "City"),
    ]
}

fn engine_over(directory: &Arc<CannedDirectory>) -> CrossReferenceEngine {
    let adapter: Arc<dyn SourceAdapter> = directory.clone();
    CrossReferenceEngine::new(adapter, Arc::new(MetricsRecorder::new()))
}

#[tokio::test]
async fn test_batch_fills_only_empty_fields() {
    let directory = Arc::new(CannedDirectory::new());
    let mut engine = engine_over(&directory);
    let mut leads = sample_leads();

    let stats = engine
        .batch_cross_reference(&mut leads, CrossRefOptions::default())
        .await;

    assert_eq!(stats.matches, 3);
    assert_eq!(stats.cities_searched, 2);
    assert_eq!(stats.localities_failed, 0);

    let smith = &leads[0];
    assert_eq!(smith.email.as_deref(), Some("john@smithlaw.com"));
    assert_eq!(smith.phone.as_deref(), Some("512-555-0100"));
    assert_eq!(smith.firm_name.as_deref(), Some("Smith & Co"));
    assert_eq!(
        smith.field_sources.get(&ContactField::Email).map(String::as_str),
        Some("texas-bar")
    );

    // Matched, but the website it already had is kept.
    let garcia = &leads[1];
    assert_eq!(garcia.website.as_deref(), Some("https://maria.example"));
    assert!(!garcia.field_sources.contains_key(&ContactField::Website));

    assert_eq!(leads[2].phone.as_deref(), Some("214-555-0199"));
    assert!(leads[3].email.is_none());
    assert!(leads[4].email.is_none());

    // 3 from Smith, 1 from Poe.
    assert_eq!(stats.fields_filled, 4);
}

#[tokio::test]
async fn test_locality_is_fetched_once() {
    let directory = Arc::new(CannedDirectory::new());
    let mut engine = engine_over(&directory);

    let mut first = sample_leads();
    engine
        .batch_cross_reference(&mut first, CrossRefOptions::default())
        .await;
    let mut second = sample_leads();
    let stats = engine
        .batch_cross_reference(&mut second, CrossRefOptions::default())
        .await;

    assert_eq!(stats.cities_searched, 0);
    assert_eq!(stats.matches, 3);
    assert_eq!(engine.cached_localities(), 2);

    let cities: Vec<_> = directory.searches().into_iter().map(|(c, _)| c).collect();
    assert_eq!(cities, vec!["austin", "dallas"]);
}

#[tokio::test]
async fn test_lookups_are_page_capped() {
    let directory = Arc::new(CannedDirectory::new());
    let mut engine = engine_over(&directory);
    let mut leads = sample_leads();

    engine
        .batch_cross_reference(&mut leads, CrossRefOptions::default().with_max_pages(3))
        .await;

    assert!(directory.searches().iter().all(|(_, pages)| *pages == Some(3)));
}

#[tokio::test]
async fn test_failed_locality_is_retried_next_batch() {
    let directory = Arc::new(CannedDirectory::new().failing_for("Dallas"));
    let mut engine = engine_over(&directory);

    let mut leads = sample_leads();
    let stats = engine
        .batch_cross_reference(&mut leads, CrossRefOptions::default())
        .await;
    assert_eq!(stats.localities_failed, 1);
    assert_eq!(stats.matches, 2);
    assert!(leads[2].phone.is_none());

    let mut again = sample_leads();
    let stats = engine
        .batch_cross_reference(&mut again, CrossRefOptions::default())
        .await;
    assert_eq!(stats.cities_searched, 1);
}

#[tokio::test]
async fn test_results_are_deterministic() {
    let mut outputs = Vec::new();
    for _ in 0..2 {
        let directory = Arc::new(CannedDirectory::new());
        let mut engine = engine_over(&directory);
        let mut leads = sample_leads();
        let stats = engine
            .batch_cross_reference(&mut leads, CrossRefOptions::default())
            .await;
        outputs.push((stats, leads));
    }
    assert_eq!(outputs[0], outputs[1]);
}

#[tokio::test]
async fn test_progress_reports_every_lead() {
    let directory = Arc::new(CannedDirectory::new());
    let mut engine = engine_over(&directory);
    let mut leads = sample_leads();
    let mut seen = Vec::new();

    engine
        .batch_cross_reference(
            &mut leads,
            CrossRefOptions::default().with_progress(|done, total| seen.push((done, total))),
        )
        .await;

    assert_eq!(seen, vec![(1, 5), (2, 5), (3, 5), (4, 5), (5, 5)]);
}

#[tokio::test]
async fn test_cancelled_batch_does_nothing() {
    let directory = Arc::new(CannedDirectory::new());
    let mut engine = engine_over(&directory);
    let mut leads = sample_leads();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let stats = engine
        .batch_cross_reference(&mut leads, CrossRefOptions::default().with_cancel(cancel))
        .await;

    assert!(stats.cancelled);
    assert_eq!(stats.matches, 0);
    assert!(directory.searches().is_empty());
}

#[tokio::test]
async fn test_cancelled_lookup_is_not_cached() {
    let cancel = CancellationToken::new();
    let directory = Arc::new(CannedDirectory::new().interrupting(cancel.clone()));
    let mut engine = engine_over(&directory);

    let mut leads = sample_leads();
    let stats = engine
        .batch_cross_reference(&mut leads, CrossRefOptions::default().with_cancel(cancel))
        .await;
    assert!(stats.cancelled);
    assert_eq!(stats.localities_failed, 0);
    assert_eq!(engine.cached_localities(), 0);

    let mut again = sample_leads();
    let stats = engine
        .batch_cross_reference(&mut again, CrossRefOptions::default())
        .await;
    assert!(!stats.cancelled);
    assert_eq!(stats.cities_searched, 2);
    assert_eq!(stats.matches, 3);
    assert_eq!(again[0].email.as_deref(), Some("john@smithlaw.com"));

    let cities: Vec<_> = directory.searches().into_iter().map(|(c, _)| c).collect();
    assert_eq!(cities, vec!["austin", "austin", "dallas"]);
}

#[tokio::test]
async fn test_nameless_lead_is_never_matched() {
    let directory = Arc::new(CannedDirectory::new());
    let mut engine = engine_over(&directory);
    let mut leads = vec![Record::default().with_locality("Houston", "TX")];

    let stats = engine
        .batch_cross_reference(&mut leads, CrossRefOptions::default())
        .await;

    assert_eq!(stats.cities_searched, 1);
    assert_eq!(stats.matches, 0);
    assert!(leads[0].email.is_none());
    assert!(leads[0].field_sources.is_empty());
}
