//! In-memory adapter registry with selection support.

use crate::adapter::{AdapterDescriptor, SourceAdapter};
use crate::error::{Result, SourceError};
use crate::filter::SourceSelection;
use scout_core::SourceId;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Adapters resolved for a run.
#[derive(Default)]
pub struct Resolution {
    /// Adapters to run, in order
    pub adapters: Vec<Arc<dyn SourceAdapter>>,
    /// Explicitly requested ids that are not registered
    pub unknown: Vec<String>,
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolution")
            .field(
                "adapters",
                &self.adapters.iter().map(|a| a.id().as_str()).collect::<Vec<_>>(),
            )
            .field("unknown", &self.unknown)
            .finish()
    }
}

/// Registered adapters, indexed by id.
///
/// Iteration is sorted by id so that "all working adapters" resolves to the
/// same order on every run.
#[derive(Clone)]
pub struct AdapterRegistry {
    adapters: Arc<RwLock<BTreeMap<SourceId, Arc<dyn SourceAdapter>>>>,
}

impl AdapterRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            adapters: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Register an adapter, replacing any with the same id.
    pub fn insert(&self, adapter: Arc<dyn SourceAdapter>) {
        let source_id = adapter.id().clone();
        let mut cache = self
            .adapters
            .write()
            .expect("acquire write lock on adapters");
        cache.insert(source_id.clone(), adapter);
        debug!(source = %source_id, "registered adapter");
    }

    /// Remove an adapter.
    pub fn remove(&self, source_id: &SourceId) -> Option<Arc<dyn SourceAdapter>> {
        let mut cache = self
            .adapters
            .write()
            .expect("acquire write lock on adapters");
        let removed = cache.remove(source_id);
        if removed.is_some() {
            debug!(source = %source_id, "removed adapter");
        }
        removed
    }

    /// Get an adapter by id.
    ///
    /// # Errors
    /// Returns error if the adapter is not registered.
    pub fn get(&self, source_id: &SourceId) -> Result<Arc<dyn SourceAdapter>> {
        let cache = self.adapters.read().expect("acquire read lock on adapters");
        cache
            .get(source_id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(source_id.to_string()))
    }

    /// All adapters, sorted by id.
    #[must_use]
    pub fn get_all(&self) -> Vec<Arc<dyn SourceAdapter>> {
        let cache = self.adapters.read().expect("acquire read lock on adapters");
        cache.values().cloned().collect()
    }

    /// Descriptors of all adapters, sorted by id.
    #[must_use]
    pub fn descriptors(&self) -> Vec<AdapterDescriptor> {
        let cache = self.adapters.read().expect("acquire read lock on adapters");
        cache.values().map(|a| a.descriptor().clone()).collect()
    }

    /// Working, bulk-capable adapters not in `excluded`.
    #[must_use]
    pub fn working(&self, excluded: &[String]) -> Vec<Arc<dyn SourceAdapter>> {
        self.get_all()
            .into_iter()
            .filter(|a| {
                let desc = a.descriptor();
                desc.is_working()
                    && !desc.directory_only
                    && !excluded.iter().any(|id| id == desc.id.as_str())
            })
            .collect()
    }

    /// Resolve a selection into the ordered adapter list for a run.
    ///
    /// Explicit ids run in the order given, duplicates dropped; ids that are
    /// not registered are reported in [`Resolution::unknown`] instead of
    /// failing the whole selection.
    #[must_use]
    pub fn resolve(&self, selection: &SourceSelection, excluded: &[String]) -> Resolution {
        let mut resolution = Resolution::default();

        match selection {
            SourceSelection::Explicit(ids) => {
                let cache = self.adapters.read().expect("acquire read lock on adapters");
                for id in ids {
                    if resolution.adapters.iter().any(|a| a.id().as_str() == id)
                        || resolution.unknown.contains(id)
                    {
                        continue;
                    }
                    let adapter = SourceId::new(id.as_str())
                        .ok()
                        .and_then(|source_id| cache.get(&source_id).cloned());
                    match adapter {
                        Some(adapter) => resolution.adapters.push(adapter),
                        None => resolution.unknown.push(id.clone()),
                    }
                }
            }
            SourceSelection::Working { .. } => {
                let filters = selection.filters();
                resolution.adapters = self
                    .working(excluded)
                    .into_iter()
                    .filter(|a| filters.iter().all(|f| f.matches(a.descriptor())))
                    .collect();
            }
        }

        info!(
            adapters = resolution.adapters.len(),
            unknown = resolution.unknown.len(),
            "resolved source selection"
        );
        resolution
    }

    /// Number of registered adapters.
    #[must_use]
    pub fn count(&self) -> usize {
        let cache = self.adapters.read().expect("acquire read lock on adapters");
        cache.len()
    }

    /// Whether an adapter is registered.
    #[must_use]
    pub fn contains(&self, source_id: &SourceId) -> bool {
        let cache = self.adapters.read().expect("acquire read lock on adapters");
        cache.contains_key(source_id)
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{SearchContext, SearchOptions, SearchQuery, SearchStream, SourceStatus};
    use futures::stream::{self, StreamExt};

    struct StubAdapter {
        descriptor: AdapterDescriptor,
    }

    impl SourceAdapter for StubAdapter {
        fn descriptor(&self) -> &AdapterDescriptor {
            &self.descriptor
        }

        fn search(&self, _: SearchQuery, _: SearchOptions, _: SearchContext) -> SearchStream<'_> {
            stream::empty().boxed()
        }
    }

    fn stub(descriptor: AdapterDescriptor) -> Arc<dyn SourceAdapter> {
        Arc::new(StubAdapter { descriptor })
    }

    fn desc(id: &str, country: &str, region: &str) -> AdapterDescriptor {
        AdapterDescriptor::new(SourceId::new(id).expect("valid id"), id, country).with_region(region)
    }

    fn populated() -> AdapterRegistry {
        let registry = AdapterRegistry::new();
        registry.insert(stub(desc("texas-bar", "US", "TX")));
        registry.insert(stub(desc("florida-bar", "US", "FL")));
        registry.insert(stub(desc("lso-ontario", "CA", "ON")));
        registry.insert(stub(
            desc("georgia-bar", "US", "GA").with_status(SourceStatus::Broken),
        ));
        registry.insert(stub(desc("martindale", "US", "TX").directory_only()));
        registry
    }

    #[test]
    fn test_insert_get_remove() {
        let registry = populated();
        let id = SourceId::new("texas-bar").expect("valid id");

        assert_eq!(registry.count(), 5);
        assert!(registry.contains(&id));
        assert_eq!(registry.get(&id).expect("registered").id(), &id);

        assert!(registry.remove(&id).is_some());
        assert!(!registry.contains(&id));
        assert!(matches!(registry.get(&id), Err(SourceError::NotFound(_))));
    }

    #[test]
    fn test_get_all_is_sorted() {
        let ids: Vec<_> = populated()
            .descriptors()
            .into_iter()
            .map(|d| d.id.to_string())
            .collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_working_skips_broken_directory_only_and_excluded() {
        let registry = populated();
        let ids: Vec<_> = registry
            .working(&["florida-bar".to_string()])
            .iter()
            .map(|a| a.id().to_string())
            .collect();
        assert_eq!(ids, vec!["lso-ontario", "texas-bar"]);
    }

    #[test]
    fn test_resolve_working_by_country() {
        let resolution = populated().resolve(
            &SourceSelection::Working {
                country: Some("US".into()),
                region: None,
            },
            &[],
        );
        let ids: Vec<_> = resolution.adapters.iter().map(|a| a.id().to_string()).collect();
        assert_eq!(ids, vec!["florida-bar", "texas-bar"]);
        assert!(resolution.unknown.is_empty());
    }

    #[test]
    fn test_resolve_explicit_keeps_order_and_reports_unknown() {
        let resolution = populated().resolve(
            &SourceSelection::Explicit(vec![
                "lso-ontario".into(),
                "nowhere-bar".into(),
                "texas-bar".into(),
                "lso-ontario".into(),
                "Not An Id".into(),
            ]),
            &["texas-bar".to_string()],
        );
        let ids: Vec<_> = resolution.adapters.iter().map(|a| a.id().to_string()).collect();
        assert_eq!(ids, vec!["lso-ontario", "texas-bar"]);
        assert_eq!(resolution.unknown, vec!["nowhere-bar", "Not An Id"]);
    }
}
