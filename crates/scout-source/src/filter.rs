//! Adapter selection for bulk runs.

use crate::adapter::AdapterDescriptor;
use serde::{Deserialize, Serialize};

/// Narrow a set of adapters by descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdapterFilter {
    /// Every adapter
    All,
    /// Adapters serving a country (case-insensitive code match)
    Country(String),
    /// Adapters serving a state, province or region
    Region(String),
    /// Adapters with one of these ids
    Specific(Vec<String>),
}

impl AdapterFilter {
    /// Whether the descriptor passes the filter.
    #[must_use]
    pub fn matches(&self, descriptor: &AdapterDescriptor) -> bool {
        match self {
            Self::All => true,
            Self::Country(country) => descriptor.country.eq_ignore_ascii_case(country),
            Self::Region(region) => descriptor
                .region
                .as_deref()
                .is_some_and(|r| r.eq_ignore_ascii_case(region)),
            Self::Specific(ids) => ids.iter().any(|id| descriptor.id.as_str() == id),
        }
    }
}

/// Which adapters a bulk run should execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceSelection {
    /// Exactly these adapters, in this order
    Explicit(Vec<String>),
    /// Every working, bulk-capable adapter, optionally narrowed
    Working {
        /// Country code filter
        country: Option<String>,
        /// Region filter
        region: Option<String>,
    },
}

impl SourceSelection {
    /// All working adapters.
    #[must_use]
    pub fn all_working() -> Self {
        Self::Working {
            country: None,
            region: None,
        }
    }

    /// Filters implied by a `Working` selection.
    #[must_use]
    pub fn filters(&self) -> Vec<AdapterFilter> {
        match self {
            Self::Explicit(ids) => vec![AdapterFilter::Specific(ids.clone())],
            Self::Working { country, region } => {
                let mut filters = Vec::new();
                if let Some(country) = country {
                    filters.push(AdapterFilter::Country(country.clone()));
                }
                if let Some(region) = region {
                    filters.push(AdapterFilter::Region(region.clone()));
                }
                if filters.is_empty() {
                    filters.push(AdapterFilter::All);
                }
                filters
            }
        }
    }
}

impl Default for SourceSelection {
    fn default() -> Self {
        Self::all_working()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_core::SourceId;

    fn descriptor(id: &str, country: &str, region: Option<&str>) -> AdapterDescriptor {
        let desc = AdapterDescriptor::new(SourceId::new(id).expect("valid id"), id, country);
        match region {
            Some(region) => desc.with_region(region),
            None => desc,
        }
    }

    #[test]
    fn test_filter_all() {
        assert!(AdapterFilter::All.matches(&descriptor("texas-bar", "US", Some("TX"))));
    }

    #[test]
    fn test_filter_country_ignores_case() {
        let filter = AdapterFilter::Country("ca".into());
        assert!(filter.matches(&descriptor("lso-ontario", "CA", Some("ON"))));
        assert!(!filter.matches(&descriptor("texas-bar", "US", Some("TX"))));
    }

    #[test]
    fn test_filter_region_requires_region() {
        let filter = AdapterFilter::Region("TX".into());
        assert!(filter.matches(&descriptor("texas-bar", "US", Some("tx"))));
        assert!(!filter.matches(&descriptor("sra-england", "UK", None)));
    }

    #[test]
    fn test_filter_specific() {
        let filter = AdapterFilter::Specific(vec!["texas-bar".into(), "lso-ontario".into()]);
        assert!(filter.matches(&descriptor("texas-bar", "US", None)));
        assert!(!filter.matches(&descriptor("florida-bar", "US", None)));
    }

    #[test]
    fn test_working_selection_filters() {
        assert_eq!(SourceSelection::all_working().filters(), vec![AdapterFilter::All]);
        let selection = SourceSelection::Working {
            country: Some("US".into()),
            region: Some("TX".into()),
        };
        assert_eq!(selection.filters().len(), 2);
    }
}
