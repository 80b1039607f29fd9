//! The normalized directory entry and its fill-if-empty merge policy.

use crate::types::{normalize_key_part, LocalityKey};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

static YEAR_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(1[89]|20)\d{2}\b").expect("valid regex"));

/// Contact fields whose provenance is tracked per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactField {
    /// Email address
    Email,
    /// Phone number
    Phone,
    /// Firm or personal website
    Website,
    /// Firm name
    FirmName,
}

impl ContactField {
    /// Every tracked field, in merge order.
    pub const ALL: [ContactField; 4] = [
        ContactField::Email,
        ContactField::Phone,
        ContactField::Website,
        ContactField::FirmName,
    ];

    /// Get a human-readable display name for the field.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Email => "Email Address",
            Self::Phone => "Phone Number",
            Self::Website => "Website",
            Self::FirmName => "Firm Name",
        }
    }
}

impl fmt::Display for ContactField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// A normalized professional-directory entry.
///
/// Fields are only ever filled, never overwritten: every merge path goes
/// through [`Record::fill_if_empty`] or [`Record::merge_missing`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Record {
    /// Given name
    pub first_name: Option<String>,
    /// Family name
    pub last_name: Option<String>,
    /// Name as displayed by the source, used when the parts are missing
    pub full_name: Option<String>,
    /// Firm or practice name
    pub firm_name: Option<String>,
    /// City of practice
    pub city: Option<String>,
    /// State, province or region
    pub state: Option<String>,
    /// Country of practice
    pub country: Option<String>,
    /// Contact phone number
    pub phone: Option<String>,
    /// Contact email address
    pub email: Option<String>,
    /// Firm or personal website
    pub website: Option<String>,
    /// Bar / law-society registration number
    pub registration_number: Option<String>,
    /// Licence status as reported by the source ("Active", "Inactive", ...)
    pub status: Option<String>,
    /// Admission date in whatever format the source publishes
    pub admission_date: Option<String>,
    /// Listing page on the source
    pub profile_url: Option<String>,
    /// Identifier of the adapter that produced the record
    pub source: String,
    /// Which enrichment stage populated each non-empty contact field
    pub field_sources: BTreeMap<ContactField, String>,
}

fn is_present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

/// Fill `slot` from `value` when the slot is empty. Returns true if it changed.
fn fill_slot(slot: &mut Option<String>, value: &Option<String>) -> bool {
    if is_present(slot) || !is_present(value) {
        return false;
    }
    slot.clone_from(value);
    true
}

impl Record {
    /// Create a record with first and last name.
    #[must_use]
    pub fn named(first: impl Into<String>, last: impl Into<String>) -> Self {
        Self {
            first_name: Some(first.into()),
            last_name: Some(last.into()),
            ..Self::default()
        }
    }

    /// Set city and state.
    #[must_use]
    pub fn with_locality(mut self, city: impl Into<String>, state: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self.state = Some(state.into());
        self
    }

    /// Set a contact field without tagging its provenance.
    #[must_use]
    pub fn with_contact(mut self, field: ContactField, value: impl Into<String>) -> Self {
        *self.contact_slot_mut(field) = Some(value.into());
        self
    }

    /// Set the registration number.
    #[must_use]
    pub fn with_registration(mut self, number: impl Into<String>) -> Self {
        self.registration_number = Some(number.into());
        self
    }

    /// Non-blank value of a contact field.
    #[must_use]
    pub fn contact(&self, field: ContactField) -> Option<&str> {
        let value = match field {
            ContactField::Email => &self.email,
            ContactField::Phone => &self.phone,
            ContactField::Website => &self.website,
            ContactField::FirmName => &self.firm_name,
        };
        value.as_deref().filter(|v| !v.trim().is_empty())
    }

    /// Whether a contact field holds a non-blank value.
    #[must_use]
    pub fn has(&self, field: ContactField) -> bool {
        self.contact(field).is_some()
    }

    fn contact_slot_mut(&mut self, field: ContactField) -> &mut Option<String> {
        match field {
            ContactField::Email => &mut self.email,
            ContactField::Phone => &mut self.phone,
            ContactField::Website => &mut self.website,
            ContactField::FirmName => &mut self.firm_name,
        }
    }

    /// Record `source` as the provenance of every present, untagged contact field.
    pub fn tag_contact_sources(&mut self, source: &str) {
        for field in ContactField::ALL {
            if self.has(field) && !self.field_sources.contains_key(&field) {
                self.field_sources.insert(field, source.to_string());
            }
        }
    }

    /// Copy `fields` from `other` where this record is empty.
    ///
    /// Returns the fields that were filled; each is tagged with `source`.
    pub fn fill_if_empty(
        &mut self,
        other: &Record,
        fields: &[ContactField],
        source: &str,
    ) -> Vec<ContactField> {
        let mut filled = Vec::new();
        for &field in fields {
            if self.has(field) {
                continue;
            }
            if let Some(value) = other.contact(field) {
                *self.contact_slot_mut(field) = Some(value.to_string());
                self.field_sources.insert(field, source.to_string());
                filled.push(field);
            }
        }
        filled
    }

    /// Fill every empty field from `other`, keeping `other`'s provenance tags.
    ///
    /// Returns true if anything changed.
    pub fn merge_missing(&mut self, other: &Record) -> bool {
        let mut changed = false;
        changed |= fill_slot(&mut self.first_name, &other.first_name);
        changed |= fill_slot(&mut self.last_name, &other.last_name);
        changed |= fill_slot(&mut self.full_name, &other.full_name);
        changed |= fill_slot(&mut self.city, &other.city);
        changed |= fill_slot(&mut self.state, &other.state);
        changed |= fill_slot(&mut self.country, &other.country);
        changed |= fill_slot(&mut self.registration_number, &other.registration_number);
        changed |= fill_slot(&mut self.status, &other.status);
        changed |= fill_slot(&mut self.admission_date, &other.admission_date);
        changed |= fill_slot(&mut self.profile_url, &other.profile_url);

        for field in ContactField::ALL {
            if self.has(field) {
                continue;
            }
            if let Some(value) = other.contact(field) {
                *self.contact_slot_mut(field) = Some(value.to_string());
                let tag = other
                    .field_sources
                    .get(&field)
                    .cloned()
                    .unwrap_or_else(|| other.source.clone());
                self.field_sources.insert(field, tag);
                changed = true;
            }
        }
        changed
    }

    /// Full name if present, otherwise "first last".
    #[must_use]
    pub fn display_name(&self) -> String {
        if let Some(full) = self.full_name.as_deref().filter(|v| !v.trim().is_empty()) {
            return full.trim().to_string();
        }
        [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Four-digit year extracted from the admission date, if any.
    #[must_use]
    pub fn admission_year(&self) -> Option<i32> {
        let date = self.admission_date.as_deref()?;
        YEAR_REGEX.find(date).and_then(|m| m.as_str().parse().ok())
    }

    /// Normalized locality key, or `None` when the record has no city.
    #[must_use]
    pub fn locality_key(&self) -> Option<LocalityKey> {
        let city = self.city.as_deref().filter(|c| !c.trim().is_empty())?;
        Some(LocalityKey::new(city, self.state.as_deref().unwrap_or("")))
    }

    /// Key used by lead stores to recognise the same person across runs.
    ///
    /// `state|#registration` when a registration number is known, otherwise
    /// `name|city|state`.
    #[must_use]
    pub fn dedup_key(&self) -> String {
        let state = normalize_key_part(self.state.as_deref().unwrap_or(""));
        if let Some(number) = self
            .registration_number
            .as_deref()
            .filter(|n| !n.trim().is_empty())
        {
            return format!("{state}|#{}", normalize_key_part(number));
        }
        let city = normalize_key_part(self.city.as_deref().unwrap_or(""));
        format!("{}|{city}|{state}", normalize_key_part(&self.display_name()))
    }
}
