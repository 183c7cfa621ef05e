//! Venue domain model.
//!
//! # Responsibility
//! - Define the canonical venue record and its typed property set.
//! - Sanitize free-form attributes before they reach storage.
//!
//! # Invariants
//! - `id` is stable and never reused for another venue.
//! - `event_count` is derived from links; callers only seed it at creation.
//! - Attributes outside `VenueProperties` cannot be expressed.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable venue identifier.
pub type VenueId = Uuid;

/// Stable identifier of an event owned outside the directory.
pub type EventId = Uuid;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));
static URL_WITH_SCHEME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^https?://[^\s/$.?#][^\s]*$").expect("valid url regex"));
static BARE_HOST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[a-z0-9](?:[a-z0-9-]*[a-z0-9])?(?:\.[a-z0-9-]+)*\.[a-z]{2,}(?:[/?#]\S*)?$")
        .expect("valid host regex")
});

/// Canonical venue record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Venue {
    pub id: VenueId,
    /// Unique among live venues.
    pub name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub website: String,
    pub phone: String,
    pub contact_name: String,
    pub contact_phone: String,
    pub contact_email: String,
    pub notes: String,
    /// IANA zone name, e.g. `America/Chicago`.
    pub timezone: String,
    /// Number of events linked to this venue.
    pub event_count: u32,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

impl Venue {
    /// Returns the one-line postal address, e.g. `12 Main St, Austin, TX 78701`.
    ///
    /// Street whitespace (including line breaks) is collapsed to single
    /// spaces. Empty parts are skipped without leaving separators behind.
    pub fn address_line(&self) -> String {
        let street = collapse_whitespace(&self.address);

        let mut region = self.city.clone();
        if !self.state.is_empty() {
            if !region.is_empty() {
                region.push_str(", ");
            }
            region.push_str(&self.state);
        }
        if !self.postal_code.is_empty() {
            if !region.is_empty() {
                region.push(' ');
            }
            region.push_str(&self.postal_code);
        }

        match (street.is_empty(), region.is_empty()) {
            (true, _) => region,
            (false, true) => street,
            (false, false) => format!("{street}, {region}"),
        }
    }
}

/// Typed venue property set used for creation seeds and partial updates.
///
/// `None` means "leave unchanged" on update and "empty" on create.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VenueProperties {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub notes: Option<String>,
    pub timezone: Option<String>,
}

impl VenueProperties {
    /// Property set carrying only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    /// Copies every present attribute (not `name`) onto `venue`, sanitized.
    pub fn apply_attributes(&self, venue: &mut Venue) {
        let text_fields: [(&Option<String>, &mut String); 11] = [
            (&self.address, &mut venue.address),
            (&self.city, &mut venue.city),
            (&self.state, &mut venue.state),
            (&self.postal_code, &mut venue.postal_code),
            (&self.country, &mut venue.country),
            (&self.phone, &mut venue.phone),
            (&self.contact_name, &mut venue.contact_name),
            (&self.contact_phone, &mut venue.contact_phone),
            (&self.contact_email, &mut venue.contact_email),
            (&self.notes, &mut venue.notes),
            (&self.timezone, &mut venue.timezone),
        ];
        for (source, target) in text_fields {
            if let Some(value) = source {
                *target = sanitize_text(value);
            }
        }
        if let Some(website) = &self.website {
            venue.website = sanitize_website(website);
        }
    }
}

/// Creation request: properties plus an optional event count seed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewVenue {
    pub properties: VenueProperties,
    /// Stored verbatim; only valid when the caller links exactly this many
    /// events in the same unit of work.
    pub seed_event_count: Option<u32>,
}

impl NewVenue {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            properties: VenueProperties::named(name),
            seed_event_count: None,
        }
    }

    pub fn from_properties(properties: VenueProperties) -> Self {
        Self {
            properties,
            seed_event_count: None,
        }
    }

    pub fn with_seed_event_count(mut self, count: u32) -> Self {
        self.seed_event_count = Some(count);
        self
    }
}

/// Trims a free-form text attribute. Inner line breaks are kept for notes.
pub fn sanitize_text(value: &str) -> String {
    value.trim().to_string()
}

/// Normalizes a website attribute to an http(s) URL or an empty string.
///
/// Bare hosts such as `example.com/shows` get an `http://` scheme.
pub fn sanitize_website(value: &str) -> String {
    let trimmed = value.trim();
    if URL_WITH_SCHEME_RE.is_match(trimmed) {
        trimmed.to_string()
    } else if BARE_HOST_RE.is_match(trimmed) {
        format!("http://{trimmed}")
    } else {
        String::new()
    }
}

fn collapse_whitespace(value: &str) -> String {
    WHITESPACE_RE.replace_all(value.trim(), " ").into_owned()
}
