//! Event-side view of the venue relationship.

use crate::model::venue::{EventId, VenueId};
use serde::{Deserialize, Serialize};

/// Venue reference stored on an event.
///
/// `venue_name` is a denormalized copy used for event sorting; `venue_id`
/// is the lookup key and the name must never be used to resolve a venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventVenueRef {
    pub event_id: EventId,
    /// `None` when the event has no venue.
    pub venue_id: Option<VenueId>,
    /// Empty when the event has no venue.
    pub venue_name: String,
    /// Epoch ms of the last reference change.
    pub updated_at: i64,
}

impl EventVenueRef {
    pub fn has_venue(&self) -> bool {
        self.venue_id.is_some()
    }
}
