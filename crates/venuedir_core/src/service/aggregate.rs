//! Derived venue aggregate maintenance.
//!
//! # Responsibility
//! - Recompute a venue's `event_count` by enumerating its links.
//!
//! # Invariants
//! - This is the only caller of `VenueRepository::write_event_count` after
//!   creation.
//! - Missing or deleted venues are skipped, never an error.

use crate::model::venue::VenueId;
use crate::repo::link_repo::VenueLinkRepository;
use crate::repo::venue_repo::{VenueRepoResult, VenueRepository};
use log::debug;
use std::collections::BTreeSet;

/// Recomputes derived venue counts from link storage.
pub struct AggregateMaintainer<'a, V: VenueRepository, L: VenueLinkRepository> {
    venues: &'a V,
    links: &'a L,
}

impl<'a, V: VenueRepository, L: VenueLinkRepository> AggregateMaintainer<'a, V, L> {
    pub fn new(venues: &'a V, links: &'a L) -> Self {
        Self { venues, links }
    }

    /// Recounts links for `venue_id` and stores the result.
    ///
    /// Returns the stored count, or `None` when the venue is not live.
    pub fn recompute(&self, venue_id: VenueId) -> VenueRepoResult<Option<u32>> {
        let count = self.links.count_for_venue(venue_id)?;
        if !self.venues.write_event_count(venue_id, count)? {
            debug!(
                "event=aggregate_recompute module=aggregate status=skipped venue_id={venue_id}"
            );
            return Ok(None);
        }
        debug!(
            "event=aggregate_recompute module=aggregate status=ok venue_id={venue_id} event_count={count}"
        );
        Ok(Some(count))
    }

    /// Recomputes each distinct venue once, in id order.
    pub fn recompute_many(
        &self,
        venue_ids: impl IntoIterator<Item = VenueId>,
    ) -> VenueRepoResult<Vec<(VenueId, u32)>> {
        let distinct: BTreeSet<VenueId> = venue_ids.into_iter().collect();
        let mut stored = Vec::with_capacity(distinct.len());
        for venue_id in distinct {
            if let Some(count) = self.recompute(venue_id)? {
                stored.push((venue_id, count));
            }
        }
        Ok(stored)
    }
}
