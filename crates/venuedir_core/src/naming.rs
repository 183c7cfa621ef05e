//! Unique venue name resolution.
//!
//! # Responsibility
//! - Turn a candidate venue name into one no other live venue holds.
//! - Derive the fallback name used when a venue name is cleared.
//!
//! # Invariants
//! - Resolution is pure over the occupancy predicate it is given.
//! - A free candidate is returned unchanged.
//! - Suffixes start at ` 2` and always extend the original candidate, never a
//!   previously suffixed attempt.

use crate::model::venue::VenueId;

/// First numeric suffix tried for a taken name.
pub const FIRST_SUFFIX: u32 = 2;

/// Returns `candidate` or the first `"{candidate} N"` (N >= 2) not taken.
///
/// `is_taken` answers whether another venue already holds a name; the
/// caller bakes the excluded venue id (for in-place renames) into it.
///
/// # Errors
/// - Propagates the first error returned by `is_taken`.
pub fn resolve_unique_name<E>(
    candidate: &str,
    mut is_taken: impl FnMut(&str) -> Result<bool, E>,
) -> Result<String, E> {
    if !is_taken(candidate)? {
        return Ok(candidate.to_string());
    }

    let mut suffix = FIRST_SUFFIX;
    loop {
        let attempt = format!("{candidate} {suffix}");
        if !is_taken(&attempt)? {
            return Ok(attempt);
        }
        suffix += 1;
    }
}

/// Name given to a venue whose name was cleared: its own id.
pub fn fallback_name(venue_id: VenueId) -> String {
    venue_id.to_string()
}
