use crate::model::*;

use super::store::InMemoryStore;
use super::EngineError;

pub(crate) fn now_local() -> chrono::NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// Active bookings in `sorted` (ordered by start) whose span overlaps `query`.
/// Binary search skips everything starting at or after `query.end`.
pub fn overlapping_active<'a>(sorted: &'a [Booking], query: &Span) -> impl Iterator<Item = &'a Booking> {
    let right_bound = sorted.partition_point(|b| b.span.start < query.end);
    let query = *query;
    sorted[..right_bound]
        .iter()
        .filter(move |b| b.is_active() && b.span.end > query.start)
}

/// Bookings on `wicket` that a new booking over `span` would collide with.
pub fn find_conflicts(store: &InMemoryStore, wicket: Wicket, span: &Span) -> Vec<Booking> {
    store.overlapping(wicket, span)
}

/// Must run while holding the wicket's lock, together with the insert.
pub(crate) fn check_no_conflict(store: &InMemoryStore, wicket: Wicket, span: &Span) -> Result<(), EngineError> {
    match find_conflicts(store, wicket, span).first() {
        Some(existing) => Err(EngineError::Conflict {
            wicket,
            existing: existing.id,
        }),
        None => Ok(()),
    }
}
