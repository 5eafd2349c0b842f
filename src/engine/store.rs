use dashmap::DashMap;
use ulid::Ulid;

use crate::model::*;

use super::conflict::overlapping_active;

/// Bookings partitioned by wicket, each partition sorted by start time.
/// Nothing is ever removed: cancellation is a status change.
pub struct InMemoryStore {
    by_wicket: DashMap<Wicket, Vec<Booking>>,
    /// Booking id → wicket, for lookups by identity.
    index: DashMap<Ulid, Wicket>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            by_wicket: DashMap::new(),
            index: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn insert(&self, booking: Booking) {
        self.index.insert(booking.id, booking.wicket);
        let mut partition = self.by_wicket.entry(booking.wicket).or_default();
        let pos = partition
            .binary_search_by_key(&booking.span.start, |b| b.span.start)
            .unwrap_or_else(|e| e);
        partition.insert(pos, booking);
    }

    pub fn get(&self, id: &Ulid) -> Option<Booking> {
        let wicket = *self.index.get(id)?;
        let partition = self.by_wicket.get(&wicket)?;
        partition.iter().find(|b| b.id == *id).cloned()
    }

    pub fn wicket_of(&self, id: &Ulid) -> Option<Wicket> {
        self.index.get(id).map(|w| *w)
    }

    /// Overwrite the status and return the updated booking.
    pub fn set_status(&self, id: &Ulid, status: BookingStatus) -> Option<Booking> {
        let wicket = *self.index.get(id)?;
        let mut partition = self.by_wicket.get_mut(&wicket)?;
        let booking = partition.iter_mut().find(|b| b.id == *id)?;
        booking.status = status;
        Some(booking.clone())
    }

    /// Active bookings on one wicket overlapping `span`.
    pub fn overlapping(&self, wicket: Wicket, span: &Span) -> Vec<Booking> {
        match self.by_wicket.get(&wicket) {
            Some(partition) => overlapping_active(&partition, span).cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Active bookings on every wicket overlapping `span`.
    pub fn overlapping_any_wicket(&self, span: &Span) -> Vec<Booking> {
        Wicket::ALL
            .iter()
            .flat_map(|w| self.overlapping(*w, span))
            .collect()
    }

    /// Every booking, ordered by start time.
    pub fn all(&self) -> Vec<Booking> {
        let mut all: Vec<Booking> = self
            .by_wicket
            .iter()
            .flat_map(|partition| partition.value().clone())
            .collect();
        all.sort_by_key(|b| (b.span.start, b.id));
        all
    }

    // ── Event application ────────────────────────────────────

    pub fn apply_event(&self, event: &Event) {
        match event {
            Event::BookingCreated { booking } => self.insert(booking.clone()),
            Event::BookingStatusChanged { id, status } => {
                self.set_status(id, *status);
            }
            Event::ConfigOverrideSet { .. } => {}
        }
    }
}
