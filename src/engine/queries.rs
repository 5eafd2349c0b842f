use chrono::NaiveDate;
use ulid::Ulid;

use crate::config::ConfigEntry;
use crate::model::*;

use super::conflict::now_local;
use super::slots::SlotGrid;
use super::{Engine, EngineError};

impl Engine {
    /// Slot plan for one day on one wicket, against current bookings and the
    /// config in force right now.
    pub fn slot_grid(&self, date: NaiveDate, wicket: Wicket) -> SlotGrid {
        let cfg = self.effective_config();
        let now = now_local();
        let booked = match SlotGrid::day_window(date, &cfg) {
            Some(window) => self
                .store
                .overlapping(wicket, &window)
                .into_iter()
                .map(|b| b.span)
                .collect(),
            None => Vec::new(),
        };
        SlotGrid::new(date, &cfg, booked, now)
    }

    /// Every slot of the day with its status. Computed fresh on each call.
    pub fn resolve_slots(&self, date: NaiveDate, wicket: Wicket) -> Vec<SlotStatus> {
        self.slot_grid(date, wicket).iter().collect()
    }

    pub fn get_booking(&self, id: &Ulid) -> Result<Booking, EngineError> {
        self.store.get(id).ok_or(EngineError::NotFound(*id))
    }

    /// `All` and `ByRequester` include every status. `Upcoming` is every
    /// booking starting after now, earliest first, whatever its status.
    pub fn list_bookings(&self, filter: &BookingFilter) -> Vec<Booking> {
        let all = self.store.all();
        match filter {
            BookingFilter::All => all,
            BookingFilter::ByRequester(requester) => all
                .into_iter()
                .filter(|b| b.requester.as_deref() == Some(requester.as_str()))
                .collect(),
            BookingFilter::Upcoming => {
                let now = now_local();
                all.into_iter().filter(|b| b.span.start > now).collect()
            }
        }
    }

    pub fn stats(&self) -> BookingStats {
        let now = now_local();
        let all = self.store.all();
        BookingStats {
            total: all.len(),
            active: all.iter().filter(|b| b.status == BookingStatus::Pending).count(),
            upcoming: all
                .iter()
                .filter(|b| b.status == BookingStatus::Pending && b.span.start > now)
                .count(),
        }
    }

    /// Stored overrides, sorted by key. Keys with no override are absent.
    pub fn config_overrides(&self) -> Vec<ConfigEntry> {
        self.overrides.entries()
    }
}
