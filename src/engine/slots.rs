use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::config::EffectiveConfig;
use crate::model::*;

/// Bookable slots of one day on one wicket.
///
/// The grid is a plan, not a list: `iter()` walks it lazily and can be called
/// any number of times. Slots tile `[business_start, business_end)` back to
/// back; a trailing remainder shorter than one slot is not offered.
#[derive(Debug, Clone)]
pub struct SlotGrid {
    day_start: NaiveDateTime,
    day_end: NaiveDateTime,
    slot: Duration,
    /// Active bookings overlapping the day, sorted by start.
    booked: Vec<Span>,
    now: NaiveDateTime,
}

impl SlotGrid {
    pub fn new(date: NaiveDate, cfg: &EffectiveConfig, mut booked: Vec<Span>, now: NaiveDateTime) -> Self {
        booked.sort_by_key(|s| s.start);
        Self {
            day_start: date.and_time(cfg.business_start),
            day_end: date.and_time(cfg.business_end),
            slot: Duration::minutes(i64::from(cfg.slot_minutes.max(1))),
            booked,
            now,
        }
    }

    /// Business hours of `date` under `cfg`, or None when they are empty.
    pub fn day_window(date: NaiveDate, cfg: &EffectiveConfig) -> Option<Span> {
        let start = date.and_time(cfg.business_start);
        let end = date.and_time(cfg.business_end);
        (start < end).then(|| Span::new(start, end))
    }

    pub fn iter(&self) -> Slots<'_> {
        Slots {
            grid: self,
            next: self.day_start,
        }
    }

    fn state_of(&self, slot: &Span) -> SlotState {
        if slot.start < self.now {
            return SlotState::Unavailable;
        }
        // Bookings starting at or after slot.end can't overlap.
        let right = self.booked.partition_point(|b| b.start < slot.end);
        if self.booked[..right].iter().any(|b| b.overlaps(slot)) {
            SlotState::Booked
        } else {
            SlotState::Available
        }
    }
}

impl<'a> IntoIterator for &'a SlotGrid {
    type Item = SlotStatus;
    type IntoIter = Slots<'a>;

    fn into_iter(self) -> Slots<'a> {
        self.iter()
    }
}

pub struct Slots<'a> {
    grid: &'a SlotGrid,
    next: NaiveDateTime,
}

impl Iterator for Slots<'_> {
    type Item = SlotStatus;

    fn next(&mut self) -> Option<SlotStatus> {
        let start = self.next;
        let end = start + self.grid.slot;
        if end > self.grid.day_end {
            return None;
        }
        self.next = end;
        let slot = Span::new(start, end);
        Some(SlotStatus::new(start, self.grid.state_of(&slot)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, Defaults, BUSINESS_END_KEY, SLOT_DURATION_KEY};
    use std::collections::HashMap;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2031, 1, 20).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        day().and_hms_opt(h, m, 0).unwrap()
    }

    fn long_ago() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2000, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    fn cfg_with(pairs: &[(&str, &str)]) -> EffectiveConfig {
        let store: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        resolve(&store, &Defaults::default())
    }

    #[test]
    fn default_day_has_32_slots() {
        let grid = SlotGrid::new(day(), &cfg_with(&[]), vec![], long_ago());
        let slots: Vec<_> = grid.iter().collect();
        assert_eq!(slots.len(), 32);
        assert_eq!(slots[0].start, at(7, 0));
        assert_eq!(slots[31].start, at(22, 30));
        assert!(slots.iter().all(|s| s.available));
    }

    #[test]
    fn slots_tile_window_without_gaps() {
        for minutes in ["15", "30", "60", "120"] {
            let cfg = cfg_with(&[(SLOT_DURATION_KEY, minutes)]);
            let grid = SlotGrid::new(day(), &cfg, vec![], long_ago());
            let starts: Vec<_> = grid.iter().map(|s| s.start).collect();
            let step = Duration::minutes(i64::from(cfg.slot_minutes));
            assert_eq!(starts.first(), Some(&at(7, 0)));
            for pair in starts.windows(2) {
                assert_eq!(pair[1] - pair[0], step);
            }
            assert_eq!(*starts.last().unwrap() + step, at(23, 0));
        }
    }

    #[test]
    fn partial_trailing_slot_not_offered() {
        let cfg = cfg_with(&[(BUSINESS_END_KEY, "22:45")]);
        let grid = SlotGrid::new(day(), &cfg, vec![], long_ago());
        let last = grid.iter().last().unwrap();
        assert_eq!(last.start, at(22, 0));
    }

    #[test]
    fn booked_and_past_slots() {
        let booked = vec![Span::new(at(10, 0), at(11, 0))];
        let grid = SlotGrid::new(day(), &cfg_with(&[]), booked, at(8, 15));
        let by_start = |h, m| grid.iter().find(|s| s.start == at(h, m)).unwrap();

        assert_eq!(by_start(7, 0).status, "Unavailable");
        assert_eq!(by_start(8, 0).status, "Unavailable"); // already started
        assert_eq!(by_start(8, 30).status, "Available");
        assert_eq!(by_start(10, 0).status, "Booked");
        assert_eq!(by_start(10, 30).status, "Booked");
        assert_eq!(by_start(11, 0).status, "Available"); // half-open
        assert!(!by_start(10, 0).available);
    }

    #[test]
    fn booking_off_grid_marks_every_touched_slot() {
        let booked = vec![Span::new(at(9, 45), at(10, 15))];
        let grid = SlotGrid::new(day(), &cfg_with(&[]), booked, long_ago());
        let booked: Vec<_> = grid
            .iter()
            .filter(|s| s.status == "Booked")
            .map(|s| s.start)
            .collect();
        assert_eq!(booked, vec![at(9, 30), at(10, 0)]);
    }

    #[test]
    fn iteration_is_restartable() {
        let booked = vec![Span::new(at(12, 0), at(12, 30))];
        let grid = SlotGrid::new(day(), &cfg_with(&[]), booked, at(9, 0));
        let first: Vec<_> = grid.iter().collect();
        let second: Vec<_> = (&grid).into_iter().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn inverted_hours_yield_nothing() {
        let cfg = cfg_with(&[(BUSINESS_END_KEY, "06:00")]);
        let grid = SlotGrid::new(day(), &cfg, vec![], long_ago());
        assert!(SlotGrid::day_window(day(), &cfg).is_none());
        assert_eq!(grid.iter().count(), 0);
    }
}
