use chrono::{NaiveDateTime, Timelike};

use crate::config::{minute_of_day, EffectiveConfig};
use crate::limits::*;

use super::ValidationError;

/// Check a candidate `(start, duration)` against the grid and business hours.
/// Checks run in a fixed order and the first failure is returned.
pub fn validate_booking_time(
    start: NaiveDateTime,
    duration_minutes: u32,
    cfg: &EffectiveConfig,
    now: NaiveDateTime,
) -> Result<(), ValidationError> {
    if start <= now {
        return Err(ValidationError::InPast);
    }

    let slot = cfg.slot_minutes;
    if duration_minutes == 0 || slot == 0 || duration_minutes % slot != 0 {
        return Err(ValidationError::DurationNotMultiple { slot_minutes: slot });
    }

    // Minutes since midnight, no wrap: a session running past midnight ends
    // after any business-hours end.
    let start_minute = minute_of_day(start.time());
    let within_hours = start_minute
        .checked_add(duration_minutes)
        .is_some_and(|end_minute| end_minute <= cfg.business_end_minute());
    if start_minute < cfg.business_start_minute() || !within_hours {
        return Err(ValidationError::OutsideBusinessHours {
            start: cfg.business_start.format("%H:%M").to_string(),
            end: cfg.business_end.format("%H:%M").to_string(),
        });
    }

    if start_minute % slot != 0 || start.second() != 0 || start.nanosecond() != 0 {
        return Err(ValidationError::Misaligned { slot_minutes: slot });
    }

    Ok(())
}

pub fn validate_names(requester: Option<&str>, player_name: Option<&str>) -> Result<(), ValidationError> {
    if requester.is_some_and(|r| r.len() > MAX_REQUESTER_LEN) {
        return Err(ValidationError::TooLong("requester"));
    }
    if player_name.is_some_and(|n| n.len() > MAX_PLAYER_NAME_LEN) {
        return Err(ValidationError::TooLong("player name"));
    }
    Ok(())
}
