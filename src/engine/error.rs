use thiserror::Error;
use ulid::Ulid;

use crate::model::{Booking, BookingStatus, Wicket};

/// A request that breaks booking policy. Never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("cannot book a session in the past")]
    InPast,
    #[error("duration must be a positive multiple of {slot_minutes} minutes")]
    DurationNotMultiple { slot_minutes: u32 },
    #[error("bookings are only available from {start} to {end}")]
    OutsideBusinessHours { start: String, end: String },
    #[error("bookings must align to {slot_minutes}-minute boundaries")]
    Misaligned { slot_minutes: u32 },
    #[error("leather ball machine requires a ball option (machine ball or player's leather ball)")]
    MissingBallOption,
    #[error("too many slots in one request: {0}")]
    TooManySlots(usize),
    #[error("{0} too long")]
    TooLong(&'static str),
    #[error("invalid value {value:?} for config key {key:?}")]
    InvalidConfigValue { key: String, value: String },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{wicket} is already booked for the selected time (booking {existing})")]
    Conflict { wicket: Wicket, existing: Ulid },
    #[error("no machine operators available for this time slot")]
    NoOperators,
    #[error("timed out waiting for lock {0:?}, retry the request")]
    Contention(String),
    #[error("booking not found: {0}")]
    NotFound(Ulid),
    #[error("booking {id} is {from}, cannot move to {to}")]
    InvalidTransition {
        id: Ulid,
        from: BookingStatus,
        to: BookingStatus,
    },
    #[error("journal error: {0}")]
    Journal(String),
}

impl EngineError {
    /// Only lock contention is safe to retry with the identical request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Contention(_))
    }

    /// Short label for rejection metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::Conflict { .. } => "conflict",
            EngineError::NoOperators => "capacity",
            EngineError::Contention(_) => "contention",
            EngineError::NotFound(_) => "not_found",
            EngineError::InvalidTransition { .. } => "invalid_transition",
            EngineError::Journal(_) => "journal",
        }
    }
}

/// A multi-slot request stopped part way. Groups in `committed` stay booked.
#[derive(Debug, Error)]
#[error("multi-slot booking stopped after {} committed group(s): {source}", .committed.len())]
pub struct MultiBookingError {
    pub committed: Vec<Booking>,
    #[source]
    pub source: EngineError,
}
