use ulid::Ulid;

use crate::model::BookingStatus;

use super::EngineError;

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Done)
    }
}

/// What a requested status change amounts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Write the new status.
    Apply,
    /// Already in the target state.
    NoOp,
}

/// `PENDING → CANCELLED | DONE`; terminal states never change. Repeating the
/// current terminal state is a no-op rather than an error.
pub fn plan_transition(id: Ulid, from: BookingStatus, to: BookingStatus) -> Result<Transition, EngineError> {
    if from == to {
        return Ok(Transition::NoOp);
    }
    if from.is_terminal() || to == BookingStatus::Pending {
        return Err(EngineError::InvalidTransition { id, from, to });
    }
    Ok(Transition::Apply)
}
