//! Operator allocation for machine sessions.
//!
//! | machine           | operator requested                  | pool exhausted          |
//! |-------------------|-------------------------------------|-------------------------|
//! | none              | never                               | n/a                     |
//! | tennis-ball       | unless the player self-operates     | fall back to self-operated |
//! | leather-ball      | always (ball option required)       | reject                  |

use tracing::info;

use crate::model::*;

use super::{EngineError, ValidationError};

/// Outcome for a request that passed the operator check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub self_operated: bool,
    /// The pool was full and the request was switched to self-operation.
    pub fell_back: bool,
}

/// The leather-ball machine needs to know which ball to feed.
pub fn require_ball_option(machine: MachineMode, option: LeatherBallOption) -> Result<(), ValidationError> {
    if machine == MachineMode::LeatherBallMachine && option == LeatherBallOption::None {
        return Err(ValidationError::MissingBallOption);
    }
    Ok(())
}

/// Whether the request, as asked, would take an operator from the pool.
pub fn needs_operator(machine: MachineMode, self_operate_requested: bool) -> bool {
    match machine {
        MachineMode::None => false,
        MachineMode::TennisBallMachine => !self_operate_requested,
        MachineMode::LeatherBallMachine => true,
    }
}

/// Operators already busy: overlapping active bookings on any wicket that run
/// a machine and are not self-operated.
pub fn busy_operators<'a>(overlapping: impl IntoIterator<Item = &'a Booking>) -> usize {
    overlapping.into_iter().filter(|b| b.is_active() && b.holds_operator()).count()
}

/// Decide the operator outcome given how many operators are already busy.
pub fn allocate(
    machine: MachineMode,
    self_operate_requested: bool,
    busy: usize,
    capacity: u32,
) -> Result<Allocation, EngineError> {
    let self_operated = machine == MachineMode::TennisBallMachine && self_operate_requested;
    if !needs_operator(machine, self_operate_requested) {
        return Ok(Allocation {
            self_operated,
            fell_back: false,
        });
    }

    if busy < capacity as usize {
        return Ok(Allocation {
            self_operated: false,
            fell_back: false,
        });
    }

    match machine {
        MachineMode::TennisBallMachine => {
            info!(busy, capacity, "operators exhausted, switching tennis machine to self-operated");
            Ok(Allocation {
                self_operated: true,
                fell_back: true,
            })
        }
        _ => Err(EngineError::NoOperators),
    }
}
