//! Typed command surface over the engine. One variant per operation, decoded
//! from `{"tool": "<name>", "args": {...}}` and mapped onto exactly one engine
//! method.

use std::time::Instant;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use ulid::Ulid;

use crate::config::{ConfigEntry, EffectiveConfig};
use crate::engine::{Engine, EngineError, MultiBookingError};
use crate::model::*;
use crate::observability::{command_label, COMMANDS_TOTAL, COMMAND_DURATION_SECONDS};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "tool", content = "args", rename_all = "snake_case")]
pub enum Command {
    GetAvailableSlots {
        date: NaiveDate,
        #[serde(default)]
        wicket: Wicket,
    },
    BookSession(BookingRequest),
    BookMultipleSlots(MultiBookingRequest),
    GetUserBookings {
        requester: String,
    },
    GetUpcomingBookings,
    ListAllBookings,
    GetBooking {
        id: Ulid,
    },
    CancelBooking {
        id: Ulid,
    },
    MarkBookingAsDone {
        id: Ulid,
    },
    GetSystemConfigs,
    GetEffectiveConfig,
    UpdateSystemConfig {
        key: String,
        value: String,
    },
    GetDashboardStats,
}

impl Command {
    pub fn from_json(line: &str) -> Result<Self, CommandError> {
        Ok(serde_json::from_str(line)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Reply {
    Slots(Vec<SlotStatus>),
    Booking(Booking),
    Bookings(Vec<Booking>),
    Cancelled { id: Ulid },
    Configs(Vec<ConfigEntry>),
    Config(EffectiveConfig),
    ConfigUpdated { key: String, value: String },
    Stats(BookingStats),
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("invalid command: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    MultiBooking(#[from] MultiBookingError),
}

impl CommandError {
    pub fn is_retryable(&self) -> bool {
        match self {
            CommandError::Parse(_) => false,
            CommandError::Engine(e) => e.is_retryable(),
            CommandError::MultiBooking(e) => e.source.is_retryable(),
        }
    }
}

/// One JSON object per command result. Partial multi-slot success keeps the
/// committed bookings next to the error.
pub fn response_json(result: &Result<Reply, CommandError>) -> Value {
    match result {
        Ok(reply) => json!({ "ok": true, "reply": reply }),
        Err(CommandError::MultiBooking(e)) => json!({
            "ok": false,
            "error": e.source.to_string(),
            "retryable": e.source.is_retryable(),
            "committed": e.committed,
        }),
        Err(e) => json!({
            "ok": false,
            "error": e.to_string(),
            "retryable": e.is_retryable(),
        }),
    }
}

impl Engine {
    pub async fn execute(&self, cmd: Command) -> Result<Reply, CommandError> {
        let label = command_label(&cmd);
        let started = Instant::now();
        let result = self.dispatch(cmd).await;

        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(COMMANDS_TOTAL, "command" => label, "status" => status).increment(1);
        metrics::histogram!(COMMAND_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn dispatch(&self, cmd: Command) -> Result<Reply, CommandError> {
        let reply = match cmd {
            Command::GetAvailableSlots { date, wicket } => Reply::Slots(self.resolve_slots(date, wicket)),
            Command::BookSession(req) => Reply::Booking(self.create_booking(req).await?),
            Command::BookMultipleSlots(req) => Reply::Bookings(self.create_multi_booking(req).await?),
            Command::GetUserBookings { requester } => {
                Reply::Bookings(self.list_bookings(&BookingFilter::ByRequester(requester)))
            }
            Command::GetUpcomingBookings => Reply::Bookings(self.list_bookings(&BookingFilter::Upcoming)),
            Command::ListAllBookings => Reply::Bookings(self.list_bookings(&BookingFilter::All)),
            Command::GetBooking { id } => Reply::Booking(self.get_booking(&id)?),
            Command::CancelBooking { id } => {
                self.cancel_booking(id).await?;
                Reply::Cancelled { id }
            }
            Command::MarkBookingAsDone { id } => Reply::Booking(self.mark_done(id).await?),
            Command::GetSystemConfigs => Reply::Configs(self.config_overrides()),
            Command::GetEffectiveConfig => Reply::Config(self.effective_config()),
            Command::UpdateSystemConfig { key, value } => {
                self.set_config_override(key.clone(), value.clone()).await?;
                Reply::ConfigUpdated { key, value }
            }
            Command::GetDashboardStats => Reply::Stats(self.stats()),
        };
        Ok(reply)
    }
}
