use std::net::SocketAddr;

use crate::command::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: commands executed. Labels: command, status.
pub const COMMANDS_TOTAL: &str = "crease_commands_total";

/// Histogram: command latency in seconds. Labels: command.
pub const COMMAND_DURATION_SECONDS: &str = "crease_command_duration_seconds";

/// Counter: bookings written.
pub const BOOKINGS_CREATED_TOTAL: &str = "crease_bookings_created_total";

/// Counter: creation attempts refused. Labels: reason.
pub const BOOKING_REJECTIONS_TOTAL: &str = "crease_booking_rejections_total";

/// Counter: tennis-machine requests switched to self-operation.
pub const OPERATOR_FALLBACKS_TOTAL: &str = "crease_operator_fallbacks_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Histogram: time spent waiting for a resource lock, in seconds.
pub const LOCK_WAIT_SECONDS: &str = "crease_lock_wait_seconds";

/// Counter: lock acquisitions that hit the timeout.
pub const LOCK_TIMEOUTS_TOTAL: &str = "crease_lock_timeouts_total";

/// Histogram: journal group-commit flush duration in seconds.
pub const JOURNAL_FLUSH_DURATION_SECONDS: &str = "crease_journal_flush_duration_seconds";

/// Histogram: journal group-commit batch size (events per flush).
pub const JOURNAL_FLUSH_BATCH_SIZE: &str = "crease_journal_flush_batch_size";

/// Install the Prometheus exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::GetAvailableSlots { .. } => "get_available_slots",
        Command::BookSession(_) => "book_session",
        Command::BookMultipleSlots(_) => "book_multiple_slots",
        Command::GetUserBookings { .. } => "get_user_bookings",
        Command::GetUpcomingBookings => "get_upcoming_bookings",
        Command::ListAllBookings => "list_all_bookings",
        Command::GetBooking { .. } => "get_booking",
        Command::CancelBooking { .. } => "cancel_booking",
        Command::MarkBookingAsDone { .. } => "mark_booking_as_done",
        Command::GetSystemConfigs => "get_system_configs",
        Command::GetEffectiveConfig => "get_effective_config",
        Command::UpdateSystemConfig { .. } => "update_system_config",
        Command::GetDashboardStats => "get_dashboard_stats",
    }
}
