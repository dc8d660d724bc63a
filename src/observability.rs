use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::command::Command;

// ── Booking outcomes ────────────────────────────────────────────

/// Counter: reservation attempts. Labels: outcome.
pub const RESERVATIONS_TOTAL: &str = "staylock_reservations_total";

/// Counter: cancellation attempts. Labels: outcome.
pub const CANCELLATIONS_TOTAL: &str = "staylock_cancellations_total";

/// Histogram: time spent waiting for a property's reservation lock.
pub const LOCK_WAIT_SECONDS: &str = "staylock_lock_wait_seconds";

/// Counter: lock waits that hit the configured timeout.
pub const LOCK_TIMEOUTS_TOTAL: &str = "staylock_lock_timeouts_total";

// ── Front end ───────────────────────────────────────────────────

/// Counter: commands executed. Labels: command, status.
pub const COMMANDS_TOTAL: &str = "staylock_commands_total";

/// Histogram: command latency in seconds. Labels: command.
pub const COMMAND_DURATION_SECONDS: &str = "staylock_command_duration_seconds";

pub const CONNECTIONS_ACTIVE: &str = "staylock_connections_active";

pub const CONNECTIONS_TOTAL: &str = "staylock_connections_total";

pub const CONNECTIONS_REJECTED_TOTAL: &str = "staylock_connections_rejected_total";

// ── Storage ─────────────────────────────────────────────────────

/// Histogram: group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "staylock_wal_flush_duration_seconds";

/// Histogram: events per group-commit flush.
pub const WAL_FLUSH_BATCH_SIZE: &str = "staylock_wal_flush_batch_size";

/// Install the Prometheus exporter on `port`. No-op when `port` is `None`.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Short metrics label for a command.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::RegisterProperty { .. } => "property",
        Command::Reserve { .. } => "reserve",
        Command::Cancel { .. } => "cancel",
        Command::Available { .. } => "available",
        Command::Booked { .. } => "booked",
        Command::Bookings { .. } => "bookings",
        Command::Blocked { .. } => "blocked",
        Command::Trips { .. } => "trips",
        Command::Listen { .. } => "listen",
    }
}
