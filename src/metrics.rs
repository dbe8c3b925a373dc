//! Metric helpers for `eslframe`.
//!
//! This module defines metric names and thin helpers over the
//! [`metrics`](https://docs.rs/metrics) crate. Without the `metrics` feature
//! every helper compiles to nothing.

/// Name of the gauge tracking active connections.
pub const CONNECTIONS_ACTIVE: &str = "eslframe_connections_active";
/// Name of the counter tracking processed frames.
pub const FRAMES_PROCESSED: &str = "eslframe_frames_processed_total";
/// Name of the counter tracking commands written to the wire.
pub const COMMANDS_TOTAL: &str = "eslframe_commands_total";
/// Name of the counter tracking error occurrences.
pub const ERRORS_TOTAL: &str = "eslframe_errors_total";
/// Name of the counter tracking handler panics.
pub const HANDLER_PANICS: &str = "eslframe_handler_panics_total";

/// Direction of frame processing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Frames parsed from the peer.
    Inbound,
    /// Chunks queued for the peer.
    Outbound,
}

impl Direction {
    /// Label value used for the `direction` label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

#[cfg(feature = "metrics")]
mod imp {
    use metrics::{counter, gauge};

    use super::*;

    pub fn inc_connections() { gauge!(CONNECTIONS_ACTIVE).increment(1.0); }

    pub fn dec_connections() { gauge!(CONNECTIONS_ACTIVE).decrement(1.0); }

    pub fn inc_frames(direction: Direction) {
        counter!(FRAMES_PROCESSED, "direction" => direction.as_str()).increment(1);
    }

    pub fn inc_commands() { counter!(COMMANDS_TOTAL).increment(1); }

    pub fn inc_errors() { counter!(ERRORS_TOTAL).increment(1); }

    pub fn inc_handler_panics() { counter!(HANDLER_PANICS).increment(1); }
}

#[cfg(not(feature = "metrics"))]
mod imp {
    use super::Direction;

    pub fn inc_connections() {}

    pub fn dec_connections() {}

    pub fn inc_frames(_direction: Direction) {}

    pub fn inc_commands() {}

    pub fn inc_errors() {}

    pub fn inc_handler_panics() {}
}

/// Increment the active connections gauge.
pub fn inc_connections() { imp::inc_connections(); }

/// Decrement the active connections gauge.
pub fn dec_connections() { imp::dec_connections(); }

/// Record a processed frame for the given direction.
pub fn inc_frames(direction: Direction) { imp::inc_frames(direction); }

/// Record a command written to the peer.
pub fn inc_commands() { imp::inc_commands(); }

/// Record an error occurrence.
pub fn inc_errors() { imp::inc_errors(); }

/// Record a panic caught inside an event handler.
pub fn inc_handler_panics() { imp::inc_handler_panics(); }
