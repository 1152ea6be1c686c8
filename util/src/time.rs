//! General time utility functions

use chrono;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    if let Some(ns) = duration.num_nanoseconds() {
        Some(ns as f64 / NANOS_PER_SECOND as f64)
    }
    else {
        None
    }
}

/// Convert a duration into a number of seconds, clamping negative durations
/// to zero.
///
/// Elapsed-time calculations in cyclic processing must tolerate a clock
/// which has not advanced (or has stepped backwards) between two samples,
/// so this function never returns a negative value.
pub fn elapsed_seconds(duration: chrono::Duration) -> f64 {
    match duration_to_seconds(duration) {
        Some(s) if s > 0.0 => s,
        _ => 0.0,
    }
}
