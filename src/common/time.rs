//! Time utilities.

use chrono::Utc;

/// Current Unix timestamp in UTC milliseconds.
///
/// Message timestamps and slot poll times all use this single
/// representation; formatting for display is the client's concern.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
