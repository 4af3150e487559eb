//! Wall-clock helpers. Time is consulted only for timestamps, freshness
//! windows, and rotation schedules — never for ordering decisions.

/// Forward clock-skew tolerance for content timestamps and document
/// creation times: 5 minutes.
pub const FUTURE_TOLERANCE_MS: i64 = 5 * 60 * 1000;

/// A signed prekey is due for rotation after 7 days.
pub const SIGNED_PREKEY_ROTATION_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Current time as Unix epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
