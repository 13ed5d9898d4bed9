//! Timestamp helpers. Everything is UTC.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

/// Display format used for SIM record fields.
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current time as a millisecond epoch integer.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert an epoch-millisecond value into a UTC datetime.
pub fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Format a datetime as `YYYY-MM-DD HH:MM:SS`.
pub fn format_display(at: &DateTime<Utc>) -> String {
    at.format(DISPLAY_FORMAT).to_string()
}

/// Render a portal timestamp (epoch milliseconds, integer or float) for display.
///
/// Returns `None` for null, missing or non-numeric values.
pub fn portal_timestamp_display(value: Option<&Value>) -> Option<String> {
    let millis = match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?,
        _ => return None,
    };
    from_millis(millis).map(|at| format_display(&at))
}
