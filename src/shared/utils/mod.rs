use chrono::{DateTime, SecondsFormat, Utc};

/// Current UTC time as RFC 3339 with microsecond precision.
///
/// Fixed-width timestamps compare lexicographically in time order, which the
/// queue relies on for `ORDER BY created_at`.
pub fn now_rfc3339() -> String {
    format_timestamp(Utc::now())
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}
