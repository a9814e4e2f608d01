use chrono::{DateTime, Utc};

pub fn now_i64() -> i64 {
    Utc::now().timestamp()
}

pub fn from_unix(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

/// Seconds left until `at`, never negative.
pub fn remaining_seconds(at: &DateTime<Utc>) -> i64 {
    (at.timestamp() - now_i64()).max(0)
}
