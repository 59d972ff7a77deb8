//! ClickHouse-specific utility functions

use chrono::{DateTime, Utc};

/// Convert chrono DateTime to the `time` type the ClickHouse serde helpers expect
pub fn chrono_to_time(dt: DateTime<Utc>) -> time::OffsetDateTime {
    time::OffsetDateTime::from_unix_timestamp_nanos(dt.timestamp_nanos_opt().unwrap_or(0) as i128)
        .unwrap_or(time::OffsetDateTime::UNIX_EPOCH)
}

/// Convert a `toUnixTimestamp64Micro(...)` result back to chrono
pub fn micros_to_chrono(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or(DateTime::UNIX_EPOCH)
}
