// Elapsed-time buckets for "Last update ..." labels
use chrono::{DateTime, Utc};

/// Phrase the age of `then` relative to `now`.
///
/// Timestamps in the future (clock skew between device and viewer) read as
/// "just now".
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds();

    if seconds < 5 {
        return "just now".to_string();
    }
    if seconds < 60 {
        return format!("{} seconds ago", seconds);
    }

    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{} ago", plural(minutes, "minute"));
    }

    let hours = minutes / 60;
    if hours < 24 {
        return format!("{} ago", plural(hours, "hour"));
    }

    format!("{} ago", plural(hours / 24, "day"))
}

fn plural(n: i64, unit: &str) -> String {
    if n > 1 {
        format!("{} {}s", n, unit)
    } else {
        format!("{} {}", n, unit)
    }
}
