//! Relative age of a notification ("3 minutes ago").

use chrono::{DateTime, Utc};

const UNITS: [(f64, &str); 5] = [
    (31_536_000.0, "year"),
    (2_592_000.0, "month"),
    (86_400.0, "day"),
    (3_600.0, "hour"),
    (60.0, "minute"),
];

/// Format the age of `timestamp` relative to `now`.
///
/// Each unit is used once the interval is strictly greater than one of it, so
/// exactly 60 seconds still reads as seconds. Missing timestamps format as an
/// empty string and timestamps in the future as "just now".
pub fn format_age(timestamp: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(timestamp) = timestamp else {
        return String::new();
    };

    let seconds = (now - timestamp).num_seconds();
    if seconds < 0 {
        return "just now".to_string();
    }

    for (unit_secs, unit) in UNITS {
        let interval = seconds as f64 / unit_secs;
        if interval > 1.0 {
            return plural(interval.floor() as i64, unit);
        }
    }
    plural(seconds, "second")
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", n, unit)
    }
}
