//! Small text and time helpers shared by commands.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use std::time::Duration;

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// ISO-8601 with second precision. Without the timezone the value is the
/// naive UTC wall time.
pub fn format_timestamp(dt: &DateTime<Utc>, include_timezone: bool) -> String {
    if include_timezone {
        dt.to_rfc3339_opts(SecondsFormat::Secs, false)
    } else {
        dt.naive_utc().format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}

/// Parses an ISO-8601 timestamp. Values without an offset are taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Shortens `message` to at most `max_chars` characters, ending with
/// `ellipsis` when something was cut.
pub fn truncate_message(message: &str, max_chars: usize, ellipsis: &str) -> String {
    if message.chars().count() <= max_chars {
        return message.to_string();
    }
    let cutoff = max_chars.saturating_sub(ellipsis.chars().count());
    let mut truncated: String = message.chars().take(cutoff).collect();
    if cutoff > 0 {
        truncated.push_str(ellipsis);
    }
    truncated
}

/// `1d 2h 3m 4s`, dropping leading units that are zero.
pub fn format_uptime(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if days > 0 || hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if days > 0 || hours > 0 || minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    parts.push(format!("{seconds}s"));
    parts.join(" ")
}

/// Discord's `<t:unix:style>` markup.
pub fn discord_timestamp(dt: &DateTime<Utc>, style: char) -> String {
    format!("<t:{}:{}>", dt.timestamp(), style)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    #[test]
    fn test_format_timestamp() {
        let dt = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
            + chrono::Duration::milliseconds(900);
        assert_eq!(format_timestamp(&dt, false), "2025-01-02T03:04:05");
        assert_eq!(format_timestamp(&dt, true), "2025-01-02T03:04:05+00:00");
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let expected = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();

        assert_eq!(parse_timestamp("2025-01-02T03:04:05+00:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-01-02T03:04:05Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-01-02T03:04:05"), Some(expected));
        assert_eq!(parse_timestamp("2025-01-02 03:04:05"), Some(expected));

        // Offsets are normalised to UTC
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let local = offset.with_ymd_and_hms(2025, 1, 2, 5, 4, 5).unwrap();
        assert_eq!(parse_timestamp(&local.to_rfc3339()), Some(expected));

        let fractional = parse_timestamp("2025-01-02T03:04:05.250000+00:00").unwrap();
        assert_eq!(fractional.timestamp(), expected.timestamp());

        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("not a date"), None);
    }

    #[test]
    fn test_truncate_message() {
        assert_eq!(truncate_message("hello", 10, "..."), "hello");
        assert_eq!(truncate_message("hello world", 8, "..."), "hello...");
        assert_eq!(truncate_message("hello", 2, "..."), "");
        assert_eq!(truncate_message("héllo wörld", 6, "…"), "héllo…");
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "0s");
        assert_eq!(format_uptime(Duration::from_secs(59)), "59s");
        assert_eq!(format_uptime(Duration::from_secs(3723)), "1h 2m 3s");
        assert_eq!(format_uptime(Duration::from_secs(86_400 + 5)), "1d 0h 0m 5s");
    }

    #[test]
    fn test_discord_timestamp() {
        let dt = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(discord_timestamp(&dt, 'R'), "<t:1700000000:R>");
    }
}
