use chrono::{DateTime, NaiveDateTime};

/// `HH:MM:SS` label for a producer timestamp, in the timestamp's own offset.
///
/// The viewer's local zone is never consulted, so every dashboard following a
/// meeting renders the same transcript for the same history.
///
/// Falls back to the raw string when it is neither RFC 3339 nor a naive
/// ISO-8601 date-time.
pub fn timestamp_label(timestamp: &str) -> String {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(timestamp) {
        return parsed.format("%H:%M:%S").to_string();
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f") {
        return parsed.format("%H:%M:%S").to_string();
    }
    timestamp.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_rfc3339_and_naive_timestamps() {
        assert_eq!(timestamp_label("2025-06-03T12:00:05.000Z"), "12:00:05");
        assert_eq!(timestamp_label("2025-06-03T09:15:00+02:00"), "09:15:00");
        assert_eq!(timestamp_label("2025-06-03T12:01:30.123456"), "12:01:30");
        assert_eq!(timestamp_label("2025-06-03T12:01:30"), "12:01:30");
    }

    #[test]
    fn unparseable_timestamps_pass_through() {
        assert_eq!(timestamp_label("frame-7"), "frame-7");
        assert_eq!(timestamp_label(""), "");
    }
}
