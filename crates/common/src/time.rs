use chrono::{DateTime, Utc};

/// Current UTC time as naive ISO-8601 with microseconds (`2024-05-01T08:30:00.123456`),
/// the format stored in conversation history.
pub fn now_iso() -> String {
    format_iso(Utc::now())
}

pub fn format_iso(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

#[cfg(test)]
mod tests {
    use {super::*, chrono::TimeZone};

    #[test]
    fn iso_has_microseconds_and_no_offset() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).single().unwrap();
        assert_eq!(format_iso(ts), "2024-05-01T08:30:00.000000");
    }
}
