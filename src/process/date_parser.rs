use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parse an observation timestamp into a UTC instant.
///
/// Strings carrying an explicit offset are converted to UTC; everything else
/// is taken to already be UTC. Bare dates resolve to midnight.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }
    None
}

/// Parse a `YYYY-MM-DD` calendar day as written in summary output.
pub fn parse_day(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn offset_timestamps_convert_to_utc_day() {
        let ts = parse_timestamp("2024-06-01T23:30:00-05:00").unwrap();
        assert_eq!(ts.date_naive(), NaiveDate::from_ymd_opt(2024, 6, 2).unwrap());
        assert_eq!(ts.hour(), 4);
    }

    #[test]
    fn common_layouts_parse() {
        for raw in [
            "2024-06-01 14:05:09",
            "2024-06-01 14:05",
            "2024-06-01T14:05:09.250",
            "2024/06/01 14:05:09",
            "06/01/2024 14:05:09",
            "6/1/2024 2:05:09 PM",
            "06/01/2024 2:05 pm",
        ] {
            let ts = parse_timestamp(raw).unwrap_or_else(|| panic!("failed on {raw}"));
            assert_eq!((ts.year(), ts.month(), ts.day()), (2024, 6, 1), "{raw}");
            assert_eq!(ts.hour(), 14, "{raw}");
        }
    }

    #[test]
    fn bare_dates_are_midnight() {
        let ts = parse_timestamp("2024-06-05").unwrap();
        assert_eq!(ts.date_naive().to_string(), "2024-06-05");
        assert_eq!(ts.hour(), 0);
        assert!(parse_timestamp("06/05/2024").is_some());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("2024-13-01 00:00:00").is_none());
        assert!(parse_day("06/01/2024").is_none());
        assert_eq!(parse_day("2024-06-01").unwrap().day(), 1);
    }
}
