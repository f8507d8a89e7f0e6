//! Lenient value parsing for loosely typed site metadata

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
    "%Y%m%d%H%M%S",
];

const DATETIME_TZ_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S %z", "%Y/%m/%d %H:%M:%S %z"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

/// Parse a publish time like `2016-02-12 20:25:56` into a UNIX timestamp.
///
/// Values without an explicit offset are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp());
    }
    for fmt in DATETIME_TZ_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.timestamp());
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&dt).timestamp());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|dt| Utc.from_utc_datetime(&dt).timestamp());
        }
    }
    None
}

/// `YYYYMMDD` for a UNIX timestamp
pub fn upload_date(timestamp: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(timestamp, 0).map(|dt| dt.format("%Y%m%d").to_string())
}

/// Number or numeric string as `f64`
pub fn float_or_none(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Non-empty string value
pub fn str_or_none(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_timestamp_plain() {
        assert_eq!(parse_timestamp("2016-02-12 12:25:56"), Some(1455279956));
        assert_eq!(parse_timestamp("2016/02/12 12:25:56"), Some(1455279956));
    }

    #[test]
    fn test_parse_timestamp_with_offset() {
        assert_eq!(parse_timestamp("2016-02-12 20:25:56 +0800"), Some(1455279956));
        assert_eq!(parse_timestamp("2016-02-12T20:25:56+08:00"), Some(1455279956));
    }

    #[test]
    fn test_parse_timestamp_date_only_and_garbage() {
        assert_eq!(parse_timestamp("2016-02-12"), Some(1455235200));
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("  "), None);
    }

    #[test]
    fn test_upload_date() {
        assert_eq!(upload_date(1455279956).as_deref(), Some("20160212"));
    }

    #[test]
    fn test_float_or_none() {
        assert_eq!(float_or_none(&json!(98)), Some(98.0));
        assert_eq!(float_or_none(&json!("37.5")), Some(37.5));
        assert_eq!(float_or_none(&json!("n/a")), None);
        assert_eq!(float_or_none(&json!(null)), None);
    }

    #[test]
    fn test_str_or_none() {
        assert_eq!(str_or_none(&json!("x")), Some("x"));
        assert_eq!(str_or_none(&json!("")), None);
        assert_eq!(str_or_none(&json!(1)), None);
    }
}
