use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Helper function to format the date
///
/// This function takes a `NaiveDate` and formats it as a string in the "dd-mm-yyyy" format.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d-%m-%Y").to_string()
}

/// Parses a calendar date from either `YYYY-MM-DD` or a full RFC 3339 timestamp.
///
/// Timestamps are reduced to their UTC date.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_date_time(text).map(|dt| dt.date_naive()))
}

/// Parses an instant from RFC 3339, a zone-less `YYYY-MM-DDTHH:MM:SS`
/// (read as UTC) or a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_date_time(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Logs method, path, status and latency of every request.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    log::info!(
        "{} {} -> {} ({} ms)",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;

    #[test]
    fn formats_day_first() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(format_date(date), "07-03-2025");
    }

    #[test]
    fn parses_plain_and_timestamp_dates() {
        let expected = NaiveDate::from_ymd_opt(1990, 5, 17);
        assert_eq!(parse_date("1990-05-17"), expected);
        assert_eq!(parse_date("1990-05-17T10:30:00Z"), expected);
        assert_eq!(parse_date("17/05/1990"), None);
        assert_eq!(parse_date("1990-02-30"), None);
    }

    #[test]
    fn parses_instants_in_several_shapes() {
        let with_offset = parse_date_time("2025-01-02T03:04:05+02:00").unwrap();
        assert_eq!(with_offset.hour(), 1);

        let zoneless = parse_date_time("2025-01-02T03:04:05").unwrap();
        assert_eq!(zoneless.hour(), 3);

        let date_only = parse_date_time("2025-01-02").unwrap();
        assert_eq!((date_only.day(), date_only.hour()), (2, 0));

        assert!(parse_date_time("yesterday").is_none());
    }
}
