//! Time helpers for the reconciliation scheduler

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};

/// Compute the next occurrence of `hour:minute` (UTC) strictly after `now`.
///
/// If today's slot has already passed (or is exactly now), returns
/// tomorrow's slot.
pub fn next_daily_run(now: DateTime<Utc>, hour: u32, minute: u32) -> DateTime<Utc> {
    let slot = NaiveTime::from_hms_opt(hour, minute, 0)
        .unwrap_or(NaiveTime::MIN);
    let candidate = Utc.from_utc_datetime(&now.date_naive().and_time(slot));

    if candidate > now {
        candidate
    } else {
        candidate + Duration::days(1)
    }
}

/// Parse an ISO-8601 / RFC-3339 timestamp from a provider payload.
///
/// WooCommerce emits naive timestamps in `date_created_gmt` style fields;
/// those are interpreted as UTC.
pub fn parse_provider_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_next_run_later_today() {
        let now = utc(2025, 6, 15, 1, 30, 0);
        assert_eq!(next_daily_run(now, 3, 0), utc(2025, 6, 15, 3, 0, 0));
    }

    #[test]
    fn test_next_run_tomorrow_when_passed() {
        let now = utc(2025, 6, 15, 4, 0, 0);
        assert_eq!(next_daily_run(now, 3, 0), utc(2025, 6, 16, 3, 0, 0));
    }

    #[test]
    fn test_next_run_exact_boundary_rolls_over() {
        let now = utc(2025, 6, 15, 3, 0, 0);
        assert_eq!(next_daily_run(now, 3, 0), utc(2025, 6, 16, 3, 0, 0));
    }

    #[test]
    fn test_next_run_month_rollover() {
        let now = utc(2025, 6, 30, 23, 59, 0);
        assert_eq!(next_daily_run(now, 3, 0), utc(2025, 7, 1, 3, 0, 0));
    }

    #[test]
    fn test_parse_naive_gmt_timestamp() {
        let dt = parse_provider_timestamp("2025-06-15T10:30:00").unwrap();
        assert_eq!(dt, utc(2025, 6, 15, 10, 30, 0));
    }

    #[test]
    fn test_parse_rfc3339_timestamp() {
        let dt = parse_provider_timestamp("2025-06-15T10:30:00+02:00").unwrap();
        assert_eq!(dt, utc(2025, 6, 15, 8, 30, 0));
    }

    #[test]
    fn test_parse_invalid_timestamp() {
        assert!(parse_provider_timestamp("not a date").is_none());
        assert!(parse_provider_timestamp("").is_none());
    }
}
