//! Timestamp utilities

use chrono::{DateTime, Local, NaiveDateTime, Utc};

const SECONDS_PER_DAY: i64 = 86_400;

/// Current local wall-clock time
///
/// Sale dates come from spreadsheets without a time zone, so elapsed-day
/// arithmetic runs on naive local timestamps.
pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Current instant in UTC, for audit columns stored with a time zone
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Whole days elapsed from `since` to `now`, rounded toward negative infinity
pub fn elapsed_days(now: NaiveDateTime, since: NaiveDateTime) -> i64 {
    (now - since).num_seconds().div_euclid(SECONDS_PER_DAY)
}

/// Format a timestamp as `DD/MM/YYYY`
pub fn format_br_date(timestamp: NaiveDateTime) -> String {
    timestamp.format("%d/%m/%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_now_returns_recent_timestamp() {
        let timestamp = now();
        // After 2000-01-01 and before 2100-01-01
        assert!(timestamp.and_utc().timestamp() > 946_684_800);
        assert!(timestamp.and_utc().timestamp() < 4_102_444_800);
    }

    #[test]
    fn test_elapsed_days_whole_days() {
        assert_eq!(elapsed_days(at(2024, 3, 1, 0), at(2024, 1, 31, 0)), 30);
    }

    #[test]
    fn test_elapsed_days_floors_partial_day() {
        // 1 day 23 hours
        assert_eq!(elapsed_days(at(2024, 1, 3, 23), at(2024, 1, 2, 0)), 1);
        assert_eq!(elapsed_days(at(2024, 1, 2, 23), at(2024, 1, 2, 0)), 0);
    }

    #[test]
    fn test_elapsed_days_future_date_is_negative() {
        // 12 hours in the future floors to -1
        assert_eq!(elapsed_days(at(2024, 1, 2, 0), at(2024, 1, 2, 12)), -1);
    }

    #[test]
    fn test_format_br_date() {
        assert_eq!(format_br_date(at(2024, 1, 15, 10)), "15/01/2024");
    }
}
