//! Spreadsheet serial date conversion
//!
//! Serial day numbers count from 1899-12-30 (two days before 1900-01-01,
//! compensating for the phantom 1900-02-29 of the classic format). The
//! fractional part is the time of day.

use crate::ingest::sheet::CellValue;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

/// 1899-12-30T00:00:00 as Unix milliseconds
const EPOCH_UNIX_MILLIS: i64 = -2_209_161_600_000;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

/// Convert a serial day number to a timestamp (millisecond precision)
///
/// Returns `None` for non-finite or out-of-range input.
pub fn from_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }

    let offset = (serial * MILLIS_PER_DAY).round();
    if offset.abs() >= i64::MAX as f64 {
        return None;
    }

    let millis = EPOCH_UNIX_MILLIS.checked_add(offset as i64)?;
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

/// Serial day number of a timestamp
pub fn to_serial(timestamp: NaiveDateTime) -> f64 {
    (timestamp.and_utc().timestamp_millis() - EPOCH_UNIX_MILLIS) as f64 / MILLIS_PER_DAY
}

/// Interpret a cell as a date
///
/// Numbers (and text holding a number) are serials; other text is tried
/// against ISO and `DD/MM/YYYY` layouts. Anything else yields `None`.
pub fn parse_date_cell(cell: &CellValue) -> Option<NaiveDateTime> {
    match cell {
        CellValue::Number(n) => from_serial(*n),
        CellValue::Text(s) => parse_date_text(s),
        CellValue::Empty | CellValue::Bool(_) => None,
    }
}

fn parse_date_text(text: &str) -> Option<NaiveDateTime> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(serial) = trimmed.parse::<f64>() {
        return from_serial(serial);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_local());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_offset_zero_is_epoch() {
        assert_eq!(from_serial(0.0), Some(date(1899, 12, 30)));
    }

    #[test]
    fn test_offset_one_is_next_day() {
        assert_eq!(from_serial(1.0), Some(date(1899, 12, 31)));
        assert_eq!(from_serial(2.0), Some(date(1900, 1, 1)));
    }

    #[test]
    fn test_known_serial() {
        assert_eq!(from_serial(45306.0), Some(date(2024, 1, 15)));
    }

    #[test]
    fn test_fraction_is_time_of_day() {
        let ts = from_serial(45306.75).unwrap();
        assert_eq!(ts, date(2024, 1, 15) + chrono::TimeDelta::hours(18));
    }

    #[test]
    fn test_integer_round_trip_exact() {
        for serial in [0.0, 1.0, 59.0, 61.0, 25569.0, 45306.0, 60000.0, -10.0] {
            let ts = from_serial(serial).unwrap();
            assert_eq!(to_serial(ts), serial);
        }
    }

    #[test]
    fn test_invalid_serials() {
        assert_eq!(from_serial(f64::NAN), None);
        assert_eq!(from_serial(f64::INFINITY), None);
        assert_eq!(from_serial(1e300), None);
    }

    #[test]
    fn test_parse_cells() {
        assert_eq!(parse_date_cell(&CellValue::Empty), None);
        assert_eq!(parse_date_cell(&CellValue::Number(45306.0)), Some(date(2024, 1, 15)));
        assert_eq!(
            parse_date_cell(&CellValue::Text("45306".to_string())),
            Some(date(2024, 1, 15))
        );
        assert_eq!(
            parse_date_cell(&CellValue::Text("2024-01-15".to_string())),
            Some(date(2024, 1, 15))
        );
        assert_eq!(
            parse_date_cell(&CellValue::Text("15/01/2024".to_string())),
            Some(date(2024, 1, 15))
        );
        assert_eq!(
            parse_date_cell(&CellValue::Text("2024-01-15 00:00:00".to_string())),
            Some(date(2024, 1, 15))
        );
        assert_eq!(parse_date_cell(&CellValue::Text("ontem".to_string())), None);
    }
}
