use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use regex::Regex;

use crate::error::{Error, Result};

static RE_ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})(?:[ T].*)?$").unwrap());
static RE_BR_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{2})/(\d{2})/(\d{4})$").unwrap());

/// Get the first day of a given date's month.
pub fn first_day_of_month(d: NaiveDate) -> NaiveDate {
    d.with_day(1).unwrap_or(d)
}

/// Get the last day of a given month.
pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    next.expect("month is always 1..=12") - Duration::days(1)
}

/// Monday and Sunday of the ISO week containing `d`.
pub fn iso_week_bounds(d: NaiveDate) -> (NaiveDate, NaiveDate) {
    let monday = d - Duration::days(d.weekday().num_days_from_monday() as i64);
    debug_assert_eq!(monday.weekday(), Weekday::Mon);
    (monday, monday + Duration::days(6))
}

/// Parse a goal or fact date. Accepts `YYYY-MM-DD` (optionally followed by a
/// time part) and the `DD/MM/YYYY` form the billing export uses.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    let (y, m, d) = if let Some(caps) = RE_ISO_DATE.captures(s) {
        (caps[1].parse(), caps[2].parse(), caps[3].parse())
    } else if let Some(caps) = RE_BR_DATE.captures(s) {
        (caps[3].parse(), caps[2].parse(), caps[1].parse())
    } else {
        return Err(Error::InvalidParameter(format!("unrecognized date: {s:?}")));
    };
    match (y, m, d) {
        (Ok(y), Ok(m), Ok(d)) => NaiveDate::from_ymd_opt(y, m, d)
            .ok_or_else(|| Error::InvalidParameter(format!("date out of range: {s:?}"))),
        _ => Err(Error::InvalidParameter(format!("unrecognized date: {s:?}"))),
    }
}

pub fn to_key(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(
            last_day_of_month(2025, 1),
            NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()
        );
        assert_eq!(
            last_day_of_month(2025, 2),
            NaiveDate::from_ymd_opt(2025, 2, 28).unwrap()
        );
        assert_eq!(
            last_day_of_month(2024, 2),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        ); // Leap year
        assert_eq!(
            last_day_of_month(1900, 2),
            NaiveDate::from_ymd_opt(1900, 2, 28).unwrap()
        ); // Century, not leap
        assert_eq!(
            last_day_of_month(2000, 2),
            NaiveDate::from_ymd_opt(2000, 2, 29).unwrap()
        );
        assert_eq!(
            last_day_of_month(2025, 12),
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()
        );
    }

    #[test]
    fn test_iso_week_bounds() {
        // 2026-10-15 is a Thursday
        let (mon, sun) = iso_week_bounds(NaiveDate::from_ymd_opt(2026, 10, 15).unwrap());
        assert_eq!(mon, NaiveDate::from_ymd_opt(2026, 10, 12).unwrap());
        assert_eq!(sun, NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());

        // Week spanning a year boundary
        let (mon, sun) = iso_week_bounds(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert_eq!(mon, NaiveDate::from_ymd_opt(2025, 12, 29).unwrap());
        assert_eq!(sun, NaiveDate::from_ymd_opt(2026, 1, 4).unwrap());
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        assert_eq!(parse_date("2025-03-09").unwrap(), expected);
        assert_eq!(parse_date("2025-03-09 14:22:00").unwrap(), expected);
        assert_eq!(parse_date("09/03/2025").unwrap(), expected);
        assert_eq!(parse_date("  2025-03-09 ").unwrap(), expected);
    }

    #[test]
    fn test_parse_date_invalid() {
        assert!(parse_date("").is_err());
        assert!(parse_date("2025-02-30").is_err());
        assert!(parse_date("March 9").is_err());
        assert!(matches!(
            parse_date("2025-03-09garbage"),
            Err(Error::InvalidParameter(_))
        ));
        assert!(parse_date("2025-03-091").is_err());
        assert!(matches!(
            parse_date("31/31/2025"),
            Err(Error::InvalidParameter(_))
        ));
    }
}
