//! Date conversions shared by the pipelines: epoch milliseconds, compact
//! `YYYYMMDD` strings/integers, proleptic Gregorian ordinals and loosely
//! formatted attribute dates.
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{Error, Result};

/// UTC calendar date of a millisecond timestamp
pub fn date_from_millis(ms: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.date_naive())
}

/// Milliseconds since the epoch of a date at UTC midnight
pub fn millis_from_date(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

/// `YYYYMMDD` integer for a date
pub fn yyyymmdd(date: NaiveDate) -> i32 {
    date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32
}

/// Inverse of [`yyyymmdd`]
pub fn date_from_yyyymmdd(value: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(value / 10_000, (value / 100 % 100) as u32, (value % 100) as u32)
}

/// Compact `YYYYMMDD` string for a date
pub fn compact(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Date from a proleptic Gregorian ordinal where day 1 is 0001-01-01
pub fn date_from_ordinal(ordinal: i64) -> Option<NaiveDate> {
    let ce_day = i32::try_from(ordinal).ok()?;
    NaiveDate::from_num_days_from_ce_opt(ce_day)
}

/// Day of year (1-based) and number of days in that year
pub fn day_of_year(date: NaiveDate) -> (u32, u32) {
    let days_in_year = if date.leap_year() { 366 } else { 365 };
    (date.ordinal(), days_in_year)
}

/// Parse a date as written in attribute tables and config files.
///
/// Accepts `YYYY-MM-DD`, `YYYY/MM/DD`, `YYYYMMDD`, and any of those followed by
/// a time of day (`T` or space separated), plus RFC 3339 timestamps.
///
/// Only the calendar day is kept. A time of day is dropped, and an RFC 3339
/// timestamp is first converted to UTC, so `2022-08-01T23:30:00-02:00` reads
/// as 2022-08-02. Date windows built from these values are day-granular, with
/// bounds at UTC midnight.
pub fn parse_flexible(value: &str) -> Result<NaiveDate> {
    let s = value.trim();
    if s.is_empty() {
        return Err(Error::InvalidDate {
            value: value.to_string(),
        });
    }
    if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
        return s
            .parse::<i32>()
            .ok()
            .and_then(date_from_yyyymmdd)
            .ok_or_else(|| Error::InvalidDate {
                value: value.to_string(),
            });
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_utc().date());
    }
    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
    }
    Err(Error::InvalidDate {
        value: value.to_string(),
    })
}

/// Midpoint between two dates, rounding towards the earlier day
pub fn midpoint(start: NaiveDate, end: NaiveDate) -> NaiveDate {
    let days = (end - start).num_days().div_euclid(2);
    start + chrono::Duration::days(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn millis_round_trip_is_utc() {
        // 2021-03-15T23:30:00Z still belongs to the 15th
        let ms = 1_615_851_000_000;
        assert_eq!(date_from_millis(ms), Some(d(2021, 3, 15)));
        assert_eq!(millis_from_date(d(1970, 1, 2)), 86_400_000);
    }

    #[test]
    fn compact_integer_encoding() {
        assert_eq!(yyyymmdd(d(2019, 7, 4)), 20190704);
        assert_eq!(date_from_yyyymmdd(20190704), Some(d(2019, 7, 4)));
        assert_eq!(date_from_yyyymmdd(20190231), None);
        assert_eq!(compact(d(2020, 1, 9)), "20200109");
    }

    #[test]
    fn ordinal_day_one_is_year_one() {
        assert_eq!(date_from_ordinal(1), Some(d(1, 1, 1)));
        // proleptic Gregorian day count
        assert_eq!(date_from_ordinal(737_425), Some(d(2020, 1, 1)));
    }

    #[test]
    fn flexible_parsing() {
        assert_eq!(parse_flexible("2022-08-01").unwrap(), d(2022, 8, 1));
        assert_eq!(parse_flexible("2022/08/01").unwrap(), d(2022, 8, 1));
        assert_eq!(parse_flexible("20220801").unwrap(), d(2022, 8, 1));
        assert_eq!(parse_flexible("2022-08-01 14:25:00").unwrap(), d(2022, 8, 1));
        assert_eq!(
            parse_flexible("2022-08-01T23:59:00+00:00").unwrap(),
            d(2022, 8, 1)
        );
        assert_eq!(
            parse_flexible("2022-08-01T23:30:00-02:00").unwrap(),
            d(2022, 8, 2)
        );
        assert_eq!(parse_flexible("2022-08-01T12:00:00.250Z").unwrap(), d(2022, 8, 1));
        assert!(parse_flexible("").is_err());
        assert!(parse_flexible("not a date").is_err());
    }

    #[test]
    fn midpoint_floors_towards_start() {
        assert_eq!(midpoint(d(2021, 1, 1), d(2021, 1, 4)), d(2021, 1, 2));
        assert_eq!(midpoint(d(2021, 1, 1), d(2021, 1, 5)), d(2021, 1, 3));
        // reversed ranges floor towards the past, as integer division does
        assert_eq!(midpoint(d(2021, 1, 4), d(2021, 1, 1)), d(2021, 1, 2));
    }

    #[test]
    fn leap_years() {
        assert_eq!(day_of_year(d(2020, 12, 31)), (366, 366));
        assert_eq!(day_of_year(d(2021, 1, 1)), (1, 365));
    }
}
