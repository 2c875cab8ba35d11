//! Internal helpers for parsing and rounding.
//!
//! These utilities are **not** part of the public API. They centralize the
//! date format and the rounding rule so every table agrees on them.

use chrono::{Datelike, NaiveDate};

use crate::{EngineError, ResultEngine};

/// Date format used by every source (`YYYY-MM-DD`).
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

/// Smallest currency unit kept in converted columns.
pub(crate) const CENT: f64 = 0.01;

/// Parse a source date, reporting the offending value on failure.
pub(crate) fn parse_date(value: &str) -> ResultEngine<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| EngineError::MalformedDate(value.to_string()))
}

/// First day of the month containing `date`.
pub(crate) fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Round `value` to the nearest multiple of `unit`.
pub(crate) fn round_to(value: f64, unit: f64) -> f64 {
    let rounded = (value / unit).round() * unit;
    // Keep 0.1 + 0.2 style noise out of the stored values.
    (rounded * 1e6).round() / 1e6
}

pub(crate) fn contains(list: &[String], value: &str) -> bool {
    list.iter().any(|item| item == value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_cents() {
        assert_eq!(round_to(1.005_1, CENT), 1.01);
        assert_eq!(round_to(-2.344, CENT), -2.34);
        assert_eq!(round_to(0.1 + 0.2, CENT), 0.3);
    }

    #[test]
    fn parses_dates_and_months() {
        let date = parse_date("2024-02-17").unwrap();
        assert_eq!(month_start(date), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(
            parse_date("17/02/2024"),
            Err(EngineError::MalformedDate("17/02/2024".to_string()))
        );
    }
}
