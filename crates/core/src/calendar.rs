//! Calendar-month arithmetic.
//!
//! Sales panels and forecasts are monthly series keyed by the first day of the
//! month. These helpers keep every date on that grid.

use chrono::{Datelike, Months, NaiveDate};

use crate::error::{DomainError, DomainResult};

/// Truncate a date to the first day of its month.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    // Day 1 exists in every month.
    date.with_day(1).unwrap_or(date)
}

/// Shift a date by a signed number of calendar months, landing on the first of the month.
pub fn add_months(date: NaiveDate, months: i32) -> DomainResult<NaiveDate> {
    let start = month_start(date);
    let shifted = if months >= 0 {
        start.checked_add_months(Months::new(months.unsigned_abs()))
    } else {
        start.checked_sub_months(Months::new(months.unsigned_abs()))
    };
    shifted.ok_or_else(|| DomainError::validation(format!("month offset {months} from {date} is out of range")))
}

/// Signed number of whole months from `from` to `to` (month granularity, days ignored).
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i32 {
    (to.year() - from.year()) * 12 + (to.month() as i32 - from.month() as i32)
}

/// Every month start in `[first, last]`, inclusive, in ascending order.
///
/// Returns an empty vector when `first` is after `last`.
pub fn month_range(first: NaiveDate, last: NaiveDate) -> Vec<NaiveDate> {
    let first = month_start(first);
    let last = month_start(last);
    let span = months_between(first, last);
    if span < 0 {
        return Vec::new();
    }
    (0..=span)
        .filter_map(|offset| add_months(first, offset).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn month_start_truncates_day() {
        assert_eq!(month_start(d(2024, 2, 29)), d(2024, 2, 1));
    }

    #[test]
    fn add_months_crosses_year_boundaries() {
        assert_eq!(add_months(d(2023, 11, 15), 3).unwrap(), d(2024, 2, 1));
        assert_eq!(add_months(d(2024, 1, 1), -1).unwrap(), d(2023, 12, 1));
        assert_eq!(add_months(d(2024, 1, 1), 0).unwrap(), d(2024, 1, 1));
    }

    #[test]
    fn month_range_is_inclusive() {
        let months = month_range(d(2024, 1, 10), d(2024, 3, 2));
        assert_eq!(months, vec![d(2024, 1, 1), d(2024, 2, 1), d(2024, 3, 1)]);
    }

    #[test]
    fn reversed_range_is_empty() {
        assert!(month_range(d(2024, 3, 1), d(2024, 1, 1)).is_empty());
    }

    proptest! {
        #[test]
        fn add_then_measure_is_identity(offset in -240i32..240) {
            let base = d(2020, 6, 1);
            let shifted = add_months(base, offset).unwrap();
            prop_assert_eq!(months_between(base, shifted), offset);
            prop_assert_eq!(shifted.day(), 1);
        }
    }
}
