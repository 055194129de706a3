//! Calendar months and the active-interval rule used by cost aggregation.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const MIN_YEAR: i32 = 2000;
pub const MAX_YEAR: i32 = 2100;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MonthParseError {
    #[error("invalid date format: {0}")]
    InvalidFormat(String),

    #[error("invalid month: {0}")]
    InvalidMonth(String),

    #[error("invalid year: {0}")]
    InvalidYear(String),
}

/// A calendar month, stored as the first day of that month.
///
/// Ordering is chronological. Displays as `MM-YYYY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month(NaiveDate);

impl Month {
    pub fn new(year: i32, month: u32) -> Result<Self, MonthParseError> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(MonthParseError::InvalidYear(year.to_string()));
        }
        if !(1..=12).contains(&month) {
            return Err(MonthParseError::InvalidMonth(month.to_string()));
        }
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(Month)
            .ok_or_else(|| MonthParseError::InvalidFormat(format!("{month:02}-{year}")))
    }

    /// Normalizes any date to its month. Days are dropped.
    pub fn from_date(date: NaiveDate) -> Result<Self, MonthParseError> {
        Self::new(date.year(), date.month())
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }
}

/// Parses `MM-YYYY` or `YYYY-MM` into a [`Month`].
///
/// The order is decided by field lengths alone: a 4-digit field is the year,
/// the other field (1 or 2 digits) is the month.
pub fn parse_month_year(text: &str) -> Result<Month, MonthParseError> {
    let text = text.trim();
    let invalid = || MonthParseError::InvalidFormat(text.to_string());

    let (first, second) = text.split_once('-').ok_or_else(invalid)?;
    if second.contains('-') {
        return Err(invalid());
    }

    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(first) || !all_digits(second) {
        return Err(invalid());
    }

    let (month_str, year_str) = match (first.len(), second.len()) {
        (1 | 2, 4) => (first, second),
        (4, 1 | 2) => (second, first),
        _ => return Err(invalid()),
    };

    let month: u32 = month_str
        .parse()
        .map_err(|_| MonthParseError::InvalidMonth(month_str.to_string()))?;
    if !(1..=12).contains(&month) {
        return Err(MonthParseError::InvalidMonth(month_str.to_string()));
    }

    let year: i32 = year_str
        .parse()
        .map_err(|_| MonthParseError::InvalidYear(year_str.to_string()))?;
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(MonthParseError::InvalidYear(year_str.to_string()));
    }

    Month::new(year, month)
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:04}", self.month(), self.year())
    }
}

impl FromStr for Month {
    type Err = MonthParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_month_year(s)
    }
}

impl Serialize for Month {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Month {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_month_year(&raw).map_err(serde::de::Error::custom)
    }
}

/// Inclusive `[start, end]` month range of a subscription; `end == None` is open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivePeriod {
    pub start: Month,
    pub end: Option<Month>,
}

impl ActivePeriod {
    pub fn new(start: Month, end: Option<Month>) -> Self {
        Self { start, end }
    }

    /// True when this period shares at least one month with `[from, to]`.
    pub fn overlaps(&self, from: Month, to: Month) -> bool {
        self.start <= to && self.end.is_none_or(|end| end >= from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(text: &str) -> Month {
        parse_month_year(text).unwrap()
    }

    #[test]
    fn test_parse_both_orders() {
        assert_eq!(m("07-2025"), m("2025-07"));
        assert_eq!(m("7-2025"), m("2025-7"));
        assert_eq!(m("07-2025").year(), 2025);
        assert_eq!(m("07-2025").month(), 7);
        assert_eq!(
            m("07-2025").first_day(),
            NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()
        );
        assert_eq!(m(" 12-2100 "), Month::new(2100, 12).unwrap());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            parse_month_year("13-2025"),
            Err(MonthParseError::InvalidMonth(_))
        ));
        assert!(matches!(
            parse_month_year("00-2025"),
            Err(MonthParseError::InvalidMonth(_))
        ));
        assert!(matches!(
            parse_month_year("07-25"),
            Err(MonthParseError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_month_year("abcd"),
            Err(MonthParseError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_month_year("07-1999"),
            Err(MonthParseError::InvalidYear(_))
        ));
        assert!(matches!(
            parse_month_year("2101-01"),
            Err(MonthParseError::InvalidYear(_))
        ));
        assert!(parse_month_year("").is_err());
        assert!(parse_month_year("07/2025").is_err());
        assert!(parse_month_year("07-2025-01").is_err());
        assert!(parse_month_year("2025-07-01").is_err());
        assert!(parse_month_year("+7-2025").is_err());
        assert!(parse_month_year("007-2025").is_err());
    }

    #[test]
    fn test_display_reparses_to_same_month() {
        for text in ["01-2000", "7-2025", "2031-11", "12-2100"] {
            let month = m(text);
            assert_eq!(m(&month.to_string()), month);
        }
        assert_eq!(m("2025-7").to_string(), "07-2025");
    }

    #[test]
    fn test_serde_uses_month_year_text() {
        let json = serde_json::to_string(&m("2025-03")).unwrap();
        assert_eq!(json, "\"03-2025\"");
        let back: Month = serde_json::from_str("\"2025-03\"").unwrap();
        assert_eq!(back, m("03-2025"));
        assert!(serde_json::from_str::<Month>("\"13-2025\"").is_err());
    }

    #[test]
    fn test_from_date_drops_day() {
        let date = NaiveDate::from_ymd_opt(2025, 8, 17).unwrap();
        assert_eq!(Month::from_date(date).unwrap(), m("08-2025"));
    }

    #[test]
    fn test_overlap_closed_period() {
        let period = ActivePeriod::new(m("07-2025"), Some(m("08-2025")));
        assert!(period.overlaps(m("07-2025"), m("07-2025")));
        assert!(period.overlaps(m("08-2025"), m("12-2025")));
        assert!(period.overlaps(m("01-2025"), m("07-2025")));
        assert!(period.overlaps(m("01-2025"), m("12-2025")));
        assert!(!period.overlaps(m("09-2025"), m("12-2025")));
        assert!(!period.overlaps(m("01-2025"), m("06-2025")));
    }

    #[test]
    fn test_overlap_open_ended() {
        let period = ActivePeriod::new(m("03-2024"), None);
        assert!(period.overlaps(m("03-2024"), m("03-2024")));
        assert!(period.overlaps(m("01-2099"), m("12-2099")));
        assert!(period.overlaps(m("01-2024"), m("03-2024")));
        assert!(!period.overlaps(m("01-2024"), m("02-2024")));
    }
}
