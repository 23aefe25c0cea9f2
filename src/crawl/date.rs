//! Turns the date strings the review API hands back ("3 hours ago", "2 天前",
//! "a week ago", "2024-05-01") into absolute timestamps.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use regex::Regex;

static FIRST_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Hour,
    Day,
    Week,
    Month,
    Year,
}

// Checked in this order; the first unit whose marker appears wins.
const UNITS: &[(Unit, &[&str])] = &[
    (Unit::Hour, &["hour", "小時", "小时"]),
    (Unit::Day, &["day", "天"]),
    (Unit::Week, &["week", "週", "周"]),
    (Unit::Month, &["month", "月"]),
    (Unit::Year, &["year", "年"]),
];

impl Unit {
    fn detect(lowered: &str) -> Option<Self> {
        UNITS
            .iter()
            .find(|(_, markers)| markers.iter().any(|m| lowered.contains(m)))
            .map(|(unit, _)| *unit)
    }

    /// Months are 30 days and years 365 days.
    fn times(self, n: i64) -> Option<TimeDelta> {
        match self {
            Self::Hour => TimeDelta::try_hours(n),
            Self::Day => TimeDelta::try_days(n),
            Self::Week => TimeDelta::try_weeks(n),
            Self::Month => TimeDelta::try_days(n.checked_mul(30)?),
            Self::Year => TimeDelta::try_days(n.checked_mul(365)?),
        }
    }
}

/// Resolve `text` against `reference`. `None` means the string could not be
/// understood; callers treat that as "recent", never as fatal.
pub fn normalize(text: &str, reference: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let lowered = text.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }

    let Some(unit) = Unit::detect(&lowered) else {
        return parse_absolute(text);
    };

    let quantity = match FIRST_DIGITS.find(text) {
        Some(m) => m.as_str().parse::<i64>().ok()?,
        None if lowered.starts_with("a ") || lowered.starts_with("an ") => 1,
        None => return None,
    };

    reference.checked_sub_signed(unit.times(quantity)?)
}

fn parse_absolute(text: &str) -> Option<DateTime<Utc>> {
    let s = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }

    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%B %d, %Y", "%b %d, %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn english_relative_units() {
        let cases = [
            ("3 hours ago", TimeDelta::hours(3)),
            ("1 hour ago", TimeDelta::hours(1)),
            ("2 days ago", TimeDelta::days(2)),
            ("4 weeks ago", TimeDelta::weeks(4)),
            ("5 months ago", TimeDelta::days(150)),
            ("2 years ago", TimeDelta::days(730)),
        ];
        for (text, delta) in cases {
            assert_eq!(normalize(text, t0()), Some(t0() - delta), "{text}");
        }
    }

    #[test]
    fn locale_relative_units() {
        assert_eq!(normalize("3 天前", t0()), Some(t0() - TimeDelta::days(3)));
        assert_eq!(normalize("5 小時前", t0()), Some(t0() - TimeDelta::hours(5)));
        assert_eq!(normalize("2 週前", t0()), Some(t0() - TimeDelta::weeks(2)));
        assert_eq!(normalize("2 周前", t0()), Some(t0() - TimeDelta::weeks(2)));
        assert_eq!(normalize("3 個月前", t0()), Some(t0() - TimeDelta::days(90)));
        assert_eq!(normalize("1 年前", t0()), Some(t0() - TimeDelta::days(365)));
    }

    #[test]
    fn indefinite_article_means_one() {
        assert_eq!(normalize("an hour ago", t0()), Some(t0() - TimeDelta::hours(1)));
        assert_eq!(normalize("a day ago", t0()), Some(t0() - TimeDelta::days(1)));
        assert_eq!(normalize("A week ago", t0()), Some(t0() - TimeDelta::weeks(1)));
        assert_eq!(normalize("a month ago", t0()), Some(t0() - TimeDelta::days(30)));
        assert_eq!(normalize("a year ago", t0()), Some(t0() - TimeDelta::days(365)));
    }

    #[test]
    fn unit_without_quantity_is_unparsable() {
        assert_eq!(normalize("yesterday", t0()), None);
        assert_eq!(normalize("last month", t0()), None);
    }

    #[test]
    fn quantity_is_the_first_digit_run_anywhere() {
        assert_eq!(normalize("about 3 days ago", t0()), Some(t0() - TimeDelta::days(3)));
        assert_eq!(normalize("編輯於 2 週前", t0()), Some(t0() - TimeDelta::weeks(2)));
    }

    #[test]
    fn earlier_unit_wins_when_several_appear() {
        // "hour" is checked before "day", and the first digit run is used.
        assert_eq!(
            normalize("1 day, 2 hours ago", t0()),
            Some(t0() - TimeDelta::hours(1))
        );
    }

    #[test]
    fn absolute_dates() {
        assert_eq!(
            normalize("2024-05-01", t0()),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            normalize("2024-05-01T08:30:00Z", t0()),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap())
        );
        assert_eq!(
            normalize("2024-05-01 08:30:00", t0()),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap())
        );
        assert_eq!(
            normalize("March 3, 2024", t0()),
            Some(Utc.with_ymd_and_hms(2024, 3, 3, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn garbage_is_unparsable() {
        assert_eq!(normalize("invalid", t0()), None);
        assert_eq!(normalize("", t0()), None);
        assert_eq!(normalize("   ", t0()), None);
    }

    #[test]
    fn huge_quantities_do_not_panic() {
        assert_eq!(normalize("99999999999999999999 days ago", t0()), None);
        assert_eq!(normalize("9999999999999 years ago", t0()), None);
    }
}
