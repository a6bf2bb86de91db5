use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Returns the current time in the configured timezone.
pub fn now_in_timezone(tz: &Tz) -> DateTime<Tz> {
    Utc::now().with_timezone(tz)
}

/// Returns today's date in the configured timezone.
pub fn today_local(tz: &Tz) -> NaiveDate {
    now_in_timezone(tz).date_naive()
}

/// The calendar month before `(year, month)`; January rolls back to December.
/// `None` for an out of range month.
pub fn previous_month(year: i32, month: u32) -> Option<(i32, u32)> {
    match month {
        1 => Some((year - 1, 12)),
        2..=12 => Some((year, month - 1)),
        _ => None,
    }
}

/// First and last day of a month. `None` for an out of range month.
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let last = NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()?;
    Some((first, last))
}

pub fn month_name(month: u32) -> &'static str {
    MONTH_NAMES
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("Unknown")
}

/// "March 2026"
pub fn month_label(year: i32, month: u32) -> String {
    format!("{} {}", month_name(month), year)
}

pub fn year_month(date: NaiveDate) -> (i32, u32) {
    (date.year(), date.month())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_in_timezone_returns_datetime_in_tz() {
        let tz = chrono_tz::Europe::London;
        assert_eq!(now_in_timezone(&tz).timezone(), tz);
    }

    #[test]
    fn previous_month_rolls_january_into_december() {
        assert_eq!(previous_month(2026, 1), Some((2025, 12)));
        assert_eq!(previous_month(2026, 3), Some((2026, 2)));
        for month in 1..=12 {
            let (_, prev) = previous_month(2030, month).unwrap();
            assert!((1..=12).contains(&prev));
        }
    }

    #[test]
    fn previous_month_rejects_out_of_range_months() {
        assert_eq!(previous_month(2026, 0), None);
        assert_eq!(previous_month(2026, 13), None);
    }

    #[test]
    fn month_bounds_handles_leap_years_and_december() {
        let (first, last) = month_bounds(2024, 2).unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        let (_, last) = month_bounds(2025, 12).unwrap();
        assert_eq!(last, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());

        assert!(month_bounds(2025, 13).is_none());
        assert!(month_bounds(2025, 0).is_none());
    }

    #[test]
    fn month_labels_are_english() {
        assert_eq!(month_label(2026, 1), "January 2026");
        assert_eq!(month_name(12), "December");
        assert_eq!(month_name(0), "Unknown");
    }
}
