//! Recurring-series expansion.
//!
//! Pure date arithmetic: a rule plus the first occurrence's start instant
//! expands into the full list of occurrence starts, each carrying the
//! first occurrence's time of day. Expansion is bounded by the inclusive
//! series end date and hard-capped at [`MAX_OCCURRENCES`].

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use roomly_db::RecurrenceRule;

/// Hard cap on expanded occurrences, runaway-rule protection.
pub const MAX_OCCURRENCES: usize = 200;

/// Expand a rule into occurrence start instants.
///
/// Walks dates from the first occurrence's date through `until`
/// (inclusive) and keeps those matching the rule. A monthly day past the
/// end of a shorter month clips to that month's last day. The output is
/// sorted and deterministic.
#[must_use]
pub fn expand(
    rule: &RecurrenceRule,
    first_start: DateTime<Utc>,
    until: NaiveDate,
) -> Vec<DateTime<Utc>> {
    let first_date = first_start.date_naive();
    let time = first_start.time();
    let mut occurrences = Vec::new();

    match rule {
        RecurrenceRule::Weekly { weekdays } => {
            let mut date = first_date;
            while date <= until && occurrences.len() < MAX_OCCURRENCES {
                let weekday = date.weekday().num_days_from_sunday() as u8;
                if weekdays.contains(&weekday) {
                    occurrences.push(date.and_time(time).and_utc());
                }
                date += Duration::days(1);
            }
        }
        RecurrenceRule::MonthlyDay { day } => {
            let mut year = first_date.year();
            let mut month = first_date.month();
            loop {
                let clipped = u32::from(*day).min(days_in_month(year, month));
                // Safe: clipped is within the month by construction, but
                // stay total anyway.
                let Some(date) = NaiveDate::from_ymd_opt(year, month, clipped) else {
                    break;
                };
                if date > until || occurrences.len() >= MAX_OCCURRENCES {
                    break;
                }
                if date >= first_date {
                    occurrences.push(date.and_time(time).and_utc());
                }
                month += 1;
                if month > 12 {
                    month = 1;
                    year += 1;
                }
            }
        }
    }

    occurrences
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map_or(28, |d| d.day())
}
