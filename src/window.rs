//! Report windows and the baseline window each one is compared against.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, Months, NaiveDate};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::DateRange;

pub const MAX_CUSTOM_DAYS: u32 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
    Custom(u32),
}

impl Period {
    /// A custom window of `days` days, 1 through 90.
    pub fn custom(days: u32) -> Result<Self> {
        if !(1..=MAX_CUSTOM_DAYS).contains(&days) {
            return Err(Error::InvalidWindow(format!(
                "custom window must cover 1 to {MAX_CUSTOM_DAYS} days, got {days}"
            )));
        }
        Ok(Period::Custom(days))
    }

    /// Resolves a period name, taking the day count for `custom`.
    pub fn parse(name: &str, days: Option<u32>) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Period::Daily),
            "weekly" => Ok(Period::Weekly),
            "biweekly" | "bi-weekly" => Ok(Period::Biweekly),
            "monthly" => Ok(Period::Monthly),
            "custom" => match days {
                Some(days) => Period::custom(days),
                None => Err(Error::InvalidWindow(
                    "custom window needs a day count".to_string(),
                )),
            },
            other => Err(Error::InvalidWindow(format!("unknown period '{other}'"))),
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            Period::Daily => 1,
            Period::Weekly => 7,
            Period::Biweekly => 14,
            Period::Monthly => 30,
            Period::Custom(days) => i64::from(*days),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Period::Daily => "Daily Summary".to_string(),
            Period::Weekly => "Weekly Summary".to_string(),
            Period::Biweekly => "Bi-Weekly Summary".to_string(),
            Period::Monthly => "Monthly Summary".to_string(),
            Period::Custom(days) => format!("Last {days} Days"),
        }
    }

    pub fn active_users_label(&self) -> String {
        match self {
            Period::Daily => "Daily Active Users".to_string(),
            Period::Weekly => "Weekly Active Users".to_string(),
            Period::Biweekly => "Bi-Weekly Active Users".to_string(),
            Period::Monthly => "Monthly Active Users".to_string(),
            Period::Custom(_) => "Active Users".to_string(),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Daily => write!(f, "daily"),
            Period::Weekly => write!(f, "weekly"),
            Period::Biweekly => write!(f, "biweekly"),
            Period::Monthly => write!(f, "monthly"),
            Period::Custom(days) => write!(f, "custom ({days} days)"),
        }
    }
}

/// Which window the current period is compared against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BaselinePolicy {
    /// The window of equal length ending the day before the current one.
    #[default]
    Preceding,
    /// The same window one reporting cycle earlier: a week earlier for
    /// daily reports, the same dates a month earlier for monthly ones.
    PreviousCycle,
    /// No comparison.
    None,
}

impl FromStr for BaselinePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preceding" => Ok(BaselinePolicy::Preceding),
            "previous-cycle" => Ok(BaselinePolicy::PreviousCycle),
            "none" => Ok(BaselinePolicy::None),
            other => Err(Error::InvalidWindow(format!("unknown baseline policy '{other}'"))),
        }
    }
}

/// The `period` worth of complete days ending the day before `as_of`.
pub fn current_range(period: Period, as_of: NaiveDate) -> DateRange {
    let end = as_of - Duration::days(1);
    let start = end - Duration::days(period.days() - 1);
    DateRange { start, end }
}

/// The comparison window for `current`, always of the same length.
pub fn baseline_range(
    period: Period,
    current: DateRange,
    policy: BaselinePolicy,
) -> Option<DateRange> {
    match policy {
        BaselinePolicy::None => None,
        BaselinePolicy::Preceding => Some(shift_back(current, current.days())),
        BaselinePolicy::PreviousCycle => match period {
            Period::Daily => Some(shift_back(current, 7)),
            Period::Monthly => Some(previous_month(current)),
            _ => Some(shift_back(current, period.days())),
        },
    }
}

fn shift_back(range: DateRange, days: i64) -> DateRange {
    DateRange {
        start: range.start - Duration::days(days),
        end: range.end - Duration::days(days),
    }
}

/// Same start date one calendar month earlier (chrono clamps to month end),
/// keeping the window length.
fn previous_month(range: DateRange) -> DateRange {
    let start = range
        .start
        .checked_sub_months(Months::new(1))
        .unwrap_or(range.start - Duration::days(30));
    DateRange {
        start,
        end: start + Duration::days(range.days() - 1),
    }
}
