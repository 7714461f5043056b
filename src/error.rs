//! Error types for report generation

use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised by the report core.
///
/// Every variant is a caller contract violation: the input was malformed
/// and retrying with the same input fails the same way.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A raw count was negative or not an integer
    #[error("invalid count for event '{event}': {reason}")]
    InvalidCount { event: String, reason: String },

    /// An event name in the raw counts was empty
    #[error("event names must not be empty")]
    EmptyEventName,

    /// Date range with start after end
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    /// Prior period length differs from the current period length
    #[error("baseline covers {prior_days} days but the current period covers {current_days}")]
    MismatchedBaseline { current_days: i64, prior_days: i64 },

    /// Ranking size was not positive
    #[error("top_n must be positive, got {0}")]
    InvalidTopN(usize),

    /// Unknown period name or custom window out of bounds
    #[error("invalid report window: {0}")]
    InvalidWindow(String),
}

/// Result type alias for the report core
pub type Result<T> = std::result::Result<T, Error>;
