//! Time filters for statistics queries
//!
//! A filter selects a lower bound on message creation time relative to now.
//! Filters arrive as strings from the transport layer; unknown values are
//! rejected up front instead of silently defaulting.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};

use crate::{Error, Result};

/// Relative time window for an aggregation query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeFilter {
    /// Start of the current UTC calendar day.
    Today,
    /// Last 7 days.
    Week,
    /// Last 30 days.
    Month,
    /// No lower bound.
    All,
}

impl TimeFilter {
    /// Stable string form, also used inside cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFilter::Today => "today",
            TimeFilter::Week => "week",
            TimeFilter::Month => "month",
            TimeFilter::All => "all",
        }
    }

    /// Lower bound on `created_at` relative to `now`, or `None` for `All`.
    pub fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TimeFilter::Today => Some(
                now.date_naive()
                    .and_hms_opt(0, 0, 0)
                    .expect("midnight is a valid time")
                    .and_utc(),
            ),
            TimeFilter::Week => Some(now - Duration::days(7)),
            TimeFilter::Month => Some(now - Duration::days(30)),
            TimeFilter::All => None,
        }
    }

    /// All filter values, widest window last.
    pub fn all_variants() -> [TimeFilter; 4] {
        [
            TimeFilter::Today,
            TimeFilter::Week,
            TimeFilter::Month,
            TimeFilter::All,
        ]
    }
}

impl fmt::Display for TimeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "today" => Ok(TimeFilter::Today),
            "week" => Ok(TimeFilter::Week),
            "month" => Ok(TimeFilter::Month),
            "all" => Ok(TimeFilter::All),
            other => Err(Error::InvalidArgument(format!(
                "unknown time filter: {}",
                other
            ))),
        }
    }
}
