//! Provider profiles: rate limits and historical/trading-hour coverage.
//!
//! A profile is the static metadata a provider publishes about itself. The
//! scheduler reads it to decide how often a provider may be called and which
//! parts of a gap it can plausibly fill.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Length of a rate-limit window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateWindow {
    Second,
    Minute,
    Hour,
    Day,
}

impl RateWindow {
    /// Window length in seconds.
    pub const fn seconds(self) -> i64 {
        match self {
            Self::Second => 1,
            Self::Minute => 60,
            Self::Hour => 3_600,
            Self::Day => 86_400,
        }
    }
}

/// At most `max_calls` calls per `window`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub window: RateWindow,
    pub max_calls: u32,
}

impl RateLimit {
    pub const fn new(window: RateWindow, max_calls: u32) -> Self {
        Self { window, max_calls }
    }

    pub const fn per_second(max_calls: u32) -> Self {
        Self::new(RateWindow::Second, max_calls)
    }

    pub const fn per_minute(max_calls: u32) -> Self {
        Self::new(RateWindow::Minute, max_calls)
    }

    pub const fn per_hour(max_calls: u32) -> Self {
        Self::new(RateWindow::Hour, max_calls)
    }

    pub const fn per_day(max_calls: u32) -> Self {
        Self::new(RateWindow::Day, max_calls)
    }
}

/// Dates for which a provider serves history.
///
/// `max = None` means "up to the present".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub min: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<NaiveDate>,
}

impl DateRange {
    pub const fn since(min: NaiveDate) -> Self {
        Self { min, max: None }
    }

    /// History reaching back `days` calendar days from `today`.
    pub fn trailing_days(today: NaiveDate, days: i64) -> Self {
        Self::since(today - Duration::days(days))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.min && self.max.map_or(true, |max| date <= max)
    }
}

/// Exchange-local hours a provider has bars for, `[min_hour, max_hour)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingHours {
    pub min_hour: u32,
    pub max_hour: u32,
}

impl TradingHours {
    pub const fn new(min_hour: u32, max_hour: u32) -> Self {
        Self { min_hour, max_hour }
    }

    /// Pre-market through after-hours, 04:00 to 20:00.
    pub const fn extended() -> Self {
        Self::new(4, 20)
    }

    /// Regular session hours rounded out to whole hours, 09:00 to 16:00.
    pub const fn regular() -> Self {
        Self::new(9, 16)
    }
}

/// Static description of a data source. Immutable for the life of the process.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub name: String,
    pub rate_limits: Vec<RateLimit>,
    pub date_range: DateRange,
    pub trading_hours: TradingHours,
    /// Publication lag in seconds: bars newer than `now - result_delay` do not exist yet.
    #[serde(default)]
    pub result_delay: i64,
}

impl ProviderProfile {
    /// Longest configured window, which bounds how much call history must be kept.
    pub fn longest_window(&self) -> Option<RateWindow> {
        self.rate_limits.iter().map(|limit| limit.window).max()
    }
}
