//! Market calendar adapter.
//!
//! Answers which dates the exchange is open, where a trading day starts and
//! ends in exchange-local time, and how recent the newest published bar can
//! possibly be.

mod open_dates;
mod us_equity;

pub use open_dates::OpenDateIndex;
pub use us_equity::UsEquityCalendar;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use tickfill_market_data::{Timestamp, TradingHours};

use crate::constants::LATEST_TIME_BUFFER_SECS;
use crate::errors::CalendarError;

/// Longest run of consecutive closed days searched before giving up.
const MAX_CLOSED_RUN_DAYS: i64 = 14;

/// Exchange calendar used by gap detection and provider scoring.
pub trait MarketCalendar: Send + Sync {
    /// Exchange time zone.
    fn timezone(&self) -> Tz;

    /// Hours of the (extended) session in exchange-local time.
    fn session(&self) -> TradingHours;

    /// Publication lag of the newest bar, in seconds.
    fn data_delay(&self) -> i64;

    fn is_open_date(&self, date: NaiveDate) -> bool;

    /// Open dates in `[start, end]`, ascending.
    fn open_dates_between(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        start
            .iter_days()
            .take_while(|date| *date <= end)
            .filter(|date| self.is_open_date(*date))
            .collect()
    }

    /// Closed time from the previous day's session end to `date`'s session
    /// start, or to its session end when `date` is closed.
    ///
    /// Measured between local times, so a DST switch makes it an hour
    /// longer or shorter.
    fn closed_seconds_before(&self, date: NaiveDate, open: bool) -> Result<Timestamp, CalendarError> {
        let session = self.session();
        let previous_close = self.local_timestamp(date - Duration::days(1), session.max_hour)?;
        let resumes = self.local_timestamp(
            date,
            if open { session.min_hour } else { session.max_hour },
        )?;
        Ok(resumes - previous_close)
    }

    /// Exchange-local calendar date of a UTC timestamp.
    fn local_date(&self, timestamp: Timestamp) -> NaiveDate {
        DateTime::<Utc>::from_timestamp(timestamp, 0)
            .unwrap_or_default()
            .with_timezone(&self.timezone())
            .date_naive()
    }

    /// UTC timestamp of `hour:00` exchange-local time on `date`.
    fn local_timestamp(&self, date: NaiveDate, hour: u32) -> Result<Timestamp, CalendarError> {
        let (date, hour) = if hour >= 24 {
            (date + Duration::days(i64::from(hour / 24)), hour % 24)
        } else {
            (date, hour)
        };
        let naive = date
            .and_hms_opt(hour, 0, 0)
            .ok_or(CalendarError::InvalidLocalTime { date, hour })?;
        self.timezone()
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.timestamp())
            .ok_or(CalendarError::InvalidLocalTime { date, hour })
    }

    /// First open date on or after `date`.
    fn next_open_date(&self, date: NaiveDate) -> Result<NaiveDate, CalendarError> {
        date.iter_days()
            .take(MAX_CLOSED_RUN_DAYS as usize)
            .find(|d| self.is_open_date(*d))
            .ok_or(CalendarError::NoOpenDate(date))
    }

    /// Last open date on or before `date`.
    fn previous_open_date(&self, date: NaiveDate) -> Result<NaiveDate, CalendarError> {
        (0..MAX_CLOSED_RUN_DAYS)
            .map(|back| date - Duration::days(back))
            .find(|d| self.is_open_date(*d))
            .ok_or(CalendarError::NoOpenDate(date))
    }

    /// Start of the acquisition horizon: session open of the first open date
    /// at least `history_days` before `today`.
    fn horizon_start(&self, today: NaiveDate, history_days: i64) -> Result<Timestamp, CalendarError> {
        let first = self.next_open_date(today - Duration::days(history_days))?;
        self.local_timestamp(first, self.session().min_hour)
    }

    /// Latest time for which data could exist at `now`.
    ///
    /// The earlier of `now` minus the publication lag (plus a small buffer)
    /// and the close of the last session that has started. Before the
    /// session opens, today's session does not count.
    fn latest_available_timestamp_at(&self, now: DateTime<Utc>) -> Result<Timestamp, CalendarError> {
        let local = now.with_timezone(&self.timezone());
        let session = self.session();
        let today = local.date_naive();

        let last_open = if local.hour() < session.min_hour {
            self.previous_open_date(today - Duration::days(1))?
        } else {
            self.previous_open_date(today)?
        };

        let last_close = self.local_timestamp(last_open, session.max_hour)?;
        let lagged = now.timestamp() - self.data_delay() - LATEST_TIME_BUFFER_SECS;
        Ok(lagged.min(last_close))
    }

    fn latest_available_timestamp(&self) -> Result<Timestamp, CalendarError> {
        self.latest_available_timestamp_at(Utc::now())
    }
}
