use std::collections::BTreeMap;
use std::fmt;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use tickfill_market_data::{Fetched, Instrument, MarketDataError, Timestamp};

use crate::calendar::MarketCalendar;
use crate::errors::CalendarError;

/// The time range a pass tries to make complete, fixed for the whole pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Horizon {
    pub start: Timestamp,
    pub end: Timestamp,
    /// Wall clock the horizon was computed at
    pub now: Timestamp,
}

impl Horizon {
    pub fn at(
        calendar: &dyn MarketCalendar,
        now: DateTime<Utc>,
        history_days: i64,
    ) -> Result<Self, CalendarError> {
        let today = now.with_timezone(&calendar.timezone()).date_naive();
        Ok(Self {
            start: calendar.horizon_start(today, history_days)?,
            end: calendar.latest_available_timestamp_at(now)?,
            now: now.timestamp(),
        })
    }
}

/// One fetch request queued on a provider's worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job {
    pub id: u64,
    pub instrument: Instrument,
    pub provider_id: &'static str,
    pub start: Timestamp,
    pub end: Timestamp,
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "job {} {} via {} [{}, {}]",
            self.id, self.instrument, self.provider_id, self.start, self.end
        )
    }
}

#[derive(Debug)]
pub enum JobOutcome {
    Fetched(Fetched),
    Failed(MarketDataError),
    /// Shutdown arrived before the provider was called
    Cancelled,
}

#[derive(Debug)]
pub struct JobResult {
    pub job: Job,
    pub outcome: JobOutcome,
}

/// What `assign` decided for an instrument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Assignment {
    Job(Job),
    /// Capable providers exist but all are rate limited beyond the wait
    /// threshold; one drops below it after `retry_in`
    Deferred { retry_in: Duration },
    /// Capable providers exist but none frees up within the deferral limit
    RateLimited,
    /// Nothing left that any provider can serve this pass
    Exhausted,
}

/// Per-instrument lifecycle within a pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentState {
    Idle,
    GapsComputed,
    Assigned,
    AwaitingResult,
    Deferred,
    RateLimited,
    Exhausted,
    Failed,
}

/// Totals for one full pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub instruments: usize,
    pub jobs_dispatched: usize,
    pub rows_inserted: usize,
    pub attempts_recorded: usize,
    pub provider_errors: usize,
    pub exhausted: Vec<String>,
    /// Skipped for the rest of the pass because every capable provider's budget is spent
    pub rate_limited: Vec<String>,
    pub failed: Vec<String>,
    pub cancelled: bool,
    /// Last known state per symbol
    pub states: BTreeMap<String, InstrumentState>,
}

impl fmt::Display for PassSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} instrument(s), {} job(s), {} row(s) inserted, {} attempt(s) recorded, {} provider error(s), {} exhausted, {} rate limited, {} failed{}",
            self.instruments,
            self.jobs_dispatched,
            self.rows_inserted,
            self.attempts_recorded,
            self.provider_errors,
            self.exhausted.len(),
            self.rate_limited.len(),
            self.failed.len(),
            if self.cancelled { " (cancelled)" } else { "" }
        )
    }
}
