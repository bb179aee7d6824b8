use std::time::Duration;

use crate::constants::{
    DEFAULT_HISTORY_DAYS, DEFAULT_MAX_DEFERRAL_SECS, DEFAULT_MAX_PROVIDER_WAIT_SECS, DEFAULT_MIN_GAP_SECS,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_QUEUE_CAPACITY, DEFAULT_RESOLUTION_SECS,
};

/// Dispatcher tuning knobs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// How far back the horizon starts, in calendar days
    pub history_days: i64,
    /// Minimum adjusted gap length worth fetching
    pub min_gap_seconds: i64,
    /// Bar resolution in seconds
    pub resolution_seconds: i64,
    /// Providers that would have to wait longer than this are skipped for now
    pub max_provider_wait: Duration,
    /// Instruments whose providers free up later than this are skipped for the pass
    pub max_deferral: Duration,
    /// Bound of each provider's job queue
    pub queue_capacity: usize,
    /// Result wait timeout; deferred instruments that are due are retried on each tick
    pub poll_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            history_days: DEFAULT_HISTORY_DAYS,
            min_gap_seconds: DEFAULT_MIN_GAP_SECS,
            resolution_seconds: DEFAULT_RESOLUTION_SECS,
            max_provider_wait: Duration::from_secs(DEFAULT_MAX_PROVIDER_WAIT_SECS),
            max_deferral: Duration::from_secs(DEFAULT_MAX_DEFERRAL_SECS),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl SchedulerConfig {
    pub fn with_history_days(mut self, days: i64) -> Self {
        self.history_days = days.max(0);
        self
    }

    pub fn with_min_gap_seconds(mut self, seconds: i64) -> Self {
        self.min_gap_seconds = seconds.max(0);
        self
    }

    pub fn with_resolution_seconds(mut self, seconds: i64) -> Self {
        self.resolution_seconds = seconds.max(1);
        self
    }

    pub fn with_max_provider_wait(mut self, wait: Duration) -> Self {
        self.max_provider_wait = wait;
        self
    }

    pub fn with_max_deferral(mut self, deferral: Duration) -> Self {
        self.max_deferral = deferral;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}
