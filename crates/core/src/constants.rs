/// Days of history the scheduler tries to keep complete
pub const DEFAULT_HISTORY_DAYS: i64 = 730;

/// Gaps shorter than this (after removing closed-market time) are ignored
pub const DEFAULT_MIN_GAP_SECS: i64 = 1800;

/// Bar resolution; also how far a gap is pulled in from a confirmed data point
pub const DEFAULT_RESOLUTION_SECS: i64 = 60;

/// A provider that would make us wait longer than this is skipped for now
pub const DEFAULT_MAX_PROVIDER_WAIT_SECS: u64 = 10;

/// Longest a pass holds a rate-limited instrument back before skipping it
pub const DEFAULT_MAX_DEFERRAL_SECS: u64 = 120;

/// Bound of each provider's job queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// How long the orchestrator waits for a result before checking deferred instruments
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Typical publication lag of minute bars
pub const DEFAULT_DATA_DELAY_SECS: i64 = 900;

/// Extra slack on top of the publication lag
pub const LATEST_TIME_BUFFER_SECS: i64 = 300;

pub const SECONDS_PER_HOUR: i64 = 3_600;
