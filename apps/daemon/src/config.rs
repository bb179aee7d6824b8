//! Environment-driven daemon configuration.

use std::time::Duration;

use tickfill_core::constants::{
    DEFAULT_HISTORY_DAYS, DEFAULT_MAX_DEFERRAL_SECS, DEFAULT_MAX_PROVIDER_WAIT_SECS,
    DEFAULT_MIN_GAP_SECS,
    DEFAULT_QUEUE_CAPACITY, DEFAULT_RESOLUTION_SECS,
};
use tickfill_core::SchedulerConfig;

const DEFAULT_DB_PATH: &str = "./db/tickfill.db";
const DEFAULT_RUN_INTERVAL_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Clone)]
pub struct Config {
    pub db_path: String,
    /// Empty means every stored instrument.
    pub symbols: Vec<String>,
    pub history_days: i64,
    pub min_gap_seconds: i64,
    pub resolution_seconds: i64,
    pub max_provider_wait: Duration,
    pub max_deferral: Duration,
    pub queue_capacity: usize,
    pub run_interval: Duration,
    pub polygon_api_key: Option<String>,
    pub alpha_vantage_api_key: Option<String>,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("db_path", &self.db_path)
            .field("symbols", &self.symbols)
            .field("history_days", &self.history_days)
            .field("min_gap_seconds", &self.min_gap_seconds)
            .field("resolution_seconds", &self.resolution_seconds)
            .field("max_provider_wait", &self.max_provider_wait)
            .field("max_deferral", &self.max_deferral)
            .field("queue_capacity", &self.queue_capacity)
            .field("run_interval", &self.run_interval)
            .field("polygon_api_key", &self.polygon_api_key.as_ref().map(|_| "***"))
            .field(
                "alpha_vantage_api_key",
                &self.alpha_vantage_api_key.as_ref().map(|_| "***"),
            )
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Config {
    /// Load from the process environment, after reading `.env` if present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parse = |key: &str| lookup(key).and_then(|v| v.trim().parse::<i64>().ok());
        let parse_u64 = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let secret = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            db_path: lookup("TICKFILL_DB_PATH")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            symbols: lookup("TICKFILL_SYMBOLS")
                .map(|v| parse_symbols(&v))
                .unwrap_or_default(),
            history_days: parse("TICKFILL_HISTORY_DAYS").unwrap_or(DEFAULT_HISTORY_DAYS),
            min_gap_seconds: parse("TICKFILL_MIN_GAP_SECS").unwrap_or(DEFAULT_MIN_GAP_SECS),
            resolution_seconds: parse("TICKFILL_RESOLUTION_SECS")
                .unwrap_or(DEFAULT_RESOLUTION_SECS),
            max_provider_wait: Duration::from_secs(
                parse_u64("TICKFILL_MAX_PROVIDER_WAIT_SECS")
                    .unwrap_or(DEFAULT_MAX_PROVIDER_WAIT_SECS),
            ),
            max_deferral: Duration::from_secs(
                parse_u64("TICKFILL_MAX_DEFERRAL_SECS").unwrap_or(DEFAULT_MAX_DEFERRAL_SECS),
            ),
            queue_capacity: parse_u64("TICKFILL_QUEUE_CAPACITY")
                .and_then(|v| usize::try_from(v).ok())
                .unwrap_or(DEFAULT_QUEUE_CAPACITY),
            run_interval: Duration::from_secs(
                parse_u64("TICKFILL_RUN_INTERVAL_SECS")
                    .filter(|&secs| secs > 0)
                    .unwrap_or(DEFAULT_RUN_INTERVAL_SECS),
            ),
            polygon_api_key: secret("TICKFILL_POLYGON_API_KEY"),
            alpha_vantage_api_key: secret("TICKFILL_ALPHA_VANTAGE_API_KEY"),
            log_format: match lookup("TICKFILL_LOG_FORMAT") {
                Some(v) if v.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::default()
            .with_history_days(self.history_days)
            .with_min_gap_seconds(self.min_gap_seconds)
            .with_resolution_seconds(self.resolution_seconds)
            .with_max_provider_wait(self.max_provider_wait)
            .with_max_deferral(self.max_deferral)
            .with_queue_capacity(self.queue_capacity)
    }
}

/// Comma-separated, trimmed, uppercased, blanks and repeats dropped.
fn parse_symbols(raw: &str) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for symbol in raw.split(',').map(|s| s.trim().to_uppercase()) {
        if !symbol.is_empty() && !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }
    symbols
}
