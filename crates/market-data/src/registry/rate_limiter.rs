//! Sliding-window rate limiter for market data providers.
//!
//! Every provider declares one or more `(window, max_calls)` budgets. The
//! limiter keeps a log of recent call times per provider and answers "when
//! is the next call legal": for each window, if the calls inside it already
//! reach the budget, the next call must wait until the oldest call that
//! would push it over the limit leaves the window. The answer is the maximum
//! across windows.
//!
//! Call logs are pruned to the provider's longest window and written through
//! a [`CallLogStore`] so a restart does not reset the budget.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use crate::errors::MarketDataError;
use crate::models::ProviderId;
use crate::provider::RateLimit;

/// Milliseconds since the Unix epoch.
pub type CallTime = i64;

/// Persistence for per-provider call logs.
pub trait CallLogStore: Send + Sync {
    /// Load the stored call times for a provider, in any order.
    fn load_calls(&self, provider: &str) -> Result<Vec<CallTime>, MarketDataError>;

    /// Replace the stored call times for a provider.
    fn save_calls(&self, provider: &str, calls: &[CallTime]) -> Result<(), MarketDataError>;
}

/// Current wall-clock time as a [`CallTime`].
pub fn now_millis() -> CallTime {
    Utc::now().timestamp_millis()
}

/// Call budget and history for a single provider.
#[derive(Debug, Default)]
struct CallLog {
    limits: Vec<RateLimit>,
    /// Ascending.
    calls: Vec<CallTime>,
}

impl CallLog {
    fn longest_window_ms(&self) -> i64 {
        self.limits
            .iter()
            .map(|limit| limit.window.seconds() * 1000)
            .max()
            .unwrap_or(0)
    }

    fn prune(&mut self, now: CallTime) {
        let cutoff = now - self.longest_window_ms();
        let keep_from = self.calls.partition_point(|&t| t <= cutoff);
        self.calls.drain(..keep_from);
    }

    fn next_available(&self, now: CallTime) -> CallTime {
        let mut next = now;
        for limit in &self.limits {
            let window_ms = limit.window.seconds() * 1000;
            let first_in_window = self.calls.partition_point(|&t| t <= now - window_ms);
            let count = self.calls.len() - first_in_window;
            let max_calls = limit.max_calls as usize;

            if count >= max_calls {
                let blocking = self.calls[first_in_window + (count - max_calls)];
                next = next.max(blocking + window_ms);
            }
        }
        next
    }

    fn insert(&mut self, at: CallTime) {
        let position = self.calls.partition_point(|&t| t <= at);
        self.calls.insert(position, at);
    }
}

/// Per-provider sliding-window rate limiter.
///
/// Thread-safe; in the scheduler each provider's entry is only ever driven
/// by that provider's worker, so waits never race each other.
pub struct RateLimiter {
    logs: Mutex<HashMap<String, CallLog>>,
    store: Option<Arc<dyn CallLogStore>>,
}

impl RateLimiter {
    /// Create an in-memory rate limiter.
    pub fn new() -> Self {
        Self {
            logs: Mutex::new(HashMap::new()),
            store: None,
        }
    }

    /// Create a rate limiter whose call logs survive restarts.
    pub fn with_store(store: Arc<dyn CallLogStore>) -> Self {
        Self {
            logs: Mutex::new(HashMap::new()),
            store: Some(store),
        }
    }

    /// Lock the logs mutex, recovering from poison if necessary.
    ///
    /// The worst case after a poisoned lock is a slightly stale call log,
    /// which is better than taking the whole scheduler down.
    fn lock_logs(&self) -> MutexGuard<'_, HashMap<String, CallLog>> {
        self.logs.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Configure the budgets for a provider and hydrate its call log.
    ///
    /// Zero-call budgets are ignored.
    pub fn configure(&self, provider: &ProviderId, limits: &[RateLimit]) {
        let limits: Vec<RateLimit> = limits
            .iter()
            .copied()
            .filter(|limit| {
                if limit.max_calls == 0 {
                    warn!(
                        "Ignoring zero-call {:?} budget for provider '{}'",
                        limit.window, provider
                    );
                }
                limit.max_calls > 0
            })
            .collect();

        let mut calls = match &self.store {
            Some(store) => store.load_calls(provider).unwrap_or_else(|e| {
                warn!("Failed to load call log for '{}': {}", provider, e);
                Vec::new()
            }),
            None => Vec::new(),
        };
        calls.sort_unstable();

        let mut log = CallLog { limits, calls };
        log.prune(now_millis());
        debug!(
            "Rate limiter: configured '{}' with {} budget(s), {} recent call(s)",
            provider,
            log.limits.len(),
            log.calls.len()
        );

        self.lock_logs().insert(provider.to_string(), log);
    }

    /// Record a call issued at `now`, prune and persist the log.
    pub fn record_call(&self, provider: &ProviderId, now: CallTime) {
        let snapshot = {
            let mut logs = self.lock_logs();
            let log = logs.entry(provider.to_string()).or_default();
            log.insert(now);
            log.prune(now);
            log.calls.clone()
        };

        if let Some(store) = &self.store {
            if let Err(e) = store.save_calls(provider, &snapshot) {
                warn!("Failed to persist call log for '{}': {}", provider, e);
            }
        }
    }

    /// Earliest time at which `provider` may be called again.
    ///
    /// Returns `now` when the provider is free (or unknown).
    pub fn next_available_time(&self, provider: &ProviderId, now: CallTime) -> CallTime {
        self.lock_logs()
            .get(provider.as_ref())
            .map_or(now, |log| log.next_available(now))
    }

    /// How long a call to `provider` would have to wait right now.
    pub fn wait_time(&self, provider: &ProviderId) -> Duration {
        let now = now_millis();
        let next = self.next_available_time(provider, now);
        Duration::from_millis(u64::try_from(next - now).unwrap_or(0))
    }

    /// Wait until `provider` may be called.
    ///
    /// Returns `false` if `cancel` fired first. The caller records the call
    /// with [`RateLimiter::record_call`] once it has been issued.
    pub async fn acquire(&self, provider: &ProviderId, cancel: &CancellationToken) -> bool {
        loop {
            if cancel.is_cancelled() {
                return false;
            }

            let wait_time = self.wait_time(provider);
            if wait_time.is_zero() {
                return true;
            }

            debug!(
                "Rate limiter: waiting {:?} for provider '{}'",
                wait_time, provider
            );
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(wait_time) => {}
            }
        }
    }

    /// Recent call times for a provider, ascending.
    pub fn calls(&self, provider: &ProviderId) -> Vec<CallTime> {
        self.lock_logs()
            .get(provider.as_ref())
            .map(|log| log.calls.clone())
            .unwrap_or_default()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
