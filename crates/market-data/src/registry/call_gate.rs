//! Per-request admission for provider HTTP calls.
//!
//! A single fetch may need several endpoint requests (pages, months). Each
//! of them goes through [`CallGate::acquire`], which waits for the shared
//! [`RateLimiter`] and records the call before the request is sent.

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio_util::sync::CancellationToken;

use super::rate_limiter::{now_millis, RateLimiter};
use crate::models::ProviderId;

/// Rate-limit slot dispenser handed to a provider for one fetch.
pub struct CallGate {
    limiter: Arc<RateLimiter>,
    provider: ProviderId,
    cancel: CancellationToken,
    max_wait: Duration,
}

impl CallGate {
    /// Gate calls to `provider`, refusing any slot further away than `max_wait`.
    pub fn new(
        limiter: Arc<RateLimiter>,
        provider: impl Into<ProviderId>,
        cancel: CancellationToken,
        max_wait: Duration,
    ) -> Self {
        Self {
            limiter,
            provider: provider.into(),
            cancel,
            max_wait,
        }
    }

    /// A gate with no budget, for one-off use outside the scheduler.
    pub fn unthrottled(provider: impl Into<ProviderId>) -> Self {
        Self::new(
            Arc::new(RateLimiter::new()),
            provider,
            CancellationToken::new(),
            Duration::MAX,
        )
    }

    /// Wait for the next legal call time and record the call.
    ///
    /// Returns `false` without recording when the wait exceeds the gate's
    /// limit or cancellation fires first; the provider must not issue the
    /// request then.
    pub async fn acquire(&self) -> bool {
        let wait = self.limiter.wait_time(&self.provider);
        if wait > self.max_wait {
            debug!(
                "Call gate: '{}' would wait {:?}, refusing",
                self.provider, wait
            );
            return false;
        }

        if !self.limiter.acquire(&self.provider, &self.cancel).await {
            return false;
        }
        self.limiter.record_call(&self.provider, now_millis());
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn provider(&self) -> &ProviderId {
        &self.provider
    }
}
