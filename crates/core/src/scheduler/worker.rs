use std::borrow::Cow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use tickfill_market_data::{CallGate, MarketDataProvider, ProviderId, RateLimiter};

use super::model::{Job, JobOutcome, JobResult};

/// Drains one provider's job queue.
///
/// The worker is the only user of the rate limiter for its provider. Each
/// job gets a [`CallGate`] so every endpoint request of the fetch waits for
/// and records its own slot.
pub(crate) struct ProviderWorker {
    provider: Arc<dyn MarketDataProvider>,
    rate_limiter: Arc<RateLimiter>,
    jobs: mpsc::Receiver<Job>,
    results: mpsc::UnboundedSender<JobResult>,
    depth: Arc<AtomicUsize>,
    cancel: CancellationToken,
    max_wait: Duration,
}

impl ProviderWorker {
    pub(crate) fn new(
        provider: Arc<dyn MarketDataProvider>,
        rate_limiter: Arc<RateLimiter>,
        jobs: mpsc::Receiver<Job>,
        results: mpsc::UnboundedSender<JobResult>,
        depth: Arc<AtomicUsize>,
        cancel: CancellationToken,
        max_wait: Duration,
    ) -> Self {
        Self {
            provider,
            rate_limiter,
            jobs,
            results,
            depth,
            cancel,
            max_wait,
        }
    }

    pub(crate) async fn run(mut self) {
        let provider_id: ProviderId = Cow::Borrowed(self.provider.id());
        debug!("Worker for '{}' started", provider_id);

        loop {
            let job = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                job = self.jobs.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            let outcome = if self.cancel.is_cancelled() {
                JobOutcome::Cancelled
            } else {
                let gate = CallGate::new(
                    self.rate_limiter.clone(),
                    provider_id.clone(),
                    self.cancel.clone(),
                    self.max_wait,
                );
                debug!("Fetching {}", job);
                // Not raced against cancellation: an issued call is allowed to finish
                match self
                    .provider
                    .fetch(&job.instrument.symbol, job.start, job.end, &gate)
                    .await
                {
                    Ok(fetched) => JobOutcome::Fetched(fetched),
                    Err(e) => JobOutcome::Failed(e),
                }
            };

            self.depth.fetch_sub(1, Ordering::SeqCst);
            if self.results.send(JobResult { job, outcome }).is_err() {
                break;
            }
        }

        debug!("Worker for '{}' stopped", provider_id);
    }
}
