//! Assignment loop and result ingestion.

use std::borrow::Cow;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use tickfill_market_data::{DataPoint, Fetched, Instrument, ProviderId, ProviderRegistry};

use super::config::SchedulerConfig;
use super::model::{
    Assignment, Horizon, InstrumentState, Job, JobOutcome, JobResult, PassSummary,
};
use super::worker::ProviderWorker;
use crate::attempts::{AttemptLedger, AttemptStore};
use crate::calendar::MarketCalendar;
use crate::errors::{Result, SchedulerError};
use crate::gaps::{Gap, GapDetector};
use crate::selection::{Candidate, ProviderSelector};
use crate::store::{InstrumentStore, TradingDataStore};

/// Owns control flow for acquisition passes.
pub struct Dispatcher {
    config: SchedulerConfig,
    registry: Arc<ProviderRegistry>,
    calendar: Arc<dyn MarketCalendar>,
    data_store: Arc<dyn TradingDataStore>,
    detector: GapDetector,
    ledger: AttemptLedger,
    selector: ProviderSelector,
}

impl Dispatcher {
    pub fn new(
        config: SchedulerConfig,
        registry: Arc<ProviderRegistry>,
        calendar: Arc<dyn MarketCalendar>,
        data_store: Arc<dyn TradingDataStore>,
        attempt_store: Arc<dyn AttemptStore>,
    ) -> Self {
        let detector = GapDetector::new(
            calendar.clone(),
            config.min_gap_seconds,
            config.resolution_seconds,
        );
        let ledger = AttemptLedger::new(attempt_store, calendar.clone());
        let selector = ProviderSelector::new(calendar.clone());

        Self {
            config,
            registry,
            calendar,
            data_store,
            detector,
            ledger,
            selector,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn horizon_at(&self, now: DateTime<Utc>) -> Result<Horizon> {
        Ok(Horizon::at(
            self.calendar.as_ref(),
            now,
            self.config.history_days,
        )?)
    }

    /// Gaps of `instrument` inside the horizon that some capable provider has
    /// not tried yet. Always reads the store afresh.
    pub fn compute_gaps(&self, instrument: &Instrument, horizon: &Horizon) -> Result<Vec<Gap>> {
        let timestamps = self
            .data_store
            .load_timestamps(instrument.id, horizon.start)?;
        let gaps = self
            .detector
            .find_gaps(instrument.id, &timestamps, horizon.start, horizon.end)?;
        self.ledger
            .filter_untried(instrument.id, gaps, self.registry.providers())
    }

    /// Pick the next job for an instrument.
    ///
    /// Walks the remaining gaps in chronological order and returns a job for
    /// the first one some provider can serve right now. `queue_depths` maps
    /// provider ids to their current backlog; missing entries count as idle.
    ///
    /// When only rate-limited providers could serve, the instrument is
    /// deferred until the first of them drops under `max_provider_wait`, or
    /// skipped for the pass if that is further away than `max_deferral`.
    pub fn assign(
        &self,
        instrument: &Instrument,
        horizon: &Horizon,
        queue_depths: &HashMap<&'static str, usize>,
        next_job_id: u64,
    ) -> Result<Assignment> {
        let gaps = self.compute_gaps(instrument, horizon)?;
        debug!("{}: {} untried gap(s)", instrument, gaps.len());

        let mut shortest_wait: Option<Duration> = None;
        for gap in &gaps {
            let mut candidates = Vec::new();
            for provider in self.ledger.untried_providers(gap, self.registry.providers())? {
                if self
                    .selector
                    .coverage_hours(provider.profile(), gap, horizon.now)
                    <= 0.0
                {
                    continue;
                }

                let provider_id: ProviderId = Cow::Borrowed(provider.id());
                let wait = self.registry.rate_limiter().wait_time(&provider_id);
                if wait > self.config.max_provider_wait {
                    debug!(
                        "{}: skipping '{}' for gap {}, next call in {:?}",
                        instrument, provider_id, gap, wait
                    );
                    shortest_wait = Some(shortest_wait.map_or(wait, |w| w.min(wait)));
                    continue;
                }

                candidates.push(Candidate {
                    queue_depth: queue_depths.get(provider.id()).copied().unwrap_or(0),
                    order: self.registry.position(provider.id()).unwrap_or(usize::MAX),
                    provider,
                });
            }

            if let Some(chosen) = self.selector.choose(gap, &candidates, horizon.now) {
                return Ok(Assignment::Job(Job {
                    id: next_job_id,
                    instrument: instrument.clone(),
                    provider_id: chosen.provider.id(),
                    start: gap.start,
                    end: gap.end,
                }));
            }
        }

        Ok(match shortest_wait {
            None => Assignment::Exhausted,
            Some(wait) => {
                let retry_in = wait.saturating_sub(self.config.max_provider_wait);
                if retry_in <= self.config.max_deferral {
                    Assignment::Deferred { retry_in }
                } else {
                    Assignment::RateLimited
                }
            }
        })
    }

    pub async fn run_pass(
        &self,
        instruments: Vec<Instrument>,
        cancel: &CancellationToken,
    ) -> Result<PassSummary> {
        self.run_pass_at(instruments, Utc::now(), cancel).await
    }

    /// Run one full pass with the horizon computed at `now`.
    ///
    /// Returns once every instrument is exhausted, rate limited or failed, or
    /// `cancel` fires. Workers are always joined before returning; results of fetches
    /// still in flight at shutdown are ingested.
    pub async fn run_pass_at(
        &self,
        instruments: Vec<Instrument>,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<PassSummary> {
        if self.registry.is_empty() {
            return Err(SchedulerError::NoProviders.into());
        }

        let horizon = self.horizon_at(now)?;
        info!(
            "Starting pass over {} instrument(s), horizon [{}, {}]",
            instruments.len(),
            horizon.start,
            horizon.end
        );

        let mut summary = PassSummary {
            instruments: instruments.len(),
            ..PassSummary::default()
        };
        let workers_cancel = cancel.child_token();
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<JobResult>();

        let mut queues: HashMap<&'static str, mpsc::Sender<Job>> = HashMap::new();
        let mut depths: HashMap<&'static str, Arc<AtomicUsize>> = HashMap::new();
        let mut handles = Vec::new();
        for provider in self.registry.providers() {
            let (job_tx, job_rx) = mpsc::channel(self.config.queue_capacity);
            let depth = Arc::new(AtomicUsize::new(0));
            let worker = ProviderWorker::new(
                provider.clone(),
                self.registry.rate_limiter().clone(),
                job_rx,
                result_tx.clone(),
                depth.clone(),
                workers_cancel.clone(),
                self.config.max_provider_wait,
            );
            handles.push(tokio::spawn(worker.run()));
            queues.insert(provider.id(), job_tx);
            depths.insert(provider.id(), depth);
        }
        drop(result_tx);

        for instrument in &instruments {
            summary
                .states
                .insert(instrument.symbol.clone(), InstrumentState::Idle);
        }

        let mut ready: VecDeque<Instrument> = instruments.into();
        // Instruments waiting on a rate limit, with the time they become due
        let mut deferred: Vec<(Instant, Instrument)> = Vec::new();
        let mut in_flight = 0usize;
        let mut next_job_id = 1u64;

        loop {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let now = Instant::now();
            let (due, waiting): (Vec<_>, Vec<_>) =
                deferred.drain(..).partition(|(at, _)| *at <= now);
            deferred = waiting;
            ready.extend(due.into_iter().map(|(_, instrument)| instrument));

            while let Some(instrument) = ready.pop_front() {
                let snapshot: HashMap<&'static str, usize> = depths
                    .iter()
                    .map(|(id, depth)| (*id, depth.load(Ordering::SeqCst)))
                    .collect();

                let state = match self.assign(&instrument, &horizon, &snapshot, next_job_id) {
                    Ok(Assignment::Job(job)) => {
                        transition(&mut summary, &instrument.symbol, InstrumentState::GapsComputed);
                        transition(&mut summary, &instrument.symbol, InstrumentState::Assigned);
                        next_job_id += 1;
                        match self.dispatch(job, &queues, &depths).await {
                            Ok(()) => {
                                in_flight += 1;
                                summary.jobs_dispatched += 1;
                                InstrumentState::AwaitingResult
                            }
                            Err(e) => {
                                error!("{}: {}", instrument, e);
                                summary.failed.push(instrument.symbol.clone());
                                InstrumentState::Failed
                            }
                        }
                    }
                    Ok(Assignment::Deferred { retry_in }) => {
                        debug!(
                            "{}: every capable provider is rate limited, retrying in {:?}",
                            instrument, retry_in
                        );
                        deferred.push((Instant::now() + retry_in, instrument.clone()));
                        InstrumentState::Deferred
                    }
                    Ok(Assignment::RateLimited) => {
                        info!(
                            "{}: every capable provider's budget is spent, skipping for this pass",
                            instrument
                        );
                        summary.rate_limited.push(instrument.symbol.clone());
                        InstrumentState::RateLimited
                    }
                    Ok(Assignment::Exhausted) => {
                        summary.exhausted.push(instrument.symbol.clone());
                        InstrumentState::Exhausted
                    }
                    Err(e) => {
                        error!("{}: gap computation failed: {}", instrument, e);
                        summary.failed.push(instrument.symbol.clone());
                        InstrumentState::Failed
                    }
                };
                transition(&mut summary, &instrument.symbol, state);
            }

            if in_flight == 0 && deferred.is_empty() {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    summary.cancelled = true;
                    break;
                }
                received = tokio::time::timeout(self.config.poll_interval, result_rx.recv()) => {
                    match received {
                        Ok(Some(result)) => {
                            in_flight = in_flight.saturating_sub(1);
                            let instrument = result.job.instrument.clone();
                            if self.ingest(result, &mut summary).await {
                                transition(&mut summary, &instrument.symbol, InstrumentState::Idle);
                                ready.push_back(instrument);
                            }
                        }
                        Ok(None) => {
                            warn!("All provider workers stopped before the pass finished");
                            break;
                        }
                        // Poll tick
                        Err(_) => {}
                    }
                }
            }
        }

        // Closing the queues stops idle workers; cancellation stops waiting ones
        drop(queues);
        if summary.cancelled {
            workers_cancel.cancel();
        }
        for joined in join_all(handles).await {
            if let Err(e) = joined {
                error!("Provider worker panicked: {}", e);
            }
        }
        while let Ok(result) = result_rx.try_recv() {
            self.ingest(result, &mut summary).await;
        }

        info!("Pass finished: {}", summary);
        Ok(summary)
    }

    async fn dispatch(
        &self,
        job: Job,
        queues: &HashMap<&'static str, mpsc::Sender<Job>>,
        depths: &HashMap<&'static str, Arc<AtomicUsize>>,
    ) -> Result<()> {
        let provider_id = job.provider_id;
        let queue = queues
            .get(provider_id)
            .ok_or_else(|| SchedulerError::QueueClosed(provider_id.to_string()))?;
        let depth = depths.get(provider_id);

        debug!("Dispatching {}", job);
        if let Some(depth) = depth {
            depth.fetch_add(1, Ordering::SeqCst);
        }
        if queue.send(job).await.is_err() {
            if let Some(depth) = depth {
                depth.fetch_sub(1, Ordering::SeqCst);
            }
            return Err(SchedulerError::QueueClosed(provider_id.to_string()).into());
        }
        Ok(())
    }

    /// Persist or memoize a job result. Returns whether the instrument should
    /// be assigned again.
    async fn ingest(&self, result: JobResult, summary: &mut PassSummary) -> bool {
        let JobResult { job, outcome } = result;

        let (inserted, complete) = match outcome {
            JobOutcome::Cancelled => return false,
            JobOutcome::Failed(e) => {
                warn!("{} failed: {}", job, e);
                summary.provider_errors += 1;
                (0, true)
            }
            JobOutcome::Fetched(Fetched { points, complete }) => {
                let received = points.len();
                let rows: Vec<DataPoint> = points
                    .into_iter()
                    .filter(|row| row.within(job.start, job.end))
                    .collect();
                if rows.len() < received {
                    debug!(
                        "{}: discarded {} row(s) outside the requested range",
                        job,
                        received - rows.len()
                    );
                }

                let inserted = if rows.is_empty() {
                    0
                } else {
                    match self.data_store.save(job.instrument.id, &rows).await {
                        Ok(inserted) => inserted,
                        Err(e) => {
                            error!("{}: failed to save {} row(s): {}", job, rows.len(), e);
                            summary.failed.push(job.instrument.symbol.clone());
                            transition(summary, &job.instrument.symbol, InstrumentState::Failed);
                            return false;
                        }
                    }
                };
                (inserted, complete)
            }
        };

        debug!("{}: {} new row(s)", job, inserted);
        summary.rows_inserted += inserted;
        if inserted > 0 {
            return true;
        }
        if !complete {
            // The provider stopped before covering the range; nothing to memoize
            debug!("{}: stopped early without new rows", job);
            return true;
        }

        match self
            .ledger
            .record(job.instrument.id, job.provider_id, job.start, job.end)
            .await
        {
            Ok(()) => {
                summary.attempts_recorded += 1;
                true
            }
            Err(e) => {
                // Without the memo the same job would be issued again
                error!("{}: failed to record attempt: {}", job, e);
                summary.failed.push(job.instrument.symbol.clone());
                transition(summary, &job.instrument.symbol, InstrumentState::Failed);
                false
            }
        }
    }
}

fn transition(summary: &mut PassSummary, symbol: &str, state: InstrumentState) {
    let previous = summary.states.insert(symbol.to_string(), state);
    debug!(
        "{}: {:?} -> {:?}",
        symbol,
        previous.unwrap_or(InstrumentState::Idle),
        state
    );
}

/// Instruments a pass should cover: the given symbols (created on first
/// reference), or every stored instrument when none are given.
pub async fn resolve_instruments(
    store: &dyn InstrumentStore,
    symbols: &[String],
) -> Result<Vec<Instrument>> {
    if symbols.is_empty() {
        return store.list_instruments();
    }

    let mut instruments = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let instrument = store.get_or_create(symbol).await?;
        if !instruments.contains(&instrument) {
            instruments.push(instrument);
        }
    }
    Ok(instruments)
}
