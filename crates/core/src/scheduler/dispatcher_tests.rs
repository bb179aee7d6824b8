//! Tests for the dispatcher: assignment, ingestion and full passes.
//!
//! Providers are hand-written mocks that record every call. The clock is
//! pinned with `run_pass_at` so the horizon is a known trading day.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal_macros::dec;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use tickfill_market_data::{
    now_millis, CallGate, DataPoint, DateRange, Fetched, Instrument, MarketDataError,
    MarketDataProvider, ProviderId, ProviderProfile, ProviderRegistry, RateLimit, Timestamp,
    TradingHours,
};

use super::*;
use crate::calendar::UsEquityCalendar;
use crate::errors::Error;
use crate::store::{InMemoryStore, InstrumentStore, TradingDataStore};

/// Tue 2024-01-02 04:00 EST
const TUE_OPEN: Timestamp = 1_704_186_000;
/// Tue 2024-01-02 20:00 EST
const TUE_CLOSE: Timestamp = 1_704_243_600;

#[derive(Clone, Copy)]
enum Behavior {
    /// Every minute bar of the requested range, plus one bar just before it
    FullRange,
    Empty,
    Error,
}

struct MockProvider {
    id: &'static str,
    profile: ProviderProfile,
    behavior: Behavior,
    /// Signals `.0` once inside `fetch`, then blocks until `.1` is notified
    hold: Option<(Arc<Notify>, Arc<Notify>)>,
    calls: Arc<Mutex<Vec<(String, Timestamp, Timestamp)>>>,
}

impl MockProvider {
    fn new(id: &'static str, behavior: Behavior) -> Arc<Self> {
        Self::with_limits(id, behavior, vec![])
    }

    fn with_limits(id: &'static str, behavior: Behavior, limits: Vec<RateLimit>) -> Arc<Self> {
        Arc::new(Self::build(id, behavior, limits))
    }

    fn build(id: &'static str, behavior: Behavior, limits: Vec<RateLimit>) -> Self {
        Self {
            id,
            profile: ProviderProfile {
                name: id.to_string(),
                rate_limits: limits,
                date_range: DateRange::since(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()),
                trading_hours: TradingHours::extended(),
                result_delay: 0,
            },
            behavior,
            hold: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn holding(id: &'static str, entered: Arc<Notify>, release: Arc<Notify>) -> Arc<Self> {
        let mut provider = Self::build(id, Behavior::FullRange, vec![]);
        provider.hold = Some((entered, release));
        Arc::new(provider)
    }

    fn calls(&self) -> Vec<(String, Timestamp, Timestamp)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    fn id(&self) -> &'static str {
        self.id
    }

    fn profile(&self) -> &ProviderProfile {
        &self.profile
    }

    async fn fetch(
        &self,
        symbol: &str,
        start: Timestamp,
        end: Timestamp,
        gate: &CallGate,
    ) -> std::result::Result<Fetched, MarketDataError> {
        if !gate.acquire().await {
            return Ok(Fetched::partial(Vec::new()));
        }
        self.calls
            .lock()
            .unwrap()
            .push((symbol.to_string(), start, end));

        if let Some((entered, release)) = &self.hold {
            entered.notify_one();
            release.notified().await;
        }

        match self.behavior {
            Behavior::FullRange => Ok(Fetched::complete(
                (start - 60..end)
                    .step_by(60)
                    .map(|ts| {
                        DataPoint::ohlcv(ts, dec!(10), dec!(10.5), dec!(9.5), dec!(10.2), dec!(500))
                    })
                    .collect(),
            )),
            Behavior::Empty => Ok(Fetched::complete(Vec::new())),
            Behavior::Error => Err(MarketDataError::ProviderError {
                provider: self.id.to_string(),
                message: "boom".to_string(),
            }),
        }
    }
}

/// Wed 2024-01-03 03:00 EST: one day of history is exactly Tuesday's session.
fn wednesday_early() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 3, 8, 0, 0).unwrap()
}

fn config() -> SchedulerConfig {
    SchedulerConfig::default()
        .with_history_days(1)
        .with_poll_interval(Duration::from_millis(20))
}

fn dispatcher(
    providers: Vec<Arc<MockProvider>>,
    store: Arc<InMemoryStore>,
    config: SchedulerConfig,
) -> Dispatcher {
    let providers: Vec<Arc<dyn MarketDataProvider>> = providers
        .into_iter()
        .map(|p| p as Arc<dyn MarketDataProvider>)
        .collect();
    Dispatcher::new(
        config,
        Arc::new(ProviderRegistry::new(providers)),
        Arc::new(UsEquityCalendar::new()),
        store.clone(),
        store,
    )
}

async fn instrument(store: &InMemoryStore, symbol: &str) -> Instrument {
    store.get_or_create(symbol).await.unwrap()
}

#[tokio::test]
async fn test_horizon_is_one_trading_day() {
    let store = Arc::new(InMemoryStore::new());
    let dispatcher = dispatcher(vec![], store, config());
    let horizon = dispatcher.horizon_at(wednesday_early()).unwrap();
    assert_eq!((horizon.start, horizon.end), (TUE_OPEN, TUE_CLOSE));
}

#[tokio::test]
async fn test_first_assignment_follows_registration_order() {
    let store = Arc::new(InMemoryStore::new());
    let a = MockProvider::new("A", Behavior::FullRange);
    let b = MockProvider::new("B", Behavior::FullRange);
    let dispatcher = dispatcher(vec![a, b], store.clone(), config());
    let aapl = instrument(&store, "AAPL").await;
    let horizon = dispatcher.horizon_at(wednesday_early()).unwrap();

    let assignment = dispatcher
        .assign(&aapl, &horizon, &Default::default(), 1)
        .unwrap();

    assert_eq!(
        assignment,
        Assignment::Job(Job {
            id: 1,
            instrument: aapl,
            provider_id: "A",
            start: TUE_OPEN,
            end: TUE_CLOSE,
        })
    );
}

#[tokio::test]
async fn test_assignment_prefers_shorter_queue() {
    let store = Arc::new(InMemoryStore::new());
    let a = MockProvider::new("A", Behavior::FullRange);
    let b = MockProvider::new("B", Behavior::FullRange);
    let dispatcher = dispatcher(vec![a, b], store.clone(), config());
    let aapl = instrument(&store, "AAPL").await;
    let horizon = dispatcher.horizon_at(wednesday_early()).unwrap();

    let depths: HashMap<&'static str, usize> = [("A", 3), ("B", 1)].into_iter().collect();
    match dispatcher.assign(&aapl, &horizon, &depths, 1).unwrap() {
        Assignment::Job(job) => assert_eq!(job.provider_id, "B"),
        other => panic!("expected a job, got {:?}", other),
    }
}

#[tokio::test]
async fn test_end_to_end_pass_fills_the_day() {
    let store = Arc::new(InMemoryStore::new());
    let a = MockProvider::new("A", Behavior::FullRange);
    let b = MockProvider::new("B", Behavior::FullRange);
    let dispatcher = dispatcher(vec![a.clone(), b.clone()], store.clone(), config());
    let aapl = instrument(&store, "AAPL").await;

    let summary = dispatcher
        .run_pass_at(vec![aapl.clone()], wednesday_early(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(a.calls(), vec![("AAPL".to_string(), TUE_OPEN, TUE_CLOSE)]);
    assert!(b.calls().is_empty());
    assert_eq!(summary.jobs_dispatched, 1);
    // 16 hours of minute bars; the bar before the range is discarded
    assert_eq!(summary.rows_inserted, 960);
    assert_eq!(summary.attempts_recorded, 0);
    assert_eq!(summary.exhausted, vec!["AAPL".to_string()]);
    assert_eq!(summary.states["AAPL"], InstrumentState::Exhausted);
    assert_eq!(store.load(aapl.id, 0).unwrap()[0].timestamp, TUE_OPEN);

    // A second look finds nothing left to do
    let horizon = dispatcher.horizon_at(wednesday_early()).unwrap();
    assert!(dispatcher.compute_gaps(&aapl, &horizon).unwrap().is_empty());
    assert_eq!(
        dispatcher
            .assign(&aapl, &horizon, &Default::default(), 2)
            .unwrap(),
        Assignment::Exhausted
    );
}

#[tokio::test]
async fn test_empty_result_is_memoized_and_next_provider_tried() {
    let store = Arc::new(InMemoryStore::new());
    let a = MockProvider::new("A", Behavior::Empty);
    let b = MockProvider::new("B", Behavior::FullRange);
    let dispatcher = dispatcher(vec![a.clone(), b.clone()], store.clone(), config());
    let aapl = instrument(&store, "AAPL").await;

    let summary = dispatcher
        .run_pass_at(vec![aapl], wednesday_early(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(a.calls().len(), 1);
    assert_eq!(b.calls(), vec![("AAPL".to_string(), TUE_OPEN, TUE_CLOSE)]);
    assert_eq!(summary.attempts_recorded, 1);
    assert_eq!(summary.rows_inserted, 960);
    assert_eq!(store.attempt_count(), 1);
}

#[tokio::test]
async fn test_fetch_error_counts_as_no_data() {
    let store = Arc::new(InMemoryStore::new());
    let a = MockProvider::new("A", Behavior::Error);
    let dispatcher = dispatcher(vec![a.clone()], store.clone(), config());
    let aapl = instrument(&store, "AAPL").await;

    let summary = dispatcher
        .run_pass_at(vec![aapl], wednesday_early(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.provider_errors, 1);
    assert_eq!(summary.attempts_recorded, 1);
    assert!(summary.failed.is_empty());
    assert_eq!(summary.exhausted, vec!["AAPL".to_string()]);
}

#[tokio::test]
async fn test_known_empty_range_is_never_requested_again() {
    let store = Arc::new(InMemoryStore::new());
    let a = MockProvider::new("A", Behavior::Empty);
    let dispatcher = dispatcher(vec![a.clone()], store.clone(), config());
    let aapl = instrument(&store, "AAPL").await;

    for _ in 0..3 {
        dispatcher
            .run_pass_at(vec![aapl.clone()], wednesday_early(), &CancellationToken::new())
            .await
            .unwrap();
    }

    assert_eq!(a.calls().len(), 1);
}

fn spend_budget(dispatcher: &Dispatcher, provider: &'static str) {
    let provider_id: ProviderId = provider.into();
    dispatcher
        .registry()
        .rate_limiter()
        .record_call(&provider_id, now_millis());
}

#[tokio::test]
async fn test_short_rate_limit_defers_until_the_window_opens() {
    let store = Arc::new(InMemoryStore::new());
    let a = MockProvider::with_limits("A", Behavior::FullRange, vec![RateLimit::per_minute(1)]);
    let dispatcher = dispatcher(vec![a], store.clone(), config());
    let aapl = instrument(&store, "AAPL").await;
    let horizon = dispatcher.horizon_at(wednesday_early()).unwrap();
    spend_budget(&dispatcher, "A");

    // Free in about 60s, eligible once under the 10s wait threshold
    match dispatcher
        .assign(&aapl, &horizon, &Default::default(), 1)
        .unwrap()
    {
        Assignment::Deferred { retry_in } => {
            assert!(retry_in <= Duration::from_secs(50));
            assert!(retry_in > Duration::from_secs(45));
        }
        other => panic!("expected a deferral, got {:?}", other),
    }
}

#[tokio::test]
async fn test_spent_daily_budget_is_skipped_for_the_pass() {
    let store = Arc::new(InMemoryStore::new());
    let a = MockProvider::with_limits("A", Behavior::FullRange, vec![RateLimit::per_day(1)]);
    let dispatcher = dispatcher(vec![a.clone()], store.clone(), config());
    let aapl = instrument(&store, "AAPL").await;
    let horizon = dispatcher.horizon_at(wednesday_early()).unwrap();
    spend_budget(&dispatcher, "A");

    assert_eq!(
        dispatcher
            .assign(&aapl, &horizon, &Default::default(), 1)
            .unwrap(),
        Assignment::RateLimited
    );

    let summary = tokio::time::timeout(
        Duration::from_secs(3),
        dispatcher.run_pass_at(vec![aapl], wednesday_early(), &CancellationToken::new()),
    )
    .await
    .expect("pass should not wait for the daily budget")
    .unwrap();

    assert!(a.calls().is_empty());
    assert_eq!(summary.jobs_dispatched, 0);
    assert_eq!(summary.attempts_recorded, 0);
    assert_eq!(summary.rate_limited, vec!["AAPL".to_string()]);
    assert_eq!(summary.states["AAPL"], InstrumentState::RateLimited);
}

#[tokio::test]
async fn test_spent_provider_does_not_hold_back_the_other() {
    let store = Arc::new(InMemoryStore::new());
    let a = MockProvider::with_limits("A", Behavior::FullRange, vec![RateLimit::per_day(1)]);
    let b = MockProvider::new("B", Behavior::FullRange);
    let dispatcher = dispatcher(vec![a.clone(), b.clone()], store.clone(), config());
    let aapl = instrument(&store, "AAPL").await;
    let msft = instrument(&store, "MSFT").await;
    spend_budget(&dispatcher, "A");

    let summary = tokio::time::timeout(
        Duration::from_secs(3),
        dispatcher.run_pass_at(vec![aapl, msft], wednesday_early(), &CancellationToken::new()),
    )
    .await
    .expect("pass should finish on the free provider")
    .unwrap();

    assert!(a.calls().is_empty());
    assert_eq!(
        b.calls(),
        vec![
            ("AAPL".to_string(), TUE_OPEN, TUE_CLOSE),
            ("MSFT".to_string(), TUE_OPEN, TUE_CLOSE),
        ]
    );
    assert_eq!(summary.rows_inserted, 2 * 960);
    assert_eq!(summary.exhausted.len(), 2);
    assert!(summary.rate_limited.is_empty());
}

#[tokio::test]
async fn test_deferred_instrument_is_served_once_the_window_opens() {
    let store = Arc::new(InMemoryStore::new());
    let a = MockProvider::with_limits("A", Behavior::FullRange, vec![RateLimit::per_second(1)]);
    let config = config().with_max_provider_wait(Duration::ZERO);
    let dispatcher = dispatcher(vec![a.clone()], store.clone(), config);
    let aapl = instrument(&store, "AAPL").await;
    spend_budget(&dispatcher, "A");

    let summary = tokio::time::timeout(
        Duration::from_secs(5),
        dispatcher.run_pass_at(vec![aapl], wednesday_early(), &CancellationToken::new()),
    )
    .await
    .expect("deferral should end when the window opens")
    .unwrap();

    assert_eq!(a.calls().len(), 1);
    assert_eq!(summary.rows_inserted, 960);
    assert_eq!(summary.states["AAPL"], InstrumentState::Exhausted);
}

#[tokio::test]
async fn test_calendar_inconsistency_fails_only_that_instrument() {
    let store = Arc::new(InMemoryStore::new());
    let a = MockProvider::new("A", Behavior::Empty);
    let dispatcher = dispatcher(vec![a], store.clone(), config().with_history_days(8));
    let bad = instrument(&store, "BAD").await;
    let good = instrument(&store, "GOOD").await;

    // Sat 2024-01-06 12:00 EST
    let saturday_bar = DataPoint::ohlcv(1_704_560_400, dec!(1), dec!(1), dec!(1), dec!(1), dec!(1));
    store.save(bad.id, &[saturday_bar]).await.unwrap();

    // Wed 2024-01-10 03:00 EST, horizon Tue 01-02 04:00 to Tue 01-09 20:00
    let now = Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap();
    let summary = dispatcher
        .run_pass_at(vec![bad, good], now, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.failed, vec!["BAD".to_string()]);
    assert_eq!(summary.states["BAD"], InstrumentState::Failed);
    assert_eq!(summary.exhausted, vec!["GOOD".to_string()]);
    assert_eq!(summary.attempts_recorded, 1);
}

#[tokio::test]
async fn test_cancelled_pass_dispatches_nothing() {
    let store = Arc::new(InMemoryStore::new());
    let a = MockProvider::new("A", Behavior::FullRange);
    let dispatcher = dispatcher(vec![a.clone()], store.clone(), config());
    let aapl = instrument(&store, "AAPL").await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let summary = dispatcher
        .run_pass_at(vec![aapl], wednesday_early(), &cancel)
        .await
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.jobs_dispatched, 0);
    assert!(a.calls().is_empty());
}

#[tokio::test]
async fn test_cancel_lets_in_flight_fetch_finish_and_ingests_it() {
    let store = Arc::new(InMemoryStore::new());
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let a = MockProvider::holding("A", entered.clone(), release.clone());
    let dispatcher = dispatcher(vec![a.clone()], store.clone(), config());
    let aapl = instrument(&store, "AAPL").await;
    let cancel = CancellationToken::new();

    let pass = dispatcher.run_pass_at(vec![aapl.clone()], wednesday_early(), &cancel);
    let shutdown = async {
        entered.notified().await;
        cancel.cancel();
        release.notify_one();
    };
    let (summary, ()) = tokio::time::timeout(Duration::from_secs(3), async {
        tokio::join!(pass, shutdown)
    })
    .await
    .expect("workers should be joined after cancellation");
    let summary = summary.unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.jobs_dispatched, 1);
    assert_eq!(a.calls().len(), 1);
    assert_eq!(summary.rows_inserted, 960);
    assert_eq!(store.load(aapl.id, 0).unwrap().len(), 960);
}

#[tokio::test]
async fn test_pass_without_providers_is_an_error() {
    let store = Arc::new(InMemoryStore::new());
    let dispatcher = dispatcher(vec![], store, config());
    let result = dispatcher
        .run_pass_at(vec![], wednesday_early(), &CancellationToken::new())
        .await;
    assert!(matches!(
        result,
        Err(Error::Scheduler(crate::errors::SchedulerError::NoProviders))
    ));
}

#[tokio::test]
async fn test_several_instruments_share_workers() {
    let store = Arc::new(InMemoryStore::new());
    let a = MockProvider::new("A", Behavior::FullRange);
    let dispatcher = dispatcher(vec![a.clone()], store.clone(), config());
    let mut instruments = Vec::new();
    for symbol in ["AAPL", "MSFT", "NVDA"] {
        instruments.push(instrument(&store, symbol).await);
    }

    let summary = dispatcher
        .run_pass_at(instruments, wednesday_early(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.jobs_dispatched, 3);
    assert_eq!(summary.rows_inserted, 3 * 960);
    assert_eq!(summary.exhausted.len(), 3);
}

#[tokio::test]
async fn test_resolve_instruments() {
    let store = InMemoryStore::new();
    let listed = resolve_instruments(&store, &["msft".to_string(), "MSFT".to_string()])
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].symbol, "MSFT");

    instrument(&store, "AAPL").await;
    let all = resolve_instruments(&store, &[]).await.unwrap();
    assert_eq!(all.len(), 2);
}
