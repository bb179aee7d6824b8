use std::collections::HashSet;
use std::sync::Arc;

use log::debug;

use tickfill_market_data::{InstrumentId, MarketDataProvider, Timestamp};

use super::model::AttemptRecord;
use super::store::AttemptStore;
use crate::calendar::MarketCalendar;
use crate::errors::Result;
use crate::gaps::Gap;

/// Filters work down to `(provider, gap)` pairs that have not failed before.
pub struct AttemptLedger {
    store: Arc<dyn AttemptStore>,
    calendar: Arc<dyn MarketCalendar>,
}

impl AttemptLedger {
    pub fn new(store: Arc<dyn AttemptStore>, calendar: Arc<dyn MarketCalendar>) -> Self {
        Self { store, calendar }
    }

    /// Whether the provider's history window reaches into the gap at all.
    pub fn can_serve(&self, provider: &dyn MarketDataProvider, gap: &Gap) -> bool {
        let range = provider.profile().date_range;
        let first = self.calendar.local_date(gap.start);
        let last = self.calendar.local_date(gap.end);
        range.min <= last && range.max.map_or(true, |max| max >= first)
    }

    /// Drop the gaps every capable provider has already failed on.
    pub fn filter_untried(
        &self,
        instrument_id: InstrumentId,
        gaps: Vec<Gap>,
        providers: &[Arc<dyn MarketDataProvider>],
    ) -> Result<Vec<Gap>> {
        let tried: HashSet<AttemptRecord> = self
            .store
            .load_attempts(instrument_id)?
            .into_iter()
            .collect();

        let before = gaps.len();
        let untried: Vec<Gap> = gaps
            .into_iter()
            .filter(|gap| {
                providers.iter().any(|provider| {
                    self.can_serve(provider.as_ref(), gap)
                        && !tried.contains(&AttemptRecord::new(
                            instrument_id,
                            provider.id(),
                            gap.start,
                            gap.end,
                        ))
                })
            })
            .collect();

        if untried.len() < before {
            debug!(
                "Instrument #{}: {} of {} gap(s) already tried by every capable provider",
                instrument_id,
                before - untried.len(),
                before
            );
        }

        Ok(untried)
    }

    /// Capable providers that have not failed on this exact gap, in input order.
    pub fn untried_providers(
        &self,
        gap: &Gap,
        providers: &[Arc<dyn MarketDataProvider>],
    ) -> Result<Vec<Arc<dyn MarketDataProvider>>> {
        let mut untried = Vec::new();
        for provider in providers {
            if self.can_serve(provider.as_ref(), gap)
                && !self
                    .store
                    .has_attempt(gap.instrument_id, gap.start, gap.end, provider.id())?
            {
                untried.push(Arc::clone(provider));
            }
        }
        Ok(untried)
    }

    pub async fn record(
        &self,
        instrument_id: InstrumentId,
        provider_id: &str,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<()> {
        debug!(
            "Recording empty attempt: #{} {} [{}, {}]",
            instrument_id, provider_id, start, end
        );
        self.store
            .record_attempt(AttemptRecord::new(instrument_id, provider_id, start, end))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::UsEquityCalendar;
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use tickfill_market_data::{
        CallGate, DateRange, Fetched, MarketDataError, ProviderProfile, TradingHours,
    };

    struct Stub {
        id: &'static str,
        profile: ProviderProfile,
    }

    #[async_trait]
    impl MarketDataProvider for Stub {
        fn id(&self) -> &'static str {
            self.id
        }

        fn profile(&self) -> &ProviderProfile {
            &self.profile
        }

        async fn fetch(
            &self,
            _symbol: &str,
            _start: Timestamp,
            _end: Timestamp,
            _gate: &CallGate,
        ) -> std::result::Result<Fetched, MarketDataError> {
            Ok(Fetched::complete(Vec::new()))
        }
    }

    fn stub(id: &'static str, since: NaiveDate) -> Arc<dyn MarketDataProvider> {
        Arc::new(Stub {
            id,
            profile: ProviderProfile {
                name: id.to_string(),
                rate_limits: vec![],
                date_range: DateRange::since(since),
                trading_hours: TradingHours::extended(),
                result_delay: 0,
            },
        })
    }

    fn ledger(store: Arc<InMemoryStore>) -> AttemptLedger {
        AttemptLedger::new(store, Arc::new(UsEquityCalendar::new()))
    }

    fn gap() -> Gap {
        // Tue 2024-01-02 04:00 to 20:00 EST
        Gap {
            instrument_id: 1,
            start: 1_704_186_000,
            end: 1_704_243_600,
            adjusted_seconds: 57_600,
        }
    }

    fn old() -> NaiveDate {
        NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()
    }

    #[tokio::test]
    async fn test_recorded_attempt_suppresses_gap() {
        let store = Arc::new(InMemoryStore::new());
        let ledger = ledger(store.clone());
        let providers = vec![stub("P", old())];

        assert_eq!(ledger.filter_untried(1, vec![gap()], &providers).unwrap().len(), 1);

        ledger.record(1, "P", gap().start, gap().end).await.unwrap();
        assert!(ledger.filter_untried(1, vec![gap()], &providers).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_gap_survives_until_every_capable_provider_tried() {
        let store = Arc::new(InMemoryStore::new());
        let ledger = ledger(store);
        let providers = vec![stub("A", old()), stub("B", old())];

        ledger.record(1, "A", gap().start, gap().end).await.unwrap();
        assert_eq!(ledger.filter_untried(1, vec![gap()], &providers).unwrap().len(), 1);

        let untried = ledger.untried_providers(&gap(), &providers).unwrap();
        assert_eq!(untried.len(), 1);
        assert_eq!(untried[0].id(), "B");
    }

    #[tokio::test]
    async fn test_incapable_providers_do_not_keep_gap_alive() {
        let store = Arc::new(InMemoryStore::new());
        let ledger = ledger(store);
        // History only from 2025 on, the gap is in 2024
        let providers = vec![
            stub("A", old()),
            stub("RECENT", NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()),
        ];

        ledger.record(1, "A", gap().start, gap().end).await.unwrap();
        assert!(ledger.filter_untried(1, vec![gap()], &providers).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_attempts_are_per_instrument_and_exact() {
        let store = Arc::new(InMemoryStore::new());
        let ledger = ledger(store);
        let providers = vec![stub("P", old())];

        ledger.record(2, "P", gap().start, gap().end).await.unwrap();
        ledger.record(1, "P", gap().start, gap().end - 60).await.unwrap();

        assert_eq!(ledger.filter_untried(1, vec![gap()], &providers).unwrap().len(), 1);
    }
}
