//! In-memory implementation of every store trait.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use log::warn;

use tickfill_market_data::{
    CallLogStore, CallTime, DataPoint, Instrument, InstrumentId, MarketDataError, Timestamp,
};

use super::{normalize_symbol, InstrumentStore, TradingDataStore};
use crate::attempts::{AttemptRecord, AttemptStore};
use crate::errors::Result;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        warn!("In-memory store mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct InMemoryStore {
    series: Mutex<HashMap<InstrumentId, BTreeMap<Timestamp, DataPoint>>>,
    instruments: Mutex<Vec<Instrument>>,
    attempts: Mutex<HashSet<AttemptRecord>>,
    calls: Mutex<HashMap<String, Vec<CallTime>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored bars for an instrument.
    pub fn len(&self, instrument_id: InstrumentId) -> usize {
        lock(&self.series)
            .get(&instrument_id)
            .map_or(0, BTreeMap::len)
    }

    pub fn attempt_count(&self) -> usize {
        lock(&self.attempts).len()
    }
}

#[async_trait]
impl TradingDataStore for InMemoryStore {
    fn load(&self, instrument_id: InstrumentId, min_timestamp: Timestamp) -> Result<Vec<DataPoint>> {
        Ok(lock(&self.series)
            .get(&instrument_id)
            .map(|series| series.range(min_timestamp..).map(|(_, p)| p.clone()).collect())
            .unwrap_or_default())
    }

    async fn save(&self, instrument_id: InstrumentId, points: &[DataPoint]) -> Result<usize> {
        let mut all = lock(&self.series);
        let series = all.entry(instrument_id).or_default();
        let mut inserted = 0;
        for point in points {
            if !series.contains_key(&point.timestamp) {
                series.insert(point.timestamp, point.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

#[async_trait]
impl InstrumentStore for InMemoryStore {
    fn list_instruments(&self) -> Result<Vec<Instrument>> {
        Ok(lock(&self.instruments).clone())
    }

    fn find_instrument(&self, symbol: &str) -> Result<Option<Instrument>> {
        let symbol = normalize_symbol(symbol);
        Ok(lock(&self.instruments)
            .iter()
            .find(|i| i.symbol == symbol)
            .cloned())
    }

    async fn get_or_create(&self, symbol: &str) -> Result<Instrument> {
        let symbol = normalize_symbol(symbol);
        let mut instruments = lock(&self.instruments);
        if let Some(existing) = instruments.iter().find(|i| i.symbol == symbol) {
            return Ok(existing.clone());
        }

        let instrument = Instrument::new(instruments.len() as InstrumentId + 1, symbol);
        instruments.push(instrument.clone());
        Ok(instrument)
    }
}

#[async_trait]
impl AttemptStore for InMemoryStore {
    fn has_attempt(
        &self,
        instrument_id: InstrumentId,
        start: Timestamp,
        end: Timestamp,
        provider_id: &str,
    ) -> Result<bool> {
        Ok(lock(&self.attempts).contains(&AttemptRecord::new(
            instrument_id,
            provider_id,
            start,
            end,
        )))
    }

    fn load_attempts(&self, instrument_id: InstrumentId) -> Result<Vec<AttemptRecord>> {
        Ok(lock(&self.attempts)
            .iter()
            .filter(|a| a.instrument_id == instrument_id)
            .cloned()
            .collect())
    }

    async fn record_attempt(&self, record: AttemptRecord) -> Result<()> {
        lock(&self.attempts).insert(record);
        Ok(())
    }
}

impl CallLogStore for InMemoryStore {
    fn load_calls(&self, provider: &str) -> std::result::Result<Vec<CallTime>, MarketDataError> {
        Ok(lock(&self.calls).get(provider).cloned().unwrap_or_default())
    }

    fn save_calls(
        &self,
        provider: &str,
        calls: &[CallTime],
    ) -> std::result::Result<(), MarketDataError> {
        lock(&self.calls).insert(provider.to_string(), calls.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bar(timestamp: Timestamp) -> DataPoint {
        DataPoint::ohlcv(timestamp, dec!(10), dec!(11), dec!(9), dec!(10.5), dec!(100))
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_a_no_op() {
        let store = InMemoryStore::new();
        assert_eq!(store.save(1, &[bar(60), bar(120)]).await.unwrap(), 2);

        let mut changed = bar(60);
        changed.close = dec!(99);
        assert_eq!(store.save(1, &[changed]).await.unwrap(), 0);

        let series = store.load(1, 0).unwrap();
        assert_eq!(series, vec![bar(60), bar(120)]);
    }

    #[tokio::test]
    async fn test_load_is_sorted_and_bounded() {
        let store = InMemoryStore::new();
        store.save(1, &[bar(300), bar(60), bar(180)]).await.unwrap();
        store.save(2, &[bar(240)]).await.unwrap();

        assert_eq!(store.load_timestamps(1, 100).unwrap(), vec![180, 300]);
        assert_eq!(store.len(2), 1);
    }

    #[tokio::test]
    async fn test_get_or_create_is_stable() {
        let store = InMemoryStore::new();
        let first = store.get_or_create("aapl ").await.unwrap();
        let again = store.get_or_create("AAPL").await.unwrap();
        let other = store.get_or_create("MSFT").await.unwrap();

        assert_eq!(first, again);
        assert_eq!(first.symbol, "AAPL");
        assert_ne!(first.id, other.id);
        assert_eq!(store.list_instruments().unwrap().len(), 2);
        assert!(store.find_instrument("msft").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_attempts_are_keyed_by_exact_range() {
        let store = InMemoryStore::new();
        store
            .record_attempt(AttemptRecord::new(1, "POLYGON", 100, 200))
            .await
            .unwrap();

        assert!(store.has_attempt(1, 100, 200, "POLYGON").unwrap());
        assert!(!store.has_attempt(1, 100, 260, "POLYGON").unwrap());
        assert!(!store.has_attempt(1, 100, 200, "ALPHA_VANTAGE").unwrap());
        assert_eq!(store.load_attempts(1).unwrap().len(), 1);
    }
}
