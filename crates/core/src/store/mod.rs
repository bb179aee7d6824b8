//! Trading data storage traits.
//!
//! These traits abstract the persistence layer. The SQLite implementation
//! lives in the `storage-sqlite` crate; [`InMemoryStore`] backs tests and
//! dry runs.
//!
//! # Design Notes
//!
//! - Async methods are used for writes, which go through a single writer
//! - Sync methods are used for reads, which are short queries on a pooled connection

mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;

use tickfill_market_data::{DataPoint, Instrument, InstrumentId, Timestamp};

use crate::errors::Result;

/// Storage interface for minute series.
#[async_trait]
pub trait TradingDataStore: Send + Sync {
    /// Bars of `instrument_id` at or after `min_timestamp`, ascending.
    fn load(&self, instrument_id: InstrumentId, min_timestamp: Timestamp) -> Result<Vec<DataPoint>>;

    /// Timestamps only; implementations may override with a narrower query.
    fn load_timestamps(
        &self,
        instrument_id: InstrumentId,
        min_timestamp: Timestamp,
    ) -> Result<Vec<Timestamp>> {
        Ok(self
            .load(instrument_id, min_timestamp)?
            .into_iter()
            .map(|point| point.timestamp)
            .collect())
    }

    /// Insert bars, ignoring any `(instrument, timestamp)` already stored.
    ///
    /// Returns the number of rows actually inserted.
    async fn save(&self, instrument_id: InstrumentId, points: &[DataPoint]) -> Result<usize>;
}

/// Storage interface for tracked instruments.
#[async_trait]
pub trait InstrumentStore: Send + Sync {
    fn list_instruments(&self) -> Result<Vec<Instrument>>;

    fn find_instrument(&self, symbol: &str) -> Result<Option<Instrument>>;

    /// Return the instrument for `symbol`, creating it on first reference.
    async fn get_or_create(&self, symbol: &str) -> Result<Instrument>;
}

/// Canonical form of a ticker symbol.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}
