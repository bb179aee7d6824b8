use async_trait::async_trait;

use tickfill_market_data::{InstrumentId, Timestamp};

use super::model::AttemptRecord;
use crate::errors::Result;

/// Storage interface for attempt records. Append-only.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    fn has_attempt(
        &self,
        instrument_id: InstrumentId,
        start: Timestamp,
        end: Timestamp,
        provider_id: &str,
    ) -> Result<bool>;

    /// Every attempt recorded for an instrument.
    fn load_attempts(&self, instrument_id: InstrumentId) -> Result<Vec<AttemptRecord>>;

    /// Record an attempt. Recording the same key twice is not an error.
    async fn record_attempt(&self, record: AttemptRecord) -> Result<()>;
}
