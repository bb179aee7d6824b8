use serde::{Deserialize, Serialize};

use tickfill_market_data::{InstrumentId, Timestamp};

/// "Provider found nothing for this exact range of this instrument."
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub instrument_id: InstrumentId,
    pub provider_id: String,
    pub start: Timestamp,
    pub end: Timestamp,
}

impl AttemptRecord {
    pub fn new(
        instrument_id: InstrumentId,
        provider_id: impl Into<String>,
        start: Timestamp,
        end: Timestamp,
    ) -> Self {
        Self {
            instrument_id,
            provider_id: provider_id.into(),
            start,
            end,
        }
    }
}
