use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::Timestamp;

/// One minute bar of trading data.
///
/// The owning instrument is not part of the struct; series are always keyed
/// by instrument at the store boundary, and `(instrument, timestamp)` is the
/// uniqueness key there.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Start of the bar, whole seconds UTC
    pub timestamp: Timestamp,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    /// Volume-weighted average price, when the provider publishes one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vwap: Option<Decimal>,
}

impl DataPoint {
    /// Create a full OHLCV bar
    pub fn ohlcv(
        timestamp: Timestamp,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            vwap: None,
        }
    }

    pub fn with_vwap(mut self, vwap: Decimal) -> Self {
        self.vwap = Some(vwap);
        self
    }

    /// True when the bar falls inside the inclusive range `[start, end]`.
    pub fn within(&self, start: Timestamp, end: Timestamp) -> bool {
        self.timestamp >= start && self.timestamp <= end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_within_is_inclusive() {
        let bar = DataPoint::ohlcv(120, dec!(1), dec!(2), dec!(0.5), dec!(1.5), dec!(100));
        assert!(bar.within(120, 180));
        assert!(bar.within(60, 120));
        assert!(!bar.within(121, 180));
    }

    #[test]
    fn test_vwap_is_optional_in_json() {
        let bar = DataPoint::ohlcv(60, dec!(1), dec!(1), dec!(1), dec!(1), dec!(0));
        let json = serde_json::to_string(&bar).unwrap();
        assert!(!json.contains("vwap"));

        let bar = bar.with_vwap(dec!(1.01));
        assert_eq!(bar.vwap, Some(dec!(1.01)));
    }
}
