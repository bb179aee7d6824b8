use std::fmt;

use serde::{Deserialize, Serialize};

use tickfill_market_data::{InstrumentId, Timestamp};

/// One end of a candidate gap.
///
/// A boundary is either a confirmed data point or a horizon sentinel. Only
/// confirmed data points pull the gap in by one resolution unit, since the
/// bar at that timestamp already exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Boundary {
    pub timestamp: Timestamp,
    pub is_data: bool,
}

impl Boundary {
    pub const fn data(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            is_data: true,
        }
    }

    pub const fn sentinel(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            is_data: false,
        }
    }
}

/// A range with no confirmed data. Ephemeral: recomputed every assignment.
///
/// `start` and `end` are inclusive bar timestamps and are exactly the
/// range a provider is asked for, so they double as the attempt key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Gap {
    pub instrument_id: InstrumentId,
    pub start: Timestamp,
    pub end: Timestamp,
    /// Length with closed-market time removed, in seconds
    pub adjusted_seconds: i64,
}

impl Gap {
    /// Canonical gap between two boundaries.
    ///
    /// Every place that derives a gap from boundaries goes through here so
    /// the `(start, end)` pair is reproducible, which the attempt ledger
    /// relies on. Returns `None` when shrinking leaves nothing.
    pub fn from_boundaries(
        instrument_id: InstrumentId,
        lower: Boundary,
        upper: Boundary,
        resolution: i64,
        adjusted_seconds: i64,
    ) -> Option<Self> {
        let start = if lower.is_data {
            lower.timestamp + resolution
        } else {
            lower.timestamp
        };
        let end = if upper.is_data {
            upper.timestamp - resolution
        } else {
            upper.timestamp
        };

        (start <= end).then_some(Self {
            instrument_id,
            start,
            end,
            adjusted_seconds,
        })
    }

    /// Wall-clock length in seconds.
    pub fn duration(&self) -> i64 {
        self.end - self.start
    }

    pub fn contains(&self, timestamp: Timestamp) -> bool {
        (self.start..=self.end).contains(&timestamp)
    }
}

impl fmt::Display for Gap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} [{}, {}] ({}s adjusted)",
            self.instrument_id, self.start, self.end, self.adjusted_seconds
        )
    }
}
