//! Gap detection.
//!
//! Candidate gaps are the spaces between consecutive boundaries (stored bar
//! timestamps plus the two horizon sentinels). When a pair spans several
//! exchange-local dates, closed-market time is taken out before comparing
//! against the minimum gap: the overnight break before each open date
//! crossed and the whole day for each closed date, both measured in
//! exchange-local time so DST changes do not leave phantom gaps.

use std::sync::Arc;

use log::debug;

use tickfill_market_data::{InstrumentId, Timestamp};

use super::model::{Boundary, Gap};
use crate::calendar::{MarketCalendar, OpenDateIndex};
use crate::errors::CalendarError;

pub struct GapDetector {
    calendar: Arc<dyn MarketCalendar>,
    min_gap_seconds: i64,
    resolution: i64,
}

impl GapDetector {
    pub fn new(calendar: Arc<dyn MarketCalendar>, min_gap_seconds: i64, resolution: i64) -> Self {
        Self {
            calendar,
            min_gap_seconds,
            resolution,
        }
    }

    pub fn min_gap_seconds(&self) -> i64 {
        self.min_gap_seconds
    }

    /// Ranges inside `[horizon_start, horizon_end]` with no stored bars,
    /// chronological and non-overlapping.
    ///
    /// `existing` need not be sorted; timestamps outside the horizon are
    /// ignored. Fails if a boundary lands on a date the calendar says was
    /// closed.
    pub fn find_gaps(
        &self,
        instrument_id: InstrumentId,
        existing: &[Timestamp],
        horizon_start: Timestamp,
        horizon_end: Timestamp,
    ) -> Result<Vec<Gap>, CalendarError> {
        if horizon_end <= horizon_start {
            return Ok(Vec::new());
        }

        let mut boundaries: Vec<Boundary> = existing
            .iter()
            .filter(|&&ts| ts >= horizon_start && ts <= horizon_end)
            .map(|&ts| Boundary::data(ts))
            .collect();
        boundaries.push(Boundary::sentinel(horizon_start));
        boundaries.push(Boundary::sentinel(horizon_end));
        boundaries.sort_unstable();
        // A bar sitting exactly on a sentinel is still a bar
        boundaries.dedup_by(|later, kept| {
            if later.timestamp == kept.timestamp {
                kept.is_data |= later.is_data;
                true
            } else {
                false
            }
        });

        let index = OpenDateIndex::build(
            self.calendar.as_ref(),
            self.calendar.local_date(horizon_start),
            self.calendar.local_date(horizon_end),
        );

        let mut gaps = Vec::new();
        for pair in boundaries.windows(2) {
            let (lower, upper) = (pair[0], pair[1]);
            let adjusted = self.adjusted_delta(&index, lower.timestamp, upper.timestamp)?;
            if adjusted <= self.min_gap_seconds {
                continue;
            }
            if let Some(gap) =
                Gap::from_boundaries(instrument_id, lower, upper, self.resolution, adjusted)
            {
                gaps.push(gap);
            }
        }

        debug!(
            "Instrument #{}: {} gap(s) over {} boundaries in [{}, {}]",
            instrument_id,
            gaps.len(),
            boundaries.len(),
            horizon_start,
            horizon_end
        );

        Ok(gaps)
    }

    /// Wall-clock delta minus closed-market time.
    fn adjusted_delta(
        &self,
        index: &OpenDateIndex,
        lower: Timestamp,
        upper: Timestamp,
    ) -> Result<i64, CalendarError> {
        let delta = upper - lower;
        let d1 = self.calendar.local_date(lower);
        let d2 = self.calendar.local_date(upper);
        if d1 == d2 {
            return Ok(delta);
        }

        // Both ends must be indexed open dates
        index.open_days_between(d1, d2)?;

        let mut closed = 0;
        for day in d1.iter_days().skip(1).take_while(|day| *day <= d2) {
            closed += self
                .calendar
                .closed_seconds_before(day, index.contains(day))?;
        }
        Ok(delta - closed)
    }
}
