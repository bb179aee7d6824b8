//! Provider selection by coverage of a gap.
//!
//! A provider's coverage of a gap is the number of hours, over open dates
//! inside its history window, where the gap overlaps the provider's trading
//! hours. Whatever part of the gap is newer than the provider's publication
//! delay does not count.

use std::cmp::Ordering;
use std::sync::Arc;

use log::{debug, warn};

use tickfill_market_data::{MarketDataProvider, ProviderProfile, Timestamp};

use crate::calendar::MarketCalendar;
use crate::constants::SECONDS_PER_HOUR;
use crate::gaps::Gap;

/// A provider eligible for a gap, with its current backlog.
#[derive(Clone)]
pub struct Candidate {
    pub provider: Arc<dyn MarketDataProvider>,
    /// Jobs queued or in flight on the provider's worker
    pub queue_depth: usize,
    /// Registration order, lowest first
    pub order: usize,
}

impl std::fmt::Debug for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Candidate")
            .field("provider", &self.provider.id())
            .field("queue_depth", &self.queue_depth)
            .field("order", &self.order)
            .finish()
    }
}

pub struct ProviderSelector {
    calendar: Arc<dyn MarketCalendar>,
}

impl ProviderSelector {
    pub fn new(calendar: Arc<dyn MarketCalendar>) -> Self {
        Self { calendar }
    }

    /// Trading hours of `gap` the provider can serve as of `now`.
    pub fn coverage_hours(&self, profile: &ProviderProfile, gap: &Gap, now: Timestamp) -> f64 {
        let start = gap.start;
        let end = gap.end.min(now - profile.result_delay);
        if end <= start {
            return 0.0;
        }

        let first = self.calendar.local_date(start);
        let last = self.calendar.local_date(end);
        let hours = profile.trading_hours;

        let covered: i64 = first
            .iter_days()
            .take_while(|date| *date <= last)
            .filter(|date| profile.date_range.contains(*date) && self.calendar.is_open_date(*date))
            .map(|date| {
                let open = self.calendar.local_timestamp(date, hours.min_hour);
                let close = self.calendar.local_timestamp(date, hours.max_hour);
                match (open, close) {
                    (Ok(open), Ok(close)) => (close.min(end) - open.max(start)).max(0),
                    (Err(e), _) | (_, Err(e)) => {
                        warn!("Skipping {} in coverage for {}: {}", date, profile.name, e);
                        0
                    }
                }
            })
            .sum();

        covered as f64 / SECONDS_PER_HOUR as f64
    }

    /// Best candidate for `gap`: highest coverage, then the shortest queue,
    /// then registration order. Candidates with no coverage are never chosen.
    pub fn choose(&self, gap: &Gap, candidates: &[Candidate], now: Timestamp) -> Option<Candidate> {
        let mut scored: Vec<(f64, &Candidate)> = candidates
            .iter()
            .map(|c| (self.coverage_hours(c.provider.profile(), gap, now), c))
            .filter(|(score, _)| *score > 0.0)
            .collect();

        scored.sort_by(|(score_a, a), (score_b, b)| {
            score_b.total_cmp(score_a).then_with(|| backlog_order(a, b))
        });

        let chosen = scored.first().map(|(score, c)| {
            debug!(
                "Gap {}: chose {} ({:.2}h, depth {})",
                gap,
                c.provider.id(),
                score,
                c.queue_depth
            );
            (*c).clone()
        });

        if chosen.is_none() && !candidates.is_empty() {
            debug!("Gap {}: no candidate covers any of it", gap);
        }
        chosen
    }
}

/// Orders candidates the way [`ProviderSelector::choose`] breaks ties.
pub fn backlog_order(a: &Candidate, b: &Candidate) -> Ordering {
    a.queue_depth
        .cmp(&b.queue_depth)
        .then_with(|| a.order.cmp(&b.order))
}
