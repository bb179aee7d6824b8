//! Market data provider trait definitions.
//!
//! This module defines the core `MarketDataProvider` trait that all
//! market data providers must implement.

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{DataPoint, Timestamp};
use crate::registry::CallGate;

use super::profile::ProviderProfile;

/// Bars returned by one fetch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Fetched {
    pub points: Vec<DataPoint>,
    /// `false` when the provider stopped before covering the whole range:
    /// the call gate refused a request, or a later request failed.
    pub complete: bool,
}

impl Fetched {
    pub fn complete(points: Vec<DataPoint>) -> Self {
        Self {
            points,
            complete: true,
        }
    }

    pub fn partial(points: Vec<DataPoint>) -> Self {
        Self {
            points,
            complete: false,
        }
    }
}

/// Trait for market data providers.
///
/// Implement this trait to add support for a new market data source.
/// The scheduler reads the provider's profile to rate limit it and to
/// score how much of a gap it can fill.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use tickfill_market_data::provider::{MarketDataProvider, ProviderProfile};
///
/// struct MyProvider {
///     profile: ProviderProfile,
/// }
///
/// #[async_trait]
/// impl MarketDataProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     fn profile(&self) -> &ProviderProfile {
///         &self.profile
///     }
///
///     // ... implement fetch
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Should be a constant string like "POLYGON", "ALPHA_VANTAGE", etc.
    /// Used for logging, rate limiting, and attempt records.
    fn id(&self) -> &'static str;

    /// Static metadata: rate limits, history range, trading hours, delay.
    fn profile(&self) -> &ProviderProfile;

    /// Fetch one-minute bars for `symbol` in `[start, end]` (epoch seconds, inclusive).
    ///
    /// Every endpoint request must be preceded by a successful
    /// [`CallGate::acquire`]. When the gate refuses, or a request fails after
    /// earlier ones returned bars, return what was gathered as
    /// [`Fetched::partial`]. `Err` means nothing usable came back.
    ///
    /// Bars are ordered by timestamp ascending. An empty complete result
    /// means the provider has nothing for this range. Implementations may
    /// return bars outside the range; callers filter.
    async fn fetch(
        &self,
        symbol: &str,
        start: Timestamp,
        end: Timestamp,
        gate: &CallGate,
    ) -> Result<Fetched, MarketDataError>;
}
