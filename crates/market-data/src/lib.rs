//! Tickfill Market Data Crate
//!
//! Provider-facing half of the acquisition scheduler: the minute-bar data
//! model, the `MarketDataProvider` trait with its static profile, concrete
//! HTTP clients, and the per-provider rate limiter.
//!
//! # Core Types
//!
//! - [`DataPoint`] - One-minute OHLCV bar
//! - [`Instrument`] - Tracked instrument identity
//! - [`ProviderProfile`] - Rate limits, history depth, trading hours, publication delay
//! - [`RateLimiter`] - Sliding-window call budget per provider
//! - [`CallGate`] - Rate-limit admission for each request a fetch issues
//! - [`ProviderRegistry`] - Ordered set of providers configured at startup

pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;

pub use errors::MarketDataError;
pub use models::{DataPoint, Instrument, InstrumentId, ProviderId, Timestamp};

pub use provider::alpha_vantage::AlphaVantageProvider;
pub use provider::polygon::PolygonProvider;
pub use provider::{
    DateRange, Fetched, MarketDataProvider, ProviderProfile, RateLimit, RateWindow, TradingHours,
};

pub use registry::{
    now_millis, CallGate, CallLogStore, CallTime, ProviderRegistry, RateLimiter,
};
