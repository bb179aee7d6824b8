//! Market data provider abstractions and implementations.
//!
//! This module contains:
//! - The `MarketDataProvider` trait that all providers implement
//! - Provider profiles: rate limits, history depth, hours and publication delay
//! - Concrete provider implementations (Polygon, Alpha Vantage)
//!
//! Providers only know how to fetch a range of minute bars for a symbol.
//! Which provider is asked, and when, is decided by the scheduler in the
//! core crate; throttling lives in the registry module.

mod profile;
mod traits;

pub mod alpha_vantage;
pub mod polygon;

pub use profile::{DateRange, ProviderProfile, RateLimit, RateWindow, TradingHours};
pub use traits::{Fetched, MarketDataProvider};
