//! Tickfill Core - gap detection and acquisition scheduling.
//!
//! This crate decides what minute data is missing and which provider should
//! be asked for it. It is database-agnostic and defines the storage traits
//! that the `storage-sqlite` crate implements.
//!
//! - [`calendar`] - exchange calendar and open-date index
//! - [`gaps`] - gap detection with closed-market time removed
//! - [`attempts`] - memo of ranges a provider is known to have nothing for
//! - [`selection`] - coverage scoring and provider choice
//! - [`scheduler`] - per-provider workers and the dispatcher

pub mod attempts;
pub mod calendar;
pub mod constants;
pub mod errors;
pub mod gaps;
pub mod scheduler;
pub mod selection;
pub mod store;

pub use attempts::{AttemptLedger, AttemptRecord, AttemptStore};
pub use calendar::{MarketCalendar, OpenDateIndex, UsEquityCalendar};
pub use gaps::{Gap, GapDetector};
pub use scheduler::{Dispatcher, PassSummary, SchedulerConfig};
pub use selection::ProviderSelector;
pub use store::{InMemoryStore, InstrumentStore, TradingDataStore};

// Re-export error types
pub use errors::Error;
pub use errors::Result;
