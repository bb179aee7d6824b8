//! Market data models
//!
//! - `types` - Type aliases for common identifiers (ProviderId, InstrumentId, Timestamp)
//! - `instrument` - Tracked instrument identity
//! - `data_point` - One-minute OHLCV bar

mod data_point;
mod instrument;
mod types;

pub use data_point::DataPoint;
pub use instrument::Instrument;
pub use types::{InstrumentId, ProviderId, Timestamp};
