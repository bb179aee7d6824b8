//! SQLite storage implementation for minute series.

mod model;
mod repository;

pub use model::TradingDataDB;
pub use repository::TradingDataRepository;
