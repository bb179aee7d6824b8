//! SQLite storage implementation for tickfill.
//!
//! This crate is the only place where Diesel dependencies exist. It implements
//! the store traits defined in `tickfill-core` (and the rate limiter's call
//! log from `tickfill-market-data`) and contains:
//! - Database connection pooling and management
//! - Embedded Diesel migrations
//! - A single writer actor that serializes every write
//! - Repository implementations and their row types
//!
//! ```text
//! market-data (providers)     core (scheduling)
//!         │                        │
//!         └───────────┬────────────┘
//!                     │
//!                     ▼
//!          storage-sqlite (this crate)
//!                     │
//!                     ▼
//!                 SQLite DB
//! ```

pub mod db;
pub mod errors;
pub mod schema;
mod utils;

// Repository implementations
pub mod attempts;
pub mod instruments;
pub mod provider_calls;
pub mod trading_data;

pub use db::{
    create_pool, get_connection, get_db_path, init, open, run_migrations, spawn_writer,
    DbConnection, DbPool, WriteHandle,
};
pub use errors::{IntoCore, StorageError};

pub use attempts::AttemptRepository;
pub use instruments::InstrumentRepository;
pub use provider_calls::ProviderCallRepository;
pub use trading_data::TradingDataRepository;

pub use tickfill_core::errors::{DatabaseError, Error, Result};
