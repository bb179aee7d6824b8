//! SQLite storage for the rate limiter's call log.

mod repository;

pub use repository::{ProviderCallDB, ProviderCallRepository};
