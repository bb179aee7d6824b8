//! Core error types for the tickfill scheduler.
//!
//! This module defines database-agnostic error types. Storage-specific errors
//! (from Diesel, SQLite, etc.) are converted to these types by the storage layer.

use chrono::NaiveDate;
use thiserror::Error;

use tickfill_market_data::MarketDataError;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the scheduler.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Market calendar error: {0}")]
    Calendar(#[from] CalendarError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Market data operation failed: {0}")]
    MarketData(#[from] MarketDataError),

    #[error("Invalid configuration value: {0}")]
    InvalidConfigValue(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Database-agnostic error type for storage operations.
///
/// This enum uses `String` for all error details, allowing the storage layer
/// to convert storage-specific errors (Diesel, SQLite, etc.) into this format.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to establish a database connection.
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to create or configure the connection pool.
    #[error("Failed to create database pool: {0}")]
    PoolCreationFailed(String),

    /// A database query failed to execute.
    #[error("Database query failed: {0}")]
    QueryFailed(String),

    /// The requested record was not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A unique constraint was violated (e.g., duplicate key).
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// A database transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Database migration failed.
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Internal/unexpected database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

/// The stored series and the market calendar disagree.
///
/// Fatal for the affected instrument's gap computation only.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CalendarError {
    /// A date that should be a trading day is absent from the open-date index.
    #[error("{date} is not an open market date (index covers {first}..={last})")]
    MissingOpenDate {
        date: NaiveDate,
        first: String,
        last: String,
    },

    /// No open date could be found near the given date.
    #[error("No open market date found near {0}")]
    NoOpenDate(NaiveDate),

    /// A local wall-clock time does not exist in the exchange time zone.
    #[error("Invalid exchange-local time: {date} {hour:02}:00")]
    InvalidLocalTime { date: NaiveDate, hour: u32 },
}

/// Errors raised by the dispatcher itself (not by providers).
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Job queue for provider '{0}' is closed")]
    QueueClosed(String),

    #[error("Worker for provider '{provider}' failed: {message}")]
    WorkerFailed { provider: String, message: String },

    #[error("No providers registered")]
    NoProviders,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calendar_error_display() {
        let error = CalendarError::MissingOpenDate {
            date: NaiveDate::from_ymd_opt(2024, 1, 6).unwrap(),
            first: "2024-01-02".to_string(),
            last: "2024-01-05".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "2024-01-06 is not an open market date (index covers 2024-01-02..=2024-01-05)"
        );
    }

    #[test]
    fn test_errors_convert_into_root() {
        let error: Error = CalendarError::NoOpenDate(NaiveDate::MIN).into();
        assert!(matches!(error, Error::Calendar(_)));

        let error: Error = DatabaseError::QueryFailed("locked".to_string()).into();
        assert_eq!(
            error.to_string(),
            "Database operation failed: Database query failed: locked"
        );
    }
}
