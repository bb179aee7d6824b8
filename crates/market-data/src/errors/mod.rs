//! Error types for the market data crate.

use thiserror::Error;

/// Errors that can occur while talking to a market data provider.
///
/// The scheduler never retries on these directly: any error from a fetch is
/// treated as "this provider returned nothing for this range" and recorded
/// as an attempt. The classification helpers exist for logging.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The provider rate limited the request (HTTP 429 or a throttle note in the payload).
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The request to the provider timed out.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// A provider-specific error occurred (non-success status, error payload).
    #[error("Provider error: {provider} - {message}")]
    ProviderError {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// The provider answered but the payload could not be decoded.
    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse {
        /// The provider that sent the payload
        provider: String,
        /// What was wrong with it
        message: String,
    },

    /// The requested range is empty or inverted.
    #[error("Invalid range: {start}..{end}")]
    InvalidRange {
        /// Requested start, epoch seconds
        start: i64,
        /// Requested end, epoch seconds
        end: i64,
    },

    /// No provider with this id is registered.
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// The persisted call log could not be read or written.
    #[error("Call log error: {0}")]
    CallLog(String),

    /// A network error occurred while communicating with a provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl MarketDataError {
    /// Returns true if the same request could succeed later without changes.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout { .. } | Self::Network(_) => true,
            Self::ProviderError { .. }
            | Self::InvalidResponse { .. }
            | Self::InvalidRange { .. }
            | Self::UnknownProvider(_)
            | Self::CallLog(_) => false,
        }
    }

    /// Map a reqwest error, distinguishing timeouts.
    pub fn from_request(provider: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                provider: provider.to_string(),
            }
        } else {
            Self::Network(error)
        }
    }
}
