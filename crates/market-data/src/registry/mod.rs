//! Provider registry module.
//!
//! - Provider registration in a fixed order
//! - Sliding-window rate limiting per provider, with a persistent call log
//! - Per-request call gates handed to providers during a fetch

mod call_gate;
mod provider_registry;
mod rate_limiter;

pub use call_gate::CallGate;
pub use provider_registry::ProviderRegistry;
pub use rate_limiter::{now_millis, CallLogStore, CallTime, RateLimiter};
