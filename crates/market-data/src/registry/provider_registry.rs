//! Provider registry: the explicit, ordered set of providers in use.
//!
//! Built once at startup from configuration. Registration order is
//! significant: it is the last tie-break when two providers score the same
//! for a gap. Building the registry also configures every provider's
//! budgets on the shared rate limiter.

use std::borrow::Cow;
use std::sync::Arc;

use log::{info, warn};

use super::RateLimiter;
use crate::errors::MarketDataError;
use crate::models::ProviderId;
use crate::provider::MarketDataProvider;

/// Ordered collection of market data providers.
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn MarketDataProvider>>,
    rate_limiter: Arc<RateLimiter>,
}

impl ProviderRegistry {
    /// Create a registry with an in-memory rate limiter.
    pub fn new(providers: Vec<Arc<dyn MarketDataProvider>>) -> Self {
        Self::with_rate_limiter(providers, Arc::new(RateLimiter::new()))
    }

    /// Create a registry around an existing (possibly persistent) rate limiter.
    ///
    /// A provider whose id is already registered is skipped.
    pub fn with_rate_limiter(
        providers: Vec<Arc<dyn MarketDataProvider>>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        let mut registered: Vec<Arc<dyn MarketDataProvider>> = Vec::with_capacity(providers.len());

        for provider in providers {
            if registered.iter().any(|p| p.id() == provider.id()) {
                warn!("Provider '{}' registered twice, ignoring", provider.id());
                continue;
            }

            let provider_id: ProviderId = Cow::Borrowed(provider.id());
            rate_limiter.configure(&provider_id, &provider.profile().rate_limits);
            registered.push(provider);
        }

        info!(
            "Provider registry: [{}]",
            registered
                .iter()
                .map(|p| p.id())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Self {
            providers: registered,
            rate_limiter,
        }
    }

    /// Providers in registration order.
    pub fn providers(&self) -> &[Arc<dyn MarketDataProvider>] {
        &self.providers
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn MarketDataProvider>, MarketDataError> {
        self.providers
            .iter()
            .find(|p| p.id() == id)
            .cloned()
            .ok_or_else(|| MarketDataError::UnknownProvider(id.to_string()))
    }

    /// Position of a provider in registration order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.providers.iter().position(|p| p.id() == id)
    }

    pub fn ids(&self) -> Vec<ProviderId> {
        self.providers
            .iter()
            .map(|p| Cow::Borrowed(p.id()))
            .collect()
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
