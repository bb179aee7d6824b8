use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{Config, LogFormat};
use tickfill_core::store::InstrumentStore;
use tickfill_core::{Dispatcher, UsEquityCalendar};
use tickfill_market_data::{
    AlphaVantageProvider, MarketDataProvider, PolygonProvider, ProviderRegistry, RateLimiter,
};
use tickfill_storage_sqlite::{
    db, AttemptRepository, InstrumentRepository, ProviderCallRepository, TradingDataRepository,
};

pub struct AppState {
    pub dispatcher: Dispatcher,
    pub instruments: Arc<dyn InstrumentStore>,
    pub db_path: String,
}

/// Install the global subscriber. `log` records from the libraries are
/// bridged in by `tracing-subscriber`'s `tracing-log` integration.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init(),
    }
}

/// Providers enabled by the configured API keys, in registration order.
pub fn build_providers(config: &Config) -> Vec<Arc<dyn MarketDataProvider>> {
    let mut providers: Vec<Arc<dyn MarketDataProvider>> = Vec::new();
    if let Some(key) = &config.polygon_api_key {
        providers.push(Arc::new(PolygonProvider::new(key.clone())));
    }
    if let Some(key) = &config.alpha_vantage_api_key {
        providers.push(Arc::new(AlphaVantageProvider::new(key.clone())));
    }
    providers
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let pool = db::open(&config.db_path)
        .with_context(|| format!("failed to open database at {}", config.db_path))?;
    tracing::info!("Database path in use: {}", config.db_path);

    let writer = db::spawn_writer((*pool).clone());
    let instruments = Arc::new(InstrumentRepository::new(pool.clone(), writer.clone()));
    let trading_data = Arc::new(TradingDataRepository::new(pool.clone(), writer.clone()));
    let attempts = Arc::new(AttemptRepository::new(pool.clone(), writer));

    let providers = build_providers(config);
    if providers.is_empty() {
        anyhow::bail!(
            "no market data provider configured; set TICKFILL_POLYGON_API_KEY or TICKFILL_ALPHA_VANTAGE_API_KEY"
        );
    }
    let rate_limiter = Arc::new(RateLimiter::with_store(Arc::new(
        ProviderCallRepository::new(pool),
    )));
    let registry = Arc::new(ProviderRegistry::with_rate_limiter(providers, rate_limiter));
    tracing::info!("Providers enabled: {}", registry.ids().join(", "));

    let dispatcher = Dispatcher::new(
        config.scheduler_config(),
        registry,
        Arc::new(UsEquityCalendar::new()),
        trading_data,
        attempts,
    );

    Ok(Arc::new(AppState {
        dispatcher,
        instruments,
        db_path: config.db_path.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: Vec<(String, String)> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| {
            vars.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        })
    }

    #[test]
    fn test_providers_follow_configured_keys() {
        assert!(build_providers(&config(&[])).is_empty());

        let providers = build_providers(&config(&[
            ("TICKFILL_POLYGON_API_KEY", "p"),
            ("TICKFILL_ALPHA_VANTAGE_API_KEY", "a"),
        ]));
        let ids: Vec<&str> = providers.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["POLYGON", "ALPHA_VANTAGE"]);
    }

    #[tokio::test]
    async fn test_build_state_requires_a_provider() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickfill.db");
        let config = config(&[("TICKFILL_DB_PATH", path.to_str().unwrap())]);
        assert!(build_state(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_build_state_creates_the_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("tickfill.db");
        let config = config(&[
            ("TICKFILL_DB_PATH", path.to_str().unwrap()),
            ("TICKFILL_POLYGON_API_KEY", "p"),
        ]);

        let state = build_state(&config).await.unwrap();
        assert!(path.exists());
        assert_eq!(state.dispatcher.registry().len(), 1);
        assert!(state.instruments.list_instruments().unwrap().is_empty());
    }
}
