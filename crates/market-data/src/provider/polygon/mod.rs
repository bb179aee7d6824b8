//! Polygon.io market data provider implementation.
//!
//! Minute bars come from the aggregates endpoint
//! (`/v2/aggs/ticker/{ticker}/range/1/minute/{from}/{to}`), which accepts
//! millisecond bounds and paginates through `next_url`. Every page is a
//! separate request and takes its own rate-limit slot.

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, warn};
use reqwest::Client;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

use crate::errors::MarketDataError;
use crate::models::{DataPoint, Timestamp};
use crate::provider::{
    DateRange, Fetched, MarketDataProvider, ProviderProfile, RateLimit, TradingHours,
};
use crate::registry::CallGate;

const BASE_URL: &str = "https://api.polygon.io";
const PROVIDER_ID: &str = "POLYGON";
const PAGE_LIMIT: &str = "50000";
/// Free tier history depth.
const HISTORY_DAYS: i64 = 730;
/// Pages per fetch; a longer range is finished by a later fetch.
const MAX_PAGES: usize = 50;

/// Polygon.io market data provider.
pub struct PolygonProvider {
    client: Client,
    api_key: String,
    base_url: String,
    profile: ProviderProfile,
}

/// Aggregates response envelope.
#[derive(Debug, Deserialize)]
struct AggregatesResponse {
    status: Option<String>,
    #[serde(default)]
    results: Vec<AggregateBar>,
    next_url: Option<String>,
    error: Option<String>,
    message: Option<String>,
}

/// One aggregate bar. Prices are JSON numbers; `t` is epoch milliseconds.
#[derive(Debug, Deserialize)]
struct AggregateBar {
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
    vw: Option<f64>,
    t: i64,
}

impl AggregateBar {
    fn into_data_point(self) -> Option<DataPoint> {
        let bar = DataPoint::ohlcv(
            self.t.div_euclid(1000),
            Decimal::from_f64(self.o)?,
            Decimal::from_f64(self.h)?,
            Decimal::from_f64(self.l)?,
            Decimal::from_f64(self.c)?,
            Decimal::from_f64(self.v)?,
        );
        Some(match self.vw.and_then(Decimal::from_f64) {
            Some(vwap) => bar.with_vwap(vwap),
            None => bar,
        })
    }
}

impl PolygonProvider {
    /// Create a new Polygon provider with the given API key and the default profile.
    pub fn new(api_key: String) -> Self {
        Self::with_profile(api_key, Self::default_profile())
    }

    /// Create a provider with a profile loaded from configuration.
    pub fn with_profile(api_key: String, profile: ProviderProfile) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key,
            base_url: BASE_URL.to_string(),
            profile,
        }
    }

    /// Point the client at another host (proxies, recorded fixtures).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Free-tier limits: 5 calls per minute, two years of history, 15 minute delay.
    pub fn default_profile() -> ProviderProfile {
        ProviderProfile {
            name: PROVIDER_ID.to_string(),
            rate_limits: vec![RateLimit::per_minute(5)],
            date_range: DateRange::trailing_days(Utc::now().date_naive(), HISTORY_DAYS),
            trading_hours: TradingHours::extended(),
            result_delay: 900,
        }
    }

    fn aggregates_url(&self, symbol: &str, start: Timestamp, end: Timestamp) -> String {
        format!(
            "{}/v2/aggs/ticker/{}/range/1/minute/{}/{}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(symbol),
            start * 1000,
            end * 1000
        )
    }

    /// Issue one page request; `url` may already carry a cursor.
    async fn request_page(
        &self,
        url: &str,
        first_page: bool,
    ) -> Result<AggregatesResponse, MarketDataError> {
        let mut params: Vec<(&str, &str)> = vec![("apiKey", self.api_key.as_str())];
        if first_page {
            params.extend([("adjusted", "true"), ("sort", "asc"), ("limit", PAGE_LIMIT)]);
        }

        let url = reqwest::Url::parse_with_params(url, &params).map_err(|e| {
            MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to build URL: {}", e),
            }
        })?;

        debug!(
            "Polygon request: {}",
            url.as_str().replace(&self.api_key, "***")
        );

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MarketDataError::from_request(PROVIDER_ID, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        if !status.is_success() {
            return Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| MarketDataError::from_request(PROVIDER_ID, e))?;
        Self::parse_page(&text)
    }

    fn parse_page(text: &str) -> Result<AggregatesResponse, MarketDataError> {
        let page: AggregatesResponse =
            serde_json::from_str(text).map_err(|e| MarketDataError::InvalidResponse {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to parse response: {}", e),
            })?;

        if page.status.as_deref() == Some("ERROR") || page.error.is_some() {
            return Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: page
                    .error
                    .clone()
                    .or_else(|| page.message.clone())
                    .unwrap_or_else(|| "unknown error".to_string()),
            });
        }

        Ok(page)
    }
}

#[async_trait]
impl MarketDataProvider for PolygonProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn profile(&self) -> &ProviderProfile {
        &self.profile
    }

    async fn fetch(
        &self,
        symbol: &str,
        start: Timestamp,
        end: Timestamp,
        gate: &CallGate,
    ) -> Result<Fetched, MarketDataError> {
        if start > end {
            return Err(MarketDataError::InvalidRange { start, end });
        }

        let mut bars = Vec::new();
        let mut next = Some(self.aggregates_url(symbol, start, end));
        let mut first_page = true;
        let mut pages = 0;
        let mut complete = true;

        while let Some(url) = next.take() {
            if pages == MAX_PAGES || !gate.acquire().await {
                complete = false;
                break;
            }

            let page = match self.request_page(&url, first_page).await {
                Ok(page) => page,
                Err(e) if bars.is_empty() => return Err(e),
                Err(e) => {
                    warn!(
                        "Polygon: page {} for {} failed, keeping {} bar(s): {}",
                        pages + 1,
                        symbol,
                        bars.len(),
                        e
                    );
                    complete = false;
                    break;
                }
            };
            bars.extend(
                page.results
                    .into_iter()
                    .filter_map(AggregateBar::into_data_point)
                    .filter(|bar| bar.within(start, end)),
            );

            pages += 1;
            first_page = false;
            next = page.next_url;
        }

        bars.sort_by_key(|bar| bar.timestamp);
        bars.dedup_by_key(|bar| bar.timestamp);

        debug!(
            "Polygon: fetched {} bars for {} in {}..{} ({} page(s){})",
            bars.len(),
            symbol,
            start,
            end,
            pages,
            if complete { "" } else { ", incomplete" }
        );

        Ok(if complete {
            Fetched::complete(bars)
        } else {
            Fetched::partial(bars)
        })
    }
}
