//! Alpha Vantage market data provider implementation.
//!
//! Minute bars come from the TIME_SERIES_INTRADAY endpoint with extended
//! hours enabled. The endpoint serves one calendar month per request, so a
//! range is split into one request per month it touches, each taking its
//! own rate-limit slot.
//!
//! Note: Alpha Vantage free tier is limited to 5 API calls per minute and 25 per day.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::America::New_York;
use log::{debug, warn};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::MarketDataError;
use crate::models::{DataPoint, Timestamp};
use crate::provider::{
    DateRange, Fetched, MarketDataProvider, ProviderProfile, RateLimit, TradingHours,
};
use crate::registry::CallGate;

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER_ID: &str = "ALPHA_VANTAGE";

/// Alpha Vantage market data provider.
pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
    base_url: String,
    profile: ProviderProfile,
}

// ============================================================================
// Response structures for Alpha Vantage API
// ============================================================================

/// TIME_SERIES_INTRADAY response
#[derive(Debug, Deserialize)]
struct IntradayResponse {
    #[serde(rename = "Time Series (1min)")]
    time_series: Option<HashMap<String, IntradayBar>>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IntradayBar {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume")]
    volume: String,
}

// ============================================================================
// AlphaVantageProvider implementation
// ============================================================================

impl AlphaVantageProvider {
    /// Create a new Alpha Vantage provider with the given API key and the default profile.
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

    /// Free-tier limits, history back to 2000, extended hours.
    pub fn default_profile() -> ProviderProfile {
        ProviderProfile {
            name: PROVIDER_ID.to_string(),
            rate_limits: vec![RateLimit::per_minute(5), RateLimit::per_day(25)],
            date_range: DateRange::since(
                NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(NaiveDate::MIN),
            ),
            trading_hours: TradingHours::extended(),
            result_delay: 900,
        }
    }

    /// Make a request to the Alpha Vantage API.
    async fn request(&self, params: &[(&str, &str)]) -> Result<String, MarketDataError> {
        let mut all_params: Vec<(&str, &str)> = params.to_vec();
        all_params.push(("apikey", &self.api_key));

        let url = reqwest::Url::parse_with_params(&self.base_url, &all_params).map_err(|e| {
            MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to build URL: {}", e),
            }
        })?;

        debug!(
            "Alpha Vantage request: {}",
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

        response
            .text()
            .await
            .map_err(|e| MarketDataError::from_request(PROVIDER_ID, e))
    }

    /// Check for API-level errors in the response.
    fn check_api_error(response: &IntradayResponse) -> Result<(), MarketDataError> {
        if let Some(ref msg) = response.error_message {
            return Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: msg.clone(),
            });
        }

        // "Note" and "Information" carry throttling notices
        for msg in [&response.note, &response.information].into_iter().flatten() {
            if msg.contains("API call frequency") || msg.contains("rate limit") {
                return Err(MarketDataError::RateLimited {
                    provider: PROVIDER_ID.to_string(),
                });
            }
            warn!("Alpha Vantage notice: {}", msg);
        }

        Ok(())
    }

    /// Parse an exchange-local "YYYY-MM-DD HH:MM:SS" into epoch seconds.
    fn parse_timestamp(value: &str) -> Option<Timestamp> {
        let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").ok()?;
        New_York
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.timestamp())
    }

    /// Parse a decimal value from a string.
    fn parse_decimal(s: &str) -> Option<Decimal> {
        Decimal::from_str(s).ok()
    }

    /// Months (`YYYY-MM`) touched by `[start, end]`, in exchange-local time.
    fn months_in_range(start: Timestamp, end: Timestamp) -> Vec<String> {
        let (Some(first), Some(last)) = (
            Utc.timestamp_opt(start, 0).single(),
            Utc.timestamp_opt(end, 0).single(),
        ) else {
            return Vec::new();
        };
        let first = first.with_timezone(&New_York).date_naive();
        let last = last.with_timezone(&New_York).date_naive();

        let mut months = Vec::new();
        let (mut year, mut month) = (first.year(), first.month());
        while (year, month) <= (last.year(), last.month()) {
            months.push(format!("{:04}-{:02}", year, month));
            if month == 12 {
                year += 1;
                month = 1;
            } else {
                month += 1;
            }
        }
        months
    }

    fn parse_intraday(text: &str) -> Result<Vec<DataPoint>, MarketDataError> {
        let response: IntradayResponse =
            serde_json::from_str(text).map_err(|e| MarketDataError::InvalidResponse {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to parse response: {}", e),
            })?;

        Self::check_api_error(&response)?;

        let Some(time_series) = response.time_series else {
            return Ok(Vec::new());
        };

        let mut bars: Vec<DataPoint> = time_series
            .into_iter()
            .filter_map(|(time_str, bar)| {
                Some(DataPoint::ohlcv(
                    Self::parse_timestamp(&time_str)?,
                    Self::parse_decimal(&bar.open)?,
                    Self::parse_decimal(&bar.high)?,
                    Self::parse_decimal(&bar.low)?,
                    Self::parse_decimal(&bar.close)?,
                    Self::parse_decimal(&bar.volume)?,
                ))
            })
            .collect();

        bars.sort_by_key(|bar| bar.timestamp);
        Ok(bars)
    }
}

#[async_trait]
impl MarketDataProvider for AlphaVantageProvider {
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
        let mut complete = true;
        for month in Self::months_in_range(start, end) {
            if !gate.acquire().await {
                complete = false;
                break;
            }

            let params = [
                ("function", "TIME_SERIES_INTRADAY"),
                ("symbol", symbol),
                ("interval", "1min"),
                ("extended_hours", "true"),
                ("outputsize", "full"),
                ("month", month.as_str()),
            ];
            let month_bars = self
                .request(&params)
                .await
                .and_then(|text| Self::parse_intraday(&text));
            match month_bars {
                Ok(month_bars) => {
                    bars.extend(month_bars.into_iter().filter(|bar| bar.within(start, end)))
                }
                Err(e) if bars.is_empty() => return Err(e),
                Err(e) => {
                    warn!(
                        "Alpha Vantage: {} for {} failed, keeping {} bar(s): {}",
                        month,
                        symbol,
                        bars.len(),
                        e
                    );
                    complete = false;
                    break;
                }
            }
        }

        bars.sort_by_key(|bar| bar.timestamp);
        bars.dedup_by_key(|bar| bar.timestamp);

        debug!(
            "Alpha Vantage: fetched {} bars for {} in {}..{}{}",
            bars.len(),
            symbol,
            start,
            end,
            if complete { "" } else { " (incomplete)" }
        );

        Ok(if complete {
            Fetched::complete(bars)
        } else {
            Fetched::partial(bars)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProviderId;
    use crate::registry::RateLimiter;
    use mockito::Matcher;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_parse_timestamp_uses_exchange_time() {
        // 2024-01-02 04:00 EST == 09:00 UTC
        assert_eq!(
            AlphaVantageProvider::parse_timestamp("2024-01-02 04:00:00"),
            Some(1_704_186_000)
        );
        // 2024-07-01 04:00 EDT == 08:00 UTC
        assert_eq!(
            AlphaVantageProvider::parse_timestamp("2024-07-01 04:00:00"),
            Some(1_719_820_800)
        );
        assert!(AlphaVantageProvider::parse_timestamp("2024-01-02").is_none());
    }

    #[test]
    fn test_parse_decimal_invalid() {
        assert!(AlphaVantageProvider::parse_decimal("invalid").is_none());
    }

    #[test]
    fn test_months_in_range_spans_year_boundary() {
        // 2023-12-29 15:00 UTC .. 2024-02-01 15:00 UTC
        let months = AlphaVantageProvider::months_in_range(1_703_862_000, 1_706_799_600);
        assert_eq!(months, vec!["2023-12", "2024-01", "2024-02"]);
    }

    #[test]
    fn test_parse_intraday_sorts_bars() {
        let body = r#"{
            "Meta Data": {},
            "Time Series (1min)": {
                "2024-01-02 04:01:00": {"1. open": "10.5", "2. high": "11", "3. low": "10", "4. close": "10.75", "5. volume": "300"},
                "2024-01-02 04:00:00": {"1. open": "10", "2. high": "10.5", "3. low": "9.5", "4. close": "10.5", "5. volume": "100"}
            }
        }"#;
        let bars = AlphaVantageProvider::parse_intraday(body).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].timestamp, 1_704_186_000);
        assert_eq!(bars[1].timestamp, 1_704_186_060);
        assert_eq!(bars[1].close, dec!(10.75));
    }

    #[test]
    fn test_parse_intraday_throttle_note() {
        let body = r#"{"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute"}"#;
        let err = AlphaVantageProvider::parse_intraday(body).unwrap_err();
        assert!(matches!(err, MarketDataError::RateLimited { .. }));
    }

    #[test]
    fn test_parse_intraday_error_message() {
        let body = r#"{"Error Message": "Invalid API call."}"#;
        let err = AlphaVantageProvider::parse_intraday(body).unwrap_err();
        assert!(matches!(err, MarketDataError::ProviderError { .. }));
    }

    #[test]
    fn test_provider_id_and_profile() {
        let provider = AlphaVantageProvider::new("test_key".to_string());
        assert_eq!(provider.id(), "ALPHA_VANTAGE");
        assert_eq!(provider.profile().rate_limits.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_each_month_takes_a_slot_and_failure_keeps_earlier_months() {
        let mut server = mockito::Server::new_async().await;
        let december = server
            .mock("GET", "/query")
            .match_query(Matcher::UrlEncoded("month".into(), "2023-12".into()))
            .with_body(
                r#"{"Time Series (1min)": {
                    "2023-12-29 10:00:00": {"1. open": "10", "2. high": "10", "3. low": "10", "4. close": "10", "5. volume": "100"}
                }}"#,
            )
            .expect(1)
            .create_async()
            .await;
        let january = server
            .mock("GET", "/query")
            .match_query(Matcher::UrlEncoded("month".into(), "2024-01".into()))
            .with_body(r#"{"Note": "Our standard API call frequency is 5 calls per minute"}"#)
            .expect(1)
            .create_async()
            .await;

        let provider = AlphaVantageProvider::new("key".to_string())
            .with_base_url(format!("{}/query", server.url()));
        let limiter = Arc::new(RateLimiter::new());
        let id = ProviderId::from(PROVIDER_ID);
        limiter.configure(&id, &provider.profile().rate_limits);
        let gate = CallGate::new(
            limiter.clone(),
            id.clone(),
            CancellationToken::new(),
            Duration::from_secs(10),
        );

        // 2023-12-29 15:00 UTC .. 2024-01-02 15:00 UTC
        let fetched = provider
            .fetch("IBM", 1_703_862_000, 1_704_207_600, &gate)
            .await
            .unwrap();

        assert!(!fetched.complete);
        assert_eq!(fetched.points.len(), 1);
        assert_eq!(fetched.points[0].timestamp, 1_703_862_000);
        assert_eq!(limiter.calls(&id).len(), 2);
        december.assert_async().await;
        january.assert_async().await;
    }
}
