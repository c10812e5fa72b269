//! Upstream exchange-rate client.
//!
//! [`RateProvider`] is the seam the tool operations depend on;
//! [`FrankfurterClient`] is the production implementation backed by the
//! public Frankfurter API.

use crate::catalog::CurrencyCode;
use crate::error::{FxError, FxResult};
use crate::types::{RatePeriod, RateQuery, RateSet, TimeSeries};
use chrono::NaiveDate;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Default provider endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.frankfurter.dev/v1";

/// Source of exchange rates. One call is one upstream round trip.
#[async_trait::async_trait]
pub trait RateProvider: Send + Sync {
    /// Current-day rates for `base`, optionally filtered to `targets`.
    async fn fetch_latest(
        &self,
        base: CurrencyCode,
        targets: Option<&[CurrencyCode]>,
    ) -> FxResult<RateSet>;

    /// Rates for a single past date.
    async fn fetch_historical(
        &self,
        date: NaiveDate,
        base: CurrencyCode,
        targets: Option<&[CurrencyCode]>,
    ) -> FxResult<RateSet>;

    /// Rates for every business day in `start..=end`, ascending by date.
    async fn fetch_time_series(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        base: CurrencyCode,
        targets: Option<&[CurrencyCode]>,
    ) -> FxResult<TimeSeries>;
}

/// Configuration for the upstream client.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Provider base URL, without trailing path segments for the query.
    pub base_url: Url,
    /// Request timeout.
    pub timeout: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl UpstreamConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            ..Default::default()
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_API_BASE).expect("default API base is a valid URL"),
            timeout: Duration::from_secs(30),
            user_agent: format!("fx-mcp/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SingleDayResponse {
    #[serde(default = "one")]
    amount: f64,
    base: String,
    date: NaiveDate,
    rates: BTreeMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct SeriesResponse {
    #[serde(default = "one")]
    amount: f64,
    base: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    rates: BTreeMap<NaiveDate, BTreeMap<String, f64>>,
}

fn one() -> f64 {
    1.0
}

/// Frankfurter API client
#[derive(Debug, Clone)]
pub struct FrankfurterClient {
    client: Client,
    config: Arc<UpstreamConfig>,
}

impl FrankfurterClient {
    pub fn new(config: UpstreamConfig) -> FxResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FxError::UpstreamUnavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    /// Build the request URL for a query.
    fn build_url(&self, query: &RateQuery) -> FxResult<Url> {
        let raw = format!(
            "{}/{}",
            self.config.base_url.as_str().trim_end_matches('/'),
            query.path()
        );
        let mut url = Url::parse(&raw)
            .map_err(|e| FxError::UpstreamUnavailable(format!("invalid upstream URL {}: {}", raw, e)))?;
        url.query_pairs_mut()
            .extend_pairs(query.query_pairs().iter().map(|(k, v)| (*k, v.as_str())));
        Ok(url)
    }

    /// Single GET, decoded into `T`. Non-2xx is unavailable, bad JSON is malformed.
    async fn get<T: DeserializeOwned>(&self, query: &RateQuery) -> FxResult<T> {
        let url = self.build_url(query)?;
        debug!(url = %url, "GET upstream rates");

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Upstream request failed");
            FxError::UpstreamUnavailable(format!("request to {} failed: {}", url, e))
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            FxError::UpstreamUnavailable(format!("failed to read response from {}: {}", url, e))
        })?;

        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "Upstream returned error status");
            return Err(FxError::UpstreamUnavailable(format!(
                "{} returned status {}: {}",
                url,
                status.as_u16(),
                body.trim()
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| FxError::UpstreamMalformed(format!("unexpected response from {}: {}", url, e)))
    }

    async fn single_day(&self, query: RateQuery) -> FxResult<RateSet> {
        let response: SingleDayResponse = self.get(&query).await?;
        Ok(RateSet {
            amount: response.amount,
            base: parse_base(&response.base)?,
            date: response.date,
            rates: response.rates,
        })
    }
}

fn parse_base(code: &str) -> FxResult<CurrencyCode> {
    CurrencyCode::parse(code)
        .map_err(|_| FxError::UpstreamMalformed(format!("response has unsupported base '{}'", code)))
}

#[async_trait::async_trait]
impl RateProvider for FrankfurterClient {
    async fn fetch_latest(
        &self,
        base: CurrencyCode,
        targets: Option<&[CurrencyCode]>,
    ) -> FxResult<RateSet> {
        self.single_day(RateQuery::new(base, targets, RatePeriod::Latest))
            .await
    }

    async fn fetch_historical(
        &self,
        date: NaiveDate,
        base: CurrencyCode,
        targets: Option<&[CurrencyCode]>,
    ) -> FxResult<RateSet> {
        self.single_day(RateQuery::new(base, targets, RatePeriod::On(date)))
            .await
    }

    async fn fetch_time_series(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        base: CurrencyCode,
        targets: Option<&[CurrencyCode]>,
    ) -> FxResult<TimeSeries> {
        let query = RateQuery::new(base, targets, RatePeriod::Range { start, end });
        let response: SeriesResponse = self.get(&query).await?;
        let base = parse_base(&response.base)?;

        // BTreeMap iteration yields dates in ascending order
        let entries = response
            .rates
            .into_iter()
            .map(|(date, rates)| RateSet {
                amount: response.amount,
                base,
                date,
                rates,
            })
            .collect();

        Ok(TimeSeries {
            amount: response.amount,
            base,
            start_date: response.start_date,
            end_date: response.end_date,
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> FrankfurterClient {
        let config = UpstreamConfig::new(Url::parse(&format!("{}/v1", server.uri())).unwrap());
        FrankfurterClient::new(config).unwrap()
    }

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::parse(s).unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn test_fetch_latest_with_symbols() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/latest"))
            .and(query_param("base", "USD"))
            .and(query_param("symbols", "EUR"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "amount": 1.0,
                "base": "USD",
                "date": "2024-03-01",
                "rates": {"EUR": 0.85}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let rates = client
            .fetch_latest(code("USD"), Some(&[code("EUR")]))
            .await
            .unwrap();

        assert_eq!(rates.base, code("USD"));
        assert_eq!(rates.date, date("2024-03-01"));
        assert_eq!(rates.rate(code("EUR")), Some(0.85));
    }

    #[tokio::test]
    async fn test_fetch_latest_without_filter_omits_symbols() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/latest"))
            .and(query_param("base", "GBP"))
            .and(query_param_is_missing("symbols"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "amount": 1.0,
                "base": "GBP",
                "date": "2024-03-01",
                "rates": {"EUR": 1.17, "USD": 1.27}
            })))
            .mount(&server)
            .await;

        let rates = client_for(&server).fetch_latest(code("GBP"), None).await.unwrap();
        assert_eq!(rates.rates.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_historical_path() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/2020-01-01"))
            .and(query_param("base", "EUR"))
            .and(query_param("symbols", "USD,JPY"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "amount": 1.0,
                "base": "EUR",
                "date": "2019-12-31",
                "rates": {"USD": 1.1234, "JPY": 121.94}
            })))
            .mount(&server)
            .await;

        let rates = client_for(&server)
            .fetch_historical(date("2020-01-01"), code("EUR"), Some(&[code("USD"), code("JPY")]))
            .await
            .unwrap();

        // Provider reports the business day it actually used
        assert_eq!(rates.date, date("2019-12-31"));
        assert_eq!(rates.rate(code("JPY")), Some(121.94));
    }

    #[tokio::test]
    async fn test_fetch_time_series_is_ascending() {
        let server = MockServer::start().await;

        // Keys deliberately out of order in the raw body
        let body = r#"{
            "amount": 1.0,
            "base": "EUR",
            "start_date": "2024-01-02",
            "end_date": "2024-01-05",
            "rates": {
                "2024-01-05": {"USD": 1.0921},
                "2024-01-02": {"USD": 1.0956},
                "2024-01-04": {"USD": 1.0953},
                "2024-01-03": {"USD": 1.0919}
            }
        }"#;

        Mock::given(method("GET"))
            .and(path("/v1/2024-01-01..2024-01-05"))
            .and(query_param("base", "EUR"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
            .mount(&server)
            .await;

        let series = client_for(&server)
            .fetch_time_series(date("2024-01-01"), date("2024-01-05"), code("EUR"), None)
            .await
            .unwrap();

        let dates: Vec<_> = series.dates().collect();
        assert_eq!(
            dates,
            vec![
                date("2024-01-02"),
                date("2024-01-03"),
                date("2024-01-04"),
                date("2024-01-05")
            ]
        );
        assert_eq!(series.entries[0].rate(code("USD")), Some(1.0956));
    }

    #[tokio::test]
    async fn test_error_status_is_unavailable() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/latest"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_latest(code("USD"), None).await.unwrap_err();
        match err {
            FxError::UpstreamUnavailable(message) => {
                assert!(message.contains("503"));
                assert!(message.contains("maintenance"));
            }
            other => panic!("Expected UpstreamUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_garbage_body_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "unexpected": true
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_latest(code("USD"), None).await.unwrap_err();
        assert_eq!(err.kind(), "UpstreamMalformed");
    }

    #[tokio::test]
    async fn test_unknown_base_in_response_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "amount": 1.0,
                "base": "XYZ",
                "date": "2024-03-01",
                "rates": {}
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_latest(code("USD"), None).await.unwrap_err();
        assert_eq!(err.kind(), "UpstreamMalformed");
    }

    #[tokio::test]
    async fn test_connection_refused_is_unavailable() {
        let server = MockServer::start().await;
        let client = client_for(&server);
        drop(server);

        let err = client.fetch_latest(code("USD"), None).await.unwrap_err();
        assert_eq!(err.kind(), "UpstreamUnavailable");
    }
}
