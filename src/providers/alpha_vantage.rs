//! Secondary provider: Alpha Vantage.
//!
//! The free tier allows 5 requests per minute and 25 per day. Quota and key
//! problems come back as HTTP 200 with a `Note` or `Information` message.

use crate::core::config::ProviderConfig;
use crate::core::model::ProviderId;
use crate::core::provider::{
    AlphaVantageQuote, BarTime, ProviderError, ProviderResult, QuotePayload, QuoteProvider,
    RateLimitStatus, RawBar, RawQuote,
};
use crate::providers::rate_limit::RateLimiter;
use crate::providers::util::{http_client, parse_json, send_request};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

const PROVIDER: ProviderId = ProviderId::AlphaVantage;

pub struct AlphaVantageProvider {
    base_url: String,
    api_key: String,
    client: Client,
    limiter: RateLimiter,
}

#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<AlphaVantageQuote>,
    #[serde(flatten)]
    messages: ApiMessages,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    #[serde(rename = "Time Series (Daily)")]
    time_series: Option<HashMap<String, DailyBar>>,
    #[serde(flatten)]
    messages: ApiMessages,
}

#[derive(Debug, Deserialize)]
struct DailyBar {
    #[serde(rename = "4. close")]
    close: String,
}

#[derive(Debug, Deserialize)]
struct ApiMessages {
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

impl ApiMessages {
    fn check(&self, symbol: &str) -> ProviderResult<()> {
        if let Some(msg) = &self.error_message {
            debug!("Alpha Vantage error for {}: {}", symbol, msg);
            return Err(ProviderError::NotFound {
                provider: PROVIDER,
                symbol: symbol.to_string(),
            });
        }
        if let Some(msg) = self.note.as_ref().or(self.information.as_ref()) {
            warn!("Alpha Vantage quota message: {}", msg);
            return Err(ProviderError::RateLimited { provider: PROVIDER });
        }
        Ok(())
    }
}

impl AlphaVantageProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        AlphaVantageProvider {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key_or_demo(),
            client: http_client(config.timeout_secs),
            limiter: RateLimiter::new(PROVIDER, config.rate_limit_for(PROVIDER)),
        }
    }

    async fn query(&self, symbol: &str, params: &[(&str, &str)]) -> ProviderResult<String> {
        let mut all_params = params.to_vec();
        all_params.push(("symbol", symbol));
        all_params.push(("apikey", &self.api_key));

        let url = Url::parse_with_params(&format!("{}/query", self.base_url), &all_params)
            .map_err(|e| ProviderError::Validation {
                provider: PROVIDER,
                message: format!("Invalid query URL for {symbol}: {e}"),
            })?;

        self.limiter.acquire().await?;
        debug!(
            "Alpha Vantage request: {}",
            url.as_str().replace(&self.api_key, "***")
        );
        send_request(PROVIDER, symbol, self.client.get(url)).await
    }
}

#[async_trait]
impl QuoteProvider for AlphaVantageProvider {
    fn id(&self) -> ProviderId {
        PROVIDER
    }

    #[instrument(name = "AlphaVantageQuoteFetch", skip(self), fields(symbol = %symbol))]
    async fn fetch_quote(&self, symbol: &str) -> ProviderResult<RawQuote> {
        let text = self.query(symbol, &[("function", "GLOBAL_QUOTE")]).await?;
        let response: GlobalQuoteResponse = parse_json(PROVIDER, symbol, &text)?;
        response.messages.check(symbol)?;

        // Unknown symbols come back as an empty `Global Quote` object.
        let quote = response
            .global_quote
            .filter(|q| q.price.is_some())
            .ok_or_else(|| ProviderError::NotFound {
                provider: PROVIDER,
                symbol: symbol.to_string(),
            })?;

        Ok(RawQuote {
            symbol: symbol.to_string(),
            fetched_at: Utc::now(),
            payload: QuotePayload::AlphaVantage(quote),
        })
    }

    #[instrument(name = "AlphaVantageHistoryFetch", skip(self), fields(symbol = %symbol))]
    async fn fetch_history(&self, symbol: &str, _years: u32) -> ProviderResult<Vec<RawBar>> {
        let text = self
            .query(
                symbol,
                &[("function", "TIME_SERIES_DAILY"), ("outputsize", "full")],
            )
            .await?;
        let response: TimeSeriesResponse = parse_json(PROVIDER, symbol, &text)?;
        response.messages.check(symbol)?;

        let series = response
            .time_series
            .ok_or_else(|| ProviderError::NotFound {
                provider: PROVIDER,
                symbol: symbol.to_string(),
            })?;

        Ok(series
            .into_iter()
            .map(|(date, bar)| RawBar {
                time: BarTime::Date(date),
                close: bar.close.trim().parse().ok(),
            })
            .collect())
    }

    fn rate_limit_status(&self) -> RateLimitStatus {
        self.limiter.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_function(function: &str, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/query"))
            .and(query_param("function", function))
            .and(query_param("apikey", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&mock_server)
            .await;
        mock_server
    }

    fn provider_for(server: &MockServer) -> AlphaVantageProvider {
        AlphaVantageProvider::new(&ProviderConfig {
            base_url: server.uri(),
            api_key: Some("test-key".to_string()),
            rate_limit: None,
            timeout_secs: 5,
        })
    }

    #[tokio::test]
    async fn test_successful_global_quote() {
        let body = r#"{
            "Global Quote": {
                "01. symbol": "IBM",
                "02. open": "181.0000",
                "05. price": "182.5000",
                "06. volume": "3200000",
                "08. previous close": "181.2500",
                "09. change": "1.2500",
                "10. change percent": "0.6897%"
            }
        }"#;
        let mock_server = mock_function("GLOBAL_QUOTE", body).await;

        let raw = provider_for(&mock_server).fetch_quote("IBM").await.unwrap();
        match raw.payload {
            QuotePayload::AlphaVantage(quote) => {
                assert_eq!(quote.price.as_deref(), Some("182.5000"));
                assert_eq!(quote.change.as_deref(), Some("1.2500"));
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_global_quote_is_not_found() {
        let mock_server = mock_function("GLOBAL_QUOTE", r#"{"Global Quote": {}}"#).await;
        let result = provider_for(&mock_server).fetch_quote("ZZZ").await;
        assert_eq!(
            result.unwrap_err(),
            ProviderError::NotFound {
                provider: PROVIDER,
                symbol: "ZZZ".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_error_message_is_not_found() {
        let body = r#"{"Error Message": "Invalid API call. Please retry or visit the documentation."}"#;
        let mock_server = mock_function("GLOBAL_QUOTE", body).await;
        let result = provider_for(&mock_server).fetch_quote("ZZZ").await;
        assert!(matches!(result, Err(ProviderError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_quota_note_is_rate_limited() {
        let body = r#"{"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute and 25 calls per day."}"#;
        let mock_server = mock_function("GLOBAL_QUOTE", body).await;
        let result = provider_for(&mock_server).fetch_quote("IBM").await;
        assert_eq!(
            result.unwrap_err(),
            ProviderError::RateLimited { provider: PROVIDER }
        );
    }

    #[tokio::test]
    async fn test_daily_series() {
        let body = r#"{
            "Meta Data": {"2. Symbol": "IBM"},
            "Time Series (Daily)": {
                "2024-03-01": {"1. open": "1", "4. close": "185.10", "5. volume": "100"},
                "2024-02-29": {"1. open": "1", "4. close": "184.00", "5. volume": "100"}
            }
        }"#;
        let mock_server = mock_function("TIME_SERIES_DAILY", body).await;

        let mut bars = provider_for(&mock_server)
            .fetch_history("IBM", 5)
            .await
            .unwrap();
        bars.sort_by(|a, b| format!("{:?}", a.time).cmp(&format!("{:?}", b.time)));
        assert_eq!(
            bars,
            vec![
                RawBar {
                    time: BarTime::Date("2024-02-29".to_string()),
                    close: Some(184.0)
                },
                RawBar {
                    time: BarTime::Date("2024-03-01".to_string()),
                    close: Some(185.1)
                },
            ]
        );
    }
}
