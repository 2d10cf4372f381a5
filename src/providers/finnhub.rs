//! Tertiary provider: Finnhub.
//!
//! A quote is built from `/quote` plus an optional `/stock/profile2` lookup
//! for metadata. A failed profile lookup never fails the quote.

use crate::core::config::ProviderConfig;
use crate::core::model::ProviderId;
use crate::core::provider::{
    BarTime, FinnhubProfile, FinnhubQuote, FinnhubQuoteData, ProviderError, ProviderResult,
    QuotePayload, QuoteProvider, RateLimitStatus, RawBar, RawQuote,
};
use crate::providers::rate_limit::RateLimiter;
use crate::providers::util::{history_window, http_client, parse_json, send_request};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, instrument};

const PROVIDER: ProviderId = ProviderId::Finnhub;
const TOKEN_HEADER: &str = "X-Finnhub-Token";

pub struct FinnhubProvider {
    base_url: String,
    api_key: String,
    client: Client,
    limiter: RateLimiter,
}

#[derive(Debug, Deserialize)]
struct CandleResponse {
    s: String,
    #[serde(default)]
    t: Vec<i64>,
    #[serde(default)]
    c: Vec<Option<f64>>,
}

impl FinnhubProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        FinnhubProvider {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key_or_demo(),
            client: http_client(config.timeout_secs),
            limiter: RateLimiter::new(PROVIDER, config.rate_limit_for(PROVIDER)),
        }
    }

    async fn get(&self, symbol: &str, endpoint: &str, params: &[(&str, &str)]) -> ProviderResult<String> {
        let mut all_params = vec![("symbol", symbol)];
        all_params.extend_from_slice(params);

        let url = Url::parse_with_params(&format!("{}{}", self.base_url, endpoint), &all_params)
            .map_err(|e| ProviderError::Validation {
                provider: PROVIDER,
                message: format!("Invalid URL for {symbol}: {e}"),
            })?;

        self.limiter.acquire().await?;
        debug!("Finnhub request: {}", url);
        let request = self
            .client
            .get(url)
            .header(TOKEN_HEADER, self.api_key.as_str());
        send_request(PROVIDER, symbol, request).await
    }

    async fn fetch_profile(&self, symbol: &str) -> ProviderResult<FinnhubProfile> {
        let text = self.get(symbol, "/stock/profile2", &[]).await?;
        parse_json(PROVIDER, symbol, &text)
    }
}

#[async_trait]
impl QuoteProvider for FinnhubProvider {
    fn id(&self) -> ProviderId {
        PROVIDER
    }

    #[instrument(name = "FinnhubQuoteFetch", skip(self), fields(symbol = %symbol))]
    async fn fetch_quote(&self, symbol: &str) -> ProviderResult<RawQuote> {
        let text = self.get(symbol, "/quote", &[]).await?;
        let quote: FinnhubQuoteData = parse_json(PROVIDER, symbol, &text)?;

        // Unknown symbols are answered with an all-zero quote.
        if quote.c.is_none_or(|price| price == 0.0) {
            return Err(ProviderError::NotFound {
                provider: PROVIDER,
                symbol: symbol.to_string(),
            });
        }

        let profile = match self.fetch_profile(symbol).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                debug!("Skipping Finnhub profile for {}: {}", symbol, e);
                None
            }
        };

        Ok(RawQuote {
            symbol: symbol.to_string(),
            fetched_at: Utc::now(),
            payload: QuotePayload::Finnhub(FinnhubQuote { quote, profile }),
        })
    }

    #[instrument(name = "FinnhubHistoryFetch", skip(self), fields(symbol = %symbol))]
    async fn fetch_history(&self, symbol: &str, years: u32) -> ProviderResult<Vec<RawBar>> {
        let (from, to) = history_window(years);
        let (from, to) = (from.to_string(), to.to_string());

        let text = self
            .get(
                symbol,
                "/stock/candle",
                &[("resolution", "D"), ("from", &from), ("to", &to)],
            )
            .await?;
        let candles: CandleResponse = parse_json(PROVIDER, symbol, &text)?;

        if candles.s != "ok" {
            return Err(ProviderError::NotFound {
                provider: PROVIDER,
                symbol: symbol.to_string(),
            });
        }

        Ok(candles
            .t
            .into_iter()
            .zip(candles.c)
            .map(|(ts, close)| RawBar {
                time: BarTime::Unix(ts),
                close,
            })
            .collect())
    }

    fn rate_limit_status(&self) -> RateLimitStatus {
        self.limiter.status()
    }
}
