use crate::core::config::ProviderConfig;
use crate::core::model::ProviderId;
use crate::core::provider::{
    BarTime, ProviderError, ProviderResult, QuotePayload, QuoteProvider, RateLimitStatus, RawBar,
    RawQuote, YahooQuote,
};
use crate::providers::rate_limit::RateLimiter;
use crate::providers::util::{history_window, http_client, parse_json, send_request};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, instrument};

const PROVIDER: ProviderId = ProviderId::YahooFinance;

/// Primary provider: Yahoo Finance chart API.
pub struct YahooFinanceProvider {
    base_url: String,
    client: Client,
    limiter: RateLimiter,
}

impl YahooFinanceProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        YahooFinanceProvider {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client: http_client(config.timeout_secs),
            limiter: RateLimiter::new(PROVIDER, config.rate_limit_for(PROVIDER)),
        }
    }

    /// `window` is either a `range` or a `period1`/`period2` pair. Yahoo only
    /// accepts a few fixed ranges, so arbitrary spans go through periods.
    async fn fetch_chart(
        &self,
        symbol: &str,
        window: &[(&str, &str)],
    ) -> ProviderResult<ChartItem> {
        // Yahoo spells exchange-qualified tickers with a dot.
        let ticker = symbol.replace(':', ".");
        let mut params = vec![("interval", "1d")];
        params.extend_from_slice(window);
        let url = Url::parse_with_params(
            &format!("{}/v8/finance/chart/{}", self.base_url, ticker),
            &params,
        )
        .map_err(|e| ProviderError::Validation {
            provider: PROVIDER,
            message: format!("Invalid chart URL for {symbol}: {e}"),
        })?;

        self.limiter.acquire().await?;
        debug!("Requesting chart data from {}", url);
        let text = send_request(PROVIDER, symbol, self.client.get(url)).await?;
        let data: YahooChartResponse = parse_json(PROVIDER, symbol, &text)?;

        if let Some(error) = data.chart.error {
            debug!(code = %error.code, "Yahoo reported an error for {}", symbol);
        }

        data.chart
            .result
            .and_then(|items| items.into_iter().next())
            .ok_or_else(|| ProviderError::NotFound {
                provider: PROVIDER,
                symbol: symbol.to_string(),
            })
    }
}

#[derive(Deserialize, Debug)]
struct YahooChartResponse {
    chart: ChartResult,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    result: Option<Vec<ChartItem>>,
    error: Option<ChartError>,
}

#[derive(Deserialize, Debug)]
struct ChartError {
    code: String,
}

#[derive(Deserialize, Debug)]
struct ChartItem {
    meta: YahooQuote,
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Deserialize, Debug)]
struct Quote {
    close: Option<Vec<Option<f64>>>,
}

#[async_trait]
impl QuoteProvider for YahooFinanceProvider {
    fn id(&self) -> ProviderId {
        PROVIDER
    }

    #[instrument(name = "YahooQuoteFetch", skip(self), fields(symbol = %symbol))]
    async fn fetch_quote(&self, symbol: &str) -> ProviderResult<RawQuote> {
        let item = self.fetch_chart(symbol, &[("range", "1d")]).await?;
        Ok(RawQuote {
            symbol: symbol.to_string(),
            fetched_at: Utc::now(),
            payload: QuotePayload::Yahoo(item.meta),
        })
    }

    #[instrument(name = "YahooHistoryFetch", skip(self), fields(symbol = %symbol))]
    async fn fetch_history(&self, symbol: &str, years: u32) -> ProviderResult<Vec<RawBar>> {
        let (from, to) = history_window(years);
        let (period1, period2) = (from.to_string(), to.to_string());
        let item = self
            .fetch_chart(
                symbol,
                &[("period1", period1.as_str()), ("period2", period2.as_str())],
            )
            .await?;

        let timestamps = item.timestamp.unwrap_or_default();
        let closes = item
            .indicators
            .and_then(|inds| inds.quote.into_iter().next())
            .and_then(|q| q.close)
            .unwrap_or_default();

        Ok(timestamps
            .into_iter()
            .zip(closes)
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
