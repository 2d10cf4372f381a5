//! Scripted providers shared by the resolver and refresher tests.

use crate::core::model::ProviderId;
use crate::core::provider::{
    BarTime, ProviderError, ProviderResult, QuotePayload, QuoteProvider, RateLimitStatus, RawBar,
    RawQuote, YahooQuote,
};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

type QuoteFn = Box<dyn Fn(&str, usize) -> ProviderResult<RawQuote> + Send + Sync>;

pub struct MockProvider {
    id: ProviderId,
    quote: QuoteFn,
    history: ProviderResult<Vec<RawBar>>,
    cancel_on_call: Option<CancellationToken>,
    pub quote_calls: AtomicUsize,
    pub history_calls: AtomicUsize,
    requests: AtomicU64,
}

impl MockProvider {
    /// `quote` receives the symbol and the zero-based call count.
    pub fn new(
        id: ProviderId,
        quote: impl Fn(&str, usize) -> ProviderResult<RawQuote> + Send + Sync + 'static,
    ) -> Self {
        MockProvider {
            id,
            quote: Box::new(quote),
            history: Ok(vec![
                RawBar {
                    time: BarTime::Date("2024-01-02".to_string()),
                    close: Some(100.0),
                },
                RawBar {
                    time: BarTime::Date("2024-01-03".to_string()),
                    close: Some(101.0),
                },
            ]),
            cancel_on_call: None,
            quote_calls: AtomicUsize::new(0),
            history_calls: AtomicUsize::new(0),
            requests: AtomicU64::new(0),
        }
    }

    /// Always prices every symbol at `price`.
    pub fn pricing(id: ProviderId, price: f64) -> Self {
        Self::new(id, move |symbol, _| Ok(yahoo_quote(symbol, price)))
    }

    /// Always fails with the error built by `error`.
    pub fn failing(id: ProviderId, error: fn(ProviderId, &str) -> ProviderError) -> Self {
        Self::new(id, move |symbol, _| Err(error(id, symbol)))
    }

    pub fn with_history(mut self, history: ProviderResult<Vec<RawBar>>) -> Self {
        self.history = history;
        self
    }

    /// Cancels `token` as soon as a quote is requested.
    pub fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancel_on_call = Some(token);
        self
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn quote_calls(&self) -> usize {
        self.quote_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteProvider for MockProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    async fn fetch_quote(&self, symbol: &str) -> ProviderResult<RawQuote> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let call = self.quote_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = &self.cancel_on_call {
            token.cancel();
        }
        (self.quote)(symbol, call)
    }

    async fn fetch_history(&self, _symbol: &str, _years: u32) -> ProviderResult<Vec<RawBar>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        self.history.clone()
    }

    fn rate_limit_status(&self) -> RateLimitStatus {
        RateLimitStatus {
            provider: self.id,
            requests_made: self.requests.load(Ordering::SeqCst),
            requests_rejected: 0,
            remaining_this_minute: 60.0,
            remaining_today: None,
        }
    }
}

/// A Yahoo-shaped quote priced at `price` with a 1.0 change.
pub fn yahoo_quote(symbol: &str, price: f64) -> RawQuote {
    RawQuote {
        symbol: symbol.to_string(),
        fetched_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        payload: QuotePayload::Yahoo(YahooQuote {
            regular_market_price: Some(price),
            chart_previous_close: Some(price - 1.0),
            regular_market_volume: Some(1_000),
            long_name: Some(format!("{symbol} Inc.")),
            currency: Some("USD".to_string()),
            market_cap: Some(price * 1_000_000.0),
            ..Default::default()
        }),
    }
}

pub fn rate_limited(provider: ProviderId, _symbol: &str) -> ProviderError {
    ProviderError::RateLimited { provider }
}

pub fn not_found(provider: ProviderId, symbol: &str) -> ProviderError {
    ProviderError::NotFound {
        provider,
        symbol: symbol.to_string(),
    }
}

pub fn transient(provider: ProviderId, _symbol: &str) -> ProviderError {
    ProviderError::Transient {
        provider,
        message: "connection reset".to_string(),
    }
}
