//! Market data provider abstractions and the raw payloads they return.

use crate::core::model::ProviderId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a single adapter call for a single symbol.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderError {
    /// The provider's request budget is spent.
    #[error("Rate limited: {provider}")]
    RateLimited { provider: ProviderId },

    /// The provider does not list the symbol. Another provider may.
    #[error("Symbol not found: {symbol} ({provider})")]
    NotFound { provider: ProviderId, symbol: String },

    /// Network failure, timeout or 5xx.
    #[error("Transient error from {provider}: {message}")]
    Transient { provider: ProviderId, message: String },

    /// The provider answered with a payload we cannot use.
    #[error("Validation failed for {provider}: {message}")]
    Validation { provider: ProviderId, message: String },

    /// The refresh was cancelled before this call was made.
    #[error("Cancelled before calling {provider}")]
    Cancelled { provider: ProviderId },
}

impl ProviderError {
    pub fn provider(&self) -> ProviderId {
        match self {
            ProviderError::RateLimited { provider }
            | ProviderError::NotFound { provider, .. }
            | ProviderError::Transient { provider, .. }
            | ProviderError::Validation { provider, .. }
            | ProviderError::Cancelled { provider } => *provider,
        }
    }

    /// Whether repeating the same call against the same provider may help.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Transient { .. } | ProviderError::Validation { .. }
        )
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// `meta` block of the Yahoo chart endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooQuote {
    pub regular_market_price: Option<f64>,
    #[serde(alias = "previousClose")]
    pub chart_previous_close: Option<f64>,
    pub regular_market_volume: Option<u64>,
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    #[serde(alias = "fullExchangeName")]
    pub exchange_name: Option<String>,
    pub currency: Option<String>,
    pub market_cap: Option<f64>,
}

/// `Global Quote` object of Alpha Vantage. Every value arrives as a string.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AlphaVantageQuote {
    #[serde(rename = "01. symbol")]
    pub symbol: Option<String>,
    #[serde(rename = "05. price")]
    pub price: Option<String>,
    #[serde(rename = "06. volume")]
    pub volume: Option<String>,
    #[serde(rename = "08. previous close")]
    pub previous_close: Option<String>,
    #[serde(rename = "09. change")]
    pub change: Option<String>,
    #[serde(rename = "10. change percent")]
    pub change_percent: Option<String>,
}

/// Finnhub `/quote` response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FinnhubQuoteData {
    pub c: Option<f64>,
    pub d: Option<f64>,
    pub dp: Option<f64>,
    pub pc: Option<f64>,
}

/// Finnhub `/stock/profile2` response. Market cap is in millions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinnhubProfile {
    pub name: Option<String>,
    pub country: Option<String>,
    pub currency: Option<String>,
    pub exchange: Option<String>,
    pub finnhub_industry: Option<String>,
    pub market_capitalization: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinnhubQuote {
    pub quote: FinnhubQuoteData,
    pub profile: Option<FinnhubProfile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QuotePayload {
    Yahoo(YahooQuote),
    AlphaVantage(AlphaVantageQuote),
    Finnhub(FinnhubQuote),
}

impl QuotePayload {
    pub fn provider(&self) -> ProviderId {
        match self {
            QuotePayload::Yahoo(_) => ProviderId::YahooFinance,
            QuotePayload::AlphaVantage(_) => ProviderId::AlphaVantage,
            QuotePayload::Finnhub(_) => ProviderId::Finnhub,
        }
    }
}

/// A quote exactly as a provider reported it, stamped with when it was fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawQuote {
    pub symbol: String,
    pub fetched_at: chrono::DateTime<chrono::Utc>,
    pub payload: QuotePayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BarTime {
    /// Seconds since the epoch.
    Unix(i64),
    /// `YYYY-MM-DD`.
    Date(String),
}

/// One daily bar as a provider reported it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub time: BarTime,
    pub close: Option<f64>,
}

/// Usage counters of a provider's rate limiter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub provider: ProviderId,
    pub requests_made: u64,
    pub requests_rejected: u64,
    pub remaining_this_minute: f64,
    pub remaining_today: Option<u32>,
}

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    async fn fetch_quote(&self, symbol: &str) -> ProviderResult<RawQuote>;

    async fn fetch_history(&self, symbol: &str, years: u32) -> ProviderResult<Vec<RawBar>>;

    fn rate_limit_status(&self) -> RateLimitStatus;
}
