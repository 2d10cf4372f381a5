//! Canonical stock records and the aggregate views derived from them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Placeholder for metadata a provider did not report.
pub const UNKNOWN: &str = "Unknown";

/// `source` of a record no provider could produce.
pub const NO_SOURCE: &str = "none";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    #[serde(alias = "yahoo")]
    YahooFinance,
    AlphaVantage,
    Finnhub,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [
        ProviderId::YahooFinance,
        ProviderId::AlphaVantage,
        ProviderId::Finnhub,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::YahooFinance => "yahoo_finance",
            ProviderId::AlphaVantage => "alpha_vantage",
            ProviderId::Finnhub => "finnhub",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yahoo" | "yahoo_finance" => Ok(ProviderId::YahooFinance),
            "alpha_vantage" | "alphavantage" => Ok(ProviderId::AlphaVantage),
            "finnhub" => Ok(ProviderId::Finnhub),
            _ => Err(anyhow::anyhow!("Unknown provider: {}", s)),
        }
    }
}

/// One daily close in a historical series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// The provider-agnostic shape every quote is normalized into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub volume: u64,
    pub market_cap: f64,
    pub sector: String,
    pub industry: String,
    pub country: String,
    pub exchange: String,
    pub currency: String,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub failed: bool,
    #[serde(default)]
    pub historical: Vec<PricePoint>,
}

impl StockRecord {
    /// A record for a symbol no provider could price. It stays listed with
    /// zero price so the symbol remains visible.
    pub fn degraded(symbol: &str, timestamp: DateTime<Utc>) -> Self {
        StockRecord {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            price: 0.0,
            change: 0.0,
            change_percent: 0.0,
            volume: 0,
            market_cap: 0.0,
            sector: UNKNOWN.to_string(),
            industry: UNKNOWN.to_string(),
            country: UNKNOWN.to_string(),
            exchange: UNKNOWN.to_string(),
            currency: "USD".to_string(),
            source: NO_SOURCE.to_string(),
            timestamp,
            failed: true,
            historical: Vec::new(),
        }
    }

    pub fn has_price(&self) -> bool {
        self.price > 0.0
    }

    pub fn cap_category(&self) -> CapCategory {
        CapCategory::from_market_cap(self.market_cap)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CapCategory {
    Micro,
    Small,
    Mid,
    Large,
    Mega,
}

impl CapCategory {
    pub fn from_market_cap(market_cap: f64) -> Self {
        if market_cap > 200_000_000_000.0 {
            CapCategory::Mega
        } else if market_cap > 10_000_000_000.0 {
            CapCategory::Large
        } else if market_cap > 2_000_000_000.0 {
            CapCategory::Mid
        } else if market_cap > 300_000_000.0 {
            CapCategory::Small
        } else {
            CapCategory::Micro
        }
    }
}

impl Display for CapCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                CapCategory::Micro => "Micro Cap",
                CapCategory::Small => "Small Cap",
                CapCategory::Mid => "Mid Cap",
                CapCategory::Large => "Large Cap",
                CapCategory::Mega => "Mega Cap",
            }
        )
    }
}

impl FromStr for CapCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "micro" => Ok(CapCategory::Micro),
            "small" => Ok(CapCategory::Small),
            "mid" => Ok(CapCategory::Mid),
            "large" => Ok(CapCategory::Large),
            "mega" => Ok(CapCategory::Mega),
            _ => Err(anyhow::anyhow!("Invalid cap category: {}", s)),
        }
    }
}

/// Portfolio-wide aggregate, recomputed from records on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub total_stocks: usize,
    pub success_rate: f64,
    pub total_market_cap: f64,
    pub avg_change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorSummary {
    pub count: usize,
    pub avg_change: f64,
    pub total_market_cap: f64,
}

/// Provider calls counted toward a day, or summed over several days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCount {
    pub requests: u64,
    pub successes: u64,
}

impl UsageCount {
    pub fn add(&mut self, other: UsageCount) {
        self.requests += other.requests;
        self.successes += other.successes;
    }

    /// Fraction of requests that succeeded, 0 when there were none.
    pub fn success_rate(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.successes as f64 / self.requests as f64
        }
    }
}
