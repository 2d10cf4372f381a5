//! Maps provider payloads onto the canonical [`StockRecord`] shape.
//!
//! Everything here is pure: the acquisition time travels inside the
//! [`RawQuote`], so normalizing the same payload twice gives the same record.

use crate::core::model::{PricePoint, ProviderId, StockRecord, UNKNOWN};
use crate::core::provider::{
    AlphaVantageQuote, BarTime, FinnhubQuote, ProviderError, ProviderResult, QuotePayload,
    RawBar, RawQuote, YahooQuote,
};
use chrono::{DateTime, Duration, NaiveDate};
use std::collections::BTreeMap;

/// Finnhub reports market capitalization in millions.
const FINNHUB_MARKET_CAP_SCALE: f64 = 1_000_000.0;

const DEFAULT_CURRENCY: &str = "USD";

/// Partial fields every payload is first reduced to.
struct QuoteFields {
    price: Option<f64>,
    change: Option<f64>,
    change_percent: Option<f64>,
    volume: Option<u64>,
    market_cap: Option<f64>,
    name: Option<String>,
    industry: Option<String>,
    country: Option<String>,
    exchange: Option<String>,
    currency: Option<String>,
}

pub fn normalize_quote(raw: &RawQuote) -> ProviderResult<StockRecord> {
    let provider = raw.payload.provider();
    let fields = match &raw.payload {
        QuotePayload::Yahoo(quote) => yahoo_fields(quote),
        QuotePayload::AlphaVantage(quote) => alpha_vantage_fields(quote),
        QuotePayload::Finnhub(quote) => finnhub_fields(quote),
    };

    let price = match fields.price {
        Some(price) if price.is_finite() && price > 0.0 => price,
        Some(price) => {
            return Err(invalid(provider, format!("unusable price {price} for {}", raw.symbol)));
        }
        None => return Err(invalid(provider, format!("missing price for {}", raw.symbol))),
    };

    let change = fields.change.filter(|c| c.is_finite()).unwrap_or(0.0);
    let change_percent = fields
        .change_percent
        .filter(|p| p.is_finite())
        .unwrap_or_else(|| derive_change_percent(price, change));

    Ok(StockRecord {
        symbol: raw.symbol.clone(),
        name: fields
            .name
            .and_then(non_blank)
            .unwrap_or_else(|| raw.symbol.clone()),
        price,
        change,
        change_percent,
        volume: fields.volume.unwrap_or(0),
        market_cap: fields
            .market_cap
            .filter(|m| m.is_finite() && *m > 0.0)
            .unwrap_or(0.0),
        // None of the providers report a sector on their quote endpoints.
        sector: UNKNOWN.to_string(),
        industry: or_unknown(fields.industry),
        country: or_unknown(fields.country),
        exchange: or_unknown(fields.exchange),
        currency: fields
            .currency
            .and_then(non_blank)
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        source: provider.as_str().to_string(),
        timestamp: raw.fetched_at,
        failed: false,
        historical: Vec::new(),
    })
}

/// Converts raw bars into a chronological series starting at `start`.
///
/// Bars without a positive close or a parseable date are dropped. When a
/// date repeats, the bar reported last wins.
pub fn normalize_history(bars: &[RawBar], start: NaiveDate) -> Vec<PricePoint> {
    let mut by_date = BTreeMap::new();
    for bar in bars {
        let Some(date) = bar_date(&bar.time) else {
            continue;
        };
        let Some(close) = bar.close.filter(|c| c.is_finite() && *c > 0.0) else {
            continue;
        };
        if date >= start {
            by_date.insert(date, close);
        }
    }

    by_date
        .into_iter()
        .map(|(date, close)| PricePoint { date, close })
        .collect()
}

/// First day of a window of `years` ending at `as_of`.
pub fn history_start(as_of: NaiveDate, years: u32) -> NaiveDate {
    as_of - Duration::days(365 * i64::from(years))
}

fn yahoo_fields(quote: &YahooQuote) -> QuoteFields {
    let change = match (quote.regular_market_price, quote.chart_previous_close) {
        (Some(price), Some(prev)) => Some(price - prev),
        _ => None,
    };
    QuoteFields {
        price: quote.regular_market_price,
        change,
        change_percent: None,
        volume: quote.regular_market_volume,
        market_cap: quote.market_cap,
        name: quote.long_name.clone().or_else(|| quote.short_name.clone()),
        industry: None,
        country: None,
        exchange: quote.exchange_name.clone(),
        currency: quote.currency.clone(),
    }
}

fn alpha_vantage_fields(quote: &AlphaVantageQuote) -> QuoteFields {
    QuoteFields {
        price: parse_number(quote.price.as_deref()),
        change: parse_number(quote.change.as_deref()),
        change_percent: parse_number(
            quote
                .change_percent
                .as_deref()
                .map(|p| p.trim_end_matches('%')),
        ),
        volume: quote.volume.as_deref().and_then(|v| v.trim().parse().ok()),
        market_cap: None,
        name: None,
        industry: None,
        country: None,
        exchange: None,
        currency: None,
    }
}

fn finnhub_fields(quote: &FinnhubQuote) -> QuoteFields {
    let profile = quote.profile.clone().unwrap_or_default();
    QuoteFields {
        price: quote.quote.c,
        change: quote.quote.d,
        change_percent: quote.quote.dp,
        volume: None,
        market_cap: profile
            .market_capitalization
            .map(|m| m * FINNHUB_MARKET_CAP_SCALE),
        name: profile.name,
        industry: profile.finnhub_industry,
        country: profile.country,
        exchange: profile.exchange,
        currency: profile.currency,
    }
}

fn derive_change_percent(price: f64, change: f64) -> f64 {
    let previous = price - change;
    if previous > 0.0 {
        (change / previous) * 100.0
    } else {
        0.0
    }
}

fn bar_date(time: &BarTime) -> Option<NaiveDate> {
    match time {
        BarTime::Unix(ts) => DateTime::from_timestamp(*ts, 0).map(|dt| dt.date_naive()),
        BarTime::Date(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok(),
    }
}

fn parse_number(value: Option<&str>) -> Option<f64> {
    value.and_then(|v| v.trim().parse::<f64>().ok())
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn or_unknown(value: Option<String>) -> String {
    value.and_then(non_blank).unwrap_or_else(|| UNKNOWN.to_string())
}

fn invalid(provider: ProviderId, message: String) -> ProviderError {
    ProviderError::Validation { provider, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::provider::{FinnhubProfile, FinnhubQuoteData};
    use chrono::{TimeZone, Utc};

    fn raw(payload: QuotePayload) -> RawQuote {
        RawQuote {
            symbol: "AAPL".to_string(),
            fetched_at: Utc.with_ymd_and_hms(2024, 3, 1, 15, 30, 0).unwrap(),
            payload,
        }
    }

    #[test]
    fn test_yahoo_quote_derives_change_from_previous_close() {
        let quote = YahooQuote {
            regular_market_price: Some(110.0),
            chart_previous_close: Some(100.0),
            regular_market_volume: Some(1_000),
            long_name: Some("Apple Inc.".to_string()),
            short_name: Some("Apple".to_string()),
            exchange_name: Some("NMS".to_string()),
            currency: Some("USD".to_string()),
            market_cap: None,
        };
        let record = normalize_quote(&raw(QuotePayload::Yahoo(quote))).unwrap();

        assert_eq!(record.source, "yahoo_finance");
        assert_eq!(record.name, "Apple Inc.");
        assert!((record.change - 10.0).abs() < 1e-9);
        assert!((record.change_percent - 10.0).abs() < 1e-9);
        assert_eq!(record.volume, 1_000);
        assert_eq!(record.market_cap, 0.0);
        assert_eq!(record.exchange, "NMS");
        assert_eq!(record.sector, UNKNOWN);
        assert_eq!(record.country, UNKNOWN);
        assert!(!record.failed);
    }

    #[test]
    fn test_alpha_vantage_strings_are_parsed() {
        let quote = AlphaVantageQuote {
            symbol: Some("IBM".to_string()),
            price: Some("182.50".to_string()),
            volume: Some("3200000".to_string()),
            previous_close: Some("181.25".to_string()),
            change: Some("1.25".to_string()),
            change_percent: Some("0.6897%".to_string()),
        };
        let record = normalize_quote(&raw(QuotePayload::AlphaVantage(quote))).unwrap();

        assert_eq!(record.price, 182.5);
        assert_eq!(record.change, 1.25);
        assert!((record.change_percent - 0.6897).abs() < 1e-9);
        assert_eq!(record.volume, 3_200_000);
        assert_eq!(record.name, "AAPL");
        assert_eq!(record.currency, "USD");
        assert_eq!(record.source, "alpha_vantage");
    }

    #[test]
    fn test_finnhub_market_cap_is_scaled_from_millions() {
        let quote = FinnhubQuote {
            quote: FinnhubQuoteData {
                c: Some(20.0),
                d: Some(-1.0),
                dp: None,
                pc: Some(21.0),
            },
            profile: Some(FinnhubProfile {
                name: Some("Acme".to_string()),
                country: Some("US".to_string()),
                currency: Some("USD".to_string()),
                exchange: Some("NASDAQ".to_string()),
                finnhub_industry: Some("Technology".to_string()),
                market_capitalization: Some(2_500.0),
            }),
        };
        let record = normalize_quote(&raw(QuotePayload::Finnhub(quote))).unwrap();

        assert_eq!(record.market_cap, 2_500_000_000.0);
        assert_eq!(record.industry, "Technology");
        assert_eq!(record.country, "US");
        assert!((record.change_percent - (-1.0 / 21.0 * 100.0)).abs() < 1e-9);
    }

    #[test]
    fn test_missing_metadata_falls_back_to_unknown() {
        let quote = FinnhubQuote {
            quote: FinnhubQuoteData {
                c: Some(5.0),
                ..Default::default()
            },
            profile: Some(FinnhubProfile {
                country: Some("  ".to_string()),
                ..Default::default()
            }),
        };
        let record = normalize_quote(&raw(QuotePayload::Finnhub(quote))).unwrap();
        assert_eq!(record.country, UNKNOWN);
        assert_eq!(record.industry, UNKNOWN);
        assert_eq!(record.exchange, UNKNOWN);
        assert_eq!(record.change, 0.0);
        assert_eq!(record.change_percent, 0.0);
    }

    #[test]
    fn test_missing_or_zero_price_is_a_validation_error() {
        let missing = normalize_quote(&raw(QuotePayload::Yahoo(YahooQuote::default())));
        assert!(matches!(missing, Err(ProviderError::Validation { .. })));

        let zero = AlphaVantageQuote {
            price: Some("0.0000".to_string()),
            ..Default::default()
        };
        let result = normalize_quote(&raw(QuotePayload::AlphaVantage(zero)));
        assert!(matches!(
            result,
            Err(ProviderError::Validation {
                provider: ProviderId::AlphaVantage,
                ..
            })
        ));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let quote = raw(QuotePayload::Yahoo(YahooQuote {
            regular_market_price: Some(42.0),
            chart_previous_close: Some(40.0),
            ..Default::default()
        }));
        let first = normalize_quote(&quote).unwrap();
        let second = normalize_quote(&quote).unwrap();
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[test]
    fn test_history_is_sorted_deduplicated_and_windowed() {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let jan_2 = Utc.with_ymd_and_hms(2020, 1, 2, 14, 30, 0).unwrap().timestamp();
        let bars = vec![
            RawBar {
                time: BarTime::Date("2020-01-03".to_string()),
                close: Some(12.0),
            },
            RawBar {
                time: BarTime::Unix(jan_2),
                close: Some(11.0),
            },
            RawBar {
                time: BarTime::Date("2019-12-31".to_string()),
                close: Some(10.0),
            },
            RawBar {
                time: BarTime::Date("2020-01-03".to_string()),
                close: Some(12.5),
            },
            RawBar {
                time: BarTime::Date("not-a-date".to_string()),
                close: Some(1.0),
            },
            RawBar {
                time: BarTime::Date("2020-01-06".to_string()),
                close: None,
            },
        ];

        let series = normalize_history(&bars, start);
        assert_eq!(
            series,
            vec![
                PricePoint {
                    date: NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(),
                    close: 11.0
                },
                PricePoint {
                    date: NaiveDate::from_ymd_opt(2020, 1, 3).unwrap(),
                    close: 12.5
                },
            ]
        );
    }

    #[test]
    fn test_history_start() {
        let as_of = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(
            history_start(as_of, 1),
            NaiveDate::from_ymd_opt(2023, 6, 2).unwrap()
        );
    }
}
