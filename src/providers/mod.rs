pub mod alpha_vantage;
pub mod finnhub;
pub mod rate_limit;
pub mod util;
pub mod yahoo_finance;

use crate::core::config::AppConfig;
use crate::core::model::ProviderId;
use crate::core::provider::QuoteProvider;
use std::sync::Arc;

/// Builds one adapter per provider named in the default priority or in any
/// per-symbol override.
pub fn build_providers(config: &AppConfig) -> Vec<Arc<dyn QuoteProvider>> {
    let overrides = config.priority_overrides();
    ProviderId::ALL
        .into_iter()
        .filter(|id| config.priority.contains(id) || overrides.values().any(|p| p.contains(id)))
        .map(|id| {
            let provider_config = config.providers.get(id);
            let provider: Arc<dyn QuoteProvider> = match id {
                ProviderId::YahooFinance => {
                    Arc::new(yahoo_finance::YahooFinanceProvider::new(&provider_config))
                }
                ProviderId::AlphaVantage => {
                    Arc::new(alpha_vantage::AlphaVantageProvider::new(&provider_config))
                }
                ProviderId::Finnhub => Arc::new(finnhub::FinnhubProvider::new(&provider_config)),
            };
            provider
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_referenced_providers_are_built() {
        let config: AppConfig = serde_yaml::from_str(
            "symbols:\n  - AAPL\n  - symbol: SAP\n    providers: [finnhub]\npriority: [yahoo_finance]",
        )
        .unwrap();
        let ids: Vec<_> = build_providers(&config).iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec![ProviderId::YahooFinance, ProviderId::Finnhub]);
    }
}
