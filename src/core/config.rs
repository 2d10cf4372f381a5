use crate::core::model::ProviderId;
use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::{fs, path::PathBuf};
use tracing::debug;

/// A symbol in the universe, optionally with its own provider order and a
/// sector for providers that do not report one.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum SymbolEntry {
    Plain(String),
    Detailed {
        symbol: String,
        #[serde(default)]
        providers: Option<Vec<ProviderId>>,
        #[serde(default)]
        sector: Option<String>,
    },
}

impl SymbolEntry {
    pub fn symbol(&self) -> String {
        match self {
            SymbolEntry::Plain(symbol) | SymbolEntry::Detailed { symbol, .. } => {
                symbol.trim().to_uppercase()
            }
        }
    }

    pub fn providers(&self) -> Option<&[ProviderId]> {
        match self {
            SymbolEntry::Plain(_) => None,
            SymbolEntry::Detailed { providers, .. } => providers.as_deref(),
        }
    }

    pub fn sector(&self) -> Option<&str> {
        match self {
            SymbolEntry::Plain(_) => None,
            SymbolEntry::Detailed { sector, .. } => {
                sector.as_deref().map(str::trim).filter(|s| !s.is_empty())
            }
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    #[serde(default)]
    pub requests_per_day: Option<u32>,
    /// Tokens available at once. Defaults to `requests_per_minute`.
    #[serde(default)]
    pub burst: Option<u32>,
    /// Longest a call waits for a token before giving up as rate limited.
    #[serde(default)]
    pub max_wait_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProviderConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl RateLimitConfig {
    /// Published free-tier limits of each provider.
    pub fn defaults_for(provider: ProviderId) -> Self {
        match provider {
            ProviderId::YahooFinance => RateLimitConfig {
                requests_per_minute: 120,
                requests_per_day: None,
                burst: Some(10),
                max_wait_ms: 5_000,
            },
            ProviderId::AlphaVantage => RateLimitConfig {
                requests_per_minute: 5,
                requests_per_day: Some(25),
                burst: None,
                max_wait_ms: 15_000,
            },
            ProviderId::Finnhub => RateLimitConfig {
                requests_per_minute: 60,
                requests_per_day: None,
                burst: None,
                max_wait_ms: 5_000,
            },
        }
    }
}

impl ProviderConfig {
    pub fn defaults_for(provider: ProviderId) -> Self {
        let base_url = match provider {
            ProviderId::YahooFinance => "https://query1.finance.yahoo.com",
            ProviderId::AlphaVantage => "https://www.alphavantage.co",
            ProviderId::Finnhub => "https://finnhub.io/api/v1",
        };
        ProviderConfig {
            base_url: base_url.to_string(),
            api_key: None,
            rate_limit: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn rate_limit_for(&self, provider: ProviderId) -> RateLimitConfig {
        self.rate_limit
            .clone()
            .unwrap_or_else(|| RateLimitConfig::defaults_for(provider))
    }

    pub fn api_key_or_demo(&self) -> String {
        self.api_key.clone().unwrap_or_else(|| "demo".to_string())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    pub yahoo: Option<ProviderConfig>,
    pub alpha_vantage: Option<ProviderConfig>,
    pub finnhub: Option<ProviderConfig>,
}

impl ProvidersConfig {
    /// Settings for `provider`, filling in defaults for providers not listed.
    pub fn get(&self, provider: ProviderId) -> ProviderConfig {
        let configured = match provider {
            ProviderId::YahooFinance => &self.yahoo,
            ProviderId::AlphaVantage => &self.alpha_vantage,
            ProviderId::Finnhub => &self.finnhub,
        };
        configured
            .clone()
            .unwrap_or_else(|| ProviderConfig::defaults_for(provider))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RetryConfig {
    /// Extra attempts against the same provider after a transient failure.
    pub attempts: usize,
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            attempts: 2,
            delay_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub symbols: Vec<SymbolEntry>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default = "default_priority")]
    pub priority: Vec<ProviderId>,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_history_years")]
    pub history_years: u32,
    #[serde(default)]
    pub retry: RetryConfig,
    pub data_path: Option<String>,
}

fn default_priority() -> Vec<ProviderId> {
    ProviderId::ALL.to_vec()
}

fn default_concurrency() -> usize {
    4
}

fn default_history_years() -> u32 {
    5
}

fn default_timeout_secs() -> u64 {
    10
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "stockboard", "stockboard")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("dev", "stockboard", "stockboard")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.priority.is_empty() {
            bail!("priority must name at least one provider");
        }
        if self.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        if self.history_years == 0 {
            bail!("history_years must be at least 1");
        }
        let mut seen = HashSet::new();
        for entry in &self.symbols {
            let symbol = entry.symbol();
            if symbol.is_empty() {
                bail!("symbols must not be blank");
            }
            if !seen.insert(symbol.clone()) {
                bail!("duplicate symbol: {}", symbol);
            }
            if entry.providers().is_some_and(|p| p.is_empty()) {
                bail!("provider override for {} is empty", symbol);
            }
        }
        Ok(())
    }

    /// Symbols in configured order.
    pub fn symbol_universe(&self) -> Vec<String> {
        self.symbols.iter().map(SymbolEntry::symbol).collect()
    }

    pub fn priority_overrides(&self) -> HashMap<String, Vec<ProviderId>> {
        self.symbols
            .iter()
            .filter_map(|entry| entry.providers().map(|p| (entry.symbol(), p.to_vec())))
            .collect()
    }

    pub fn sector_overrides(&self) -> HashMap<String, String> {
        self.symbols
            .iter()
            .filter_map(|entry| entry.sector().map(|s| (entry.symbol(), s.to_string())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
symbols:
  - AAPL
  - " msft "
  - symbol: "SAP.DE"
    providers: [finnhub, yahoo_finance]
  - symbol: xom
    sector: Energy
providers:
  alpha_vantage:
    base_url: "http://example.com/av"
    api_key: "secret"
    rate_limit:
      requests_per_minute: 5
      requests_per_day: 25
      max_wait_ms: 12000
concurrency: 8
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        config.validate().unwrap();

        assert_eq!(
            config.symbol_universe(),
            vec!["AAPL", "MSFT", "SAP.DE", "XOM"]
        );
        assert_eq!(config.sector_overrides()["XOM"], "Energy");
        assert_eq!(config.priority, ProviderId::ALL.to_vec());
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.history_years, 5);
        assert_eq!(config.retry, RetryConfig::default());

        let overrides = config.priority_overrides();
        assert_eq!(overrides.len(), 1);
        assert_eq!(
            overrides["SAP.DE"],
            vec![ProviderId::Finnhub, ProviderId::YahooFinance]
        );

        let av = config.providers.get(ProviderId::AlphaVantage);
        assert_eq!(av.base_url, "http://example.com/av");
        assert_eq!(av.api_key_or_demo(), "secret");
        assert_eq!(av.timeout_secs, 10);
        let limit = av.rate_limit_for(ProviderId::AlphaVantage);
        assert_eq!(limit.requests_per_day, Some(25));
        assert_eq!(limit.max_wait_ms, 12_000);
        assert_eq!(limit.burst, None);

        // Providers left out of the file keep their defaults.
        let yahoo = config.providers.get(ProviderId::YahooFinance);
        assert_eq!(yahoo.base_url, "https://query1.finance.yahoo.com");
        assert_eq!(yahoo.api_key_or_demo(), "demo");
        assert_eq!(
            yahoo
                .rate_limit_for(ProviderId::YahooFinance)
                .requests_per_minute,
            120
        );
    }

    #[test]
    fn test_validation_rejects_duplicates_and_empty_priority() {
        let duplicate: AppConfig = serde_yaml::from_str("symbols: [AAPL, aapl]").unwrap();
        assert!(
            duplicate
                .validate()
                .unwrap_err()
                .to_string()
                .contains("duplicate symbol: AAPL")
        );

        let no_priority: AppConfig =
            serde_yaml::from_str("symbols: [AAPL]\npriority: []").unwrap();
        assert!(no_priority.validate().is_err());

        let empty_override: AppConfig =
            serde_yaml::from_str("symbols:\n  - symbol: AAPL\n    providers: []").unwrap();
        assert!(empty_override.validate().is_err());
    }

    #[test]
    fn test_load_from_path() -> Result<()> {
        let file = tempfile::NamedTempFile::new()?;
        fs::write(file.path(), "symbols: [AAPL]\nhistory_years: 2\n")?;
        let config = AppConfig::load_from_path(file.path())?;
        assert_eq!(config.history_years, 2);

        fs::write(file.path(), "symbols: [AAPL]\nconcurrency: 0\n")?;
        assert!(AppConfig::load_from_path(file.path()).is_err());
        Ok(())
    }
}
