//! Read and refresh surface over the store, shared by the CLI commands.

use crate::core::analytics::{
    RecordFilter, compute_sector_summary, compute_snapshot, filter_records,
};
use crate::core::config::AppConfig;
use crate::core::model::{
    PortfolioSnapshot, ProviderId, SectorSummary, StockRecord, UsageCount,
};
use crate::core::provider::{QuoteProvider, RateLimitStatus};
use crate::core::refresh::{RefreshReport, Refresher};
use crate::core::resolver::{FetchOutcome, Resolver};
use crate::core::store::StockStore;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Days of provider usage shown by `provider_usage`.
pub const USAGE_WINDOW_DAYS: i64 = 30;

/// Stored call counts of one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderUsage {
    pub provider: ProviderId,
    /// Over the last [`USAGE_WINDOW_DAYS`] days.
    pub recent: UsageCount,
    pub today: UsageCount,
}

/// Everything a report generator needs, in one serializable bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub snapshot: PortfolioSnapshot,
    pub sectors: BTreeMap<String, SectorSummary>,
    pub stocks: Vec<StockRecord>,
    pub providers: Vec<RateLimitStatus>,
    pub usage: Vec<ProviderUsage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reinitialized {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

pub struct Dashboard {
    symbols: Vec<String>,
    store: Arc<dyn StockStore>,
    refresher: Refresher,
}

impl Dashboard {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn StockStore>,
        providers: Vec<Arc<dyn QuoteProvider>>,
    ) -> Self {
        let resolver = Arc::new(Resolver::from_config(config, providers));
        Dashboard {
            symbols: config.symbol_universe(),
            refresher: Refresher::new(resolver, Arc::clone(&store), config.concurrency),
            store,
        }
    }

    /// Dashboard over the on-disk store and the configured providers.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let store = crate::store::open_store(config)?;
        let providers = crate::providers::build_providers(config);
        Ok(Self::new(config, store, providers))
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub async fn refresh_all(
        &self,
        cancel: &CancellationToken,
        progress: &(dyn Fn(&FetchOutcome) + Send + Sync),
    ) -> Result<RefreshReport> {
        self.refresher
            .refresh_all(&self.symbols, cancel, progress)
            .await
    }

    pub fn is_configured(&self, symbol: &str) -> bool {
        self.symbols.contains(&symbol.trim().to_uppercase())
    }

    /// Fetches one symbol on demand. Symbols outside the configured universe
    /// are fetched but not stored, so they stay out of the summaries.
    pub async fn refresh_one(&self, symbol: &str) -> Result<StockRecord> {
        let symbol = symbol.trim().to_uppercase();
        if self.symbols.contains(&symbol) {
            return self.refresher.refresh_one(&symbol).await;
        }
        warn!(
            "{} is not a configured symbol, it will not be stored",
            symbol
        );
        Ok(self.refresher.fetch_one(&symbol).await.record)
    }

    pub async fn snapshot(&self) -> Result<PortfolioSnapshot> {
        Ok(compute_snapshot(&self.store.list_all().await?))
    }

    pub async fn sector_summary(&self) -> Result<BTreeMap<String, SectorSummary>> {
        Ok(compute_sector_summary(&self.store.list_all().await?))
    }

    pub async fn stocks(&self, filter: &RecordFilter) -> Result<Vec<StockRecord>> {
        Ok(filter_records(&self.store.list_all().await?, filter))
    }

    pub async fn stock(&self, symbol: &str) -> Result<Option<StockRecord>> {
        self.store.get(&symbol.trim().to_uppercase()).await
    }

    pub fn provider_status(&self) -> Vec<RateLimitStatus> {
        self.refresher
            .resolver()
            .providers()
            .iter()
            .map(|p| p.rate_limit_status())
            .collect()
    }

    /// Stored call counts per provider, including those of earlier runs.
    pub async fn provider_usage(&self) -> Result<Vec<ProviderUsage>> {
        let today = Utc::now().date_naive();
        let recent = self
            .store
            .usage_since(today - Duration::days(USAGE_WINDOW_DAYS))
            .await?;
        let todays = self.store.usage_since(today).await?;
        Ok(self
            .refresher
            .resolver()
            .providers()
            .iter()
            .map(|p| p.id())
            .map(|provider| ProviderUsage {
                provider,
                recent: recent.get(&provider).copied().unwrap_or_default(),
                today: todays.get(&provider).copied().unwrap_or_default(),
            })
            .collect())
    }

    pub async fn report(&self) -> Result<Report> {
        let stocks = self.store.list_all().await?;
        Ok(Report {
            generated_at: Utc::now(),
            snapshot: compute_snapshot(&stocks),
            sectors: compute_sector_summary(&stocks),
            stocks,
            providers: self.provider_status(),
            usage: self.provider_usage().await?,
        })
    }

    /// Aligns the store with the configured universe: drops symbols no longer
    /// listed and seeds placeholder records for new ones.
    pub async fn reinitialize(&self) -> Result<Reinitialized> {
        let stored: HashSet<String> = self
            .store
            .list_all()
            .await?
            .into_iter()
            .map(|r| r.symbol)
            .collect();
        let wanted: HashSet<&String> = self.symbols.iter().collect();

        let mut result = Reinitialized::default();
        for symbol in &stored {
            if !wanted.contains(symbol) {
                self.store.remove(symbol).await?;
                result.removed.push(symbol.clone());
            }
        }
        let now = Utc::now();
        for symbol in &self.symbols {
            if !stored.contains(symbol) {
                self.store
                    .upsert(&StockRecord::degraded(symbol, now))
                    .await?;
                result.added.push(symbol.clone());
            }
        }
        result.removed.sort();

        info!(
            "Reinitialized store: {} added, {} removed",
            result.added.len(),
            result.removed.len()
        );
        Ok(result)
    }
}
