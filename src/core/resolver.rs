//! Per-symbol fallback across providers.
//!
//! Providers are tried in priority order and the first usable quote wins.
//! History is then fetched from the winning provider only.

use crate::core::config::{AppConfig, RetryConfig};
use crate::core::model::{ProviderId, StockRecord, UNKNOWN};
use crate::core::normalize::{history_start, normalize_history, normalize_quote};
use crate::core::provider::{ProviderError, QuoteProvider};
use crate::providers::util::with_retry;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStage {
    Quote,
    History,
}

/// One failed provider call in a fallback chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub provider: ProviderId,
    pub stage: AttemptStage,
    pub error: ProviderError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Resolved,
    Exhausted,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchOutcome {
    pub symbol: String,
    /// Provider whose quote was accepted.
    pub provider: Option<ProviderId>,
    pub record: StockRecord,
    pub attempts: Vec<Attempt>,
    pub status: OutcomeStatus,
}

impl FetchOutcome {
    pub fn is_resolved(&self) -> bool {
        self.status == OutcomeStatus::Resolved
    }
}

pub struct Resolver {
    providers: HashMap<ProviderId, Arc<dyn QuoteProvider>>,
    priority: Vec<ProviderId>,
    overrides: HashMap<String, Vec<ProviderId>>,
    sectors: HashMap<String, String>,
    retry: RetryConfig,
    history_years: u32,
}

impl Resolver {
    pub fn new(providers: Vec<Arc<dyn QuoteProvider>>, priority: Vec<ProviderId>) -> Self {
        Resolver {
            providers: providers.into_iter().map(|p| (p.id(), p)).collect(),
            priority,
            overrides: HashMap::new(),
            sectors: HashMap::new(),
            retry: RetryConfig::default(),
            history_years: 5,
        }
    }

    pub fn from_config(config: &AppConfig, providers: Vec<Arc<dyn QuoteProvider>>) -> Self {
        Self::new(providers, config.priority.clone())
            .with_overrides(config.priority_overrides())
            .with_sectors(config.sector_overrides())
            .with_retry(config.retry.clone())
            .with_history_years(config.history_years)
    }

    pub fn with_overrides(mut self, overrides: HashMap<String, Vec<ProviderId>>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Sectors to use where the provider reports none.
    pub fn with_sectors(mut self, sectors: HashMap<String, String>) -> Self {
        self.sectors = sectors;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_history_years(mut self, years: u32) -> Self {
        self.history_years = years;
        self
    }

    /// Fallback chain for `symbol`.
    pub fn chain_for(&self, symbol: &str) -> &[ProviderId] {
        self.overrides
            .get(symbol)
            .map(Vec::as_slice)
            .unwrap_or(&self.priority)
    }

    /// Providers in id order.
    pub fn providers(&self) -> Vec<Arc<dyn QuoteProvider>> {
        let mut providers: Vec<_> = self.providers.values().cloned().collect();
        providers.sort_by_key(|p| p.id());
        providers
    }

    fn apply_sector(&self, record: &mut StockRecord) {
        if record.sector == UNKNOWN {
            if let Some(sector) = self.sectors.get(&record.symbol) {
                record.sector = sector.clone();
            }
        }
    }

    pub async fn resolve(&self, symbol: &str) -> FetchOutcome {
        self.resolve_with_cancel(symbol, &CancellationToken::new())
            .await
    }

    /// Resolves `symbol`, making no new provider calls once `cancel` fires.
    ///
    /// A quote that arrived before the cancellation still resolves the
    /// symbol. Its skipped history call is recorded as a cancelled attempt.
    #[instrument(name = "Resolve", skip(self, cancel), fields(symbol = %symbol))]
    pub async fn resolve_with_cancel(
        &self,
        symbol: &str,
        cancel: &CancellationToken,
    ) -> FetchOutcome {
        let mut attempts = Vec::new();

        for &id in self.chain_for(symbol) {
            if cancel.is_cancelled() {
                return cancelled(symbol, attempts);
            }
            let Some(provider) = self.providers.get(&id) else {
                debug!("Provider {} is not configured, skipping", id);
                continue;
            };

            let quote = with_retry(
                || provider.fetch_quote(symbol),
                self.retry.attempts,
                self.retry.delay_ms,
                cancel,
            )
            .await;

            let mut record = match quote.and_then(|raw| normalize_quote(&raw)) {
                Ok(record) => record,
                Err(error) => {
                    debug!("{} failed for {}: {}", id, symbol, error);
                    attempts.push(Attempt {
                        provider: id,
                        stage: AttemptStage::Quote,
                        error,
                    });
                    continue;
                }
            };

            // A quote already in hand is kept; only the history call is skipped.
            let history = if cancel.is_cancelled() {
                Err(ProviderError::Cancelled { provider: id })
            } else {
                with_retry(
                    || provider.fetch_history(symbol, self.history_years),
                    self.retry.attempts,
                    self.retry.delay_ms,
                    cancel,
                )
                .await
            };
            match history {
                Ok(bars) => {
                    let start = history_start(record.timestamp.date_naive(), self.history_years);
                    record.historical = normalize_history(&bars, start);
                }
                Err(error) => {
                    if matches!(error, ProviderError::Cancelled { .. }) {
                        debug!("History for {} skipped, cancelled", symbol);
                    } else {
                        warn!("History unavailable for {} from {}: {}", symbol, id, error);
                    }
                    attempts.push(Attempt {
                        provider: id,
                        stage: AttemptStage::History,
                        error,
                    });
                }
            }

            self.apply_sector(&mut record);
            info!(
                "Resolved {} via {} after {} failed attempt(s)",
                symbol,
                id,
                attempts.len()
            );
            return FetchOutcome {
                symbol: symbol.to_string(),
                provider: Some(id),
                record,
                attempts,
                status: OutcomeStatus::Resolved,
            };
        }

        if cancel.is_cancelled() {
            return cancelled(symbol, attempts);
        }

        warn!(
            "All providers failed for {} ({} attempt(s))",
            symbol,
            attempts.len()
        );
        let mut record = StockRecord::degraded(symbol, Utc::now());
        self.apply_sector(&mut record);
        FetchOutcome {
            symbol: symbol.to_string(),
            provider: None,
            record,
            attempts,
            status: OutcomeStatus::Exhausted,
        }
    }
}

fn cancelled(symbol: &str, attempts: Vec<Attempt>) -> FetchOutcome {
    debug!("Resolution of {} cancelled", symbol);
    FetchOutcome {
        symbol: symbol.to_string(),
        provider: None,
        record: StockRecord::degraded(symbol, Utc::now()),
        attempts,
        status: OutcomeStatus::Cancelled,
    }
}
