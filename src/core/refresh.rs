//! Batch refresh of the symbol universe.

use crate::core::analytics::{SUCCESS_RATE_TARGET, compute_snapshot};
use crate::core::model::{PortfolioSnapshot, ProviderId, StockRecord, UsageCount};
use crate::core::provider::ProviderError;
use crate::core::resolver::{AttemptStage, FetchOutcome, OutcomeStatus, Resolver};
use crate::core::store::StockStore;
use anyhow::Result;
use chrono::Utc;
use futures::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshReport {
    pub snapshot: PortfolioSnapshot,
    pub outcomes: Vec<FetchOutcome>,
    /// Symbols each provider resolved.
    pub provider_successes: BTreeMap<ProviderId, usize>,
    pub cancelled: bool,
}

impl RefreshReport {
    pub fn failures(&self) -> impl Iterator<Item = &FetchOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Exhausted)
    }
}

pub struct Refresher {
    resolver: Arc<Resolver>,
    store: Arc<dyn StockStore>,
    concurrency: usize,
}

impl Refresher {
    pub fn new(resolver: Arc<Resolver>, store: Arc<dyn StockStore>, concurrency: usize) -> Self {
        Refresher {
            resolver,
            store,
            concurrency: concurrency.max(1),
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Resolves every symbol with at most `concurrency` in flight, persists
    /// the outcomes and summarizes the batch.
    ///
    /// `progress` is called once per finished symbol. Outcomes cut short by
    /// `cancel` are reported but not stored.
    pub async fn refresh_all(
        &self,
        symbols: &[String],
        cancel: &CancellationToken,
        progress: &(dyn Fn(&FetchOutcome) + Send + Sync),
    ) -> Result<RefreshReport> {
        info!(
            "Refreshing {} symbols with concurrency {}",
            symbols.len(),
            self.concurrency
        );

        let outcomes: Vec<FetchOutcome> = stream::iter(symbols)
            .map(|symbol| async move {
                let outcome = self.resolver.resolve_with_cancel(symbol, cancel).await;
                progress(&outcome);
                outcome
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut provider_successes = BTreeMap::new();
        let mut records = Vec::with_capacity(outcomes.len());
        for outcome in &outcomes {
            if let Err(e) = self.record_usage(outcome).await {
                warn!("Failed to record provider usage for {}: {:#}", outcome.symbol, e);
            }
            if outcome.status == OutcomeStatus::Cancelled {
                continue;
            }
            if let Some(provider) = outcome.provider {
                *provider_successes.entry(provider).or_insert(0) += 1;
            }
            if let Err(e) = self.persist(outcome).await {
                warn!("Failed to store {}: {:#}", outcome.symbol, e);
            }
            records.push(outcome.record.clone());
        }

        let snapshot = compute_snapshot(&records);
        let cancelled = cancel.is_cancelled();
        if cancelled {
            warn!(
                "Refresh cancelled after {} of {} symbols",
                records.len(),
                symbols.len()
            );
        }
        if !records.is_empty() && snapshot.success_rate < SUCCESS_RATE_TARGET {
            warn!(
                "Success rate {:.1}% is below the {:.0}% target",
                snapshot.success_rate * 100.0,
                SUCCESS_RATE_TARGET * 100.0
            );
        } else {
            info!(
                "Refresh finished: {} symbols, success rate {:.1}%",
                snapshot.total_stocks,
                snapshot.success_rate * 100.0
            );
        }

        Ok(RefreshReport {
            snapshot,
            outcomes,
            provider_successes,
            cancelled,
        })
    }

    /// Resolves a single symbol without storing it.
    pub async fn fetch_one(&self, symbol: &str) -> FetchOutcome {
        let outcome = self.resolver.resolve(symbol).await;
        if let Err(e) = self.record_usage(&outcome).await {
            warn!("Failed to record provider usage for {}: {:#}", symbol, e);
        }
        outcome
    }

    /// Resolves and stores a single symbol.
    pub async fn refresh_one(&self, symbol: &str) -> Result<StockRecord> {
        let outcome = self.fetch_one(symbol).await;
        self.persist(&outcome).await?;
        Ok(outcome.record)
    }

    async fn record_usage(&self, outcome: &FetchOutcome) -> Result<()> {
        let today = Utc::now().date_naive();
        for (provider, count) in calls_made(outcome) {
            self.store.record_usage(provider, today, count).await?;
        }
        Ok(())
    }

    /// History is only replaced when the winning provider delivered it, so a
    /// failed history fetch keeps the previous series.
    async fn persist(&self, outcome: &FetchOutcome) -> Result<()> {
        self.store.upsert(&outcome.record).await?;
        let history_failed = outcome
            .attempts
            .iter()
            .any(|a| a.stage == AttemptStage::History);
        if outcome.is_resolved() && !history_failed {
            self.store
                .append_history(&outcome.symbol, &outcome.record.historical)
                .await?;
        }
        Ok(())
    }
}

/// Provider calls behind an outcome, one per stage tried. Retries of the
/// same call are not counted separately.
fn calls_made(outcome: &FetchOutcome) -> BTreeMap<ProviderId, UsageCount> {
    let mut usage: BTreeMap<ProviderId, UsageCount> = BTreeMap::new();
    for attempt in &outcome.attempts {
        if !matches!(attempt.error, ProviderError::Cancelled { .. }) {
            usage.entry(attempt.provider).or_default().requests += 1;
        }
    }
    if let Some(provider) = outcome.provider {
        let history_failed = outcome
            .attempts
            .iter()
            .any(|a| a.provider == provider && a.stage == AttemptStage::History);
        let succeeded = if history_failed { 1 } else { 2 };
        usage.entry(provider).or_default().add(UsageCount {
            requests: succeeded,
            successes: succeeded,
        });
    }
    usage
}
