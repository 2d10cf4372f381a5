use crate::core::model::{PricePoint, ProviderId, StockRecord, UsageCount};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Persistence for stock records, keyed by symbol.
///
/// Quotes and history are written separately. `upsert` ignores the
/// record's `historical` field; `append_history` replaces the whole series.
/// Reads return records with their stored history attached.
#[async_trait]
pub trait StockStore: Send + Sync {
    async fn upsert(&self, record: &StockRecord) -> Result<()>;

    async fn append_history(&self, symbol: &str, points: &[PricePoint]) -> Result<()>;

    /// All records ordered by symbol.
    async fn list_all(&self) -> Result<Vec<StockRecord>>;

    async fn get(&self, symbol: &str) -> Result<Option<StockRecord>>;

    /// Deletes the record and its history. Returns whether it existed.
    async fn remove(&self, symbol: &str) -> Result<bool>;

    /// Adds `count` to the provider's tally for `day`.
    async fn record_usage(
        &self,
        provider: ProviderId,
        day: NaiveDate,
        count: UsageCount,
    ) -> Result<()>;

    /// Per-provider totals over every day from `since` on.
    async fn usage_since(&self, since: NaiveDate) -> Result<BTreeMap<ProviderId, UsageCount>>;
}
