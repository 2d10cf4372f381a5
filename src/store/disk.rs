use crate::core::model::{PricePoint, ProviderId, StockRecord, UsageCount};
use crate::core::store::StockStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

const STOCKS_PARTITION: &str = "stocks";
const HISTORY_PARTITION: &str = "history";
const USAGE_PARTITION: &str = "usage";

#[derive(Serialize, Deserialize)]
struct UsageEntry {
    provider: ProviderId,
    day: NaiveDate,
    count: UsageCount,
}

/// Store backed by a fjall keyspace. Records and history series live in
/// separate partitions as JSON values keyed by symbol. Provider usage is
/// kept per provider and day.
pub struct DiskStore {
    keyspace: Keyspace,
    stocks: PartitionHandle,
    history: PartitionHandle,
    usage: PartitionHandle,
}

impl DiskStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create data directory: {}", path.display()))?;

        let keyspace = fjall::Config::new(path)
            .open()
            .with_context(|| format!("Failed to open store at {}", path.display()))?;
        let stocks = keyspace.open_partition(STOCKS_PARTITION, PartitionCreateOptions::default())?;
        let history =
            keyspace.open_partition(HISTORY_PARTITION, PartitionCreateOptions::default())?;
        let usage = keyspace.open_partition(USAGE_PARTITION, PartitionCreateOptions::default())?;
        debug!("Opened store at {}", path.display());

        Ok(Self {
            keyspace,
            stocks,
            history,
            usage,
        })
    }

    fn read_history(&self, symbol: &str) -> Result<Vec<PricePoint>> {
        match self.history.get(symbol)? {
            Some(value) => serde_json::from_slice(&value)
                .with_context(|| format!("Corrupt history for {symbol}")),
            None => Ok(Vec::new()),
        }
    }

    fn decode(&self, value: &[u8]) -> Result<StockRecord> {
        let mut record: StockRecord =
            serde_json::from_slice(value).context("Corrupt stock record")?;
        record.historical = self.read_history(&record.symbol)?;
        Ok(record)
    }
}

#[async_trait]
impl StockStore for DiskStore {
    async fn upsert(&self, record: &StockRecord) -> Result<()> {
        let mut stored = record.clone();
        stored.historical = Vec::new();
        self.stocks
            .insert(record.symbol.as_str(), serde_json::to_vec(&stored)?)?;
        self.keyspace.persist(PersistMode::Buffer)?;
        debug!("Store UPSERT for {}", record.symbol);
        Ok(())
    }

    async fn append_history(&self, symbol: &str, points: &[PricePoint]) -> Result<()> {
        self.history.insert(symbol, serde_json::to_vec(points)?)?;
        self.keyspace.persist(PersistMode::Buffer)?;
        debug!("Store HISTORY for {} ({} points)", symbol, points.len());
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<StockRecord>> {
        // Keys iterate in byte order, which orders records by symbol.
        self.stocks
            .iter()
            .map(|entry| {
                let (_, value) = entry?;
                self.decode(&value)
            })
            .collect()
    }

    async fn get(&self, symbol: &str) -> Result<Option<StockRecord>> {
        self.stocks
            .get(symbol)?
            .map(|value| self.decode(&value))
            .transpose()
    }

    async fn remove(&self, symbol: &str) -> Result<bool> {
        let existed = self.stocks.contains_key(symbol)?;
        self.stocks.remove(symbol)?;
        self.history.remove(symbol)?;
        self.keyspace.persist(PersistMode::Buffer)?;
        debug!("Store REMOVE for {}", symbol);
        Ok(existed)
    }

    async fn record_usage(
        &self,
        provider: ProviderId,
        day: NaiveDate,
        count: UsageCount,
    ) -> Result<()> {
        let key = format!("{provider}/{day}");
        let mut entry: UsageEntry = match self.usage.get(key.as_str())? {
            Some(value) => serde_json::from_slice(&value)
                .with_context(|| format!("Corrupt usage entry {key}"))?,
            None => UsageEntry {
                provider,
                day,
                count: UsageCount::default(),
            },
        };
        entry.count.add(count);
        self.usage.insert(key.as_str(), serde_json::to_vec(&entry)?)?;
        self.keyspace.persist(PersistMode::Buffer)?;
        Ok(())
    }

    async fn usage_since(&self, since: NaiveDate) -> Result<BTreeMap<ProviderId, UsageCount>> {
        let mut totals: BTreeMap<ProviderId, UsageCount> = BTreeMap::new();
        for item in self.usage.iter() {
            let (_, value) = item?;
            let entry: UsageEntry =
                serde_json::from_slice(&value).context("Corrupt usage entry")?;
            if entry.day >= since {
                totals.entry(entry.provider).or_default().add(entry.count);
            }
        }
        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use tempfile::tempdir;

    fn record(symbol: &str, price: f64) -> StockRecord {
        let mut record =
            StockRecord::degraded(symbol, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        record.price = price;
        record.failed = price <= 0.0;
        record
    }

    #[tokio::test]
    async fn test_records_survive_reopen() -> Result<()> {
        let dir = tempdir()?;
        let points = vec![PricePoint {
            date: NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            close: 180.5,
        }];

        {
            let store = DiskStore::open(dir.path())?;
            store.upsert(&record("AAPL", 181.0)).await?;
            store.upsert(&record("ZZZ", 0.0)).await?;
            store.append_history("AAPL", &points).await?;
        }

        let store = DiskStore::open(dir.path())?;
        let all = store.list_all().await?;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].symbol, "AAPL");
        assert_eq!(all[0].historical, points);
        assert_eq!(all[1].symbol, "ZZZ");
        assert!(all[1].failed);
        Ok(())
    }

    #[tokio::test]
    async fn test_upsert_overwrites_and_remove_clears_history() -> Result<()> {
        let dir = tempdir()?;
        let store = DiskStore::open(dir.path())?;

        store.upsert(&record("MSFT", 400.0)).await?;
        store.upsert(&record("MSFT", 410.0)).await?;
        store
            .append_history(
                "MSFT",
                &[PricePoint {
                    date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                    close: 370.0,
                }],
            )
            .await?;
        assert_eq!(store.get("MSFT").await?.map(|r| r.price), Some(410.0));

        assert!(store.remove("MSFT").await?);
        assert!(store.get("MSFT").await?.is_none());
        assert!(store.read_history("MSFT")?.is_empty());
        assert!(!store.remove("MSFT").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_usage_survives_reopen() -> Result<()> {
        let dir = tempdir()?;
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let before = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        {
            let store = DiskStore::open(dir.path())?;
            let calls = UsageCount {
                requests: 2,
                successes: 1,
            };
            store
                .record_usage(ProviderId::AlphaVantage, day, calls)
                .await?;
            store
                .record_usage(ProviderId::AlphaVantage, day, calls)
                .await?;
            store
                .record_usage(ProviderId::AlphaVantage, before, calls)
                .await?;
        }

        let store = DiskStore::open(dir.path())?;
        let usage = store.usage_since(day).await?;
        assert_eq!(
            usage[&ProviderId::AlphaVantage],
            UsageCount {
                requests: 4,
                successes: 2
            }
        );
        assert_eq!(usage.len(), 1);
        Ok(())
    }
}
