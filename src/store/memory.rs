use crate::core::model::{PricePoint, ProviderId, StockRecord, UsageCount};
use crate::core::store::StockStore;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Default)]
struct Tables {
    stocks: BTreeMap<String, StockRecord>,
    history: HashMap<String, Vec<PricePoint>>,
    usage: HashMap<(ProviderId, NaiveDate), UsageCount>,
}

/// In-memory store, used for tests and when no data directory is wanted.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StockStore for MemoryStore {
    async fn upsert(&self, record: &StockRecord) -> Result<()> {
        let mut tables = self.inner.lock().await;
        let mut record = record.clone();
        record.historical = Vec::new();
        debug!("Store UPSERT for {}", record.symbol);
        tables.stocks.insert(record.symbol.clone(), record);
        Ok(())
    }

    async fn append_history(&self, symbol: &str, points: &[PricePoint]) -> Result<()> {
        let mut tables = self.inner.lock().await;
        debug!("Store HISTORY for {} ({} points)", symbol, points.len());
        tables.history.insert(symbol.to_string(), points.to_vec());
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<StockRecord>> {
        let tables = self.inner.lock().await;
        Ok(tables
            .stocks
            .values()
            .map(|record| with_history(record, &tables.history))
            .collect())
    }

    async fn get(&self, symbol: &str) -> Result<Option<StockRecord>> {
        let tables = self.inner.lock().await;
        Ok(tables
            .stocks
            .get(symbol)
            .map(|record| with_history(record, &tables.history)))
    }

    async fn remove(&self, symbol: &str) -> Result<bool> {
        let mut tables = self.inner.lock().await;
        tables.history.remove(symbol);
        let existed = tables.stocks.remove(symbol).is_some();
        debug!("Store REMOVE for {}", symbol);
        Ok(existed)
    }

    async fn record_usage(
        &self,
        provider: ProviderId,
        day: NaiveDate,
        count: UsageCount,
    ) -> Result<()> {
        let mut tables = self.inner.lock().await;
        tables.usage.entry((provider, day)).or_default().add(count);
        Ok(())
    }

    async fn usage_since(&self, since: NaiveDate) -> Result<BTreeMap<ProviderId, UsageCount>> {
        let tables = self.inner.lock().await;
        let mut totals: BTreeMap<ProviderId, UsageCount> = BTreeMap::new();
        for ((provider, day), count) in &tables.usage {
            if *day >= since {
                totals.entry(*provider).or_default().add(*count);
            }
        }
        Ok(totals)
    }
}

fn with_history(record: &StockRecord, history: &HashMap<String, Vec<PricePoint>>) -> StockRecord {
    let mut record = record.clone();
    record.historical = history.get(&record.symbol).cloned().unwrap_or_default();
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn point(day: u32, close: f64) -> PricePoint {
        PricePoint {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            close,
        }
    }

    #[tokio::test]
    async fn test_upsert_overwrites_by_symbol() {
        let store = MemoryStore::new();
        let mut record = StockRecord::degraded("AAPL", Utc::now());
        store.upsert(&record).await.unwrap();

        record.price = 190.0;
        record.failed = false;
        store.upsert(&record).await.unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].price, 190.0);
    }

    #[tokio::test]
    async fn test_history_is_replaced_and_attached_on_read() {
        let store = MemoryStore::new();
        let mut record = StockRecord::degraded("MSFT", Utc::now());
        // History on the record itself is not what gets stored.
        record.historical = vec![point(1, 1.0)];
        store.upsert(&record).await.unwrap();
        assert!(store.get("MSFT").await.unwrap().unwrap().historical.is_empty());

        store
            .append_history("MSFT", &[point(2, 2.0), point(3, 3.0)])
            .await
            .unwrap();
        store.append_history("MSFT", &[point(4, 4.0)]).await.unwrap();

        let stored = store.get("MSFT").await.unwrap().unwrap();
        assert_eq!(stored.historical, vec![point(4, 4.0)]);
    }

    #[tokio::test]
    async fn test_list_all_is_ordered_and_remove_deletes() {
        let store = MemoryStore::new();
        for symbol in ["MSFT", "AAPL", "GOOG"] {
            store
                .upsert(&StockRecord::degraded(symbol, Utc::now()))
                .await
                .unwrap();
        }
        let symbols: Vec<_> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.symbol)
            .collect();
        assert_eq!(symbols, vec!["AAPL", "GOOG", "MSFT"]);

        assert!(store.remove("GOOG").await.unwrap());
        assert!(!store.remove("GOOG").await.unwrap());
        assert!(store.get("GOOG").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_usage_accumulates_per_day_and_window() {
        let store = MemoryStore::new();
        let day = |d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap();
        let calls = |requests, successes| UsageCount {
            requests,
            successes,
        };
        store
            .record_usage(ProviderId::YahooFinance, day(1), calls(3, 2))
            .await
            .unwrap();
        store
            .record_usage(ProviderId::YahooFinance, day(5), calls(2, 2))
            .await
            .unwrap();
        store
            .record_usage(ProviderId::YahooFinance, day(5), calls(1, 0))
            .await
            .unwrap();
        store
            .record_usage(ProviderId::Finnhub, day(5), calls(1, 1))
            .await
            .unwrap();

        let all = store.usage_since(day(1)).await.unwrap();
        assert_eq!(all[&ProviderId::YahooFinance], calls(6, 4));
        let recent = store.usage_since(day(2)).await.unwrap();
        assert_eq!(recent[&ProviderId::YahooFinance], calls(3, 2));
        assert_eq!(recent[&ProviderId::Finnhub], calls(1, 1));
        assert!(!recent.contains_key(&ProviderId::AlphaVantage));
    }
}
