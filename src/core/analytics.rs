//! Portfolio and sector aggregates, plus record search.
//!
//! All functions are pure over the record set and recomputed on demand.

use crate::core::model::{CapCategory, PortfolioSnapshot, SectorSummary, StockRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Success rate a refresh is expected to reach. Only monitored.
pub const SUCCESS_RATE_TARGET: f64 = 0.9;

pub fn compute_snapshot(records: &[StockRecord]) -> PortfolioSnapshot {
    let priced: Vec<&StockRecord> = records.iter().filter(|r| r.has_price()).collect();

    let success_rate = if records.is_empty() {
        0.0
    } else {
        priced.len() as f64 / records.len() as f64
    };

    PortfolioSnapshot {
        total_stocks: records.len(),
        success_rate,
        total_market_cap: records.iter().map(|r| r.market_cap).sum(),
        avg_change: mean(priced.iter().map(|r| r.change)),
    }
}

/// Groups records by sector. Every record counts toward its sector; the
/// average change only covers records with a price.
pub fn compute_sector_summary(records: &[StockRecord]) -> BTreeMap<String, SectorSummary> {
    let mut groups: BTreeMap<&str, Vec<&StockRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.sector.as_str()).or_default().push(record);
    }

    groups
        .into_iter()
        .map(|(sector, members)| {
            let summary = SectorSummary {
                count: members.len(),
                avg_change: mean(
                    members
                        .iter()
                        .filter(|r| r.has_price())
                        .map(|r| r.change),
                ),
                total_market_cap: members.iter().map(|r| r.market_cap).sum(),
            };
            (sector.to_string(), summary)
        })
        .collect()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    All,
    Failed,
    Succeeded,
}

/// Criteria for [`filter_records`]. Empty criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordFilter {
    /// Case-insensitive substring of symbol or name.
    pub query: Option<String>,
    /// Exact sector, ignoring case.
    pub sector: Option<String>,
    pub min_cap: Option<CapCategory>,
    #[serde(default)]
    pub status: StatusFilter,
}

impl RecordFilter {
    pub fn matches(&self, record: &StockRecord) -> bool {
        if let Some(query) = self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let query = query.to_lowercase();
            if !record.symbol.to_lowercase().contains(&query)
                && !record.name.to_lowercase().contains(&query)
            {
                return false;
            }
        }
        if let Some(sector) = &self.sector {
            if !record.sector.eq_ignore_ascii_case(sector) {
                return false;
            }
        }
        if let Some(min_cap) = self.min_cap {
            if record.cap_category() < min_cap {
                return false;
            }
        }
        match self.status {
            StatusFilter::All => true,
            StatusFilter::Failed => !record.has_price(),
            StatusFilter::Succeeded => record.has_price(),
        }
    }
}

pub fn filter_records(records: &[StockRecord], filter: &RecordFilter) -> Vec<StockRecord> {
    records
        .iter()
        .filter(|r| filter.matches(r))
        .cloned()
        .collect()
}
