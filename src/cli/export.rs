use crate::core::dashboard::{Dashboard, Report};
use anyhow::{Context, Result};
use std::path::Path;

/// Writes the dashboard report as pretty JSON for report generators.
pub async fn run(dashboard: &Dashboard, path: &Path) -> Result<()> {
    let report = dashboard.report().await?;
    write_report(&report, path)?;
    println!(
        "Exported {} stocks to {}",
        report.stocks.len(),
        path.display()
    );
    Ok(())
}

pub fn write_report(report: &Report, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    tracing::info!("Wrote report to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{PortfolioSnapshot, StockRecord};
    use chrono::Utc;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_write_report_round_trips() -> Result<()> {
        let report = Report {
            generated_at: Utc::now(),
            snapshot: PortfolioSnapshot {
                total_stocks: 1,
                success_rate: 0.0,
                total_market_cap: 0.0,
                avg_change: 0.0,
            },
            sectors: BTreeMap::new(),
            stocks: vec![StockRecord::degraded("ZZZ", Utc::now())],
            providers: Vec::new(),
            usage: Vec::new(),
        };
        let dir = TempDir::new()?;
        let path = dir.path().join("out").join("report.json");

        write_report(&report, &path)?;

        let read: Report = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        assert_eq!(read, report);
        Ok(())
    }
}
