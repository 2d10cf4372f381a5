use super::ui;
use crate::core::dashboard::Dashboard;
use crate::core::model::{PortfolioSnapshot, SectorSummary};
use anyhow::Result;
use comfy_table::{Cell, CellAlignment};
use std::collections::BTreeMap;

pub async fn run(dashboard: &Dashboard) -> Result<()> {
    let snapshot = dashboard.snapshot().await?;
    let sectors = dashboard.sector_summary().await?;
    println!("{}", display_snapshot(&snapshot));
    ui::print_separator();
    println!("{}", display_sectors(&sectors));
    Ok(())
}

pub fn display_snapshot(snapshot: &PortfolioSnapshot) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Metric"), ui::header_cell("Value")]);
    table.add_row(vec![
        Cell::new("Total Stocks"),
        Cell::new(snapshot.total_stocks).set_alignment(CellAlignment::Right),
    ]);
    table.add_row(vec![
        Cell::new("Success Rate"),
        Cell::new(format!("{:.1}%", snapshot.success_rate * 100.0))
            .set_alignment(CellAlignment::Right),
    ]);
    table.add_row(vec![
        Cell::new("Total Market Cap"),
        ui::market_cap_cell(snapshot.total_market_cap),
    ]);
    table.add_row(vec![
        Cell::new("Average Change"),
        Cell::new(format!("{:+.2}", snapshot.avg_change)).set_alignment(CellAlignment::Right),
    ]);

    format!(
        "{}\n\n{table}",
        ui::style_text("Portfolio", ui::StyleType::Title)
    )
}

pub fn display_sectors(sectors: &BTreeMap<String, SectorSummary>) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Sector"),
        ui::header_cell("Count"),
        ui::header_cell("Avg Change"),
        ui::header_cell("Market Cap"),
    ]);
    for (sector, summary) in sectors {
        table.add_row(vec![
            Cell::new(sector),
            Cell::new(summary.count).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:+.2}", summary.avg_change)).set_alignment(CellAlignment::Right),
            ui::market_cap_cell(summary.total_market_cap),
        ]);
    }

    format!(
        "{}\n\n{table}",
        ui::style_text("Sectors", ui::StyleType::Title)
    )
}
