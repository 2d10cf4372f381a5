use super::ui;
use crate::core::analytics::RecordFilter;
use crate::core::dashboard::Dashboard;
use crate::core::model::StockRecord;
use anyhow::Result;
use comfy_table::Cell;

pub async fn run(dashboard: &Dashboard, filter: &RecordFilter) -> Result<()> {
    let records = dashboard.stocks(filter).await?;
    if records.is_empty() {
        println!("No stored stocks match. Run `stockboard refresh` first.");
        return Ok(());
    }
    println!("{}", display_stocks(&records));
    Ok(())
}

pub fn display_stocks(records: &[StockRecord]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Symbol"),
        ui::header_cell("Name"),
        ui::header_cell("Price"),
        ui::header_cell("Change %"),
        ui::header_cell("Market Cap"),
        ui::header_cell("Sector"),
        ui::header_cell("Source"),
    ]);

    for record in records {
        let change = if record.has_price() {
            ui::change_cell(record.change_percent)
        } else {
            ui::no_data_cell()
        };
        table.add_row(vec![
            Cell::new(&record.symbol),
            Cell::new(&record.name),
            ui::price_cell(record),
            change,
            ui::market_cap_cell(record.market_cap),
            Cell::new(&record.sector),
            Cell::new(&record.source),
        ]);
    }

    format!("{table}\n\n{} stocks", records.len())
}
