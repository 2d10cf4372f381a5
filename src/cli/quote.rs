use super::ui;
use crate::core::dashboard::Dashboard;
use crate::core::model::StockRecord;
use anyhow::Result;
use comfy_table::Cell;

/// Refreshes one symbol on demand and prints it.
pub async fn run(dashboard: &Dashboard, symbol: &str) -> Result<()> {
    let pb = ui::new_progress_bar(1, true);
    pb.set_message(format!("Fetching {}...", symbol.to_uppercase()));
    let record = dashboard.refresh_one(symbol).await;
    pb.finish_and_clear();
    let record = record?;

    // The stored record carries the history kept from earlier refreshes.
    let record = if dashboard.is_configured(symbol) {
        dashboard.stock(symbol).await?.unwrap_or(record)
    } else {
        record
    };
    println!("{}", display_record(&record));
    Ok(())
}

pub fn display_record(record: &StockRecord) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Attribute"), ui::header_cell("Value")]);

    let change = if record.has_price() {
        ui::change_cell(record.change_percent)
    } else {
        ui::no_data_cell()
    };
    let rows = vec![
        (Cell::new("Price"), ui::price_cell(record)),
        (Cell::new("Change"), Cell::new(format!("{:+.2}", record.change))),
        (Cell::new("Change %"), change),
        (Cell::new("Volume"), Cell::new(record.volume)),
        (Cell::new("Market Cap"), ui::market_cap_cell(record.market_cap)),
        (Cell::new("Category"), Cell::new(record.cap_category())),
        (Cell::new("Sector"), Cell::new(&record.sector)),
        (Cell::new("Industry"), Cell::new(&record.industry)),
        (Cell::new("Country"), Cell::new(&record.country)),
        (Cell::new("Exchange"), Cell::new(&record.exchange)),
        (Cell::new("Source"), Cell::new(&record.source)),
        (
            Cell::new("Updated"),
            Cell::new(record.timestamp.format("%Y-%m-%d %H:%M UTC")),
        ),
    ];
    for (label, value) in rows {
        table.add_row(vec![label, value]);
    }

    let mut output = format!(
        "{} {}\n\n",
        ui::style_text(&record.symbol, ui::StyleType::Title),
        ui::style_text(&record.name, ui::StyleType::Subtle)
    );
    output.push_str(&table.to_string());

    match (record.historical.first(), record.historical.last()) {
        (Some(first), Some(last)) => {
            let growth = (last.close / first.close - 1.0) * 100.0;
            output.push_str(&format!(
                "\n\nHistory: {} closes from {} to {} ({:+.2}%)",
                record.historical.len(),
                first.date,
                last.date,
                growth
            ));
        }
        _ => output.push_str(&format!(
            "\n\n{}",
            ui::style_text("History: no data", ui::StyleType::Subtle)
        )),
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::PricePoint;
    use chrono::{NaiveDate, Utc};

    #[test]
    fn test_degraded_record_shows_no_data() {
        let output = display_record(&StockRecord::degraded("ZZZ", Utc::now()));
        assert!(output.contains("no data"));
        assert!(output.contains("History: no data"));
    }

    #[test]
    fn test_history_range() {
        let mut record = StockRecord::degraded("AAPL", Utc::now());
        record.price = 200.0;
        record.historical = vec![
            PricePoint {
                date: NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(),
                close: 100.0,
            },
            PricePoint {
                date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                close: 150.0,
            },
        ];
        let output = display_record(&record);
        assert!(output.contains("2 closes from 2020-01-02 to 2024-01-02 (+50.00%)"));
    }
}
