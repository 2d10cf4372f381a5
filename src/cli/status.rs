use super::ui;
use crate::core::dashboard::{Dashboard, ProviderUsage, USAGE_WINDOW_DAYS};
use crate::core::provider::RateLimitStatus;
use anyhow::Result;
use comfy_table::{Cell, CellAlignment};

pub async fn run(dashboard: &Dashboard) -> Result<()> {
    println!("{}", display_usage(&dashboard.provider_usage().await?));

    let stocks = dashboard.stocks(&Default::default()).await?;
    match stocks.iter().map(|r| r.timestamp).max() {
        Some(latest) => println!(
            "\n{} stored stocks, last updated {}",
            stocks.len(),
            latest.format("%Y-%m-%d %H:%M UTC")
        ),
        None => println!("\nNo stored stocks yet."),
    }
    Ok(())
}

/// Stored provider usage, covering earlier runs.
pub fn display_usage(usage: &[ProviderUsage]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Provider"),
        ui::header_cell(&format!("Requests ({USAGE_WINDOW_DAYS}d)")),
        ui::header_cell("Successful"),
        ui::header_cell("Success Rate"),
        ui::header_cell("Requests (today)"),
    ]);
    for entry in usage {
        table.add_row(vec![
            Cell::new(entry.provider),
            Cell::new(entry.recent.requests).set_alignment(CellAlignment::Right),
            Cell::new(entry.recent.successes).set_alignment(CellAlignment::Right),
            if entry.recent.requests == 0 {
                ui::no_data_cell()
            } else {
                Cell::new(format!("{:.1}%", entry.recent.success_rate() * 100.0))
                    .set_alignment(CellAlignment::Right)
            },
            Cell::new(entry.today.requests).set_alignment(CellAlignment::Right),
        ]);
    }
    format!(
        "{}\n\n{table}",
        ui::style_text("Provider Usage", ui::StyleType::Title)
    )
}

/// Rate limiter budget of this process.
pub fn display_status(statuses: &[RateLimitStatus]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Provider"),
        ui::header_cell("Requests"),
        ui::header_cell("Rejected"),
        ui::header_cell("Left (minute)"),
        ui::header_cell("Left (today)"),
    ]);
    for status in statuses {
        table.add_row(vec![
            Cell::new(status.provider),
            Cell::new(status.requests_made).set_alignment(CellAlignment::Right),
            Cell::new(status.requests_rejected).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.0}", status.remaining_this_minute))
                .set_alignment(CellAlignment::Right),
            ui::format_optional_cell(status.remaining_today, |n| n.to_string()),
        ]);
    }
    format!(
        "{}\n\n{table}",
        ui::style_text("Providers", ui::StyleType::Title)
    )
}
