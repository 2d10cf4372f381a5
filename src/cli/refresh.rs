use super::{status, ui};
use crate::core::dashboard::Dashboard;
use crate::core::refresh::RefreshReport;
use crate::core::resolver::{Attempt, AttemptStage, FetchOutcome};
use anyhow::Result;
use comfy_table::Cell;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub async fn run(dashboard: &Dashboard) -> Result<()> {
    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, finishing in-flight requests");
                cancel.cancel();
            }
        })
    };

    let pb = ui::new_progress_bar(dashboard.symbols().len() as u64, true);
    pb.set_message("Refreshing quotes...");
    let report = dashboard
        .refresh_all(&cancel, &|outcome: &FetchOutcome| {
            pb.set_message(outcome.symbol.clone());
            pb.inc(1);
        })
        .await;
    pb.finish_and_clear();
    ctrl_c.abort();

    let report = report?;
    println!("{}", display_report(&report));
    println!();
    println!("{}", status::display_status(&dashboard.provider_status()));
    Ok(())
}

fn describe(attempt: &Attempt) -> String {
    match attempt.stage {
        AttemptStage::Quote => attempt.error.to_string(),
        AttemptStage::History => format!("history: {}", attempt.error),
    }
}

pub fn display_report(report: &RefreshReport) -> String {
    let mut output = format!(
        "{}\n\n",
        ui::style_text("Refresh", ui::StyleType::Title)
    );

    let failures: Vec<_> = report.failures().collect();
    if !failures.is_empty() {
        let mut table = ui::new_styled_table();
        table.set_header(vec![ui::header_cell("Symbol"), ui::header_cell("Attempts")]);
        for outcome in failures {
            let trail = outcome
                .attempts
                .iter()
                .map(describe)
                .collect::<Vec<_>>()
                .join("\n");
            table.add_row(vec![Cell::new(&outcome.symbol), Cell::new(trail)]);
        }
        output.push_str(&table.to_string());
        output.push_str("\n\n");
    }

    let by_provider = report
        .provider_successes
        .iter()
        .map(|(provider, count)| format!("{provider}: {count}"))
        .collect::<Vec<_>>()
        .join(", ");
    let rate_style = if report.snapshot.success_rate >= crate::core::analytics::SUCCESS_RATE_TARGET {
        ui::StyleType::TotalValue
    } else {
        ui::StyleType::Error
    };
    output.push_str(&format!(
        "{} {} of {} symbols ({})\n",
        ui::style_text("Success rate:", ui::StyleType::TotalLabel),
        ui::style_text(
            &format!("{:.1}%", report.snapshot.success_rate * 100.0),
            rate_style
        ),
        report.snapshot.total_stocks,
        if by_provider.is_empty() { "none resolved".to_string() } else { by_provider },
    ));
    if report.cancelled {
        output.push_str(&ui::style_text(
            "Refresh was interrupted; unfinished symbols keep their previous data.",
            ui::StyleType::Error,
        ));
    }
    output
}
