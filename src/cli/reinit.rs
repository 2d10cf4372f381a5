use crate::core::dashboard::Dashboard;
use anyhow::Result;

pub async fn run(dashboard: &Dashboard) -> Result<()> {
    let result = dashboard.reinitialize().await?;
    if result.added.is_empty() && result.removed.is_empty() {
        println!("Store already matches the configured symbols.");
        return Ok(());
    }
    if !result.added.is_empty() {
        println!("Added: {}", result.added.join(", "));
    }
    if !result.removed.is_empty() {
        println!("Removed: {}", result.removed.join(", "));
    }
    Ok(())
}
