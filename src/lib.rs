pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::analytics::RecordFilter;
use crate::core::config::AppConfig;
use crate::core::dashboard::Dashboard;
use anyhow::Result;
use std::path::PathBuf;
use tracing::{debug, info};

pub enum AppCommand {
    Refresh,
    Quote { symbol: String },
    List(RecordFilter),
    Summary,
    Status,
    Export { path: PathBuf },
    Reinit,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("stockboard starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let dashboard = Dashboard::from_config(&config)?;

    match command {
        AppCommand::Refresh => cli::refresh::run(&dashboard).await,
        AppCommand::Quote { symbol } => cli::quote::run(&dashboard, &symbol).await,
        AppCommand::List(filter) => cli::list::run(&dashboard, &filter).await,
        AppCommand::Summary => cli::summary::run(&dashboard).await,
        AppCommand::Status => cli::status::run(&dashboard).await,
        AppCommand::Export { path } => cli::export::run(&dashboard, &path).await,
        AppCommand::Reinit => cli::reinit::run(&dashboard).await,
    }
}
