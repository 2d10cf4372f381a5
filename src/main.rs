use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use stockboard::core::analytics::{RecordFilter, StatusFilter};
use stockboard::core::log::init_logging;
use stockboard::core::model::CapCategory;
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for stockboard::AppCommand {
    fn from(cmd: Commands) -> stockboard::AppCommand {
        match cmd {
            Commands::Refresh => stockboard::AppCommand::Refresh,
            Commands::Quote { symbol } => stockboard::AppCommand::Quote { symbol },
            Commands::List {
                query,
                sector,
                min_cap,
                failed,
                succeeded,
            } => stockboard::AppCommand::List(RecordFilter {
                query,
                sector,
                min_cap,
                status: match (failed, succeeded) {
                    (true, _) => StatusFilter::Failed,
                    (false, true) => StatusFilter::Succeeded,
                    (false, false) => StatusFilter::All,
                },
            }),
            Commands::Summary => stockboard::AppCommand::Summary,
            Commands::Status => stockboard::AppCommand::Status,
            Commands::Export { path } => stockboard::AppCommand::Export { path },
            Commands::Reinit => stockboard::AppCommand::Reinit,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Fetch quotes and history for every configured symbol
    Refresh,
    /// Fetch and show a single symbol
    Quote { symbol: String },
    /// List stored stocks
    List {
        /// Match symbol or name, ignoring case
        #[arg(short, long)]
        query: Option<String>,
        /// Only stocks in this sector
        #[arg(short, long)]
        sector: Option<String>,
        /// Smallest market cap category: micro, small, mid, large or mega
        #[arg(long)]
        min_cap: Option<CapCategory>,
        /// Only stocks no provider could price
        #[arg(long, conflicts_with = "succeeded")]
        failed: bool,
        /// Only stocks with a price
        #[arg(long)]
        succeeded: bool,
    },
    /// Display portfolio and sector summaries
    Summary,
    /// Display provider rate limit usage
    Status,
    /// Export the dashboard report as JSON
    Export { path: PathBuf },
    /// Align stored stocks with the configured symbols
    Reinit,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => stockboard::cli::setup::setup(),
        Some(cmd) => stockboard::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
