use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use mandi::cli::Output;
use mandi::core::PredictError;
use mandi::core::features::HISTORY_WEEKS;
use mandi::core::log::init_logging;
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

    /// Print results as JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for mandi::AppCommand {
    fn from(cmd: Commands) -> mandi::AppCommand {
        match cmd {
            Commands::Health => mandi::AppCommand::Health,
            Commands::Predict { market, days } => mandi::AppCommand::Predict {
                market,
                horizon_days: days,
            },
            Commands::Markets => mandi::AppCommand::Markets,
            Commands::History { market, weeks } => mandi::AppCommand::History { market, weeks },
            Commands::Batch { markets, days } => mandi::AppCommand::Batch {
                markets,
                horizon_days: days,
            },
            Commands::Scenarios { market } => mandi::AppCommand::Scenarios { market },
            Commands::Load { path } => mandi::AppCommand::Load { path },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Check that the price store and model are available
    Health,
    /// Predict the price of a market some days ahead
    Predict {
        market: String,
        /// Days ahead of the latest observation
        #[arg(short, long, default_value_t = 7, allow_negative_numbers = true,
              value_parser = clap::value_parser!(i64).range(-3650..=3650))]
        days: i64,
    },
    /// List markets with price data
    Markets,
    /// Show recent weekly prices of a market
    History {
        market: String,
        /// Number of most recent weeks
        #[arg(short, long, default_value_t = HISTORY_WEEKS)]
        weeks: usize,
    },
    /// Predict several markets at once
    Batch {
        #[arg(required = true)]
        markets: Vec<String>,
        /// Days ahead of each market's latest observation
        #[arg(short, long, default_value_t = 7, allow_negative_numbers = true,
              value_parser = clap::value_parser!(i64).range(-3650..=3650))]
        days: i64,
    },
    /// Predict a market at a fixed set of horizons
    Scenarios { market: String },
    /// Import weekly prices from a CSV file
    Load { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let output = if cli.json { Output::Json } else { Output::Table };
    let result = match cli.command {
        Some(Commands::Setup) => mandi::cli::setup::setup(),
        Some(cmd) => mandi::run_command(cmd.into(), cli.config_path.as_deref(), output).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        match e.downcast_ref::<PredictError>() {
            Some(predict_error) if predict_error.is_not_found() => {
                tracing::warn!(error = %e, "No price data");
            }
            _ => tracing::error!(error = %e, "Application failed"),
        }
    }
    result
}
