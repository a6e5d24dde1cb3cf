use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use rust_decimal::Decimal;
use transfer_rates::cli::calculate::parse_amount;
use transfer_rates::core::log::init_logging;

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

impl From<Commands> for transfer_rates::AppCommand {
    fn from(cmd: Commands) -> transfer_rates::AppCommand {
        match cmd {
            Commands::Calculate { amount } => transfer_rates::AppCommand::Calculate { amount },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Fetch transfer rates and update the results sheet
    Calculate {
        /// Amount to send (at least 1.0); prompts interactively when omitted
        #[arg(short, long, value_parser = parse_amount)]
        amount: Option<Decimal>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => transfer_rates::cli::setup::setup(),
        Some(cmd) => transfer_rates::run_command(cmd.into(), cli.config_path.as_deref()).await,
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
