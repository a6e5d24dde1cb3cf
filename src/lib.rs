pub mod cli;
pub mod core;
pub mod providers;

use anyhow::Result;
use rust_decimal::Decimal;
use tracing::{debug, info};

pub enum AppCommand {
    /// Fetch rates and replace the results tab. Prompts for the amount when
    /// none is given.
    Calculate { amount: Option<Decimal> },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Transfer rates starting...");

    let config = match config_path {
        Some(path) => crate::core::config::AppConfig::load_from_path(path)?,
        None => crate::core::config::AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    match command {
        AppCommand::Calculate { amount } => cli::calculate::run(&config, amount).await,
    }
}
