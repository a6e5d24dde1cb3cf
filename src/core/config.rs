use anyhow::{Context, Result, ensure};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::{fs, path::PathBuf};
use tracing::debug;

use crate::core::quote::CalculationBase;

/// A configuration value that must never show up in logs.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    #[cfg(test)]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct QuoteConfig {
    pub base_url: String,
    pub calculation_base: CalculationBase,
    pub requests_per_second: u32,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        QuoteConfig {
            base_url: "https://my.transfergo.com".to_string(),
            calculation_base: CalculationBase::SendAmount,
            requests_per_second: 7,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SheetsConfig {
    pub base_url: String,
    pub source_range: String,
    pub target_tab: String,
    pub include_nationality: bool,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        SheetsConfig {
            base_url: "https://sheets.googleapis.com".to_string(),
            source_range: "Base!A2:G".to_string(),
            target_tab: "results".to_string(),
            include_nationality: false,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub spreadsheet_id: String,
    pub credentials_path: PathBuf,
    /// Notification service key. Carried for parity with deployments that
    /// configure it; the rate sync itself does not call that service.
    pub braze_api_key: Option<Secret>,
    #[serde(default)]
    pub quote: QuoteConfig,
    #[serde(default)]
    pub sheets: SheetsConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "transfer-rates", "transfer-rates")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config.validate()?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            !self.spreadsheet_id.trim().is_empty(),
            "spreadsheet_id must not be empty"
        );
        ensure!(
            self.quote.requests_per_second > 0,
            "quote.requests_per_second must be greater than zero"
        );
        ensure!(
            !self.sheets.target_tab.trim().is_empty(),
            "sheets.target_tab must not be empty"
        );
        Ok(())
    }
}
