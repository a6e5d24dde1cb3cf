//! Spreadsheet abstractions and the destructive tab writer

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetTab {
    pub sheet_id: i64,
    pub title: String,
}

#[async_trait]
pub trait SpreadsheetService: Send + Sync {
    async fn list_tabs(&self, spreadsheet_id: &str) -> Result<Vec<SheetTab>>;
    async fn delete_tab(&self, spreadsheet_id: &str, sheet_id: i64) -> Result<()>;
    async fn add_tab(&self, spreadsheet_id: &str, title: &str) -> Result<()>;
    /// Reads a range as rows of strings. Trailing empty cells are not returned.
    async fn read_values(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<Vec<String>>>;
    /// Writes raw (uninterpreted) values starting at the top-left of `range`.
    async fn write_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &[Vec<Value>],
    ) -> Result<()>;
}

/// Replaces the tab named `tab` with `values`. An existing tab is deleted
/// first, so prior content and formatting never survive.
pub async fn replace_sheet(
    service: &dyn SpreadsheetService,
    spreadsheet_id: &str,
    values: &[Vec<Value>],
    tab: &str,
) -> Result<()> {
    let tabs = service
        .list_tabs(spreadsheet_id)
        .await
        .context("Failed to read spreadsheet metadata")?;

    if let Some(existing) = tabs.iter().find(|t| t.title == tab) {
        debug!(sheet_id = existing.sheet_id, tab, "Deleting existing tab");
        service
            .delete_tab(spreadsheet_id, existing.sheet_id)
            .await
            .with_context(|| format!("Failed to delete tab '{tab}'"))?;
    }

    service
        .add_tab(spreadsheet_id, tab)
        .await
        .with_context(|| format!("Failed to create tab '{tab}'"))?;

    service
        .write_values(spreadsheet_id, &top_left(tab), values)
        .await
        .with_context(|| format!("Failed to write values to tab '{tab}'"))?;

    info!(tab, rows = values.len(), "Replaced spreadsheet tab");
    Ok(())
}

fn top_left(tab: &str) -> String {
    format!("'{}'!A1", tab.replace('\'', "''"))
}
