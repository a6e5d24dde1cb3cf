use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::google_auth::TokenSource;
use crate::core::sheet::{SheetTab, SpreadsheetService};

/// Google Sheets API v4 client.
pub struct GoogleSheetsClient {
    base_url: Url,
    client: reqwest::Client,
    tokens: Arc<dyn TokenSource>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    #[serde(default)]
    sheet_id: i64,
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl GoogleSheetsClient {
    pub fn new(base_url: &str, tokens: Arc<dyn TokenSource>) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid spreadsheet service URL: {base_url}"))?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("transfer-rates/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(GoogleSheetsClient {
            base_url,
            client,
            tokens,
        })
    }

    /// `{base}/v4/spreadsheets/{segments...}` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Spreadsheet service URL cannot be a base: {}", self.base_url))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets"])
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, &str)],
        body: Option<&Value>,
        operation: &str,
    ) -> Result<reqwest::Response> {
        let token = self
            .tokens
            .access_token()
            .await
            .context("Failed to obtain spreadsheet access token")?;
        debug!(%url, operation, "Calling spreadsheet service");

        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(token)
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} while trying to {}", e, operation))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "HTTP error: {} while trying to {}: {}",
                status,
                operation,
                body
            ));
        }
        Ok(response)
    }

    async fn batch_update(
        &self,
        spreadsheet_id: &str,
        request: Value,
        operation: &str,
    ) -> Result<()> {
        let url = self.endpoint(&[&format!("{spreadsheet_id}:batchUpdate")])?;
        let body = json!({ "requests": [request] });
        self.send(Method::POST, url, &[], Some(&body), operation).await?;
        Ok(())
    }
}

fn cell_to_string(cell: Value) -> String {
    match cell {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl SpreadsheetService for GoogleSheetsClient {
    async fn list_tabs(&self, spreadsheet_id: &str) -> Result<Vec<SheetTab>> {
        let url = self.endpoint(&[spreadsheet_id])?;
        let metadata: SpreadsheetMetadata = self
            .send(
                Method::GET,
                url,
                &[("fields", "sheets.properties(sheetId,title)")],
                None,
                "read spreadsheet metadata",
            )
            .await?
            .json()
            .await
            .context("Failed to parse spreadsheet metadata")?;

        Ok(metadata
            .sheets
            .into_iter()
            .map(|s| SheetTab {
                sheet_id: s.properties.sheet_id,
                title: s.properties.title,
            })
            .collect())
    }

    async fn delete_tab(&self, spreadsheet_id: &str, sheet_id: i64) -> Result<()> {
        self.batch_update(
            spreadsheet_id,
            json!({ "deleteSheet": { "sheetId": sheet_id } }),
            "delete sheet",
        )
        .await
    }

    async fn add_tab(&self, spreadsheet_id: &str, title: &str) -> Result<()> {
        self.batch_update(
            spreadsheet_id,
            json!({ "addSheet": { "properties": { "title": title } } }),
            "add sheet",
        )
        .await
    }

    #[instrument(name = "SheetsRead", skip(self))]
    async fn read_values(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<Vec<String>>> {
        let url = self.endpoint(&[spreadsheet_id, "values", range])?;
        let value_range: ValueRange = self
            .send(Method::GET, url, &[], None, "read values")
            .await?
            .json()
            .await
            .context("Failed to parse value range")?;

        Ok(value_range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    #[instrument(name = "SheetsWrite", skip(self, values), fields(rows = values.len()))]
    async fn write_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &[Vec<Value>],
    ) -> Result<()> {
        let url = self.endpoint(&[spreadsheet_id, "values", range])?;
        let body = json!({ "range": range, "majorDimension": "ROWS", "values": values });
        self.send(
            Method::PUT,
            url,
            &[("valueInputOption", "RAW")],
            Some(&body),
            "write values",
        )
        .await?;
        Ok(())
    }
}
