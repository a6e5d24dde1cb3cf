use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, instrument};

use crate::core::parser;
use crate::core::quote::{QuoteOutcome, QuoteProvider, QuoteRequest};
use crate::core::throttle::Throttle;

const QUOTE_PATH: &str = "/api/transfers/quote";

pub struct TransferGoProvider {
    base_url: String,
    client: reqwest::Client,
    throttle: Throttle,
}

impl TransferGoProvider {
    pub fn new(base_url: &str, throttle: Throttle) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("transfer-rates/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(TransferGoProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            throttle,
        })
    }
}

#[async_trait]
impl QuoteProvider for TransferGoProvider {
    #[instrument(
        name = "TransferGoQuote",
        skip(self),
        fields(
            from = %request.from_currency_code,
            to = %request.to_currency_code,
            country = %request.to_country_code
        )
    )]
    async fn fetch_quote(&self, request: &QuoteRequest) -> Result<QuoteOutcome> {
        let url = format!("{}{}", self.base_url, QUOTE_PATH);

        self.throttle.wait().await;
        debug!("Requesting quote from {}", url);

        let response = self
            .client
            .get(&url)
            .query(request)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for quote URL: {}", e, url))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for quote {}{} -> {}{}",
                response.status(),
                request.from_country_code,
                request.from_currency_code,
                request.to_country_code,
                request.to_currency_code
            ));
        }

        let text = response
            .text()
            .await
            .context("Failed to get response text")?;

        let raw: Value = match serde_json::from_str(&text) {
            Ok(raw) => raw,
            Err(e) => {
                error!(error = ?e, response = %text, "Failed to parse quote response");
                return Err(e).context("Failed to parse quote response");
            }
        };

        let outcome = QuoteOutcome::from_parsed(parser::parse(&raw));
        debug!(rate = ?outcome.rate, "Parsed quote response");
        Ok(outcome)
    }
}
