//! Transfer quote abstractions and core types

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use thiserror::Error;

use crate::core::parser::ParsedQuote;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CalculationBase {
    #[default]
    #[serde(rename = "sendAmount")]
    SendAmount,
}

impl Display for CalculationBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                CalculationBase::SendAmount => "sendAmount",
            }
        )
    }
}

/// Query parameters of a single quote request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub calculation_base: CalculationBase,
    pub amount: Decimal,
    pub from_country_code: String,
    pub to_country_code: String,
    pub from_currency_code: String,
    pub to_currency_code: String,
}

/// Reasons a well-formed HTTP exchange still produced no usable rate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuoteError {
    #[error("Key error: '{0}' missing from quote response")]
    MissingField(&'static str),
    #[error("No rates found in quote response")]
    NoRates,
}

#[derive(Debug, Clone)]
pub struct QuoteOutcome {
    pub parsed: ParsedQuote,
    pub rate: Result<Decimal, QuoteError>,
}

impl QuoteOutcome {
    /// Derives the best rate from a parsed response.
    pub fn from_parsed(parsed: ParsedQuote) -> Self {
        let rate = if !parsed.has_delivery_options {
            Err(QuoteError::MissingField("deliveryOptions"))
        } else {
            best_rate(&parsed.rates).ok_or(QuoteError::NoRates)
        };
        QuoteOutcome { parsed, rate }
    }
}

/// Highest rate rounded to two decimal places. Ties share a value, so which
/// one is picked does not matter.
pub fn best_rate(rates: &[Decimal]) -> Option<Decimal> {
    rates
        .iter()
        .max()
        .map(|rate| rate.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven))
}

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Fetches a quote. `Err` is a transport level failure and aborts the run;
    /// malformed responses are reported through [`QuoteOutcome::rate`].
    async fn fetch_quote(&self, request: &QuoteRequest) -> Result<QuoteOutcome>;
}
