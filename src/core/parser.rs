//! Flattens the nested quote response into delivery options, payment options
//! and candidate rates.
//!
//! The upstream schema is not under our control, so every lookup falls back to
//! a default instead of failing.

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

const UNKNOWN_NAME: &str = "Unknown";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedQuote {
    /// Whether the response carried a `deliveryOptions` key at all.
    pub has_delivery_options: bool,
    pub delivery_options: BTreeMap<String, String>,
    pub payment_options: BTreeMap<String, String>,
    pub rates: Vec<Decimal>,
}

pub fn parse(raw: &Value) -> ParsedQuote {
    let mut parsed = ParsedQuote::default();

    let Some(delivery_options) = raw.get("deliveryOptions") else {
        return parsed;
    };
    parsed.has_delivery_options = true;

    for (delivery_id, delivery) in entries(Some(delivery_options)) {
        parsed
            .delivery_options
            .insert(delivery_id.clone(), name_of(delivery));

        for (payment_id, payment) in entries(delivery.get("paymentOptions")) {
            parsed
                .payment_options
                .insert(payment_id.clone(), name_of(payment));

            if let Some(rate) = lookup(payment, &["quote", "rate"]).and_then(as_decimal) {
                parsed.rates.push(rate);
            }
        }
    }

    parsed
}

fn entries(value: Option<&Value>) -> impl Iterator<Item = (&String, &Value)> {
    value
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(|map| map.iter())
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(*key))
}

fn name_of(value: &Value) -> String {
    value
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_NAME)
        .to_string()
}

fn as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}
