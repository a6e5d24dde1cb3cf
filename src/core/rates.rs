use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferRateRow {
    pub id: String,
    pub country_of_residence: String,
    pub blended_hub: String,
    pub to_country_code: String,
    pub from_currency_code: String,
    pub to_currency_code: String,
    pub nationality: Option<String>,
    pub transfer_rate: Option<Decimal>,
}

impl TransferRateRow {
    pub fn row_id(country_of_residence: &str, blended_hub: &str) -> String {
        format!("{country_of_residence}-{blended_hub}")
    }
}

/// Output table in input order, ready to be written to a spreadsheet tab.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateTable {
    pub include_nationality: bool,
    pub rows: Vec<TransferRateRow>,
}

impl RateTable {
    pub fn new(include_nationality: bool) -> Self {
        RateTable {
            include_nationality,
            rows: Vec::new(),
        }
    }

    pub fn header(&self) -> Vec<&'static str> {
        let mut header = vec![
            "id",
            "country_of_residence",
            "blended_hub",
            "to_country_code",
            "from_currency_code",
            "to_currency_code",
        ];
        if self.include_nationality {
            header.push("nationality");
        }
        header.push("transfer_rate");
        header
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header row followed by one row per entry. Absent rates become empty
    /// cells, present rates are written as numbers.
    pub fn to_values(&self) -> Vec<Vec<Value>> {
        let mut values = Vec::with_capacity(self.rows.len() + 1);
        values.push(
            self.header()
                .into_iter()
                .map(|name| Value::String(name.to_string()))
                .collect(),
        );

        for row in &self.rows {
            let mut cells = vec![
                Value::String(row.id.clone()),
                Value::String(row.country_of_residence.clone()),
                Value::String(row.blended_hub.clone()),
                Value::String(row.to_country_code.clone()),
                Value::String(row.from_currency_code.clone()),
                Value::String(row.to_currency_code.clone()),
            ];
            if self.include_nationality {
                cells.push(Value::String(row.nationality.clone().unwrap_or_default()));
            }
            cells.push(rate_cell(row.transfer_rate));
            values.push(cells);
        }

        values
    }
}

fn rate_cell(rate: Option<Decimal>) -> Value {
    rate
        .and_then(|r| r.normalize().to_string().parse::<serde_json::Number>().ok())
        .map_or_else(|| Value::String(String::new()), Value::Number)
}
