use super::ui;
use crate::core::config::AppConfig;
use crate::core::pipeline::{
    PipelineEvent, PipelineOptions, QuoteCall, RowWarning, RunReport, SyncSettings,
    sync_transfer_rates,
};
use crate::core::rates::RateTable;
use crate::core::throttle::Throttle;
use crate::providers::google_auth::{
    SPREADSHEETS_SCOPE, ServiceAccountKey, ServiceAccountTokenSource,
};
use crate::providers::google_sheets::GoogleSheetsClient;
use crate::providers::transfergo::TransferGoProvider;
use anyhow::{Context, Result, anyhow, ensure};
use comfy_table::Cell;
use console::Term;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

pub const DEFAULT_AMOUNT: &str = "101.0";
pub const MIN_AMOUNT: Decimal = Decimal::ONE;

/// Parses a send amount. Blank input falls back to [`DEFAULT_AMOUNT`].
pub fn parse_amount(input: &str) -> Result<Decimal> {
    let input = input.trim();
    let input = if input.is_empty() {
        DEFAULT_AMOUNT
    } else {
        input
    };
    let amount =
        Decimal::from_str(input).map_err(|_| anyhow!("'{input}' is not a valid amount"))?;
    validate_amount(amount)
}

pub fn validate_amount(amount: Decimal) -> Result<Decimal> {
    ensure!(
        amount >= MIN_AMOUNT,
        "Amount must be at least {MIN_AMOUNT:.1}, got {amount}"
    );
    Ok(amount)
}

/// Services used by a calculation. The spreadsheet client is built on first
/// use and reused by later runs in the same process.
pub struct Session<'a> {
    config: &'a AppConfig,
    settings: SyncSettings,
    quotes: TransferGoProvider,
    sheets: OnceCell<GoogleSheetsClient>,
}

impl<'a> Session<'a> {
    pub fn new(config: &'a AppConfig) -> Result<Self> {
        let quotes = TransferGoProvider::new(
            &config.quote.base_url,
            Throttle::per_second(config.quote.requests_per_second),
        )?;
        let settings = SyncSettings {
            spreadsheet_id: config.spreadsheet_id.clone(),
            source_range: config.sheets.source_range.clone(),
            target_tab: config.sheets.target_tab.clone(),
            options: PipelineOptions {
                calculation_base: config.quote.calculation_base,
                include_nationality: config.sheets.include_nationality,
            },
        };
        Ok(Session {
            config,
            settings,
            quotes,
            sheets: OnceCell::new(),
        })
    }

    async fn sheets(&self) -> Result<&GoogleSheetsClient> {
        self.sheets
            .get_or_try_init(|| async {
                debug!("Connecting to spreadsheet service");
                let key = ServiceAccountKey::from_file(&self.config.credentials_path)?;
                let tokens = ServiceAccountTokenSource::new(key, SPREADSHEETS_SCOPE)?;
                let client =
                    GoogleSheetsClient::new(&self.config.sheets.base_url, Arc::new(tokens))?;
                Ok::<_, anyhow::Error>(client)
            })
            .await
    }

    /// Runs the whole sync, drawing progress on the terminal.
    pub async fn calculate(&self, amount: Decimal) -> Result<RunReport> {
        let sheets = self.sheets().await?;

        let pb = ui::new_progress_bar(0);
        pb.set_message("Processing...");

        let result = sync_transfer_rates(
            &self.settings,
            amount,
            sheets,
            &self.quotes,
            &|event| match event {
                PipelineEvent::RowProcessed { processed, total } => {
                    pb.set_length(total as u64);
                    pb.set_position(processed as u64);
                }
                PipelineEvent::QuoteFailed { id, error } => {
                    pb.println(ui::style_text(&format!("{id}: {error}"), ui::StyleType::Error));
                }
            },
        )
        .await;

        pb.finish_and_clear();
        result
    }
}

fn display_rate_table(table: &RateTable) -> String {
    let mut output = ui::new_styled_table();
    output.set_header(
        table
            .header()
            .into_iter()
            .map(ui::header_cell)
            .collect::<Vec<_>>(),
    );

    for row in &table.rows {
        let mut cells = vec![
            Cell::new(&row.id),
            Cell::new(&row.country_of_residence),
            Cell::new(&row.blended_hub),
            Cell::new(&row.to_country_code),
            Cell::new(&row.from_currency_code),
            Cell::new(&row.to_currency_code),
        ];
        if table.include_nationality {
            cells.push(Cell::new(row.nationality.as_deref().unwrap_or("")));
        }
        cells.push(ui::format_optional_cell(row.transfer_rate, |r| format!("{r:.2}")));
        output.add_row(cells);
    }

    output.to_string()
}

fn display_last_call(call: &QuoteCall) -> String {
    let mut params = ui::new_styled_table();
    params.set_header(vec![ui::header_cell("Parameter"), ui::header_cell("Value")]);
    let request = &call.request;
    for (name, value) in [
        ("calculationBase", request.calculation_base.to_string()),
        ("amount", request.amount.to_string()),
        ("fromCountryCode", request.from_country_code.clone()),
        ("toCountryCode", request.to_country_code.clone()),
        ("fromCurrencyCode", request.from_currency_code.clone()),
        ("toCurrencyCode", request.to_currency_code.clone()),
    ] {
        params.add_row(vec![Cell::new(name), Cell::new(value)]);
    }

    let mut options = ui::new_styled_table();
    options.set_header(vec![
        ui::header_cell("Kind"),
        ui::header_cell("Id"),
        ui::header_cell("Name"),
    ]);
    for (id, name) in &call.parsed.delivery_options {
        options.add_row(vec![Cell::new("delivery"), Cell::new(id), Cell::new(name)]);
    }
    for (id, name) in &call.parsed.payment_options {
        options.add_row(vec![Cell::new("payment"), Cell::new(id), Cell::new(name)]);
    }

    let rates = if call.parsed.rates.is_empty() {
        ui::style_text("none", ui::StyleType::Error)
    } else {
        call.parsed
            .rates
            .iter()
            .map(Decimal::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        "{}\n{}\n\n{}\n{}\n\n{} {}",
        ui::style_text("Last API call parameters", ui::StyleType::Title),
        params,
        ui::style_text("Last API call response", ui::StyleType::Title),
        options,
        ui::style_text("Rates:", ui::StyleType::Label),
        rates
    )
}

/// One red line per row whose quote came back without a usable rate.
fn display_warnings(warnings: &[RowWarning]) -> String {
    warnings
        .iter()
        .map(|w| ui::style_text(&format!("{}: {}", w.id, w.error), ui::StyleType::Error))
        .collect::<Vec<_>>()
        .join("\n")
}

fn display_report(report: &RunReport) {
    let output = &report.output;
    println!(
        "{}",
        ui::style_text("Process completed successfully!", ui::StyleType::Success)
    );
    println!(
        "{}",
        ui::style_text(
            &format!(
                "Amount {} | {} input rows | {} rows written | {} without rate",
                report.amount,
                report.input_rows,
                output.table.len(),
                output.warnings.len()
            ),
            ui::StyleType::Subtle
        )
    );
    if !output.warnings.is_empty() {
        println!("{}", display_warnings(&output.warnings));
    }
    println!("\n{}", display_rate_table(&output.table));

    if let Some(call) = &output.last_call {
        ui::print_separator();
        println!("{}", display_last_call(call));
    }
}

fn prompt(term: &Term, question: &str) -> Result<String> {
    term.write_str(question)?;
    term.read_line().context("Failed to read input")
}

fn prompt_amount(term: &Term) -> Result<Decimal> {
    loop {
        let input = prompt(term, &format!("Enter amount [{DEFAULT_AMOUNT}]: "))?;
        match parse_amount(&input) {
            Ok(amount) => return Ok(amount),
            Err(e) => term.write_line(&ui::style_text(&e.to_string(), ui::StyleType::Error))?,
        }
    }
}

fn confirm(term: &Term, question: &str, default: bool) -> Result<bool> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    let answer = prompt(term, &format!("{question} {hint} "))?;
    Ok(match answer.trim().to_lowercase().as_str() {
        "" => default,
        "y" | "yes" => true,
        _ => false,
    })
}

/// Runs once with `amount`, or interactively until the user is done.
pub async fn run(config: &AppConfig, amount: Option<Decimal>) -> Result<()> {
    let session = Session::new(config)?;

    if let Some(amount) = amount {
        let amount = validate_amount(amount)?;
        let report = session.calculate(amount).await?;
        display_report(&report);
        return Ok(());
    }

    let term = Term::stdout();
    println!(
        "{}\n",
        ui::style_text(
            "Transfer Rate Calculator and Updater",
            ui::StyleType::Title
        )
    );
    loop {
        let amount = prompt_amount(&term)?;
        if confirm(&term, "Calculate and update?", true)? {
            match session.calculate(amount).await {
                Ok(report) => display_report(&report),
                Err(e) => {
                    tracing::error!(error = %e, "Calculation failed");
                    term.write_line(&ui::style_text(
                        &format!("Calculation failed: {e:#}"),
                        ui::StyleType::Error,
                    ))?;
                }
            }
        }
        if !confirm(&term, "Run again?", false)? {
            return Ok(());
        }
        ui::print_separator();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::ParsedQuote;
    use crate::core::quote::{CalculationBase, QuoteError, QuoteRequest};
    use crate::core::rates::TransferRateRow;
    use std::collections::BTreeMap;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("250").unwrap(), Decimal::from(250));
        assert_eq!(
            parse_amount(" 1.0 ").unwrap(),
            Decimal::from_str("1.0").unwrap()
        );
        assert_eq!(parse_amount("").unwrap().to_string(), "101.0");
    }

    #[test]
    fn test_parse_amount_rejects_invalid_input() {
        assert!(
            parse_amount("0.5")
                .unwrap_err()
                .to_string()
                .contains("at least 1.0")
        );
        assert!(
            parse_amount("ten")
                .unwrap_err()
                .to_string()
                .contains("not a valid amount")
        );
        assert!(parse_amount("-5").is_err());
    }

    #[test]
    fn test_display_rate_table_marks_missing_rates() {
        let mut table = RateTable::new(false);
        for (hub, rate) in [("EU", Some(Decimal::from_str("5.01").unwrap())), ("UK", None)] {
            table.rows.push(TransferRateRow {
                id: TransferRateRow::row_id("GB", hub),
                country_of_residence: "GB".to_string(),
                blended_hub: hub.to_string(),
                to_country_code: "PL".to_string(),
                from_currency_code: "GBP".to_string(),
                to_currency_code: "PLN".to_string(),
                nationality: None,
                transfer_rate: rate,
            });
        }

        let output = display_rate_table(&table);
        assert!(output.contains("transfer_rate"));
        assert!(output.contains("GB-EU"));
        assert!(output.contains("5.01"));
        assert!(output.contains("N/A"));
        assert!(!output.contains("nationality"));
    }

    #[test]
    fn test_display_warnings_lists_each_row() {
        let warnings = vec![
            RowWarning {
                id: "GB-EU".to_string(),
                error: QuoteError::NoRates,
            },
            RowWarning {
                id: "GB-UK".to_string(),
                error: QuoteError::MissingField("deliveryOptions"),
            },
        ];

        let output = display_warnings(&warnings);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("GB-EU: No rates found in quote response"));
        assert!(lines[1].contains("GB-UK"));
        assert!(lines[1].contains("'deliveryOptions' missing from quote response"));
        assert!(display_warnings(&[]).is_empty());
    }

    #[test]
    fn test_display_last_call() {
        let call = QuoteCall {
            request: QuoteRequest {
                calculation_base: CalculationBase::SendAmount,
                amount: Decimal::from_str("101.0").unwrap(),
                from_country_code: "GB".to_string(),
                to_country_code: "PL".to_string(),
                from_currency_code: "GBP".to_string(),
                to_currency_code: "PLN".to_string(),
            },
            parsed: ParsedQuote {
                has_delivery_options: true,
                delivery_options: BTreeMap::from([(
                    "standard".to_string(),
                    "Standard".to_string(),
                )]),
                payment_options: BTreeMap::from([(
                    "bank".to_string(),
                    "Bank transfer".to_string(),
                )]),
                rates: vec![Decimal::from_str("5.0123").unwrap()],
            },
        };

        let output = display_last_call(&call);
        assert!(output.contains("sendAmount"));
        assert!(output.contains("101.0"));
        assert!(output.contains("Bank transfer"));
        assert!(output.contains("5.0123"));
    }
}
