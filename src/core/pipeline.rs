use anyhow::{Context, Result};
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use crate::core::parser::ParsedQuote;
use crate::core::quote::{CalculationBase, QuoteError, QuoteProvider, QuoteRequest};
use crate::core::rates::{RateTable, TransferRateRow};
use crate::core::sheet::{SpreadsheetService, replace_sheet};

/// Rows with fewer cells than this are skipped.
pub const MIN_ROW_CELLS: usize = 7;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub calculation_base: CalculationBase,
    pub include_nationality: bool,
}

#[derive(Debug)]
pub enum PipelineEvent<'a> {
    /// Emitted after every input row, skipped rows included.
    RowProcessed { processed: usize, total: usize },
    QuoteFailed { id: &'a str, error: &'a QuoteError },
}

/// The most recently issued quote request and what came back.
#[derive(Debug, Clone)]
pub struct QuoteCall {
    pub request: QuoteRequest,
    pub parsed: ParsedQuote,
}

#[derive(Debug, Clone)]
pub struct RowWarning {
    pub id: String,
    pub error: QuoteError,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub table: RateTable,
    pub last_call: Option<QuoteCall>,
    pub warnings: Vec<RowWarning>,
}

struct InputRow<'a> {
    country_of_residence: &'a str,
    blended_hub: &'a str,
    to_country_code: &'a str,
    from_currency_code: &'a str,
    to_currency_code: &'a str,
    nationality: Option<&'a str>,
}

impl<'a> InputRow<'a> {
    fn from_cells(cells: &'a [String]) -> Option<Self> {
        if cells.len() < MIN_ROW_CELLS {
            return None;
        }
        Some(InputRow {
            country_of_residence: &cells[1],
            blended_hub: &cells[2],
            to_country_code: &cells[3],
            from_currency_code: &cells[4],
            to_currency_code: &cells[5],
            nationality: Some(cells[6].as_str()).filter(|n| !n.trim().is_empty()),
        })
    }
}

/// Quotes every usable input row in order, one request at a time.
pub async fn collect_transfer_rates(
    rows: &[Vec<String>],
    amount: Decimal,
    options: &PipelineOptions,
    provider: &dyn QuoteProvider,
    on_event: &dyn Fn(PipelineEvent<'_>),
) -> Result<PipelineOutput> {
    let total = rows.len();
    let mut output = PipelineOutput {
        table: RateTable::new(options.include_nationality),
        last_call: None,
        warnings: Vec::new(),
    };

    for (index, cells) in rows.iter().enumerate() {
        match InputRow::from_cells(cells) {
            Some(row) => {
                let (result, call) = quote_row(&row, amount, options, provider).await?;
                output.last_call = Some(call);
                output.table.rows.push(result.row);
                if let Some(warning) = result.warning {
                    on_event(PipelineEvent::QuoteFailed {
                        id: &warning.id,
                        error: &warning.error,
                    });
                    output.warnings.push(warning);
                }
            }
            None => debug!(row = index + 2, cells = cells.len(), "Skipping short row"),
        }

        on_event(PipelineEvent::RowProcessed {
            processed: index + 1,
            total,
        });
    }

    info!(
        input_rows = total,
        output_rows = output.table.len(),
        failed_quotes = output.warnings.len(),
        "Collected transfer rates"
    );
    Ok(output)
}

struct RowResult {
    row: TransferRateRow,
    warning: Option<RowWarning>,
}

#[instrument(
    name = "QuoteRow",
    skip_all,
    fields(residence = %row.country_of_residence, hub = %row.blended_hub)
)]
async fn quote_row(
    row: &InputRow<'_>,
    amount: Decimal,
    options: &PipelineOptions,
    provider: &dyn QuoteProvider,
) -> Result<(RowResult, QuoteCall)> {
    let id = TransferRateRow::row_id(row.country_of_residence, row.blended_hub);
    let request = QuoteRequest {
        calculation_base: options.calculation_base,
        amount,
        from_country_code: row.country_of_residence.to_string(),
        to_country_code: row.to_country_code.to_string(),
        from_currency_code: row.from_currency_code.to_string(),
        to_currency_code: row.to_currency_code.to_string(),
    };

    let outcome = provider
        .fetch_quote(&request)
        .await
        .with_context(|| format!("Quote request failed for row {id}"))?;

    let (transfer_rate, warning) = match outcome.rate {
        Ok(rate) => (Some(rate), None),
        Err(error) => {
            warn!(%id, %error, "No transfer rate for row");
            (
                None,
                Some(RowWarning {
                    id: id.clone(),
                    error,
                }),
            )
        }
    };

    let result = RowResult {
        row: TransferRateRow {
            id,
            country_of_residence: row.country_of_residence.to_string(),
            blended_hub: row.blended_hub.to_string(),
            to_country_code: row.to_country_code.to_string(),
            from_currency_code: row.from_currency_code.to_string(),
            to_currency_code: row.to_currency_code.to_string(),
            nationality: row.nationality.map(str::to_string),
            transfer_rate,
        },
        warning,
    };
    let call = QuoteCall {
        request,
        parsed: outcome.parsed,
    };
    Ok((result, call))
}

/// Where to read input rows from and where to write the results.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub spreadsheet_id: String,
    pub source_range: String,
    pub target_tab: String,
    pub options: PipelineOptions,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub amount: Decimal,
    pub input_rows: usize,
    pub output: PipelineOutput,
}

/// Reads the source range, quotes every row and replaces the target tab.
pub async fn sync_transfer_rates(
    settings: &SyncSettings,
    amount: Decimal,
    sheets: &dyn SpreadsheetService,
    quotes: &dyn QuoteProvider,
    on_event: &dyn Fn(PipelineEvent<'_>),
) -> Result<RunReport> {
    let rows = sheets
        .read_values(&settings.spreadsheet_id, &settings.source_range)
        .await
        .with_context(|| format!("Failed to read range {}", settings.source_range))?;
    debug!(rows = rows.len(), range = %settings.source_range, "Read input rows");

    let output = collect_transfer_rates(&rows, amount, &settings.options, quotes, on_event).await?;

    replace_sheet(
        sheets,
        &settings.spreadsheet_id,
        &output.table.to_values(),
        &settings.target_tab,
    )
    .await?;

    Ok(RunReport {
        amount,
        input_rows: rows.len(),
        output,
    })
}
