//! Core business logic abstractions

pub mod config;
pub mod log;
pub mod parser;
pub mod pipeline;
pub mod quote;
pub mod rates;
pub mod sheet;
pub mod throttle;

// Re-export main types for cleaner imports
pub use parser::ParsedQuote;
pub use quote::{CalculationBase, QuoteError, QuoteOutcome, QuoteProvider, QuoteRequest};
pub use rates::{RateTable, TransferRateRow};
pub use sheet::{SheetTab, SpreadsheetService};
