use thiserror::Error;

use crate::month::Month;

#[derive(Debug, Error)]
pub enum CostdropError {
    #[error("record {index}: field '{field}': {reason}")]
    RecordValidation {
        index: usize,
        field: String,
        reason: String,
    },
    #[error("invalid month '{token}': {reason}")]
    MonthFormat { token: String, reason: String },
    #[error("month input is empty")]
    EmptyMonths,
    #[error("month range start {start} is after end {end}")]
    MonthRangeOrder { start: Month, end: Month },
    #[error("line item {index} serializes to {bytes} bytes, over the {limit} byte payload limit")]
    PayloadTooLarge {
        index: usize,
        bytes: usize,
        limit: usize,
    },
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to parse json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, CostdropError>;
