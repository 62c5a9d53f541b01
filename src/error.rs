//! Error types for loading, enrichment, aggregation and forecasting
//!
//! Per-loan failures (`LoanError`) are isolated: the portfolio records them as
//! skipped loans and keeps going. Everything else is fatal for the call.
//! Undefined ratios are not errors; they surface as `None`.

use chrono::NaiveDate;
use thiserror::Error;

/// Failure confined to a single loan
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoanError {
    #[error("loan {loan_id}: missing static data ({field})")]
    MissingStaticData { loan_id: String, field: &'static str },

    #[error("loan {loan_id}: invalid static {field} '{value}'")]
    InvalidStaticData {
        loan_id: String,
        field: &'static str,
        value: String,
    },

    #[error("loan {loan_id}: period {period} does not follow {previous}")]
    NonMonotonicHistory {
        loan_id: String,
        previous: NaiveDate,
        period: NaiveDate,
    },

    #[error("loan {loan_id}: no observations")]
    EmptyHistory { loan_id: String },
}

impl LoanError {
    pub fn loan_id(&self) -> &str {
        match self {
            LoanError::MissingStaticData { loan_id, .. }
            | LoanError::InvalidStaticData { loan_id, .. }
            | LoanError::NonMonotonicHistory { loan_id, .. }
            | LoanError::EmptyHistory { loan_id } => loan_id,
        }
    }
}

/// Failure reading source tables
#[derive(Debug, Error)]
pub enum DataError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("{source_name}: missing header row")]
    MissingHeader { source_name: String },

    #[error("{source_name}: invalid date '{value}'")]
    InvalidDate { source_name: String, value: String },

    #[error("{source_name}: invalid number '{value}' for loan {loan_id}")]
    InvalidNumber {
        source_name: String,
        loan_id: String,
        value: String,
    },

    #[error("unknown repayment method '{0}'")]
    UnknownRepaymentMethod(String),
}

/// Failure of a portfolio-level operation
#[derive(Debug, Error)]
pub enum PortfolioError {
    #[error("portfolio is empty: {skipped} loan(s) skipped, none enriched")]
    EmptyPortfolio { skipped: usize },
}

/// Invalid forecast input, rejected before projecting
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    #[error("forecast horizon mismatch: cdr={cdr}, cpr={cpr}, reference rates={reference}")]
    MalformedHorizon {
        cdr: usize,
        cpr: usize,
        reference: usize,
    },

    #[error("invalid {curve} rate {value} at forecast month {month}")]
    InvalidRate {
        curve: &'static str,
        month: usize,
        value: f64,
    },
}

/// Failure loading an analysis config file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("default threshold must be at least 1")]
    InvalidThreshold,
}
