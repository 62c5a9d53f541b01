//! Loan static attributes and monthly observation records

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DataError, LoanError};

/// Calendar month number (year * 12 + zero-based month)
///
/// Two dates in the same calendar month share an index regardless of day.
pub fn month_index(date: NaiveDate) -> i32 {
    date.year() * 12 + date.month0() as i32
}

/// Whole calendar months from `from` to `to` (negative when `to` is earlier)
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i32 {
    month_index(to) - month_index(from)
}

/// How the loan repays principal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepaymentMethod {
    InterestOnly,
    Amortizing,
}

impl RepaymentMethod {
    /// Parse the labels used in the source sheets ("Interest Only", "Repayment", ...)
    pub fn parse(label: &str) -> Result<Self, DataError> {
        let normalized: String = label
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "interestonly" | "io" => Ok(RepaymentMethod::InterestOnly),
            "amortizing" | "amortising" | "repayment" | "capitalandinterest" => {
                Ok(RepaymentMethod::Amortizing)
            }
            _ => Err(DataError::UnknownRepaymentMethod(label.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RepaymentMethod::InterestOnly => "interest_only",
            RepaymentMethod::Amortizing => "amortizing",
        }
    }
}

impl fmt::Display for RepaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static terms of one loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanStatic {
    /// Unique loan identifier
    pub loan_id: String,

    /// Balance at origination
    pub original_balance: f64,

    pub origination_date: NaiveDate,

    /// Date the fixed introductory rate ends
    pub reversion_date: NaiveDate,

    /// Annual rate before reversion (e.g. 0.0394)
    pub fixed_pre_reversion_rate: f64,

    /// Margin over the reference rate after reversion
    pub post_reversion_margin: f64,

    pub months_to_maturity: u32,

    pub repayment_method: RepaymentMethod,

    /// Date the current investor acquired the loan
    pub investor_acquisition_date: NaiveDate,
}

impl LoanStatic {
    /// Origination year, used as the vintage pivot
    pub fn vintage(&self) -> i32 {
        self.origination_date.year()
    }
}

/// One month of reported loan activity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthlyObservation {
    /// Any date within the observed calendar month (month-end in the source data)
    pub period: NaiveDate,

    /// Reported end-of-month balance
    pub balance: f64,

    pub payment_due: Option<f64>,

    pub payment_made: Option<f64>,
}

impl MonthlyObservation {
    pub fn new(period: NaiveDate, balance: f64, payment_due: f64, payment_made: f64) -> Self {
        Self {
            period,
            balance,
            payment_due: Some(payment_due),
            payment_made: Some(payment_made),
        }
    }
}

/// Ordered observations for a single loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanHistory {
    pub loan_id: String,
    pub observations: Vec<MonthlyObservation>,
}

impl LoanHistory {
    pub fn new(loan_id: impl Into<String>, observations: Vec<MonthlyObservation>) -> Self {
        Self {
            loan_id: loan_id.into(),
            observations,
        }
    }

    /// Check that periods are strictly increasing by calendar month
    ///
    /// Gaps are allowed; duplicates and reversals are not.
    pub fn validate(&self) -> Result<(), LoanError> {
        if self.observations.is_empty() {
            return Err(LoanError::EmptyHistory {
                loan_id: self.loan_id.clone(),
            });
        }

        for pair in self.observations.windows(2) {
            if month_index(pair[1].period) <= month_index(pair[0].period) {
                return Err(LoanError::NonMonotonicHistory {
                    loan_id: self.loan_id.clone(),
                    previous: pair[0].period,
                    period: pair[1].period,
                });
            }
        }

        Ok(())
    }
}
