//! Forecast output structures

use serde::{Deserialize, Serialize};

/// One projected month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    /// Forecast month (1-indexed)
    pub month: u32,

    pub opening_balance: f64,

    /// Months past reversion at this month (non-positive while fixed)
    pub months_post_reversion: i32,
    pub remaining_term: u32,

    // Contractual schedule
    pub interest_rate: f64,
    pub scheduled_interest: f64,
    pub scheduled_principal: f64,
    pub scheduled_payment: f64,

    // Decrements
    pub defaults: f64,
    pub balance_post_defaults: f64,
    pub balance_pre_prepayments: f64,
    pub prepayments: f64,
    pub closing_balance: f64,
}

/// Complete projection for one loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub starting_balance: f64,
    pub rows: Vec<ForecastRow>,
}

impl ForecastResult {
    pub fn new(starting_balance: f64) -> Self {
        Self {
            starting_balance,
            rows: Vec::new(),
        }
    }

    pub fn add_row(&mut self, row: ForecastRow) {
        self.rows.push(row);
    }

    pub fn summary(&self) -> ForecastSummary {
        ForecastSummary {
            total_months: self.rows.len() as u32,
            total_defaults: self.rows.iter().map(|r| r.defaults).sum(),
            total_prepayments: self.rows.iter().map(|r| r.prepayments).sum(),
            total_interest: self.rows.iter().map(|r| r.scheduled_interest).sum(),
            final_balance: self.rows.last().map(|r| r.closing_balance).unwrap_or(self.starting_balance),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSummary {
    pub total_months: u32,
    pub total_defaults: f64,
    pub total_prepayments: f64,
    pub total_interest: f64,
    pub final_balance: f64,
}
