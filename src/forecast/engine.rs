//! Monthly cashflow forecast for a single loan
//!
//! Each month rolls the prior closing balance forward: scheduled interest,
//! then defaults, then prepayments on the surviving balance.

use serde::{Deserialize, Serialize};

use super::rows::{ForecastResult, ForecastRow};
use crate::enrichment::EnrichedLoan;
use crate::error::ForecastError;
use crate::loan::RepaymentMethod;

/// Monthly decrement implied by an annual rate: `1 - (1 - annual)^(1/12)`
pub fn monthly_rate(annual: f64) -> f64 {
    1.0 - (1.0 - annual).powf(1.0 / 12.0)
}

/// Loan terms at the forecast start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastLoan {
    pub current_balance: f64,

    /// Months past reversion at forecast month 1 (negative before reversion)
    pub months_post_reversion: i32,

    pub seasoning: i32,
    pub fixed_pre_reversion_rate: f64,
    pub post_reversion_margin: f64,
    pub months_to_maturity: u32,
    pub repayment_method: RepaymentMethod,
}

impl ForecastLoan {
    /// Terms for the month after the last observed month of an enriched loan
    pub fn from_enriched(loan: &EnrichedLoan) -> Option<Self> {
        let last = loan.observations.last()?;
        let elapsed = (last.seasoning.max(0) as u32).min(loan.loan.months_to_maturity);

        Some(Self {
            current_balance: last.current_balance,
            months_post_reversion: last.time_to_reversion + 1,
            seasoning: last.seasoning,
            fixed_pre_reversion_rate: loan.loan.fixed_pre_reversion_rate,
            post_reversion_margin: loan.loan.post_reversion_margin,
            months_to_maturity: loan.loan.months_to_maturity - elapsed,
            repayment_method: loan.loan.repayment_method,
        })
    }
}

/// Rate vectors driving the forecast, one value per forecast month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastInputs {
    /// Annual default rates
    pub cdr: Vec<f64>,
    /// Annual prepayment rates
    pub cpr: Vec<f64>,
    /// Annual reference (base) rates
    pub reference_rates: Vec<f64>,
}

impl ForecastInputs {
    /// Inputs with a constant reference rate over the CDR/CPR horizon
    pub fn with_flat_reference(cdr: Vec<f64>, cpr: Vec<f64>, reference_rate: f64) -> Self {
        let reference_rates = vec![reference_rate; cdr.len()];
        Self {
            cdr,
            cpr,
            reference_rates,
        }
    }

    pub fn horizon(&self) -> usize {
        self.reference_rates.len()
    }

    /// Reject mismatched horizons and CDR/CPR values outside [0, 1]
    pub fn validate(&self) -> Result<(), ForecastError> {
        if self.cdr.len() != self.cpr.len() || self.cdr.len() != self.reference_rates.len() {
            return Err(ForecastError::MalformedHorizon {
                cdr: self.cdr.len(),
                cpr: self.cpr.len(),
                reference: self.reference_rates.len(),
            });
        }

        for (curve, values) in [("cdr", &self.cdr), ("cpr", &self.cpr)] {
            if let Some((month, &value)) = values
                .iter()
                .enumerate()
                .find(|(_, v)| !v.is_finite() || **v < 0.0 || **v > 1.0)
            {
                return Err(ForecastError::InvalidRate { curve, month, value });
            }
        }

        if let Some((month, &value)) = self.reference_rates.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(ForecastError::InvalidRate {
                curve: "reference",
                month,
                value,
            });
        }

        Ok(())
    }
}

/// Projects loan balances forward under CDR/CPR curves
#[derive(Debug, Clone)]
pub struct ForecastEngine {
    inputs: ForecastInputs,
}

impl ForecastEngine {
    /// Validate inputs up front; nothing is projected from a malformed horizon
    pub fn new(inputs: ForecastInputs) -> Result<Self, ForecastError> {
        inputs.validate()?;
        Ok(Self { inputs })
    }

    /// Run the forecast for a single loan over the full horizon
    pub fn project(&self, loan: &ForecastLoan) -> ForecastResult {
        if loan.repayment_method == RepaymentMethod::Amortizing {
            log::warn!("amortizing principal is not modeled, projecting as interest-only");
        }

        let mut result = ForecastResult::new(loan.current_balance);
        let mut opening_balance = loan.current_balance;

        for i in 0..self.inputs.horizon() {
            let row = self.project_month(loan, i, opening_balance);
            opening_balance = row.closing_balance;
            result.add_row(row);
        }

        result
    }

    fn project_month(&self, loan: &ForecastLoan, i: usize, opening_balance: f64) -> ForecastRow {
        let months_post_reversion = loan.months_post_reversion + i as i32;
        let interest_rate = if months_post_reversion > 0 {
            self.inputs.reference_rates[i] + loan.post_reversion_margin
        } else {
            loan.fixed_pre_reversion_rate
        };

        let scheduled_interest = opening_balance * (interest_rate / 12.0);
        let scheduled_principal = 0.0;

        // Defaults come off first; a defaulted balance cannot also prepay
        let defaults = opening_balance * monthly_rate(self.inputs.cdr[i]);
        let balance_post_defaults = opening_balance - defaults;
        let balance_pre_prepayments = balance_post_defaults - scheduled_principal;
        let prepayments = balance_pre_prepayments * monthly_rate(self.inputs.cpr[i]);
        let closing_balance = balance_pre_prepayments - prepayments;

        ForecastRow {
            month: i as u32 + 1,
            opening_balance,
            months_post_reversion,
            remaining_term: loan.months_to_maturity.saturating_sub(i as u32 + 1),
            interest_rate,
            scheduled_interest,
            scheduled_principal,
            scheduled_payment: scheduled_interest + scheduled_principal,
            defaults,
            balance_post_defaults,
            balance_pre_prepayments,
            prepayments,
            closing_balance,
        }
    }
}
