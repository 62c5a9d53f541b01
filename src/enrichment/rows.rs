//! Enriched per-month rows and loan-level outcomes

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::state::LoanState;
use crate::loan::{months_between, LoanStatic};

/// One observed month with derived performance state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedObservation {
    pub period: NaiveDate,
    pub balance: f64,
    pub payment_due: f64,
    pub payment_made: f64,

    /// Reconciled running balance
    pub current_balance: f64,

    /// Calendar months since origination
    pub seasoning: i32,

    /// Calendar months relative to reversion (negative before reversion)
    pub time_to_reversion: i32,

    pub missed_payment: bool,
    pub consecutive_missed_count: u32,

    pub default_in_month: bool,
    pub defaulted: bool,

    pub prepaid_in_month: bool,
    pub prepaid: bool,

    pub recovery_in_month: f64,
    pub recovery_cumsum: f64,

    /// Defaulted and a positive payment received this month
    pub is_recovery_payment: bool,

    /// Period falls after the investor acquisition date
    pub is_post_acquisition: bool,

    pub state: LoanState,

    /// Neither defaulted nor prepaid as of this month
    pub at_risk: bool,

    pub prepayment_next_month: bool,
    pub default_next_month: bool,
}

/// Loan-level results, undefined when the event never happened
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoanOutcome {
    pub date_of_default: Option<NaiveDate>,
    pub exposure_at_default: Option<f64>,
    pub prepayment_date: Option<NaiveDate>,
    pub post_default_recoveries: Option<f64>,
    pub recovery_percent: Option<f64>,
}

impl LoanOutcome {
    pub fn year_of_default(&self) -> Option<i32> {
        self.date_of_default.map(|d| d.year())
    }
}

/// Enriched history of a single loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedLoan {
    pub loan: LoanStatic,
    pub observations: Vec<EnrichedObservation>,
    pub outcome: LoanOutcome,
}

impl EnrichedLoan {
    pub fn loan_id(&self) -> &str {
        &self.loan.loan_id
    }

    pub fn has_defaulted(&self) -> bool {
        self.outcome.date_of_default.is_some()
    }

    /// Months since default for an observation, if the loan defaulted
    pub fn months_since_default(&self, obs: &EnrichedObservation) -> Option<i32> {
        self.outcome
            .date_of_default
            .map(|default_date| months_between(default_date, obs.period))
    }

    /// Flat rows with loan-level outcomes repeated on every month
    pub fn records(&self) -> impl Iterator<Item = EnrichedRecord> + '_ {
        self.observations.iter().map(move |obs| EnrichedRecord {
            loan_id: self.loan.loan_id.clone(),
            period: obs.period,
            balance: obs.balance,
            payment_due: obs.payment_due,
            payment_made: obs.payment_made,
            current_balance: obs.current_balance,
            seasoning: obs.seasoning,
            time_to_reversion: obs.time_to_reversion,
            missed_payment: obs.missed_payment,
            consecutive_missed_count: obs.consecutive_missed_count,
            default_in_month: obs.default_in_month,
            defaulted: obs.defaulted,
            prepaid_in_month: obs.prepaid_in_month,
            recovery_in_month: obs.recovery_in_month,
            recovery_cumsum: obs.recovery_cumsum,
            is_recovery_payment: obs.is_recovery_payment,
            is_post_acquisition: obs.is_post_acquisition,
            state: obs.state.to_string(),
            at_risk: obs.at_risk,
            prepayment_next_month: obs.prepayment_next_month,
            default_next_month: obs.default_next_month,
            months_since_default: self.months_since_default(obs),
            date_of_default: self.outcome.date_of_default,
            exposure_at_default: self.outcome.exposure_at_default,
            prepayment_date: self.outcome.prepayment_date,
            post_default_recoveries: self.outcome.post_default_recoveries,
            recovery_percent: self.outcome.recovery_percent,
        })
    }
}

/// One row of the portfolio-wide enriched table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedRecord {
    pub loan_id: String,
    pub period: NaiveDate,
    pub balance: f64,
    pub payment_due: f64,
    pub payment_made: f64,
    pub current_balance: f64,
    pub seasoning: i32,
    pub time_to_reversion: i32,
    pub missed_payment: bool,
    pub consecutive_missed_count: u32,
    pub default_in_month: bool,
    pub defaulted: bool,
    pub prepaid_in_month: bool,
    pub recovery_in_month: f64,
    pub recovery_cumsum: f64,
    pub is_recovery_payment: bool,
    pub is_post_acquisition: bool,
    pub state: String,
    pub at_risk: bool,
    pub prepayment_next_month: bool,
    pub default_next_month: bool,
    pub months_since_default: Option<i32>,
    pub date_of_default: Option<NaiveDate>,
    pub exposure_at_default: Option<f64>,
    pub prepayment_date: Option<NaiveDate>,
    pub post_default_recoveries: Option<f64>,
    pub recovery_percent: Option<f64>,
}
