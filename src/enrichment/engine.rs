//! Loan enrichment engine
//!
//! Walks one loan's observations left to right, carrying a `ScanState`, and
//! annotates every month with arrears, default, prepayment and recovery state.

use super::rows::{EnrichedLoan, EnrichedObservation, LoanOutcome};
use super::state::{ScanState, Transition};
use crate::config::{AnalysisConfig, BalanceReconciliation, DEFAULT_MISSED_PAYMENT_THRESHOLD};
use crate::error::LoanError;
use crate::loan::{month_index, months_between, LoanHistory, LoanStatic, MonthlyObservation};

/// Derives per-month performance state for single loans
#[derive(Debug, Clone)]
pub struct EnrichmentEngine {
    reconciliation: BalanceReconciliation,
    default_threshold: u32,
}

impl Default for EnrichmentEngine {
    fn default() -> Self {
        Self {
            reconciliation: BalanceReconciliation::ReportedBalance,
            default_threshold: DEFAULT_MISSED_PAYMENT_THRESHOLD,
        }
    }
}

impl EnrichmentEngine {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            reconciliation: config.reconciliation,
            default_threshold: config.default_threshold.max(1),
        }
    }

    /// Enrich one loan's history
    ///
    /// Output rows are one-to-one with the input observations, same order.
    pub fn enrich(&self, loan: &LoanStatic, history: &LoanHistory) -> Result<EnrichedLoan, LoanError> {
        history.validate()?;

        let mut scan = ScanState::new();
        let mut observations = Vec::with_capacity(history.observations.len());

        for obs in &history.observations {
            observations.push(self.enrich_month(loan, obs, &mut scan));
        }

        let outcome = Self::outcome(&scan);
        Self::mark_at_risk(&mut observations, &outcome);

        if let Some(date) = outcome.date_of_default {
            log::debug!("loan {} defaulted in {}", loan.loan_id, date);
        }
        if let Some(date) = outcome.prepayment_date {
            log::debug!("loan {} prepaid in {}", loan.loan_id, date);
        }

        Ok(EnrichedLoan {
            loan: loan.clone(),
            observations,
            outcome,
        })
    }

    fn enrich_month(&self, loan: &LoanStatic, obs: &MonthlyObservation, scan: &mut ScanState) -> EnrichedObservation {
        let payment_due = obs.payment_due.unwrap_or(0.0);
        let payment_made = obs.payment_made.unwrap_or(0.0);

        let missed_payment = payment_due > payment_made;
        scan.record_payment(missed_payment, payment_made);

        let current_balance = match self.reconciliation {
            BalanceReconciliation::ReportedBalance => obs.balance - payment_due + payment_made,
            BalanceReconciliation::OriginalBalance => loan.original_balance - scan.cumulative_made,
        };

        let paid_off = payment_due < payment_made && obs.balance == 0.0;
        let (next_state, transition) = scan
            .loan_state
            .step(scan.consecutive_missed, paid_off, self.default_threshold);
        scan.loan_state = next_state;

        match transition {
            Transition::Default => scan.default_event = Some((obs.period, current_balance)),
            Transition::Prepayment => scan.prepayment_date = Some(obs.period),
            Transition::None => {}
        }

        let defaulted = scan.is_defaulted();
        let recovery_in_month = if defaulted { payment_made } else { 0.0 };
        scan.recovery_cumsum += recovery_in_month;

        EnrichedObservation {
            period: obs.period,
            balance: obs.balance,
            payment_due,
            payment_made,
            current_balance,
            seasoning: months_between(loan.origination_date, obs.period),
            time_to_reversion: months_between(loan.reversion_date, obs.period),
            missed_payment,
            consecutive_missed_count: scan.consecutive_missed,
            default_in_month: transition == Transition::Default,
            defaulted,
            prepaid_in_month: transition == Transition::Prepayment,
            prepaid: scan.is_prepaid(),
            recovery_in_month,
            recovery_cumsum: scan.recovery_cumsum,
            is_recovery_payment: defaulted && payment_made > 0.0,
            is_post_acquisition: obs.period > loan.investor_acquisition_date,
            state: scan.loan_state,
            // Filled once the loan-level outcome is known
            at_risk: false,
            prepayment_next_month: false,
            default_next_month: false,
        }
    }

    fn outcome(scan: &ScanState) -> LoanOutcome {
        let (date_of_default, exposure_at_default) = match scan.default_event {
            Some((date, ead)) => (Some(date), Some(ead)),
            None => (None, None),
        };

        let post_default_recoveries = date_of_default.map(|_| scan.recovery_cumsum);

        let recovery_percent = match (post_default_recoveries, exposure_at_default) {
            (Some(recoveries), Some(ead)) if ead != 0.0 => Some(recoveries / ead),
            _ => None,
        };

        LoanOutcome {
            date_of_default,
            exposure_at_default,
            prepayment_date: scan.prepayment_date,
            post_default_recoveries,
            recovery_percent,
        }
    }

    fn mark_at_risk(observations: &mut [EnrichedObservation], outcome: &LoanOutcome) {
        let is_next_month = |event: Option<chrono::NaiveDate>, period: chrono::NaiveDate| {
            event.is_some_and(|date| months_between(period, date) == 1)
        };

        for obs in observations.iter_mut() {
            let before_prepayment = outcome
                .prepayment_date
                .map_or(true, |date| month_index(obs.period) < month_index(date));

            obs.at_risk = !obs.defaulted && before_prepayment;
            obs.prepayment_next_month = is_next_month(outcome.prepayment_date, obs.period);
            obs.default_next_month = is_next_month(outcome.date_of_default, obs.period);
        }
    }
}
