//! Per-loan performance state machine and scan accumulator

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Performance state of a loan after a given month
///
/// `Performing -> Arrears(n) -> Defaulted` and `Performing/Arrears(n) -> Prepaid`.
/// `Defaulted` and `Prepaid` are terminal and mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoanState {
    #[default]
    Performing,
    /// Number of consecutive missed payments, below the default threshold
    Arrears(u32),
    Defaulted,
    Prepaid,
}

/// Terminal event fired by a state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    None,
    Default,
    Prepayment,
}

impl LoanState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanState::Defaulted | LoanState::Prepaid)
    }

    /// Advance one month
    ///
    /// Default is checked before prepayment, so it wins when both conditions
    /// hold in the same month.
    pub fn step(self, consecutive_missed: u32, paid_off: bool, default_threshold: u32) -> (LoanState, Transition) {
        if self.is_terminal() {
            return (self, Transition::None);
        }

        if consecutive_missed >= default_threshold {
            (LoanState::Defaulted, Transition::Default)
        } else if paid_off {
            (LoanState::Prepaid, Transition::Prepayment)
        } else if consecutive_missed > 0 {
            (LoanState::Arrears(consecutive_missed), Transition::None)
        } else {
            (LoanState::Performing, Transition::None)
        }
    }
}

impl fmt::Display for LoanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoanState::Performing => f.write_str("performing"),
            LoanState::Arrears(n) => write!(f, "arrears_{}", n),
            LoanState::Defaulted => f.write_str("defaulted"),
            LoanState::Prepaid => f.write_str("prepaid"),
        }
    }
}

/// Running state carried across one loan's scan
#[derive(Debug, Clone, Default)]
pub struct ScanState {
    pub loan_state: LoanState,

    /// Run length of missed payments, reset on any non-missed month
    pub consecutive_missed: u32,

    /// Cumulative payments received (for original-balance reconciliation)
    pub cumulative_made: f64,

    /// Recoveries received since default
    pub recovery_cumsum: f64,

    /// Default month and current balance at default
    pub default_event: Option<(NaiveDate, f64)>,

    pub prepayment_date: Option<NaiveDate>,
}

impl ScanState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_defaulted(&self) -> bool {
        self.loan_state == LoanState::Defaulted
    }

    pub fn is_prepaid(&self) -> bool {
        self.loan_state == LoanState::Prepaid
    }

    /// Update the missed-payment run length
    pub fn record_payment(&mut self, missed: bool, payment_made: f64) {
        self.consecutive_missed = if missed { self.consecutive_missed + 1 } else { 0 };
        self.cumulative_made += payment_made;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arrears_then_default() {
        let (s1, t1) = LoanState::Performing.step(1, false, 3);
        assert_eq!((s1, t1), (LoanState::Arrears(1), Transition::None));

        let (s2, _) = s1.step(2, false, 3);
        assert_eq!(s2, LoanState::Arrears(2));

        let (s3, t3) = s2.step(3, false, 3);
        assert_eq!((s3, t3), (LoanState::Defaulted, Transition::Default));
    }

    #[test]
    fn test_cure_returns_to_performing() {
        let (state, _) = LoanState::Arrears(2).step(0, false, 3);
        assert_eq!(state, LoanState::Performing);
    }

    #[test]
    fn test_default_wins_tie() {
        let (state, transition) = LoanState::Arrears(2).step(3, true, 3);
        assert_eq!(state, LoanState::Defaulted);
        assert_eq!(transition, Transition::Default);
    }

    #[test]
    fn test_terminal_states_stick() {
        assert_eq!(LoanState::Defaulted.step(0, true, 3), (LoanState::Defaulted, Transition::None));
        assert_eq!(LoanState::Prepaid.step(5, false, 3), (LoanState::Prepaid, Transition::None));
    }

    #[test]
    fn test_run_length_resets() {
        let mut scan = ScanState::new();
        scan.record_payment(true, 0.0);
        scan.record_payment(true, 0.0);
        assert_eq!(scan.consecutive_missed, 2);
        scan.record_payment(false, 10.0);
        assert_eq!(scan.consecutive_missed, 0);
        assert_eq!(scan.cumulative_made, 10.0);
    }
}
