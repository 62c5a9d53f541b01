//! Portfolio construction and metric aggregation
//!
//! A `Portfolio` is the static data, the enrichment engine and the aggregator
//! composed together: every loan history is enriched independently (in
//! parallel), failures are set aside as skipped loans, and metric tables are
//! computed over the enriched loans.

mod aggregator;
mod dimensions;
mod rates;
mod recovery;

pub use aggregator::PortfolioAggregator;
pub use dimensions::{IndexDimension, PivotAttribute, PivotValue};
pub use rates::{annualize, fill_undefined, ratio, RateCell, RateColumn, RateKind, RateTable};
pub use recovery::{RecoveryCell, RecoveryColumn, RecoveryCurve};

use rayon::prelude::*;
use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::enrichment::{EnrichedLoan, EnrichedRecord, EnrichmentEngine};
use crate::error::{LoanError, PortfolioError};
use crate::loan::{LoanHistory, StaticData};

/// A loan left out of the enriched portfolio
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedLoan {
    pub loan_id: String,
    pub reason: String,
}

impl From<&LoanError> for SkippedLoan {
    fn from(err: &LoanError) -> Self {
        Self {
            loan_id: err.loan_id().to_string(),
            reason: err.to_string(),
        }
    }
}

/// Enriched loans of one analysis run
#[derive(Debug, Clone)]
pub struct Portfolio {
    config: AnalysisConfig,
    loans: Vec<EnrichedLoan>,
    skipped: Vec<SkippedLoan>,
}

impl Portfolio {
    /// Enrich every history that has usable static data
    ///
    /// Per-loan failures are logged and recorded in `skipped`; the run only
    /// fails when no loan could be enriched.
    pub fn build(
        statics: &StaticData,
        histories: &[LoanHistory],
        config: &AnalysisConfig,
    ) -> Result<Self, PortfolioError> {
        let engine = EnrichmentEngine::new(config);

        let results: Vec<Result<EnrichedLoan, LoanError>> = histories
            .par_iter()
            .map(|history| {
                let loan = statics.lookup(&history.loan_id)?;
                engine.enrich(loan, history)
            })
            .collect();

        let mut loans = Vec::with_capacity(results.len());
        let mut skipped = Vec::new();
        for result in results {
            match result {
                Ok(loan) => loans.push(loan),
                Err(err) => {
                    log::warn!("Skipping {}", err);
                    skipped.push(SkippedLoan::from(&err));
                }
            }
        }

        if loans.is_empty() {
            return Err(PortfolioError::EmptyPortfolio {
                skipped: skipped.len(),
            });
        }

        log::info!(
            "Finished creating portfolio enriched data: {} loans enriched, {} skipped",
            loans.len(),
            skipped.len()
        );

        Ok(Self {
            config: config.clone(),
            loans,
            skipped,
        })
    }

    pub fn loans(&self) -> &[EnrichedLoan] {
        &self.loans
    }

    pub fn skipped(&self) -> &[SkippedLoan] {
        &self.skipped
    }

    pub fn loan(&self, loan_id: &str) -> Option<&EnrichedLoan> {
        self.loans.iter().find(|l| l.loan_id() == loan_id)
    }

    /// Portfolio-wide enriched table, one record per loan-month
    pub fn records(&self) -> impl Iterator<Item = EnrichedRecord> + '_ {
        self.loans.iter().flat_map(|loan| loan.records())
    }

    pub fn aggregator(&self) -> PortfolioAggregator<'_> {
        PortfolioAggregator::new(&self.loans)
    }

    /// CPR table using the configured index and pivots
    pub fn cpr_table(&self) -> RateTable {
        self.aggregator().cpr_table(self.config.index, &self.config.pivots)
    }

    /// CDR table using the configured index and pivots
    pub fn cdr_table(&self) -> RateTable {
        self.aggregator().cdr_table(self.config.index, &self.config.pivots)
    }

    /// Recovery curve using the configured pivots
    pub fn recovery_curve(&self) -> RecoveryCurve {
        self.aggregator().recovery_curve(&self.config.pivots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loan::{LoanStatic, MonthlyObservation, RepaymentMethod};
    use chrono::NaiveDate;

    fn static_loan(id: &str) -> LoanStatic {
        LoanStatic {
            loan_id: id.to_string(),
            original_balance: 5_000.0,
            origination_date: NaiveDate::from_ymd_opt(2020, 6, 30).unwrap(),
            reversion_date: NaiveDate::from_ymd_opt(2022, 6, 30).unwrap(),
            fixed_pre_reversion_rate: 0.03,
            post_reversion_margin: 0.04,
            months_to_maturity: 120,
            repayment_method: RepaymentMethod::InterestOnly,
            investor_acquisition_date: NaiveDate::from_ymd_opt(2020, 6, 30).unwrap(),
        }
    }

    fn history(id: &str, months: &[u32]) -> LoanHistory {
        let observations = months
            .iter()
            .map(|&m| MonthlyObservation::new(NaiveDate::from_ymd_opt(2021, m, 1).unwrap(), 5_000.0, 20.0, 20.0))
            .collect();
        LoanHistory::new(id, observations)
    }

    #[test]
    fn test_build_isolates_bad_loans() {
        let statics = StaticData::from_loans(vec![static_loan("A"), static_loan("B")]);
        let histories = vec![
            history("A", &[1, 2, 3]),
            history("B", &[1, 3, 2]),
            history("C", &[1, 2]),
        ];

        let portfolio = Portfolio::build(&statics, &histories, &AnalysisConfig::default()).unwrap();

        assert_eq!(portfolio.loans().len(), 1);
        assert_eq!(portfolio.loans()[0].loan_id(), "A");

        let skipped: Vec<&str> = portfolio.skipped().iter().map(|s| s.loan_id.as_str()).collect();
        assert_eq!(skipped, vec!["B", "C"]);
        assert_eq!(portfolio.records().count(), 3);
    }

    #[test]
    fn test_empty_portfolio_is_fatal() {
        let statics = StaticData::default();
        let histories = vec![history("A", &[1, 2])];

        let err = Portfolio::build(&statics, &histories, &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(err, PortfolioError::EmptyPortfolio { skipped: 1 }));
    }

    #[test]
    fn test_configured_tables() {
        let statics = StaticData::from_loans(vec![static_loan("A")]);
        let config = AnalysisConfig {
            index: IndexDimension::TimeToReversion,
            ..Default::default()
        };
        let portfolio = Portfolio::build(&statics, &[history("A", &[1, 2, 3])], &config).unwrap();

        let cpr = portfolio.cpr_table();
        assert_eq!(cpr.index, IndexDimension::TimeToReversion);
        assert_eq!(cpr.index_values, vec![-17, -16, -15]);
        assert_eq!(cpr.overall().unwrap().cell(-16).unwrap().annual, Some(0.0));
        assert!(portfolio.recovery_curve().is_empty());
    }
}
