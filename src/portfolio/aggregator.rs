//! Portfolio-level CPR, CDR and recovery curve aggregation
//!
//! Rates are balance-weighted over the at-risk population: a loan stops
//! contributing exposure from the month it defaults or prepays.

use std::collections::{BTreeMap, BTreeSet};

use super::dimensions::{IndexDimension, PivotAttribute, PivotValue};
use super::rates::{RateCell, RateColumn, RateKind, RateTable};
use super::recovery::{RecoveryCell, RecoveryColumn, RecoveryCurve};
use crate::enrichment::{EnrichedLoan, EnrichedObservation};

/// Computes metric tables over a set of enriched loans
#[derive(Debug, Clone, Copy)]
pub struct PortfolioAggregator<'a> {
    loans: &'a [EnrichedLoan],
}

impl<'a> PortfolioAggregator<'a> {
    pub fn new(loans: &'a [EnrichedLoan]) -> Self {
        Self { loans }
    }

    /// SMM and CPR by index value, optionally pivoted
    pub fn cpr_table(&self, index: IndexDimension, pivots: &[PivotAttribute]) -> RateTable {
        self.rate_table(RateKind::Prepayment, index, pivots)
    }

    /// MDR and CDR by index value, optionally pivoted
    pub fn cdr_table(&self, index: IndexDimension, pivots: &[PivotAttribute]) -> RateTable {
        self.rate_table(RateKind::Default, index, pivots)
    }

    pub fn rate_table(&self, kind: RateKind, index: IndexDimension, pivots: &[PivotAttribute]) -> RateTable {
        let index_values: Vec<i32> = self
            .observations()
            .map(|(_, obs)| index.value(obs))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let columns = self
            .column_selectors(pivots, |_, _| true)
            .into_iter()
            .map(|pivot| self.rate_column(kind, index, &index_values, pivot))
            .collect();

        RateTable {
            kind,
            index,
            index_values,
            columns,
        }
    }

    fn rate_column(
        &self,
        kind: RateKind,
        index: IndexDimension,
        index_values: &[i32],
        pivot: Option<PivotValue>,
    ) -> RateColumn {
        // index value -> (at-risk observations, numerator, denominator)
        let mut sums: BTreeMap<i32, (usize, f64, f64)> = BTreeMap::new();

        for (loan, obs) in self.observations() {
            if !obs.at_risk || !pivot.as_ref().map_or(true, |p| p.matches(loan, obs)) {
                continue;
            }

            let transitions_next_month = match kind {
                RateKind::Prepayment => obs.prepayment_next_month,
                RateKind::Default => obs.default_next_month,
            };

            let entry = sums.entry(index.value(obs)).or_insert((0, 0.0, 0.0));
            entry.0 += 1;
            entry.2 += obs.current_balance;
            if transitions_next_month {
                entry.1 += obs.current_balance;
            }
        }

        let cells = index_values
            .iter()
            .map(|&t| {
                let cell = match sums.get(&t) {
                    Some(&(count, numerator, denominator)) => RateCell::from_sums(count, numerator, denominator),
                    None => RateCell::undefined(),
                };
                (t, cell)
            })
            .collect();

        RateColumn { pivot, cells }
    }

    /// Cumulative recovery fraction by months since default, optionally pivoted
    ///
    /// Only rows of defaulted loans from the default month onward are used.
    pub fn recovery_curve(&self, pivots: &[PivotAttribute]) -> RecoveryCurve {
        let index_values: Vec<i32> = self
            .post_default_observations()
            .map(|(_, _, n)| n)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let columns = self
            .column_selectors(pivots, |loan, obs| {
                loan.months_since_default(obs).is_some_and(|n| n >= 0)
            })
            .into_iter()
            .map(|pivot| self.recovery_column(&index_values, pivot))
            .collect();

        RecoveryCurve { index_values, columns }
    }

    fn recovery_column(&self, index_values: &[i32], pivot: Option<PivotValue>) -> RecoveryColumn {
        let mut sums: BTreeMap<i32, (usize, f64, f64)> = BTreeMap::new();

        for (loan, obs, n) in self.post_default_observations() {
            if !pivot.as_ref().map_or(true, |p| p.matches(loan, obs)) {
                continue;
            }
            let entry = sums.entry(n).or_insert((0, 0.0, 0.0));
            entry.0 += 1;
            entry.1 += obs.recovery_cumsum;
            entry.2 += loan.outcome.exposure_at_default.unwrap_or(0.0);
        }

        let cells = index_values
            .iter()
            .map(|&n| {
                let cell = match sums.get(&n) {
                    Some(&(count, recovered, exposure)) => RecoveryCell::from_sums(count, recovered, exposure),
                    None => RecoveryCell::default(),
                };
                (n, cell)
            })
            .collect();

        RecoveryColumn { pivot, cells }
    }

    fn observations(&self) -> impl Iterator<Item = (&'a EnrichedLoan, &'a EnrichedObservation)> + 'a {
        let loans = self.loans;
        loans
            .iter()
            .flat_map(|loan| loan.observations.iter().map(move |obs| (loan, obs)))
    }

    fn post_default_observations(&self) -> impl Iterator<Item = (&'a EnrichedLoan, &'a EnrichedObservation, i32)> + 'a {
        self.observations().filter_map(|(loan, obs)| {
            loan.months_since_default(obs)
                .filter(|&n| n >= 0)
                .map(|n| (loan, obs, n))
        })
    }

    /// One unpivoted selector, or one per distinct value of each pivot
    fn column_selectors<F>(&self, pivots: &[PivotAttribute], include: F) -> Vec<Option<PivotValue>>
    where
        F: Fn(&EnrichedLoan, &EnrichedObservation) -> bool,
    {
        if pivots.is_empty() {
            return vec![None];
        }

        let mut selectors = Vec::new();
        for &attribute in pivots {
            let values: BTreeSet<String> = self
                .observations()
                .filter(|&(loan, obs)| include(loan, obs))
                .filter_map(|(loan, obs)| attribute.value(loan, obs))
                .collect();

            selectors.extend(values.into_iter().map(|value| Some(PivotValue { attribute, value })));
        }
        selectors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::EnrichmentEngine;
    use crate::loan::{LoanHistory, LoanStatic, MonthlyObservation, RepaymentMethod};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn period(month: u32) -> NaiveDate {
        // month 1 = January 2021
        NaiveDate::from_ymd_opt(2021, month, 28).unwrap()
    }

    /// Originated December 2020, so seasoning equals the 2021 month number
    fn static_loan(id: &str, reversion_year: i32, method: RepaymentMethod) -> LoanStatic {
        LoanStatic {
            loan_id: id.to_string(),
            original_balance: 10_000.0,
            origination_date: NaiveDate::from_ymd_opt(2020, 12, 31).unwrap(),
            reversion_date: NaiveDate::from_ymd_opt(reversion_year, 12, 31).unwrap(),
            fixed_pre_reversion_rate: 0.04,
            post_reversion_margin: 0.05,
            months_to_maturity: 240,
            repayment_method: method,
            investor_acquisition_date: NaiveDate::from_ymd_opt(2020, 1, 31).unwrap(),
        }
    }

    fn enrich(loan: LoanStatic, rows: &[(f64, f64, f64)]) -> EnrichedLoan {
        let observations = rows
            .iter()
            .enumerate()
            .map(|(i, &(b, d, m))| MonthlyObservation::new(period(i as u32 + 1), b, d, m))
            .collect();
        let history = LoanHistory::new(loan.loan_id.clone(), observations);
        EnrichmentEngine::default().enrich(&loan, &history).unwrap()
    }

    /// Prepays in month 5 with current balance 1000 in month 4
    fn prepaying_loan() -> EnrichedLoan {
        let rows = [
            (1000.0, 10.0, 10.0),
            (1000.0, 10.0, 10.0),
            (1000.0, 10.0, 10.0),
            (1000.0, 10.0, 10.0),
            (0.0, 10.0, 1010.0),
        ];
        enrich(static_loan("P", 2022, RepaymentMethod::InterestOnly), &rows)
    }

    /// Performs throughout at 2000
    fn performing_loan() -> EnrichedLoan {
        enrich(static_loan("Q", 2022, RepaymentMethod::Amortizing), &[(2000.0, 20.0, 20.0); 6])
    }

    /// Misses months 2-4 (defaults in month 4), recovers 600 then 400
    fn defaulting_loan() -> EnrichedLoan {
        let rows = [
            (3000.0, 30.0, 30.0),
            (3000.0, 30.0, 0.0),
            (3000.0, 30.0, 0.0),
            (3000.0, 30.0, 0.0),
            (3000.0, 30.0, 600.0),
            (3000.0, 30.0, 400.0),
        ];
        enrich(static_loan("D", 2023, RepaymentMethod::InterestOnly), &rows)
    }

    #[test]
    fn test_two_loan_smm_at_seasoning_four() {
        let loans = vec![prepaying_loan(), performing_loan()];
        let table = PortfolioAggregator::new(&loans).cpr_table(IndexDimension::Seasoning, &[]);

        let column = table.overall().unwrap();
        let cell = column.cell(4).unwrap();
        assert_relative_eq!(cell.numerator, 1000.0);
        assert_relative_eq!(cell.denominator, 3000.0);
        assert_relative_eq!(cell.monthly.unwrap(), 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(cell.annual.unwrap(), 0.9923, epsilon = 1e-4);

        // Prepaid loan leaves the at-risk population from month 5
        let cell5 = column.cell(5).unwrap();
        assert_relative_eq!(cell5.denominator, 2000.0);
        assert_eq!(cell5.monthly, Some(0.0));
        assert_eq!(table.index_values, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_cdr_excludes_defaulted_rows() {
        let loans = vec![defaulting_loan(), performing_loan()];
        let table = PortfolioAggregator::new(&loans).cdr_table(IndexDimension::Seasoning, &[]);
        let column = table.overall().unwrap();

        // Month 3 row precedes the default month; balance 3000 - 30 + 0
        let cell3 = column.cell(3).unwrap();
        assert_relative_eq!(cell3.numerator, 2970.0);
        assert_relative_eq!(cell3.denominator, 2970.0 + 2000.0);

        // From the default month the loan is out of the denominator
        let cell4 = column.cell(4).unwrap();
        assert_eq!(cell4.observations, 1);
        assert_relative_eq!(cell4.denominator, 2000.0);
        assert_eq!(cell4.monthly, Some(0.0));

        for cell in column.cells.values() {
            if let Some(cdr) = cell.annual {
                assert!((0.0..=1.0).contains(&cdr));
            }
        }
    }

    #[test]
    fn test_pivot_columns_have_undefined_cells() {
        let loans = vec![prepaying_loan(), performing_loan(), defaulting_loan()];
        let table =
            PortfolioAggregator::new(&loans).cpr_table(IndexDimension::Seasoning, &[PivotAttribute::RepaymentMethod]);

        let labels: Vec<String> = table.columns.iter().map(|c| c.label()).collect();
        assert_eq!(labels, vec!["repayment_method_amortizing", "repayment_method_interest_only"]);

        let io = table.column("repayment_method_interest_only").unwrap();
        // Month 6: prepaid loan gone, defaulted loan out of the at-risk set
        let cell = io.cell(6).unwrap();
        assert_eq!(cell.observations, 0);
        assert_eq!(cell.monthly, None);

        let io4 = io.cell(4).unwrap();
        assert_relative_eq!(io4.monthly.unwrap(), 1000.0 / 1000.0);
    }

    #[test]
    fn test_each_pivot_evaluated_independently() {
        let loans = vec![prepaying_loan(), performing_loan(), defaulting_loan()];
        let table = PortfolioAggregator::new(&loans).cdr_table(
            IndexDimension::Seasoning,
            &[PivotAttribute::ReversionYear, PivotAttribute::RepaymentMethod],
        );

        let labels: Vec<String> = table.columns.iter().map(|c| c.label()).collect();
        assert_eq!(
            labels,
            vec![
                "reversion_year_2022",
                "reversion_year_2023",
                "repayment_method_amortizing",
                "repayment_method_interest_only"
            ]
        );

        let r2023 = table.column("reversion_year_2023").unwrap();
        assert_relative_eq!(r2023.cell(3).unwrap().monthly.unwrap(), 1.0);
    }

    #[test]
    fn test_recovery_curve() {
        let loans = vec![defaulting_loan(), performing_loan()];
        let curve = PortfolioAggregator::new(&loans).recovery_curve(&[]);

        assert_eq!(curve.index_values, vec![0, 1, 2]);
        let column = curve.overall().unwrap();

        let ead = 2970.0;
        assert_relative_eq!(column.fraction(0).unwrap(), 0.0);
        assert_relative_eq!(column.fraction(1).unwrap(), 600.0 / ead);
        assert_relative_eq!(column.fraction(2).unwrap(), 1000.0 / ead);

        let fractions: Vec<f64> = curve.index_values.iter().filter_map(|&n| column.fraction(n)).collect();
        assert!(fractions.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_recovery_curve_default_year_pivot() {
        let loans = vec![defaulting_loan(), performing_loan()];
        let curve = PortfolioAggregator::new(&loans).recovery_curve(&[PivotAttribute::DefaultYear]);

        assert_eq!(curve.columns.len(), 1);
        assert_eq!(curve.columns[0].label(), "default_year_2021");
    }

    #[test]
    fn test_recovery_curve_empty_without_defaults() {
        let loans = vec![performing_loan()];
        let curve = PortfolioAggregator::new(&loans).recovery_curve(&[]);
        assert!(curve.is_empty());
    }
}
