//! CPR/CDR rate tables

use serde::Serialize;
use std::collections::BTreeMap;

use super::dimensions::{IndexDimension, PivotValue};

/// Annualize a single-month rate: `1 - (1 - monthly)^12`
pub fn annualize(monthly: f64) -> f64 {
    1.0 - (1.0 - monthly).powf(12.0)
}

/// Ratio that is undefined for a zero denominator
pub fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}

/// Which terminal event a rate table measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RateKind {
    /// SMM / CPR
    Prepayment,
    /// MDR / CDR
    Default,
}

impl RateKind {
    pub fn monthly_name(&self) -> &'static str {
        match self {
            RateKind::Prepayment => "smm",
            RateKind::Default => "mdr",
        }
    }

    pub fn annual_name(&self) -> &'static str {
        match self {
            RateKind::Prepayment => "cpr",
            RateKind::Default => "cdr",
        }
    }
}

/// Rate for one index value in one column
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RateCell {
    /// Observations contributing to the denominator
    pub observations: usize,

    /// Balance transitioning in the following month
    pub numerator: f64,

    /// At-risk balance
    pub denominator: f64,

    pub monthly: Option<f64>,
    pub annual: Option<f64>,
}

impl RateCell {
    pub fn from_sums(observations: usize, numerator: f64, denominator: f64) -> Self {
        let monthly = ratio(numerator, denominator);
        Self {
            observations,
            numerator,
            denominator,
            monthly,
            annual: monthly.map(annualize),
        }
    }

    /// Cell for an index value with no observations
    pub fn undefined() -> Self {
        Self::default()
    }
}

/// One column of a rate table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateColumn {
    /// `None` for the whole-portfolio column
    pub pivot: Option<PivotValue>,
    pub cells: BTreeMap<i32, RateCell>,
}

impl RateColumn {
    pub fn label(&self) -> String {
        self.pivot.as_ref().map_or_else(|| "all".to_string(), PivotValue::label)
    }

    pub fn cell(&self, index: i32) -> Option<&RateCell> {
        self.cells.get(&index)
    }
}

/// CPR or CDR table keyed by an index dimension
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateTable {
    pub kind: RateKind,
    pub index: IndexDimension,
    /// Every index value seen in the portfolio, ascending
    pub index_values: Vec<i32>,
    pub columns: Vec<RateColumn>,
}

impl RateTable {
    pub fn column(&self, label: &str) -> Option<&RateColumn> {
        self.columns.iter().find(|c| c.label() == label)
    }

    /// The unpivoted column, if the table has one
    pub fn overall(&self) -> Option<&RateColumn> {
        self.columns.iter().find(|c| c.pivot.is_none())
    }
}

/// Replace undefined rates with `fill`, returning how many were replaced
pub fn fill_undefined(curve: &[Option<f64>], fill: f64) -> (Vec<f64>, usize) {
    let filled = curve.iter().filter(|r| r.is_none()).count();
    (curve.iter().map(|r| r.unwrap_or(fill)).collect(), filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_annualize_matches_formula_exactly() {
        for smm in [0.0, 0.001, 0.01, 0.07, 1.0 / 3.0, 0.5, 1.0] {
            assert_eq!(annualize(smm).to_bits(), (1.0 - (1.0 - smm).powf(12.0)).to_bits());
            let cpr = annualize(smm);
            assert!((0.0..=1.0).contains(&cpr));
        }
    }

    #[test]
    fn test_annualize_bit_exact_over_grid() {
        for k in 1..100_000u32 {
            let smm = f64::from(k) / 100_000.0;
            assert_eq!(annualize(smm).to_bits(), (1.0 - (1.0 - smm).powf(12.0)).to_bits(), "smm {}", smm);
        }
    }

    #[test]
    fn test_cell_undefined_on_zero_denominator() {
        let cell = RateCell::from_sums(0, 0.0, 0.0);
        assert_eq!(cell.monthly, None);
        assert_eq!(cell.annual, None);

        let cell = RateCell::from_sums(2, 1000.0, 3000.0);
        assert_relative_eq!(cell.monthly.unwrap(), 1.0 / 3.0);
        assert_relative_eq!(cell.annual.unwrap(), 0.992292, epsilon = 1e-6);
    }

    #[test]
    fn test_fill_undefined() {
        let (filled, count) = fill_undefined(&[Some(0.1), None, Some(0.2)], 0.0);
        assert_eq!(filled, vec![0.1, 0.0, 0.2]);
        assert_eq!(count, 1);
    }
}
