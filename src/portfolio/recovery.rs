//! Post-default recovery curves

use serde::Serialize;
use std::collections::BTreeMap;

use super::dimensions::PivotValue;
use super::rates::ratio;

/// Recovery position at one `months_since_default` value
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecoveryCell {
    /// Defaulted loans observed at this offset
    pub observations: usize,

    /// Sum of cumulative recoveries
    pub recovered: f64,

    /// Sum of exposure at default
    pub exposure: f64,

    pub fraction: Option<f64>,
}

impl RecoveryCell {
    pub fn from_sums(observations: usize, recovered: f64, exposure: f64) -> Self {
        Self {
            observations,
            recovered,
            exposure,
            fraction: ratio(recovered, exposure),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveryColumn {
    pub pivot: Option<PivotValue>,
    pub cells: BTreeMap<i32, RecoveryCell>,
}

impl RecoveryColumn {
    pub fn label(&self) -> String {
        self.pivot.as_ref().map_or_else(|| "all".to_string(), PivotValue::label)
    }

    pub fn fraction(&self, months_since_default: i32) -> Option<f64> {
        self.cells.get(&months_since_default).and_then(|c| c.fraction)
    }
}

/// Fraction of defaulted exposure recovered, by months since default
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveryCurve {
    /// Months since default present among defaulted loans, ascending from 0
    pub index_values: Vec<i32>,
    pub columns: Vec<RecoveryColumn>,
}

impl RecoveryCurve {
    pub fn column(&self, label: &str) -> Option<&RecoveryColumn> {
        self.columns.iter().find(|c| c.label() == label)
    }

    pub fn overall(&self) -> Option<&RecoveryColumn> {
        self.columns.iter().find(|c| c.pivot.is_none())
    }

    pub fn is_empty(&self) -> bool {
        self.index_values.is_empty()
    }
}
