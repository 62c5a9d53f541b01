//! Index dimensions and pivot attributes for metric tables

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::enrichment::{EnrichedLoan, EnrichedObservation};

/// Primary row index of a CPR/CDR table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexDimension {
    /// Months since origination
    #[default]
    Seasoning,
    /// Months relative to the rate reversion date
    TimeToReversion,
}

impl IndexDimension {
    pub fn value(&self, obs: &EnrichedObservation) -> i32 {
        match self {
            IndexDimension::Seasoning => obs.seasoning,
            IndexDimension::TimeToReversion => obs.time_to_reversion,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            IndexDimension::Seasoning => "seasoning",
            IndexDimension::TimeToReversion => "time_to_reversion",
        }
    }
}

impl fmt::Display for IndexDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IndexDimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "seasoning" => Ok(IndexDimension::Seasoning),
            "time_to_reversion" => Ok(IndexDimension::TimeToReversion),
            other => Err(format!("unknown index dimension '{}'", other)),
        }
    }
}

/// Attribute used to partition the population into separate columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PivotAttribute {
    /// Origination year
    Vintage,
    RepaymentMethod,
    ReversionYear,
    /// Observation falls after the investor acquisition date
    PostAcquisition,
    Seasoning,
    TimeToReversion,
    /// Year of default; defaulted loans only
    DefaultYear,
}

impl PivotAttribute {
    pub const ALL: [PivotAttribute; 7] = [
        PivotAttribute::Vintage,
        PivotAttribute::RepaymentMethod,
        PivotAttribute::ReversionYear,
        PivotAttribute::PostAcquisition,
        PivotAttribute::Seasoning,
        PivotAttribute::TimeToReversion,
        PivotAttribute::DefaultYear,
    ];

    /// Pivot value for one observation, `None` when the attribute does not apply
    pub fn value(&self, loan: &EnrichedLoan, obs: &EnrichedObservation) -> Option<String> {
        use chrono::Datelike;

        match self {
            PivotAttribute::Vintage => Some(loan.loan.vintage().to_string()),
            PivotAttribute::RepaymentMethod => Some(loan.loan.repayment_method.to_string()),
            PivotAttribute::ReversionYear => Some(loan.loan.reversion_date.year().to_string()),
            PivotAttribute::PostAcquisition => Some(obs.is_post_acquisition.to_string()),
            PivotAttribute::Seasoning => Some(obs.seasoning.to_string()),
            PivotAttribute::TimeToReversion => Some(obs.time_to_reversion.to_string()),
            PivotAttribute::DefaultYear => loan.outcome.year_of_default().map(|y| y.to_string()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PivotAttribute::Vintage => "vintage",
            PivotAttribute::RepaymentMethod => "repayment_method",
            PivotAttribute::ReversionYear => "reversion_year",
            PivotAttribute::PostAcquisition => "post_acquisition",
            PivotAttribute::Seasoning => "seasoning",
            PivotAttribute::TimeToReversion => "time_to_reversion",
            PivotAttribute::DefaultYear => "default_year",
        }
    }
}

impl fmt::Display for PivotAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PivotAttribute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name() == s)
            .ok_or_else(|| format!("unknown pivot attribute '{}'", s))
    }
}

/// Column selector: the whole population or one pivot partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotValue {
    pub attribute: PivotAttribute,
    pub value: String,
}

impl PivotValue {
    pub fn matches(&self, loan: &EnrichedLoan, obs: &EnrichedObservation) -> bool {
        self.attribute.value(loan, obs).as_deref() == Some(self.value.as_str())
    }

    /// Column suffix, e.g. `vintage_2019`
    pub fn label(&self) -> String {
        format!("{}_{}", self.attribute.name(), self.value)
    }
}
