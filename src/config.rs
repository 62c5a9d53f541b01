//! Analysis configuration
//!
//! Defaults reproduce the canonical pipeline: reported-balance reconciliation,
//! default on the third consecutive missed payment, seasoning index.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

use crate::error::ConfigError;
use crate::portfolio::{IndexDimension, PivotAttribute};

/// Number of consecutive missed payments that constitutes a default
pub const DEFAULT_MISSED_PAYMENT_THRESHOLD: u32 = 3;

/// How the running current balance is reconciled from the observations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceReconciliation {
    /// `balance - payment_due + payment_made` for each month
    #[default]
    ReportedBalance,
    /// `original_balance - cumulative(payment_made)`
    ///
    /// Diverges from `ReportedBalance` whenever due and made differ.
    OriginalBalance,
}

/// Configuration for an enrichment and metrics run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Current balance reconciliation formula
    pub reconciliation: BalanceReconciliation,

    /// Consecutive missed payments that trigger default
    pub default_threshold: u32,

    /// Primary index for CPR/CDR tables
    pub index: IndexDimension,

    /// Pivot attributes, each evaluated independently
    pub pivots: Vec<PivotAttribute>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            reconciliation: BalanceReconciliation::ReportedBalance,
            default_threshold: DEFAULT_MISSED_PAYMENT_THRESHOLD,
            index: IndexDimension::Seasoning,
            pivots: Vec::new(),
        }
    }
}

impl AnalysisConfig {
    /// Load a JSON config; missing fields take their defaults
    pub fn from_json_path(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_reader(File::open(path)?)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_threshold == 0 {
            return Err(ConfigError::InvalidThreshold);
        }
        Ok(())
    }
}
