//! Loan Performance - portfolio analytics over monthly loan histories
//!
//! This library provides:
//! - Loading of loan static data and monthly balance/payment matrices
//! - Per-loan enrichment (arrears, default, prepayment, recoveries)
//! - Portfolio CPR/CDR tables and recovery curves, optionally pivoted
//! - Cashflow forecasts driven by CDR/CPR curves

pub mod config;
pub mod enrichment;
pub mod error;
pub mod forecast;
pub mod loan;
pub mod portfolio;
pub mod report;

// Re-export commonly used types
pub use config::{AnalysisConfig, BalanceReconciliation};
pub use enrichment::{EnrichedLoan, EnrichedObservation, EnrichmentEngine, LoanState};
pub use error::{ConfigError, DataError, ForecastError, LoanError, PortfolioError};
pub use forecast::{ForecastEngine, ForecastInputs, ForecastLoan, ForecastResult};
pub use loan::{LoanHistory, LoanStatic, MonthlyObservation, RepaymentMethod, StaticData};
pub use portfolio::{IndexDimension, PivotAttribute, Portfolio, PortfolioAggregator, RateTable, RecoveryCurve};
