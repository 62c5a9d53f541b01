//! Loan cashflow forecasting under CDR/CPR curves

mod engine;
mod rows;

pub use engine::{monthly_rate, ForecastEngine, ForecastInputs, ForecastLoan};
pub use rows::{ForecastResult, ForecastRow, ForecastSummary};
