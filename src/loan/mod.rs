//! Loan static data, monthly observations and the CSV loading adapter

mod data;
pub mod loader;

pub use data::{month_index, months_between, LoanHistory, LoanStatic, MonthlyObservation, RepaymentMethod};
pub use loader::{assemble_histories, load_static, LoadedSources, MonthlyMatrix, StaticData};
