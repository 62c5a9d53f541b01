//! Per-loan performance enrichment

mod engine;
mod rows;
mod state;

pub use engine::EnrichmentEngine;
pub use rows::{EnrichedLoan, EnrichedObservation, EnrichedRecord, LoanOutcome};
pub use state::{LoanState, ScanState, Transition};
