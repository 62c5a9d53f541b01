//! Loan Performance CLI
//!
//! Enriches the loan histories and writes the enriched table, CPR/CDR tables
//! and recovery curve as CSV files.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;

use loan_performance::loan::loader::{
    LoadedSources, BALANCES_FILE, DEFAULT_DATA_PATH, PAYMENT_DUE_FILE, PAYMENT_MADE_FILE, STATIC_FILE,
};
use loan_performance::report;
use loan_performance::{AnalysisConfig, BalanceReconciliation, IndexDimension, PivotAttribute, Portfolio};

#[derive(Debug, Parser)]
#[command(name = "loan_performance", version, about = "Loan portfolio CPR/CDR and recovery analysis")]
struct Args {
    /// Directory holding the exported sheets
    #[arg(long, default_value = DEFAULT_DATA_PATH)]
    data_dir: PathBuf,

    /// JSON analysis config; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Index dimension for CPR/CDR (seasoning, time_to_reversion)
    #[arg(long)]
    index: Option<IndexDimension>,

    /// Pivot attribute, repeatable (vintage, repayment_method, reversion_year, ...)
    #[arg(long = "pivot")]
    pivots: Vec<PivotAttribute>,

    /// Reconcile current balance from the original balance instead of the reported one
    #[arg(long)]
    original_balance: bool,

    /// Only analyze this loan
    #[arg(long)]
    loan_id: Option<String>,

    /// Only analyze the first N loans
    #[arg(long)]
    limit: Option<usize>,

    /// Directory for output CSV files
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,
}

impl Args {
    fn analysis_config(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_json_path(path)
                .with_context(|| format!("reading config {}", path.display()))?,
            None => AnalysisConfig::default(),
        };

        if let Some(index) = self.index {
            config.index = index;
        }
        if !self.pivots.is_empty() {
            config.pivots = self.pivots.clone();
        }
        if self.original_balance {
            config.reconciliation = BalanceReconciliation::OriginalBalance;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let start = Instant::now();

    println!("Loan Performance v{}", env!("CARGO_PKG_VERSION"));
    println!("======================\n");

    let config = args.analysis_config()?;

    let mut sources = LoadedSources::load_files(
        &args.data_dir.join(STATIC_FILE),
        &args.data_dir.join(BALANCES_FILE),
        &args.data_dir.join(PAYMENT_DUE_FILE),
        &args.data_dir.join(PAYMENT_MADE_FILE),
    )
    .with_context(|| format!("loading data from {}", args.data_dir.display()))?;

    if let Some(loan_id) = &args.loan_id {
        sources.histories.retain(|h| &h.loan_id == loan_id);
    }
    if let Some(limit) = args.limit {
        sources.histories.truncate(limit);
    }
    println!("Loaded {} loan histories in {:?}", sources.histories.len(), start.elapsed());

    let portfolio = Portfolio::build(&sources.statics, &sources.histories, &config)?;
    println!(
        "Enriched {} loans ({} skipped)",
        portfolio.loans().len(),
        portfolio.skipped().len()
    );

    let cpr = portfolio.cpr_table();
    let cdr = portfolio.cdr_table();
    let recovery = portfolio.recovery_curve();

    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;
    let out = |name: &str| args.output_dir.join(name);

    report::write_enriched(&portfolio, &mut report::create_csv(&out("enriched.csv"))?)?;
    report::write_skipped(&portfolio, &mut report::create_csv(&out("skipped_loans.csv"))?)?;
    report::write_rate_table(&cpr, &mut report::create_csv(&out("cpr.csv"))?)?;
    report::write_rate_table(&cdr, &mut report::create_csv(&out("cdr.csv"))?)?;
    report::write_recovery_curve(&recovery, &mut report::create_csv(&out("recovery_curve.csv"))?)?;

    println!("\nResults written to: {}", args.output_dir.display());

    if let Some(column) = cpr.overall() {
        println!("\nCPR by {} (first 12):", cpr.index);
        println!("{:>6} {:>12} {:>12}", cpr.index.name(), "SMM", "CPR");
        for (t, rate) in column.cells.iter().take(12) {
            println!(
                "{:>6} {:>12} {:>12}",
                t,
                rate.monthly.map_or("-".to_string(), |v| format!("{:.6}", v)),
                rate.annual.map_or("-".to_string(), |v| format!("{:.6}", v)),
            );
        }
    }

    println!("\nTotal time: {:?}", start.elapsed());
    Ok(())
}
