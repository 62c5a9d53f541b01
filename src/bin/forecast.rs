//! Forecast a loan's balance run-off from portfolio CDR/CPR curves
//!
//! Builds CDR and CPR by time to reversion from the loan histories, lines the
//! curves up with the loan's months past reversion, and projects forward.
//! Use --json for machine-readable output.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;

use loan_performance::forecast::{ForecastRow, ForecastSummary};
use loan_performance::loan::loader::{LoadedSources, DEFAULT_DATA_PATH};
use loan_performance::portfolio::{fill_undefined, RateTable};
use loan_performance::report;
use loan_performance::{
    AnalysisConfig, ForecastEngine, ForecastInputs, ForecastLoan, IndexDimension, Portfolio, RepaymentMethod,
};

#[derive(Debug, Parser)]
#[command(name = "forecast", version, about = "Project loan cashflows under portfolio CDR/CPR curves")]
struct Args {
    #[arg(long, default_value = DEFAULT_DATA_PATH)]
    data_dir: PathBuf,

    /// Take the loan terms from this loan's last observation
    #[arg(long)]
    loan_id: Option<String>,

    #[arg(long, default_value_t = 100_000.0)]
    balance: f64,

    /// Months past reversion at the first forecast month (the last observed month + 1)
    #[arg(long, default_value_t = -22, allow_hyphen_values = true)]
    months_post_reversion: i32,

    #[arg(long, default_value_t = 0.0394)]
    fixed_rate: f64,

    #[arg(long, default_value_t = 0.0494)]
    margin: f64,

    #[arg(long, default_value_t = 178)]
    months_to_maturity: u32,

    /// Flat annual reference rate after reversion
    #[arg(long, default_value_t = 0.02)]
    reference_rate: f64,

    /// Forecast months (defaults to the end of the observed curves)
    #[arg(long)]
    horizon: Option<usize>,

    /// Output CSV path
    #[arg(long, default_value = "forecast_output.csv")]
    output: PathBuf,

    /// Print JSON to stdout instead of writing CSV
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct ForecastResponse<'a> {
    loan: &'a ForecastLoan,
    undefined_rates_filled: usize,
    summary: ForecastSummary,
    rows: &'a [ForecastRow],
}

/// Annual rates for index values `start, start + 1, ...`, undefined where unobserved
///
/// The rate at index `t` covers the transition from month `t` into `t + 1`.
fn aligned_curve(table: &RateTable, start: i32, horizon: usize) -> Vec<Option<f64>> {
    let column = table.overall();
    (0..horizon)
        .map(|i| column.and_then(|c| c.cell(start + i as i32)).and_then(|cell| cell.annual))
        .collect()
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let sources = LoadedSources::load_from(&args.data_dir)
        .with_context(|| format!("loading data from {}", args.data_dir.display()))?;

    let config = AnalysisConfig {
        index: IndexDimension::TimeToReversion,
        ..Default::default()
    };
    let portfolio = Portfolio::build(&sources.statics, &sources.histories, &config)?;
    let cpr = portfolio.cpr_table();
    let cdr = portfolio.cdr_table();

    let loan = match &args.loan_id {
        Some(id) => {
            let enriched = portfolio
                .loan(id)
                .with_context(|| format!("loan {} not in enriched portfolio", id))?;
            ForecastLoan::from_enriched(enriched).with_context(|| format!("loan {} has no observations", id))?
        }
        None => ForecastLoan {
            current_balance: args.balance,
            months_post_reversion: args.months_post_reversion,
            seasoning: 0,
            fixed_pre_reversion_rate: args.fixed_rate,
            post_reversion_margin: args.margin,
            months_to_maturity: args.months_to_maturity,
            repayment_method: RepaymentMethod::InterestOnly,
        },
    };

    // Curves start at the last observed month, one before the first forecast month
    let curve_start = loan.months_post_reversion - 1;
    let last_index = cpr.index_values.last().copied().unwrap_or(curve_start);
    let horizon = args
        .horizon
        .unwrap_or_else(|| (last_index - curve_start + 1).max(0) as usize);
    if horizon == 0 {
        bail!("no observed curve beyond month {} past reversion", curve_start);
    }

    let (cdr_curve, cdr_filled) = fill_undefined(&aligned_curve(&cdr, curve_start, horizon), 0.0);
    let (cpr_curve, cpr_filled) = fill_undefined(&aligned_curve(&cpr, curve_start, horizon), 0.0);
    if cdr_filled + cpr_filled > 0 {
        log::warn!(
            "{} undefined CDR and {} undefined CPR months set to zero",
            cdr_filled,
            cpr_filled
        );
    }

    let inputs = ForecastInputs::with_flat_reference(cdr_curve, cpr_curve, args.reference_rate);
    let engine = ForecastEngine::new(inputs)?;
    let result = engine.project(&loan);
    let summary = result.summary();

    if args.json {
        let response = ForecastResponse {
            loan: &loan,
            undefined_rates_filled: cdr_filled + cpr_filled,
            summary,
            rows: &result.rows,
        };
        println!("{}", serde_json::to_string(&response)?);
        return Ok(());
    }

    report::write_forecast(&result, &mut report::create_csv(&args.output)?)?;

    println!("Forecast ({} months) written to: {}", summary.total_months, args.output.display());
    println!("  Starting balance: ${:.2}", result.starting_balance);
    println!("  Total defaults:   ${:.2}", summary.total_defaults);
    println!("  Total prepays:    ${:.2}", summary.total_prepayments);
    println!("  Total interest:   ${:.2}", summary.total_interest);
    println!("  Final balance:    ${:.2}", summary.final_balance);

    Ok(())
}
