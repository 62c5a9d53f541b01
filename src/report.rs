//! CSV output for enriched data, metric tables and forecasts
//!
//! Undefined values are written as empty cells.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use csv::Writer;

use crate::forecast::ForecastResult;
use crate::portfolio::{Portfolio, RateColumn, RateTable, RecoveryCurve};

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Create a CSV writer over a new file
pub fn create_csv(path: &Path) -> Result<Writer<File>, csv::Error> {
    Writer::from_path(path)
}

/// Portfolio-wide enriched table
pub fn write_enriched<W: Write>(portfolio: &Portfolio, writer: &mut Writer<W>) -> Result<(), csv::Error> {
    for record in portfolio.records() {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Loans excluded from the enriched portfolio
pub fn write_skipped<W: Write>(portfolio: &Portfolio, writer: &mut Writer<W>) -> Result<(), csv::Error> {
    writer.write_record(["loan_id", "reason"])?;
    for skipped in portfolio.skipped() {
        writer.write_record([skipped.loan_id.as_str(), skipped.reason.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}

fn rate_headers(table: &RateTable, column: &RateColumn) -> [String; 2] {
    match &column.pivot {
        None => [table.kind.monthly_name().to_string(), table.kind.annual_name().to_string()],
        Some(pivot) => [
            format!("{}_{}", table.kind.monthly_name(), pivot.label()),
            format!("{}_{}", table.kind.annual_name(), pivot.label()),
        ],
    }
}

/// CPR/CDR table: index column, then monthly and annual rate per column
pub fn write_rate_table<W: Write>(table: &RateTable, writer: &mut Writer<W>) -> Result<(), csv::Error> {
    let mut header = vec![table.index.name().to_string()];
    for column in &table.columns {
        header.extend(rate_headers(table, column));
    }
    writer.write_record(&header)?;

    for &t in &table.index_values {
        let mut record = vec![t.to_string()];
        for column in &table.columns {
            let rate = column.cell(t);
            record.push(cell(rate.and_then(|c| c.monthly)));
            record.push(cell(rate.and_then(|c| c.annual)));
        }
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Recovery curve: months since default, then one fraction per column
pub fn write_recovery_curve<W: Write>(curve: &RecoveryCurve, writer: &mut Writer<W>) -> Result<(), csv::Error> {
    let mut header = vec!["months_since_default".to_string()];
    header.extend(curve.columns.iter().map(|c| match &c.pivot {
        None => "recovery_curve".to_string(),
        Some(pivot) => format!("recovery_curve_{}", pivot.label()),
    }));
    writer.write_record(&header)?;

    for &n in &curve.index_values {
        let mut record = vec![n.to_string()];
        record.extend(curve.columns.iter().map(|c| cell(c.fraction(n))));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Forecast rows, one per projected month
pub fn write_forecast<W: Write>(result: &ForecastResult, writer: &mut Writer<W>) -> Result<(), csv::Error> {
    for row in &result.rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
