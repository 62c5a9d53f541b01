//! Load loan static data and monthly matrices from CSV exports
//!
//! The source workbook has one static sheet and three wide sheets
//! (month-end balances, payment due, payment made) with one row per loan and
//! one column per month. Each sheet is exported to its own CSV file.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use csv::Reader;

use super::{month_index, LoanHistory, LoanStatic, MonthlyObservation, RepaymentMethod};
use crate::error::{DataError, LoanError};

/// Default directory holding the exported sheets
pub const DEFAULT_DATA_PATH: &str = "data";

pub const STATIC_FILE: &str = "static.csv";
pub const BALANCES_FILE: &str = "month_end_balances.csv";
pub const PAYMENT_DUE_FILE: &str = "payment_due.csv";
pub const PAYMENT_MADE_FILE: &str = "payment_made.csv";

/// Parse a period or static date cell
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` (pandas export), `DD/MM/YYYY`
/// and `YYYY-MM` (first of month).
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .or_else(|_| NaiveDate::parse_from_str(value, "%d/%m/%Y"))
        .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01", value), "%Y-%m-%d"))
        .ok()
}

/// Raw CSV row of the static sheet; every attribute may be blank
#[derive(Debug, serde::Deserialize)]
struct StaticCsvRow {
    loan_id: String,
    original_balance: Option<f64>,
    origination_date: Option<String>,
    reversion_date: Option<String>,
    fixed_pre_reversion_rate: Option<f64>,
    post_reversion_margin: Option<f64>,
    months_to_maturity: Option<f64>,
    repayment_method: Option<String>,
    #[serde(rename = "investor_1_acquisition_date")]
    investor_acquisition_date: Option<String>,
}

impl StaticCsvRow {
    /// Convert to a loan record; blank or unparsable attributes fail only this loan
    fn into_static(self) -> Result<LoanStatic, LoanError> {
        let loan_id = self.loan_id.trim().to_string();

        Ok(LoanStatic {
            original_balance: required(&loan_id, "original_balance", self.original_balance)?,
            origination_date: required_date(&loan_id, "origination_date", &self.origination_date)?,
            reversion_date: required_date(&loan_id, "reversion_date", &self.reversion_date)?,
            fixed_pre_reversion_rate: required(&loan_id, "fixed_pre_reversion_rate", self.fixed_pre_reversion_rate)?,
            post_reversion_margin: required(&loan_id, "post_reversion_margin", self.post_reversion_margin)?,
            months_to_maturity: required(&loan_id, "months_to_maturity", self.months_to_maturity)
                .map(|m| m.max(0.0).round() as u32)?,
            repayment_method: required_repayment_method(&loan_id, &self.repayment_method)?,
            investor_acquisition_date: required_date(
                &loan_id,
                "investor_1_acquisition_date",
                &self.investor_acquisition_date,
            )?,
            loan_id,
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn missing(loan_id: &str, field: &'static str) -> LoanError {
    LoanError::MissingStaticData {
        loan_id: loan_id.to_string(),
        field,
    }
}

fn invalid(loan_id: &str, field: &'static str, value: &str) -> LoanError {
    LoanError::InvalidStaticData {
        loan_id: loan_id.to_string(),
        field,
        value: value.to_string(),
    }
}

fn required<T>(loan_id: &str, field: &'static str, value: Option<T>) -> Result<T, LoanError> {
    value.ok_or_else(|| missing(loan_id, field))
}

fn required_date(loan_id: &str, field: &'static str, value: &Option<String>) -> Result<NaiveDate, LoanError> {
    let raw = non_blank(value).ok_or_else(|| missing(loan_id, field))?;
    parse_date(raw).ok_or_else(|| invalid(loan_id, field, raw))
}

fn required_repayment_method(loan_id: &str, value: &Option<String>) -> Result<RepaymentMethod, LoanError> {
    let raw = non_blank(value).ok_or_else(|| missing(loan_id, "repayment_method"))?;
    RepaymentMethod::parse(raw).map_err(|_| invalid(loan_id, "repayment_method", raw))
}

/// Static attributes keyed by loan id
///
/// Rows with blank or unparsable attributes are kept aside in `incomplete` so the
/// portfolio can report them as skipped loans.
#[derive(Debug, Clone, Default)]
pub struct StaticData {
    pub loans: BTreeMap<String, LoanStatic>,
    pub incomplete: BTreeMap<String, LoanError>,
}

impl StaticData {
    pub fn from_loans(loans: impl IntoIterator<Item = LoanStatic>) -> Self {
        Self {
            loans: loans.into_iter().map(|l| (l.loan_id.clone(), l)).collect(),
            incomplete: BTreeMap::new(),
        }
    }

    /// Static record for a loan, or the reason it is unusable
    pub fn lookup(&self, loan_id: &str) -> Result<&LoanStatic, LoanError> {
        if let Some(loan) = self.loans.get(loan_id) {
            return Ok(loan);
        }
        match self.incomplete.get(loan_id) {
            Some(err) => Err(err.clone()),
            None => Err(LoanError::MissingStaticData {
                loan_id: loan_id.to_string(),
                field: "record",
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.loans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loans.is_empty()
    }
}

/// Load the static sheet from any reader
pub fn load_static_from_reader<R: Read>(reader: R) -> Result<StaticData, DataError> {
    let mut csv_reader = Reader::from_reader(reader);
    let mut data = StaticData::default();

    for result in csv_reader.deserialize() {
        let row: StaticCsvRow = result?;
        match row.into_static() {
            Ok(loan) => {
                data.loans.insert(loan.loan_id.clone(), loan);
            }
            Err(err) => {
                data.incomplete.insert(err.loan_id().to_string(), err);
            }
        }
    }

    Ok(data)
}

/// Load the static sheet from a CSV file
pub fn load_static<P: AsRef<Path>>(path: P) -> Result<StaticData, DataError> {
    load_static_from_reader(File::open(path)?)
}

/// Wide monthly table: one row per loan, one column per period
#[derive(Debug, Clone, Default)]
pub struct MonthlyMatrix {
    pub periods: Vec<NaiveDate>,
    pub rows: BTreeMap<String, Vec<Option<f64>>>,
    column_of: HashMap<i32, usize>,
}

impl MonthlyMatrix {
    /// Cell for a loan in the calendar month of `period`
    pub fn value(&self, loan_id: &str, period: NaiveDate) -> Option<f64> {
        let col = *self.column_of.get(&month_index(period))?;
        self.rows.get(loan_id)?.get(col).copied().flatten()
    }
}

/// Load one wide matrix from any reader
///
/// `source_name` only labels errors.
pub fn load_matrix_from_reader<R: Read>(reader: R, source_name: &str) -> Result<MonthlyMatrix, DataError> {
    let mut csv_reader = Reader::from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    if headers.len() < 2 {
        return Err(DataError::MissingHeader {
            source_name: source_name.to_string(),
        });
    }

    let periods = headers
        .iter()
        .skip(1)
        .map(|h| {
            parse_date(h).ok_or_else(|| DataError::InvalidDate {
                source_name: source_name.to_string(),
                value: h.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut rows = BTreeMap::new();
    for result in csv_reader.records() {
        let record = result?;
        let loan_id = record.get(0).unwrap_or_default().trim().to_string();
        if loan_id.is_empty() {
            continue;
        }

        let mut values = Vec::with_capacity(periods.len());
        for cell in record.iter().skip(1) {
            let cell = cell.trim();
            if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
                values.push(None);
            } else {
                let value: f64 = cell.parse().map_err(|_| DataError::InvalidNumber {
                    source_name: source_name.to_string(),
                    loan_id: loan_id.clone(),
                    value: cell.to_string(),
                })?;
                values.push(Some(value));
            }
        }
        rows.insert(loan_id, values);
    }

    let column_of = periods.iter().enumerate().map(|(i, p)| (month_index(*p), i)).collect();

    Ok(MonthlyMatrix {
        periods,
        rows,
        column_of,
    })
}

/// Load one wide matrix from a CSV file
pub fn load_matrix<P: AsRef<Path>>(path: P) -> Result<MonthlyMatrix, DataError> {
    let path = path.as_ref();
    let name = path.display().to_string();
    load_matrix_from_reader(File::open(path)?, &name)
}

/// Stack the three matrices into long-form per-loan histories
///
/// The balance matrix defines which (loan, period) observations exist; blank
/// balance cells mean the loan was not on book that month. Periods keep the
/// header order, so an unordered sheet yields a history that fails validation.
pub fn assemble_histories(
    balances: &MonthlyMatrix,
    due: &MonthlyMatrix,
    made: &MonthlyMatrix,
) -> Vec<LoanHistory> {
    for loan_id in due.rows.keys().chain(made.rows.keys()) {
        if !balances.rows.contains_key(loan_id) {
            log::warn!("loan {} has payments but no balances, ignoring", loan_id);
        }
    }

    balances
        .rows
        .iter()
        .map(|(loan_id, values)| {
            let observations = balances
                .periods
                .iter()
                .zip(values)
                .filter_map(|(&period, balance)| {
                    balance.map(|balance| MonthlyObservation {
                        period,
                        balance,
                        payment_due: due.value(loan_id, period),
                        payment_made: made.value(loan_id, period),
                    })
                })
                .collect();
            LoanHistory::new(loan_id.clone(), observations)
        })
        .collect()
}

/// Everything read from the exported sheets
#[derive(Debug, Clone)]
pub struct LoadedSources {
    pub statics: StaticData,
    pub histories: Vec<LoanHistory>,
}

impl LoadedSources {
    /// Load the four standard files from a directory
    pub fn load_from(dir: &Path) -> Result<Self, DataError> {
        Self::load_files(
            &dir.join(STATIC_FILE),
            &dir.join(BALANCES_FILE),
            &dir.join(PAYMENT_DUE_FILE),
            &dir.join(PAYMENT_MADE_FILE),
        )
    }

    pub fn load_files(
        static_path: &Path,
        balances_path: &Path,
        due_path: &Path,
        made_path: &Path,
    ) -> Result<Self, DataError> {
        log::info!("Loading static data from {}", static_path.display());
        let statics = load_static(static_path)?;
        if statics.is_empty() {
            log::warn!("No usable static records in {}", static_path.display());
        }

        log::info!("Loading historical data");
        let balances = load_matrix(balances_path)?;
        let due = load_matrix(due_path)?;
        let made = load_matrix(made_path)?;
        let histories = assemble_histories(&balances, &due, &made);

        log::info!(
            "Loaded {} static records ({} incomplete) and {} loan histories",
            statics.len(),
            statics.incomplete.len(),
            histories.len()
        );

        Ok(Self { statics, histories })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATIC_CSV: &str = "\
loan_id,original_balance,origination_date,reversion_date,fixed_pre_reversion_rate,post_reversion_margin,months_to_maturity,repayment_method,investor_1_acquisition_date
L1,100000,2019-06-15,2021-06-30,0.0394,0.0494,300,Interest Only,2020-01-31
L2,,2019-07-01,2021-07-31,0.04,0.05,300,Repayment,2020-01-31
";

    const BALANCES_CSV: &str = "\
loan_id,2020-01-31,2020-02-29,2020-03-31
L1,100000,100000,
L3,5000,4900,4800
";

    const DUE_CSV: &str = "\
loan_id,2020-01-31,2020-02-29,2020-03-31
L1,300,,300
";

    const MADE_CSV: &str = "\
loan_id,2020-02-29,2020-01-31
L1,250,300
";

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2020, 1, 31).unwrap();
        assert_eq!(parse_date("2020-01-31"), Some(expected));
        assert_eq!(parse_date("2020-01-31 00:00:00"), Some(expected));
        assert_eq!(parse_date("31/01/2020"), Some(expected));
        assert_eq!(parse_date("2020-01"), NaiveDate::from_ymd_opt(2020, 1, 1));
        assert_eq!(parse_date("January"), None);
    }

    #[test]
    fn test_load_static_splits_incomplete_rows() {
        let data = load_static_from_reader(STATIC_CSV.as_bytes()).unwrap();

        assert_eq!(data.len(), 1);
        let l1 = data.lookup("L1").unwrap();
        assert_eq!(l1.repayment_method, RepaymentMethod::InterestOnly);
        assert_eq!(l1.months_to_maturity, 300);

        match data.lookup("L2") {
            Err(LoanError::MissingStaticData { field, .. }) => assert_eq!(field, "original_balance"),
            other => panic!("expected MissingStaticData, got {:?}", other),
        }
        match data.lookup("L9") {
            Err(LoanError::MissingStaticData { field, .. }) => assert_eq!(field, "record"),
            other => panic!("expected MissingStaticData, got {:?}", other),
        }
    }

    #[test]
    fn test_load_static_isolates_unparsable_rows() {
        let csv = "\
loan_id,original_balance,origination_date,reversion_date,fixed_pre_reversion_rate,post_reversion_margin,months_to_maturity,repayment_method,investor_1_acquisition_date
L1,100000,2019-06-15,2021-06-30,0.0394,0.0494,300,Interest Only,2020-01-31
L2,80000,not-a-date,2021-07-31,0.04,0.05,300,Repayment,2020-01-31
L3,90000,2019-08-01,2021-08-31,0.04,0.05,300,Balloon,2020-01-31
";
        let data = load_static_from_reader(csv.as_bytes()).unwrap();

        assert_eq!(data.len(), 1);
        assert!(data.lookup("L1").is_ok());
        assert_eq!(
            data.lookup("L2").unwrap_err(),
            LoanError::InvalidStaticData {
                loan_id: "L2".to_string(),
                field: "origination_date",
                value: "not-a-date".to_string(),
            }
        );
        assert_eq!(
            data.lookup("L3").unwrap_err(),
            LoanError::InvalidStaticData {
                loan_id: "L3".to_string(),
                field: "repayment_method",
                value: "Balloon".to_string(),
            }
        );
    }

    #[test]
    fn test_empty_static_sheet() {
        let csv = "loan_id,original_balance,origination_date,reversion_date,fixed_pre_reversion_rate,post_reversion_margin,months_to_maturity,repayment_method,investor_1_acquisition_date\n";
        let data = load_static_from_reader(csv.as_bytes()).unwrap();
        assert!(data.is_empty());
        assert!(data.incomplete.is_empty());
    }

    #[test]
    fn test_assemble_histories_aligns_by_period() {
        let balances = load_matrix_from_reader(BALANCES_CSV.as_bytes(), "balances").unwrap();
        let due = load_matrix_from_reader(DUE_CSV.as_bytes(), "due").unwrap();
        let made = load_matrix_from_reader(MADE_CSV.as_bytes(), "made").unwrap();

        let histories = assemble_histories(&balances, &due, &made);
        assert_eq!(histories.len(), 2);

        let l1 = histories.iter().find(|h| h.loan_id == "L1").unwrap();
        // Blank balance in March drops that observation
        assert_eq!(l1.observations.len(), 2);
        assert_eq!(l1.observations[0].payment_due, Some(300.0));
        assert_eq!(l1.observations[0].payment_made, Some(300.0));
        assert_eq!(l1.observations[1].payment_due, None);
        assert_eq!(l1.observations[1].payment_made, Some(250.0));

        let l3 = histories.iter().find(|h| h.loan_id == "L3").unwrap();
        assert_eq!(l3.observations.len(), 3);
        assert!(l3.observations.iter().all(|o| o.payment_due.is_none()));
    }

    #[test]
    fn test_matrix_rejects_bad_number() {
        let csv = "loan_id,2020-01-31\nL1,abc\n";
        let err = load_matrix_from_reader(csv.as_bytes(), "balances").unwrap_err();
        assert!(matches!(err, DataError::InvalidNumber { .. }));
    }
}
