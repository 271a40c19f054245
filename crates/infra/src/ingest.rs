//! Canonical CSV loaders.
//!
//! Inputs must already use the canonical column names; there is no header aliasing.
//! Expected columns:
//!   stock snapshot:     product_sku, product_name, category, stock_level
//!   sales transactions: product_sku, sales_date, quantity [, product_name]
//!   product master:     product_sku, product_name
//!
//! Dates are `YYYY-MM-DD` or day-first `DD/MM/YYYY`.

use std::io::Read;

use chrono::NaiveDate;
use serde::Deserialize;

use stockpulse_core::Sku;
use stockpulse_inventory::StockSnapshot;
use stockpulse_sales::{ProductMasterEntry, SalesTransaction};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("{input} is missing required columns: {}", .columns.join(", "))]
    MissingColumns { input: &'static str, columns: Vec<String> },

    #[error("{input} line {line}: {message}")]
    InvalidRow {
        input: &'static str,
        line: u64,
        message: String,
    },

    #[error("{input}: {source}")]
    Csv {
        input: &'static str,
        #[source]
        source: csv::Error,
    },

    #[error("failed to open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

const STOCK_COLUMNS: [&str; 4] = ["product_sku", "product_name", "category", "stock_level"];
const SALES_COLUMNS: [&str; 3] = ["product_sku", "sales_date", "quantity"];
const MASTER_COLUMNS: [&str; 2] = ["product_sku", "product_name"];

#[derive(Debug, Deserialize)]
struct StockCsvRow {
    product_sku: String,
    product_name: String,
    category: String,
    stock_level: String,
}

#[derive(Debug, Deserialize)]
struct SalesCsvRow {
    product_sku: String,
    sales_date: String,
    quantity: String,
    #[serde(default)]
    product_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MasterCsvRow {
    product_sku: String,
    #[serde(default)]
    product_name: Option<String>,
}

fn reader<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(input)
}

fn require_columns<R: Read>(
    input: &'static str,
    csv_reader: &mut csv::Reader<R>,
    required: &[&str],
) -> Result<(), IngestError> {
    let headers = csv_reader
        .headers()
        .map_err(|source| IngestError::Csv { input, source })?;
    let missing: Vec<String> = required
        .iter()
        .filter(|c| !headers.iter().any(|h| h == **c))
        .map(|c| c.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(IngestError::MissingColumns { input, columns: missing })
    }
}

/// Deserialize every record, reporting the 1-based file line a bad record starts on.
fn rows<T, R, U>(
    input: &'static str,
    mut csv_reader: csv::Reader<R>,
    convert: impl Fn(T) -> Result<U, String>,
) -> Result<Vec<U>, IngestError>
where
    T: for<'de> Deserialize<'de>,
    R: Read,
{
    let headers = csv_reader
        .headers()
        .map_err(|source| IngestError::Csv { input, source })?
        .clone();
    let mut out = Vec::new();
    for result in csv_reader.records() {
        let record = result.map_err(|source| IngestError::Csv { input, source })?;
        let line = record.position().map_or(0, |pos| pos.line());
        let raw: T = record
            .deserialize(Some(&headers))
            .map_err(|source| IngestError::Csv { input, source })?;
        let value = convert(raw).map_err(|message| IngestError::InvalidRow { input, line, message })?;
        out.push(value);
    }
    Ok(out)
}

/// Parse `YYYY-MM-DD` or `DD/MM/YYYY`.
pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%d/%m/%Y"))
        .map_err(|_| format!("unrecognized date '{value}' (expected YYYY-MM-DD or DD/MM/YYYY)"))
}

/// Whole number, accepting spreadsheet-style `12.0`.
fn parse_whole(column: &str, value: &str) -> Result<i64, String> {
    if let Ok(n) = value.parse::<i64>() {
        return Ok(n);
    }
    match value.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
        _ => Err(format!("{column} must be a whole number, got '{value}'")),
    }
}

fn parse_sku(value: &str) -> Result<Sku, String> {
    Sku::new(value).map_err(|e| e.to_string())
}

pub fn load_stock_snapshots<R: Read>(input: R) -> Result<Vec<StockSnapshot>, IngestError> {
    const INPUT: &str = "stock snapshot";
    let mut csv_reader = reader(input);
    require_columns(INPUT, &mut csv_reader, &STOCK_COLUMNS)?;
    rows(INPUT, csv_reader, |raw: StockCsvRow| {
        let level = parse_whole("stock_level", &raw.stock_level)?;
        StockSnapshot::new(parse_sku(&raw.product_sku)?, raw.product_name, raw.category, level)
            .map_err(|e| e.to_string())
    })
}

pub fn load_sales_transactions<R: Read>(input: R) -> Result<Vec<SalesTransaction>, IngestError> {
    const INPUT: &str = "sales transactions";
    let mut csv_reader = reader(input);
    require_columns(INPUT, &mut csv_reader, &SALES_COLUMNS)?;
    rows(INPUT, csv_reader, |raw: SalesCsvRow| {
        let sku = parse_sku(&raw.product_sku)?;
        let date = parse_date(&raw.sales_date)?;
        let quantity = parse_whole("quantity", &raw.quantity)?;
        let tx = SalesTransaction::new(sku, date, quantity).map_err(|e| e.to_string())?;
        Ok(match raw.product_name.filter(|n| !n.is_empty()) {
            Some(name) => tx.with_product_name(name),
            None => tx,
        })
    })
}

pub fn load_product_master<R: Read>(input: R) -> Result<Vec<ProductMasterEntry>, IngestError> {
    const INPUT: &str = "product master";
    let mut csv_reader = reader(input);
    require_columns(INPUT, &mut csv_reader, &MASTER_COLUMNS)?;
    rows(INPUT, csv_reader, |raw: MasterCsvRow| {
        Ok(ProductMasterEntry::new(parse_sku(&raw.product_sku)?, raw.product_name))
    })
}

/// Open `path` and run `load` on it.
pub fn load_file<T>(
    path: &std::path::Path,
    load: impl FnOnce(std::fs::File) -> Result<T, IngestError>,
) -> Result<T, IngestError> {
    let file = std::fs::File::open(path).map_err(|source| IngestError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_snapshot_csv() {
        let csv = "\
product_sku,product_name,category,stock_level
X001, Widget ,Tools,40
X002,Gadget,Tools,12.0
";
        let rows = load_stock_snapshots(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].product_sku.as_str(), "X001");
        assert_eq!(rows[0].product_name, "Widget");
        assert_eq!(rows[1].stock_level, 12);
    }

    #[test]
    fn missing_columns_are_named() {
        let csv = "product_sku,stock_level\nX001,4\n";
        let err = load_stock_snapshots(csv.as_bytes()).unwrap_err();
        match err {
            IngestError::MissingColumns { columns, .. } => {
                assert_eq!(columns, vec!["product_name".to_string(), "category".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn sales_accept_both_date_formats_and_optional_name() {
        let csv = "\
product_sku,sales_date,quantity,product_name
X002,2024-01-05,3,Mug
X002,20/01/2024,2,
";
        let rows = load_sales_transactions(csv.as_bytes()).unwrap();
        assert_eq!(rows[0].sales_date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(rows[1].sales_date, NaiveDate::from_ymd_opt(2024, 1, 20).unwrap());
        assert_eq!(rows[0].product_name.as_deref(), Some("Mug"));
        assert_eq!(rows[1].product_name, None);

        let without_name = "product_sku,sales_date,quantity\nX002,2024-02-01,1\n";
        assert_eq!(load_sales_transactions(without_name.as_bytes()).unwrap().len(), 1);
    }

    #[test]
    fn bad_rows_report_their_line() {
        let csv = "\
product_sku,sales_date,quantity
X002,2024-01-05,3
X002,yesterday,2
";
        let err = load_sales_transactions(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, IngestError::InvalidRow { line: 3, .. }), "{err}");

        let negative = "product_sku,sales_date,quantity\nX002,2024-01-05,-1\n";
        assert!(matches!(
            load_sales_transactions(negative.as_bytes()),
            Err(IngestError::InvalidRow { line: 2, .. })
        ));
    }

    #[test]
    fn line_numbers_follow_quoted_newlines_and_blank_lines() {
        let csv = "\
product_sku,product_name,category,stock_level
X001,\"Widget
large\",Tools,40

X002,Gadget,Tools,lots
";
        let err = load_stock_snapshots(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, IngestError::InvalidRow { line: 5, .. }), "{err}");
    }

    #[test]
    fn product_master_drops_blank_names() {
        let csv = "product_sku,product_name\nX002,Mug\nX003,\n";
        let rows = load_product_master(csv.as_bytes()).unwrap();
        assert_eq!(rows[0].product_name.as_deref(), Some("Mug"));
        assert_eq!(rows[1].product_name, None);
    }
}
