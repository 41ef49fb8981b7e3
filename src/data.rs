//! Transaction loading and cleaning using Polars

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::ids::{CustomerId, StockCode};

pub const CUSTOMER_ID: &str = "CustomerID";
pub const STOCK_CODE: &str = "StockCode";
pub const DESCRIPTION: &str = "Description";
pub const QUANTITY: &str = "Quantity";
pub const UNIT_PRICE: &str = "UnitPrice";
pub const TOTAL_PRICE: &str = "TotalPrice";
pub const INVOICE_NO: &str = "InvoiceNo";
pub const INVOICE_DATE: &str = "InvoiceDate";

/// Columns every transaction file must carry
pub const REQUIRED_COLUMNS: [&str; 6] = [
    CUSTOMER_ID,
    STOCK_CODE,
    INVOICE_NO,
    INVOICE_DATE,
    QUANTITY,
    UNIT_PRICE,
];

/// Invoice numbers starting with this marker are cancellations
const CANCELLATION_PREFIX: char = 'C';

const DATETIME_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// A single cleaned purchase line
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub customer_id: CustomerId,
    pub stock_code: StockCode,
    pub description: Option<String>,
    pub quantity: f64,
    pub unit_price: f64,
    pub total_price: f64,
    pub invoice_no: String,
    /// `None` when the timestamp could not be parsed
    pub invoice_date: Option<NaiveDateTime>,
}

/// First-seen description for every stock code, in file order
#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    order: Vec<StockCode>,
    descriptions: HashMap<StockCode, Option<String>>,
}

impl ItemCatalog {
    /// Record an item; later occurrences of a known code are ignored.
    pub fn record(&mut self, code: StockCode, description: Option<String>) {
        if self.descriptions.contains_key(&code) {
            return;
        }
        self.order.push(code.clone());
        self.descriptions.insert(code, description);
    }

    pub fn description(&self, code: &StockCode) -> Option<&str> {
        self.descriptions.get(code).and_then(|d| d.as_deref())
    }

    pub fn contains(&self, code: &StockCode) -> bool {
        self.descriptions.contains_key(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StockCode, Option<&str>)> + '_ {
        self.order
            .iter()
            .map(move |code| (code, self.description(code)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Row counts dropped by each cleaning rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleaningReport {
    pub raw_rows: usize,
    pub missing_customer: usize,
    pub missing_stock_code: usize,
    pub cancelled: usize,
    pub invalid_amounts: usize,
    /// Kept rows whose invoice date did not parse
    pub undated: usize,
    pub kept: usize,
}

impl CleaningReport {
    pub fn dropped(&self) -> usize {
        self.raw_rows - self.kept
    }
}

/// Cleaned transactions plus the item catalog derived from the raw file
#[derive(Debug, Clone)]
pub struct TransactionTable {
    rows: Vec<Transaction>,
    catalog: ItemCatalog,
    report: CleaningReport,
}

impl TransactionTable {
    /// Load and clean a transaction CSV
    ///
    /// # Arguments
    /// * `path` - Path to the CSV file
    ///
    /// # Returns
    /// * `TransactionTable` with cancellations and non-positive lines removed
    pub fn load(path: &Path) -> Result<Self> {
        let df = read_csv(path)?;
        let table = Self::from_frame(&df)?;
        info!(
            path = %path.display(),
            rows = table.rows.len(),
            items = table.catalog.len(),
            dropped = table.report.dropped(),
            "Transactions loaded"
        );
        Ok(table)
    }

    /// Clean an already-loaded frame whose columns are all text
    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        require_columns(df, &REQUIRED_COLUMNS)?;

        let customers = text_column(df, CUSTOMER_ID)?;
        let codes = text_column(df, STOCK_CODE)?;
        let invoices = text_column(df, INVOICE_NO)?;
        let dates = text_column(df, INVOICE_DATE)?;
        let quantities = text_column(df, QUANTITY)?;
        let prices = text_column(df, UNIT_PRICE)?;
        let descriptions = optional_text_column(df, DESCRIPTION)?;
        let totals = optional_text_column(df, TOTAL_PRICE)?;

        let mut report = CleaningReport {
            raw_rows: df.height(),
            ..CleaningReport::default()
        };
        let mut catalog = ItemCatalog::default();
        let mut rows = Vec::with_capacity(df.height());

        for i in 0..df.height() {
            let description = descriptions
                .as_ref()
                .and_then(|column| column[i].as_deref())
                .map(str::to_string);

            let Some(stock_code) = codes[i].as_deref().and_then(StockCode::from_raw) else {
                report.missing_stock_code += 1;
                continue;
            };
            let Some(customer_id) = customers[i].as_deref().and_then(CustomerId::from_raw) else {
                report.missing_customer += 1;
                continue;
            };
            catalog.record(stock_code.clone(), description.clone());

            let invoice_no = invoices[i].as_deref().map(str::trim).unwrap_or_default();
            if invoice_no.starts_with(CANCELLATION_PREFIX) {
                report.cancelled += 1;
                continue;
            }

            let quantity = parse_number(quantities[i].as_deref());
            let unit_price = parse_number(prices[i].as_deref());
            let (Some(quantity), Some(unit_price)) = (quantity, unit_price) else {
                report.invalid_amounts += 1;
                continue;
            };
            if quantity <= 0.0 || unit_price <= 0.0 {
                report.invalid_amounts += 1;
                continue;
            }

            let total_price = totals
                .as_ref()
                .and_then(|column| parse_number(column[i].as_deref()))
                .unwrap_or(quantity * unit_price);

            let invoice_date = dates[i].as_deref().and_then(parse_invoice_date);
            if invoice_date.is_none() {
                report.undated += 1;
            }

            rows.push(Transaction {
                customer_id,
                stock_code,
                description,
                quantity,
                unit_price,
                total_price,
                invoice_no: invoice_no.to_string(),
                invoice_date,
            });
        }

        report.kept = rows.len();
        if rows.is_empty() {
            return Err(Error::NoValidTransactions);
        }
        if report.dropped() > 0 || report.undated > 0 {
            warn!(
                missing_customer = report.missing_customer,
                missing_stock_code = report.missing_stock_code,
                cancelled = report.cancelled,
                invalid_amounts = report.invalid_amounts,
                undated = report.undated,
                "Cleaning dropped or degraded rows"
            );
        }

        Ok(Self {
            rows,
            catalog,
            report,
        })
    }

    pub fn rows(&self) -> &[Transaction] {
        &self.rows
    }

    pub fn catalog(&self) -> &ItemCatalog {
        &self.catalog
    }

    pub fn report(&self) -> &CleaningReport {
        &self.report
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Read a CSV with every column typed as text.
///
/// Stock codes mix numeric (`71053`) and alphanumeric (`85123A`) values, so
/// schema inference is disabled and numbers are parsed per row.
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.column(name).is_ok()
}

/// Fail with every missing column named, not just the first
pub fn require_columns(df: &DataFrame, names: &[&str]) -> Result<()> {
    let missing: Vec<String> = names
        .iter()
        .filter(|name| !has_column(df, name))
        .map(|name| name.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::MissingColumns(missing))
    }
}

pub(crate) fn text_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = df.column(name)?.cast(&DataType::String)?;
    let values = series
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect();
    Ok(values)
}

fn optional_text_column(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<String>>>> {
    if has_column(df, name) {
        text_column(df, name).map(Some)
    } else {
        Ok(None)
    }
}

fn parse_number(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
}

/// Parse an invoice timestamp in any of the layouts seen in retail exports
pub fn parse_invoice_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}
