//! Churn feature extraction: recency, frequency, monetary and a risk label

use chrono::NaiveDateTime;
use clap::ValueEnum;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

use crate::data::{text_column, TransactionTable};
use crate::error::{Error, Result};
use crate::ids::CustomerId;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Statistic used for the recency ("late") threshold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatencyThreshold {
    #[default]
    Median,
    Mean,
    P75,
}

/// Statistic used for the spend ("low value") threshold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonetaryThreshold {
    #[default]
    Median,
    Mean,
    P25,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChurnConfig {
    #[serde(default)]
    pub latency: LatencyThreshold,
    #[serde(default)]
    pub monetary: MonetaryThreshold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::High, RiskLevel::Medium, RiskLevel::Low];

    /// High when late and low-spending, Medium when only late, Low otherwise
    pub fn classify(late: bool, low_value: bool) -> Self {
        match (late, low_value) {
            (true, true) => RiskLevel::High,
            (true, false) => RiskLevel::Medium,
            (false, _) => RiskLevel::Low,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskLevel::High => "High Risk",
            RiskLevel::Medium => "Medium Risk",
            RiskLevel::Low => "Low Risk",
        };
        f.write_str(label)
    }
}

/// Per-customer churn features
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerFeatures {
    pub customer_id: CustomerId,
    pub days_since_last_purchase: i64,
    pub frequency: u64,
    pub monetary: f64,
    pub risk_level: RiskLevel,
}

/// Feature table for the whole customer population
#[derive(Debug, Clone, Serialize)]
pub struct ChurnTable {
    pub customers: Vec<CustomerFeatures>,
    /// Latest invoice timestamp in the dataset
    pub reference_date: NaiveDateTime,
    pub latency_threshold: f64,
    pub monetary_threshold: f64,
}

impl ChurnTable {
    /// Customers at a risk level, highest spend first
    pub fn by_risk(&self, level: RiskLevel) -> Vec<&CustomerFeatures> {
        let mut selected: Vec<&CustomerFeatures> = self
            .customers
            .iter()
            .filter(|c| c.risk_level == level)
            .collect();
        selected.sort_by(|a, b| {
            b.monetary
                .partial_cmp(&a.monetary)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        selected
    }

    /// Count of customers per level, in `RiskLevel::ALL` order
    pub fn risk_counts(&self) -> [(RiskLevel, usize); 3] {
        RiskLevel::ALL.map(|level| {
            let count = self.customers.iter().filter(|c| c.risk_level == level).count();
            (level, count)
        })
    }

    pub fn get(&self, customer_id: &CustomerId) -> Option<&CustomerFeatures> {
        self.customers.iter().find(|c| &c.customer_id == customer_id)
    }

    pub fn len(&self) -> usize {
        self.customers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }
}

/// Load a transaction CSV and compute churn features
///
/// # Arguments
/// * `path` - Path to the CSV file
/// * `config` - Threshold statistics for risk labelling
pub fn compute_churn_features(path: &Path, config: &ChurnConfig) -> Result<ChurnTable> {
    let transactions = TransactionTable::load(path)?;
    churn_features_from(&transactions, config)
}

/// Compute churn features from cleaned transactions
pub fn churn_features_from(
    transactions: &TransactionTable,
    config: &ChurnConfig,
) -> Result<ChurnTable> {
    let dated = transactions
        .rows()
        .iter()
        .filter_map(|t| t.invoice_date.map(|date| (t, date)));

    let mut ids = Vec::new();
    let mut invoices = Vec::new();
    let mut stamps = Vec::new();
    let mut totals = Vec::new();
    for (t, date) in dated {
        ids.push(t.customer_id.as_str().to_string());
        invoices.push(t.invoice_no.clone());
        stamps.push(date.and_utc().timestamp_millis());
        totals.push(t.total_price);
    }

    let Some(reference_date) = transactions.rows().iter().filter_map(|t| t.invoice_date).max()
    else {
        return Err(Error::NoValidTransactions);
    };
    let reference_ms = reference_date.and_utc().timestamp_millis();

    let frame = df!(
        "CustomerID" => ids,
        "InvoiceNo" => invoices,
        "InvoiceTs" => stamps,
        "TotalPrice" => totals,
    )?;

    let aggregated = aggregate_customers(frame)?;
    let mut customers = extract_customers(&aggregated, reference_ms)?;

    let recency: Vec<f64> = customers
        .iter()
        .map(|c| c.days_since_last_purchase as f64)
        .collect();
    let monetary: Vec<f64> = customers.iter().map(|c| c.monetary).collect();

    let latency_threshold = match config.latency {
        LatencyThreshold::Median => quantile(&recency, 0.5),
        LatencyThreshold::Mean => mean(&recency),
        LatencyThreshold::P75 => quantile(&recency, 0.75),
    };
    let monetary_threshold = match config.monetary {
        MonetaryThreshold::Median => quantile(&monetary, 0.5),
        MonetaryThreshold::Mean => mean(&monetary),
        MonetaryThreshold::P25 => quantile(&monetary, 0.25),
    };
    debug!(latency_threshold, monetary_threshold, "Risk thresholds");

    for customer in &mut customers {
        let late = customer.days_since_last_purchase as f64 > latency_threshold;
        let low_value = customer.monetary < monetary_threshold;
        customer.risk_level = RiskLevel::classify(late, low_value);
    }

    info!(customers = customers.len(), %reference_date, "Churn features computed");

    Ok(ChurnTable {
        customers,
        reference_date,
        latency_threshold,
        monetary_threshold,
    })
}

/// Group transactions by customer: last purchase, distinct invoices, spend
fn aggregate_customers(frame: DataFrame) -> Result<DataFrame> {
    let aggregated = frame
        .lazy()
        .group_by([col("CustomerID")])
        .agg([
            col("InvoiceTs").max().alias("LastPurchase"),
            col("InvoiceNo").n_unique().alias("Frequency"),
            col("TotalPrice").sum().alias("Monetary"),
        ])
        .sort(["CustomerID"], SortMultipleOptions::default())
        .collect()?;
    Ok(aggregated)
}

fn extract_customers(df: &DataFrame, reference_ms: i64) -> Result<Vec<CustomerFeatures>> {
    let ids = text_column(df, "CustomerID")?;
    let last: Vec<i64> = df
        .column("LastPurchase")?
        .i64()?
        .into_no_null_iter()
        .collect();
    let frequency: Vec<i64> = df
        .column("Frequency")?
        .cast(&DataType::Int64)?
        .i64()?
        .into_no_null_iter()
        .collect();
    let monetary: Vec<f64> = df
        .column("Monetary")?
        .f64()?
        .into_no_null_iter()
        .collect();

    let customers = ids
        .into_iter()
        .zip(last)
        .zip(frequency)
        .zip(monetary)
        .filter_map(|(((id, last), frequency), monetary)| {
            let customer_id = id.as_deref().and_then(CustomerId::from_raw)?;
            Some(CustomerFeatures {
                customer_id,
                days_since_last_purchase: (reference_ms - last).div_euclid(MILLIS_PER_DAY),
                frequency: frequency.max(0) as u64,
                monetary,
                risk_level: RiskLevel::Low,
            })
        })
        .collect();

    Ok(customers)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Quantile with linear interpolation between closest ranks
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_from(rows: &[(&str, &str, &str, &str, &str)]) -> TransactionTable {
        // (customer, invoice, date, quantity, unit price)
        let customers: Vec<&str> = rows.iter().map(|r| r.0).collect();
        let invoices: Vec<&str> = rows.iter().map(|r| r.1).collect();
        let dates: Vec<&str> = rows.iter().map(|r| r.2).collect();
        let quantities: Vec<&str> = rows.iter().map(|r| r.3).collect();
        let prices: Vec<&str> = rows.iter().map(|r| r.4).collect();
        let codes: Vec<&str> = rows.iter().map(|_| "A").collect();

        let df = df!(
            "CustomerID" => customers,
            "StockCode" => codes,
            "InvoiceNo" => invoices,
            "InvoiceDate" => dates,
            "Quantity" => quantities,
            "UnitPrice" => prices,
        )
        .unwrap();
        TransactionTable::from_frame(&df).unwrap()
    }

    fn sample_table() -> TransactionTable {
        table_from(&[
            ("1", "100", "2011-12-09 12:00:00", "10", "10.0"),
            ("1", "101", "2011-12-01 08:00:00", "1", "5.0"),
            ("2", "102", "2011-11-09 13:00:00", "1", "2.0"),
            ("3", "103", "2011-06-01 10:00:00", "50", "4.0"),
            ("4", "104", "2011-01-01 10:00:00", "1", "1.0"),
            ("4", "104", "2011-01-01 10:00:00", "2", "1.0"),
        ])
    }

    #[test]
    fn test_rfm_values() {
        let table = churn_features_from(&sample_table(), &ChurnConfig::default()).unwrap();
        assert_eq!(table.len(), 4);

        let c1 = table.get(&CustomerId::from_raw("1").unwrap()).unwrap();
        assert_eq!(c1.days_since_last_purchase, 0);
        assert_eq!(c1.frequency, 2);
        assert!((c1.monetary - 105.0).abs() < 1e-9);

        // 2011-11-09 13:00 -> 2011-12-09 12:00 is 29 days 23 hours
        let c2 = table.get(&CustomerId::from_raw("2").unwrap()).unwrap();
        assert_eq!(c2.days_since_last_purchase, 29);

        let c4 = table.get(&CustomerId::from_raw("4").unwrap()).unwrap();
        assert_eq!(c4.frequency, 1);
        assert!((c4.monetary - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_risk_labels_follow_thresholds() {
        let table = churn_features_from(&sample_table(), &ChurnConfig::default()).unwrap();

        for c in &table.customers {
            let late = c.days_since_last_purchase as f64 > table.latency_threshold;
            let low = c.monetary < table.monetary_threshold;
            assert_eq!(c.risk_level, RiskLevel::classify(late, low));
            if c.risk_level == RiskLevel::High {
                assert!(late && low);
            }
        }

        let level = |id: &str| {
            table
                .get(&CustomerId::from_raw(id).unwrap())
                .unwrap()
                .risk_level
        };
        assert_eq!(level("1"), RiskLevel::Low);
        assert_eq!(level("3"), RiskLevel::Medium);
        assert_eq!(level("4"), RiskLevel::High);
    }

    #[test]
    fn test_risk_counts_partition_population() {
        let table = churn_features_from(&sample_table(), &ChurnConfig::default()).unwrap();
        let total: usize = table.risk_counts().iter().map(|(_, n)| n).sum();
        assert_eq!(total, table.len());
    }

    #[test]
    fn test_by_risk_sorted_by_monetary() {
        let config = ChurnConfig {
            latency: LatencyThreshold::Mean,
            monetary: MonetaryThreshold::P25,
        };
        let table = churn_features_from(&sample_table(), &config).unwrap();
        for level in RiskLevel::ALL {
            let rows = table.by_risk(level);
            assert!(rows.windows(2).all(|w| w[0].monetary >= w[1].monetary));
            assert!(rows.iter().all(|c| c.risk_level == level));
        }
    }

    #[test]
    fn test_undated_rows_are_ignored() {
        let table = table_from(&[
            ("1", "100", "2011-12-09", "1", "1.0"),
            ("2", "101", "garbage", "1", "1.0"),
        ]);
        let churn = churn_features_from(&table, &ChurnConfig::default()).unwrap();
        assert_eq!(churn.len(), 1);
    }

    #[test]
    fn test_quantile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&values, 0.5), 2.5);
        assert_eq!(quantile(&values, 0.25), 1.75);
        assert_eq!(quantile(&values, 0.75), 3.25);
        assert_eq!(quantile(&[7.0], 0.75), 7.0);
        assert_eq!(mean(&values), 2.5);
    }

    #[test]
    fn test_classify() {
        assert_eq!(RiskLevel::classify(true, true), RiskLevel::High);
        assert_eq!(RiskLevel::classify(true, false), RiskLevel::Medium);
        assert_eq!(RiskLevel::classify(false, true), RiskLevel::Low);
        assert_eq!(RiskLevel::High.to_string(), "High Risk");
    }
}
