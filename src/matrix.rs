//! Customer x item interaction matrix

use clap::ValueEnum;
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::data::{text_column, Transaction, TransactionTable, CUSTOMER_ID, STOCK_CODE};
use crate::error::Result;
use crate::ids::{CustomerId, StockCode};

/// Transaction field summed into each matrix cell
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueColumn {
    #[default]
    Quantity,
    TotalPrice,
}

impl ValueColumn {
    fn value_of(self, transaction: &Transaction) -> f64 {
        match self {
            ValueColumn::Quantity => transaction.quantity,
            ValueColumn::TotalPrice => transaction.total_price,
        }
    }
}

/// Dense interaction matrix with customer rows and item columns.
///
/// Both axes are sorted, so two matrices built from the same data always
/// line up label for label.
#[derive(Debug, Clone)]
pub struct InteractionMatrix {
    customers: Vec<CustomerId>,
    items: Vec<StockCode>,
    customer_index: HashMap<CustomerId, usize>,
    values: Array2<f64>,
}

impl InteractionMatrix {
    /// Pivot cleaned transactions, summing `value_column` per customer/item pair
    pub fn build(transactions: &TransactionTable, value_column: ValueColumn) -> Result<Self> {
        let customers: Vec<CustomerId> = transactions
            .rows()
            .iter()
            .map(|t| &t.customer_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .cloned()
            .collect();
        let items: Vec<StockCode> = transactions
            .rows()
            .iter()
            .map(|t| &t.stock_code)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .cloned()
            .collect();

        let cells = aggregate_cells(transactions, value_column)?;
        let cell_customers = text_column(&cells, CUSTOMER_ID)?;
        let cell_items = text_column(&cells, STOCK_CODE)?;
        let cell_values: Vec<Option<f64>> = cells.column("Value")?.f64()?.into_iter().collect();

        let customer_index = index_of(&customers);
        let row_of: HashMap<&str, usize> = customers
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();
        let column_of: HashMap<&str, usize> = items
            .iter()
            .enumerate()
            .map(|(j, item)| (item.as_str(), j))
            .collect();

        let mut values = Array2::zeros((customers.len(), items.len()));
        for ((customer, item), value) in cell_customers.iter().zip(&cell_items).zip(cell_values) {
            let row = customer.as_deref().and_then(|c| row_of.get(c));
            let column = item.as_deref().and_then(|i| column_of.get(i));
            if let (Some(&i), Some(&j), Some(value)) = (row, column, value) {
                values[[i, j]] = value;
            }
        }

        Ok(Self {
            customers,
            items,
            customer_index,
            values,
        })
    }

    /// Assemble a matrix from labels and row-major cell values
    pub fn from_dense(
        customers: Vec<CustomerId>,
        items: Vec<StockCode>,
        values: Vec<f64>,
    ) -> Result<Self> {
        let values = Array2::from_shape_vec((customers.len(), items.len()), values)?;
        let customer_index = index_of(&customers);
        Ok(Self {
            customers,
            items,
            customer_index,
            values,
        })
    }

    pub fn customers(&self) -> &[CustomerId] {
        &self.customers
    }

    pub fn items(&self) -> &[StockCode] {
        &self.items
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Row position of a customer
    pub fn position(&self, customer: &CustomerId) -> Option<usize> {
        self.customer_index.get(customer).copied()
    }

    pub fn contains(&self, customer: &CustomerId) -> bool {
        self.customer_index.contains_key(customer)
    }

    /// (customers, items)
    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }
}

/// One row per (customer, item) pair with the summed value
fn aggregate_cells(transactions: &TransactionTable, value_column: ValueColumn) -> Result<DataFrame> {
    let rows = transactions.rows();
    let frame = df!(
        CUSTOMER_ID => rows.iter().map(|t| t.customer_id.as_str()).collect::<Vec<_>>(),
        STOCK_CODE => rows.iter().map(|t| t.stock_code.as_str()).collect::<Vec<_>>(),
        "Value" => rows.iter().map(|t| value_column.value_of(t)).collect::<Vec<_>>(),
    )?;

    let cells = frame
        .lazy()
        .group_by([col(CUSTOMER_ID), col(STOCK_CODE)])
        .agg([col("Value").sum()])
        .collect()?;
    Ok(cells)
}

fn index_of<T: Clone + Eq + std::hash::Hash>(labels: &[T]) -> HashMap<T, usize> {
    labels
        .iter()
        .enumerate()
        .map(|(i, label)| (label.clone(), i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> TransactionTable {
        let df = df!(
            "CustomerID" => &["2.0", "1", "1", "2", "3"],
            "StockCode" => &["B", "A", "A", "C", "A"],
            "InvoiceNo" => &["1", "2", "3", "4", "5"],
            "InvoiceDate" => &["2011-01-01"; 5],
            "Quantity" => &["2", "1", "4", "1", "3"],
            "UnitPrice" => &["1.0", "2.0", "0.5", "10.0", "1.0"],
        )
        .unwrap();
        TransactionTable::from_frame(&df).unwrap()
    }

    #[test]
    fn test_build_sums_quantities() {
        let matrix = InteractionMatrix::build(&sample_table(), ValueColumn::Quantity).unwrap();

        let customers: Vec<&str> = matrix.customers().iter().map(|c| c.as_str()).collect();
        let items: Vec<&str> = matrix.items().iter().map(|i| i.as_str()).collect();
        assert_eq!(customers, vec!["1", "2", "3"]);
        assert_eq!(items, vec!["A", "B", "C"]);
        assert_eq!(matrix.shape(), (3, 3));

        let v = matrix.values();
        assert_eq!(v[[0, 0]], 5.0);
        assert_eq!(v[[1, 1]], 2.0);
        assert_eq!(v[[1, 2]], 1.0);
        assert_eq!(v[[2, 0]], 3.0);
        assert_eq!(v[[0, 1]], 0.0);
        assert!(v.iter().all(|&x| x >= 0.0));
    }

    #[test]
    fn test_build_with_total_price() {
        let matrix = InteractionMatrix::build(&sample_table(), ValueColumn::TotalPrice).unwrap();
        let v = matrix.values();
        assert_eq!(v[[0, 0]], 4.0);
        assert_eq!(v[[1, 2]], 10.0);
    }

    #[test]
    fn test_position_uses_normalized_ids() {
        let matrix = InteractionMatrix::build(&sample_table(), ValueColumn::Quantity).unwrap();
        let id = CustomerId::parse_input("2.0").unwrap();
        assert_eq!(matrix.position(&id), Some(1));
        assert!(!matrix.contains(&CustomerId::from_raw("99").unwrap()));
    }

    #[test]
    fn test_from_dense_rejects_bad_shape() {
        let customers = vec![CustomerId::from_raw("1").unwrap()];
        let items = vec![StockCode::from_raw("A").unwrap()];
        assert!(InteractionMatrix::from_dense(customers, items, vec![1.0, 2.0]).is_err());
    }
}
