//! Loaded recommender inputs: transactions, interaction and similarity matrices

use serde::Serialize;
use std::path::Path;
use tracing::info;

use crate::data::TransactionTable;
use crate::error::Result;
use crate::ids::CustomerId;
use crate::matrix::{InteractionMatrix, ValueColumn};
use crate::outcome::Outcome;
use crate::recommend::{recommend, Recommendation};
use crate::similarity::SimilarityMatrix;

/// Everything the scorer needs, checked for alignment at load time
#[derive(Debug, Clone)]
pub struct RecommenderResources {
    pub transactions: TransactionTable,
    pub matrix: InteractionMatrix,
    pub similarity: SimilarityMatrix,
}

/// Shapes and alignment of the loaded matrices
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub transactions: usize,
    pub interaction_shape: (usize, usize),
    pub similarity_shape: (usize, usize),
    pub aligned: bool,
}

impl RecommenderResources {
    /// Assemble resources, rejecting a similarity matrix that does not
    /// line up with the interaction matrix rows
    pub fn new(
        transactions: TransactionTable,
        matrix: InteractionMatrix,
        similarity: SimilarityMatrix,
    ) -> Result<Self> {
        similarity.ensure_aligned(&matrix)?;
        Ok(Self {
            transactions,
            matrix,
            similarity,
        })
    }

    pub fn from_transactions(transactions: TransactionTable, value_column: ValueColumn) -> Result<Self> {
        let matrix = InteractionMatrix::build(&transactions, value_column)?;
        let similarity = SimilarityMatrix::compute(&matrix);
        Self::new(transactions, matrix, similarity)
    }

    pub fn recommend(&self, customer_id: &CustomerId, top_n: usize) -> Outcome<Vec<Recommendation>> {
        recommend(
            customer_id,
            &self.matrix,
            &self.similarity,
            &self.transactions,
            top_n,
        )
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            transactions: self.transactions.len(),
            interaction_shape: self.matrix.shape(),
            similarity_shape: self.similarity.shape(),
            aligned: self.similarity.ensure_aligned(&self.matrix).is_ok(),
        }
    }
}

/// Load a transaction CSV and build the recommender matrices
///
/// # Arguments
/// * `path` - Path to the CSV file
/// * `value_column` - Field summed into each interaction cell
pub fn load_recommender_resources(
    path: &Path,
    value_column: ValueColumn,
) -> Result<RecommenderResources> {
    let transactions = TransactionTable::load(path)?;
    let resources = RecommenderResources::from_transactions(transactions, value_column)?;

    let (customers, items) = resources.matrix.shape();
    info!(customers, items, ?value_column, "Recommender resources ready");
    Ok(resources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::ids::StockCode;
    use polars::prelude::*;

    fn table() -> TransactionTable {
        let df = df!(
            "CustomerID" => &["1", "2", "2"],
            "StockCode" => &["A", "A", "B"],
            "InvoiceNo" => &["1", "2", "2"],
            "InvoiceDate" => &["2011-01-01"; 3],
            "Quantity" => &["1", "1", "1"],
            "UnitPrice" => &["1.0", "1.0", "1.0"],
        )
        .unwrap();
        TransactionTable::from_frame(&df).unwrap()
    }

    #[test]
    fn test_health_reports_alignment() {
        let resources = RecommenderResources::from_transactions(table(), ValueColumn::Quantity).unwrap();
        let health = resources.health();
        assert_eq!(health.transactions, 3);
        assert_eq!(health.interaction_shape, (2, 2));
        assert_eq!(health.similarity_shape, (2, 2));
        assert!(health.aligned);
    }

    #[test]
    fn test_rejects_misaligned_similarity() {
        let transactions = table();
        let matrix = InteractionMatrix::build(&transactions, ValueColumn::Quantity).unwrap();
        let wrong = SimilarityMatrix::from_dense(
            vec![CustomerId::from_raw("2").unwrap(), CustomerId::from_raw("1").unwrap()],
            vec![1.0, 0.0, 0.0, 1.0],
        )
        .unwrap();

        let result = RecommenderResources::new(transactions, matrix, wrong);
        assert!(matches!(result, Err(Error::Misaligned(_))));
    }

    #[test]
    fn test_recommend_through_resources() {
        let resources = RecommenderResources::from_transactions(table(), ValueColumn::Quantity).unwrap();
        let recs = resources
            .recommend(&CustomerId::from_raw("1").unwrap(), 5)
            .success()
            .unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].stock_code, StockCode::from_raw("B").unwrap());
    }
}
