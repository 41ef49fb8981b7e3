//! User-based collaborative filtering recommendations

use serde::Serialize;
use tracing::debug;

use crate::data::TransactionTable;
use crate::ids::{CustomerId, StockCode};
use crate::matrix::InteractionMatrix;
use crate::outcome::{EmptyReason, Outcome};
use crate::similarity::SimilarityMatrix;

/// Description shown for items with no recorded description
pub const MISSING_DESCRIPTION: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub stock_code: StockCode,
    pub description: String,
    pub estimated_score: f64,
}

/// Recommend items a customer has not bought yet
///
/// Each item is scored with the similarity-weighted average of every other
/// customer's interaction with it:
/// `score[item] = sum_c matrix[c, item] * sim[c] / sum_c sim[c]`.
///
/// # Arguments
/// * `customer_id` - Target customer
/// * `matrix` - Customer x item interactions
/// * `similarity` - Customer x customer cosine similarity
/// * `transactions` - Source of item descriptions
/// * `top_n` - Maximum number of rows returned
///
/// # Returns
/// * `Outcome::Success` with rows sorted by descending score, or
///   `Outcome::Empty` explaining why nothing can be recommended. This
///   function never returns `Outcome::Fatal`.
pub fn recommend(
    customer_id: &CustomerId,
    matrix: &InteractionMatrix,
    similarity: &SimilarityMatrix,
    transactions: &TransactionTable,
    top_n: usize,
) -> Outcome<Vec<Recommendation>> {
    let Some(target) = matrix.position(customer_id) else {
        return Outcome::Empty(EmptyReason::CustomerNotFound {
            customer_id: customer_id.clone(),
        });
    };

    // Known to the interactions but absent from the similarity labels
    if similarity.row(customer_id).is_none() {
        let (rows, cols) = similarity.shape();
        return Outcome::Empty(EmptyReason::MatrixMisaligned {
            customer_id: customer_id.clone(),
            detail: format!("customer has no row in the {rows}x{cols} similarity matrix"),
        });
    }

    let mut weights = similarity.aligned_row(customer_id, matrix.customers());

    // No self-influence
    weights[target] = 0.0;

    let denom = weights.sum();
    if denom == 0.0 {
        return Outcome::Empty(EmptyReason::NoSimilarUsers {
            customer_id: customer_id.clone(),
        });
    }

    let scores = matrix.values().t().dot(&weights) / denom;
    let owned = matrix.values().row(target);

    let mut recommendations: Vec<Recommendation> = matrix
        .items()
        .iter()
        .zip(scores.iter())
        .zip(owned.iter())
        .filter(|(_, already)| **already <= 0.0)
        .map(|((code, &score), _)| Recommendation {
            stock_code: code.clone(),
            description: transactions
                .catalog()
                .description(code)
                .unwrap_or(MISSING_DESCRIPTION)
                .to_string(),
            estimated_score: score,
        })
        .collect();

    if recommendations.is_empty() {
        return Outcome::Empty(EmptyReason::NoUnseenItems {
            customer_id: customer_id.clone(),
        });
    }

    // Stable sort: equal scores keep stock code order
    recommendations.sort_by(|a, b| {
        b.estimated_score
            .partial_cmp(&a.estimated_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    recommendations.truncate(top_n);

    debug!(
        customer = %customer_id,
        denom,
        returned = recommendations.len(),
        "Recommendations scored"
    );

    Outcome::Success(recommendations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn ids(raw: &[&str]) -> Vec<CustomerId> {
        raw.iter().map(|r| CustomerId::from_raw(r).unwrap()).collect()
    }

    fn codes(raw: &[&str]) -> Vec<StockCode> {
        raw.iter().map(|r| StockCode::from_raw(r).unwrap()).collect()
    }

    fn catalog_table() -> TransactionTable {
        let df = df!(
            "CustomerID" => &["A", "B"],
            "StockCode" => &["X", "Y"],
            "Description" => &[Some("MUG"), None],
            "InvoiceNo" => &["1", "2"],
            "InvoiceDate" => &["2011-01-01", "2011-01-02"],
            "Quantity" => &["2", "3"],
            "UnitPrice" => &["1.0", "1.0"],
        )
        .unwrap();
        TransactionTable::from_frame(&df).unwrap()
    }

    fn abc_matrix() -> InteractionMatrix {
        // A:{X:2}, B:{X:1,Y:3}, C:{X:0,Y:0}
        InteractionMatrix::from_dense(
            ids(&["A", "B", "C"]),
            codes(&["X", "Y"]),
            vec![2.0, 0.0, 1.0, 3.0, 0.0, 0.0],
        )
        .unwrap()
    }

    #[test]
    fn test_recommends_unseen_item() {
        let matrix = abc_matrix();
        let sim = SimilarityMatrix::compute(&matrix);
        let a = CustomerId::from_raw("A").unwrap();

        let recs = recommend(&a, &matrix, &sim, &catalog_table(), 10)
            .success()
            .unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].stock_code.as_str(), "Y");
        // Only B contributes: 3 * s / s
        assert!((recs[0].estimated_score - 3.0).abs() < 1e-9);
        // Y's first row has no description
        assert_eq!(recs[0].description, MISSING_DESCRIPTION);
    }

    #[test]
    fn test_unknown_customer() {
        let matrix = abc_matrix();
        let sim = SimilarityMatrix::compute(&matrix);
        let z = CustomerId::from_raw("Z").unwrap();

        let outcome = recommend(&z, &matrix, &sim, &catalog_table(), 10);
        assert!(matches!(
            outcome,
            Outcome::Empty(EmptyReason::CustomerNotFound { .. })
        ));
    }

    #[test]
    fn test_zero_vector_customer_has_no_similar_users() {
        let matrix = abc_matrix();
        let sim = SimilarityMatrix::compute(&matrix);
        let c = CustomerId::from_raw("C").unwrap();

        let outcome = recommend(&c, &matrix, &sim, &catalog_table(), 10);
        assert!(matches!(
            outcome,
            Outcome::Empty(EmptyReason::NoSimilarUsers { .. })
        ));
    }

    #[test]
    fn test_no_unseen_items() {
        let matrix = InteractionMatrix::from_dense(
            ids(&["A", "B"]),
            codes(&["X"]),
            vec![1.0, 2.0],
        )
        .unwrap();
        let sim = SimilarityMatrix::compute(&matrix);
        let a = CustomerId::from_raw("A").unwrap();

        let outcome = recommend(&a, &matrix, &sim, &catalog_table(), 10);
        assert!(matches!(
            outcome,
            Outcome::Empty(EmptyReason::NoUnseenItems { .. })
        ));
    }

    #[test]
    fn test_misaligned_similarity_is_reindexed() {
        let matrix = abc_matrix();
        // Same values as the computed matrix, labels in a different order
        let s = 1.0 / 10f64.sqrt();
        let sim = SimilarityMatrix::from_dense(
            ids(&["B", "A"]),
            vec![1.0, s, s, 1.0],
        )
        .unwrap();
        let a = CustomerId::from_raw("A").unwrap();

        let recs = recommend(&a, &matrix, &sim, &catalog_table(), 10)
            .success()
            .unwrap();
        assert_eq!(recs[0].stock_code.as_str(), "Y");
    }

    #[test]
    fn test_customer_missing_from_similarity() {
        let matrix = abc_matrix();
        // Built for a different customer set: A has interactions but no row
        let sim = SimilarityMatrix::from_dense(ids(&["B", "C"]), vec![1.0, 0.0, 0.0, 0.0]).unwrap();
        let a = CustomerId::from_raw("A").unwrap();

        match recommend(&a, &matrix, &sim, &catalog_table(), 10) {
            Outcome::Empty(EmptyReason::MatrixMisaligned {
                customer_id,
                detail,
            }) => {
                assert_eq!(customer_id, a);
                assert!(detail.contains("2x2"));
            }
            other => panic!("expected MatrixMisaligned, got {other:?}"),
        }
    }

    #[test]
    fn test_top_n_sorted_and_excludes_owned() {
        let matrix = InteractionMatrix::from_dense(
            ids(&["A", "B", "C"]),
            codes(&["I1", "I2", "I3", "I4"]),
            vec![
                1.0, 0.0, 0.0, 0.0, //
                1.0, 5.0, 1.0, 0.0, //
                1.0, 1.0, 4.0, 2.0,
            ],
        )
        .unwrap();
        let sim = SimilarityMatrix::compute(&matrix);
        let a = CustomerId::from_raw("A").unwrap();

        let recs = recommend(&a, &matrix, &sim, &catalog_table(), 2)
            .success()
            .unwrap();
        assert_eq!(recs.len(), 2);
        assert!(recs.iter().all(|r| r.stock_code.as_str() != "I1"));
        assert!(recs
            .windows(2)
            .all(|w| w[0].estimated_score >= w[1].estimated_score));
    }
}
