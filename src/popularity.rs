//! Popularity-based fallback ranking

use clap::ValueEnum;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use crate::data::{
    has_column, read_csv, require_columns, text_column, DESCRIPTION, QUANTITY, STOCK_CODE,
    TOTAL_PRICE, UNIT_PRICE,
};
use crate::error::{Error, Result};
use crate::ids::StockCode;

/// Metric summed per item when ranking by popularity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum RankBy {
    #[default]
    #[value(name = "TotalPrice")]
    TotalPrice,
    #[value(name = "Quantity")]
    Quantity,
}

impl RankBy {
    pub fn column(self) -> &'static str {
        match self {
            RankBy::TotalPrice => TOTAL_PRICE,
            RankBy::Quantity => QUANTITY,
        }
    }
}

impl FromStr for RankBy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "TotalPrice" => Ok(RankBy::TotalPrice),
            "Quantity" => Ok(RankBy::Quantity),
            other => Err(Error::InvalidRankMetric(other.to_string())),
        }
    }
}

impl fmt::Display for RankBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopularItem {
    pub stock_code: StockCode,
    pub description: Option<String>,
    pub score: f64,
}

/// Top items across the whole file, ranked by summed `rank_by`
///
/// The file is used as-is: no cancellation or sign filtering, so returns
/// reduce an item's total.
pub fn popular_items(path: &Path, top_n: usize, rank_by: RankBy) -> Result<Vec<PopularItem>> {
    let df = read_csv(path)?;
    let items = popular_items_from(df, top_n, rank_by)?;
    info!(path = %path.display(), %rank_by, returned = items.len(), "Popular items ranked");
    Ok(items)
}

/// Rank items of an already-loaded text frame
pub fn popular_items_from(df: DataFrame, top_n: usize, rank_by: RankBy) -> Result<Vec<PopularItem>> {
    let has_total = has_column(&df, TOTAL_PRICE);
    if !has_total && !(has_column(&df, QUANTITY) && has_column(&df, UNIT_PRICE)) {
        return Err(Error::MissingColumns(vec![
            TOTAL_PRICE.to_string(),
            format!("{QUANTITY}+{UNIT_PRICE}"),
        ]));
    }
    require_columns(&df, &[STOCK_CODE, DESCRIPTION])?;
    if rank_by == RankBy::Quantity {
        require_columns(&df, &[QUANTITY])?;
    }

    let total_price = if has_total {
        col(TOTAL_PRICE).cast(DataType::Float64)
    } else {
        col(QUANTITY).cast(DataType::Float64) * col(UNIT_PRICE).cast(DataType::Float64)
    };

    let ranked = df
        .lazy()
        .filter(col(STOCK_CODE).is_not_null())
        .with_column(total_price.alias(TOTAL_PRICE))
        .with_column(col(rank_by.column()).cast(DataType::Float64).alias("Metric"))
        .group_by([col(STOCK_CODE), col(DESCRIPTION)])
        .agg([col("Metric").sum().alias("Score")])
        .sort(
            ["Score", STOCK_CODE],
            SortMultipleOptions::default().with_order_descending_multi([true, false]),
        )
        .collect()?;

    let codes = text_column(&ranked, STOCK_CODE)?;
    let descriptions = text_column(&ranked, DESCRIPTION)?;
    let scores: Vec<Option<f64>> = ranked.column("Score")?.f64()?.into_iter().collect();

    let items = codes
        .into_iter()
        .zip(descriptions)
        .zip(scores)
        .filter_map(|((code, description), score)| {
            Some(PopularItem {
                stock_code: code.as_deref().and_then(StockCode::from_raw)?,
                description,
                score: score.unwrap_or(0.0),
            })
        })
        // Blank or "nan" codes only drop out here, so limit afterwards
        .take(top_n)
        .collect();

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        df!(
            "StockCode" => &["A", "B", "A", "C", "B"],
            "Description" => &[Some("APPLE"), Some("BAG"), Some("APPLE"), None, Some("BAG")],
            "Quantity" => &["1", "10", "2", "4", "1"],
            "UnitPrice" => &["10.0", "1.0", "10.0", "2.0", "1.0"],
        )
        .unwrap()
    }

    #[test]
    fn test_rank_by_total_price() {
        let items = popular_items_from(frame(), 10, RankBy::TotalPrice).unwrap();
        let codes: Vec<&str> = items.iter().map(|i| i.stock_code.as_str()).collect();
        assert_eq!(codes, vec!["A", "B", "C"]);
        assert_eq!(items[0].score, 30.0);
        assert_eq!(items[2].description, None);
        assert!(items.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_rank_by_quantity_truncates() {
        let items = popular_items_from(frame(), 2, RankBy::Quantity).unwrap();
        let codes: Vec<&str> = items.iter().map(|i| i.stock_code.as_str()).collect();
        assert_eq!(codes, vec!["B", "C"]);
        assert_eq!(items[0].score, 11.0);
    }

    #[test]
    fn test_blank_stock_codes_do_not_take_slots() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "StockCode,Description,Quantity,UnitPrice").unwrap();
        writeln!(file, ",MANUAL,100,1.0").unwrap();
        writeln!(file, "nan,POSTAGE,50,1.0").unwrap();
        writeln!(file, "X,MUG,2,1.0").unwrap();
        writeln!(file, "Y,TEAPOT,1,1.0").unwrap();

        let items = popular_items(file.path(), 2, RankBy::Quantity).unwrap();
        let codes: Vec<&str> = items.iter().map(|i| i.stock_code.as_str()).collect();
        assert_eq!(codes, vec!["X", "Y"]);
    }

    #[test]
    fn test_uncomputable_total_price_is_fatal() {
        let df = df!(
            "StockCode" => &["A"],
            "Description" => &["APPLE"],
            "Quantity" => &["1"],
        )
        .unwrap();
        let result = popular_items_from(df, 5, RankBy::Quantity);
        assert!(matches!(result, Err(Error::MissingColumns(_))));
    }

    #[test]
    fn test_rank_metric_parsing() {
        assert_eq!("TotalPrice".parse::<RankBy>().unwrap(), RankBy::TotalPrice);
        assert_eq!("Quantity".parse::<RankBy>().unwrap(), RankBy::Quantity);
        assert!(matches!(
            "Revenue".parse::<RankBy>(),
            Err(Error::InvalidRankMetric(_))
        ));
    }
}
