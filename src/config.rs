//! Pipeline settings, optionally read from a TOML file

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::features::ChurnConfig;
use crate::matrix::ValueColumn;
use crate::popularity::RankBy;

pub const DEFAULT_TOP_N: usize = 10;

/// Settings shared by the churn and recommendation pipelines
///
/// ```toml
/// value_column = "total_price"
/// top_n = 15
///
/// [churn]
/// latency = "p75"
/// monetary = "p25"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub churn: ChurnConfig,
    pub value_column: ValueColumn,
    pub rank_by: RankBy,
    pub top_n: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            churn: ChurnConfig::default(),
            value_column: ValueColumn::default(),
            rank_by: RankBy::default(),
            top_n: DEFAULT_TOP_N,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            return Err(Error::Config("top_n must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{LatencyThreshold, MonetaryThreshold};

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.top_n, 10);
        assert_eq!(config.value_column, ValueColumn::Quantity);
        assert_eq!(config.churn.latency, LatencyThreshold::Median);
    }

    #[test]
    fn test_overrides() {
        let config = PipelineConfig::from_toml_str(
            r#"
            value_column = "total_price"
            rank_by = "Quantity"
            top_n = 15

            [churn]
            latency = "p75"
            monetary = "p25"
            "#,
        )
        .unwrap();
        assert_eq!(config.value_column, ValueColumn::TotalPrice);
        assert_eq!(config.rank_by, RankBy::Quantity);
        assert_eq!(config.top_n, 15);
        assert_eq!(config.churn.latency, LatencyThreshold::P75);
        assert_eq!(config.churn.monetary, MonetaryThreshold::P25);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(PipelineConfig::from_toml_str("top_n = 0").is_err());
        assert!(PipelineConfig::from_toml_str("value_column = \"price\"").is_err());
        assert!(PipelineConfig::from_toml_str("[churn]\nlatency = \"p90\"").is_err());
    }
}
