//! Command-line interface definitions and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::PipelineConfig;
use crate::features::{LatencyThreshold, MonetaryThreshold, RiskLevel};
use crate::ids::CustomerId;
use crate::matrix::ValueColumn;
use crate::popularity::RankBy;

/// Customer churn risk scoring and product recommendations
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV file
    #[arg(
        short,
        long,
        global = true,
        env = "CHURNWISE_DATA",
        default_value = "data/cleaned_data.csv"
    )]
    pub data: PathBuf,

    /// TOML file with pipeline settings; flags override it
    #[arg(long, global = true, env = "CHURNWISE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Score every customer and list one risk level
    Churn {
        /// Risk level to list
        #[arg(long, value_enum, default_value = "high")]
        risk: RiskLevel,

        /// Statistic for the recency threshold
        #[arg(long, value_enum)]
        latency: Option<LatencyThreshold>,

        /// Statistic for the monetary threshold
        #[arg(long, value_enum)]
        monetary: Option<MonetaryThreshold>,

        /// Maximum customers listed
        #[arg(long, default_value = "20")]
        limit: usize,

        /// Write a recency/monetary scatter plot (PNG) to this path
        #[arg(long)]
        plot: Option<PathBuf>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Recommend unseen products for one or more customers
    Recommend {
        /// Numeric customer id, e.g. 12350 (repeatable)
        #[arg(short, long = "customer", required = true)]
        customers: Vec<String>,

        /// Number of recommendations
        #[arg(short = 'n', long)]
        top_n: Option<usize>,

        /// Field summed into the interaction matrix
        #[arg(long, value_enum)]
        value_column: Option<ValueColumn>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Best-selling products
    Popular {
        /// Number of items
        #[arg(short = 'n', long)]
        top_n: Option<usize>,

        /// Ranking metric: TotalPrice or Quantity
        #[arg(long, value_enum)]
        rank_by: Option<RankBy>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Products with descriptions similar to a search term
    Similar {
        /// Text matched against product descriptions
        #[arg(short, long)]
        product: String,

        /// Number of products
        #[arg(short = 'n', long, default_value = "5")]
        top_n: usize,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Check matrix shapes and label alignment
    Health,
}

impl Args {
    /// Settings from `--config` (or defaults) with subcommand flags applied
    pub fn pipeline_config(&self) -> crate::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };

        match &self.command {
            Command::Churn {
                latency, monetary, ..
            } => {
                if let Some(latency) = latency {
                    config.churn.latency = *latency;
                }
                if let Some(monetary) = monetary {
                    config.churn.monetary = *monetary;
                }
            }
            Command::Recommend {
                top_n,
                value_column,
                ..
            } => {
                if let Some(top_n) = top_n {
                    config.top_n = *top_n;
                }
                if let Some(value_column) = value_column {
                    config.value_column = *value_column;
                }
            }
            Command::Popular { top_n, rank_by, .. } => {
                if let Some(top_n) = top_n {
                    config.top_n = *top_n;
                }
                if let Some(rank_by) = rank_by {
                    config.rank_by = *rank_by;
                }
            }
            Command::Similar { .. } | Command::Health => {}
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse the customer ids given to `recommend`
    pub fn parse_customer_ids(&self) -> crate::Result<Vec<CustomerId>> {
        match &self.command {
            Command::Recommend { customers, .. } => customers
                .iter()
                .map(|raw| CustomerId::parse_input(raw))
                .collect(),
            _ => Ok(Vec::new()),
        }
    }
}
