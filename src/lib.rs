//! Churnwise: customer churn risk scoring and product recommendations
//!
//! This library loads retail transaction exports, derives per-customer
//! recency/frequency/monetary features with a three-level churn risk, and
//! recommends unseen products through user-based collaborative filtering.
//! Best-seller ranking and description similarity serve as fallbacks.

pub mod cache;
pub mod cli;
pub mod config;
pub mod content;
pub mod data;
pub mod error;
pub mod features;
pub mod ids;
pub mod matrix;
pub mod outcome;
pub mod popularity;
pub mod recommend;
pub mod resources;
pub mod similarity;
pub mod viz;

// Re-export public items for easier access
pub use cache::ResourceCache;
pub use cli::{Args, Command};
pub use config::PipelineConfig;
pub use content::{ContentIndex, SimilarProduct};
pub use data::{ItemCatalog, Transaction, TransactionTable};
pub use error::{Error, Result};
pub use features::{
    churn_features_from, compute_churn_features, ChurnConfig, ChurnTable, CustomerFeatures,
    LatencyThreshold, MonetaryThreshold, RiskLevel,
};
pub use ids::{CustomerId, StockCode};
pub use matrix::{InteractionMatrix, ValueColumn};
pub use outcome::{EmptyReason, Outcome};
pub use popularity::{popular_items, PopularItem, RankBy};
pub use recommend::{recommend, Recommendation};
pub use resources::{load_recommender_resources, HealthReport, RecommenderResources};
pub use similarity::SimilarityMatrix;
