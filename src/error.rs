//! Fatal error type shared by every pipeline stage

use thiserror::Error;

/// Errors that halt the current operation.
///
/// Expected "nothing to show" situations (unknown customer, no similar
/// users, ...) are not errors; they are reported through
/// [`crate::Outcome::Empty`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("dataset missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("no valid transactions found after cleaning")]
    NoValidTransactions,

    #[error("invalid customer id '{0}': expected a numeric id such as 12350")]
    InvalidCustomerId(String),

    #[error("unsupported ranking metric '{0}': expected 'TotalPrice' or 'Quantity'")]
    InvalidRankMetric(String),

    #[error("interaction and similarity matrices are not aligned: {0}")]
    Misaligned(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("plot rendering failed: {0}")]
    Plot(String),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    #[error(transparent)]
    Polars(#[from] polars::prelude::PolarsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Short machine-readable code for logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingColumns(_) => "MISSING_COLUMNS",
            Self::NoValidTransactions => "NO_VALID_TRANSACTIONS",
            Self::InvalidCustomerId(_) => "INVALID_CUSTOMER_ID",
            Self::InvalidRankMetric(_) => "INVALID_RANK_METRIC",
            Self::Misaligned(_) => "MISALIGNED",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Plot(_) => "PLOT_ERROR",
            Self::Shape(_) => "SHAPE_ERROR",
            Self::Polars(_) => "DATA_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
    }
}

/// Common result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;
