//! Tagged result for operations that may legitimately have nothing to return

use serde::Serialize;
use std::fmt;

use crate::error::Error;
use crate::ids::CustomerId;

/// Why an operation produced no rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum EmptyReason {
    CustomerNotFound { customer_id: CustomerId },
    NoSimilarUsers { customer_id: CustomerId },
    NoUnseenItems { customer_id: CustomerId },
    MatrixMisaligned { customer_id: CustomerId, detail: String },
    NoMatchingProduct { query: String },
}

impl fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CustomerNotFound { customer_id } => {
                write!(f, "Customer {customer_id} not found.")
            }
            Self::NoSimilarUsers { customer_id } => {
                write!(f, "No similar users found for {customer_id}.")
            }
            Self::NoUnseenItems { customer_id } => {
                write!(f, "No unseen items to recommend for {customer_id}.")
            }
            Self::MatrixMisaligned {
                customer_id,
                detail,
            } => write!(f, "Matrix alignment error for {customer_id}: {detail}"),
            Self::NoMatchingProduct { query } => {
                write!(f, "No match found for '{query}'. Please try a different term.")
            }
        }
    }
}

/// `Success(data) | Empty(reason) | Fatal(error)`
///
/// Callers branch on `Empty` to tell "nothing to recommend" apart from a
/// failure that should halt the current operation.
#[derive(Debug)]
pub enum Outcome<T> {
    Success(T),
    Empty(EmptyReason),
    Fatal(Error),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Outcome::Empty(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Outcome::Fatal(_))
    }

    pub fn success(self) -> Option<T> {
        match self {
            Outcome::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn empty_reason(&self) -> Option<&EmptyReason> {
        match self {
            Outcome::Empty(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Success(value) => Outcome::Success(f(value)),
            Outcome::Empty(reason) => Outcome::Empty(reason),
            Outcome::Fatal(error) => Outcome::Fatal(error),
        }
    }

    /// Collapse into a `Result`, keeping `Empty` as `Ok(None)`
    pub fn into_result(self) -> Result<Option<T>, Error> {
        match self {
            Outcome::Success(value) => Ok(Some(value)),
            Outcome::Empty(_) => Ok(None),
            Outcome::Fatal(error) => Err(error),
        }
    }
}

impl<T> From<Error> for Outcome<T> {
    fn from(error: Error) -> Self {
        Outcome::Fatal(error)
    }
}
