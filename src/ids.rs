//! Customer and item identifiers
//!
//! Upstream exports frequently turn numeric ids into floats (`17850` becomes
//! `17850.0`). Ids are normalized once, when a row is ingested, so every
//! later lookup compares canonical strings.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Normalize a raw identifier cell.
///
/// Returns `None` for empty or `nan` cells. A trailing `.0` is stripped from
/// numeric-looking values only, so codes such as `POST.0X` are left alone.
pub fn normalize_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return None;
    }

    if let Some(stem) = trimmed.strip_suffix(".0") {
        let digits = stem.strip_prefix('-').unwrap_or(stem);
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return Some(stem.to_string());
        }
    }

    Some(trimmed.to_string())
}

/// Canonical customer identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(String);

impl CustomerId {
    /// Build an id from a raw dataset cell.
    pub fn from_raw(raw: &str) -> Option<Self> {
        normalize_id(raw).map(Self)
    }

    /// Parse an id typed by a user.
    ///
    /// Input must be numeric; it is truncated to an integer, so `12350`,
    /// ` 12350.0 ` and `12350.7` all resolve to `12350`.
    pub fn parse_input(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let value: f64 = trimmed
            .parse()
            .map_err(|_| Error::InvalidCustomerId(raw.to_string()))?;
        if !value.is_finite() {
            return Err(Error::InvalidCustomerId(raw.to_string()));
        }
        Ok(Self(format!("{}", value.trunc() as i64)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical item (stock code) identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockCode(String);

impl StockCode {
    pub fn from_raw(raw: &str) -> Option<Self> {
        normalize_id(raw).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StockCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_float_suffix() {
        assert_eq!(normalize_id("17850.0").as_deref(), Some("17850"));
        assert_eq!(normalize_id(" 17850 ").as_deref(), Some("17850"));
        assert_eq!(normalize_id("-4.0").as_deref(), Some("-4"));
    }

    #[test]
    fn test_normalize_keeps_non_numeric_codes() {
        assert_eq!(normalize_id("85123A").as_deref(), Some("85123A"));
        assert_eq!(normalize_id("POST.0").as_deref(), Some("POST.0"));
        assert_eq!(normalize_id("12.05").as_deref(), Some("12.05"));
    }

    #[test]
    fn test_normalize_missing_values() {
        assert_eq!(normalize_id(""), None);
        assert_eq!(normalize_id("   "), None);
        assert_eq!(normalize_id("NaN"), None);
    }

    #[test]
    fn test_parse_input() {
        assert_eq!(CustomerId::parse_input("12350").unwrap().as_str(), "12350");
        assert_eq!(CustomerId::parse_input(" 12350.0 ").unwrap().as_str(), "12350");
        assert_eq!(CustomerId::parse_input("12350.7").unwrap().as_str(), "12350");
        assert!(CustomerId::parse_input("abc").is_err());
        assert!(CustomerId::parse_input("").is_err());
        assert!(CustomerId::parse_input("inf").is_err());
    }

    #[test]
    fn test_raw_and_input_ids_agree() {
        let from_data = CustomerId::from_raw("12350.0").unwrap();
        let from_user = CustomerId::parse_input("12350").unwrap();
        assert_eq!(from_data, from_user);
    }
}
