//! FILENAME: core/analytics/src/error.rs
//! Programmer errors raised by the analytics engine.
//!
//! Malformed record data never ends up here: it degrades to the unspecified
//! label or drops out of the one dimension it cannot feed. These variants
//! cover bad calls (unknown filter keys, broken bucket tables) and are
//! reported at call time instead of producing wrong aggregates.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyticsError {
    #[error("Unknown filter key: {0}")]
    UnknownFilterKey(String),

    #[error("Invalid value {value:?} for filter {key}")]
    InvalidFilterValue { key: String, value: String },

    #[error("Unknown dimension: {0}")]
    UnknownDimension(String),

    #[error("Unknown age bucket: {0}")]
    UnknownAgeBucket(String),

    #[error("Invalid age bucket table: {0}")]
    InvalidBucketTable(String),

    #[error("Invalid cross-tabulation: {0}")]
    InvalidCrossTab(String),
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
