//! FILENAME: core/model/src/error.rs

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Unknown health state: {0}")]
    UnknownHealthState(String),
}
