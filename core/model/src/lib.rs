//! FILENAME: core/model/src/lib.rs
//! PURPOSE: Main library entry point for the shared herd record model.
//! CONTEXT: Re-exports the record types consumed by the analytics engine
//! and the dashboard host.

pub mod date;
pub mod error;
pub mod field;
pub mod record;

// Re-export commonly used types at the crate root
pub use date::{parse_birth_date, NaiveDate};
pub use error::ModelError;
pub use field::RecordField;
pub use record::{HealthState, Record, RecordId};
