//! FILENAME: core/model/src/field.rs
//! PURPOSE: Names the textual record fields that groupings and filter
//! controls read through [`crate::Record::text_field`].

use serde::{Deserialize, Serialize};

/// A field of [`crate::Record`] with a textual value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordField {
    Race,
    Robe,
    Discipline,
    Sex,
    HealthState,
}
