//! FILENAME: app/src/api_types.rs
// PURPOSE: Request and response shapes exchanged with the charting collaborator.

use chrono::NaiveDate;
use herd_analytics::{CacheStats, FilterState};
use serde::{Deserialize, Serialize};

/// Result of loading a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotInfo {
    pub source: String,
    pub record_count: usize,
    pub skipped: usize,
}

/// Request to list the records behind one chart bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrillDownRequest {
    /// Dimension name, e.g. "race", "ageBucket", "familySubcategory"
    pub dimension: String,
    /// Bucket name as shown on the chart
    pub bucket: String,
    /// Optional: cap on listed identifiers (defaults to the configured limit)
    pub max_records: Option<usize>,
    /// Optional: reference date (defaults to today)
    pub now: Option<NaiveDate>,
}

/// Filter state after an update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterStateResponse {
    pub filters: FilterState,
    pub active_count: usize,
}

impl From<&FilterState> for FilterStateResponse {
    fn from(filters: &FilterState) -> Self {
        FilterStateResponse {
            filters: filters.clone(),
            active_count: filters.active_count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsResponse {
    pub stats: CacheStats,
    pub definition_version: u64,
    pub snapshot_loaded: bool,
}
