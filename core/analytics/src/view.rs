//! FILENAME: core/analytics/src/view.rs
//! Analytics View - Chart-ready output for the rendering surface.
//!
//! Shapes consumed by the charting collaborator:
//! - `Bucket`: one `name`/`value` point of a single-dimension series
//! - `CrossTabRow`: one category of a stacked chart, with one entry per
//!   non-zero series (missing series mean zero)
//! - `DashboardView`: every configured chart plus the counts needed to
//!   render an explicit empty state

use std::borrow::Cow;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use smallvec::SmallVec;

use herd_model::RecordId;

use crate::definition::Dimension;
use crate::filter::FilterState;

// ============================================================================
// SINGLE DIMENSION
// ============================================================================

/// A named, countable partition of a distribution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bucket {
    pub name: String,
    pub value: u64,
}

impl Bucket {
    pub fn new(name: impl Into<String>, value: u64) -> Self {
        Bucket {
            name: name.into(),
            value,
        }
    }

    /// Fraction of `total` held by this bucket (0 for an empty total).
    pub fn share_of(&self, total: u64) -> f64 {
        if total == 0 {
            0.0
        } else {
            self.value as f64 / total as f64
        }
    }
}

/// Sum of all bucket values.
pub fn bucket_total(buckets: &[Bucket]) -> u64 {
    buckets.iter().map(|b| b.value).sum()
}

// ============================================================================
// TWO DIMENSIONS
// ============================================================================

/// Inner-key counts of one row. Most rows carry only a handful of series.
pub type RowCells = SmallVec<[(String, u64); 8]>;

/// One outer-dimension value with its non-zero inner counts.
///
/// Serializes as a flat object: `{"name": <outer>, <inner>: <count>, ...}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossTabRow {
    pub name: String,
    pub cells: RowCells,
}

impl CrossTabRow {
    pub fn new(name: impl Into<String>) -> Self {
        CrossTabRow {
            name: name.into(),
            cells: SmallVec::new(),
        }
    }

    /// Count for an inner key; absent keys are zero.
    pub fn get(&self, inner: &str) -> u64 {
        self.cells
            .iter()
            .find(|(k, _)| k == inner)
            .map_or(0, |(_, v)| *v)
    }

    /// Sum of every cell in the row.
    pub fn total(&self) -> u64 {
        self.cells.iter().map(|(_, v)| *v).sum()
    }
}

/// Key holding the outer label in a serialized [`CrossTabRow`].
pub const ROW_NAME_KEY: &str = "name";

/// Series key for an inner value. [`ROW_NAME_KEY`] is reserved, so an inner
/// value spelled like it is emitted with a trailing underscore.
pub fn series_key(inner: &str) -> Cow<'_, str> {
    if inner == ROW_NAME_KEY {
        Cow::Owned(format!("{}_", inner))
    } else {
        Cow::Borrowed(inner)
    }
}

impl Serialize for CrossTabRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len() + 1))?;
        map.serialize_entry(ROW_NAME_KEY, &self.name)?;
        for (key, value) in &self.cells {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// A cross-tabulation: the ordered series (inner keys kept, overflow last)
/// and one row per outer value, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrossTab {
    pub series: Vec<String>,
    pub rows: Vec<CrossTabRow>,
}

impl CrossTab {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, outer: &str) -> Option<&CrossTabRow> {
        self.rows.iter().find(|r| r.name == outer)
    }
}

// ============================================================================
// DASHBOARD
// ============================================================================

/// Data behind one chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ChartPayload {
    Distribution(Vec<Bucket>),
    CrossTab(CrossTab),
}

impl ChartPayload {
    pub fn is_empty(&self) -> bool {
        match self {
            ChartPayload::Distribution(buckets) => buckets.is_empty(),
            ChartPayload::CrossTab(tab) => tab.is_empty(),
        }
    }

    pub fn as_distribution(&self) -> Option<&[Bucket]> {
        match self {
            ChartPayload::Distribution(buckets) => Some(buckets),
            ChartPayload::CrossTab(_) => None,
        }
    }

    pub fn as_cross_tab(&self) -> Option<&CrossTab> {
        match self {
            ChartPayload::CrossTab(tab) => Some(tab),
            ChartPayload::Distribution(_) => None,
        }
    }

    /// Records counted by the chart. Can be below the filtered count when
    /// some records have no key on the charted dimension.
    pub fn total(&self) -> u64 {
        match self {
            ChartPayload::Distribution(buckets) => bucket_total(buckets),
            ChartPayload::CrossTab(tab) => tab.rows.iter().map(CrossTabRow::total).sum(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartView {
    pub id: String,
    pub title: String,
    pub payload: ChartPayload,

    /// Grand total of the chart, the base of its percentage labels.
    pub total: u64,

    /// Share of `total` per bucket, in bucket order. Distributions only.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub shares: Vec<f64>,
}

impl ChartView {
    pub fn new(id: &str, title: &str, payload: ChartPayload) -> Self {
        let total = payload.total();
        let shares = payload
            .as_distribution()
            .map(|buckets| buckets.iter().map(|b| b.share_of(total)).collect())
            .unwrap_or_default();
        ChartView {
            id: id.to_string(),
            title: title.to_string(),
            payload,
            total,
            shares,
        }
    }
}

/// Every configured chart computed over one filtered set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub definition_version: u64,
    pub total_records: usize,
    pub filtered_records: usize,
    pub active_filters: FilterState,
    /// True when the filters leave no record; render an empty state.
    pub is_empty: bool,
    pub charts: Vec<ChartView>,
}

impl DashboardView {
    pub fn chart(&self, id: &str) -> Option<&ChartView> {
        self.charts.iter().find(|c| c.id == id)
    }
}

// ============================================================================
// FILTER CONTROLS & DRILL-DOWN
// ============================================================================

/// Choices offered by the filter controls, taken from the whole snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub races: Vec<String>,
    pub robes: Vec<String>,
    pub disciplines: Vec<String>,
    pub sexes: Vec<String>,
    pub health_states: Vec<String>,
    pub age_ranges: Vec<String>,
    /// Discipline filter value selecting the whole family, when any member exists.
    pub family_value: Option<String>,
}

/// Records behind one bucket of a chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrillDownResult {
    pub dimension: Dimension,
    pub bucket: String,

    /// Matching record identifiers, in snapshot order.
    pub record_ids: Vec<RecordId>,

    /// Total count of matching records.
    pub total_count: usize,

    /// Whether `record_ids` was cut at `max_records`.
    pub is_truncated: bool,

    pub max_records: usize,
}

impl DrillDownResult {
    pub fn new(dimension: Dimension, bucket: &str, max_records: usize) -> Self {
        DrillDownResult {
            dimension,
            bucket: bucket.to_string(),
            record_ids: Vec::new(),
            total_count: 0,
            is_truncated: false,
            max_records,
        }
    }
}
