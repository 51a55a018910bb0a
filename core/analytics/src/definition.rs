//! FILENAME: core/analytics/src/definition.rs
//! Analytics Definition - The serializable configuration.
//!
//! This module contains all the types needed to DESCRIBE the dashboard
//! analytics. These structures are designed to be:
//! - Serializable (loaded from the dashboard configuration file)
//! - Validated on construction (a broken bucket table fails fast)
//! - Immutable snapshots of what the dashboard should compute

use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};

/// Presentation label for a missing or empty field.
pub const UNSPECIFIED_LABEL: &str = "Non spécifié";

/// Overflow bucket label for top-N cross-tabulations.
pub const DEFAULT_OTHER_LABEL: &str = "Autres";

/// Literal prefix shared by every member of the discipline family.
pub const FAMILY_PREFIX: &str = "E.C.A.S";

/// Sub-category assigned to family members without a separator.
pub const FAMILY_FALLBACK_SUBCATEGORY: &str = "Autre";

// ============================================================================
// AGE BUCKETS
// ============================================================================

/// A named, inclusive age range. `max == None` marks the open-ended catch-all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeBucket {
    pub label: String,
    pub min: u32,
    #[serde(default)]
    pub max: Option<u32>,
}

impl AgeBucket {
    pub fn closed(label: &str, min: u32, max: u32) -> Self {
        AgeBucket {
            label: label.to_string(),
            min,
            max: Some(max),
        }
    }

    pub fn open(label: &str, min: u32) -> Self {
        AgeBucket {
            label: label.to_string(),
            min,
            max: None,
        }
    }

    /// Whether `age` (in whole years) falls inside this bucket.
    pub fn contains(&self, age: i32) -> bool {
        if age < 0 {
            return false;
        }
        let age = age as u32;
        age >= self.min && self.max.map_or(true, |max| age <= max)
    }
}

/// Ordered, validated list of age buckets.
///
/// Invariants, checked by [`AgeBucketTable::new`]:
/// - at least one bucket, labels non-empty and unique
/// - the first bucket starts at 0
/// - every bucket starts one year after the previous one ends
/// - the last bucket is the catch-all (its `max` is dropped)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<AgeBucket>", into = "Vec<AgeBucket>")]
pub struct AgeBucketTable {
    buckets: Vec<AgeBucket>,
}

impl AgeBucketTable {
    pub fn new(mut buckets: Vec<AgeBucket>) -> Result<Self> {
        if buckets.is_empty() {
            return Err(AnalyticsError::InvalidBucketTable(
                "table has no buckets".to_string(),
            ));
        }

        let last = buckets.len() - 1;
        let mut expected_min = 0u32;
        for (i, bucket) in buckets.iter().enumerate() {
            if bucket.label.trim().is_empty() {
                return Err(AnalyticsError::InvalidBucketTable(format!(
                    "bucket {} has an empty label",
                    i
                )));
            }
            if buckets[..i].iter().any(|b| b.label == bucket.label) {
                return Err(AnalyticsError::InvalidBucketTable(format!(
                    "duplicate label {:?}",
                    bucket.label
                )));
            }
            if bucket.min != expected_min {
                return Err(AnalyticsError::InvalidBucketTable(format!(
                    "bucket {:?} starts at {} but {} was expected",
                    bucket.label, bucket.min, expected_min
                )));
            }
            if i == last {
                break;
            }
            match bucket.max {
                Some(max) if max >= bucket.min => {
                    expected_min = max.checked_add(1).ok_or_else(|| {
                        AnalyticsError::InvalidBucketTable(format!(
                            "bucket {:?} covers every age but is not the last one",
                            bucket.label
                        ))
                    })?;
                }
                Some(max) => {
                    return Err(AnalyticsError::InvalidBucketTable(format!(
                        "bucket {:?} ends at {} before it starts at {}",
                        bucket.label, max, bucket.min
                    )));
                }
                None => {
                    return Err(AnalyticsError::InvalidBucketTable(format!(
                        "only the last bucket may be open-ended, not {:?}",
                        bucket.label
                    )));
                }
            }
        }

        // The last entry catches every age above the previous range.
        buckets[last].max = None;

        Ok(AgeBucketTable { buckets })
    }

    pub fn buckets(&self) -> &[AgeBucket] {
        &self.buckets
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().map(|b| b.label.as_str())
    }

    /// Looks a bucket up by label.
    pub fn find(&self, label: &str) -> Option<&AgeBucket> {
        self.buckets.iter().find(|b| b.label == label)
    }

    /// Position of a label in the table (used for canonical ordering).
    pub fn position(&self, label: &str) -> Option<usize> {
        self.buckets.iter().position(|b| b.label == label)
    }

    /// Maps an age to its bucket; `None` for a missing or negative age.
    pub fn bucket_for(&self, age: Option<i32>) -> Option<&AgeBucket> {
        let age = age?;
        self.buckets.iter().find(|b| b.contains(age))
    }
}

impl Default for AgeBucketTable {
    /// The canonical table, shared by the age filter and the age charts.
    fn default() -> Self {
        AgeBucketTable {
            buckets: vec![
                AgeBucket::closed("0-4", 0, 4),
                AgeBucket::closed("5-9", 5, 9),
                AgeBucket::closed("10-14", 10, 14),
                AgeBucket::closed("15-19", 15, 19),
                AgeBucket::open("20+", 20),
            ],
        }
    }
}

impl TryFrom<Vec<AgeBucket>> for AgeBucketTable {
    type Error = AnalyticsError;

    fn try_from(buckets: Vec<AgeBucket>) -> Result<Self> {
        AgeBucketTable::new(buckets)
    }
}

impl From<AgeBucketTable> for Vec<AgeBucket> {
    fn from(table: AgeBucketTable) -> Self {
        table.buckets
    }
}

// ============================================================================
// DISCIPLINE FAMILY
// ============================================================================

/// How members of the hierarchical discipline family are recognized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FamilyRule {
    /// Literal prefix; its text is also the family's top-level label.
    pub prefix: String,
    /// Separator between the family tag and the sub-category.
    pub separator: String,
    /// Sub-category for members with no (or an empty) sub-category.
    pub fallback_subcategory: String,
}

impl Default for FamilyRule {
    fn default() -> Self {
        FamilyRule {
            prefix: FAMILY_PREFIX.to_string(),
            separator: "-".to_string(),
            fallback_subcategory: FAMILY_FALLBACK_SUBCATEGORY.to_string(),
        }
    }
}

// ============================================================================
// DIMENSIONS & SORTING
// ============================================================================

/// A record dimension the builders can group by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Dimension {
    Race,
    Robe,
    Sex,
    HealthState,
    /// Normalized discipline: family members collapse into the family label.
    Discipline,
    /// Family sub-category; records outside the family have no key.
    FamilySubcategory,
    /// Canonical age bucket; records without a usable age have no key.
    AgeBucket,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Race => "race",
            Dimension::Robe => "robe",
            Dimension::Sex => "sex",
            Dimension::HealthState => "healthState",
            Dimension::Discipline => "discipline",
            Dimension::FamilySubcategory => "familySubcategory",
            Dimension::AgeBucket => "ageBucket",
        }
    }
}

impl std::str::FromStr for Dimension {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "race" => Ok(Dimension::Race),
            "robe" => Ok(Dimension::Robe),
            "sex" => Ok(Dimension::Sex),
            "healthState" | "health-state" => Ok(Dimension::HealthState),
            "discipline" => Ok(Dimension::Discipline),
            "familySubcategory" | "family-subcategory" => Ok(Dimension::FamilySubcategory),
            "ageBucket" | "age-bucket" | "ageRange" | "age-range" => Ok(Dimension::AgeBucket),
            other => Err(AnalyticsError::UnknownDimension(other.to_string())),
        }
    }
}

/// Output order of a distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum DistributionSort {
    /// First-seen key order.
    #[default]
    None,
    /// Descending count, ties kept in first-seen order.
    ByCountDesc,
    /// Domain order where the dimension has one (age table, health states);
    /// first-seen order otherwise.
    Canonical,
}

/// Top-N collapsing for the inner dimension of a cross-tabulation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CrossTabOptions {
    pub top_n: usize,
    #[serde(default = "default_other_label")]
    pub other_label: String,
}

fn default_other_label() -> String {
    DEFAULT_OTHER_LABEL.to_string()
}

impl CrossTabOptions {
    pub fn top(top_n: usize) -> Self {
        CrossTabOptions {
            top_n,
            other_label: default_other_label(),
        }
    }
}

// ============================================================================
// CHARTS
// ============================================================================

/// What a chart aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChartKind {
    Distribution {
        dimension: Dimension,
        #[serde(default)]
        sort: DistributionSort,
    },
    CrossTab {
        outer: Dimension,
        inner: Dimension,
        #[serde(default)]
        options: Option<CrossTabOptions>,
    },
}

/// One chart on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartDefinition {
    pub id: String,
    pub title: String,
    pub kind: ChartKind,
}

impl ChartDefinition {
    pub fn distribution(id: &str, title: &str, dimension: Dimension, sort: DistributionSort) -> Self {
        ChartDefinition {
            id: id.to_string(),
            title: title.to_string(),
            kind: ChartKind::Distribution { dimension, sort },
        }
    }

    pub fn cross_tab(
        id: &str,
        title: &str,
        outer: Dimension,
        inner: Dimension,
        options: Option<CrossTabOptions>,
    ) -> Self {
        ChartDefinition {
            id: id.to_string(),
            title: title.to_string(),
            kind: ChartKind::CrossTab { outer, inner, options },
        }
    }
}

/// The charts of the veterinary dashboard.
pub fn default_charts() -> Vec<ChartDefinition> {
    vec![
        ChartDefinition::distribution(
            "health",
            "État de santé",
            Dimension::HealthState,
            DistributionSort::None,
        ),
        ChartDefinition::distribution(
            "race",
            "Répartition par race",
            Dimension::Race,
            DistributionSort::ByCountDesc,
        ),
        ChartDefinition::distribution(
            "robe",
            "Répartition par robe",
            Dimension::Robe,
            DistributionSort::None,
        ),
        ChartDefinition::distribution(
            "discipline",
            "Répartition par discipline",
            Dimension::Discipline,
            DistributionSort::None,
        ),
        ChartDefinition::distribution(
            "family",
            "Sous-disciplines E.C.A.S",
            Dimension::FamilySubcategory,
            DistributionSort::None,
        ),
        ChartDefinition::distribution(
            "age",
            "Répartition par âge",
            Dimension::AgeBucket,
            DistributionSort::Canonical,
        ),
        ChartDefinition::distribution(
            "sex",
            "Répartition par sexe",
            Dimension::Sex,
            DistributionSort::None,
        ),
        ChartDefinition::cross_tab(
            "race-discipline",
            "Disciplines par race",
            Dimension::Race,
            Dimension::Discipline,
            Some(CrossTabOptions::top(5)),
        ),
        ChartDefinition::cross_tab(
            "age-health",
            "État de santé par âge",
            Dimension::AgeBucket,
            Dimension::HealthState,
            None,
        ),
    ]
}

// ============================================================================
// MAIN DEFINITION STRUCT
// ============================================================================

/// The complete, serializable configuration of the analytics engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsDefinition {
    /// Canonical age table, used for both the age filter and the age charts.
    pub age_buckets: AgeBucketTable,

    pub family: FamilyRule,

    /// Label shown for missing text fields.
    pub unspecified_label: String,

    pub charts: Vec<ChartDefinition>,

    /// Version for cache invalidation.
    pub version: u64,
}

impl Default for AnalyticsDefinition {
    fn default() -> Self {
        AnalyticsDefinition {
            age_buckets: AgeBucketTable::default(),
            family: FamilyRule::default(),
            unspecified_label: UNSPECIFIED_LABEL.to_string(),
            charts: default_charts(),
            version: 0,
        }
    }
}

impl AnalyticsDefinition {
    /// Increments the version (for cache invalidation).
    pub fn bump_version(&mut self) {
        self.version += 1;
    }

    pub fn chart(&self, id: &str) -> Option<&ChartDefinition> {
        self.charts.iter().find(|c| c.id == id)
    }
}
