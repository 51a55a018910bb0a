//! FILENAME: core/analytics/src/filter.rs
//! Filter state and the record predicate built from it.
//!
//! The presentation layer owns a [`FilterState`] (key -> selected value) and
//! passes it into every engine call. [`FilterState::compile`] turns it into
//! a single [`RecordFilter`] that AND-s every active constraint.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use herd_model::{HealthState, Record};
use serde::{Deserialize, Serialize};

use crate::age::record_age;
use crate::definition::{AgeBucket, AgeBucketTable, AnalyticsDefinition, FamilyRule};
use crate::error::{AnalyticsError, Result};
use crate::normalize::normalize;

/// Discipline filter value selecting every member of the family.
pub const FAMILY_FILTER_VALUE: &str = "__family__";

// ============================================================================
// FILTER KEYS
// ============================================================================

/// The recognized filter keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterKey {
    Race,
    Robe,
    HealthState,
    Discipline,
    AgeRange,
    Sex,
}

impl FilterKey {
    pub const ALL: [FilterKey; 6] = [
        FilterKey::Race,
        FilterKey::Robe,
        FilterKey::HealthState,
        FilterKey::Discipline,
        FilterKey::AgeRange,
        FilterKey::Sex,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKey::Race => "race",
            FilterKey::Robe => "robe",
            FilterKey::HealthState => "healthState",
            FilterKey::Discipline => "discipline",
            FilterKey::AgeRange => "ageRange",
            FilterKey::Sex => "sex",
        }
    }
}

impl fmt::Display for FilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterKey {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "race" => Ok(FilterKey::Race),
            "robe" => Ok(FilterKey::Robe),
            "healthState" | "health-state" | "health_state" => Ok(FilterKey::HealthState),
            "discipline" => Ok(FilterKey::Discipline),
            "ageRange" | "age-range" | "age_range" => Ok(FilterKey::AgeRange),
            "sex" => Ok(FilterKey::Sex),
            other => Err(AnalyticsError::UnknownFilterKey(other.to_string())),
        }
    }
}

// ============================================================================
// FILTER STATE
// ============================================================================

/// Selected value per filter key.
///
/// Empty values are never stored, so a key set to `""` and an absent key
/// compare (and hash) identically. The default state matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, String>",
    into = "BTreeMap<String, String>"
)]
pub struct FilterState {
    values: BTreeMap<FilterKey, String>,
}

impl FilterState {
    pub fn new() -> Self {
        FilterState::default()
    }

    /// Sets a filter from its wire name. An empty value clears the key.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let key = key.parse::<FilterKey>()?;
        self.set_key(key, value);
        Ok(())
    }

    pub fn set_key(&mut self, key: FilterKey, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            self.values.remove(&key);
        } else {
            self.values.insert(key, value.to_string());
        }
    }

    /// Builder form of [`FilterState::set_key`].
    pub fn with(mut self, key: FilterKey, value: &str) -> Self {
        self.set_key(key, value);
        self
    }

    pub fn get(&self, key: FilterKey) -> Option<&str> {
        self.values.get(&key).map(String::as_str)
    }

    pub fn clear(&mut self, key: FilterKey) {
        self.values.remove(&key);
    }

    /// Resets every key to "no constraint".
    pub fn clear_all(&mut self) {
        self.values.clear();
    }

    pub fn active_count(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FilterKey, &str)> {
        self.values.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Builds the record predicate. Fails on a health state or age range
    /// that does not exist.
    pub fn compile<'a>(
        &'a self,
        table: &'a AgeBucketTable,
        family: &'a FamilyRule,
        now: NaiveDate,
    ) -> Result<RecordFilter<'a>> {
        let health = match self.get(FilterKey::HealthState) {
            Some(value) => Some(value.parse::<HealthState>().map_err(|_| {
                AnalyticsError::InvalidFilterValue {
                    key: FilterKey::HealthState.to_string(),
                    value: value.to_string(),
                }
            })?),
            None => None,
        };

        let age = match self.get(FilterKey::AgeRange) {
            Some(label) => Some(
                table
                    .find(label)
                    .ok_or_else(|| AnalyticsError::UnknownAgeBucket(label.to_string()))?,
            ),
            None => None,
        };

        let discipline = self.get(FilterKey::Discipline).map(|value| {
            if value == FAMILY_FILTER_VALUE {
                DisciplineFilter::Family
            } else {
                DisciplineFilter::Exact(value)
            }
        });

        Ok(RecordFilter {
            race: self.get(FilterKey::Race),
            robe: self.get(FilterKey::Robe),
            sex: self.get(FilterKey::Sex),
            health,
            discipline,
            age,
            family,
            now,
        })
    }

    /// Compiles against a definition's bucket table and family rule.
    pub fn compile_for<'a>(
        &'a self,
        definition: &'a AnalyticsDefinition,
        now: NaiveDate,
    ) -> Result<RecordFilter<'a>> {
        self.compile(&definition.age_buckets, &definition.family, now)
    }
}

impl TryFrom<BTreeMap<String, String>> for FilterState {
    type Error = AnalyticsError;

    fn try_from(raw: BTreeMap<String, String>) -> Result<Self> {
        let mut state = FilterState::new();
        for (key, value) in &raw {
            state.set(key, value)?;
        }
        Ok(state)
    }
}

impl From<FilterState> for BTreeMap<String, String> {
    fn from(state: FilterState) -> Self {
        state
            .values
            .into_iter()
            .map(|(k, v)| (k.as_str().to_string(), v))
            .collect()
    }
}

// ============================================================================
// RECORD PREDICATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DisciplineFilter<'a> {
    /// Any member of the family.
    Family,
    /// Exact match on the raw discipline text.
    Exact(&'a str),
}

/// Conjunction of every active filter, ready to test records.
#[derive(Debug, Clone)]
pub struct RecordFilter<'a> {
    race: Option<&'a str>,
    robe: Option<&'a str>,
    sex: Option<&'a str>,
    health: Option<HealthState>,
    discipline: Option<DisciplineFilter<'a>>,
    age: Option<&'a AgeBucket>,
    family: &'a FamilyRule,
    now: NaiveDate,
}

impl<'a> RecordFilter<'a> {
    /// Whether the record satisfies every active constraint.
    /// A missing field never matches a concrete filter value.
    pub fn matches(&self, record: &Record) -> bool {
        fn text_matches(wanted: Option<&str>, actual: Option<&str>) -> bool {
            wanted.map_or(true, |w| actual == Some(w))
        }

        if !text_matches(self.race, record.race.as_deref())
            || !text_matches(self.robe, record.robe.as_deref())
            || !text_matches(self.sex, record.sex.as_deref())
        {
            return false;
        }

        if let Some(health) = self.health {
            if record.health_state != Some(health) {
                return false;
            }
        }

        match self.discipline {
            Some(DisciplineFilter::Family) => {
                if !normalize(record.discipline.as_deref(), self.family).is_family() {
                    return false;
                }
            }
            Some(DisciplineFilter::Exact(value)) => {
                if record.discipline.as_deref() != Some(value) {
                    return false;
                }
            }
            None => {}
        }

        if let Some(bucket) = self.age {
            match record_age(record, self.now) {
                Some(age) if bucket.contains(age) => {}
                _ => return false,
            }
        }

        true
    }

    /// Records that pass the filter, in snapshot order.
    pub fn apply<'r>(&self, records: &'r [Record]) -> Vec<&'r Record> {
        records.iter().filter(|r| self.matches(r)).collect()
    }

    /// Snapshot positions of the records that pass the filter.
    pub fn matching_indices(&self, records: &[Record]) -> Vec<usize> {
        records
            .iter()
            .enumerate()
            .filter_map(|(i, r)| if self.matches(r) { Some(i) } else { None })
            .collect()
    }
}

/// One-shot form: does `record` pass `filters`?
pub fn matches(
    record: &Record,
    filters: &FilterState,
    definition: &AnalyticsDefinition,
    now: NaiveDate,
) -> Result<bool> {
    Ok(filters.compile_for(definition, now)?.matches(record))
}
