//! FILENAME: core/analytics/src/cache.rs
//! Analytics Cache - Memoized aggregates for one (snapshot, filters) pair.
//!
//! Every aggregate is a pure function of the snapshot, the definition, the
//! filter state and the reference date. The cache remembers the last such
//! combination and everything computed under it:
//! - the positions of the filtered records
//! - distributions and cross-tabulations requested by dimension
//! - the full dashboard view
//!
//! A different snapshot (by identity), definition version, filter state or
//! date drops everything at once. There is no partial invalidation.

use std::sync::Arc;

use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use herd_model::Record;

use crate::definition::{AnalyticsDefinition, CrossTabOptions, Dimension, DistributionSort};
use crate::engine::{cross_tab_by, distribution_by, DashboardCalculator};
use crate::error::Result;
use crate::filter::FilterState;
use crate::view::{Bucket, CrossTab, DashboardView};

/// Shared, immutable record snapshot. Identity (not content) keys the cache.
pub type Snapshot = Arc<Vec<Record>>;

/// Everything an aggregate depends on.
#[derive(Debug, Clone, Copy)]
pub struct AnalyticsQuery<'a> {
    pub snapshot: &'a Snapshot,
    pub definition: &'a AnalyticsDefinition,
    pub filters: &'a FilterState,
    pub now: NaiveDate,
}

impl<'a> AnalyticsQuery<'a> {
    pub fn new(
        snapshot: &'a Snapshot,
        definition: &'a AnalyticsDefinition,
        filters: &'a FilterState,
        now: NaiveDate,
    ) -> Self {
        AnalyticsQuery {
            snapshot,
            definition,
            filters,
            now,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheKey {
    snapshot: Snapshot,
    definition_version: u64,
    filters: FilterState,
    now: NaiveDate,
}

impl CacheKey {
    fn from_query(query: &AnalyticsQuery<'_>) -> Self {
        CacheKey {
            snapshot: Arc::clone(query.snapshot),
            definition_version: query.definition.version,
            filters: query.filters.clone(),
            now: query.now,
        }
    }

    fn matches(&self, query: &AnalyticsQuery<'_>) -> bool {
        Arc::ptr_eq(&self.snapshot, query.snapshot)
            && self.definition_version == query.definition.version
            && self.now == query.now
            && &self.filters == query.filters
    }
}

type CrossTabKey = (Dimension, Dimension, Option<CrossTabOptions>);

/// Hit/miss counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    pub total_records: usize,
    pub filtered_records: usize,
}

// ============================================================================
// MAIN CACHE STRUCT
// ============================================================================

#[derive(Debug, Default)]
pub struct AnalyticsCache {
    key: Option<CacheKey>,

    /// Snapshot positions passing the current filters.
    filtered: Vec<usize>,

    distributions: FxHashMap<(Dimension, DistributionSort), Vec<Bucket>>,
    cross_tabs: FxHashMap<CrossTabKey, CrossTab>,
    dashboard: Option<DashboardView>,

    pub stats: CacheStats,
}

impl AnalyticsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every memoized result.
    pub fn invalidate(&mut self) {
        if self.key.take().is_some() {
            self.stats.invalidations += 1;
        }
        self.filtered.clear();
        self.distributions.clear();
        self.cross_tabs.clear();
        self.dashboard = None;
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Whether results for `query` are currently held.
    pub fn is_current(&self, query: &AnalyticsQuery<'_>) -> bool {
        self.key.as_ref().map_or(false, |key| key.matches(query))
    }

    /// Re-keys the cache on `query`, refiltering when anything changed.
    fn ensure(&mut self, query: &AnalyticsQuery<'_>) -> Result<()> {
        if self.is_current(query) {
            return Ok(());
        }

        // Compile before dropping anything so a bad filter leaves the cache intact.
        let predicate = query.filters.compile_for(query.definition, query.now)?;
        self.invalidate();

        self.filtered = predicate.matching_indices(query.snapshot);
        self.stats.total_records = query.snapshot.len();
        self.stats.filtered_records = self.filtered.len();
        self.key = Some(CacheKey::from_query(query));
        Ok(())
    }

    fn filtered_records<'s>(&self, snapshot: &'s [Record]) -> Vec<&'s Record> {
        self.filtered.iter().map(|&i| &snapshot[i]).collect()
    }

    /// Snapshot positions of the records passing the query's filters.
    pub fn filtered_indices(&mut self, query: &AnalyticsQuery<'_>) -> Result<&[usize]> {
        if self.is_current(query) {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
            self.ensure(query)?;
        }
        Ok(&self.filtered)
    }

    /// Memoized [`distribution_by`] over the filtered set.
    pub fn distribution(
        &mut self,
        query: &AnalyticsQuery<'_>,
        dimension: Dimension,
        sort: DistributionSort,
    ) -> Result<Vec<Bucket>> {
        self.ensure(query)?;
        if let Some(buckets) = self.distributions.get(&(dimension, sort)) {
            self.stats.hits += 1;
            return Ok(buckets.clone());
        }

        self.stats.misses += 1;
        let records = self.filtered_records(query.snapshot);
        let buckets = distribution_by(records, dimension, sort, query.definition, query.now);
        self.distributions.insert((dimension, sort), buckets.clone());
        Ok(buckets)
    }

    /// Memoized [`cross_tab_by`] over the filtered set.
    pub fn cross_tab(
        &mut self,
        query: &AnalyticsQuery<'_>,
        outer: Dimension,
        inner: Dimension,
        options: Option<&CrossTabOptions>,
    ) -> Result<CrossTab> {
        self.ensure(query)?;
        let key = (outer, inner, options.cloned());
        if let Some(tab) = self.cross_tabs.get(&key) {
            self.stats.hits += 1;
            return Ok(tab.clone());
        }

        self.stats.misses += 1;
        let records = self.filtered_records(query.snapshot);
        let tab = cross_tab_by(records, outer, inner, options, query.definition, query.now)?;
        self.cross_tabs.insert(key, tab.clone());
        Ok(tab)
    }

    /// Memoized dashboard view.
    pub fn dashboard(&mut self, query: &AnalyticsQuery<'_>) -> Result<DashboardView> {
        self.ensure(query)?;
        if let Some(view) = &self.dashboard {
            self.stats.hits += 1;
            return Ok(view.clone());
        }

        self.stats.misses += 1;
        let records = self.filtered_records(query.snapshot);
        let view = DashboardCalculator::with_filtered(
            query.definition,
            query.filters,
            query.snapshot.len(),
            records,
            query.now,
        )
        .calculate()?;
        self.dashboard = Some(view.clone());
        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::calculate_dashboard;
    use crate::filter::FilterKey;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn snapshot() -> Snapshot {
        Arc::new(vec![
            Record::new("1").with_race("Arabe").with_discipline("Dressage"),
            Record::new("2").with_race("Barbe").with_discipline("E.C.A.S-Saut"),
            Record::new("3").with_race("Arabe").with_discipline("E.C.A.S"),
        ])
    }

    #[test]
    fn test_repeated_query_hits() {
        let snap = snapshot();
        let def = AnalyticsDefinition::default();
        let filters = FilterState::new();
        let query = AnalyticsQuery::new(&snap, &def, &filters, ymd(2024, 1, 1));
        let mut cache = AnalyticsCache::new();

        let first = cache.distribution(&query, Dimension::Race, DistributionSort::None).unwrap();
        let second = cache.distribution(&query, Dimension::Race, DistributionSort::None).unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.stats().misses, 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_filter_change_invalidates() {
        let snap = snapshot();
        let def = AnalyticsDefinition::default();
        let all = FilterState::new();
        let arabe = FilterState::new().with(FilterKey::Race, "Arabe");
        let now = ymd(2024, 1, 1);
        let mut cache = AnalyticsCache::new();

        let before = cache
            .distribution(&AnalyticsQuery::new(&snap, &def, &all, now), Dimension::Race, DistributionSort::None)
            .unwrap();
        assert_eq!(before.len(), 2);

        let after = cache
            .distribution(&AnalyticsQuery::new(&snap, &def, &arabe, now), Dimension::Race, DistributionSort::None)
            .unwrap();
        assert_eq!(after, vec![Bucket::new("Arabe", 2)]);
        assert_eq!(cache.stats().invalidations, 1);
        assert_eq!(cache.stats().filtered_records, 2);
    }

    #[test]
    fn test_new_snapshot_identity_invalidates() {
        let def = AnalyticsDefinition::default();
        let filters = FilterState::new();
        let now = ymd(2024, 1, 1);
        let first = snapshot();
        let same_content = snapshot();
        let mut cache = AnalyticsCache::new();

        cache.filtered_indices(&AnalyticsQuery::new(&first, &def, &filters, now)).unwrap();
        assert!(!cache.is_current(&AnalyticsQuery::new(&same_content, &def, &filters, now)));
        assert!(cache.is_current(&AnalyticsQuery::new(&Arc::clone(&first), &def, &filters, now)));
    }

    #[test]
    fn test_definition_version_invalidates() {
        let snap = snapshot();
        let mut def = AnalyticsDefinition::default();
        let filters = FilterState::new();
        let now = ymd(2024, 1, 1);
        let mut cache = AnalyticsCache::new();

        cache.dashboard(&AnalyticsQuery::new(&snap, &def, &filters, now)).unwrap();
        def.bump_version();
        let query = AnalyticsQuery::new(&snap, &def, &filters, now);
        assert!(!cache.is_current(&query));
        let view = cache.dashboard(&query).unwrap();
        assert_eq!(view.definition_version, 1);
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn test_cached_dashboard_matches_direct_calculation() {
        let snap = snapshot();
        let def = AnalyticsDefinition::default();
        let filters = FilterState::new().with(FilterKey::Discipline, "__family__");
        let now = ymd(2024, 1, 1);
        let mut cache = AnalyticsCache::new();

        let cached = cache.dashboard(&AnalyticsQuery::new(&snap, &def, &filters, now)).unwrap();
        let direct = calculate_dashboard(&def, &snap, &filters, now).unwrap();
        assert_eq!(cached, direct);
        assert_eq!(cached.filtered_records, 2);
    }

    #[test]
    fn test_bad_filter_keeps_previous_results() {
        let snap = snapshot();
        let def = AnalyticsDefinition::default();
        let good = FilterState::new();
        let bad = FilterState::new().with(FilterKey::HealthState, "lame");
        let now = ymd(2024, 1, 1);
        let mut cache = AnalyticsCache::new();

        let good_query = AnalyticsQuery::new(&snap, &def, &good, now);
        cache.cross_tab(&good_query, Dimension::Race, Dimension::Discipline, None).unwrap();
        assert!(cache.dashboard(&AnalyticsQuery::new(&snap, &def, &bad, now)).is_err());
        assert!(cache.is_current(&good_query));
        assert_eq!(cache.stats().invalidations, 0);
    }
}
