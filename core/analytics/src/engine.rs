//! FILENAME: core/analytics/src/engine.rs
//! Analytics Engine - Turns a record snapshot into chart-ready aggregates.
//!
//! This module takes an AnalyticsDefinition (configuration), a record
//! snapshot and a FilterState, and produces a DashboardView.
//!
//! Algorithm:
//! 1. Compile the filter state into one conjunctive predicate
//! 2. Filter the snapshot once
//! 3. For each configured chart, group the filtered set by one dimension
//!    (distribution) or two (cross-tabulation)
//! 4. Collapse cross-tab inner keys to the global top-N when requested

use std::collections::BTreeSet;
use std::hash::Hash;

use chrono::NaiveDate;
use rustc_hash::FxHashMap;

use herd_model::{HealthState, Record, RecordField};

use crate::age::record_bucket;
use crate::definition::{
    AnalyticsDefinition, ChartDefinition, ChartKind, CrossTabOptions, Dimension,
    DistributionSort,
};
use crate::error::{AnalyticsError, Result};
use crate::filter::{FilterState, RecordFilter, FAMILY_FILTER_VALUE};
use crate::normalize::normalize;
use crate::view::{
    series_key, Bucket, ChartPayload, ChartView, CrossTab, CrossTabRow, DashboardView,
    DrillDownResult, FilterOptions,
};

// ============================================================================
// DIMENSION KEYS
// ============================================================================

/// Grouping key of a record along one dimension.
///
/// `None` means the record has no value on that dimension (not a family
/// member, no usable age) and sits out of that grouping only. Missing text
/// fields map to the definition's unspecified label.
pub fn dimension_key<'a>(
    record: &'a Record,
    dimension: Dimension,
    definition: &'a AnalyticsDefinition,
    now: NaiveDate,
) -> Option<&'a str> {
    let unspecified = definition.unspecified_label.as_str();
    match dimension {
        Dimension::Race => Some(record.text_field(RecordField::Race).unwrap_or(unspecified)),
        Dimension::Robe => Some(record.text_field(RecordField::Robe).unwrap_or(unspecified)),
        Dimension::Sex => Some(record.text_field(RecordField::Sex).unwrap_or(unspecified)),
        Dimension::HealthState => {
            Some(record.text_field(RecordField::HealthState).unwrap_or(unspecified))
        }
        Dimension::Discipline => {
            Some(normalize(record.discipline.as_deref(), &definition.family).key(unspecified))
        }
        Dimension::FamilySubcategory => {
            normalize(record.discipline.as_deref(), &definition.family).sub_key()
        }
        Dimension::AgeBucket => {
            record_bucket(record, now, &definition.age_buckets).map(|b| b.label.as_str())
        }
    }
}

/// Position of a key in the dimension's natural domain order, if it has one.
fn canonical_rank(dimension: Dimension, key: &str, definition: &AnalyticsDefinition) -> Option<usize> {
    match dimension {
        Dimension::AgeBucket => definition.age_buckets.position(key),
        Dimension::HealthState => HealthState::ALL.iter().position(|h| h.as_str() == key),
        _ => None,
    }
}

// ============================================================================
// DISTRIBUTION BUILDER
// ============================================================================

/// Counts records per key in a single pass.
///
/// One bucket per distinct key, in first-seen order unless `sort` is
/// `ByCountDesc` (stable, so ties keep first-seen order). Records for which
/// `key_fn` returns `None` are skipped; with a total key function the bucket
/// values sum to the number of records.
pub fn distribution<'a, I, F, K>(records: I, mut key_fn: F, sort: DistributionSort) -> Vec<Bucket>
where
    I: IntoIterator<Item = &'a Record>,
    F: FnMut(&'a Record) -> Option<K>,
    K: AsRef<str> + Eq + Hash,
{
    let mut index: FxHashMap<K, usize> = FxHashMap::default();
    let mut buckets: Vec<Bucket> = Vec::new();

    for record in records {
        let key = match key_fn(record) {
            Some(key) => key,
            None => continue,
        };
        match index.get(&key) {
            Some(&i) => buckets[i].value += 1,
            None => {
                buckets.push(Bucket::new(key.as_ref(), 1));
                index.insert(key, buckets.len() - 1);
            }
        }
    }

    if sort == DistributionSort::ByCountDesc {
        buckets.sort_by(|a, b| b.value.cmp(&a.value));
    }
    buckets
}

/// Distribution along a [`Dimension`], honouring `Canonical` ordering.
pub fn distribution_by<'a, I>(
    records: I,
    dimension: Dimension,
    sort: DistributionSort,
    definition: &'a AnalyticsDefinition,
    now: NaiveDate,
) -> Vec<Bucket>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut buckets = distribution(
        records,
        |r| dimension_key(r, dimension, definition, now),
        sort,
    );
    if sort == DistributionSort::Canonical {
        buckets.sort_by_key(|b| canonical_rank(dimension, &b.name, definition).unwrap_or(usize::MAX));
    }
    buckets
}

// ============================================================================
// CROSS-TABULATION BUILDER
// ============================================================================

/// Two-level counter: outer keys and inner keys interned in first-seen order.
struct CrossCounter {
    outer_index: FxHashMap<String, usize>,
    outer_names: Vec<String>,
    inner_index: FxHashMap<String, usize>,
    inner_names: Vec<String>,
    inner_totals: Vec<u64>,
    /// counts[outer][inner]; rows grow lazily as inner keys appear.
    counts: Vec<Vec<u64>>,
}

impl CrossCounter {
    fn new() -> Self {
        CrossCounter {
            outer_index: FxHashMap::default(),
            outer_names: Vec::new(),
            inner_index: FxHashMap::default(),
            inner_names: Vec::new(),
            inner_totals: Vec::new(),
            counts: Vec::new(),
        }
    }

    fn intern(index: &mut FxHashMap<String, usize>, names: &mut Vec<String>, key: &str) -> usize {
        if let Some(&id) = index.get(key) {
            return id;
        }
        let id = names.len();
        names.push(key.to_string());
        index.insert(key.to_string(), id);
        id
    }

    fn add(&mut self, outer: &str, inner: &str) {
        let o = Self::intern(&mut self.outer_index, &mut self.outer_names, outer);
        let i = Self::intern(&mut self.inner_index, &mut self.inner_names, &series_key(inner));
        if o == self.counts.len() {
            self.counts.push(Vec::new());
        }
        if i == self.inner_totals.len() {
            self.inner_totals.push(0);
        }
        let row = &mut self.counts[o];
        if row.len() <= i {
            row.resize(i + 1, 0);
        }
        row[i] += 1;
        self.inner_totals[i] += 1;
    }
}

/// Groups records by two keys at once.
///
/// Rows follow first-seen outer order and hold only non-zero inner counts.
/// With `options`, inner keys are ranked by their total across every row
/// (descending, ties in first-seen order); only the first `top_n` stay as
/// series and every other occurrence is added to `other_label` in its row.
/// Records lacking either key are skipped.
pub fn cross_tab<'a, I, FO, FI, KO, KI>(
    records: I,
    mut outer_fn: FO,
    mut inner_fn: FI,
    options: Option<&CrossTabOptions>,
) -> Result<CrossTab>
where
    I: IntoIterator<Item = &'a Record>,
    FO: FnMut(&'a Record) -> Option<KO>,
    FI: FnMut(&'a Record) -> Option<KI>,
    KO: AsRef<str>,
    KI: AsRef<str>,
{
    if let Some(opts) = options {
        if opts.other_label.trim().is_empty() {
            return Err(AnalyticsError::InvalidCrossTab(
                "overflow label must not be empty".to_string(),
            ));
        }
    }

    let mut counter = CrossCounter::new();
    for record in records {
        if let (Some(outer), Some(inner)) = (outer_fn(record), inner_fn(record)) {
            counter.add(outer.as_ref(), inner.as_ref());
        }
    }

    if counter.outer_names.is_empty() {
        return Ok(CrossTab::default());
    }

    let (series, slot_of) = assign_series(&counter, options);

    let mut rows = Vec::with_capacity(counter.outer_names.len());
    for (o, name) in counter.outer_names.iter().enumerate() {
        let mut slots = vec![0u64; series.len()];
        for (i, &count) in counter.counts[o].iter().enumerate() {
            slots[slot_of[i]] += count;
        }
        let mut row = CrossTabRow::new(name.as_str());
        for (slot, count) in slots.into_iter().enumerate() {
            if count > 0 {
                row.cells.push((series[slot].clone(), count));
            }
        }
        rows.push(row);
    }

    Ok(CrossTab { series, rows })
}

/// Decides the output series and maps every inner key to a series slot.
fn assign_series(counter: &CrossCounter, options: Option<&CrossTabOptions>) -> (Vec<String>, Vec<usize>) {
    let inner_count = counter.inner_names.len();

    let opts = match options {
        Some(opts) if opts.top_n < inner_count => opts,
        // Nothing to collapse: every inner key is its own series.
        _ => return (counter.inner_names.clone(), (0..inner_count).collect()),
    };

    let mut ranked: Vec<usize> = (0..inner_count).collect();
    ranked.sort_by(|&a, &b| counter.inner_totals[b].cmp(&counter.inner_totals[a]));

    let mut series: Vec<String> = Vec::with_capacity(opts.top_n + 1);
    let mut slot_of = vec![usize::MAX; inner_count];
    for &i in ranked.iter().take(opts.top_n) {
        slot_of[i] = series.len();
        series.push(counter.inner_names[i].clone());
    }

    // A retained key already named like the overflow bucket absorbs it.
    let other_label = series_key(&opts.other_label);
    let other_slot = match series.iter().position(|s| *s == other_label) {
        Some(slot) => slot,
        None => {
            series.push(other_label.into_owned());
            series.len() - 1
        }
    };
    for &i in ranked.iter().skip(opts.top_n) {
        slot_of[i] = other_slot;
    }

    (series, slot_of)
}

/// Cross-tabulation along two [`Dimension`]s.
pub fn cross_tab_by<'a, I>(
    records: I,
    outer: Dimension,
    inner: Dimension,
    options: Option<&CrossTabOptions>,
    definition: &'a AnalyticsDefinition,
    now: NaiveDate,
) -> Result<CrossTab>
where
    I: IntoIterator<Item = &'a Record>,
{
    cross_tab(
        records,
        |r| dimension_key(r, outer, definition, now),
        |r| dimension_key(r, inner, definition, now),
        options,
    )
}

// ============================================================================
// DASHBOARD CALCULATOR
// ============================================================================

/// Computes every chart of a definition over one filtered set.
pub struct DashboardCalculator<'a> {
    definition: &'a AnalyticsDefinition,
    filters: &'a FilterState,
    total_records: usize,
    filtered: Vec<&'a Record>,
    now: NaiveDate,
}

impl<'a> DashboardCalculator<'a> {
    /// Compiles the filters and filters the snapshot once.
    pub fn new(
        definition: &'a AnalyticsDefinition,
        records: &'a [Record],
        filters: &'a FilterState,
        now: NaiveDate,
    ) -> Result<Self> {
        let predicate = filters.compile_for(definition, now)?;
        Ok(Self::with_filtered(
            definition,
            filters,
            records.len(),
            predicate.apply(records),
            now,
        ))
    }

    /// Builds a calculator over an already filtered set.
    pub fn with_filtered(
        definition: &'a AnalyticsDefinition,
        filters: &'a FilterState,
        total_records: usize,
        filtered: Vec<&'a Record>,
        now: NaiveDate,
    ) -> Self {
        DashboardCalculator {
            definition,
            filters,
            total_records,
            filtered,
            now,
        }
    }

    pub fn filtered(&self) -> &[&'a Record] {
        &self.filtered
    }

    /// Computes one chart.
    pub fn chart(&self, chart: &ChartDefinition) -> Result<ChartView> {
        let records = self.filtered.iter().copied();
        let payload = match &chart.kind {
            ChartKind::Distribution { dimension, sort } => ChartPayload::Distribution(
                distribution_by(records, *dimension, *sort, self.definition, self.now),
            ),
            ChartKind::CrossTab { outer, inner, options } => ChartPayload::CrossTab(cross_tab_by(
                records,
                *outer,
                *inner,
                options.as_ref(),
                self.definition,
                self.now,
            )?),
        };
        Ok(ChartView::new(&chart.id, &chart.title, payload))
    }

    /// Executes every configured chart and returns the dashboard view.
    pub fn calculate(&self) -> Result<DashboardView> {
        let charts = self
            .definition
            .charts
            .iter()
            .map(|chart| self.chart(chart))
            .collect::<Result<Vec<_>>>()?;

        Ok(DashboardView {
            definition_version: self.definition.version,
            total_records: self.total_records,
            filtered_records: self.filtered.len(),
            active_filters: self.filters.clone(),
            is_empty: self.filtered.is_empty(),
            charts,
        })
    }
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Records of the snapshot that pass `filters`, in snapshot order.
pub fn filter_records<'a>(
    records: &'a [Record],
    filters: &FilterState,
    definition: &AnalyticsDefinition,
    now: NaiveDate,
) -> Result<Vec<&'a Record>> {
    Ok(filters.compile_for(definition, now)?.apply(records))
}

/// Calculates the dashboard view from definition, snapshot and filters.
/// This is the main entry point for the calculation engine.
pub fn calculate_dashboard(
    definition: &AnalyticsDefinition,
    records: &[Record],
    filters: &FilterState,
    now: NaiveDate,
) -> Result<DashboardView> {
    DashboardCalculator::new(definition, records, filters, now)?.calculate()
}

/// Distinct values offered by each filter control, over the whole snapshot.
pub fn filter_options(records: &[Record], definition: &AnalyticsDefinition) -> FilterOptions {
    let distinct = |field: RecordField| -> Vec<String> {
        records
            .iter()
            .filter_map(|r| r.text_field(field))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    };

    let has_family = records
        .iter()
        .any(|r| normalize(r.discipline.as_deref(), &definition.family).is_family());

    FilterOptions {
        races: distinct(RecordField::Race),
        robes: distinct(RecordField::Robe),
        disciplines: distinct(RecordField::Discipline),
        sexes: distinct(RecordField::Sex),
        health_states: HealthState::ALL.iter().map(|h| h.as_str().to_string()).collect(),
        age_ranges: definition.age_buckets.labels().map(str::to_string).collect(),
        family_value: has_family.then(|| FAMILY_FILTER_VALUE.to_string()),
    }
}

/// Lists the filtered records that fall into one bucket of a dimension.
pub fn drill_down(
    definition: &AnalyticsDefinition,
    records: &[Record],
    filter: &RecordFilter<'_>,
    dimension: Dimension,
    bucket: &str,
    max_records: usize,
    now: NaiveDate,
) -> DrillDownResult {
    let mut result = DrillDownResult::new(dimension, bucket, max_records);

    for record in records.iter().filter(|r| filter.matches(r)) {
        if dimension_key(record, dimension, definition, now) == Some(bucket) {
            result.total_count += 1;
            if result.record_ids.len() < max_records {
                result.record_ids.push(record.id.clone());
            }
        }
    }

    result.is_truncated = result.total_count > max_records;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::UNSPECIFIED_LABEL;
    use crate::filter::FilterKey;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn now() -> NaiveDate {
        ymd(2024, 6, 10)
    }

    fn disciplines(values: &[&str]) -> Vec<Record> {
        values
            .iter()
            .enumerate()
            .map(|(i, d)| Record::new(i.to_string()).with_discipline(d))
            .collect()
    }

    fn create_test_herd() -> Vec<Record> {
        let rows: [(&str, &str, &str, &str, (i32, u32, u32), HealthState); 8] = [
            ("Arabe", "Gris", "Dressage", "Jument", (2019, 6, 15), HealthState::Healthy),
            ("Arabe", "Bai", "E.C.A.S-Saut", "Hongre", (2012, 2, 1), HealthState::Sick),
            ("Barbe", "Alezan", "E.C.A.S", "Jument", (2001, 3, 3), HealthState::Healthy),
            ("Barbe", "Bai", "Endurance", "Étalon", (2016, 9, 9), HealthState::Recovering),
            ("Pur-sang", "Bai", "Dressage", "Jument", (2020, 1, 1), HealthState::Healthy),
            ("Arabe", "", "E.C.A.S-Cross", "", (2008, 5, 5), HealthState::Sick),
            ("", "Gris", "", "Hongre", (2015, 7, 7), HealthState::Healthy),
            ("Arabe", "Gris", "Endurance", "Jument", (2022, 8, 8), HealthState::Healthy),
        ];
        rows.iter()
            .enumerate()
            .map(|(i, (race, robe, disc, sex, (y, m, d), health))| {
                Record::new(format!("h-{}", i + 1))
                    .with_race(race)
                    .with_robe(robe)
                    .with_discipline(disc)
                    .with_sex(sex)
                    .with_birth_date(ymd(*y, *m, *d))
                    .with_health(*health)
            })
            .collect()
    }

    #[test]
    fn test_family_collapsed_distribution() {
        let def = AnalyticsDefinition::default();
        let records = disciplines(&["Dressage", "E.C.A.S-Saut", "E.C.A.S"]);
        let buckets = distribution_by(&records, Dimension::Discipline, DistributionSort::None, &def, now());
        assert_eq!(buckets, vec![Bucket::new("Dressage", 1), Bucket::new("E.C.A.S", 2)]);
    }

    #[test]
    fn test_family_subcategory_distribution() {
        let def = AnalyticsDefinition::default();
        let records = disciplines(&["Dressage", "E.C.A.S-Saut", "E.C.A.S"]);
        let buckets = distribution_by(
            &records,
            Dimension::FamilySubcategory,
            DistributionSort::None,
            &def,
            now(),
        );
        assert_eq!(buckets, vec![Bucket::new("Saut", 1), Bucket::new("Autre", 1)]);
    }

    #[test]
    fn test_distribution_with_closure_key() {
        let records = disciplines(&["b", "a", "b", "c", "a", "b"]);
        let buckets = distribution(
            &records,
            |r| r.discipline.clone(),
            DistributionSort::ByCountDesc,
        );
        assert_eq!(
            buckets,
            vec![Bucket::new("b", 3), Bucket::new("a", 2), Bucket::new("c", 1)]
        );
    }

    #[test]
    fn test_sort_ties_keep_first_seen_order() {
        let records = disciplines(&["x", "y", "z", "y", "x", "z"]);
        let buckets = distribution(&records, |r| r.discipline.as_deref(), DistributionSort::ByCountDesc);
        let names: Vec<_> = buckets.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["x", "y", "z"]);
    }

    #[test]
    fn test_totality_for_total_dimensions() {
        let def = AnalyticsDefinition::default();
        let records = create_test_herd();
        for dimension in [
            Dimension::Race,
            Dimension::Robe,
            Dimension::Sex,
            Dimension::HealthState,
            Dimension::Discipline,
            Dimension::AgeBucket,
        ] {
            for sort in [DistributionSort::None, DistributionSort::ByCountDesc, DistributionSort::Canonical] {
                let buckets = distribution_by(&records, dimension, sort, &def, now());
                let total: u64 = buckets.iter().map(|b| b.value).sum();
                assert_eq!(total as usize, records.len(), "{:?} / {:?}", dimension, sort);
            }
        }
    }

    #[test]
    fn test_unspecified_label_for_missing_fields() {
        let def = AnalyticsDefinition::default();
        let records = create_test_herd();
        let buckets = distribution_by(&records, Dimension::Race, DistributionSort::None, &def, now());
        assert!(buckets.contains(&Bucket::new(UNSPECIFIED_LABEL, 1)));
        let buckets = distribution_by(&records, Dimension::Discipline, DistributionSort::None, &def, now());
        assert!(buckets.contains(&Bucket::new(UNSPECIFIED_LABEL, 1)));
    }

    #[test]
    fn test_missing_health_state_is_unspecified() {
        let def = AnalyticsDefinition::default();
        let mut records = create_test_herd();
        records.push(Record::new("h-9").with_race("Arabe"));
        records[0].health_state = None;

        let health = distribution_by(&records, Dimension::HealthState, DistributionSort::Canonical, &def, now());
        assert_eq!(
            health,
            vec![
                Bucket::new("healthy", 4),
                Bucket::new("sick", 2),
                Bucket::new("recovering", 1),
                Bucket::new(UNSPECIFIED_LABEL, 2),
            ]
        );
        let races = distribution_by(&records, Dimension::Race, DistributionSort::None, &def, now());
        assert_eq!(races[0], Bucket::new("Arabe", 5));
    }

    #[test]
    fn test_age_distribution_in_table_order() {
        let def = AnalyticsDefinition::default();
        let records = create_test_herd();
        let buckets = distribution_by(&records, Dimension::AgeBucket, DistributionSort::Canonical, &def, now());
        // Ages: 4, 12, 23, 7, 4, 16, 8, 1
        assert_eq!(
            buckets,
            vec![
                Bucket::new("0-4", 3),
                Bucket::new("5-9", 2),
                Bucket::new("10-14", 1),
                Bucket::new("15-19", 1),
                Bucket::new("20+", 1),
            ]
        );
    }

    #[test]
    fn test_invalid_birth_date_only_leaves_age_grouping() {
        let def = AnalyticsDefinition::default();
        let mut records = create_test_herd();
        records[0].birth_date = None;
        let ages = distribution_by(&records, Dimension::AgeBucket, DistributionSort::None, &def, now());
        assert_eq!(ages.iter().map(|b| b.value).sum::<u64>(), 7);
        let races = distribution_by(&records, Dimension::Race, DistributionSort::None, &def, now());
        assert_eq!(races.iter().map(|b| b.value).sum::<u64>(), 8);
    }

    #[test]
    fn test_health_counts_after_race_filter() {
        let def = AnalyticsDefinition::default();
        let records: Vec<Record> = ["Arabe", "Barbe", "Arabe", "Frison", "Barbe"]
            .iter()
            .enumerate()
            .map(|(i, race)| Record::new(i.to_string()).with_race(race))
            .collect();
        let filters = FilterState::new().with(FilterKey::Race, "Arabe");
        let filtered = filter_records(&records, &filters, &def, now()).unwrap();
        assert_eq!(filtered.len(), 2);
        let health = distribution_by(filtered, Dimension::HealthState, DistributionSort::None, &def, now());
        assert_eq!(health.iter().map(|b| b.value).sum::<u64>(), 2);
    }

    #[test]
    fn test_cross_tab_sparse_rows() {
        let records: Vec<Record> = [("A", "x"), ("A", "y"), ("B", "x"), ("A", "x")]
            .iter()
            .enumerate()
            .map(|(i, (race, disc))| Record::new(i.to_string()).with_race(race).with_discipline(disc))
            .collect();
        let tab = cross_tab(&records, |r| r.race.as_deref(), |r| r.discipline.as_deref(), None).unwrap();
        assert_eq!(tab.series, ["x", "y"]);
        assert_eq!(tab.rows.len(), 2);
        assert_eq!(tab.rows[0].name, "A");
        assert_eq!(tab.rows[0].cells.to_vec(), vec![("x".to_string(), 2), ("y".to_string(), 1)]);
        // B has no "y": the key is omitted, not emitted as zero.
        assert_eq!(tab.rows[1].cells.to_vec(), vec![("x".to_string(), 1)]);
    }

    #[test]
    fn test_cross_tab_top_n_collapses_globally() {
        // Inner totals: A:2, B:1, C:3. With top 2, B folds into "Autres".
        let pairs = [
            ("r1", "A"),
            ("r1", "A"),
            ("r2", "B"),
            ("r2", "C"),
            ("r3", "C"),
            ("r3", "C"),
        ];
        let records: Vec<Record> = pairs
            .iter()
            .enumerate()
            .map(|(i, (race, disc))| Record::new(i.to_string()).with_race(race).with_discipline(disc))
            .collect();
        let opts = CrossTabOptions::top(2);
        let tab = cross_tab(
            &records,
            |r| r.race.as_deref(),
            |r| r.discipline.as_deref(),
            Some(&opts),
        )
        .unwrap();

        assert_eq!(tab.series, ["C", "A", "Autres"]);
        assert_eq!(tab.row("r1").unwrap().cells.to_vec(), vec![("A".to_string(), 2)]);
        assert_eq!(
            tab.row("r2").unwrap().cells.to_vec(),
            vec![("C".to_string(), 1), ("Autres".to_string(), 1)]
        );
        assert_eq!(tab.row("r3").unwrap().cells.to_vec(), vec![("C".to_string(), 2)]);
    }

    #[test]
    fn test_cross_tab_conservation() {
        let def = AnalyticsDefinition::default();
        let records = create_test_herd();
        for options in [None, Some(CrossTabOptions::top(1)), Some(CrossTabOptions::top(0))] {
            let tab = cross_tab_by(
                &records,
                Dimension::Race,
                Dimension::Discipline,
                options.as_ref(),
                &def,
                now(),
            )
            .unwrap();
            let outer = distribution_by(&records, Dimension::Race, DistributionSort::None, &def, now());
            assert_eq!(tab.rows.len(), outer.len());
            for bucket in &outer {
                assert_eq!(tab.row(&bucket.name).unwrap().total(), bucket.value);
            }
        }
    }

    #[test]
    fn test_cross_tab_top_n_larger_than_keys_has_no_overflow() {
        let def = AnalyticsDefinition::default();
        let records = create_test_herd();
        let opts = CrossTabOptions::top(50);
        let tab = cross_tab_by(&records, Dimension::Sex, Dimension::HealthState, Some(&opts), &def, now()).unwrap();
        assert!(!tab.series.iter().any(|s| s == "Autres"));
    }

    #[test]
    fn test_cross_tab_overflow_label_merges_with_same_named_key() {
        let records: Vec<Record> = [("o", "Autres"), ("o", "Autres"), ("o", "x"), ("o", "y")]
            .iter()
            .enumerate()
            .map(|(i, (race, disc))| Record::new(i.to_string()).with_race(race).with_discipline(disc))
            .collect();
        let opts = CrossTabOptions::top(1);
        let tab = cross_tab(&records, |r| r.race.as_deref(), |r| r.discipline.as_deref(), Some(&opts)).unwrap();
        assert_eq!(tab.series, ["Autres"]);
        assert_eq!(tab.rows[0].cells.to_vec(), vec![("Autres".to_string(), 4)]);
    }

    #[test]
    fn test_cross_tab_inner_key_cannot_shadow_row_name() {
        let records = vec![
            Record::new("1").with_race("Arabe").with_discipline("name"),
            Record::new("2").with_race("Arabe").with_discipline("Dressage"),
        ];
        let tab = cross_tab(&records, |r| r.race.as_deref(), |r| r.discipline.as_deref(), None).unwrap();
        assert_eq!(tab.series, ["name_", "Dressage"]);
        assert_eq!(
            serde_json::to_value(&tab.rows[0]).unwrap(),
            serde_json::json!({"name": "Arabe", "name_": 1, "Dressage": 1})
        );
    }

    #[test]
    fn test_cross_tab_empty_input() {
        let records: Vec<Record> = Vec::new();
        let tab = cross_tab(&records, |r| r.race.as_deref(), |r| r.robe.as_deref(), None).unwrap();
        assert!(tab.is_empty());
        assert!(tab.series.is_empty());
    }

    #[test]
    fn test_cross_tab_rejects_empty_overflow_label() {
        let records = create_test_herd();
        let opts = CrossTabOptions {
            top_n: 1,
            other_label: " ".to_string(),
        };
        let result = cross_tab(&records, |r| r.race.as_deref(), |r| r.robe.as_deref(), Some(&opts));
        assert!(matches!(result, Err(AnalyticsError::InvalidCrossTab(_))));
    }

    #[test]
    fn test_calculate_dashboard() {
        let def = AnalyticsDefinition::default();
        let records = create_test_herd();
        let view = calculate_dashboard(&def, &records, &FilterState::new(), now()).unwrap();

        assert_eq!(view.total_records, 8);
        assert_eq!(view.filtered_records, 8);
        assert!(!view.is_empty);
        assert_eq!(view.charts.len(), def.charts.len());

        let race = view.chart("race").unwrap().payload.as_distribution().unwrap();
        assert_eq!(race[0], Bucket::new("Arabe", 4));

        let health = view.chart("health").unwrap().payload.as_distribution().unwrap();
        assert_eq!(health[0].name, "healthy");
        assert_eq!(health.iter().map(|b| b.value).sum::<u64>(), 8);

        let family = view.chart("family").unwrap().payload.as_distribution().unwrap();
        assert_eq!(
            family,
            &[Bucket::new("Saut", 1), Bucket::new("Autre", 1), Bucket::new("Cross", 1)][..]
        );
    }

    #[test]
    fn test_dashboard_empty_state() {
        let def = AnalyticsDefinition::default();
        let records = create_test_herd();
        let filters = FilterState::new().with(FilterKey::Race, "Camargue");
        let view = calculate_dashboard(&def, &records, &filters, now()).unwrap();
        assert!(view.is_empty);
        assert_eq!(view.filtered_records, 0);
        assert!(view.charts.iter().all(|c| c.payload.is_empty()));
    }

    #[test]
    fn test_dashboard_propagates_filter_errors() {
        let def = AnalyticsDefinition::default();
        let records = create_test_herd();
        let filters = FilterState::new().with(FilterKey::AgeRange, "19+");
        assert_eq!(
            calculate_dashboard(&def, &records, &filters, now()).err(),
            Some(AnalyticsError::UnknownAgeBucket("19+".to_string()))
        );
    }

    #[test]
    fn test_filter_options() {
        let def = AnalyticsDefinition::default();
        let records = create_test_herd();
        let options = filter_options(&records, &def);
        assert_eq!(options.races, ["Arabe", "Barbe", "Pur-sang"]);
        assert_eq!(options.robes, ["Alezan", "Bai", "Gris"]);
        assert_eq!(options.health_states, ["healthy", "sick", "recovering"]);
        assert_eq!(options.age_ranges.len(), 5);
        assert_eq!(options.family_value.as_deref(), Some(FAMILY_FILTER_VALUE));
        assert!(options.disciplines.contains(&"E.C.A.S-Saut".to_string()));

        let plain = disciplines(&["Dressage"]);
        assert_eq!(filter_options(&plain, &def).family_value, None);
    }

    #[test]
    fn test_drill_down() {
        let def = AnalyticsDefinition::default();
        let records = create_test_herd();
        let filters = FilterState::new();
        let filter = filters.compile_for(&def, now()).unwrap();

        let result = drill_down(&def, &records, &filter, Dimension::Race, "Arabe", 10, now());
        assert_eq!(result.total_count, 4);
        assert_eq!(result.record_ids, ["h-1", "h-2", "h-6", "h-8"]);
        assert!(!result.is_truncated);

        let result = drill_down(&def, &records, &filter, Dimension::Race, "Arabe", 2, now());
        assert_eq!(result.record_ids.len(), 2);
        assert!(result.is_truncated);

        let filters = FilterState::new().with(FilterKey::HealthState, "sick");
        let filter = filters.compile_for(&def, now()).unwrap();
        let result = drill_down(&def, &records, &filter, Dimension::Discipline, "E.C.A.S", 10, now());
        assert_eq!(result.record_ids, ["h-2", "h-6"]);
    }
}
