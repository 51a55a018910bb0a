//! FILENAME: app/src/commands.rs
// PURPOSE: Dashboard commands. Each returns Result<T, String> for the caller
// to surface; library errors are converted with to_string().

use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use herd_analytics::{
    filter_options, AnalyticsDefinition, AnalyticsQuery, DashboardView, Dimension,
    DrillDownResult, FilterOptions, Snapshot,
};

use crate::api_types::{CacheStatsResponse, DrillDownRequest, FilterStateResponse, SnapshotInfo};
use crate::snapshot::{JsonFileSource, RecordSource};
use crate::state::DashboardState;
use crate::{log_debug, log_enter, log_error, log_exit, log_info, log_perf, log_warn};

/// Reference date for age computations when the caller gives none.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn current_snapshot(state: &DashboardState) -> Result<Snapshot, String> {
    state
        .snapshot
        .lock()
        .map_err(|e| e.to_string())?
        .clone()
        .ok_or_else(|| "No snapshot loaded".to_string())
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Loads a JSON snapshot file and makes it the current one.
pub fn load_snapshot(state: &DashboardState, path: &str) -> Result<SnapshotInfo, String> {
    log_enter!("SNAPSHOT", "load_snapshot", "path={}", path);
    let result = load_from_source(state, &JsonFileSource::new(path));
    log_exit!("SNAPSHOT", "load_snapshot", "ok={}", result.is_ok());
    result
}

/// Replaces the current snapshot with a fresh one from `source`.
/// The previous snapshot stays current if loading fails.
pub fn load_from_source(state: &DashboardState, source: &dyn RecordSource) -> Result<SnapshotInfo, String> {
    let t0 = Instant::now();
    let loaded = source.load().map_err(|e| {
        log_error!("SNAPSHOT", "load failed source={} error={}", source.describe(), e);
        e.to_string()
    })?;

    let info = SnapshotInfo {
        source: source.describe(),
        record_count: loaded.records.len(),
        skipped: loaded.skipped,
    };
    if info.skipped > 0 {
        log_warn!("SNAPSHOT", "skipped {} unreadable entries in {}", info.skipped, info.source);
    }

    let snapshot: Snapshot = Arc::new(loaded.records);
    *state.snapshot.lock().map_err(|e| e.to_string())? = Some(snapshot);
    *state.source.lock().map_err(|e| e.to_string())? = Some(info.source.clone());
    state.cache.lock().map_err(|e| e.to_string())?.invalidate();

    log_perf!(
        "SNAPSHOT",
        "load_snapshot source={} records={} skipped={} TOTAL={:.1}ms",
        info.source,
        info.record_count,
        info.skipped,
        t0.elapsed().as_secs_f64() * 1000.0
    );
    Ok(info)
}

// ============================================================================
// FILTERS
// ============================================================================

/// Sets one filter. An empty value clears it. Unknown keys, unknown health
/// states and unknown age ranges are rejected and leave the filters as they were.
pub fn set_filter(state: &DashboardState, key: &str, value: &str) -> Result<FilterStateResponse, String> {
    log_info!("DASH", "set_filter {}={:?}", key, value);

    let definition = state.definition.lock().map_err(|e| e.to_string())?;
    let mut filters = state.filters.lock().map_err(|e| e.to_string())?;

    let mut updated = filters.clone();
    updated.set(key, value).map_err(|e| e.to_string())?;
    updated
        .compile_for(&definition, today())
        .map_err(|e| {
            log_warn!("DASH", "rejected filter {}={:?}: {}", key, value, e);
            e.to_string()
        })?;

    *filters = updated;
    Ok(FilterStateResponse::from(&*filters))
}

/// Resets every filter.
pub fn clear_filters(state: &DashboardState) -> Result<FilterStateResponse, String> {
    log_info!("DASH", "clear_filters");
    let mut filters = state.filters.lock().map_err(|e| e.to_string())?;
    filters.clear_all();
    Ok(FilterStateResponse::from(&*filters))
}

/// Distinct values for each filter control, over the whole snapshot.
pub fn get_filter_options(state: &DashboardState) -> Result<FilterOptions, String> {
    let snapshot = current_snapshot(state)?;
    let definition = state.definition.lock().map_err(|e| e.to_string())?;
    let options = filter_options(&snapshot, &definition);
    log_debug!(
        "DASH",
        "get_filter_options races={} disciplines={} family={}",
        options.races.len(),
        options.disciplines.len(),
        options.family_value.is_some()
    );
    Ok(options)
}

// ============================================================================
// AGGREGATES
// ============================================================================

/// Computes every configured chart over the filtered snapshot.
pub fn get_dashboard(state: &DashboardState, now: Option<NaiveDate>) -> Result<DashboardView, String> {
    let now = now.unwrap_or_else(today);
    log_enter!("DASH", "get_dashboard", "now={}", now);

    let snapshot = current_snapshot(state)?;
    let definition = state.definition.lock().map_err(|e| e.to_string())?;
    let filters = state.filters.lock().map_err(|e| e.to_string())?;
    let mut cache = state.cache.lock().map_err(|e| e.to_string())?;

    let t0 = Instant::now();
    let query = AnalyticsQuery::new(&snapshot, &definition, &filters, now);
    let view = cache.dashboard(&query).map_err(|e| {
        log_error!("DASH", "get_dashboard failed: {}", e);
        e.to_string()
    })?;

    log_perf!(
        "DASH",
        "get_dashboard records={}/{} filters={} charts={} hits={} misses={} TOTAL={:.1}ms",
        view.filtered_records,
        view.total_records,
        filters.active_count(),
        view.charts.len(),
        cache.stats().hits,
        cache.stats().misses,
        t0.elapsed().as_secs_f64() * 1000.0
    );
    log_exit!("DASH", "get_dashboard", "empty={}", view.is_empty);
    Ok(view)
}

/// Lists the filtered records that fall into one chart bucket.
pub fn drill_down(state: &DashboardState, request: DrillDownRequest) -> Result<DrillDownResult, String> {
    log_enter!(
        "DASH",
        "drill_down",
        "dimension={} bucket={:?}",
        request.dimension,
        request.bucket
    );

    let dimension = request.dimension.parse::<Dimension>().map_err(|e| e.to_string())?;
    let now = request.now.unwrap_or_else(today);
    let max_records = request.max_records.unwrap_or(state.drill_down_limit);

    let snapshot = current_snapshot(state)?;
    let definition = state.definition.lock().map_err(|e| e.to_string())?;
    let filters = state.filters.lock().map_err(|e| e.to_string())?;

    let filter = filters.compile_for(&definition, now).map_err(|e| e.to_string())?;
    let result = herd_analytics::drill_down(
        &definition,
        &snapshot,
        &filter,
        dimension,
        &request.bucket,
        max_records,
        now,
    );

    log_exit!(
        "DASH",
        "drill_down",
        "total={} truncated={}",
        result.total_count,
        result.is_truncated
    );
    Ok(result)
}

// ============================================================================
// DEFINITION & DIAGNOSTICS
// ============================================================================

/// Replaces the analytics definition. Its version is set past the current
/// one so cached results are dropped. Rejected when the active filters do
/// not compile against it (an age range it no longer has).
pub fn update_definition(state: &DashboardState, mut definition: AnalyticsDefinition) -> Result<u64, String> {
    let mut current = state.definition.lock().map_err(|e| e.to_string())?;
    let filters = state.filters.lock().map_err(|e| e.to_string())?;

    filters.compile_for(&definition, today()).map_err(|e| e.to_string())?;

    definition.version = current.version.max(definition.version) + 1;
    *current = definition;
    log_info!("CONFIG", "definition updated version={} charts={}", current.version, current.charts.len());
    Ok(current.version)
}

pub fn get_cache_stats(state: &DashboardState) -> Result<CacheStatsResponse, String> {
    let snapshot_loaded = state.snapshot.lock().map_err(|e| e.to_string())?.is_some();
    let definition_version = state.definition.lock().map_err(|e| e.to_string())?.version;
    let cache = state.cache.lock().map_err(|e| e.to_string())?;
    Ok(CacheStatsResponse {
        stats: cache.stats().clone(),
        definition_version,
        snapshot_loaded,
    })
}
