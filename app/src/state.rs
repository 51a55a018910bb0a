//! FILENAME: app/src/state.rs
// PURPOSE: Session state shared by the dashboard commands.

use std::sync::Mutex;

use herd_analytics::{AnalyticsCache, AnalyticsDefinition, FilterState, Snapshot};

use crate::config::DashboardConfig;
use crate::log_info;

/// One dashboard session: the current snapshot, the user's filters and the
/// memoized aggregates. Lock order is snapshot, definition, filters, cache.
pub struct DashboardState {
    pub snapshot: Mutex<Option<Snapshot>>,
    /// Where the current snapshot came from.
    pub source: Mutex<Option<String>>,
    pub definition: Mutex<AnalyticsDefinition>,
    pub filters: Mutex<FilterState>,
    pub cache: Mutex<AnalyticsCache>,
    pub drill_down_limit: usize,
}

impl DashboardState {
    pub fn new(definition: AnalyticsDefinition, drill_down_limit: usize) -> Self {
        DashboardState {
            snapshot: Mutex::new(None),
            source: Mutex::new(None),
            definition: Mutex::new(definition),
            filters: Mutex::new(FilterState::new()),
            cache: Mutex::new(AnalyticsCache::new()),
            drill_down_limit,
        }
    }
}

impl Default for DashboardState {
    fn default() -> Self {
        let config = DashboardConfig::default();
        Self::new(config.definition, config.drill_down_limit)
    }
}

pub fn create_dashboard_state(config: &DashboardConfig) -> DashboardState {
    log_info!(
        "DASH",
        "Creating DashboardState charts={} drill_down_limit={}",
        config.definition.charts.len(),
        config.drill_down_limit
    );
    DashboardState::new(config.definition.clone(), config.drill_down_limit)
}
