//! FILENAME: app/src/lib.rs
//! Host for the herd population dashboard.
//!
//! Owns the session (snapshot, filters, definition, cache), loads snapshots
//! and configuration, and exposes the dashboard commands. All aggregation
//! lives in `herd-analytics`.

pub mod api_types;
pub mod commands;
pub mod config;
pub mod logging;
pub mod snapshot;
pub mod state;

pub use api_types::{CacheStatsResponse, DrillDownRequest, FilterStateResponse, SnapshotInfo};
pub use commands::{
    clear_filters, drill_down, get_cache_stats, get_dashboard, get_filter_options,
    load_from_source, load_snapshot, set_filter, today, update_definition,
};
pub use config::{ConfigError, DashboardConfig, CONFIG_ENV_VAR, DEFAULT_DRILL_DOWN_LIMIT};
pub use logging::{get_log_path, init_log_file, next_seq, write_log};
pub use snapshot::{parse_snapshot, JsonFileSource, LoadedSnapshot, RecordSource, SnapshotError};
pub use state::{create_dashboard_state, DashboardState};
