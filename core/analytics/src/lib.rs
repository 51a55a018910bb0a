//! FILENAME: core/analytics/src/lib.rs
//! Population analytics for the herd dashboard.
//!
//! Turns an immutable snapshot of animal records into the aggregates behind
//! each chart. It depends on `herd-model` only for the record types.
//!
//! Layers:
//! - `definition`: Serializable configuration (buckets, family rule, charts)
//! - `filter`: Filter state and the compiled record predicate
//! - `normalize` / `age`: Derived per-record values
//! - `engine`: Distribution and cross-tabulation builders
//! - `cache`: Memoized results for the current snapshot and filters
//! - `view`: Chart-ready output for the rendering surface

pub mod age;
pub mod cache;
pub mod definition;
pub mod engine;
pub mod error;
pub mod filter;
pub mod normalize;
pub mod view;

pub use age::{age_in_years, record_age, record_bucket};
pub use cache::{AnalyticsCache, AnalyticsQuery, CacheStats, Snapshot};
pub use definition::*;
pub use engine::{
    calculate_dashboard, cross_tab, cross_tab_by, dimension_key, distribution, distribution_by,
    drill_down, filter_options, filter_records, DashboardCalculator,
};
pub use error::{AnalyticsError, Result};
pub use filter::{matches, FilterKey, FilterState, RecordFilter, FAMILY_FILTER_VALUE};
pub use normalize::{normalize, Category};
pub use view::*;
