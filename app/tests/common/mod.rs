//! FILENAME: tests/common/mod.rs
//! Test harness and fixtures for dashboard integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use chrono::NaiveDate;
use dashboard_lib::{get_dashboard, load_snapshot, DashboardState, SnapshotInfo};
use herd_analytics::{Bucket, CrossTab, DashboardView};
use serde_json::{json, Value};
use tempfile::TempDir;

/// Reference date every fixture age is computed against.
pub fn fixture_now() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
}

/// Test harness owning a session and a scratch directory for snapshot files.
pub struct TestHarness {
    pub state: DashboardState,
    pub dir: TempDir,
}

impl TestHarness {
    /// Create a new test harness with no snapshot loaded.
    pub fn new() -> Self {
        TestHarness {
            state: DashboardState::default(),
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Create a harness with the fixture herd loaded.
    pub fn with_herd() -> Self {
        let harness = Self::new();
        harness.load(&HerdFixture::snapshot_json());
        harness
    }

    /// Write a snapshot document into the scratch directory.
    pub fn write_snapshot(&self, name: &str, document: &Value) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, serde_json::to_string(document).unwrap()).unwrap();
        path
    }

    /// Write and load a snapshot document.
    pub fn load(&self, document: &Value) -> SnapshotInfo {
        let path = self.write_snapshot("snapshot.json", document);
        load_snapshot(&self.state, path.to_str().unwrap()).unwrap()
    }

    /// Dashboard at the fixture date.
    pub fn dashboard(&self) -> DashboardView {
        get_dashboard(&self.state, Some(fixture_now())).unwrap()
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub struct HerdFixture;

impl HerdFixture {
    /// (id, race, robe, discipline, sex, birthDate, healthState)
    pub fn data() -> Vec<(
        &'static str,
        Option<&'static str>,
        Option<&'static str>,
        Option<&'static str>,
        Option<&'static str>,
        &'static str,
        &'static str,
    )> {
        vec![
            ("h-1", Some("Arabe"), Some("Gris"), Some("Dressage"), Some("Jument"), "2019-06-15", "healthy"),
            ("h-2", Some("Arabe"), Some("Bai"), Some("E.C.A.S-Saut"), Some("Hongre"), "2012-02-01", "sick"),
            ("h-3", Some("Barbe"), Some("Alezan"), Some("E.C.A.S"), Some("Jument"), "2001-03-03", "healthy"),
            ("h-4", Some("Barbe"), Some("Bai"), Some("Endurance"), Some("Étalon"), "2016-09-09", "recovering"),
            ("h-5", Some("Pur-sang"), Some("Bai"), Some("Dressage"), Some("Jument"), "2020-01-01", "healthy"),
            ("h-6", Some("Arabe"), None, Some("E.C.A.S-Cross"), None, "2008-05-05", "sick"),
            ("h-7", None, Some("Gris"), None, Some("Hongre"), "garbage", "healthy"),
            ("h-8", Some("Arabe"), Some("Gris"), Some("Endurance"), Some("Jument"), "2022-08-08", "healthy"),
            ("h-9", Some("Frison"), Some("Noir"), Some("Attelage"), Some("Hongre"), "2010-10-10", "recovering"),
            ("h-10", Some("Frison"), Some("Noir"), Some("E.C.A.S-Saut"), Some("Jument"), "1999-12-31", "healthy"),
        ]
    }

    /// The fixture herd as the fetch collaborator would send it.
    pub fn snapshot_json() -> Value {
        Value::Array(
            Self::data()
                .into_iter()
                .map(|(id, race, robe, discipline, sex, birth_date, health)| {
                    json!({
                        "id": id,
                        "name": format!("Cheval {}", id),
                        "race": race,
                        "robe": robe,
                        "discipline": discipline,
                        "sex": sex,
                        "birthDate": birth_date,
                        "healthState": health,
                    })
                })
                .collect(),
        )
    }
}

// ============================================================================
// ASSERTION HELPERS
// ============================================================================

/// Buckets of a distribution chart as (name, value) pairs.
pub fn distribution(view: &DashboardView, chart_id: &str) -> Vec<(String, u64)> {
    let buckets: &[Bucket] = view
        .chart(chart_id)
        .and_then(|c| c.payload.as_distribution())
        .unwrap_or_else(|| panic!("no distribution chart {}", chart_id));
    buckets.iter().map(|b| (b.name.clone(), b.value)).collect()
}

pub fn cross_tab<'v>(view: &'v DashboardView, chart_id: &str) -> &'v CrossTab {
    view.chart(chart_id)
        .and_then(|c| c.payload.as_cross_tab())
        .unwrap_or_else(|| panic!("no cross-tab chart {}", chart_id))
}

/// Assert a distribution equals the expected (name, value) list, in order.
pub fn assert_distribution(view: &DashboardView, chart_id: &str, expected: &[(&str, u64)]) {
    let actual = distribution(view, chart_id);
    let expected: Vec<(String, u64)> = expected.iter().map(|(n, v)| (n.to_string(), *v)).collect();
    assert_eq!(actual, expected, "chart {}", chart_id);
}
