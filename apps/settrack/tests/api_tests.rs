//! Integration tests for the settrack HTTP API.
//!
//! Uses axum-test to test the API handlers without starting a real server.

// Allow unwrap and panic in tests - these are standard for test code
// Allow holding MutexGuard across await in auth tests - tests are serialized
// intentionally to avoid env var conflicts
#![allow(clippy::unwrap_used, clippy::panic, clippy::await_holding_lock)]

use axum::http::{HeaderValue, StatusCode};
use axum_test::TestServer;
use chrono::{NaiveDate, TimeZone, Utc};
use settrack::api::{
    AppState, ErrorResponse, HealthResponse, RefreshResponse, StatusResponse, create_router,
};
use settrack_core::{
    ClusterSetting, ComparedReleaseMetrics, ComparedReleaseSettings, HostProfile, IgnoreList,
    MajorVersionSummary, Metric, MetricType, Release, ReleaseSetting, ReleaseType, SettingDetail,
    SnapshotStore, Store, Summary,
};
use serde_json::Value;
use std::sync::Mutex;

/// Mutex to serialize tests since auth tests modify env vars.
static AUTH_TEST_MUTEX: Mutex<()> = Mutex::new(());

const HOST: HostProfile = HostProfile::new(4, 16 * 1024 * 1024 * 1024);

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Guard wrapper that holds the mutex and ensures cleanup on drop.
struct TestGuard {
    _guard: std::sync::MutexGuard<'static, ()>,
}

impl Drop for TestGuard {
    fn drop(&mut self) {
        // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
        unsafe { std::env::remove_var("SETTRACK_API_KEY") };
    }
}

fn lock() -> TestGuard {
    let guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
    unsafe { std::env::remove_var("SETTRACK_API_KEY") };
    TestGuard { _guard: guard }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn setting(variable: &str, value: &str) -> ClusterSetting {
    ClusterSetting {
        variable: variable.to_string(),
        value: value.to_string(),
        setting_type: "s".to_string(),
        public: true,
        description: format!("{} description", variable),
        default_value: value.to_string(),
        origin: "default".to_string(),
        key: variable.to_string(),
    }
}

/// A store with two major versions, three captures and two metric sets.
fn populated_store() -> Store {
    let mut store = Store::in_memory();
    store
        .save_releases(&[
            Release::new("v22.2.0", ReleaseType::Production, date(2022, 12, 5), "v22.2"),
            Release::new(
                "v23.1.0-beta.1",
                ReleaseType::Testing,
                date(2023, 2, 1),
                "v23.1",
            ),
            Release::new("v23.1.0", ReleaseType::Production, date(2023, 5, 15), "v23.1"),
            Release::new("v23.1.1", ReleaseType::Production, date(2023, 6, 1), "v23.1")
                .withdrawn(true),
        ])
        .unwrap();

    let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    store
        .save_capture(
            "v22.2.0",
            HOST,
            &[
                setting("sql.defaults.distsql", "auto"),
                setting("kv.rangefeed.enabled", "false"),
                setting("sql.legacy.setting", "1"),
            ],
            at,
        )
        .unwrap();
    store
        .save_capture(
            "v23.1.0-beta.1",
            HOST,
            &[
                setting("sql.defaults.distsql", "auto"),
                setting("kv.rangefeed.enabled", "false"),
            ],
            at,
        )
        .unwrap();
    store
        .save_capture(
            "v23.1.0",
            HOST,
            &[
                setting("sql.defaults.distsql", "on"),
                setting("kv.rangefeed.enabled", "false"),
                setting("sql.stats.enabled", "true"),
            ],
            at,
        )
        .unwrap();

    store
        .save_metrics(
            "v22.2.0",
            &[
                Metric::new("sql_conns", "Open SQL connections", MetricType::Gauge),
                Metric::new("txn_aborts", "Aborted transactions", MetricType::Counter),
            ],
        )
        .unwrap();
    store
        .save_metrics(
            "v23.1.0",
            &[
                Metric::new("sql_conns", "Open SQL connections", MetricType::Counter),
                Metric::new("sql_latency", "SQL latency", MetricType::Histogram),
            ],
        )
        .unwrap();
    store
}

/// Create a test server over an empty in-memory store.
/// Returns a guard that must be kept alive during the test.
fn create_test_server() -> (TestServer, TestGuard) {
    let guard = lock();
    let router = create_router(AppState::new(Store::in_memory(), IgnoreList::default()));
    (TestServer::new(router).unwrap(), guard)
}

/// Create a test server with releases, captures and metrics loaded.
fn create_populated_test_server() -> (TestServer, TestGuard) {
    let guard = lock();
    let router = create_router(AppState::new(populated_store(), IgnoreList::default()));
    (TestServer::new(router).unwrap(), guard)
}

// =============================================================================
// HEALTH ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (server, _guard) = create_test_server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

// =============================================================================
// STATUS ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_status_empty_store() {
    let (server, _guard) = create_test_server();

    let response = server.get("/status").await;

    response.assert_status_ok();
    let status: StatusResponse = response.json();
    assert_eq!(status.backend, "memory");
    assert_eq!(status.releases, 0);
    assert_eq!(status.capture_runs, 0);
    assert_eq!(status.summaries, 0);
}

#[tokio::test]
async fn test_status_populated_store() {
    let (server, _guard) = create_populated_test_server();

    let status: StatusResponse = server.get("/status").await.json();
    assert_eq!(status.releases, 4);
    assert_eq!(status.capture_runs, 3);
    assert_eq!(status.raw_settings, 8);
    assert_eq!(status.variables, 4);
    assert_eq!(status.metric_releases, 2);
}

// =============================================================================
// RELEASE ENDPOINT TESTS
// =============================================================================

fn release_names(body: &Value) -> Vec<String> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|r| r["release_name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_releases_sorted_by_version() {
    let (server, _guard) = create_populated_test_server();

    let response = server.get("/releases").await;

    response.assert_status_ok();
    assert_eq!(
        release_names(&response.json()),
        ["v22.2.0", "v23.1.0-beta.1", "v23.1.0", "v23.1.1"]
    );
}

#[tokio::test]
async fn test_releases_descending_and_current() {
    let (server, _guard) = create_populated_test_server();

    let response = server
        .get("/releases")
        .add_query_param("sort", "version-desc")
        .add_query_param("current", "true")
        .await;

    response.assert_status_ok();
    assert_eq!(
        release_names(&response.json()),
        ["v23.1.0", "v23.1.0-beta.1", "v22.2.0"]
    );
}

#[tokio::test]
async fn test_releases_unknown_sort_is_bad_request() {
    let (server, _guard) = create_populated_test_server();

    let response = server.get("/releases").add_query_param("sort", "size").await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let error: ErrorResponse = response.json();
    assert!(error.error.contains("size"));
}

#[tokio::test]
async fn test_majors() {
    let (server, _guard) = create_populated_test_server();

    let response = server.get("/releases/majors").await;

    response.assert_status_ok();
    let summary: MajorVersionSummary = response.json();
    let majors: Vec<&str> = summary
        .major_versions
        .iter()
        .map(|m| m.major_version.as_str())
        .collect();
    assert_eq!(majors, ["v22.2", "v23.1"]);

    let v23 = &summary.major_versions[1];
    assert_eq!(
        v23.first_testing_release.as_ref().map(|r| r.name.as_str()),
        Some("v23.1.0-beta.1")
    );
    assert_eq!(
        v23.first_production_release.as_ref().map(|r| r.name.as_str()),
        Some("v23.1.0")
    );
}

// =============================================================================
// SETTINGS ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_release_settings() {
    let (server, _guard) = create_populated_test_server();

    let response = server.get("/settings/v23.1.0").await;

    response.assert_status_ok();
    let settings: Vec<ReleaseSetting> = response.json();
    assert_eq!(settings.len(), 3);
    assert!(settings.iter().all(|s| s.release_name == "v23.1.0"));
}

#[tokio::test]
async fn test_release_settings_unknown_release_is_404() {
    let (server, _guard) = create_populated_test_server();

    let response = server.get("/settings/v99.1.0").await;

    response.assert_status_not_found();
    let error: ErrorResponse = response.json();
    assert!(error.error.contains("v99.1.0"));
}

#[tokio::test]
async fn test_compare_settings() {
    let (server, _guard) = create_populated_test_server();

    let response = server
        .get("/settings/compare")
        .add_query_param("r1", "v22.2.0")
        .add_query_param("r2", "v23.1.0")
        .await;

    response.assert_status_ok();
    let compared: ComparedReleaseSettings = response.json();
    let added: Vec<&str> = compared.added.iter().map(|s| s.variable.as_str()).collect();
    let removed: Vec<&str> = compared.removed.iter().map(|s| s.variable.as_str()).collect();
    assert_eq!(added, ["sql.stats.enabled"]);
    assert_eq!(removed, ["sql.legacy.setting"]);
    assert_eq!(compared.changed.len(), 1);
    assert_eq!(compared.changed[0].before.value, "auto");
    assert_eq!(compared.changed[0].after.value, "on");
}

#[tokio::test]
async fn test_compare_settings_requires_both_releases() {
    let (server, _guard) = create_populated_test_server();

    let response = server
        .get("/settings/compare")
        .add_query_param("r1", "v22.2.0")
        .await;

    assert!(response.status_code().is_client_error());
}

#[tokio::test]
async fn test_setting_detail() {
    let (server, _guard) = create_populated_test_server();

    let response = server.get("/settings/detail/sql.defaults.distsql").await;

    response.assert_status_ok();
    let detail: SettingDetail = response.json();
    assert_eq!(detail.name, "sql.defaults.distsql");
    assert_eq!(
        detail.releases,
        ["v22.2.0", "v23.1.0-beta.1", "v23.1.0"]
    );
}

#[tokio::test]
async fn test_setting_detail_unknown_variable_is_404() {
    let (server, _guard) = create_populated_test_server();

    let response = server.get("/settings/detail/no.such.setting").await;
    response.assert_status_not_found();
}

// =============================================================================
// SUMMARY ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_summaries_empty_before_refresh() {
    let (server, _guard) = create_populated_test_server();

    let summaries: Vec<Summary> = server.get("/summaries").await.json();
    assert!(summaries.is_empty());

    server
        .get("/summaries/sql.never.captured")
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_single_summary_computed_before_refresh() {
    let (server, _guard) = create_populated_test_server();

    let response = server.get("/summaries/sql.defaults.distsql").await;
    response.assert_status_ok();
    let summary: Summary = response.json();
    assert_eq!(summary.value, "on");
    assert_eq!(summary.value_changes.len(), 1);
    assert_eq!(summary.value_changes[0].release, "v23.1.0");

    let status: StatusResponse = server.get("/status").await.json();
    assert_eq!(status.summaries, 0);
}

#[tokio::test]
async fn test_refresh_then_read_summaries() {
    let (server, _guard) = create_populated_test_server();

    let response = server.post("/summaries/refresh").await;

    response.assert_status_ok();
    let refreshed: RefreshResponse = response.json();
    assert!(refreshed.success);
    assert_eq!(refreshed.summaries, 4);

    let summaries: Vec<Summary> = server.get("/summaries").await.json();
    assert_eq!(summaries.len(), 4);

    let response = server.get("/summaries/sql.defaults.distsql").await;
    response.assert_status_ok();
    let summary: Summary = response.json();
    assert_eq!(summary.value_changes.len(), 1);
    assert_eq!(summary.value_changes[0].release, "v23.1.0");
    assert_eq!(summary.value_changes[0].from, "auto");
    assert_eq!(summary.value_changes[0].to, "on");
    assert!(!summary.host_dependent);

    let legacy: Summary = server.get("/summaries/sql.legacy.setting").await.json();
    assert_eq!(legacy.first_releases, ["v22.2.0"]);
    assert_eq!(legacy.last_releases, ["v22.2.0"]);
}

#[tokio::test]
async fn test_status_counts_summaries_after_refresh() {
    let (server, _guard) = create_populated_test_server();

    server.post("/summaries/refresh").await.assert_status_ok();

    let status: StatusResponse = server.get("/status").await.json();
    assert_eq!(status.summaries, 4);
}

// =============================================================================
// METRICS ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_compare_metrics() {
    let (server, _guard) = create_populated_test_server();

    let response = server
        .get("/metrics/compare")
        .add_query_param("r1", "v22.2.0")
        .add_query_param("r2", "v23.1.0")
        .await;

    response.assert_status_ok();
    let compared: ComparedReleaseMetrics = response.json();
    assert_eq!(compared.added.len(), 1);
    assert_eq!(compared.added[0].name, "sql_latency");
    assert_eq!(compared.removed.len(), 1);
    assert_eq!(compared.removed[0].name, "txn_aborts");
    assert_eq!(compared.changed.len(), 1);
    assert_eq!(compared.changed[0].before.metric_type, MetricType::Gauge);
    assert_eq!(compared.changed[0].after.metric_type, MetricType::Counter);
}

#[tokio::test]
async fn test_compare_metrics_unknown_release_is_404() {
    let (server, _guard) = create_populated_test_server();

    let response = server
        .get("/metrics/compare")
        .add_query_param("r1", "v22.2.0")
        .add_query_param("r2", "v1.0.0")
        .await;

    response.assert_status_not_found();
}

// =============================================================================
// ERROR HANDLING TESTS
// =============================================================================

#[tokio::test]
async fn test_404_on_unknown_endpoint() {
    let (server, _guard) = create_test_server();

    let response = server.get("/unknown").await;
    response.assert_status_not_found();
}

#[tokio::test]
async fn test_method_not_allowed() {
    let (server, _guard) = create_test_server();

    // /summaries/refresh is POST only
    let response = server.get("/summaries/refresh").await;
    assert_eq!(response.status_code().as_u16(), 405);
}

// =============================================================================
// AUTHENTICATION MIDDLEWARE TESTS
// =============================================================================

/// Create a test server with authentication enabled.
fn create_auth_test_server(api_key: &str) -> (TestServer, TestGuard) {
    let guard = lock();
    // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
    unsafe { std::env::set_var("SETTRACK_API_KEY", api_key) };
    let router = create_router(AppState::new(Store::in_memory(), IgnoreList::default()));
    (TestServer::new(router).unwrap(), guard)
}

#[tokio::test]
async fn test_auth_valid_bearer_token() {
    let api_key = "test-secret-key-12345";
    let (server, _guard) = create_auth_test_server(api_key);

    let response = server
        .get("/status")
        .add_header(
            axum::http::header::AUTHORIZATION,
            format!("Bearer {}", api_key)
                .parse::<HeaderValue>()
                .unwrap(),
        )
        .await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_auth_invalid_token_rejected() {
    let (server, _guard) = create_auth_test_server("correct-key");

    let response = server
        .get("/status")
        .add_header(
            axum::http::header::AUTHORIZATION,
            "Bearer wrong-key".parse::<HeaderValue>().unwrap(),
        )
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_missing_header_rejected() {
    let (server, _guard) = create_auth_test_server("required-key");

    let response = server.get("/releases").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_prefix_of_key_rejected() {
    let (server, _guard) = create_auth_test_server("actual-key");

    let response = server
        .get("/status")
        .add_header(
            axum::http::header::AUTHORIZATION,
            "Bearer actual".parse::<HeaderValue>().unwrap(),
        )
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_health_endpoint_bypasses_auth() {
    let (server, _guard) = create_auth_test_server("secret-key-for-bypass-test");

    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
}
