//! Unit tests for the JSON contract of the HTTP API.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use axum::http::StatusCode;
use chrono::NaiveDate;
use settrack::api::{
    ApiError, CompareQuery, ErrorResponse, HealthResponse, RefreshResponse, ReleasesQuery,
    StatusResponse,
};
use settrack_core::{
    ChangedSetting, ComparedReleaseSettings, Release, ReleaseSetting, ReleaseType, SettrackError,
    SortBy,
};
use serde_json::json;

// =============================================================================
// HEALTH RESPONSE TESTS
// =============================================================================

#[test]
fn test_health_response_default() {
    let health = HealthResponse::default();
    assert_eq!(health.status, "ok");
    assert!(!health.version.is_empty());
}

#[test]
fn test_health_response_deserialization() {
    let json = r#"{"status":"healthy","version":"1.0.0"}"#;
    let health: HealthResponse = serde_json::from_str(json).unwrap();

    assert_eq!(health.status, "healthy");
    assert_eq!(health.version, "1.0.0");
}

// =============================================================================
// STATUS RESPONSE TESTS
// =============================================================================

#[test]
fn test_status_response_field_names() {
    let status = StatusResponse {
        backend: "redb".to_string(),
        releases: 120,
        capture_runs: 40,
        raw_settings: 9000,
        variables: 450,
        metric_releases: 12,
        summaries: 450,
    };

    let value = serde_json::to_value(&status).unwrap();
    assert_eq!(
        value,
        json!({
            "backend": "redb",
            "releases": 120,
            "capture_runs": 40,
            "raw_settings": 9000,
            "variables": 450,
            "metric_releases": 12,
            "summaries": 450,
        })
    );
}

// =============================================================================
// CORE RESULT SHAPES
// =============================================================================

#[test]
fn test_release_json_shape() {
    let release = Release::new(
        "v23.1.0-rc.2",
        ReleaseType::Testing,
        NaiveDate::from_ymd_opt(2023, 5, 1).unwrap(),
        "v23.1",
    );

    let value = serde_json::to_value(&release).unwrap();
    assert_eq!(value["release_name"], "v23.1.0-rc.2");
    assert_eq!(value["release_type"], "Testing");
    assert_eq!(value["release_date"], "2023-05-01");
    assert_eq!(value["major_version"], "v23.1");
    assert_eq!(value["beta_rc"], "rc");
    assert_eq!(value["beta_rc_version"], 2);
    assert_eq!(value["withdrawn"], false);
    assert_eq!(value["cloud_only"], false);
}

#[test]
fn test_ga_release_has_empty_channel() {
    let release = Release::new(
        "v23.1.0",
        ReleaseType::Production,
        NaiveDate::from_ymd_opt(2023, 5, 15).unwrap(),
        "v23.1",
    );

    let value = serde_json::to_value(&release).unwrap();
    assert_eq!(value["beta_rc"], "");
    assert_eq!(value["beta_rc_version"], 0);

    let back: Release = serde_json::from_value(value).unwrap();
    assert_eq!(back, release);
}

fn release_setting(release: &str, value: &str) -> ReleaseSetting {
    ReleaseSetting {
        release_name: release.to_string(),
        variable: "sql.defaults.distsql".to_string(),
        value: value.to_string(),
        setting_type: "e".to_string(),
        public: true,
        description: "default distributed SQL execution mode".to_string(),
        default_value: "auto".to_string(),
        origin: "default".to_string(),
        key: "sql.defaults.distsql".to_string(),
    }
}

#[test]
fn test_setting_type_is_renamed() {
    let value = serde_json::to_value(release_setting("v23.1.0", "on")).unwrap();
    assert_eq!(value["type"], "e");
    assert!(value.get("setting_type").is_none());
}

#[test]
fn test_compare_settings_shape() {
    let compared = ComparedReleaseSettings {
        added: vec![],
        removed: vec![],
        changed: vec![ChangedSetting {
            before: release_setting("v22.2.0", "auto"),
            after: release_setting("v23.1.0", "on"),
        }],
    };

    let value = serde_json::to_value(&compared).unwrap();
    assert_eq!(value["added"], json!([]));
    assert_eq!(value["removed"], json!([]));
    assert_eq!(value["changed"][0]["before"]["value"], "auto");
    assert_eq!(value["changed"][0]["after"]["value"], "on");
    assert_eq!(value["changed"][0]["after"]["release_name"], "v23.1.0");
}

// =============================================================================
// QUERY PARAMETER TESTS
// =============================================================================

#[test]
fn test_releases_query_defaults() {
    let query: ReleasesQuery = serde_json::from_str("{}").unwrap();
    assert!(!query.current);
    assert_eq!(query.sort_order().unwrap(), SortBy::VersionAsc);
}

#[test]
fn test_releases_query_sort_names() {
    for (name, order) in [
        ("version", SortBy::VersionAsc),
        ("version-desc", SortBy::VersionDesc),
        ("date", SortBy::DateAsc),
    ] {
        let query = ReleasesQuery {
            sort: Some(name.to_string()),
            current: false,
        };
        assert_eq!(query.sort_order().unwrap(), order);
    }

    let bad = ReleasesQuery {
        sort: Some("random".to_string()),
        current: false,
    };
    assert!(matches!(
        bad.sort_order(),
        Err(SettrackError::InvalidSelector(_))
    ));
}

#[test]
fn test_compare_query_requires_both_releases() {
    assert!(serde_json::from_str::<CompareQuery>(r#"{"r1":"v22.2.0"}"#).is_err());
    let query: CompareQuery = serde_json::from_str(r#"{"r1":"a","r2":"b"}"#).unwrap();
    assert_eq!((query.r1.as_str(), query.r2.as_str()), ("a", "b"));
}

// =============================================================================
// ERROR MAPPING TESTS
// =============================================================================

#[test]
fn test_error_status_mapping() {
    let cases = [
        (
            SettrackError::UnknownRelease("v1.0.0".to_string()),
            StatusCode::NOT_FOUND,
        ),
        (
            SettrackError::InvalidSelector("recent-x".to_string()),
            StatusCode::BAD_REQUEST,
        ),
        (
            SettrackError::DuplicateRelease("v1.0.0".to_string()),
            StatusCode::BAD_REQUEST,
        ),
        (
            SettrackError::StorageError("disk full".to_string()),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
        (
            SettrackError::FeedError("timeout".to_string()),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    ];

    for (err, expected) in cases {
        let message = err.to_string();
        let api_error = ApiError::from(err);
        assert_eq!(api_error.status, expected, "{}", message);
        assert_eq!(api_error.message, message);
    }
}

#[test]
fn test_error_response_shape() {
    let body = ErrorResponse {
        error: "Unknown release: v1.0.0".to_string(),
    };
    assert_eq!(
        serde_json::to_value(&body).unwrap(),
        json!({"error": "Unknown release: v1.0.0"})
    );
}

#[test]
fn test_refresh_response_shape() {
    let body = RefreshResponse {
        success: true,
        summaries: 3,
    };
    assert_eq!(
        serde_json::to_value(&body).unwrap(),
        json!({"success": true, "summaries": 3})
    );
}
