//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API. Core results
//! (releases, settings, summaries, change-sets) are returned as-is; the
//! types here cover the envelopes and query strings around them.

use axum::{Json, http::StatusCode, response::IntoResponse, response::Response};
use serde::{Deserialize, Serialize};
use settrack_core::{SettrackError, SortBy, Store, StoreCounts};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Store status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub backend: String,
    pub releases: usize,
    pub capture_runs: usize,
    pub raw_settings: usize,
    pub variables: usize,
    pub metric_releases: usize,
    pub summaries: usize,
}

impl StatusResponse {
    pub fn new(store: &Store, counts: StoreCounts) -> Self {
        Self {
            backend: backend_name(store).to_string(),
            releases: counts.releases,
            capture_runs: counts.capture_runs,
            raw_settings: counts.raw_settings,
            variables: counts.variables,
            metric_releases: counts.metric_releases,
            summaries: counts.summaries,
        }
    }
}

/// `redb` or `memory`.
pub fn backend_name(store: &Store) -> &'static str {
    if store.is_persistent() { "redb" } else { "memory" }
}

// =============================================================================
// QUERY PARAMETERS
// =============================================================================

/// `GET /releases` query string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReleasesQuery {
    /// `version` (default), `version-desc` or `date`.
    #[serde(default)]
    pub sort: Option<String>,
    /// Only releases that are neither withdrawn nor cloud-only.
    #[serde(default)]
    pub current: bool,
}

impl ReleasesQuery {
    pub fn sort_order(&self) -> Result<SortBy, SettrackError> {
        self.sort
            .as_deref()
            .map_or(Ok(SortBy::default()), |s| s.parse())
    }
}

/// `?r1=&r2=` query string of the compare endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareQuery {
    pub r1: String,
    pub r2: String,
}

// =============================================================================
// REFRESH RESPONSE
// =============================================================================

/// `POST /summaries/refresh` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub success: bool,
    pub summaries: usize,
}

// =============================================================================
// ERRORS
// =============================================================================

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// An error on its way to becoming an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

/// 404 for a missing release, 400 for other caller errors, 500 otherwise.
impl From<SettrackError> for ApiError {
    fn from(err: SettrackError) -> Self {
        let status = match &err {
            SettrackError::UnknownRelease(_) => StatusCode::NOT_FOUND,
            e if e.is_caller_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %err, "Request failed");
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}
