//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.

use super::{
    AppState,
    types::{
        ApiError, CompareQuery, HealthResponse, RefreshResponse, ReleasesQuery, StatusResponse,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use settrack_core::{
    ComparedReleaseMetrics, ComparedReleaseSettings, MajorVersionSummary, Release,
    ReleaseCatalog, ReleaseProvider, ReleaseSelector, ReleaseSetting, SettingDetail,
    SettingsProvider, SnapshotStore, Summary, compare_metrics_from,
    compare_settings_from, setting_detail, summarize_variable, summarize_with,
};

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// STATUS HANDLER
// =============================================================================

/// Row counts of the store.
pub async fn status_handler(
    State(state): State<AppState>,
) -> Result<Json<StatusResponse>, ApiError> {
    let store = state.store.read().await;
    let counts = store.counts()?;
    Ok(Json(StatusResponse::new(&store, counts)))
}

// =============================================================================
// RELEASE HANDLERS
// =============================================================================

/// List releases, optionally only current ones, in the requested order.
pub async fn releases_handler(
    State(state): State<AppState>,
    Query(query): Query<ReleasesQuery>,
) -> Result<Json<Vec<Release>>, ApiError> {
    let order = query.sort_order()?;
    let catalog = ReleaseCatalog::new(state.store.read().await.releases()?);
    let catalog = if query.current {
        catalog.current()
    } else {
        catalog
    };
    Ok(Json(catalog.sorted_by(order).into_vec()))
}

/// Releases grouped by major version.
pub async fn majors_handler(
    State(state): State<AppState>,
) -> Result<Json<MajorVersionSummary>, ApiError> {
    let catalog = ReleaseCatalog::new(state.store.read().await.releases()?);
    Ok(Json(catalog.major_version_summary()))
}

// =============================================================================
// SETTINGS HANDLERS
// =============================================================================

/// Host-collapsed settings of one release.
pub async fn release_settings_handler(
    State(state): State<AppState>,
    Path(release): Path<String>,
) -> Result<Json<Vec<ReleaseSetting>>, ApiError> {
    let store = state.store.read().await;
    store.require_releases(&[release.as_str()])?;
    Ok(Json(store.release_settings(&release)?))
}

/// Settings change-set between `r1` and `r2`, ordered by variable.
pub async fn compare_settings_handler(
    State(state): State<AppState>,
    Query(query): Query<CompareQuery>,
) -> Result<Json<ComparedReleaseSettings>, ApiError> {
    let store = state.store.read().await;
    store.require_releases(&[query.r1.as_str(), query.r2.as_str()])?;
    let compared = compare_settings_from(&*store, &query.r1, &query.r2, &state.ignore)?;
    Ok(Json(compared.sorted()))
}

/// Latest description of a variable and the releases it appears in.
pub async fn setting_detail_handler(
    State(state): State<AppState>,
    Path(variable): Path<String>,
) -> Result<Json<SettingDetail>, ApiError> {
    let store = state.store.read().await;
    let releases = store.releases()?;
    let raw = store.raw_settings(&ReleaseSelector::All)?;
    setting_detail(&raw, &releases, &variable)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Setting not found: {}", variable)))
}

// =============================================================================
// SUMMARY HANDLERS
// =============================================================================

/// Every stored summary, ordered by variable.
pub async fn summaries_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<Summary>>, ApiError> {
    Ok(Json(state.store.read().await.summaries()?))
}

/// The summary of one variable. Computed from the raw captures when no
/// refresh has stored one yet.
pub async fn summary_handler(
    State(state): State<AppState>,
    Path(variable): Path<String>,
) -> Result<Json<Summary>, ApiError> {
    let store = state.store.read().await;
    let summary = match store.summary(&variable)? {
        Some(summary) => Some(summary),
        None => {
            let releases = store.releases()?;
            let raw = store.raw_settings(&ReleaseSelector::All)?;
            summarize_variable(&raw, &releases, &variable, &state.ignore)?
        }
    };
    summary
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("No summary for setting: {}", variable)))
}

/// Recompute and replace all summaries.
///
/// Inputs are copied out under the read lock; summarization runs on the
/// blocking pool and only the final write takes the write lock.
pub async fn refresh_summaries_handler(
    State(state): State<AppState>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let (releases, raw) = {
        let store = state.store.read().await;
        (store.releases()?, store.raw_settings(&ReleaseSelector::All)?)
    };
    let ignore = state.ignore.clone();
    let rows = raw.len();

    let summaries = tokio::task::spawn_blocking(move || summarize_with(&raw, &releases, &ignore))
        .await
        .map_err(|e| ApiError::internal(format!("Summarization task failed: {}", e)))??;

    let written = state.store.write().await.save_summaries(&summaries)?;
    tracing::info!(rows, summaries = written, "Refreshed setting summaries");

    Ok(Json(RefreshResponse {
        success: true,
        summaries: written,
    }))
}

// =============================================================================
// METRICS HANDLERS
// =============================================================================

/// Metric change-set between `r1` and `r2`.
pub async fn compare_metrics_handler(
    State(state): State<AppState>,
    Query(query): Query<CompareQuery>,
) -> Result<Json<ComparedReleaseMetrics>, ApiError> {
    let store = state.store.read().await;
    store.require_releases(&[query.r1.as_str(), query.r2.as_str()])?;
    Ok(Json(compare_metrics_from(&*store, &query.r1, &query.r2)?))
}
