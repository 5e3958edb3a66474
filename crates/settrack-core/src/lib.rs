//! # settrack-core
//!
//! The deterministic engine behind settrack.
//!
//! Given a catalog of database releases and the cluster settings captured on
//! each of them, this crate orders releases by version, diffs settings and
//! metrics between two releases, and builds per-setting provenance: the
//! release a setting first appeared in, the last release it existed in, and
//! every change to its value or description along the way.
//!
//! ## Architectural Constraints
//!
//! - No async, no network dependencies (pure Rust)
//! - Every grouping uses ordered maps, so equal inputs give byte-equal outputs
//! - Inputs arrive through the provider traits in [`providers`]; fetching
//!   feeds and capturing settings from live clusters is the app's job

// =============================================================================
// MODULES
// =============================================================================

pub mod catalog;
pub mod diff;
pub mod feed;
pub mod formats;
pub mod metrics;
pub mod primitives;
pub mod provenance;
pub mod providers;
pub mod release;
pub mod storage;
pub mod types;
pub mod version;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{
    ClusterSetting, HostProfile, IgnoreList, RawSetting, ReleaseSetting, ReleaseType,
    SettrackError,
};
pub use version::{Channel, Version};

// =============================================================================
// RE-EXPORTS: Releases
// =============================================================================

pub use catalog::{MajorVersion, MajorVersionSummary, ReleaseCatalog, SortBy};
pub use feed::{ParsedFeed, SkippedRelease, parse_release_feed};
pub use release::Release;

// =============================================================================
// RE-EXPORTS: Settings & Metrics
// =============================================================================

pub use diff::{
    ChangedSetting, ComparedReleaseSettings, collapse_host_profiles, compare_release_settings,
    compare_release_settings_with,
};
pub use metrics::{
    ChangedMetric, ComparedReleaseMetrics, Metric, MetricType, ReleaseMetric,
    compare_release_metrics, parse_exposition,
};
pub use provenance::{
    Change, SettingDetail, Summary, setting_detail, summarize, summarize_variable, summarize_with,
};
pub use providers::{
    MetricsProvider, ReleaseProvider, ReleaseSelector, SettingsProvider, compare_metrics_from,
    compare_settings_from, summarize_from,
};

// =============================================================================
// RE-EXPORTS: Storage & Formats
// =============================================================================

pub use formats::{Dataset, PersistenceHeader, dataset_from_bytes, dataset_to_bytes};
pub use storage::{
    BackendKind, Capture, CaptureRun, MemoryStore, RedbStore, ReleaseMetrics, SnapshotStore,
    StorageBackend, Store, StoreCounts,
};
