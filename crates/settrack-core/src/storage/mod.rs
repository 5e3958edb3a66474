//! # Storage
//!
//! Stores for releases, captured settings, metrics and computed summaries.
//!
//! ## Backends
//!
//! - `MemoryStore`: BTreeMap-backed, volatile unless exported
//! - `RedbStore`: disk-backed redb database (ACID, persistent)
//!
//! Both implement [`SnapshotStore`] and the collaborator traits from
//! [`crate::providers`]. [`Store`] wraps either one behind a single type.

mod memory;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::catalog::ReleaseCatalog;
use crate::diff::collapse_host_profiles;
use crate::formats::Dataset;
use crate::metrics::Metric;
use crate::primitives::MAX_CAPTURE_SETTINGS;
use crate::providers::{MetricsProvider, ReleaseProvider, ReleaseSelector, SettingsProvider};
use crate::provenance::Summary;
use crate::release::Release;
use crate::types::{
    ClusterSetting, HostProfile, RawSetting, ReleaseSetting, SettrackError, validate_variable,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

// =============================================================================
// STORED RECORDS
// =============================================================================

/// One import of a release's settings on one host profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRun {
    pub release_name: String,
    pub host: HostProfile,
    pub captured_at: DateTime<Utc>,
    pub settings: usize,
}

/// A capture run together with the settings it recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capture {
    pub run: CaptureRun,
    pub settings: Vec<RawSetting>,
}

/// The metric families recorded for one release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseMetrics {
    pub release: String,
    pub metrics: Vec<Metric>,
}

/// Row counts for status output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounts {
    pub releases: usize,
    pub capture_runs: usize,
    pub raw_settings: usize,
    pub variables: usize,
    pub metric_releases: usize,
    pub summaries: usize,
}

// =============================================================================
// STORE TRAIT
// =============================================================================

/// Operations shared by every store backend.
///
/// Reads of releases, raw settings and metrics come from the provider
/// supertraits.
pub trait SnapshotStore: ReleaseProvider + SettingsProvider + MetricsProvider {
    /// Insert or replace releases by name. Returns how many were written.
    fn save_releases(&mut self, releases: &[Release]) -> Result<usize, SettrackError>;

    /// Insert or replace the capture for `(release, host)` in one write.
    fn put_capture(&mut self, capture: Capture) -> Result<(), SettrackError>;

    /// Every capture, ordered by release name then host profile.
    fn captures(&self) -> Result<Vec<Capture>, SettrackError>;

    /// Captures of one release, ordered by host profile.
    fn captures_for_release(&self, release: &str) -> Result<Vec<Capture>, SettrackError> {
        Ok(self
            .captures()?
            .into_iter()
            .filter(|c| c.run.release_name == release)
            .collect())
    }

    /// Every capture run without its settings.
    fn capture_runs(&self) -> Result<Vec<CaptureRun>, SettrackError>;

    fn capture_exists(&self, release: &str, host: HostProfile) -> Result<bool, SettrackError>;

    /// Replace the metrics of a release. Returns how many were written.
    fn put_metrics(&mut self, release: &str, metrics: &[Metric]) -> Result<usize, SettrackError>;

    /// Every release's metrics, ordered by release name.
    fn metric_sets(&self) -> Result<Vec<ReleaseMetrics>, SettrackError>;

    /// Replace all stored summaries. Returns how many were written.
    fn save_summaries(&mut self, summaries: &[Summary]) -> Result<usize, SettrackError>;

    /// Stored summaries, ordered by variable.
    fn summaries(&self) -> Result<Vec<Summary>, SettrackError>;

    fn summary(&self, variable: &str) -> Result<Option<Summary>, SettrackError>;

    // =========================================================================
    // PROVIDED
    // =========================================================================

    /// Record a capture of `release` taken on `host`.
    ///
    /// # Errors
    ///
    /// - `UnknownRelease` if the release is not stored
    /// - `InvalidSetting` for an empty or oversized capture row
    /// - `DuplicateObservation` if a variable appears twice
    fn save_capture(
        &mut self,
        release: &str,
        host: HostProfile,
        settings: &[ClusterSetting],
        captured_at: DateTime<Utc>,
    ) -> Result<CaptureRun, SettrackError> {
        self.require_releases(&[release])?;
        if settings.len() > MAX_CAPTURE_SETTINGS {
            return Err(SettrackError::InvalidSetting(format!(
                "capture holds {} settings, limit is {MAX_CAPTURE_SETTINGS}",
                settings.len()
            )));
        }

        let mut seen = BTreeSet::new();
        for setting in settings {
            setting.validate()?;
            if !seen.insert(setting.variable.as_str()) {
                return Err(SettrackError::DuplicateObservation {
                    release: release.to_string(),
                    host,
                    variable: setting.variable.clone(),
                });
            }
        }

        let run = CaptureRun {
            release_name: release.to_string(),
            host,
            captured_at,
            settings: settings.len(),
        };
        let rows = settings
            .iter()
            .map(|s| RawSetting::from_cluster(release, host, s.clone()))
            .collect();
        self.put_capture(Capture {
            run: run.clone(),
            settings: rows,
        })?;
        Ok(run)
    }

    /// `UnknownRelease` for the first of `names` that is not stored.
    fn require_releases(&self, names: &[&str]) -> Result<(), SettrackError> {
        let releases = self.releases()?;
        match names
            .iter()
            .find(|name| !releases.iter().any(|r| r.name == **name))
        {
            Some(missing) => Err(SettrackError::UnknownRelease((*missing).to_string())),
            None => Ok(()),
        }
    }

    /// Record the metrics of a known release.
    fn save_metrics(&mut self, release: &str, metrics: &[Metric]) -> Result<usize, SettrackError> {
        self.require_releases(&[release])?;
        check_metric_names(metrics)?;
        self.put_metrics(release, metrics)
    }

    /// Host-collapsed settings of one release.
    fn release_settings(&self, release: &str) -> Result<Vec<ReleaseSetting>, SettrackError> {
        let raw = self.raw_settings(&ReleaseSelector::Named(release.to_string()))?;
        Ok(collapse_host_profiles(&raw))
    }

    fn counts(&self) -> Result<StoreCounts, SettrackError> {
        let runs = self.capture_runs()?;
        let mut variables = BTreeSet::new();
        let mut raw_settings = 0;
        for capture in self.captures()? {
            raw_settings += capture.settings.len();
            variables.extend(capture.settings.into_iter().map(|s| s.variable));
        }
        Ok(StoreCounts {
            releases: self.releases()?.len(),
            capture_runs: runs.len(),
            raw_settings,
            variables: variables.len(),
            metric_releases: self.metric_sets()?.len(),
            summaries: self.summaries()?.len(),
        })
    }

    /// Everything in the store, for export.
    fn export_dataset(&self) -> Result<Dataset, SettrackError> {
        Ok(Dataset {
            releases: self.releases()?,
            captures: self.captures()?,
            metrics: self.metric_sets()?,
            summaries: self.summaries()?,
        })
    }

    /// Merge a dataset into the store. Releases, captures and metrics are
    /// upserted; summaries are replaced when the dataset carries any.
    ///
    /// Captures and metric sets get the same checks as [`Self::save_capture`]
    /// and [`Self::save_metrics`], against the stored releases plus those in
    /// the dataset. Nothing is written unless the whole dataset passes.
    fn import_dataset(&mut self, dataset: Dataset) -> Result<StoreCounts, SettrackError> {
        let mut known: BTreeSet<String> = self.releases()?.into_iter().map(|r| r.name).collect();
        known.extend(dataset.releases.iter().map(|r| r.name.clone()));
        for capture in &dataset.captures {
            check_capture(capture, &known)?;
        }
        for set in &dataset.metrics {
            if !known.contains(&set.release) {
                return Err(SettrackError::UnknownRelease(set.release.clone()));
            }
            check_metric_names(&set.metrics)?;
        }

        self.save_releases(&dataset.releases)?;
        for capture in dataset.captures {
            self.put_capture(capture)?;
        }
        for set in &dataset.metrics {
            self.put_metrics(&set.release, &set.metrics)?;
        }
        if !dataset.summaries.is_empty() {
            self.save_summaries(&dataset.summaries)?;
        }
        self.counts()
    }
}

/// Reject a capture that [`SnapshotStore::save_capture`] would not have written.
fn check_capture(capture: &Capture, known: &BTreeSet<String>) -> Result<(), SettrackError> {
    let run = &capture.run;
    if !known.contains(&run.release_name) {
        return Err(SettrackError::UnknownRelease(run.release_name.clone()));
    }
    if capture.settings.len() > MAX_CAPTURE_SETTINGS {
        return Err(SettrackError::InvalidSetting(format!(
            "capture holds {} settings, limit is {MAX_CAPTURE_SETTINGS}",
            capture.settings.len()
        )));
    }
    if run.settings != capture.settings.len() {
        return Err(SettrackError::InvalidSetting(format!(
            "capture of {} on {} records {} settings but holds {}",
            run.release_name,
            run.host,
            run.settings,
            capture.settings.len()
        )));
    }

    let mut seen = BTreeSet::new();
    for row in &capture.settings {
        validate_variable(&row.variable)?;
        if row.release_name != run.release_name || row.host != run.host {
            return Err(SettrackError::InvalidSetting(format!(
                "row {} belongs to {} on {}, not to the capture of {} on {}",
                row.variable, row.release_name, row.host, run.release_name, run.host
            )));
        }
        if !seen.insert(row.variable.as_str()) {
            return Err(SettrackError::DuplicateObservation {
                release: run.release_name.clone(),
                host: run.host,
                variable: row.variable.clone(),
            });
        }
    }
    Ok(())
}

fn check_metric_names(metrics: &[Metric]) -> Result<(), SettrackError> {
    match metrics.iter().find(|m| m.name.is_empty()) {
        Some(bad) => Err(SettrackError::InvalidMetric(format!(
            "metric with empty name (help: {:?})",
            bad.help
        ))),
        None => Ok(()),
    }
}

/// Settings of the captures matching `selector`.
fn select_raw_settings<S>(
    store: &S,
    selector: &ReleaseSelector,
) -> Result<Vec<RawSetting>, SettrackError>
where
    S: SnapshotStore + ?Sized,
{
    let captures = match selector {
        ReleaseSelector::All => store.captures()?,
        ReleaseSelector::Named(name) => store.captures_for_release(name)?,
        ReleaseSelector::Recent(_) => {
            let catalog = ReleaseCatalog::new(store.releases()?);
            let names = selector.resolve(&catalog).unwrap_or_default();
            store
                .captures()?
                .into_iter()
                .filter(|c| names.contains(&c.run.release_name))
                .collect()
        }
    };
    Ok(captures.into_iter().flat_map(|c| c.settings).collect())
}

// =============================================================================
// STORE
// =============================================================================

/// Which backend a [`Store`] should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    #[default]
    Redb,
}

/// A store backed by either in-memory maps or a redb file.
#[derive(Debug)]
pub enum StorageBackend {
    /// Volatile BTreeMap storage.
    InMemory(MemoryStore),
    /// Disk-backed storage using redb.
    Persistent(RedbStore),
}

/// The store handle used by the app.
#[derive(Debug)]
pub struct Store {
    backend: StorageBackend,
}

impl Default for Store {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl Store {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            backend: StorageBackend::InMemory(MemoryStore::new()),
        }
    }

    /// Open or create a redb store at `path`.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, SettrackError> {
        Ok(Self {
            backend: StorageBackend::Persistent(RedbStore::open(path)?),
        })
    }

    /// Open the requested backend. `path` is only used by redb.
    pub fn open(kind: BackendKind, path: impl AsRef<Path>) -> Result<Self, SettrackError> {
        match kind {
            BackendKind::Memory => Ok(Self::in_memory()),
            BackendKind::Redb => Self::with_redb(path),
        }
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    fn inner(&self) -> &dyn SnapshotStore {
        match &self.backend {
            StorageBackend::InMemory(store) => store,
            StorageBackend::Persistent(store) => store,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn SnapshotStore {
        match &mut self.backend {
            StorageBackend::InMemory(store) => store,
            StorageBackend::Persistent(store) => store,
        }
    }
}

impl ReleaseProvider for Store {
    fn releases(&self) -> Result<Vec<Release>, SettrackError> {
        self.inner().releases()
    }
}

impl SettingsProvider for Store {
    fn raw_settings(&self, selector: &ReleaseSelector) -> Result<Vec<RawSetting>, SettrackError> {
        self.inner().raw_settings(selector)
    }
}

impl MetricsProvider for Store {
    fn metrics(&self, release: &str) -> Result<Vec<Metric>, SettrackError> {
        self.inner().metrics(release)
    }
}

impl SnapshotStore for Store {
    fn save_releases(&mut self, releases: &[Release]) -> Result<usize, SettrackError> {
        self.inner_mut().save_releases(releases)
    }

    fn put_capture(&mut self, capture: Capture) -> Result<(), SettrackError> {
        self.inner_mut().put_capture(capture)
    }

    fn captures(&self) -> Result<Vec<Capture>, SettrackError> {
        self.inner().captures()
    }

    fn captures_for_release(&self, release: &str) -> Result<Vec<Capture>, SettrackError> {
        self.inner().captures_for_release(release)
    }

    fn capture_runs(&self) -> Result<Vec<CaptureRun>, SettrackError> {
        self.inner().capture_runs()
    }

    fn capture_exists(&self, release: &str, host: HostProfile) -> Result<bool, SettrackError> {
        self.inner().capture_exists(release, host)
    }

    fn put_metrics(&mut self, release: &str, metrics: &[Metric]) -> Result<usize, SettrackError> {
        self.inner_mut().put_metrics(release, metrics)
    }

    fn metric_sets(&self) -> Result<Vec<ReleaseMetrics>, SettrackError> {
        self.inner().metric_sets()
    }

    fn save_summaries(&mut self, summaries: &[Summary]) -> Result<usize, SettrackError> {
        self.inner_mut().save_summaries(summaries)
    }

    fn summaries(&self) -> Result<Vec<Summary>, SettrackError> {
        self.inner().summaries()
    }

    fn summary(&self, variable: &str) -> Result<Option<Summary>, SettrackError> {
        self.inner().summary(variable)
    }
}

// =============================================================================
// TESTS
// =============================================================================
