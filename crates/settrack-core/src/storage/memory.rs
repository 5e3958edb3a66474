//! In-memory store backed by ordered maps.

use super::{Capture, CaptureRun, ReleaseMetrics, SnapshotStore, select_raw_settings};
use crate::metrics::Metric;
use crate::providers::{MetricsProvider, ReleaseProvider, ReleaseSelector, SettingsProvider};
use crate::provenance::Summary;
use crate::release::Release;
use crate::types::{HostProfile, RawSetting, SettrackError};
use std::collections::BTreeMap;

/// A volatile store. Iteration order follows the map keys, so reads are
/// reproducible.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    releases: BTreeMap<String, Release>,
    captures: BTreeMap<(String, HostProfile), Capture>,
    metrics: BTreeMap<String, Vec<Metric>>,
    summaries: BTreeMap<String, Summary>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReleaseProvider for MemoryStore {
    fn releases(&self) -> Result<Vec<Release>, SettrackError> {
        Ok(self.releases.values().cloned().collect())
    }
}

impl SettingsProvider for MemoryStore {
    fn raw_settings(&self, selector: &ReleaseSelector) -> Result<Vec<RawSetting>, SettrackError> {
        select_raw_settings(self, selector)
    }
}

impl MetricsProvider for MemoryStore {
    fn metrics(&self, release: &str) -> Result<Vec<Metric>, SettrackError> {
        Ok(self.metrics.get(release).cloned().unwrap_or_default())
    }
}

impl SnapshotStore for MemoryStore {
    fn save_releases(&mut self, releases: &[Release]) -> Result<usize, SettrackError> {
        for release in releases {
            self.releases.insert(release.name.clone(), release.clone());
        }
        Ok(releases.len())
    }

    fn put_capture(&mut self, capture: Capture) -> Result<(), SettrackError> {
        let key = (capture.run.release_name.clone(), capture.run.host);
        self.captures.insert(key, capture);
        Ok(())
    }

    fn captures(&self) -> Result<Vec<Capture>, SettrackError> {
        Ok(self.captures.values().cloned().collect())
    }

    fn captures_for_release(&self, release: &str) -> Result<Vec<Capture>, SettrackError> {
        Ok(self
            .captures
            .iter()
            .filter(|((name, _), _)| name == release)
            .map(|(_, capture)| capture.clone())
            .collect())
    }

    fn capture_runs(&self) -> Result<Vec<CaptureRun>, SettrackError> {
        Ok(self.captures.values().map(|c| c.run.clone()).collect())
    }

    fn capture_exists(&self, release: &str, host: HostProfile) -> Result<bool, SettrackError> {
        Ok(self.captures.contains_key(&(release.to_string(), host)))
    }

    fn put_metrics(&mut self, release: &str, metrics: &[Metric]) -> Result<usize, SettrackError> {
        self.metrics.insert(release.to_string(), metrics.to_vec());
        Ok(metrics.len())
    }

    fn metric_sets(&self) -> Result<Vec<ReleaseMetrics>, SettrackError> {
        Ok(self
            .metrics
            .iter()
            .map(|(release, metrics)| ReleaseMetrics {
                release: release.clone(),
                metrics: metrics.clone(),
            })
            .collect())
    }

    fn save_summaries(&mut self, summaries: &[Summary]) -> Result<usize, SettrackError> {
        self.summaries = summaries
            .iter()
            .map(|s| (s.variable.clone(), s.clone()))
            .collect();
        Ok(self.summaries.len())
    }

    fn summaries(&self) -> Result<Vec<Summary>, SettrackError> {
        Ok(self.summaries.values().cloned().collect())
    }

    fn summary(&self, variable: &str) -> Result<Option<Summary>, SettrackError> {
        Ok(self.summaries.get(variable).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReleaseType;
    use chrono::NaiveDate;

    fn summary(variable: &str) -> Summary {
        Summary {
            variable: variable.to_string(),
            value: "1".to_string(),
            setting_type: "i".to_string(),
            public: true,
            description: String::new(),
            default_value: "1".to_string(),
            origin: "default".to_string(),
            key: variable.to_string(),
            first_releases: Vec::new(),
            last_releases: Vec::new(),
            host_dependent: false,
            value_changes: Vec::new(),
            description_changes: Vec::new(),
        }
    }

    #[test]
    fn releases_upsert_by_name() {
        let mut store = MemoryStore::new();
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
        let release = Release::new("v24.1.0", ReleaseType::Testing, date, "v24.1");
        store.save_releases(&[release.clone()]).expect("save");
        store
            .save_releases(&[release.withdrawn(true)])
            .expect("save");

        let releases = store.releases().expect("releases");
        assert_eq!(releases.len(), 1);
        assert!(releases[0].withdrawn);
    }

    #[test]
    fn summaries_are_replaced_not_merged() {
        let mut store = MemoryStore::new();
        store
            .save_summaries(&[summary("a"), summary("b")])
            .expect("save");
        store.save_summaries(&[summary("c")]).expect("save");

        let variables: Vec<String> = store
            .summaries()
            .expect("summaries")
            .into_iter()
            .map(|s| s.variable)
            .collect();
        assert_eq!(variables, vec!["c"]);
        assert!(store.summary("a").expect("summary").is_none());
        assert!(store.summary("c").expect("summary").is_some());
    }
}
