//! # Release Catalog
//!
//! An in-memory collection of releases with grouping, filtering and sorting.
//!
//! Every operation is pure: sorting and filtering return new catalogs and
//! lookups borrow from `self`. "Version order" always means the ascending
//! order of [`Release::compare_version`].

use crate::release::Release;
use crate::types::{ReleaseType, SettrackError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Sort keys supported by [`ReleaseCatalog::sorted_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    #[default]
    VersionAsc,
    VersionDesc,
    DateAsc,
}

impl SortBy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VersionAsc => "version",
            Self::VersionDesc => "version-desc",
            Self::DateAsc => "date",
        }
    }
}

impl FromStr for SortBy {
    type Err = SettrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "version" => Ok(Self::VersionAsc),
            "version-desc" => Ok(Self::VersionDesc),
            "date" => Ok(Self::DateAsc),
            other => Err(SettrackError::InvalidSelector(format!(
                "unknown sort order {other:?}, expected version, version-desc or date"
            ))),
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Releases of one major version, with its lifecycle markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MajorVersion {
    pub major_version: String,
    pub releases: Vec<Release>,
    pub first_testing_release: Option<Release>,
    pub last_testing_release: Option<Release>,
    pub first_production_release: Option<Release>,
    pub last_production_release: Option<Release>,
}

/// All major versions in version order plus the overall latest release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MajorVersionSummary {
    pub major_versions: Vec<MajorVersion>,
    pub latest_release: Option<Release>,
}

/// An ordered collection of releases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReleaseCatalog {
    releases: Vec<Release>,
}

impl FromIterator<Release> for ReleaseCatalog {
    fn from_iter<I: IntoIterator<Item = Release>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl From<Vec<Release>> for ReleaseCatalog {
    fn from(releases: Vec<Release>) -> Self {
        Self::new(releases)
    }
}

impl ReleaseCatalog {
    #[must_use]
    pub fn new(releases: Vec<Release>) -> Self {
        Self { releases }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.releases.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Release> {
        self.releases.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Release] {
        &self.releases
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Release> {
        self.releases
    }

    // =========================================================================
    // SORTING
    // =========================================================================

    /// A copy of the catalog sorted by `order`. The sort is stable.
    #[must_use]
    pub fn sorted_by(&self, order: SortBy) -> Self {
        let mut releases = self.releases.clone();
        match order {
            SortBy::VersionAsc => releases.sort_by(Release::compare_version),
            SortBy::VersionDesc => releases.sort_by(|a, b| b.compare_version(a)),
            SortBy::DateAsc => releases.sort_by(Release::compare_dates),
        }
        Self { releases }
    }

    /// Borrowed view in version order.
    fn version_ordered(&self) -> Vec<&Release> {
        let mut ordered: Vec<&Release> = self.releases.iter().collect();
        ordered.sort_by(|a, b| a.compare_version(b));
        ordered
    }

    // =========================================================================
    // LOOKUPS
    // =========================================================================

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Release> {
        self.releases.iter().find(|r| r.name == name)
    }

    /// The greatest release in version order.
    #[must_use]
    pub fn most_recent(&self) -> Option<&Release> {
        self.releases.iter().max_by(|a, b| a.compare_version(b))
    }

    /// Distinct major versions, in version order of their first release.
    #[must_use]
    pub fn major_versions(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.version_ordered()
            .into_iter()
            .filter(|r| seen.insert(r.major_version.as_str()))
            .map(|r| r.major_version.clone())
            .collect()
    }

    fn first_of(&self, major_version: &str, release_type: ReleaseType) -> Option<&Release> {
        self.version_ordered()
            .into_iter()
            .find(|r| r.major_version == major_version && r.release_type == release_type)
    }

    fn last_of(&self, major_version: &str, release_type: ReleaseType) -> Option<&Release> {
        self.version_ordered()
            .into_iter()
            .rev()
            .find(|r| r.major_version == major_version && r.release_type == release_type)
    }

    #[must_use]
    pub fn first_testing_for_major(&self, major_version: &str) -> Option<&Release> {
        self.first_of(major_version, ReleaseType::Testing)
    }

    #[must_use]
    pub fn last_testing_for_major(&self, major_version: &str) -> Option<&Release> {
        self.last_of(major_version, ReleaseType::Testing)
    }

    #[must_use]
    pub fn first_production_for_major(&self, major_version: &str) -> Option<&Release> {
        self.first_of(major_version, ReleaseType::Production)
    }

    #[must_use]
    pub fn last_production_for_major(&self, major_version: &str) -> Option<&Release> {
        self.last_of(major_version, ReleaseType::Production)
    }

    /// Last release of a major version regardless of type.
    #[must_use]
    pub fn latest_for_major(&self, major_version: &str) -> Option<&Release> {
        self.version_ordered()
            .into_iter()
            .rev()
            .find(|r| r.major_version == major_version)
    }

    // =========================================================================
    // FILTERING
    // =========================================================================

    /// Releases matching `keep`, in their original relative order.
    #[must_use]
    pub fn filter<F>(&self, keep: F) -> Self
    where
        F: Fn(&Release) -> bool,
    {
        Self {
            releases: self.releases.iter().filter(|r| keep(*r)).cloned().collect(),
        }
    }

    /// Releases whose name appears in `names`, in their original relative order.
    #[must_use]
    pub fn filter_for_names<S: AsRef<str>>(&self, names: &[S]) -> Self {
        let wanted: BTreeSet<&str> = names.iter().map(AsRef::as_ref).collect();
        self.filter(|r| wanted.contains(r.name.as_str()))
    }

    /// Releases that are neither withdrawn nor cloud-only.
    #[must_use]
    pub fn current(&self) -> Self {
        self.filter(Release::is_current)
    }

    /// Names of the `n` newest current releases by release date, newest first.
    #[must_use]
    pub fn recent_release_names(&self, n: usize) -> Vec<String> {
        let mut current: Vec<&Release> = self.releases.iter().filter(|r| r.is_current()).collect();
        current.sort_by(|a, b| b.compare_dates(a).then_with(|| b.compare_version(a)));
        current.into_iter().take(n).map(|r| r.name.clone()).collect()
    }

    // =========================================================================
    // GROUPING
    // =========================================================================

    /// Version-ordered releases grouped by major version, majors in version
    /// order of their first release.
    fn grouped_by_major(&self) -> Vec<(String, Vec<&Release>)> {
        let mut order: Vec<String> = Vec::new();
        let mut groups: BTreeMap<String, Vec<&Release>> = BTreeMap::new();
        for release in self.version_ordered() {
            let group = groups.entry(release.major_version.clone()).or_insert_with(|| {
                order.push(release.major_version.clone());
                Vec::new()
            });
            group.push(release);
        }
        order
            .into_iter()
            .filter_map(|mv| groups.remove(&mv).map(|g| (mv, g)))
            .collect()
    }

    /// The earliest release of every major version, version-ascending.
    #[must_use]
    pub fn first_release_per_major_version(&self) -> Vec<Release> {
        let mut firsts: Vec<Release> = self
            .grouped_by_major()
            .into_iter()
            .filter_map(|(_, group)| group.first().map(|r| (*r).clone()))
            .collect();
        firsts.sort_by(Release::compare_version);
        firsts
    }

    /// The latest release of every major version, version-ascending.
    #[must_use]
    pub fn last_release_per_major_version(&self) -> Vec<Release> {
        let mut lasts: Vec<Release> = self
            .grouped_by_major()
            .into_iter()
            .filter_map(|(_, group)| group.last().map(|r| (*r).clone()))
            .collect();
        lasts.sort_by(Release::compare_version);
        lasts
    }

    /// Per-major breakdown with first/last testing and production releases.
    #[must_use]
    pub fn major_version_summary(&self) -> MajorVersionSummary {
        let major_versions = self
            .grouped_by_major()
            .into_iter()
            .map(|(major_version, group)| {
                let first = |t: ReleaseType| group.iter().find(|r| r.release_type == t);
                let last = |t: ReleaseType| group.iter().rev().find(|r| r.release_type == t);
                MajorVersion {
                    first_testing_release: first(ReleaseType::Testing).map(|r| (*r).clone()),
                    last_testing_release: last(ReleaseType::Testing).map(|r| (*r).clone()),
                    first_production_release: first(ReleaseType::Production)
                        .map(|r| (*r).clone()),
                    last_production_release: last(ReleaseType::Production).map(|r| (*r).clone()),
                    releases: group.iter().map(|r| (*r).clone()).collect(),
                    major_version,
                }
            })
            .collect();

        MajorVersionSummary {
            major_versions,
            latest_release: self.most_recent().cloned(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn release(name: &str, major: &str, release_type: ReleaseType, day: u32) -> Release {
        let date = NaiveDate::from_ymd_opt(2023, 1, 1)
            .and_then(|d| d.checked_add_days(chrono::Days::new(u64::from(day))))
            .expect("valid date");
        Release::new(name, release_type, date, major)
    }

    fn sample() -> ReleaseCatalog {
        ReleaseCatalog::new(vec![
            release("v23.1.1", "v23.1", ReleaseType::Production, 40),
            release("v23.2.0-beta.1", "v23.2", ReleaseType::Testing, 50),
            release("v23.1.0-alpha.1", "v23.1", ReleaseType::Testing, 1),
            release("v23.1.0", "v23.1", ReleaseType::Production, 30),
            release("v23.1.0-rc.1", "v23.1", ReleaseType::Testing, 20),
            release("v23.2.0", "v23.2", ReleaseType::Production, 60),
        ])
    }

    fn names(catalog: &ReleaseCatalog) -> Vec<&str> {
        catalog.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn sorted_by_version_ascending_and_descending() {
        let catalog = sample();
        let asc = catalog.sorted_by(SortBy::VersionAsc);
        assert_eq!(
            names(&asc),
            vec![
                "v23.1.0-alpha.1",
                "v23.1.0-rc.1",
                "v23.1.0",
                "v23.1.1",
                "v23.2.0-beta.1",
                "v23.2.0"
            ]
        );
        let desc = catalog.sorted_by(SortBy::VersionDesc);
        let mut reversed = names(&asc);
        reversed.reverse();
        assert_eq!(names(&desc), reversed);
    }

    #[test]
    fn sort_order_names() {
        for order in [SortBy::VersionAsc, SortBy::VersionDesc, SortBy::DateAsc] {
            assert_eq!(order.as_str().parse::<SortBy>().expect("parse"), order);
        }
        assert!("newest".parse::<SortBy>().is_err());
    }

    #[test]
    fn sorted_by_date() {
        let by_date = sample().sorted_by(SortBy::DateAsc);
        assert_eq!(names(&by_date)[0], "v23.1.0-alpha.1");
        assert_eq!(names(&by_date)[5], "v23.2.0");
    }

    #[test]
    fn sorting_is_idempotent() {
        let once = sample().sorted_by(SortBy::VersionAsc);
        let twice = once.sorted_by(SortBy::VersionAsc);
        assert_eq!(once, twice);
    }

    #[test]
    fn major_versions_in_version_order() {
        assert_eq!(sample().major_versions(), vec!["v23.1", "v23.2"]);
    }

    #[test]
    fn first_and_last_by_type() {
        let catalog = sample();
        let name = |r: Option<&Release>| r.map(|r| r.name.clone());
        assert_eq!(
            name(catalog.first_testing_for_major("v23.1")).as_deref(),
            Some("v23.1.0-alpha.1")
        );
        assert_eq!(
            name(catalog.last_testing_for_major("v23.1")).as_deref(),
            Some("v23.1.0-rc.1")
        );
        assert_eq!(
            name(catalog.first_production_for_major("v23.1")).as_deref(),
            Some("v23.1.0")
        );
        assert_eq!(
            name(catalog.last_production_for_major("v23.1")).as_deref(),
            Some("v23.1.1")
        );
        assert!(catalog.first_testing_for_major("v24.1").is_none());
        assert_eq!(
            name(catalog.latest_for_major("v23.2")).as_deref(),
            Some("v23.2.0")
        );
    }

    #[test]
    fn lookups_borrow_from_catalog() {
        let catalog = sample();
        let found = catalog.get("v23.1.0").expect("present");
        assert_eq!(found.major_version, "v23.1");
        assert!(catalog.get("v99.1.0").is_none());
    }

    #[test]
    fn most_recent_of_empty_catalog_is_none() {
        assert!(ReleaseCatalog::default().most_recent().is_none());
        assert_eq!(
            sample().most_recent().map(|r| r.name.as_str()),
            Some("v23.2.0")
        );
    }

    #[test]
    fn filter_for_names_preserves_order() {
        let catalog = sample();
        let subset = catalog.filter_for_names(&["v23.2.0", "v23.1.1", "missing"]);
        assert_eq!(names(&subset), vec!["v23.1.1", "v23.2.0"]);
    }

    #[test]
    fn first_and_last_release_per_major() {
        let catalog = ReleaseCatalog::new(vec![
            release("v23.2.0", "v23.2", ReleaseType::Production, 10),
            release("v23.1.5", "v23.1", ReleaseType::Production, 5),
            release("v23.1.0", "v23.1", ReleaseType::Production, 1),
        ]);
        let first: Vec<String> = catalog
            .first_release_per_major_version()
            .into_iter()
            .map(|r| r.name)
            .collect();
        let last: Vec<String> = catalog
            .last_release_per_major_version()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(first, vec!["v23.1.0", "v23.2.0"]);
        assert_eq!(last, vec!["v23.1.5", "v23.2.0"]);
    }

    #[test]
    fn current_and_recent_names() {
        let mut releases = sample().into_vec();
        releases.push(release("v23.2.1", "v23.2", ReleaseType::Production, 70).withdrawn(true));
        releases.push(release("v23.2.2", "v23.2", ReleaseType::Production, 80).cloud_only(true));
        let catalog = ReleaseCatalog::new(releases);

        assert_eq!(catalog.current().len(), 6);
        assert_eq!(
            catalog.recent_release_names(2),
            vec!["v23.2.0".to_string(), "v23.2.0-beta.1".to_string()]
        );
        assert_eq!(catalog.recent_release_names(100).len(), 6);
    }

    #[test]
    fn major_version_summary_marks_missing_types() {
        let catalog = ReleaseCatalog::new(vec![
            release("v24.1.0-beta.1", "v24.1", ReleaseType::Testing, 1),
            release("v24.1.0-beta.2", "v24.1", ReleaseType::Testing, 2),
        ]);
        let summary = catalog.major_version_summary();
        assert_eq!(summary.major_versions.len(), 1);
        let major = &summary.major_versions[0];
        assert_eq!(major.releases.len(), 2);
        assert_eq!(
            major.first_testing_release.as_ref().map(|r| r.name.as_str()),
            Some("v24.1.0-beta.1")
        );
        assert_eq!(
            major.last_testing_release.as_ref().map(|r| r.name.as_str()),
            Some("v24.1.0-beta.2")
        );
        assert!(major.first_production_release.is_none());
        assert!(major.last_production_release.is_none());
        assert_eq!(
            summary.latest_release.map(|r| r.name),
            Some("v24.1.0-beta.2".to_string())
        );
    }
}
