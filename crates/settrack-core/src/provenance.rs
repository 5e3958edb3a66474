//! # Provenance Engine
//!
//! Folds the full settings history into one lifecycle [`Summary`] per
//! variable: where it first and last appeared in each major version, every
//! value and description transition, and whether its value depends on the
//! host profile.
//!
//! ## Walk Order
//!
//! Rows of a variable are joined to their release and sorted by version,
//! then by host profile, then by release name. That order alone drives change
//! detection, so the output does not depend on input order.
//!
//! ## Parallelism
//!
//! Variables are independent. They are summarized on the rayon pool over
//! shared read-only inputs and merged into a `BTreeMap` keyed by variable.

use crate::catalog::ReleaseCatalog;
use crate::release::Release;
use crate::types::{HostProfile, IgnoreList, RawSetting, SettrackError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// RESULT TYPES
// =============================================================================

/// A transition of a value or description at a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub release: String,
    pub from: String,
    pub to: String,
}

/// Lifecycle of one setting across the whole release history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub variable: String,
    pub value: String,
    #[serde(rename = "type")]
    pub setting_type: String,
    pub public: bool,
    pub description: String,
    pub default_value: String,
    pub origin: String,
    pub key: String,
    /// Earliest release of each major version the variable was seen in.
    pub first_releases: Vec<String>,
    /// Latest release of each major version the variable was seen in.
    pub last_releases: Vec<String>,
    pub host_dependent: bool,
    pub value_changes: Vec<Change>,
    pub description_changes: Vec<Change>,
}

/// Latest description of a variable and every release it was seen in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingDetail {
    pub name: String,
    pub description: String,
    pub releases: Vec<String>,
}

// =============================================================================
// SUMMARIZATION
// =============================================================================

/// Summarize every variable in `raw`, skipping the default ignore list.
pub fn summarize(raw: &[RawSetting], releases: &[Release]) -> Result<Vec<Summary>, SettrackError> {
    summarize_with(raw, releases, &IgnoreList::default())
}

/// Summarize every variable in `raw` not listed in `ignore`.
///
/// Output is ordered by variable name.
///
/// # Errors
///
/// - `InvalidSetting` for a row with an empty variable or release name
/// - `UnknownRelease` for a row whose release is not in `releases`
/// - `DuplicateRelease` if `releases` holds a name twice
/// - `DuplicateObservation` for two rows sharing release, host and variable
pub fn summarize_with(
    raw: &[RawSetting],
    releases: &[Release],
    ignore: &IgnoreList,
) -> Result<Vec<Summary>, SettrackError> {
    let index = release_index(releases)?;
    validate_rows(raw, &index)?;

    let mut by_variable: BTreeMap<&str, Vec<&RawSetting>> = BTreeMap::new();
    for row in raw.iter().filter(|r| !ignore.contains(&r.variable)) {
        by_variable.entry(row.variable.as_str()).or_default().push(row);
    }

    let catalog = ReleaseCatalog::new(releases.to_vec());
    let summaries: BTreeMap<String, Summary> = by_variable
        .into_par_iter()
        .map(|(variable, rows)| {
            let summary = summarize_rows(variable, &rows, &index, &catalog);
            (variable.to_string(), summary)
        })
        .collect();

    Ok(summaries.into_values().collect())
}

/// Summarize a single variable. Returns `None` when it was never observed
/// or is on the ignore list.
pub fn summarize_variable(
    raw: &[RawSetting],
    releases: &[Release],
    variable: &str,
    ignore: &IgnoreList,
) -> Result<Option<Summary>, SettrackError> {
    if ignore.contains(variable) {
        return Ok(None);
    }
    let index = release_index(releases)?;
    let rows: Vec<&RawSetting> = raw.iter().filter(|r| r.variable == variable).collect();
    if rows.is_empty() {
        return Ok(None);
    }
    validate_rows(rows.iter().copied(), &index)?;

    let catalog = ReleaseCatalog::new(releases.to_vec());
    Ok(Some(summarize_rows(variable, &rows, &index, &catalog)))
}

/// Latest description of `variable` and the releases it appears in, in
/// version order. `None` when the variable was never observed.
pub fn setting_detail(
    raw: &[RawSetting],
    releases: &[Release],
    variable: &str,
) -> Result<Option<SettingDetail>, SettrackError> {
    let index = release_index(releases)?;
    let rows: Vec<&RawSetting> = raw.iter().filter(|r| r.variable == variable).collect();
    if rows.is_empty() {
        return Ok(None);
    }
    validate_rows(rows.iter().copied(), &index)?;

    let walk = walk_order(&rows, &index);
    let mut seen = BTreeSet::new();
    let releases = walk
        .iter()
        .filter(|&&(release, _)| seen.insert(release.name.as_str()))
        .map(|&(release, _)| release.name.clone())
        .collect();
    let description = walk
        .last()
        .map(|&(_, row)| row.description.clone())
        .unwrap_or_default();

    Ok(Some(SettingDetail {
        name: variable.to_string(),
        description,
        releases,
    }))
}

// =============================================================================
// INTERNALS
// =============================================================================

type ReleaseIndex<'a> = BTreeMap<&'a str, &'a Release>;

fn release_index(releases: &[Release]) -> Result<ReleaseIndex<'_>, SettrackError> {
    let mut index = BTreeMap::new();
    for release in releases {
        if index.insert(release.name.as_str(), release).is_some() {
            return Err(SettrackError::DuplicateRelease(release.name.clone()));
        }
    }
    Ok(index)
}

fn validate_rows<'r, I>(rows: I, index: &ReleaseIndex<'_>) -> Result<(), SettrackError>
where
    I: IntoIterator<Item = &'r RawSetting>,
{
    let mut seen: BTreeSet<(&str, HostProfile, &str)> = BTreeSet::new();
    for row in rows {
        if row.variable.is_empty() {
            return Err(SettrackError::InvalidSetting(format!(
                "empty variable name in release {:?}",
                row.release_name
            )));
        }
        if row.release_name.is_empty() {
            return Err(SettrackError::InvalidSetting(format!(
                "empty release name for variable {:?}",
                row.variable
            )));
        }
        if !index.contains_key(row.release_name.as_str()) {
            return Err(SettrackError::UnknownRelease(row.release_name.clone()));
        }
        if !seen.insert((row.release_name.as_str(), row.host, row.variable.as_str())) {
            return Err(SettrackError::DuplicateObservation {
                release: row.release_name.clone(),
                host: row.host,
                variable: row.variable.clone(),
            });
        }
    }
    Ok(())
}

/// Rows joined to their release, in canonical walk order.
fn walk_order<'a>(
    rows: &[&'a RawSetting],
    index: &ReleaseIndex<'a>,
) -> Vec<(&'a Release, &'a RawSetting)> {
    let mut joined: Vec<(&Release, &RawSetting)> = rows
        .iter()
        .filter_map(|row| index.get(row.release_name.as_str()).map(|r| (*r, *row)))
        .collect();
    joined.sort_by(|(ra, sa), (rb, sb)| {
        ra.compare_version(rb)
            .then_with(|| sa.host.cmp(&sb.host))
            .then_with(|| ra.name.cmp(&rb.name))
    });
    joined
}

/// Tracks the last value per host and records at most one change per release.
#[derive(Default)]
struct ChangeTracker<'a> {
    last: BTreeMap<u32, &'a str>,
    changes: Vec<Change>,
    changed_releases: BTreeSet<&'a str>,
}

impl<'a> ChangeTracker<'a> {
    fn observe(&mut self, release: &'a str, host: u32, current: &'a str) {
        match self.last.insert(host, current) {
            Some(previous) if previous != current => {
                if self.changed_releases.insert(release) {
                    self.changes.push(Change {
                        release: release.to_string(),
                        from: previous.to_string(),
                        to: current.to_string(),
                    });
                }
            }
            _ => {}
        }
    }
}

fn summarize_rows(
    variable: &str,
    rows: &[&RawSetting],
    index: &ReleaseIndex<'_>,
    catalog: &ReleaseCatalog,
) -> Summary {
    let walk = walk_order(rows, index);

    let mut values = ChangeTracker::default();
    let mut descriptions = ChangeTracker::default();
    let mut values_per_release: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

    for &(release, row) in &walk {
        let name = release.name.as_str();
        values.observe(name, row.host.cpu, &row.value);
        descriptions.observe(name, row.host.cpu, &row.description);
        values_per_release
            .entry(name)
            .or_default()
            .insert(row.value.as_str());
    }

    let host_dependent = values_per_release.values().any(|v| v.len() > 1);

    let observed: Vec<&str> = values_per_release.keys().copied().collect();
    let subset = catalog.filter_for_names(&observed);
    let names = |releases: Vec<Release>| -> Vec<String> {
        releases.into_iter().map(|r| r.name).collect()
    };

    let mut summary = Summary {
        variable: variable.to_string(),
        value: String::new(),
        setting_type: String::new(),
        public: false,
        description: String::new(),
        default_value: String::new(),
        origin: String::new(),
        key: String::new(),
        first_releases: names(subset.first_release_per_major_version()),
        last_releases: names(subset.last_release_per_major_version()),
        host_dependent,
        value_changes: values.changes,
        description_changes: descriptions.changes,
    };

    // Most recent attributes come from the last row of the walk.
    if let Some(&(_, latest)) = walk.last() {
        summary.value.clone_from(&latest.value);
        summary.setting_type.clone_from(&latest.setting_type);
        summary.public = latest.public;
        summary.description.clone_from(&latest.description);
        summary.default_value.clone_from(&latest.default_value);
        summary.origin.clone_from(&latest.origin);
        summary.key.clone_from(&latest.key);
    }

    summary
}

// =============================================================================
// TESTS
// =============================================================================
