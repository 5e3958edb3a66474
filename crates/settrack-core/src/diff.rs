//! # Settings Diff
//!
//! Change-set between the setting snapshots of two releases, plus the
//! host-collapsed view those snapshots are built from.
//!
//! Ignore-listed variables never reach any bucket. Descriptions are compared
//! after trimming surrounding whitespace; values are compared exactly.

use crate::types::{IgnoreList, RawSetting, ReleaseSetting};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A setting present in both releases whose value or description differs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedSetting {
    pub before: ReleaseSetting,
    pub after: ReleaseSetting,
}

/// Result of comparing two releases' settings.
///
/// Buckets are in traversal order: `removed` and `changed` follow the first
/// release's list, `added` follows the second's. Use [`Self::sorted`] for
/// output ordered by variable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparedReleaseSettings {
    pub added: Vec<ReleaseSetting>,
    pub removed: Vec<ReleaseSetting>,
    pub changed: Vec<ChangedSetting>,
}

impl ComparedReleaseSettings {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Every bucket sorted by variable name.
    #[must_use]
    pub fn sorted(mut self) -> Self {
        self.added.sort_by(|a, b| a.variable.cmp(&b.variable));
        self.removed.sort_by(|a, b| a.variable.cmp(&b.variable));
        self.changed
            .sort_by(|a, b| a.before.variable.cmp(&b.before.variable));
        self
    }
}

/// Compare two host-collapsed snapshots using the default ignore list.
#[must_use]
pub fn compare_release_settings(
    r1: &[ReleaseSetting],
    r2: &[ReleaseSetting],
) -> ComparedReleaseSettings {
    compare_release_settings_with(r1, r2, &IgnoreList::default())
}

/// Compare two host-collapsed snapshots, skipping variables in `ignore`.
///
/// If a list holds the same variable twice, the first occurrence is the one
/// the other side is compared against.
#[must_use]
pub fn compare_release_settings_with(
    r1: &[ReleaseSetting],
    r2: &[ReleaseSetting],
    ignore: &IgnoreList,
) -> ComparedReleaseSettings {
    let before_index = index_by_variable(r1, ignore);
    let after_index = index_by_variable(r2, ignore);

    let mut result = ComparedReleaseSettings::default();

    for before in r1.iter().filter(|s| !ignore.contains(&s.variable)) {
        match after_index.get(before.variable.as_str()) {
            None => result.removed.push(before.clone()),
            Some(after) => {
                if before.value != after.value
                    || before.description.trim() != after.description.trim()
                {
                    result.changed.push(ChangedSetting {
                        before: before.clone(),
                        after: (*after).clone(),
                    });
                }
            }
        }
    }

    for after in r2.iter().filter(|s| !ignore.contains(&s.variable)) {
        if !before_index.contains_key(after.variable.as_str()) {
            result.added.push(after.clone());
        }
    }

    result
}

fn index_by_variable<'a>(
    settings: &'a [ReleaseSetting],
    ignore: &IgnoreList,
) -> BTreeMap<&'a str, &'a ReleaseSetting> {
    let mut index = BTreeMap::new();
    for setting in settings {
        if !ignore.contains(&setting.variable) {
            index.entry(setting.variable.as_str()).or_insert(setting);
        }
    }
    index
}

/// Collapse raw observations into one setting per release and variable.
///
/// When several host profiles observed the variable, the lowest profile wins.
/// Output is ordered public settings first, then by variable name, then by
/// release name.
#[must_use]
pub fn collapse_host_profiles(raw: &[RawSetting]) -> Vec<ReleaseSetting> {
    let mut lowest: BTreeMap<(&str, &str), &RawSetting> = BTreeMap::new();
    for row in raw {
        lowest
            .entry((row.release_name.as_str(), row.variable.as_str()))
            .and_modify(|kept| {
                if row.host < kept.host {
                    *kept = row;
                }
            })
            .or_insert(row);
    }

    let mut collapsed: Vec<ReleaseSetting> = lowest
        .into_values()
        .map(RawSetting::to_release_setting)
        .collect();
    collapsed.sort_by(|a, b| {
        b.public
            .cmp(&a.public)
            .then_with(|| a.variable.cmp(&b.variable))
            .then_with(|| a.release_name.cmp(&b.release_name))
    });
    collapsed
}

// =============================================================================
// TESTS
// =============================================================================
