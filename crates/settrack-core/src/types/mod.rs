//! # Core Type Definitions
//!
//! This module contains the shared types of the settrack engine:
//! - Host profiles and release types (`HostProfile`, `ReleaseType`)
//! - Setting observations (`ClusterSetting`, `RawSetting`, `ReleaseSetting`)
//! - The ignore list applied by diffing and summarization (`IgnoreList`)
//! - Error types (`SettrackError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Implement `Ord` where they act as grouping keys
//! - Use `BTreeSet`/`BTreeMap` so iteration order never depends on hashing

use crate::primitives::{IGNORED_SETTINGS, MAX_VARIABLE_LENGTH};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

// =============================================================================
// HOST PROFILE
// =============================================================================

/// Hardware profile a capture was taken on.
///
/// Ordering is `(cpu, memory_bytes)`, which is what "lowest host profile"
/// means throughout the crate. Only `cpu` distinguishes hosts when walking
/// a setting's history.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct HostProfile {
    pub cpu: u32,
    pub memory_bytes: u64,
}

impl HostProfile {
    #[must_use]
    pub const fn new(cpu: u32, memory_bytes: u64) -> Self {
        Self { cpu, memory_bytes }
    }
}

impl fmt::Display for HostProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} cpu / {} bytes", self.cpu, self.memory_bytes)
    }
}

// =============================================================================
// RELEASE TYPE
// =============================================================================

/// Whether a release is a testing (pre-release) or production build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReleaseType {
    Production,
    Testing,
}

impl ReleaseType {
    /// Parse the feed spelling (`Production` / `Testing`).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Production" => Some(Self::Production),
            "Testing" => Some(Self::Testing),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Production => "Production",
            Self::Testing => "Testing",
        }
    }
}

impl fmt::Display for ReleaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// SETTINGS
// =============================================================================

/// One row of the cluster settings table as captured from a running cluster.
///
/// Older releases expose fewer columns, so everything except `variable` and
/// `value` falls back to its default when missing from the capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSetting {
    pub variable: String,
    pub value: String,
    #[serde(rename = "type", default)]
    pub setting_type: String,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub default_value: String,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub key: String,
}

impl ClusterSetting {
    /// Check the row can be stored: a non-empty variable name within limits.
    pub fn validate(&self) -> Result<(), SettrackError> {
        validate_variable(&self.variable)
    }
}

/// A variable name must be non-empty and at most [`MAX_VARIABLE_LENGTH`] bytes.
pub(crate) fn validate_variable(variable: &str) -> Result<(), SettrackError> {
    if variable.is_empty() {
        return Err(SettrackError::InvalidSetting(
            "variable name is empty".to_string(),
        ));
    }
    if variable.len() > MAX_VARIABLE_LENGTH {
        return Err(SettrackError::InvalidSetting(format!(
            "variable name exceeds {MAX_VARIABLE_LENGTH} bytes"
        )));
    }
    Ok(())
}

/// One observation of one variable, for one release, on one host profile.
///
/// `(release_name, host, variable)` identifies the row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSetting {
    pub release_name: String,
    pub host: HostProfile,
    pub variable: String,
    pub value: String,
    #[serde(rename = "type")]
    pub setting_type: String,
    pub public: bool,
    pub description: String,
    pub default_value: String,
    pub origin: String,
    pub key: String,
}

impl RawSetting {
    /// Attach release and host to a captured row.
    #[must_use]
    pub fn from_cluster(release_name: &str, host: HostProfile, setting: ClusterSetting) -> Self {
        Self {
            release_name: release_name.to_string(),
            host,
            variable: setting.variable,
            value: setting.value,
            setting_type: setting.setting_type,
            public: setting.public,
            description: setting.description,
            default_value: setting.default_value,
            origin: setting.origin,
            key: setting.key,
        }
    }

    /// Drop the host profile.
    #[must_use]
    pub fn to_release_setting(&self) -> ReleaseSetting {
        ReleaseSetting {
            release_name: self.release_name.clone(),
            variable: self.variable.clone(),
            value: self.value.clone(),
            setting_type: self.setting_type.clone(),
            public: self.public,
            description: self.description.clone(),
            default_value: self.default_value.clone(),
            origin: self.origin.clone(),
            key: self.key.clone(),
        }
    }
}

/// A setting as seen for a release, with host profiles collapsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseSetting {
    pub release_name: String,
    pub variable: String,
    pub value: String,
    #[serde(rename = "type")]
    pub setting_type: String,
    pub public: bool,
    pub description: String,
    pub default_value: String,
    pub origin: String,
    pub key: String,
}

// =============================================================================
// IGNORE LIST
// =============================================================================

/// Variables excluded from diffing and summarization.
///
/// The default holds [`IGNORED_SETTINGS`]; configuration may add more.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreList(BTreeSet<String>);

impl Default for IgnoreList {
    fn default() -> Self {
        Self(IGNORED_SETTINGS.iter().map(|s| (*s).to_string()).collect())
    }
}

impl IgnoreList {
    /// An ignore list with no entries at all, not even the defaults.
    #[must_use]
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    /// The defaults plus `extra`.
    #[must_use]
    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Self::default();
        list.0.extend(extra.into_iter().map(Into::into));
        list
    }

    #[must_use]
    pub fn contains(&self, variable: &str) -> bool {
        self.0.contains(variable)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the settrack engine.
///
/// - Version parse failures never appear here; they fall back silently
/// - Lookups that can miss return `Option`, not an error
/// - Adapter errors carry the underlying message as a `String`
#[derive(Debug, Error)]
pub enum SettrackError {
    /// A setting row is malformed (empty variable or release name).
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    /// A metric row is malformed (empty name).
    #[error("Invalid metric: {0}")]
    InvalidMetric(String),

    /// A setting references a release missing from the catalog.
    #[error("Unknown release: {0}")]
    UnknownRelease(String),

    /// The catalog used for a computation holds the same name twice.
    #[error("Duplicate release: {0}")]
    DuplicateRelease(String),

    /// Two rows share the same release, host profile and variable.
    #[error("Duplicate observation of {variable} in {release} on {host}")]
    DuplicateObservation {
        release: String,
        host: HostProfile,
        variable: String,
    },

    /// A release selector string is not `all`, `recent-N` or a release name.
    #[error("Invalid release selector: {0}")]
    InvalidSelector(String),

    /// The backing store failed.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// The release feed document could not be used.
    #[error("Release feed error: {0}")]
    FeedError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl SettrackError {
    /// Whether the error was caused by the caller's input rather than by an
    /// adapter or the store.
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidSetting(_)
                | Self::InvalidMetric(_)
                | Self::UnknownRelease(_)
                | Self::DuplicateRelease(_)
                | Self::DuplicateObservation { .. }
                | Self::InvalidSelector(_)
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_profile_orders_by_cpu_then_memory() {
        let small = HostProfile::new(4, 32);
        let same_cpu = HostProfile::new(4, 64);
        let large = HostProfile::new(8, 16);
        assert!(small < same_cpu);
        assert!(same_cpu < large);
    }

    #[test]
    fn release_type_parse() {
        assert_eq!(ReleaseType::parse("Testing"), Some(ReleaseType::Testing));
        assert_eq!(
            ReleaseType::parse("Production"),
            Some(ReleaseType::Production)
        );
        assert_eq!(ReleaseType::parse("production"), None);
    }

    #[test]
    fn cluster_setting_defaults_missing_columns() {
        let json = r#"{"variable":"kv.rangefeed.enabled","value":"false"}"#;
        let setting: ClusterSetting = serde_json::from_str(json).expect("parse");
        assert_eq!(setting.setting_type, "");
        assert!(!setting.public);
        assert_eq!(setting.origin, "");
    }

    #[test]
    fn cluster_setting_validation() {
        let mut setting = ClusterSetting {
            variable: String::new(),
            value: "1".to_string(),
            setting_type: "i".to_string(),
            public: true,
            description: String::new(),
            default_value: String::new(),
            origin: String::new(),
            key: String::new(),
        };
        assert!(matches!(
            setting.validate(),
            Err(SettrackError::InvalidSetting(_))
        ));

        setting.variable = "a".repeat(MAX_VARIABLE_LENGTH + 1);
        assert!(setting.validate().is_err());

        setting.variable = "sql.defaults.distsql".to_string();
        assert!(setting.validate().is_ok());
    }

    #[test]
    fn ignore_list_defaults_and_extras() {
        let defaults = IgnoreList::default();
        assert!(defaults.contains("cluster.secret"));
        assert!(defaults.contains("version"));
        assert!(!defaults.contains("diagnostics.reporting.enabled"));

        let extended = IgnoreList::with_extra(["diagnostics.reporting.enabled"]);
        assert_eq!(extended.len(), 3);
        assert!(extended.contains("diagnostics.reporting.enabled"));

        assert!(IgnoreList::empty().is_empty());
    }

    #[test]
    fn caller_errors_are_classified() {
        assert!(SettrackError::UnknownRelease("v1.0.0".to_string()).is_caller_error());
        assert!(!SettrackError::StorageError("disk".to_string()).is_caller_error());
    }
}
