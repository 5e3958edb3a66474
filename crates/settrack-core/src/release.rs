//! # Release
//!
//! A published build of the database, with its decomposed version.

use crate::types::ReleaseType;
use crate::version::{Channel, Version};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A release as listed by the release feed.
///
/// The version fields are derived from `name` (or `major_version` on
/// fallback) when the release is built and never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    #[serde(rename = "release_name")]
    pub name: String,
    pub withdrawn: bool,
    pub cloud_only: bool,
    pub release_type: ReleaseType,
    pub release_date: NaiveDate,
    pub major_version: String,
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub beta_rc: Channel,
    pub beta_rc_version: u32,
}

impl Release {
    /// Build a release, decomposing its name into version fields.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        release_type: ReleaseType,
        release_date: NaiveDate,
        major_version: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let major_version = major_version.into();
        let version = Version::resolve(&name, &major_version);
        Self {
            name,
            withdrawn: false,
            cloud_only: false,
            release_type,
            release_date,
            major_version,
            major: version.major,
            minor: version.minor,
            patch: version.patch,
            beta_rc: version.channel,
            beta_rc_version: version.channel_version,
        }
    }

    #[must_use]
    pub fn withdrawn(mut self, withdrawn: bool) -> Self {
        self.withdrawn = withdrawn;
        self
    }

    #[must_use]
    pub fn cloud_only(mut self, cloud_only: bool) -> Self {
        self.cloud_only = cloud_only;
        self
    }

    #[must_use]
    pub const fn version(&self) -> Version {
        Version {
            major: self.major,
            minor: self.minor,
            patch: self.patch,
            channel: self.beta_rc,
            channel_version: self.beta_rc_version,
        }
    }

    /// Total order on versions, ascending.
    #[must_use]
    pub fn compare_version(&self, other: &Self) -> Ordering {
        self.version().cmp(&other.version())
    }

    /// Order by release date only.
    #[must_use]
    pub fn compare_dates(&self, other: &Self) -> Ordering {
        self.release_date.cmp(&other.release_date)
    }

    /// Neither withdrawn nor cloud-only.
    #[must_use]
    pub const fn is_current(&self) -> bool {
        !self.withdrawn && !self.cloud_only
    }
}
