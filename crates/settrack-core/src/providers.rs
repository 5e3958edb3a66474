//! # Collaborator Contracts
//!
//! Read-only traits through which the engine receives its inputs, plus the
//! release selector used to scope settings reads.
//!
//! Providers may be slow or fail; the helpers here pass their errors through
//! unchanged and run the pure computation only on materialized data.

use crate::catalog::ReleaseCatalog;
use crate::diff::{ComparedReleaseSettings, collapse_host_profiles, compare_release_settings_with};
use crate::feed::ParsedFeed;
use crate::metrics::{ComparedReleaseMetrics, Metric, compare_release_metrics};
use crate::provenance::{Summary, summarize_with};
use crate::release::Release;
use crate::types::{IgnoreList, RawSetting, SettrackError};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// RELEASE SELECTOR
// =============================================================================

/// Which releases a settings read covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseSelector {
    /// Every release.
    All,
    /// The `n` newest current releases by release date.
    Recent(usize),
    /// A single release by name.
    Named(String),
}

impl ReleaseSelector {
    /// Names selected from `catalog`, or `None` for every release.
    #[must_use]
    pub fn resolve(&self, catalog: &ReleaseCatalog) -> Option<BTreeSet<String>> {
        match self {
            Self::All => None,
            Self::Recent(n) => Some(catalog.recent_release_names(*n).into_iter().collect()),
            Self::Named(name) => Some(BTreeSet::from([name.clone()])),
        }
    }
}

impl FromStr for ReleaseSelector {
    type Err = SettrackError;

    /// Accepts `all`, `recent-N`, or a release name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(SettrackError::InvalidSelector(
                "empty release selector".to_string(),
            ));
        }
        if s == "all" {
            return Ok(Self::All);
        }
        if let Some(count) = s.strip_prefix("recent-") {
            return count
                .parse()
                .map(Self::Recent)
                .map_err(|_| SettrackError::InvalidSelector(s.to_string()));
        }
        if s.chars().any(char::is_whitespace) {
            return Err(SettrackError::InvalidSelector(s.to_string()));
        }
        Ok(Self::Named(s.to_string()))
    }
}

impl fmt::Display for ReleaseSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Recent(n) => write!(f, "recent-{n}"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

// =============================================================================
// PROVIDER TRAITS
// =============================================================================

/// Supplies the release catalog.
pub trait ReleaseProvider {
    fn releases(&self) -> Result<Vec<Release>, SettrackError>;
}

/// Supplies raw setting observations.
pub trait SettingsProvider {
    fn raw_settings(&self, selector: &ReleaseSelector) -> Result<Vec<RawSetting>, SettrackError>;
}

/// Supplies the metric families of a release.
pub trait MetricsProvider {
    fn metrics(&self, release: &str) -> Result<Vec<Metric>, SettrackError>;
}

impl ReleaseProvider for ParsedFeed {
    fn releases(&self) -> Result<Vec<Release>, SettrackError> {
        Ok(self.releases.clone())
    }
}

// =============================================================================
// PROVIDER-DRIVEN COMPUTATIONS
// =============================================================================

/// Summarize everything a provider holds.
pub fn summarize_from<P>(provider: &P, ignore: &IgnoreList) -> Result<Vec<Summary>, SettrackError>
where
    P: ReleaseProvider + SettingsProvider + ?Sized,
{
    let releases = provider.releases()?;
    let raw = provider.raw_settings(&ReleaseSelector::All)?;
    summarize_with(&raw, &releases, ignore)
}

/// Compare the host-collapsed settings of two releases.
pub fn compare_settings_from<P>(
    provider: &P,
    r1: &str,
    r2: &str,
    ignore: &IgnoreList,
) -> Result<ComparedReleaseSettings, SettrackError>
where
    P: SettingsProvider + ?Sized,
{
    let before = collapse_host_profiles(
        &provider.raw_settings(&ReleaseSelector::Named(r1.to_string()))?,
    );
    let after = collapse_host_profiles(
        &provider.raw_settings(&ReleaseSelector::Named(r2.to_string()))?,
    );
    Ok(compare_release_settings_with(&before, &after, ignore))
}

/// Compare the metrics of two releases.
pub fn compare_metrics_from<P>(
    provider: &P,
    r1: &str,
    r2: &str,
) -> Result<ComparedReleaseMetrics, SettrackError>
where
    P: MetricsProvider + ?Sized,
{
    let before = provider.metrics(r1)?;
    let after = provider.metrics(r2)?;
    Ok(compare_release_metrics(r1, &before, r2, &after))
}
