//! # Release Feed
//!
//! Parses the YAML release list maintained by the docs team into
//! [`Release`] values. Fetching the document is the app's job; this module
//! only turns text into releases.
//!
//! The document is a top-level list of mappings:
//!
//! ```yaml
//! - release_name: v23.1.0
//!   major_version: v23.1
//!   release_date: '2023-05-15'
//!   release_type: Production
//!   withdrawn: false
//!   cloud_only: false
//! ```
//!
//! Unknown keys are ignored. A record that cannot become a release is
//! skipped and reported instead of failing the whole document.

use crate::release::Release;
use crate::types::{ReleaseType, SettrackError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Date layout used by `release_date`.
pub const RELEASE_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct FeedEntry {
    release_name: String,
    #[serde(default)]
    withdrawn: bool,
    #[serde(default)]
    cloud_only: bool,
    #[serde(default)]
    release_type: String,
    #[serde(default)]
    release_date: Option<serde_yaml::Value>,
    #[serde(default)]
    major_version: String,
}

/// A feed record that was left out, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRelease {
    /// `release_name` of the record, or its position when it has none.
    pub record: String,
    pub reason: String,
}

/// Outcome of parsing a feed document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFeed {
    pub releases: Vec<Release>,
    pub skipped: Vec<SkippedRelease>,
}

/// Parse a release feed document.
///
/// # Errors
///
/// `FeedError` if the text is not YAML or its top level is not a list.
pub fn parse_release_feed(yaml: &str) -> Result<ParsedFeed, SettrackError> {
    let document: serde_yaml::Value =
        serde_yaml::from_str(yaml).map_err(|e| SettrackError::FeedError(e.to_string()))?;
    let serde_yaml::Value::Sequence(records) = document else {
        return Err(SettrackError::FeedError(
            "release feed is not a list of releases".to_string(),
        ));
    };

    let mut parsed = ParsedFeed::default();
    for (position, record) in records.into_iter().enumerate() {
        match parse_record(record) {
            Ok(release) => parsed.releases.push(release),
            Err((record, reason)) => parsed.skipped.push(SkippedRelease {
                record: record.unwrap_or_else(|| format!("#{position}")),
                reason,
            }),
        }
    }
    Ok(parsed)
}

fn parse_record(record: serde_yaml::Value) -> Result<Release, (Option<String>, String)> {
    let entry: FeedEntry = serde_yaml::from_value(record).map_err(|e| (None, e.to_string()))?;
    let name = entry.release_name;

    let Some(release_type) = ReleaseType::parse(&entry.release_type) else {
        return Err((
            Some(name),
            format!("unknown release type {:?}", entry.release_type),
        ));
    };

    let date_text = match entry.release_date {
        Some(serde_yaml::Value::String(s)) => s,
        Some(other) => {
            return Err((Some(name), format!("release date is not a string: {other:?}")));
        }
        None => return Err((Some(name), "missing release date".to_string())),
    };
    let release_date = NaiveDate::parse_from_str(&date_text, RELEASE_DATE_FORMAT)
        .map_err(|e| (Some(name.clone()), format!("bad release date {date_text:?}: {e}")))?;

    Ok(Release::new(name, release_type, release_date, entry.major_version)
        .withdrawn(entry.withdrawn)
        .cloud_only(entry.cloud_only))
}
