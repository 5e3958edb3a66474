//! # Engine Primitives
//!
//! Hardcoded constants for the settrack engine.
//!
//! These values are compiled into the binary and are immutable at runtime.
//! The ignore list can be extended through [`crate::IgnoreList`], but the
//! defaults below are always the starting point.

/// Variables that never take part in diffing or summarization.
///
/// - `cluster.secret` is random per cluster and would show up as a change
///   between every pair of captures.
/// - `version` is the cluster version itself, so it changes with every release.
pub const IGNORED_SETTINGS: &[&str] = &["cluster.secret", "version"];

/// Magic bytes for the settrack dataset file header.
///
/// - File Header = Magic Bytes ("STRK") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"STRK";

/// Current dataset format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;

/// Release metadata maintained by the docs team. Each entry carries
/// `release_name`, `withdrawn`, `cloud_only`, `release_type`, `release_date`
/// and `major_version`.
pub const DEFAULT_RELEASE_FEED_URL: &str =
    "https://raw.githubusercontent.com/cockroachdb/docs/main/src/current/_data/releases.yml";

/// Channel assigned to releases whose name does not match the full version
/// pattern. A placeholder kept for compatibility with stored data.
pub const FALLBACK_CHANNEL_NAME: &str = "beta";

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for a setting variable name.
pub const MAX_VARIABLE_LENGTH: usize = 256;

/// Maximum number of settings accepted in a single capture.
///
/// A release exposes a few hundred settings; anything far above that is a
/// malformed capture file rather than real data.
pub const MAX_CAPTURE_SETTINGS: usize = 20_000;

/// Maximum number of metric families accepted from one exposition.
pub const MAX_EXPOSITION_METRICS: usize = 50_000;
