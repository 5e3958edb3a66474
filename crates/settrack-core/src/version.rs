//! # Version Model
//!
//! Decomposes a release name such as `v23.2.0-beta.3` into an ordered tuple
//! `(major, minor, patch, channel, channel_version)`.
//!
//! ## Ordering
//!
//! Versions compare numerically on major, minor and patch, then by channel
//! rank (`alpha < beta < rc < GA`), then by the channel number. The derived
//! `Ord` follows field order, so the field order below is load-bearing.
//!
//! ## Fallback
//!
//! Names that do not match the full pattern (old `v2.0-alpha.20170906` style
//! builds, odd one-offs) are resolved from the release's `major_version`
//! instead, with the channel forced to `beta`. Parsing never fails outright.

use crate::primitives::FALLBACK_CHANNEL_NAME;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static RELEASE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^v(\d+)\.(\d+)\.(\d+)(?:-(alpha|beta|rc)(?:\.(\d+))?)?$")
        .expect("release name pattern is a valid regex")
});

static MAJOR_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^v(\d+)\.(\d+)$").expect("major version pattern is a valid regex")
});

// =============================================================================
// CHANNEL
// =============================================================================

/// Pre-release channel of a release.
///
/// Variant order is the channel rank used by [`Version`] ordering.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum Channel {
    Alpha,
    Beta,
    Rc,
    /// General availability; rendered as the empty string.
    #[default]
    Ga,
}

impl Channel {
    /// Wire form: `alpha`, `beta`, `rc`, or `""` for GA.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alpha => "alpha",
            Self::Beta => "beta",
            Self::Rc => "rc",
            Self::Ga => "",
        }
    }

    /// Parse the wire form. Unknown strings yield `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "alpha" => Some(Self::Alpha),
            "beta" => Some(Self::Beta),
            "rc" => Some(Self::Rc),
            "" => Some(Self::Ga),
            _ => None,
        }
    }

    /// Channel used when a release name cannot be decomposed.
    #[must_use]
    pub fn fallback() -> Self {
        Self::parse(FALLBACK_CHANNEL_NAME).unwrap_or(Self::Beta)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Channel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("unknown release channel: {value:?}"))
    }
}

impl From<Channel> for String {
    fn from(channel: Channel) -> Self {
        channel.as_str().to_string()
    }
}

// =============================================================================
// VERSION
// =============================================================================

/// The ordered tuple behind a release name.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub channel: Channel,
    /// Number after the channel (`3` in `beta.3`); 0 when absent.
    pub channel_version: u32,
}

impl Version {
    /// Parse a full release name. Returns `None` when the name does not match
    /// `v<major>.<minor>.<patch>[-(alpha|beta|rc)[.<n>]]` or a component
    /// overflows `u32`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let caps = RELEASE_NAME.captures(name)?;
        let number = |idx: usize| -> Option<u32> {
            match caps.get(idx) {
                Some(m) => m.as_str().parse().ok(),
                None => Some(0),
            }
        };

        let channel = match caps.get(4) {
            Some(m) => Channel::parse(m.as_str())?,
            None => Channel::Ga,
        };

        Some(Self {
            major: number(1)?,
            minor: number(2)?,
            patch: number(3)?,
            channel,
            channel_version: number(5)?,
        })
    }

    /// Parse a `v<major>.<minor>` major version string.
    #[must_use]
    pub fn parse_major_version(major_version: &str) -> Option<(u32, u32)> {
        let caps = MAJOR_VERSION.captures(major_version)?;
        let major = caps.get(1)?.as_str().parse().ok()?;
        let minor = caps.get(2)?.as_str().parse().ok()?;
        Some((major, minor))
    }

    /// Resolve the version of a release, falling back to its major version.
    ///
    /// If the name is not a full version, major and minor come from
    /// `major_version` and the channel is the `beta` placeholder. If that also
    /// fails the version is all zeros, still on the placeholder channel.
    #[must_use]
    pub fn resolve(name: &str, major_version: &str) -> Self {
        if let Some(version) = Self::parse(name) {
            return version;
        }

        let (major, minor) = Self::parse_major_version(major_version).unwrap_or((0, 0));
        Self {
            major,
            minor,
            patch: 0,
            channel: Channel::fallback(),
            channel_version: 0,
        }
    }

    #[must_use]
    pub const fn is_prerelease(&self) -> bool {
        !matches!(self.channel, Channel::Ga)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)?;
        if self.is_prerelease() {
            write!(f, "-{}.{}", self.channel, self.channel_version)?;
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
