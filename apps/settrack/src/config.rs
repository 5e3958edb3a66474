//! # Configuration
//!
//! Optional TOML file plus environment overrides.
//!
//! Precedence, highest first: CLI flag > environment > file > defaults.
//! CLI flags are applied by the caller through [`Config::apply_overrides`].
//!
//! ```toml
//! database = "settrack.db"
//! backend = "redb"
//! feed_url = "https://example.com/releases.yml"
//! ignored_settings = ["server.host_based_authentication.configuration"]
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! ```

use serde::Deserialize;
use settrack_core::{BackendKind, IgnoreList, SettrackError, primitives::DEFAULT_RELEASE_FEED_URL};
use std::path::{Path, PathBuf};

/// File read when `--config` is not given, if it exists.
pub const DEFAULT_CONFIG_FILE: &str = "settrack.toml";

/// Default database path.
pub const DEFAULT_DATABASE: &str = "settrack.db";

/// Maximum config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub database: PathBuf,
    pub backend: BackendKind,
    pub feed_url: String,
    pub server: ServerConfig,
    /// Variables skipped in addition to the built-in ignore list.
    pub ignored_settings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            backend: BackendKind::default(),
            feed_url: DEFAULT_RELEASE_FEED_URL.to_string(),
            server: ServerConfig::default(),
            ignored_settings: Vec::new(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Values given on the command line. `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub database: Option<PathBuf>,
    pub backend: Option<BackendKind>,
    pub feed_url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, SettrackError> {
        toml::from_str(text).map_err(|e| SettrackError::DeserializationError(e.to_string()))
    }

    /// Read the config file and apply environment overrides.
    ///
    /// An explicit `path` must exist. Without one, `settrack.toml` in the
    /// working directory is used when present, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, SettrackError> {
        let mut config = match path {
            Some(path) => Self::read_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::read_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, SettrackError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            SettrackError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(SettrackError::IoError(format!(
                "Config file '{}' exceeds {} bytes",
                path.display(),
                MAX_CONFIG_FILE_SIZE
            )));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| SettrackError::IoError(format!("Read config: {}", e)))?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Self::from_toml(&text)
    }

    /// Apply `SETTRACK_DATABASE` and `SETTRACK_FEED_URL` from `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(database) = lookup("SETTRACK_DATABASE").filter(|v| !v.is_empty()) {
            self.database = PathBuf::from(database);
        }
        if let Some(feed_url) = lookup("SETTRACK_FEED_URL").filter(|v| !v.is_empty()) {
            self.feed_url = feed_url;
        }
    }

    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(database) = overrides.database {
            self.database = database;
        }
        if let Some(backend) = overrides.backend {
            self.backend = backend;
        }
        if let Some(feed_url) = overrides.feed_url {
            self.feed_url = feed_url;
        }
        if let Some(host) = overrides.host {
            self.server.host = host;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
    }

    /// Built-in ignore list plus `ignored_settings`.
    #[must_use]
    pub fn ignore_list(&self) -> IgnoreList {
        IgnoreList::with_extra(self.ignored_settings.iter().cloned())
    }
}

// =============================================================================
// TESTS
// =============================================================================
