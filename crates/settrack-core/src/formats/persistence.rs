//! # Persistence Format
//!
//! Binary serialization for settrack datasets. File I/O lives in the app.
//!
//! Format: Header (5 bytes) + postcard-serialized dataset.
//! - 4 bytes: Magic ("STRK")
//! - 1 byte: Version
//!
//! ## Validation
//!
//! Size limits and the header are checked before the payload is decoded,
//! so corrupted or foreign files fail fast without large allocations.

use crate::primitives;
use crate::provenance::Summary;
use crate::release::Release;
use crate::storage::{Capture, ReleaseMetrics};
use crate::types::SettrackError;
use serde::{Deserialize, Serialize};

/// Maximum allowed payload size for the dataset format.
///
/// Validated before deserialization.
pub const MAX_PERSISTENCE_PAYLOAD_SIZE: usize = 500 * 1024 * 1024; // 500 MB

/// Header length: magic plus version byte.
const HEADER_LEN: usize = 5;

// =============================================================================
// DATASET
// =============================================================================

/// Everything a store holds. Captures carry their raw settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub releases: Vec<Release>,
    pub captures: Vec<Capture>,
    pub metrics: Vec<ReleaseMetrics>,
    pub summaries: Vec<Summary>,
}

impl Dataset {
    /// Total number of raw settings across all captures.
    #[must_use]
    pub fn raw_setting_count(&self) -> usize {
        self.captures.iter().map(|c| c.settings.len()).sum()
    }
}

// =============================================================================
// FILE HEADER
// =============================================================================

/// The persistence header precedes all dataset data.
#[derive(Debug, Clone, Copy)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Create a new header with current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), SettrackError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(SettrackError::DeserializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(SettrackError::DeserializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SettrackError> {
        let Some(header) = bytes.get(..HEADER_LEN) else {
            return Err(SettrackError::DeserializationError(
                "Header too short".to_string(),
            ));
        };
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&header[0..4]);
        Ok(Self {
            magic,
            version: header[4],
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a dataset to bytes (header + payload).
pub fn dataset_to_bytes(dataset: &Dataset) -> Result<Vec<u8>, SettrackError> {
    let payload = postcard::to_stdvec(dataset)
        .map_err(|e| SettrackError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_LEN + payload.len());
    result.extend_from_slice(&PersistenceHeader::new().to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Deserialize a dataset from bytes.
///
/// Checks, in order: minimum size, maximum size, header magic and version.
/// Only then is the payload decoded.
pub fn dataset_from_bytes(bytes: &[u8]) -> Result<Dataset, SettrackError> {
    if bytes.len() < HEADER_LEN {
        return Err(SettrackError::DeserializationError(format!(
            "Data too short: minimum {HEADER_LEN} bytes required"
        )));
    }
    if bytes.len() > MAX_PERSISTENCE_PAYLOAD_SIZE {
        return Err(SettrackError::DeserializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_PERSISTENCE_PAYLOAD_SIZE
        )));
    }

    PersistenceHeader::from_bytes(bytes)?.validate()?;

    let payload = bytes.get(HEADER_LEN..).unwrap_or_default();
    postcard::from_bytes(payload).map_err(|e| {
        SettrackError::DeserializationError(format!("Failed to deserialize dataset: {e}"))
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{Metric, MetricType};
    use crate::storage::CaptureRun;
    use crate::types::{HostProfile, RawSetting, ReleaseType};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn sample() -> Dataset {
        let date = NaiveDate::from_ymd_opt(2024, 2, 1).expect("valid date");
        let host = HostProfile::new(4, 8 << 30);
        let at = Utc
            .with_ymd_and_hms(2024, 2, 2, 0, 0, 0)
            .single()
            .expect("valid timestamp");
        Dataset {
            releases: vec![Release::new("v24.1.0-beta.1", ReleaseType::Testing, date, "v24.1")],
            captures: vec![Capture {
                run: CaptureRun {
                    release_name: "v24.1.0-beta.1".to_string(),
                    host,
                    captured_at: at,
                    settings: 1,
                },
                settings: vec![RawSetting {
                    release_name: "v24.1.0-beta.1".to_string(),
                    host,
                    variable: "sql.stats.automatic_collection.enabled".to_string(),
                    value: "true".to_string(),
                    setting_type: "b".to_string(),
                    public: true,
                    description: "automatic statistics collection mode".to_string(),
                    default_value: "true".to_string(),
                    origin: "default".to_string(),
                    key: "sql.stats.automatic_collection.enabled".to_string(),
                }],
            }],
            metrics: vec![ReleaseMetrics {
                release: "v24.1.0-beta.1".to_string(),
                metrics: vec![Metric::new("sql_conns", "conns", MetricType::Gauge)],
            }],
            summaries: Vec::new(),
        }
    }

    #[test]
    fn header_roundtrip() {
        let bytes = PersistenceHeader::new().to_bytes();
        let restored = PersistenceHeader::from_bytes(&bytes).expect("parse header");
        assert_eq!(restored.magic, *primitives::MAGIC_BYTES);
        assert_eq!(restored.version, primitives::FORMAT_VERSION);
    }

    #[test]
    fn save_load_save_is_bit_exact() {
        let bytes1 = dataset_to_bytes(&sample()).expect("first serialize");
        let restored = dataset_from_bytes(&bytes1).expect("deserialize");
        assert_eq!(restored, sample());
        let bytes2 = dataset_to_bytes(&restored).expect("second serialize");
        assert_eq!(bytes1, bytes2);
        assert_eq!(&bytes1[0..4], b"STRK");
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = dataset_to_bytes(&sample()).expect("serialize");
        bytes[0..4].copy_from_slice(b"KREM");
        assert!(matches!(
            dataset_from_bytes(&bytes),
            Err(SettrackError::DeserializationError(msg)) if msg.contains("magic")
        ));
    }

    #[test]
    fn future_version_rejected() {
        let mut bytes = dataset_to_bytes(&sample()).expect("serialize");
        bytes[4] = primitives::FORMAT_VERSION + 1;
        assert!(dataset_from_bytes(&bytes).is_err());
    }

    #[test]
    fn truncated_data_rejected() {
        assert!(dataset_from_bytes(b"STR").is_err());
        let bytes = dataset_to_bytes(&sample()).expect("serialize");
        assert!(dataset_from_bytes(&bytes[..bytes.len() / 2]).is_err());
    }

    #[test]
    fn dataset_helpers() {
        let dataset = sample();
        assert_eq!(dataset.raw_setting_count(), 1);
    }
}
