//! # redb-backed Store
//!
//! A disk-backed store using the redb embedded database:
//! - ACID transactions (a capture's run and settings commit together)
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! Values are postcard-encoded. Capture keys are
//! `(release_name, cpu, memory_bytes)`, so a release's captures are one
//! contiguous range.

use super::{Capture, CaptureRun, ReleaseMetrics, SnapshotStore, select_raw_settings};
use crate::metrics::Metric;
use crate::providers::{MetricsProvider, ReleaseProvider, ReleaseSelector, SettingsProvider};
use crate::provenance::Summary;
use crate::release::Release;
use crate::types::{HostProfile, RawSetting, SettrackError};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::ops::RangeBounds;
use std::path::{Path, PathBuf};

/// A table keyed by name holding postcard values.
type NamedTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Table for releases: release name -> serialized Release
const RELEASES: NamedTable = TableDefinition::new("releases");

/// Table for capture runs: (release, cpu, memory) -> serialized CaptureRun
const CAPTURE_RUNS: TableDefinition<(&str, u32, u64), &[u8]> =
    TableDefinition::new("capture_runs");

/// Table for captured settings: (release, cpu, memory) -> serialized Vec<RawSetting>
const RAW_SETTINGS: TableDefinition<(&str, u32, u64), &[u8]> =
    TableDefinition::new("raw_settings");

/// Table for metrics: release name -> serialized Vec<Metric>
const METRICS: NamedTable = TableDefinition::new("metrics");

/// Table for summaries: variable -> serialized Summary
const SUMMARIES: NamedTable = TableDefinition::new("summaries");

fn storage_err(e: impl std::fmt::Display) -> SettrackError {
    SettrackError::StorageError(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, SettrackError> {
    postcard::to_allocvec(value).map_err(|e| SettrackError::SerializationError(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SettrackError> {
    postcard::from_bytes(bytes).map_err(|e| SettrackError::DeserializationError(e.to_string()))
}

/// A disk-backed store using redb.
pub struct RedbStore {
    db: Database,
    path: PathBuf,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SettrackError> {
        let path = path.as_ref().to_path_buf();
        let db = Database::create(&path).map_err(storage_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(storage_err)?;
            let _ = write_txn.open_table(RELEASES).map_err(storage_err)?;
            let _ = write_txn.open_table(CAPTURE_RUNS).map_err(storage_err)?;
            let _ = write_txn.open_table(RAW_SETTINGS).map_err(storage_err)?;
            let _ = write_txn.open_table(METRICS).map_err(storage_err)?;
            let _ = write_txn.open_table(SUMMARIES).map_err(storage_err)?;
            write_txn.commit().map_err(storage_err)?;
        }

        Ok(Self { db, path })
    }

    /// Decode every value of a string-keyed table, in key order.
    fn read_all<T: DeserializeOwned>(&self, table: NamedTable) -> Result<Vec<T>, SettrackError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(table).map_err(storage_err)?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(storage_err)? {
            let (_, value) = entry.map_err(storage_err)?;
            out.push(decode(value.value())?);
        }
        Ok(out)
    }

    /// Captures whose key falls in `range`, joined with their settings.
    fn collect_captures<'r>(
        &self,
        range: impl RangeBounds<(&'r str, u32, u64)> + 'r,
    ) -> Result<Vec<Capture>, SettrackError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let runs = read_txn.open_table(CAPTURE_RUNS).map_err(storage_err)?;
        let settings = read_txn.open_table(RAW_SETTINGS).map_err(storage_err)?;

        let mut captures = Vec::new();
        for entry in runs.range(range).map_err(storage_err)? {
            let (key, value) = entry.map_err(storage_err)?;
            let run: CaptureRun = decode(value.value())?;
            let rows: Vec<RawSetting> = match settings.get(key.value()).map_err(storage_err)? {
                Some(data) => decode(data.value())?,
                None => Vec::new(),
            };
            captures.push(Capture {
                run,
                settings: rows,
            });
        }
        Ok(captures)
    }
}

impl ReleaseProvider for RedbStore {
    fn releases(&self) -> Result<Vec<Release>, SettrackError> {
        self.read_all(RELEASES)
    }
}

impl SettingsProvider for RedbStore {
    fn raw_settings(&self, selector: &ReleaseSelector) -> Result<Vec<RawSetting>, SettrackError> {
        select_raw_settings(self, selector)
    }
}

impl MetricsProvider for RedbStore {
    fn metrics(&self, release: &str) -> Result<Vec<Metric>, SettrackError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(METRICS).map_err(storage_err)?;
        match table.get(release).map_err(storage_err)? {
            Some(data) => decode(data.value()),
            None => Ok(Vec::new()),
        }
    }
}

impl SnapshotStore for RedbStore {
    fn save_releases(&mut self, releases: &[Release]) -> Result<usize, SettrackError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut table = write_txn.open_table(RELEASES).map_err(storage_err)?;
            for release in releases {
                let bytes = encode(release)?;
                table
                    .insert(release.name.as_str(), bytes.as_slice())
                    .map_err(storage_err)?;
            }
        }
        write_txn.commit().map_err(storage_err)?;
        Ok(releases.len())
    }

    fn put_capture(&mut self, capture: Capture) -> Result<(), SettrackError> {
        let key = (
            capture.run.release_name.as_str(),
            capture.run.host.cpu,
            capture.run.host.memory_bytes,
        );
        let run_bytes = encode(&capture.run)?;
        let settings_bytes = encode(&capture.settings)?;

        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut runs = write_txn.open_table(CAPTURE_RUNS).map_err(storage_err)?;
            let mut settings = write_txn.open_table(RAW_SETTINGS).map_err(storage_err)?;
            runs.insert(key, run_bytes.as_slice()).map_err(storage_err)?;
            settings
                .insert(key, settings_bytes.as_slice())
                .map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;
        Ok(())
    }

    fn captures(&self) -> Result<Vec<Capture>, SettrackError> {
        self.collect_captures(..)
    }

    fn captures_for_release(&self, release: &str) -> Result<Vec<Capture>, SettrackError> {
        self.collect_captures((release, 0, 0)..=(release, u32::MAX, u64::MAX))
    }

    fn capture_runs(&self) -> Result<Vec<CaptureRun>, SettrackError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(CAPTURE_RUNS).map_err(storage_err)?;
        let mut runs = Vec::new();
        for entry in table.iter().map_err(storage_err)? {
            let (_, value) = entry.map_err(storage_err)?;
            runs.push(decode(value.value())?);
        }
        Ok(runs)
    }

    fn capture_exists(&self, release: &str, host: HostProfile) -> Result<bool, SettrackError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(CAPTURE_RUNS).map_err(storage_err)?;
        let found = table
            .get((release, host.cpu, host.memory_bytes))
            .map_err(storage_err)?;
        Ok(found.is_some())
    }

    fn put_metrics(&mut self, release: &str, metrics: &[Metric]) -> Result<usize, SettrackError> {
        let bytes = encode(&metrics)?;
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut table = write_txn.open_table(METRICS).map_err(storage_err)?;
            table
                .insert(release, bytes.as_slice())
                .map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;
        Ok(metrics.len())
    }

    fn metric_sets(&self) -> Result<Vec<ReleaseMetrics>, SettrackError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(METRICS).map_err(storage_err)?;
        let mut sets = Vec::new();
        for entry in table.iter().map_err(storage_err)? {
            let (key, value) = entry.map_err(storage_err)?;
            sets.push(ReleaseMetrics {
                release: key.value().to_string(),
                metrics: decode(value.value())?,
            });
        }
        Ok(sets)
    }

    fn save_summaries(&mut self, summaries: &[Summary]) -> Result<usize, SettrackError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let written = {
            let mut table = write_txn.open_table(SUMMARIES).map_err(storage_err)?;
            table.retain(|_, _| false).map_err(storage_err)?;
            for summary in summaries {
                let bytes = encode(summary)?;
                table
                    .insert(summary.variable.as_str(), bytes.as_slice())
                    .map_err(storage_err)?;
            }
            table.len().map_err(storage_err)?
        };
        write_txn.commit().map_err(storage_err)?;
        Ok(written as usize)
    }

    fn summaries(&self) -> Result<Vec<Summary>, SettrackError> {
        self.read_all(SUMMARIES)
    }

    fn summary(&self, variable: &str) -> Result<Option<Summary>, SettrackError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(SUMMARIES).map_err(storage_err)?;
        match table.get(variable).map_err(storage_err)? {
            Some(data) => decode(data.value()).map(Some),
            None => Ok(None),
        }
    }
}
