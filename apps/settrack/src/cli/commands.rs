//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//!
//! With the `memory` backend the database path holds a dataset file: it is
//! loaded at start and rewritten after every command that changes the store.

use crate::{api, config::Config, feed, host};
use chrono::Utc;
use serde::Serialize;
use settrack_core::formats::MAX_PERSISTENCE_PAYLOAD_SIZE;
use settrack_core::{
    BackendKind, ClusterSetting, Dataset, IgnoreList, Release, ReleaseCatalog, ReleaseProvider,
    ReleaseSelector, SettingsProvider, SettrackError, SnapshotStore, SortBy, Store,
    compare_metrics_from, compare_settings_from, dataset_from_bytes, dataset_to_bytes,
    parse_exposition, setting_detail, summarize_from, summarize_variable,
};
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a settings capture or metrics exposition file (100 MB).
const MAX_INPUT_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum size of a dataset file, matching the format's payload limit.
const MAX_IMPORT_FILE_SIZE: u64 = MAX_PERSISTENCE_PAYLOAD_SIZE as u64;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), SettrackError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| SettrackError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(SettrackError::IoError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve an input path and make sure it names a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, SettrackError> {
    let canonical = path.canonicalize().map_err(|e| {
        SettrackError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(SettrackError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Resolve an output path against its existing parent directory.
fn validate_output_path(path: &Path) -> Result<PathBuf, SettrackError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        SettrackError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(SettrackError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| SettrackError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

/// Read an input file after path and size checks.
fn read_input(path: &Path, max_size: u64) -> Result<Vec<u8>, SettrackError> {
    let validated = validate_file_path(path)?;
    validate_file_size(&validated, max_size)?;
    std::fs::read(&validated).map_err(|e| SettrackError::IoError(format!("Read file: {}", e)))
}

// =============================================================================
// CONTEXT
// =============================================================================

/// Resolved configuration and output flags shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: Config,
    pub json_mode: bool,
    pub quiet: bool,
}

impl Context {
    fn database(&self) -> &Path {
        &self.config.database
    }

    fn ignore(&self) -> IgnoreList {
        self.config.ignore_list()
    }

    /// Print an informational line unless `--quiet` or `--json-mode`.
    fn say(&self, message: impl AsRef<str>) {
        if !self.quiet && !self.json_mode {
            println!("{}", message.as_ref());
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), SettrackError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| SettrackError::SerializationError(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new database.
pub fn cmd_init(ctx: &Context, force: bool) -> Result<(), SettrackError> {
    let db_path = ctx.database();
    if db_path.exists() {
        if !force {
            return Err(SettrackError::IoError(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(db_path)
            .map_err(|e| SettrackError::IoError(format!("Remove old database: {}", e)))?;
    }

    match ctx.config.backend {
        BackendKind::Redb => {
            let _store = Store::with_redb(db_path)?;
            ctx.say(format!("Initialized new redb database at {:?}", db_path));
        }
        BackendKind::Memory => {
            write_dataset(db_path, &Dataset::default())?;
            ctx.say(format!("Initialized new dataset file at {:?}", db_path));
        }
    }
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show store row counts.
pub fn cmd_status(ctx: &Context) -> Result<(), SettrackError> {
    let store = open_store(ctx)?;
    let counts = store.counts()?;

    if ctx.json_mode {
        return print_json(&api::StatusResponse::new(&store, counts));
    }

    println!("settrack Store Status");
    println!("=====================");
    println!("Database: {:?}", ctx.database());
    println!("Backend:  {}", api::backend_name(&store));
    println!();
    println!("Releases:        {}", counts.releases);
    println!("Capture runs:    {}", counts.capture_runs);
    println!("Raw settings:    {}", counts.raw_settings);
    println!("Variables:       {}", counts.variables);
    println!("Metric releases: {}", counts.metric_releases);
    println!("Summaries:       {}", counts.summaries);
    Ok(())
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(ctx: &Context) -> Result<(), SettrackError> {
    let store = open_store(ctx)?;
    let server = &ctx.config.server;

    ctx.say("settrack HTTP server starting...");
    ctx.say(format!("  Host:     {}", server.host));
    ctx.say(format!("  Port:     {}", server.port));
    ctx.say(format!("  Backend:  {}", api::backend_name(&store)));
    ctx.say(format!("  Database: {:?}", ctx.database()));
    ctx.say("Press Ctrl+C to stop");

    let addr = format!("{}:{}", server.host, server.port);
    api::run_server(&addr, store, ctx.ignore()).await
}

// =============================================================================
// RELEASES COMMANDS
// =============================================================================

/// Fetch the release feed and upsert its releases.
pub async fn cmd_releases_update(ctx: &Context) -> Result<(), SettrackError> {
    let parsed = feed::fetch_release_feed(&ctx.config.feed_url).await?;
    let mut store = open_store(ctx)?;
    let saved = store.save_releases(&parsed.releases)?;
    persist(ctx, &store)?;

    if ctx.json_mode {
        return print_json(&serde_json::json!({
            "saved": saved,
            "skipped": parsed.skipped,
        }));
    }
    ctx.say(format!(
        "Saved {} releases ({} skipped)",
        saved,
        parsed.skipped.len()
    ));
    for skipped in &parsed.skipped {
        ctx.say(format!("  skipped {}: {}", skipped.record, skipped.reason));
    }
    Ok(())
}

/// List stored releases.
pub fn cmd_releases_list(ctx: &Context, order: SortBy, current: bool) -> Result<(), SettrackError> {
    let store = open_store(ctx)?;
    let catalog = ReleaseCatalog::new(store.releases()?);
    let catalog = if current { catalog.current() } else { catalog };
    let sorted = catalog.sorted_by(order);

    if ctx.json_mode {
        return print_json(sorted.as_slice());
    }
    for release in sorted.iter() {
        let mut flags = Vec::new();
        if release.withdrawn {
            flags.push("withdrawn");
        }
        if release.cloud_only {
            flags.push("cloud-only");
        }
        println!(
            "{:<24} {:<8} {:<10} {} {}",
            release.name,
            release.major_version,
            release.release_type,
            release.release_date,
            flags.join(",")
        );
    }
    ctx.say(format!("{} releases", sorted.len()));
    Ok(())
}

/// Show releases grouped by major version.
pub fn cmd_releases_majors(ctx: &Context) -> Result<(), SettrackError> {
    let store = open_store(ctx)?;
    let summary = ReleaseCatalog::new(store.releases()?).major_version_summary();

    if ctx.json_mode {
        return print_json(&summary);
    }
    let name = |r: &Option<Release>| {
        r.as_ref().map_or("-".to_string(), |r| r.name.clone())
    };
    for major in &summary.major_versions {
        println!("{} ({} releases)", major.major_version, major.releases.len());
        println!(
            "  testing:    {} .. {}",
            name(&major.first_testing_release),
            name(&major.last_testing_release)
        );
        println!(
            "  production: {} .. {}",
            name(&major.first_production_release),
            name(&major.last_production_release)
        );
    }
    println!("Latest release: {}", name(&summary.latest_release));
    Ok(())
}

// =============================================================================
// SETTINGS COMMANDS
// =============================================================================

/// Import a JSON capture of the cluster settings table.
pub fn cmd_settings_import(
    ctx: &Context,
    release: &str,
    file: &Path,
    cpu: Option<u32>,
    memory_bytes: Option<u64>,
    force: bool,
) -> Result<(), SettrackError> {
    let data = read_input(file, MAX_INPUT_FILE_SIZE)?;
    let settings: Vec<ClusterSetting> = serde_json::from_slice(&data)
        .map_err(|e| SettrackError::DeserializationError(format!("Settings capture: {}", e)))?;

    let host = host::detect_host_profile(cpu, memory_bytes);
    let mut store = open_store(ctx)?;

    if !force && store.capture_exists(release, host)? {
        tracing::info!(
            event = "capture_skipped",
            release,
            cpu = host.cpu,
            "Release already captured on this host profile"
        );
        ctx.say(format!(
            "{} already captured on {}; use --force to replace",
            release, host
        ));
        return Ok(());
    }

    let run = store.save_capture(release, host, &settings, Utc::now())?;
    persist(ctx, &store)?;

    if ctx.json_mode {
        return print_json(&run);
    }
    ctx.say(format!(
        "Imported {} settings for {} on {}",
        run.settings, run.release_name, run.host
    ));
    Ok(())
}

/// List the host-collapsed settings of a release.
pub fn cmd_settings_list(ctx: &Context, release: &str) -> Result<(), SettrackError> {
    let store = open_store(ctx)?;
    store.require_releases(&[release])?;
    let settings = store.release_settings(release)?;

    if ctx.json_mode {
        return print_json(&settings);
    }
    for setting in &settings {
        println!(
            "{:<60} {:<4} {}",
            setting.variable, setting.setting_type, setting.value
        );
    }
    ctx.say(format!("{} settings in {}", settings.len(), release));
    Ok(())
}

/// Compare the settings of two releases.
pub fn cmd_settings_compare(ctx: &Context, r1: &str, r2: &str) -> Result<(), SettrackError> {
    let store = open_store(ctx)?;
    store.require_releases(&[r1, r2])?;
    let compared = compare_settings_from(&store, r1, r2, &ctx.ignore())?.sorted();

    if ctx.json_mode {
        return print_json(&compared);
    }
    println!("Settings {} -> {}", r1, r2);
    for added in &compared.added {
        println!("  + {} = {}", added.variable, added.value);
    }
    for removed in &compared.removed {
        println!("  - {} = {}", removed.variable, removed.value);
    }
    for changed in &compared.changed {
        if changed.before.value != changed.after.value {
            println!(
                "  ~ {}: {} -> {}",
                changed.before.variable, changed.before.value, changed.after.value
            );
        } else {
            println!("  ~ {}: description changed", changed.before.variable);
        }
    }
    ctx.say(format!(
        "{} added, {} removed, {} changed",
        compared.added.len(),
        compared.removed.len(),
        compared.changed.len()
    ));
    Ok(())
}

/// Recompute and store summaries for every setting.
pub fn cmd_settings_summarize(ctx: &Context) -> Result<(), SettrackError> {
    let mut store = open_store(ctx)?;
    let summaries = summarize_from(&store, &ctx.ignore())?;
    let written = store.save_summaries(&summaries)?;
    persist(ctx, &store)?;
    tracing::info!(summaries = written, "Stored setting summaries");

    if ctx.json_mode {
        return print_json(&serde_json::json!({ "summaries": written }));
    }
    ctx.say(format!("Summarized {} settings", written));
    Ok(())
}

/// Show stored summaries, or the summary of one setting.
pub fn cmd_settings_summary(ctx: &Context, variable: Option<&str>) -> Result<(), SettrackError> {
    let store = open_store(ctx)?;
    let summaries = match variable {
        Some(variable) => match store.summary(variable)? {
            Some(summary) => vec![summary],
            None => {
                let raw = store.raw_settings(&ReleaseSelector::All)?;
                let summary =
                    summarize_variable(&raw, &store.releases()?, variable, &ctx.ignore())?
                        .ok_or_else(|| {
                            SettrackError::InvalidSetting(format!(
                                "Setting {} was never captured",
                                variable
                            ))
                        })?;
                vec![summary]
            }
        },
        None => store.summaries()?,
    };

    if ctx.json_mode {
        return match (variable, summaries.first()) {
            (Some(_), Some(summary)) => print_json(summary),
            _ => print_json(&summaries),
        };
    }
    for summary in &summaries {
        println!(
            "{} = {} (first: {}; last: {}{})",
            summary.variable,
            summary.value,
            summary.first_releases.join(", "),
            summary.last_releases.join(", "),
            if summary.host_dependent {
                "; host dependent"
            } else {
                ""
            }
        );
        for change in &summary.value_changes {
            println!("    {}: {} -> {}", change.release, change.from, change.to);
        }
    }
    Ok(())
}

/// Show the releases a setting appears in.
pub fn cmd_settings_detail(ctx: &Context, variable: &str) -> Result<(), SettrackError> {
    let store = open_store(ctx)?;
    let raw = store.raw_settings(&ReleaseSelector::All)?;
    let detail = setting_detail(&raw, &store.releases()?, variable)?.ok_or_else(|| {
        SettrackError::InvalidSetting(format!("Setting {} was never captured", variable))
    })?;

    if ctx.json_mode {
        return print_json(&detail);
    }
    println!("{}", detail.name);
    println!("  {}", detail.description);
    println!("  releases: {}", detail.releases.join(", "));
    Ok(())
}

// =============================================================================
// METRICS COMMANDS
// =============================================================================

/// Import a Prometheus text exposition for a release.
pub fn cmd_metrics_import(ctx: &Context, release: &str, file: &Path) -> Result<(), SettrackError> {
    let data = read_input(file, MAX_INPUT_FILE_SIZE)?;
    let text = String::from_utf8(data)
        .map_err(|e| SettrackError::DeserializationError(format!("Exposition: {}", e)))?;
    let metrics = parse_exposition(&text)?;

    let mut store = open_store(ctx)?;
    let saved = store.save_metrics(release, &metrics)?;
    persist(ctx, &store)?;

    if ctx.json_mode {
        return print_json(&serde_json::json!({ "release": release, "metrics": saved }));
    }
    ctx.say(format!("Imported {} metrics for {}", saved, release));
    Ok(())
}

/// Compare the metrics of two releases.
pub fn cmd_metrics_compare(ctx: &Context, r1: &str, r2: &str) -> Result<(), SettrackError> {
    let store = open_store(ctx)?;
    store.require_releases(&[r1, r2])?;
    let compared = compare_metrics_from(&store, r1, r2)?;

    if ctx.json_mode {
        return print_json(&compared);
    }
    println!("Metrics {} -> {}", r1, r2);
    for added in &compared.added {
        println!("  + {} ({})", added.name, added.metric_type);
    }
    for removed in &compared.removed {
        println!("  - {} ({})", removed.name, removed.metric_type);
    }
    for changed in &compared.changed {
        println!(
            "  ~ {}: {} -> {}",
            changed.before.metric, changed.before.metric_type, changed.after.metric_type
        );
    }
    Ok(())
}

// =============================================================================
// EXPORT / IMPORT COMMANDS
// =============================================================================

/// Export the whole store to a dataset file.
pub fn cmd_export(ctx: &Context, output: &Path) -> Result<(), SettrackError> {
    let validated_output = validate_output_path(output)?;
    let store = open_store(ctx)?;
    let dataset = store.export_dataset()?;
    let size = write_dataset(&validated_output, &dataset)?;

    ctx.say(format!(
        "Exported {} releases, {} captures ({} settings), {} metric sets, {} summaries ({} bytes) to {:?}",
        dataset.releases.len(),
        dataset.captures.len(),
        dataset.raw_setting_count(),
        dataset.metrics.len(),
        dataset.summaries.len(),
        size,
        validated_output
    ));
    Ok(())
}

/// Merge a dataset file into the store.
pub fn cmd_import(ctx: &Context, input: &Path) -> Result<(), SettrackError> {
    let data = read_input(input, MAX_IMPORT_FILE_SIZE)?;
    let dataset = dataset_from_bytes(&data)?;

    let mut store = open_store(ctx)?;
    let counts = store.import_dataset(dataset)?;
    persist(ctx, &store)?;

    if ctx.json_mode {
        return print_json(&counts);
    }
    ctx.say(format!(
        "Imported dataset: store now holds {} releases, {} capture runs, {} summaries",
        counts.releases, counts.capture_runs, counts.summaries
    ));
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open the configured store. A missing dataset file gives an empty store.
pub fn open_store(ctx: &Context) -> Result<Store, SettrackError> {
    let db_path = ctx.database();
    match ctx.config.backend {
        BackendKind::Redb => Store::with_redb(db_path),
        BackendKind::Memory => {
            let mut store = Store::in_memory();
            if db_path.exists() {
                let data = read_input(db_path, MAX_IMPORT_FILE_SIZE)?;
                store.import_dataset(dataset_from_bytes(&data)?)?;
            }
            Ok(store)
        }
    }
}

/// Write the in-memory store back to its dataset file. A no-op for redb.
pub fn persist(ctx: &Context, store: &Store) -> Result<(), SettrackError> {
    if store.is_persistent() {
        return Ok(());
    }
    write_dataset(ctx.database(), &store.export_dataset()?)?;
    Ok(())
}

fn write_dataset(path: &Path, dataset: &Dataset) -> Result<usize, SettrackError> {
    let data = dataset_to_bytes(dataset)?;
    std::fs::write(path, &data)
        .map_err(|e| SettrackError::IoError(format!("Write {:?}: {}", path, e)))?;
    Ok(data.len())
}
