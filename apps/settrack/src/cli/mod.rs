//! # settrack CLI Module
//!
//! This module implements the CLI interface for settrack.
//!
//! ## Available Commands
//!
//! - `init` - Initialize a new database
//! - `status` - Show store row counts
//! - `server` - Start the HTTP server
//! - `releases update|list|majors` - Maintain and inspect the release catalog
//! - `settings import|list|compare|summarize|summary|detail` - Captured settings
//! - `metrics import|compare` - Exported metrics
//! - `export` / `import` - Move a dataset between databases

mod commands;

use crate::config::{Config, Overrides};
use clap::{Parser, Subcommand, ValueEnum};
use settrack_core::{BackendKind, SettrackError, SortBy};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// settrack - release settings provenance
///
/// Tracks how cluster settings and metrics change across database releases.
#[derive(Parser, Debug)]
#[command(name = "settrack")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress informational output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a TOML config file (default: settrack.toml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the database
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend
    #[arg(short = 'B', long, global = true, value_enum)]
    pub backend: Option<BackendArg>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// `--backend` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    /// ACID redb database
    Redb,
    /// In-memory store saved to a dataset file
    Memory,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Redb => Self::Redb,
            BackendArg::Memory => Self::Memory,
        }
    }
}

/// `--sort` values for `releases list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SortArg {
    #[default]
    Version,
    VersionDesc,
    Date,
}

impl From<SortArg> for SortBy {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Version => Self::VersionAsc,
            SortArg::VersionDesc => Self::VersionDesc,
            SortArg::Date => Self::DateAsc,
        }
    }
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new empty database
    Init {
        /// Overwrite an existing database
        #[arg(short, long)]
        force: bool,
    },

    /// Show store row counts
    Status,

    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Release catalog
    Releases {
        #[command(subcommand)]
        command: ReleasesCommand,
    },

    /// Captured cluster settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },

    /// Exported metrics
    Metrics {
        #[command(subcommand)]
        command: MetricsCommand,
    },

    /// Export the whole store to a dataset file
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Merge a dataset file into the store
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum ReleasesCommand {
    /// Fetch the release feed and store its releases
    Update {
        /// Feed URL (default: config `feed_url`)
        #[arg(long)]
        url: Option<String>,
    },

    /// List stored releases
    List {
        #[arg(short, long, value_enum, default_value_t = SortArg::Version)]
        sort: SortArg,

        /// Leave out withdrawn and cloud-only releases
        #[arg(long)]
        current: bool,
    },

    /// Show releases grouped by major version
    Majors,
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    /// Import a JSON capture of the cluster settings table for a release
    Import {
        /// Release the capture was taken on
        #[arg(short, long)]
        release: String,

        /// JSON array of cluster setting rows
        #[arg(short, long)]
        file: PathBuf,

        /// CPU count of the capture host (default: this machine)
        #[arg(long)]
        cpu: Option<u32>,

        /// Total memory of the capture host in bytes (default: this machine)
        #[arg(long)]
        memory_bytes: Option<u64>,

        /// Replace an existing capture for the same release and host
        #[arg(long)]
        force: bool,
    },

    /// List the settings of a release
    List {
        #[arg(short, long)]
        release: String,
    },

    /// Compare the settings of two releases
    Compare { r1: String, r2: String },

    /// Recompute and store summaries for every setting
    Summarize,

    /// Show stored summaries, or one setting's summary
    Summary { variable: Option<String> },

    /// Show the releases a setting appears in
    Detail { variable: String },
}

#[derive(Subcommand, Debug)]
pub enum MetricsCommand {
    /// Import a Prometheus text exposition for a release
    Import {
        #[arg(short, long)]
        release: String,

        #[arg(short, long)]
        file: PathBuf,
    },

    /// Compare the metrics of two releases
    Compare { r1: String, r2: String },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Resolve configuration for `cli`: flags over env over file over defaults.
pub fn resolve_config(cli: &Cli) -> Result<Config, SettrackError> {
    let mut config = Config::load(cli.config.as_deref())?;
    let (host, port) = match &cli.command {
        Some(Commands::Server { host, port }) => (host.clone(), *port),
        _ => (None, None),
    };
    let feed_url = match &cli.command {
        Some(Commands::Releases {
            command: ReleasesCommand::Update { url },
        }) => url.clone(),
        _ => None,
    };
    config.apply_overrides(Overrides {
        database: cli.database.clone(),
        backend: cli.backend.map(BackendKind::from),
        feed_url,
        host,
        port,
    });
    Ok(config)
}

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), SettrackError> {
    let config = resolve_config(&cli)?;
    let ctx = Context {
        config,
        json_mode: cli.json_mode,
        quiet: cli.quiet,
    };

    match cli.command {
        Some(Commands::Init { force }) => cmd_init(&ctx, force),
        Some(Commands::Status) | None => cmd_status(&ctx),
        Some(Commands::Server { .. }) => cmd_server(&ctx).await,
        Some(Commands::Releases { command }) => match command {
            ReleasesCommand::Update { .. } => cmd_releases_update(&ctx).await,
            ReleasesCommand::List { sort, current } => {
                cmd_releases_list(&ctx, sort.into(), current)
            }
            ReleasesCommand::Majors => cmd_releases_majors(&ctx),
        },
        Some(Commands::Settings { command }) => match command {
            SettingsCommand::Import {
                release,
                file,
                cpu,
                memory_bytes,
                force,
            } => cmd_settings_import(&ctx, &release, &file, cpu, memory_bytes, force),
            SettingsCommand::List { release } => cmd_settings_list(&ctx, &release),
            SettingsCommand::Compare { r1, r2 } => cmd_settings_compare(&ctx, &r1, &r2),
            SettingsCommand::Summarize => cmd_settings_summarize(&ctx),
            SettingsCommand::Summary { variable } => {
                cmd_settings_summary(&ctx, variable.as_deref())
            }
            SettingsCommand::Detail { variable } => cmd_settings_detail(&ctx, &variable),
        },
        Some(Commands::Metrics { command }) => match command {
            MetricsCommand::Import { release, file } => cmd_metrics_import(&ctx, &release, &file),
            MetricsCommand::Compare { r1, r2 } => cmd_metrics_compare(&ctx, &r1, &r2),
        },
        Some(Commands::Export { output }) => cmd_export(&ctx, &output),
        Some(Commands::Import { input }) => cmd_import(&ctx, &input),
    }
}
