//! # settrack - Release Settings Provenance
//!
//! The main binary for settrack.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for catalog, capture and summary operations
//! - Release feed fetching
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                  apps/settrack (THE BINARY)                  │
//! │                                                              │
//! │  ┌─────────────┐    ┌─────────────┐    ┌────────────────┐   │
//! │  │   CLI       │    │   HTTP API  │    │  Feed client   │   │
//! │  │  (clap)     │    │   (axum)    │    │  (reqwest)     │   │
//! │  └──────┬──────┘    └──────┬──────┘    └───────┬────────┘   │
//! │         │                  │                   │            │
//! │         └──────────────────┼───────────────────┘            │
//! │                            ▼                                │
//! │                   ┌─────────────────┐                       │
//! │                   │  settrack-core  │                       │
//! │                   │  (THE ENGINE)   │                       │
//! │                   └─────────────────┘                       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Fetch the release catalog
//! settrack releases update
//!
//! # Record the settings captured on a release, then summarize
//! settrack settings import -r v23.1.0 -f settings.json
//! settrack settings summarize
//!
//! # Start the HTTP server
//! settrack server --host 0.0.0.0 --port 8080
//! ```

use clap::Parser;
use settrack::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // SETTRACK_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("SETTRACK_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "settrack=debug,settrack_core=debug,tower_http=debug"
    } else {
        "settrack=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the settrack startup banner.
fn print_banner() {
    println!(
        r#"
  settrack v{}
  Release settings provenance
"#,
        env!("CARGO_PKG_VERSION")
    );
}
