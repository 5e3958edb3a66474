//! # settrack
//!
//! Application layer of settrack: the HTTP API, the CLI, configuration,
//! the release feed client and host detection. All release, settings and
//! metrics logic lives in `settrack-core`.

pub mod api;
pub mod cli;
pub mod config;
pub mod feed;
pub mod host;
