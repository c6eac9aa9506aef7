//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `model-sync` command-line tool. Each subcommand is defined in its own file
//! to keep the logic separated and maintainable.
//!
//! ## Structure
//!
//! Each command module typically contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and performs the
//!   command's logic.
//!
//! The terminal side of a synchronization run, event printing, conflict
//! prompts and the progress spinner, lives in `console`.

pub mod abort;
pub mod console;
pub mod create;
pub mod status;
pub mod sync;

use std::path::Path;

use anyhow::{Context, Result};
use model_sync::config::{self, SyncConfig};
use model_sync::defaults::default_config_path;

/// Load user settings from `path`, or from the default location.
pub fn load_settings(path: Option<&Path>) -> Result<SyncConfig> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    config::from_file(&path).with_context(|| format!("Failed to load settings from {}", path.display()))
}
