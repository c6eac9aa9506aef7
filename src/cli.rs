//! CLI argument parsing and command dispatch

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;
use model_sync::defaults::ENV_CONFIG;
use model_sync::output::OutputConfig;

/// Model Sync - Keep a model document synchronized with a git repository
#[derive(Parser, Debug)]
#[command(name = "model-sync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Path to the settings file
    #[arg(long, global = true, value_name = "PATH", env = ENV_CONFIG)]
    config: Option<PathBuf>,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Export the model and commit local changes
    Commit(commands::sync::SyncArgs),

    /// Commit local changes, then merge changes from the remote
    Refresh(commands::sync::SyncArgs),

    /// Commit, merge from the remote, then push
    Publish(commands::sync::SyncArgs),

    /// Create a repository for a model and push it to a remote
    Create(commands::create::CreateArgs),

    /// Discard local changes and reload the model from the last commit
    Abort(commands::abort::AbortArgs),

    /// Show the synchronization state of a repository
    Status(commands::status::StatusArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        let _ = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(self.log_level.as_str()),
        )
        .format_timestamp(None)
        .try_init();

        let output = OutputConfig::from_env_and_flag(&self.color);
        let settings = commands::load_settings(self.config.as_deref())?;

        match self.command {
            Commands::Commit(args) => {
                commands::sync::execute(model_sync::process::ProcessKind::Commit, args, &settings, &output)
            }
            Commands::Refresh(args) => {
                commands::sync::execute(model_sync::process::ProcessKind::Refresh, args, &settings, &output)
            }
            Commands::Publish(args) => {
                commands::sync::execute(model_sync::process::ProcessKind::Publish, args, &settings, &output)
            }
            Commands::Create(args) => commands::create::execute(args, &settings, &output),
            Commands::Abort(args) => commands::abort::execute(args, &settings, &output),
            Commands::Status(args) => commands::status::execute(args, &settings),
        }
    }
}
