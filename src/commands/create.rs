//! Create command implementation
//!
//! Creates a repository for a model in an empty directory, commits the
//! exported model as the initial commit and pushes it to the remote.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use model_sync::config::SyncConfig;
use model_sync::defaults::ENV_PASSWORD;
use model_sync::document::YamlDocument;
use model_sync::output::{emoji, OutputConfig};
use model_sync::process::{create_repository, NewRepository};
use model_sync::transport::{Credentials, DefaultTransportProvider};

use super::console::{spinner, ConflictMode, ConsoleListener, SpinnerProgress};

/// Arguments for the create command
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Remote repository URL
    #[arg(value_name = "URL")]
    pub url: String,

    /// Model file to export
    #[arg(short, long, value_name = "PATH")]
    pub document: PathBuf,

    /// Directory for the new working copy (must be empty or missing)
    #[arg(short, long, value_name = "PATH")]
    pub repo: PathBuf,

    /// Username for HTTP remotes
    #[arg(short, long)]
    pub username: Option<String>,

    /// Password for HTTP remotes
    #[arg(long, env = ENV_PASSWORD, hide_env_values = true)]
    pub password: Option<String>,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Execute the create command
pub fn execute(args: CreateArgs, settings: &SyncConfig, output: &OutputConfig) -> Result<()> {
    let credentials = match (&args.username, &args.password) {
        (None, None) => None,
        (username, password) => Some(Credentials::new(
            username.clone().unwrap_or_default(),
            password.clone().unwrap_or_default(),
        )),
    };
    let target = NewRepository {
        local_dir: args.repo.clone(),
        url: args.url.clone(),
        config: settings.clone(),
        credentials,
    };

    let bar = spinner(args.quiet);
    let listener = ConsoleListener::new(output.clone(), bar.clone(), ConflictMode::Abandon, args.quiet);
    let result = create_repository(
        &target,
        &YamlDocument::new(&args.document),
        &listener,
        &DefaultTransportProvider::new(settings),
        &SpinnerProgress::new(bar.clone()),
    );
    bar.finish_and_clear();

    result?;
    if !args.quiet {
        println!(
            "{} Created repository at {} for {}",
            emoji(output, "✅", "[OK]"),
            args.repo.display(),
            args.url
        );
    }
    Ok(())
}
