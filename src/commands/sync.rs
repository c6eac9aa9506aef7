//! Commit, refresh and publish commands
//!
//! All three share the same arguments and run a [`SyncProcess`] of the
//! matching kind:
//! - **commit** exports the model and commits local changes.
//! - **refresh** also merges changes from the remote.
//! - **publish** also pushes every local branch.
//!
//! The command fails when the run reported any error, so scripts can rely on
//! the exit code.

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use anyhow::Result;
use clap::Args;
use model_sync::config::SyncConfig;
use model_sync::defaults::ENV_PASSWORD;
use model_sync::document::YamlDocument;
use model_sync::output::OutputConfig;
use model_sync::process::{ProcessKind, PullOutcome, SyncProcess};
use model_sync::repository::GitRepository;
use model_sync::transport::{Credentials, DefaultTransportProvider};

use super::console::{spinner, ConflictMode, ConsoleListener, SpinnerProgress};

/// Arguments shared by the commit, refresh and publish commands
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Model file to synchronize
    #[arg(short, long, value_name = "PATH")]
    pub document: PathBuf,

    /// Repository working directory
    #[arg(short, long, value_name = "PATH", default_value = ".")]
    pub repo: PathBuf,

    /// Commit message for local changes
    #[arg(short, long, default_value = "Update model")]
    pub message: String,

    /// Amend the previous commit instead of creating a new one
    #[arg(long)]
    pub amend: bool,

    /// How to handle merge conflicts
    #[arg(long, value_enum, default_value_t = ConflictMode::Ask)]
    pub on_conflict: ConflictMode,

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

impl SyncArgs {
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.username, &self.password) {
            (None, None) => None,
            (username, password) => Some(Credentials::new(
                username.clone().unwrap_or_default(),
                password.clone().unwrap_or_default(),
            )),
        }
    }
}

/// Execute a synchronization command
pub fn execute(kind: ProcessKind, args: SyncArgs, settings: &SyncConfig, output: &OutputConfig) -> Result<()> {
    let bar = spinner(args.quiet);
    let listener = ConsoleListener::new(output.clone(), bar.clone(), args.on_conflict, args.quiet);
    let errors = listener.error_count();

    let repository = GitRepository::new(&args.repo, settings.clone());
    let mut process = SyncProcess::new(
        kind,
        Some(Box::new(repository)),
        Box::new(YamlDocument::new(&args.document)),
        Box::new(listener),
    )
    .with_progress(Box::new(SpinnerProgress::new(bar.clone())))
    .with_transport(Box::new(DefaultTransportProvider::new(settings)))
    .with_commit_message(args.message.clone(), args.amend)
    .with_resolution(args.on_conflict.policy());
    process.set_credentials(args.credentials());

    let outcome = process.run();
    bar.finish_and_clear();

    let failures = errors.load(Ordering::SeqCst);
    if failures > 0 {
        anyhow::bail!("{} finished with {} error(s)", kind, failures);
    }
    if outcome == Some(PullOutcome::MergeCancelled) {
        anyhow::bail!("{} cancelled: merge conflicts were not resolved", kind);
    }
    Ok(())
}
