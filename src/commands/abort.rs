//! Abort command implementation
//!
//! Discards every uncommitted change in the working copy and reloads the
//! model from the last commit. Asks for confirmation unless `--yes` is given.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use dialoguer::{theme::ColorfulTheme, Confirm};
use model_sync::config::SyncConfig;
use model_sync::document::YamlDocument;
use model_sync::output::{emoji, OutputConfig};
use model_sync::process::abort_changes;
use model_sync::repository::GitRepository;

use super::console::{ConflictMode, ConsoleListener};

/// Arguments for the abort command
#[derive(Args, Debug)]
pub struct AbortArgs {
    /// Model file to reload
    #[arg(short, long, value_name = "PATH")]
    pub document: PathBuf,

    /// Repository working directory
    #[arg(short, long, value_name = "PATH", default_value = ".")]
    pub repo: PathBuf,

    /// Discard changes without confirmation
    #[arg(short, long)]
    pub yes: bool,
}

/// Execute the abort command
pub fn execute(args: AbortArgs, settings: &SyncConfig, output: &OutputConfig) -> Result<()> {
    if !args.repo.join(".git").exists() {
        anyhow::bail!("Not a repository: {}", args.repo.display());
    }

    if !args.yes {
        let theme = ColorfulTheme::default();
        let proceed = Confirm::with_theme(&theme)
            .with_prompt("Discard all local changes to the model?")
            .default(false)
            .interact()?;
        if !proceed {
            println!("Abort cancelled.");
            return Ok(());
        }
    }

    let repository = GitRepository::new(&args.repo, settings.clone());
    let listener = ConsoleListener::new(
        output.clone(),
        indicatif::ProgressBar::hidden(),
        ConflictMode::Abandon,
        false,
    );
    let restored = abort_changes(&repository, &YamlDocument::new(&args.document), &listener)?;

    if !restored.is_empty() {
        println!(
            "{} Restored objects:\n{}",
            emoji(output, "♻️ ", "[RESTORED]"),
            restored
        );
    }
    Ok(())
}
