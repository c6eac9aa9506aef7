//! Status command implementation
//!
//! Reports the current branch, its remote-tracking branch, whether there are
//! uncommitted changes, and whether the working tree changed since the last
//! synchronization. Never modifies the working copy.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use model_sync::config::SyncConfig;
use model_sync::repository::{GitRepository, RepositoryOperations};
use serde::Serialize;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Repository working directory
    #[arg(short, long, value_name = "PATH", default_value = ".")]
    pub repo: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Synchronization state of a working copy
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatusReport {
    pub branch: String,
    pub remote_branch: Option<String>,
    pub remote_url: Option<String>,
    pub uncommitted_changes: bool,
    pub changed_since_sync: bool,
}

pub fn report(repository: &dyn RepositoryOperations) -> Result<StatusReport> {
    let branch = repository.branch_status()?;
    Ok(StatusReport {
        branch: branch.local.short_name().to_string(),
        remote_branch: branch.remote.map(|remote| remote.short_name().to_string()),
        remote_url: repository.remote_url().map(str::to_string),
        uncommitted_changes: repository.has_uncommitted_changes()?,
        changed_since_sync: repository.checksum_changed()?,
    })
}

/// Execute the status command
pub fn execute(args: StatusArgs, settings: &SyncConfig) -> Result<()> {
    if !args.repo.is_dir() {
        anyhow::bail!("Repository directory not found: {}", args.repo.display());
    }
    let repository = GitRepository::new(&args.repo, settings.clone());
    let report = report(&repository)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Branch:          {}", report.branch);
    println!(
        "Remote branch:   {}",
        report.remote_branch.as_deref().unwrap_or("(none)")
    );
    println!(
        "Remote:          {}",
        report.remote_url.as_deref().unwrap_or("(none)")
    );
    println!(
        "Local changes:   {}",
        if report.uncommitted_changes { "yes" } else { "no" }
    );
    println!(
        "Changed since last sync: {}",
        if report.changed_since_sync { "yes" } else { "no" }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_report_for_new_repository() {
        let temp_dir = TempDir::new().unwrap();
        let repository =
            GitRepository::create(temp_dir.path(), "/srv/model.git", SyncConfig::default()).unwrap();
        fs::write(temp_dir.path().join("a.yaml"), "name: A\n").unwrap();

        let report = report(&repository).unwrap();
        assert_eq!(report.remote_branch, None);
        assert_eq!(report.remote_url.as_deref(), Some("/srv/model.git"));
        assert!(report.uncommitted_changes);
        assert!(report.changed_since_sync);
    }

    #[test]
    fn test_execute_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let args = StatusArgs {
            repo: temp_dir.path().join("absent"),
            json: true,
        };
        let result = execute(args, &SyncConfig::default());
        assert!(result.is_err());
    }
}
