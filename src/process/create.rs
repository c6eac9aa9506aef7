//! Creation of a new repository for a document.

use std::fs;
use std::path::PathBuf;

use super::events::{EventKind, EventListener, Notifier};
use crate::config::SyncConfig;
use crate::defaults::INITIAL_COMMIT_MESSAGE;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::progress::ProgressSink;
use crate::repository::{GitRepository, RepositoryOperations};
use crate::transport::{remote_kind, Credentials, TransportProvider, TransportScope};

/// Where and how to create a repository
#[derive(Debug, Clone)]
pub struct NewRepository {
    pub local_dir: PathBuf,
    pub url: String,
    pub config: SyncConfig,
    pub credentials: Option<Credentials>,
}

fn check_target(target: &NewRepository) -> Result<()> {
    if !target.local_dir.exists() {
        return Ok(());
    }
    let fail = |message: &str| Error::RepositoryExists {
        path: target.local_dir.clone(),
        message: message.to_string(),
    };
    if !target.local_dir.is_dir() {
        return Err(fail("path is not a directory"));
    }
    if fs::read_dir(&target.local_dir)?.next().is_some() {
        return Err(fail("directory is not empty"));
    }
    Ok(())
}

/// Create a repository for `document`, commit its initial export and push it
/// to the remote.
///
/// The target directory must be missing or empty. The transport is acquired
/// before anything is written, so bad credentials leave no directory behind.
pub fn create_repository(
    target: &NewRepository,
    document: &dyn Document,
    listener: &dyn EventListener,
    transport: &dyn TransportProvider,
    progress: &dyn ProgressSink,
) -> Result<GitRepository> {
    let notifier = Notifier::new(listener, "Create");
    check_target(target)?;
    remote_kind(&target.url)?;
    let scope = TransportScope::acquire(transport, &target.url, target.credentials.as_ref())?;

    progress.sub_task("Initialising repository");
    let repository = GitRepository::create(&target.local_dir, &target.url, target.config.clone())?;

    progress.sub_task("Exporting model");
    document.export_to_working_tree(repository.local_directory())?;

    notifier.notify(EventKind::StartCommit, "Commit", "Committing initial model");
    repository.commit(INITIAL_COMMIT_MESSAGE, false)?;
    notifier.notify(EventKind::EndCommit, "Commit", "Initial model committed");

    notifier.notify(EventKind::StartPush, "Publish", format!("Publishing to {}", target.url));
    let failures: Vec<String> = repository
        .push(scope.config(), progress)?
        .iter()
        .filter_map(|update| update.failure_message())
        .collect();
    if !failures.is_empty() {
        return Err(Error::Transport {
            url: target.url.clone(),
            message: failures.join("\n"),
        });
    }
    notifier.notify(EventKind::EndPush, "Publish", "Published to remote");

    repository.save_checksum()?;
    log::info!(
        "Created repository at {} for {}",
        target.local_dir.display(),
        target.url
    );
    Ok(repository)
}
