//! # Repository Handle
//!
//! This module provides the repository side of synchronization: a handle on
//! a local working copy, optionally bound to a remote, exposing commit, pull,
//! push, branch-status and checksum operations as atomic capabilities.
//!
//! ## Design
//!
//! The synchronization process talks to the repository through the
//! **`RepositoryOperations`** trait rather than to libgit2 directly. In the
//! application, [`GitRepository`] implements it on top of the functions in
//! [`crate::git`]. In tests, the trait is implemented by mocks that script
//! merge outcomes and record calls, so the orchestration logic can be
//! exercised without real repositories or network access.
//!
//! Results of git operations are reported with small value types
//! (`MergeOutcome`, `BranchStatus`, `RefUpdate`) rather than libgit2 objects,
//! which keeps the orchestrator independent of the engine.

use std::path::{Path, PathBuf};

use git2::Oid;

use crate::config::SyncConfig;
use crate::conflict::{ConflictHandler, GitConflictHandler, ResolutionPolicy};
use crate::error::{Error, Result};
use crate::progress::ProgressSink;
use crate::transport::TransportConfig;

/// A branch reference with its full and short names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRef {
    full_name: String,
    short_name: String,
}

impl BranchRef {
    /// Build from a full reference name such as `refs/heads/main`.
    pub fn new(full_name: impl Into<String>) -> Self {
        let full_name = full_name.into();
        let short_name = ["refs/heads/", "refs/remotes/", "refs/tags/"]
            .iter()
            .find_map(|prefix| full_name.strip_prefix(prefix))
            .unwrap_or(&full_name)
            .to_string();
        Self {
            full_name,
            short_name,
        }
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }
}

/// Snapshot of the current local branch and its remote-tracking branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchStatus {
    pub local: BranchRef,
    /// `None` when the branch has no remote-tracking counterpart.
    pub remote: Option<BranchRef>,
}

/// What the engine reported for a fetch + merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStatus {
    /// Nothing to merge.
    AlreadyUpToDate,
    /// The local branch moved forward to the remote head.
    FastForward,
    /// A merge commit was created without conflicts.
    Merged,
    /// The merge stopped with conflicts recorded in the index.
    Conflicting,
    /// The remote does not have the current branch.
    RefNotAdvertised,
}

/// Result of a pull at the engine level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub status: MergeStatus,
    /// Remote-tracking references the fetch moved.
    pub tracking_refs_updated: usize,
    /// Local branch head before the merge.
    pub local_head: Option<Oid>,
    /// Remote-tracking head that was merged.
    pub remote_head: Option<Oid>,
}

impl MergeOutcome {
    pub fn is_successful(&self) -> bool {
        self.status != MergeStatus::Conflicting
    }
}

/// Status of one pushed reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefUpdateStatus {
    Ok,
    UpToDate,
    /// The remote refused the update, with its message.
    Rejected(String),
}

/// Outcome of pushing one reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefUpdate {
    pub ref_name: String,
    pub status: RefUpdateStatus,
}

impl RefUpdate {
    /// Message describing the failure, if this update did not go through.
    pub fn failure_message(&self) -> Option<String> {
        match &self.status {
            RefUpdateStatus::Ok | RefUpdateStatus::UpToDate => None,
            RefUpdateStatus::Rejected(message) => Some(format!("{}: {}", self.ref_name, message)),
        }
    }
}

/// Repository capabilities consumed by the synchronization process
pub trait RepositoryOperations: Send {
    /// Root of the working tree.
    fn local_directory(&self) -> &Path;

    /// URL of the bound remote, if any.
    fn remote_url(&self) -> Option<&str>;

    /// Whether the working tree differs from the last commit.
    fn has_uncommitted_changes(&self) -> Result<bool>;

    /// Commit every change in the working tree.
    fn commit(&self, message: &str, amend: bool) -> Result<()>;

    /// Fetch from the remote and merge into the current branch.
    fn pull(&self, transport: &TransportConfig, progress: &dyn ProgressSink) -> Result<MergeOutcome>;

    /// Push all local branches.
    fn push(&self, transport: &TransportConfig, progress: &dyn ProgressSink) -> Result<Vec<RefUpdate>>;

    /// Current local and remote-tracking branch.
    fn branch_status(&self) -> Result<BranchStatus>;

    /// Persist a checksum of the exported working tree.
    fn save_checksum(&self) -> Result<()>;

    /// Whether the working tree changed since the checksum was saved.
    fn checksum_changed(&self) -> Result<bool>;

    /// Discard working tree changes by resetting to `refname`.
    fn reset_to_ref(&self, refname: &str) -> Result<()>;

    /// Start a conflict handling session for a conflicting merge.
    fn open_conflict_session(
        &self,
        merge: &MergeOutcome,
        remote_ref: &str,
        policy: ResolutionPolicy,
    ) -> Result<Box<dyn ConflictHandler>>;
}

/// A working copy handled through libgit2
#[derive(Debug, Clone)]
pub struct GitRepository {
    local_dir: PathBuf,
    remote_url: Option<String>,
    config: SyncConfig,
}

impl GitRepository {
    /// Create a handle on `local_dir`. The remote URL is read once, now.
    ///
    /// The directory is not required to exist; a process built on a handle
    /// whose directory is missing is disabled.
    pub fn new(local_dir: impl Into<PathBuf>, config: SyncConfig) -> Self {
        let local_dir = local_dir.into();
        let remote_url = crate::git::remote_url(&local_dir, &config.remote_name);
        Self {
            local_dir,
            remote_url,
            config,
        }
    }

    /// Initialise a new repository in `local_dir` bound to `url`.
    pub fn create(local_dir: impl Into<PathBuf>, url: &str, config: SyncConfig) -> Result<Self> {
        let local_dir = local_dir.into();
        crate::git::init_with_remote(&local_dir, &config.remote_name, url)?;
        Ok(Self {
            local_dir,
            remote_url: Some(url.to_string()),
            config,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn open(&self) -> Result<git2::Repository> {
        crate::git::open(&self.local_dir)
    }
}

impl RepositoryOperations for GitRepository {
    fn local_directory(&self) -> &Path {
        &self.local_dir
    }

    fn remote_url(&self) -> Option<&str> {
        self.remote_url.as_deref()
    }

    fn has_uncommitted_changes(&self) -> Result<bool> {
        crate::git::has_uncommitted_changes(&self.open()?)
    }

    fn commit(&self, message: &str, amend: bool) -> Result<()> {
        let repo = self.open()?;
        let signature = crate::git::signature(&repo, &self.config)?;
        crate::git::commit_all(&repo, &signature, message, amend)?;
        Ok(())
    }

    fn pull(&self, transport: &TransportConfig, progress: &dyn ProgressSink) -> Result<MergeOutcome> {
        let repo = self.open()?;
        let signature = crate::git::signature(&repo, &self.config)?;
        crate::git::pull(&repo, &self.config.remote_name, transport, &signature, progress)
    }

    fn push(&self, transport: &TransportConfig, progress: &dyn ProgressSink) -> Result<Vec<RefUpdate>> {
        let repo = self.open()?;
        progress.sub_task("Pushing to remote");
        crate::git::push_branches(&repo, &self.config.remote_name, transport)
    }

    fn branch_status(&self) -> Result<BranchStatus> {
        crate::git::branch_status(&self.open()?, &self.config.remote_name)
    }

    fn save_checksum(&self) -> Result<()> {
        crate::git::save_checksum(&self.open()?)
    }

    fn checksum_changed(&self) -> Result<bool> {
        crate::git::checksum_changed(&self.open()?)
    }

    fn reset_to_ref(&self, refname: &str) -> Result<()> {
        crate::git::reset_hard(&self.open()?, refname)
    }

    fn open_conflict_session(
        &self,
        merge: &MergeOutcome,
        remote_ref: &str,
        policy: ResolutionPolicy,
    ) -> Result<Box<dyn ConflictHandler>> {
        let (Some(local_head), Some(remote_head)) = (merge.local_head, merge.remote_head) else {
            return Err(Error::git(
                "merge",
                git2::Error::from_str("merge result does not name both heads"),
            ));
        };
        let repo = self.open()?;
        let signature = crate::git::signature(&repo, &self.config)?;
        Ok(Box::new(GitConflictHandler::new(
            repo,
            remote_ref,
            local_head,
            remote_head,
            &signature,
            policy,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_branch_ref_short_names() {
        assert_eq!(BranchRef::new("refs/heads/main").short_name(), "main");
        assert_eq!(
            BranchRef::new("refs/heads/feature/login").short_name(),
            "feature/login"
        );
        assert_eq!(
            BranchRef::new("refs/remotes/origin/main").short_name(),
            "origin/main"
        );
        assert_eq!(BranchRef::new("HEAD").short_name(), "HEAD");
        assert_eq!(
            BranchRef::new("refs/heads/main").full_name(),
            "refs/heads/main"
        );
    }

    #[test]
    fn test_merge_outcome_success() {
        let mut outcome = MergeOutcome {
            status: MergeStatus::Merged,
            tracking_refs_updated: 1,
            local_head: None,
            remote_head: None,
        };
        assert!(outcome.is_successful());
        outcome.status = MergeStatus::Conflicting;
        assert!(!outcome.is_successful());
    }

    #[test]
    fn test_ref_update_failure_message() {
        let ok = RefUpdate {
            ref_name: "refs/heads/main".to_string(),
            status: RefUpdateStatus::Ok,
        };
        let current = RefUpdate {
            ref_name: "refs/heads/main".to_string(),
            status: RefUpdateStatus::UpToDate,
        };
        let rejected = RefUpdate {
            ref_name: "refs/heads/main".to_string(),
            status: RefUpdateStatus::Rejected("non-fast-forward".to_string()),
        };
        assert_eq!(ok.failure_message(), None);
        assert_eq!(current.failure_message(), None);
        assert_eq!(
            rejected.failure_message().as_deref(),
            Some("refs/heads/main: non-fast-forward")
        );
    }

    #[test]
    fn test_handle_on_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let handle = GitRepository::new(temp_dir.path().join("absent"), SyncConfig::default());
        assert!(handle.remote_url().is_none());
        assert!(!handle.local_directory().exists());
    }

    #[test]
    fn test_create_binds_remote() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("model");
        let handle =
            GitRepository::create(&dir, "https://example.com/model.git", SyncConfig::default())
                .unwrap();

        assert_eq!(handle.remote_url(), Some("https://example.com/model.git"));
        let reopened = GitRepository::new(&dir, SyncConfig::default());
        assert_eq!(reopened.remote_url(), Some("https://example.com/model.git"));
    }

    #[test]
    fn test_commit_and_status_through_handle() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("model");
        let config = SyncConfig {
            user_name: Some("Test".to_string()),
            user_email: Some("test@test.com".to_string()),
            ..SyncConfig::default()
        };
        let handle = GitRepository::create(&dir, "/srv/none.git", config).unwrap();

        std::fs::write(dir.join("a.yaml"), "name: A\n").unwrap();
        assert!(handle.has_uncommitted_changes().unwrap());
        handle.commit("first", false).unwrap();
        assert!(!handle.has_uncommitted_changes().unwrap());

        let status = handle.branch_status().unwrap();
        assert!(status.local.full_name().starts_with("refs/heads/"));
        assert!(status.remote.is_none());
    }
}
