//! # Conflict Handling
//!
//! When a pull stops with conflicts, the synchronization process opens a
//! conflict handling session through the repository. The session is bound to
//! the local head from before the merge and to the remote-tracking branch that
//! was merged, and it supports:
//!
//! - **`initialize`**: read the conflicting paths from the index. This is
//!   the one step that may be cancelled through the progress sink.
//! - **`resolve`**: settle one path by taking the local or remote version.
//! - **`merge`**: finalize the merge commit once every path is settled.
//! - **`reset_to_local_state`**: abandon the merge and restore the working
//!   tree exactly as it was before the pull.
//!
//! Who picks the sides is decided by the caller through a
//! [`ResolutionPolicy`]: an interactive listener resolves each item itself,
//! while headless runs settle everything left open in favour of one side.

use std::fmt;
use std::fs;
use std::path::Path;

use git2::build::CheckoutBuilder;
use git2::{Oid, Repository, ResetType, Signature};

use crate::error::{Error, Result};
use crate::progress::ProgressSink;

/// Which version of a conflicting path to keep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The local version, as committed before the pull.
    Ours,
    /// The version from the remote-tracking branch.
    Theirs,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Ours => write!(f, "local"),
            Side::Theirs => write!(f, "remote"),
        }
    }
}

/// How a session settles conflicts nobody resolved explicitly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionPolicy {
    /// Every conflict must be resolved through [`ConflictHandler::resolve`].
    Interactive,
    /// Unresolved conflicts take the given side when the merge is finalized.
    Prefer(Side),
}

impl Default for ResolutionPolicy {
    fn default() -> Self {
        ResolutionPolicy::Prefer(Side::Ours)
    }
}

impl ResolutionPolicy {
    fn default_side(self) -> Option<Side> {
        match self {
            ResolutionPolicy::Interactive => None,
            ResolutionPolicy::Prefer(side) => Some(side),
        }
    }
}

/// One conflicting path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictItem {
    /// Path relative to the working tree root.
    pub path: String,
    /// Blob of the common ancestor, if the path existed there.
    pub ancestor: Option<Oid>,
    /// Local blob, or `None` when the local side deleted the path.
    pub ours: Option<Oid>,
    /// Remote blob, or `None` when the remote side deleted the path.
    pub theirs: Option<Oid>,
    /// Side chosen so far.
    pub resolution: Option<Side>,
}

impl ConflictItem {
    /// Short description of how the two sides disagree.
    pub fn description(&self) -> &'static str {
        match (self.ancestor, self.ours, self.theirs) {
            (_, None, Some(_)) => "deleted locally, modified on remote",
            (_, Some(_), None) => "modified locally, deleted on remote",
            (None, Some(_), Some(_)) => "added on both sides",
            _ => "modified on both sides",
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }
}

/// A conflict handling session for one conflicting merge
pub trait ConflictHandler: Send {
    /// Gather the conflicts. Fails with a cancellation error when the
    /// progress sink reports cancellation while conflicts are staged.
    fn initialize(&mut self, progress: &dyn ProgressSink) -> Result<()>;

    /// Conflicts gathered by `initialize`.
    fn conflicts(&self) -> &[ConflictItem];

    /// Settle `path` by taking the version from `side`.
    fn resolve(&mut self, path: &str, side: Side) -> Result<()>;

    /// Commit the merge.
    fn merge(&mut self) -> Result<()>;

    /// Abandon the merge and restore the pre-pull state of the working tree.
    fn reset_to_local_state(&mut self) -> Result<()>;
}

/// Conflict handling backed by the libgit2 index
pub struct GitConflictHandler {
    repo: Repository,
    remote_ref: String,
    local_head: Oid,
    remote_head: Oid,
    author_name: String,
    author_email: String,
    policy: ResolutionPolicy,
    items: Vec<ConflictItem>,
}

impl GitConflictHandler {
    pub fn new(
        repo: Repository,
        remote_ref: impl Into<String>,
        local_head: Oid,
        remote_head: Oid,
        signature: &Signature<'_>,
        policy: ResolutionPolicy,
    ) -> Self {
        Self {
            repo,
            remote_ref: remote_ref.into(),
            local_head,
            remote_head,
            author_name: signature.name().unwrap_or_default().to_string(),
            author_email: signature.email().unwrap_or_default().to_string(),
            policy,
            items: Vec::new(),
        }
    }

    fn workdir(&self) -> Result<&Path> {
        self.repo
            .workdir()
            .ok_or_else(|| Error::git("merge", git2::Error::from_str("repository has no working tree")))
    }

    fn unresolved(&self) -> usize {
        self.items.iter().filter(|item| !item.is_resolved()).count()
    }
}

impl ConflictHandler for GitConflictHandler {
    fn initialize(&mut self, progress: &dyn ProgressSink) -> Result<()> {
        progress.sub_task("Collecting merge conflicts");
        let index = self.repo.index().map_err(|e| Error::git("merge", e))?;
        let mut items = Vec::new();

        for conflict in index.conflicts().map_err(|e| Error::git("merge", e))? {
            if progress.is_cancelled() {
                return Err(Error::Cancelled {
                    message: "conflict collection interrupted".to_string(),
                });
            }
            let conflict = conflict.map_err(|e| Error::git("merge", e))?;
            let path = [&conflict.our, &conflict.their, &conflict.ancestor]
                .into_iter()
                .flatten()
                .map(|entry| String::from_utf8_lossy(&entry.path).into_owned())
                .next();
            let Some(path) = path else {
                continue;
            };
            progress.sub_task(&path);
            items.push(ConflictItem {
                path,
                ancestor: conflict.ancestor.map(|entry| entry.id),
                ours: conflict.our.map(|entry| entry.id),
                theirs: conflict.their.map(|entry| entry.id),
                resolution: None,
            });
        }

        log::debug!("{} conflicting path(s) against {}", items.len(), self.remote_ref);
        self.items = items;
        Ok(())
    }

    fn conflicts(&self) -> &[ConflictItem] {
        &self.items
    }

    fn resolve(&mut self, path: &str, side: Side) -> Result<()> {
        let position = self
            .items
            .iter()
            .position(|item| item.path == path)
            .ok_or_else(|| Error::UnknownConflict {
                path: path.to_string(),
            })?;
        let blob = match side {
            Side::Ours => self.items[position].ours,
            Side::Theirs => self.items[position].theirs,
        };

        let full_path = self.workdir()?.join(path);
        let mut index = self.repo.index().map_err(|e| Error::git("resolve", e))?;
        match blob {
            Some(oid) => {
                let blob = self.repo.find_blob(oid).map_err(|e| Error::git("resolve", e))?;
                if let Some(parent) = full_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&full_path, blob.content())?;
                index
                    .add_path(Path::new(path))
                    .map_err(|e| Error::git("resolve", e))?;
            }
            None => {
                if full_path.exists() {
                    fs::remove_file(&full_path)?;
                }
                index
                    .remove_path(Path::new(path))
                    .map_err(|e| Error::git("resolve", e))?;
            }
        }
        index.write().map_err(|e| Error::git("resolve", e))?;

        log::debug!("Resolved {} with the {} version", path, side);
        self.items[position].resolution = Some(side);
        Ok(())
    }

    fn merge(&mut self) -> Result<()> {
        if let Some(side) = self.policy.default_side() {
            let open: Vec<String> = self
                .items
                .iter()
                .filter(|item| !item.is_resolved())
                .map(|item| item.path.clone())
                .collect();
            for path in open {
                self.resolve(&path, side)?;
            }
        }

        let unresolved = self.unresolved();
        if unresolved > 0 {
            return Err(Error::UnresolvedConflicts { count: unresolved });
        }

        let mut index = self.repo.index().map_err(|e| Error::git("merge", e))?;
        if index.has_conflicts() {
            let count = index.conflicts().map(|c| c.count()).unwrap_or(1);
            return Err(Error::UnresolvedConflicts { count });
        }

        let tree_id = index.write_tree().map_err(|e| Error::git("merge", e))?;
        let tree = self.repo.find_tree(tree_id)?;
        let ours = self.repo.find_commit(self.local_head)?;
        let theirs = self.repo.find_commit(self.remote_head)?;
        let local = crate::git::current_branch(&self.repo)?;
        let message = crate::git::merge_message(&self.remote_ref, &local);
        let signature = Signature::now(&self.author_name, &self.author_email)
            .map_err(|e| Error::git("merge", e))?;

        self.repo
            .commit(
                Some("HEAD"),
                &signature,
                &signature,
                &message,
                &tree,
                &[&ours, &theirs],
            )
            .map_err(|e| Error::git("merge", e))?;
        self.repo.cleanup_state().map_err(|e| Error::git("merge", e))?;
        log::info!("Merged {} after resolving {} conflict(s)", self.remote_ref, self.items.len());
        Ok(())
    }

    fn reset_to_local_state(&mut self) -> Result<()> {
        self.repo.cleanup_state().map_err(|e| Error::git("reset", e))?;
        let target = self
            .repo
            .find_object(self.local_head, None)
            .map_err(|e| Error::git("reset", e))?;
        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        self.repo
            .reset(&target, ResetType::Hard, Some(&mut checkout))
            .map_err(|e| Error::git("reset", e))?;
        self.items.clear();
        log::info!("Restored local state at {}", self.local_head);
        Ok(())
    }
}
