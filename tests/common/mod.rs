//! Shared test utilities for integration and E2E tests.
//!
//! This module provides a bare "remote" repository in a temporary directory
//! and helpers to set up working copies that synchronize against it.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = SyncFixture::new();
//!     let alice = fixture.create_workspace("alice", models::BASE);
//!     let bob = fixture.clone_workspace("bob");
//!     // ... test code
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use assert_fs::prelude::*;
use git2::{Oid, Repository};
use model_sync::config::SyncConfig;
use model_sync::conflict::{ConflictHandler, ResolutionPolicy, Side};
use model_sync::document::{Document, Model, YamlDocument};
use model_sync::process::{
    create_repository, EventKind, EventListener, NewRepository, ProcessEvent, ProcessKind, PullOutcome, SyncProcess,
};
use model_sync::progress::NullProgress;
use model_sync::repository::{GitRepository, RepositoryOperations};
use model_sync::transport::DefaultTransportProvider;
use walkdir::WalkDir;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    #[allow(unused_imports)]
    pub use predicates::prelude::*;

    pub use super::models;
    pub use super::{RecordingListener, SyncFixture, Workspace};
}

/// Model files used across tests.
#[allow(dead_code)]
pub mod models {
    /// Three objects, the view depending on the other two.
    pub const BASE: &str = r#"objects:
  actor-1:
    name: Customer
  db-1:
    name: Orders DB
  view-1:
    name: Overview
    refs: [actor-1, db-1]
"#;

    pub const ACTOR_RENAMED_LOCAL: &str = r#"objects:
  actor-1:
    name: Local Customer
  db-1:
    name: Orders DB
  view-1:
    name: Overview
    refs: [actor-1, db-1]
"#;

    pub const ACTOR_RENAMED_REMOTE: &str = r#"objects:
  actor-1:
    name: Remote Customer
  db-1:
    name: Orders DB
  view-1:
    name: Overview
    refs: [actor-1, db-1]
"#;

    /// Remote rename of the actor, plus removal of the database the view
    /// still references.
    pub const ACTOR_RENAMED_DB_DROPPED: &str = r#"objects:
  actor-1:
    name: Remote Customer
  view-1:
    name: Overview
    refs: [actor-1, db-1]
"#;

    pub const INVALID: &str = "objects: [unterminated\n";
}

/// Commit identity used by every workspace.
pub fn settings() -> SyncConfig {
    SyncConfig {
        user_name: Some("Test".to_string()),
        user_email: Some("test@test.com".to_string()),
        ..SyncConfig::default()
    }
}

/// A bare remote repository in a temporary directory.
pub struct SyncFixture {
    temp_dir: assert_fs::TempDir,
    remote: PathBuf,
}

impl SyncFixture {
    pub fn new() -> Self {
        let temp_dir = assert_fs::TempDir::new().expect("Failed to create temp directory");
        let remote = temp_dir.path().join("remote.git");
        Repository::init_bare(&remote).expect("Failed to create bare remote");
        Self { temp_dir, remote }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn remote_url(&self) -> String {
        self.remote.to_str().expect("temp path is utf8").to_string()
    }

    /// Paths for a workspace named `name`, without creating anything.
    pub fn workspace(&self, name: &str) -> Workspace {
        Workspace {
            dir: self.temp_dir.path().join(name).join("work"),
            model: self.temp_dir.path().join(name).join("model.yaml"),
        }
    }

    /// Create the first workspace: write `model`, create the repository and
    /// push the initial commit.
    pub fn create_workspace(&self, name: &str, model: &str) -> Workspace {
        let workspace = self.workspace(name);
        self.temp_dir
            .child(name)
            .child("model.yaml")
            .write_str(model)
            .expect("Failed to write model");

        create_repository(
            &NewRepository {
                local_dir: workspace.dir.clone(),
                url: self.remote_url(),
                config: settings(),
                credentials: None,
            },
            &workspace.document(),
            &RecordingListener::accepting(),
            &DefaultTransportProvider::new(&settings()),
            &NullProgress,
        )
        .expect("Failed to create repository");
        workspace
    }

    /// Clone the remote into a new workspace and load its model.
    pub fn clone_workspace(&self, name: &str) -> Workspace {
        let workspace = self.workspace(name);
        Repository::clone(&self.remote_url(), &workspace.dir).expect("Failed to clone remote");
        workspace
            .document()
            .reload_from_working_tree(&workspace.dir)
            .expect("Failed to load cloned model");
        workspace
            .repository()
            .save_checksum()
            .expect("Failed to save checksum");
        workspace
    }

    /// Delete `branch` on the remote, as another user would.
    pub fn delete_remote_branch(&self, branch: &str) {
        let repo = Repository::open_bare(&self.remote).expect("Failed to open bare remote");
        repo.find_reference(&format!("refs/heads/{}", branch))
            .expect("remote branch")
            .delete()
            .expect("Failed to delete remote branch");
    }

    /// Head of `branch` on the remote.
    pub fn remote_head(&self, branch: &str) -> Option<Oid> {
        let repo = Repository::open_bare(&self.remote).ok()?;
        repo.refname_to_id(&format!("refs/heads/{}", branch)).ok()
    }
}

impl Default for SyncFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A working copy and the model file synchronized with it.
pub struct Workspace {
    pub dir: PathBuf,
    pub model: PathBuf,
}

#[allow(dead_code)]
impl Workspace {
    pub fn document(&self) -> YamlDocument {
        YamlDocument::new(&self.model)
    }

    pub fn repository(&self) -> GitRepository {
        GitRepository::new(&self.dir, settings())
    }

    pub fn git(&self) -> Repository {
        Repository::open(&self.dir).expect("Failed to open workspace repository")
    }

    pub fn write_model(&self, content: &str) {
        fs::write(&self.model, content).expect("Failed to write model");
    }

    pub fn model(&self) -> Model {
        self.document().load().expect("Failed to load model")
    }

    pub fn object_name(&self, id: &str) -> Option<String> {
        self.model()
            .objects
            .get(id)
            .and_then(|object| object.fields.get("name"))
            .and_then(|name| name.as_str())
            .map(str::to_string)
    }

    pub fn head(&self) -> Oid {
        self.git()
            .head()
            .expect("HEAD")
            .target()
            .expect("HEAD is direct")
    }

    pub fn branch(&self) -> String {
        self.git().head().expect("HEAD").shorthand().unwrap_or_default().to_string()
    }

    /// Run a process of `kind` with the given listener and conflict policy.
    pub fn run(&self, kind: ProcessKind, listener: &RecordingListener, policy: ResolutionPolicy) -> Option<PullOutcome> {
        SyncProcess::new(
            kind,
            Some(Box::new(self.repository())),
            Box::new(self.document()),
            Box::new(listener.clone()),
        )
        .with_transport(Box::new(DefaultTransportProvider::new(&settings())))
        .with_commit_message(format!("{} edit", kind), false)
        .with_resolution(policy)
        .run()
    }

    /// Every file of the working tree outside `.git`, with its contents.
    pub fn snapshot(&self) -> BTreeMap<PathBuf, Vec<u8>> {
        WalkDir::new(&self.dir)
            .into_iter()
            .filter_entry(|entry| entry.file_name() != ".git")
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| {
                let relative = entry
                    .path()
                    .strip_prefix(&self.dir)
                    .expect("entry under workspace")
                    .to_path_buf();
                let content = fs::read(entry.path()).expect("Failed to read file");
                (relative, content)
            })
            .collect()
    }
}

/// Listener recording every event. Conflict requests are answered with a
/// fixed value, optionally after resolving every conflict to one side.
#[derive(Clone)]
pub struct RecordingListener {
    events: Arc<Mutex<Vec<ProcessEvent>>>,
    answer: bool,
    resolve_with: Option<Side>,
    seen_conflicts: Arc<Mutex<Vec<String>>>,
}

#[allow(dead_code)]
impl RecordingListener {
    pub fn accepting() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            answer: true,
            resolve_with: None,
            seen_conflicts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn declining() -> Self {
        Self {
            answer: false,
            ..Self::accepting()
        }
    }

    pub fn resolving(side: Side) -> Self {
        Self {
            resolve_with: Some(side),
            ..Self::accepting()
        }
    }

    pub fn events(&self) -> Vec<ProcessEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events().iter().map(|event| event.kind).collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|event| event.kind == EventKind::LogError)
            .map(|event| event.detail)
            .collect()
    }

    /// Paths offered for resolution, across all requests.
    pub fn seen_conflicts(&self) -> Vec<String> {
        self.seen_conflicts.lock().unwrap().clone()
    }
}

impl EventListener for RecordingListener {
    fn notify(&self, event: &ProcessEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn request_conflict_resolution(&self, handler: &mut dyn ConflictHandler) -> bool {
        let paths: Vec<String> = handler.conflicts().iter().map(|c| c.path.clone()).collect();
        if let Some(side) = self.resolve_with {
            for path in &paths {
                if handler.resolve(path, side).is_err() {
                    return false;
                }
            }
        }
        self.seen_conflicts.lock().unwrap().extend(paths);
        self.answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_models_are_valid_yaml() {
        for model in [
            models::BASE,
            models::ACTOR_RENAMED_LOCAL,
            models::ACTOR_RENAMED_REMOTE,
            models::ACTOR_RENAMED_DB_DROPPED,
        ] {
            let parsed: Result<Model, _> = serde_yaml::from_str(model);
            assert!(parsed.is_ok(), "invalid model: {}", model);
        }
    }
}
