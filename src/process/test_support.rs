//! Mock collaborators for synchronization process tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::events::{EventListener, ProcessEvent};
use crate::conflict::{ConflictHandler, ConflictItem, ResolutionPolicy, Side};
use crate::document::{Document, RestoredObjects};
use crate::error::{Error, Result};
use crate::progress::ProgressSink;
use crate::repository::{
    BranchRef, BranchStatus, MergeOutcome, MergeStatus, RefUpdate, RefUpdateStatus, RepositoryOperations,
};
use crate::transport::{Credentials, TransportConfig, TransportProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerFailure {
    CancelInitialize,
    FailInitialize,
    FailMerge,
}

struct RepositoryState {
    changes: bool,
    merge: MergeOutcome,
    fail_commit: bool,
    fail_pull: bool,
    fail_push: bool,
    push_result: Vec<RefUpdate>,
    remote_branch: bool,
    handler_failure: Option<HandlerFailure>,
    session: Option<(String, ResolutionPolicy)>,
    calls: Vec<String>,
}

/// Scripted repository recording every operation it receives
#[derive(Clone)]
pub struct MockRepository {
    dir: PathBuf,
    remote_url: Option<String>,
    state: Arc<Mutex<RepositoryState>>,
    handler_calls: Arc<Mutex<Vec<String>>>,
}

impl MockRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            remote_url: Some("https://example.com/model.git".to_string()),
            state: Arc::new(Mutex::new(RepositoryState {
                changes: false,
                merge: MergeOutcome {
                    status: MergeStatus::AlreadyUpToDate,
                    tracking_refs_updated: 0,
                    local_head: None,
                    remote_head: None,
                },
                fail_commit: false,
                fail_pull: false,
                fail_push: false,
                push_result: vec![RefUpdate {
                    ref_name: "refs/heads/main".to_string(),
                    status: RefUpdateStatus::Ok,
                }],
                remote_branch: true,
                handler_failure: None,
                session: None,
                calls: Vec::new(),
            })),
            handler_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_changes(self, changes: bool) -> Self {
        self.set_changes(changes);
        self
    }

    pub fn set_changes(&self, changes: bool) {
        self.state.lock().unwrap().changes = changes;
    }

    pub fn with_merge(self, status: MergeStatus, tracking_refs_updated: usize) -> Self {
        self.state.lock().unwrap().merge = MergeOutcome {
            status,
            tracking_refs_updated,
            local_head: None,
            remote_head: None,
        };
        self
    }

    pub fn with_push_result(self, updates: Vec<RefUpdate>) -> Self {
        self.state.lock().unwrap().push_result = updates;
        self
    }

    pub fn failing_commit(self) -> Self {
        self.state.lock().unwrap().fail_commit = true;
        self
    }

    pub fn failing_pull(self) -> Self {
        self.state.lock().unwrap().fail_pull = true;
        self
    }

    pub fn failing_push(self) -> Self {
        self.state.lock().unwrap().fail_push = true;
        self
    }

    pub fn without_remote_branch(self) -> Self {
        self.state.lock().unwrap().remote_branch = false;
        self
    }

    pub fn with_handler_failure(self, failure: HandlerFailure) -> Self {
        self.state.lock().unwrap().handler_failure = Some(failure);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn handler_calls(&self) -> Vec<String> {
        self.handler_calls.lock().unwrap().clone()
    }

    pub fn conflict_session(&self) -> Option<(String, ResolutionPolicy)> {
        self.state.lock().unwrap().session.clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.state.lock().unwrap().calls.push(call.into());
    }
}

impl RepositoryOperations for MockRepository {
    fn local_directory(&self) -> &Path {
        &self.dir
    }

    fn remote_url(&self) -> Option<&str> {
        self.remote_url.as_deref()
    }

    fn has_uncommitted_changes(&self) -> Result<bool> {
        self.record("status");
        Ok(self.state.lock().unwrap().changes)
    }

    fn commit(&self, message: &str, amend: bool) -> Result<()> {
        let suffix = if amend { ":amend" } else { "" };
        self.record(format!("commit:{}{}", message, suffix));
        let mut state = self.state.lock().unwrap();
        if state.fail_commit {
            return Err(Error::git("commit", git2::Error::from_str("index is locked")));
        }
        state.changes = false;
        Ok(())
    }

    fn pull(&self, _transport: &TransportConfig, _progress: &dyn ProgressSink) -> Result<MergeOutcome> {
        self.record("pull");
        let state = self.state.lock().unwrap();
        if state.fail_pull {
            return Err(Error::git("fetch", git2::Error::from_str("remote hung up")));
        }
        Ok(state.merge.clone())
    }

    fn push(&self, _transport: &TransportConfig, _progress: &dyn ProgressSink) -> Result<Vec<RefUpdate>> {
        self.record("push");
        let state = self.state.lock().unwrap();
        if state.fail_push {
            return Err(Error::Transport {
                url: "https://example.com/model.git".to_string(),
                message: "connection reset".to_string(),
            });
        }
        Ok(state.push_result.clone())
    }

    fn branch_status(&self) -> Result<BranchStatus> {
        self.record("branch_status");
        let remote_branch = self.state.lock().unwrap().remote_branch;
        Ok(BranchStatus {
            local: BranchRef::new("refs/heads/main"),
            remote: remote_branch.then(|| BranchRef::new("refs/remotes/origin/main")),
        })
    }

    fn save_checksum(&self) -> Result<()> {
        self.record("save_checksum");
        Ok(())
    }

    fn checksum_changed(&self) -> Result<bool> {
        self.record("checksum_changed");
        Ok(self.state.lock().unwrap().changes)
    }

    fn reset_to_ref(&self, refname: &str) -> Result<()> {
        self.record(format!("reset:{}", refname));
        self.state.lock().unwrap().changes = false;
        Ok(())
    }

    fn open_conflict_session(
        &self,
        _merge: &MergeOutcome,
        remote_ref: &str,
        policy: ResolutionPolicy,
    ) -> Result<Box<dyn ConflictHandler>> {
        self.record("open_conflict_session");
        let mut state = self.state.lock().unwrap();
        state.session = Some((remote_ref.to_string(), policy));
        Ok(Box::new(MockConflictHandler {
            calls: self.handler_calls.clone(),
            failure: state.handler_failure,
            items: vec![ConflictItem {
                path: "model/actor-1.yaml".to_string(),
                ancestor: None,
                ours: None,
                theirs: None,
                resolution: None,
            }],
        }))
    }
}

/// Conflict session that records its calls in the owning repository mock
pub struct MockConflictHandler {
    calls: Arc<Mutex<Vec<String>>>,
    failure: Option<HandlerFailure>,
    items: Vec<ConflictItem>,
}

impl MockConflictHandler {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

impl ConflictHandler for MockConflictHandler {
    fn initialize(&mut self, _progress: &dyn ProgressSink) -> Result<()> {
        self.record("initialize");
        match self.failure {
            Some(HandlerFailure::CancelInitialize) => Err(Error::Cancelled {
                message: "stopped by user".to_string(),
            }),
            Some(HandlerFailure::FailInitialize) => {
                Err(Error::git("merge", git2::Error::from_str("index is corrupt")))
            }
            _ => Ok(()),
        }
    }

    fn conflicts(&self) -> &[ConflictItem] {
        &self.items
    }

    fn resolve(&mut self, path: &str, side: Side) -> Result<()> {
        self.record(format!("resolve:{}:{}", path, side));
        if let Some(item) = self.items.iter_mut().find(|item| item.path == path) {
            item.resolution = Some(side);
        }
        Ok(())
    }

    fn merge(&mut self) -> Result<()> {
        self.record("merge");
        match self.failure {
            Some(HandlerFailure::FailMerge) => Err(Error::UnresolvedConflicts { count: 1 }),
            _ => Ok(()),
        }
    }

    fn reset_to_local_state(&mut self) -> Result<()> {
        self.record("reset");
        Ok(())
    }
}

struct DocumentState {
    fail_export: bool,
    fail_reload: bool,
    restored: Vec<String>,
    marks: Option<MockRepository>,
    calls: Vec<String>,
}

/// Document recording export and reload calls
#[derive(Clone)]
pub struct MockDocument {
    state: Arc<Mutex<DocumentState>>,
}

impl MockDocument {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(DocumentState {
                fail_export: false,
                fail_reload: false,
                restored: Vec::new(),
                marks: None,
                calls: Vec::new(),
            })),
        }
    }

    pub fn failing_export(self) -> Self {
        self.state.lock().unwrap().fail_export = true;
        self
    }

    pub fn failing_reload(self) -> Self {
        self.state.lock().unwrap().fail_reload = true;
        self
    }

    /// Report `entries` as restored on reload.
    pub fn restoring(self, entries: &[&str]) -> Self {
        self.state.lock().unwrap().restored = entries.iter().map(|e| e.to_string()).collect();
        self
    }

    /// Make a reload leave uncommitted changes in `repository`.
    pub fn marking_changes(self, repository: MockRepository) -> Self {
        self.state.lock().unwrap().marks = Some(repository);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }
}

impl Document for MockDocument {
    fn export_to_working_tree(&self, _working_dir: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("export".to_string());
        if state.fail_export {
            return Err(Error::Export {
                message: "object 'actor 1' has an invalid id".to_string(),
            });
        }
        Ok(())
    }

    fn reload_from_working_tree(&self, _working_dir: &Path) -> Result<RestoredObjects> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("reload".to_string());
        if state.fail_reload {
            return Err(Error::Reload {
                message: "model/actor-1.yaml is not valid YAML".to_string(),
            });
        }
        if let Some(repository) = &state.marks {
            repository.set_changes(true);
        }
        let mut restored = RestoredObjects::new();
        for entry in &state.restored {
            restored.push(entry.clone());
        }
        Ok(restored)
    }
}

/// Listener recording events, answering conflict requests with a fixed value
#[derive(Clone)]
pub struct RecordingListener {
    events: Arc<Mutex<Vec<ProcessEvent>>>,
    answer: bool,
    requests: Arc<AtomicUsize>,
}

impl RecordingListener {
    pub fn new(answer: bool) -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            answer,
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn events(&self) -> Vec<ProcessEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn conflict_requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl EventListener for RecordingListener {
    fn notify(&self, event: &ProcessEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn request_conflict_resolution(&self, _handler: &mut dyn ConflictHandler) -> bool {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.answer
    }
}

/// Listener that panics on every call
pub struct PanickingListener;

impl EventListener for PanickingListener {
    fn notify(&self, _event: &ProcessEvent) {
        panic!("listener failure");
    }

    fn request_conflict_resolution(&self, _handler: &mut dyn ConflictHandler) -> bool {
        panic!("listener failure");
    }
}

/// Transport provider counting acquisitions and releases
#[derive(Clone)]
pub struct CountingTransport {
    acquired: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
    fail: bool,
}

impl CountingTransport {
    pub fn new() -> Self {
        Self {
            acquired: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl TransportProvider for CountingTransport {
    fn transport_for(&self, url: &str, _credentials: Option<&Credentials>) -> Result<TransportConfig> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Credentials {
                url: url.to_string(),
                message: "no username or password supplied".to_string(),
            });
        }
        Ok(TransportConfig::Local)
    }

    fn release(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}
