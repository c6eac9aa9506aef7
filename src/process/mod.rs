//! # Synchronization Process
//!
//! A [`SyncProcess`] drives one synchronization run of a document against
//! its repository. Every run follows the same sequence, cut short according
//! to the [`ProcessKind`]:
//!
//! 1. **Export**: write the document into the working tree.
//! 2. **Commit**: commit local changes, if there are any.
//! 3. **Transport**: acquire a transport for the remote (refresh and publish).
//! 4. **Pull**: fetch, merge, handle conflicts, reload the document, and
//!    classify the result as a [`PullOutcome`].
//! 5. **Push**: publish all local branches (publish only, and only when the
//!    pull ended `Ok` or `UpToDate`).
//! 6. **Wrap-up**: save the working tree checksum and release the transport.
//!
//! Errors never escape [`SyncProcess::run`]. Each failure is reported to the
//! [`EventListener`] as a `LogError` event carrying the root cause, and a
//! failed commit or push does not stop later steps from running.
//!
//! ## Other workflows
//!
//! - [`create_repository`]: initialise a repository for a document, make the
//!   initial commit and push it.
//! - [`abort_changes`]: throw away local changes and reload the document.

mod abort;
mod create;
pub mod events;
mod pull;

#[cfg(test)]
pub(crate) mod test_support;

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

pub use abort::abort_changes;
pub use create::{create_repository, NewRepository};
pub use events::{EventKind, EventListener, ProcessEvent, PullOutcome};

use crate::config::SyncConfig;
use crate::conflict::ResolutionPolicy;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::progress::{NullProgress, ProgressSink};
use crate::repository::RepositoryOperations;
use crate::transport::{Credentials, DefaultTransportProvider, TransportConfig, TransportProvider, TransportScope};
use events::Notifier;

/// Which steps a run performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessKind {
    /// Export and commit only.
    Commit,
    /// Commit, then pull from the remote.
    Refresh,
    /// Commit, pull, then push.
    Publish,
}

impl ProcessKind {
    /// Map the numeric codes used by callers that store the kind as a number.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(ProcessKind::Commit),
            2 => Some(ProcessKind::Refresh),
            3 => Some(ProcessKind::Publish),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            ProcessKind::Commit => 1,
            ProcessKind::Refresh => 2,
            ProcessKind::Publish => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProcessKind::Commit => "Commit",
            ProcessKind::Refresh => "Refresh",
            ProcessKind::Publish => "Publish",
        }
    }

    fn uses_remote(self) -> bool {
        self != ProcessKind::Commit
    }
}

impl fmt::Display for ProcessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One synchronization run of a document against a repository
pub struct SyncProcess {
    kind: ProcessKind,
    repository: Option<Box<dyn RepositoryOperations>>,
    document: Box<dyn Document>,
    listener: Box<dyn EventListener>,
    progress: Box<dyn ProgressSink>,
    transport: Box<dyn TransportProvider>,
    credentials: Option<Credentials>,
    commit_message: String,
    amend: bool,
    resolution: ResolutionPolicy,
}

impl SyncProcess {
    /// Create a process. A missing repository, or one whose directory does
    /// not exist, leaves the process disabled.
    pub fn new(
        kind: ProcessKind,
        repository: Option<Box<dyn RepositoryOperations>>,
        document: Box<dyn Document>,
        listener: Box<dyn EventListener>,
    ) -> Self {
        Self {
            kind,
            repository,
            document,
            listener,
            progress: Box::new(NullProgress),
            transport: Box::new(DefaultTransportProvider::new(&SyncConfig::default())),
            credentials: None,
            commit_message: String::new(),
            amend: false,
            resolution: ResolutionPolicy::default(),
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_transport(mut self, transport: Box<dyn TransportProvider>) -> Self {
        self.transport = transport;
        self
    }

    /// Message for the commit of local changes.
    pub fn with_commit_message(mut self, message: impl Into<String>, amend: bool) -> Self {
        self.commit_message = message.into();
        self.amend = amend;
        self
    }

    pub fn with_resolution(mut self, resolution: ResolutionPolicy) -> Self {
        self.resolution = resolution;
        self
    }

    /// Credentials for HTTP remotes. Ignored by other transports.
    pub fn set_credentials(&mut self, credentials: Option<Credentials>) {
        self.credentials = credentials.filter(|c| !c.is_empty());
    }

    pub fn kind(&self) -> ProcessKind {
        self.kind
    }

    /// Whether the process has a repository with an existing local directory.
    pub fn is_enabled(&self) -> bool {
        self.enabled_repository().is_some()
    }

    fn enabled_repository(&self) -> Option<&dyn RepositoryOperations> {
        self.repository
            .as_deref()
            .filter(|repository| repository.local_directory().is_dir())
    }

    fn notifier(&self) -> Notifier<'_> {
        Notifier::new(self.listener.as_ref(), self.kind.label())
    }

    /// Run the process. Returns the pull outcome for refresh and publish
    /// runs that reached the remote step.
    pub fn run(&self) -> Option<PullOutcome> {
        log::debug!("Starting {} process", self.kind);
        match panic::catch_unwind(AssertUnwindSafe(|| self.execute())) {
            Ok(outcome) => outcome,
            Err(_) => {
                self.notifier().error(format!("{} process aborted unexpectedly", self.kind));
                None
            }
        }
    }

    fn execute(&self) -> Option<PullOutcome> {
        let notifier = self.notifier();
        let Some(repository) = self.enabled_repository() else {
            let detail = match &self.repository {
                None => "no repository is associated with the document".to_string(),
                Some(repository) => format!(
                    "repository directory {} does not exist",
                    repository.local_directory().display()
                ),
            };
            notifier.failure(&Error::Disabled { message: detail });
            return None;
        };

        self.progress.sub_task("Exporting model");
        if let Err(e) = self.document.export_to_working_tree(repository.local_directory()) {
            notifier.failure(&e);
            return None;
        }

        let committed = match self.commit_local_changes(repository, &notifier) {
            Ok(committed) => Some(committed),
            Err(e) => {
                notifier.failure(&e);
                None
            }
        };

        if !self.kind.uses_remote() {
            match committed {
                Some(true) => notifier.message("Local changes committed"),
                Some(false) => notifier.message("Nothing to commit"),
                None => {}
            }
            return None;
        }

        let outcome = match self.acquire_transport(repository) {
            Ok(scope) => self.exchange(repository, scope.config(), &notifier),
            Err(e) => {
                notifier.failure(&e);
                PullOutcome::Error
            }
        };

        if let Err(e) = repository.save_checksum() {
            log::warn!("Could not save working tree checksum: {}", e);
        }
        Some(outcome)
    }

    /// Commit pending edits, returning whether a commit was made.
    fn commit_local_changes(&self, repository: &dyn RepositoryOperations, notifier: &Notifier<'_>) -> Result<bool> {
        if !repository.has_uncommitted_changes()? {
            log::debug!("No local changes to commit");
            return Ok(false);
        }
        notifier.notify(EventKind::StartCommit, "Commit", "Committing local changes");
        self.progress.sub_task("Committing local changes");
        repository.commit(&self.commit_message, self.amend)?;
        repository.save_checksum()?;
        notifier.notify(EventKind::EndCommit, "Commit", "Local changes committed");
        Ok(true)
    }

    fn acquire_transport(&self, repository: &dyn RepositoryOperations) -> Result<TransportScope<'_>> {
        let url = repository.remote_url().ok_or_else(|| Error::NoRemote {
            path: repository.local_directory().to_path_buf(),
        })?;
        TransportScope::acquire(self.transport.as_ref(), url, self.credentials.as_ref())
    }

    fn exchange(
        &self,
        repository: &dyn RepositoryOperations,
        transport: &TransportConfig,
        notifier: &Notifier<'_>,
    ) -> PullOutcome {
        notifier.notify(EventKind::StartPull, "Refresh", "Refreshing from remote");
        let outcome = match self.pull(repository, transport, notifier) {
            Ok(outcome) => outcome,
            Err(e) => {
                notifier.failure(&e);
                PullOutcome::Error
            }
        };
        notifier.notify(EventKind::PullStatus(outcome), "Refresh", outcome.code().to_string());
        notifier.notify(EventKind::EndPull, "Refresh", outcome.summary());

        if self.kind == ProcessKind::Publish && outcome.allows_push() {
            self.push(repository, transport, notifier);
        }
        outcome
    }

    fn push(&self, repository: &dyn RepositoryOperations, transport: &TransportConfig, notifier: &Notifier<'_>) {
        notifier.notify(EventKind::StartPush, "Publish", "Publishing to remote");
        match repository.push(transport, self.progress.as_ref()) {
            Ok(updates) => {
                let failures: Vec<String> = updates.iter().filter_map(|u| u.failure_message()).collect();
                if !failures.is_empty() {
                    notifier.error(failures.join("\n"));
                }
                notifier.notify(EventKind::EndPush, "Publish", "Published to remote");
            }
            Err(e) => notifier.failure(&e),
        }
    }
}
