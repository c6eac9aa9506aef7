//! Events emitted by a synchronization run, and the listener that receives
//! them.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::conflict::ConflictHandler;
use crate::error::Error;

/// Final classification of a pull
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PullOutcome {
    /// Remote changes were merged, or the remote had nothing for this branch.
    Ok,
    /// Nothing changed on the remote.
    UpToDate,
    /// Conflicts were found and the merge was abandoned.
    MergeCancelled,
    /// The pull failed.
    Error,
}

impl PullOutcome {
    /// Numeric code carried by pull status events.
    pub fn code(self) -> i32 {
        match self {
            PullOutcome::Error => -1,
            PullOutcome::Ok => 0,
            PullOutcome::UpToDate => 1,
            PullOutcome::MergeCancelled => 2,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(PullOutcome::Error),
            0 => Some(PullOutcome::Ok),
            1 => Some(PullOutcome::UpToDate),
            2 => Some(PullOutcome::MergeCancelled),
            _ => None,
        }
    }

    /// Whether a publish may push after this outcome.
    pub fn allows_push(self) -> bool {
        matches!(self, PullOutcome::Ok | PullOutcome::UpToDate)
    }

    /// One-line description for end-of-pull events.
    pub fn summary(self) -> &'static str {
        match self {
            PullOutcome::Ok => "Merged changes from remote",
            PullOutcome::UpToDate => "Already up to date",
            PullOutcome::MergeCancelled => "Merge cancelled, local state restored",
            PullOutcome::Error => "Refresh failed",
        }
    }
}

impl fmt::Display for PullOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PullOutcome::Ok => write!(f, "ok"),
            PullOutcome::UpToDate => write!(f, "up-to-date"),
            PullOutcome::MergeCancelled => write!(f, "merge-cancelled"),
            PullOutcome::Error => write!(f, "error"),
        }
    }
}

/// Kind of a process event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    LogMessage,
    LogError,
    StartCommit,
    EndCommit,
    StartPull,
    PullStatus(PullOutcome),
    EndPull,
    StartPush,
    EndPush,
}

impl EventKind {
    pub fn is_error(self) -> bool {
        self == EventKind::LogError
    }
}

/// One notification from a synchronization run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEvent {
    pub kind: EventKind,
    /// Label of the emitting process, such as `Publish`.
    pub prefix: String,
    /// Short title.
    pub summary: String,
    /// Free-form detail, possibly multi-line.
    pub detail: String,
}

/// Receiver of process events
///
/// Listener failures never abort a run: a panicking `notify` is logged and
/// ignored, and a panicking conflict request counts as a refusal.
pub trait EventListener: Send {
    fn notify(&self, event: &ProcessEvent);

    /// Offer a conflict handling session to the user. Returning `true`
    /// finalizes the merge; `false` abandons it.
    fn request_conflict_resolution(&self, handler: &mut dyn ConflictHandler) -> bool;
}

/// Delivers events to a listener on behalf of one process
pub(crate) struct Notifier<'a> {
    listener: &'a dyn EventListener,
    prefix: &'a str,
}

impl<'a> Notifier<'a> {
    pub(crate) fn new(listener: &'a dyn EventListener, prefix: &'a str) -> Self {
        Self { listener, prefix }
    }

    pub(crate) fn notify(&self, kind: EventKind, summary: &str, detail: impl Into<String>) {
        let event = ProcessEvent {
            kind,
            prefix: self.prefix.to_string(),
            summary: summary.to_string(),
            detail: detail.into(),
        };
        match kind {
            EventKind::LogError => log::error!("{}: {}", self.prefix, event.detail),
            _ => log::info!("{}: {} {}", self.prefix, event.summary, event.detail),
        }
        if panic::catch_unwind(AssertUnwindSafe(|| self.listener.notify(&event))).is_err() {
            log::error!("Event listener panicked while handling {:?}", kind);
        }
    }

    pub(crate) fn message(&self, detail: impl Into<String>) {
        self.notify(EventKind::LogMessage, self.prefix, detail);
    }

    pub(crate) fn error(&self, detail: impl Into<String>) {
        self.notify(EventKind::LogError, self.prefix, detail);
    }

    /// Report an error with its root cause as the detail.
    pub(crate) fn failure(&self, error: &Error) {
        log::debug!("{}: {:?}", self.prefix, error);
        self.error(error.root_message());
    }

    pub(crate) fn request_conflict_resolution(&self, handler: &mut dyn ConflictHandler) -> bool {
        panic::catch_unwind(AssertUnwindSafe(|| {
            self.listener.request_conflict_resolution(handler)
        }))
        .unwrap_or_else(|_| {
            log::error!("Event listener panicked during conflict resolution");
            false
        })
    }
}
