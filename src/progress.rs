//! Progress reporting for long-running repository operations.

/// Passive receiver of sub-task labels
///
/// Implementations never gate execution. The one exception is
/// `is_cancelled`, which the conflict handler polls while it stages
/// conflicts; returning `true` there aborts the staging with a cancellation
/// error.
pub trait ProgressSink: Send + Sync {
    /// A new sub-task has started.
    fn sub_task(&self, label: &str);

    /// Whether the user asked to stop.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// A sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn sub_task(&self, label: &str) {
        log::trace!("{}", label);
    }
}
