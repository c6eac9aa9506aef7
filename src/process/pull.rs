//! Pull step: fetch, merge, conflict handling and document reload.

use super::events::{Notifier, PullOutcome};
use super::SyncProcess;
use crate::conflict::ConflictHandler;
use crate::document::RestoredObjects;
use crate::error::{Error, Result};
use crate::repository::{MergeStatus, RepositoryOperations};
use crate::transport::TransportConfig;

/// Commit message recording a merge that needed objects restored.
pub(crate) fn restore_commit_message(branch: &str, restored: &RestoredObjects) -> String {
    let mut message = format!("Merge remote changes into {}", branch);
    if !restored.is_empty() {
        message.push_str("\n\nRestored objects:\n");
        message.push_str(&restored.to_string());
    }
    message
}

impl SyncProcess {
    /// Pull from the remote and bring the document up to date.
    ///
    /// A conflicting merge that is abandoned, or that cannot be completed,
    /// leaves the working tree exactly as it was before the pull.
    pub(super) fn pull(
        &self,
        repository: &dyn RepositoryOperations,
        transport: &TransportConfig,
        notifier: &Notifier<'_>,
    ) -> Result<PullOutcome> {
        let merge = repository.pull(transport, self.progress.as_ref())?;
        log::debug!("Merge result: {:?}", merge);

        match merge.status {
            MergeStatus::RefNotAdvertised => return Ok(PullOutcome::Ok),
            MergeStatus::AlreadyUpToDate if merge.tracking_refs_updated > 0 => {
                return Ok(PullOutcome::Ok)
            }
            MergeStatus::AlreadyUpToDate => return Ok(PullOutcome::UpToDate),
            MergeStatus::FastForward | MergeStatus::Merged | MergeStatus::Conflicting => {}
        }

        self.progress.sub_task("Reloading model");
        let branch = repository.branch_status()?;
        let working_dir = repository.local_directory();

        let restored = if merge.is_successful() {
            self.document.reload_from_working_tree(working_dir)?
        } else {
            let remote = branch.remote.as_ref().ok_or_else(|| Error::NoRemoteBranch {
                branch: branch.local.short_name().to_string(),
            })?;
            let mut handler = repository.open_conflict_session(&merge, remote.full_name(), self.resolution)?;

            if let Err(e) = handler.initialize(self.progress.as_ref()) {
                self.revert(handler.as_mut(), notifier);
                return if e.is_cancelled() {
                    log::info!("Conflict handling cancelled");
                    Ok(PullOutcome::MergeCancelled)
                } else {
                    Err(e)
                };
            }

            if !notifier.request_conflict_resolution(handler.as_mut()) {
                self.revert(handler.as_mut(), notifier);
                return Ok(PullOutcome::MergeCancelled);
            }

            let completed = handler
                .merge()
                .and_then(|()| self.document.reload_from_working_tree(working_dir));
            match completed {
                Ok(restored) => restored,
                Err(e) => {
                    self.revert(handler.as_mut(), notifier);
                    return Err(e);
                }
            }
        };

        if repository.has_uncommitted_changes()? {
            if !restored.is_empty() {
                notifier.message(format!("Restored objects:\n{}", restored));
            }
            let message = restore_commit_message(branch.local.short_name(), &restored);
            repository.commit(&message, false)?;
        }

        Ok(PullOutcome::Ok)
    }

    fn revert(&self, handler: &mut dyn ConflictHandler, notifier: &Notifier<'_>) {
        if let Err(e) = handler.reset_to_local_state() {
            notifier.failure(&e);
        }
    }
}
