//! Discarding local changes.

use super::events::{EventListener, Notifier};
use crate::document::{Document, RestoredObjects};
use crate::error::Result;
use crate::repository::RepositoryOperations;

/// Throw away uncommitted changes and reload the document from the last
/// commit.
///
/// A failed reset is reported to the listener; the reload is attempted
/// regardless so the document reflects whatever the working tree now holds.
pub fn abort_changes(
    repository: &dyn RepositoryOperations,
    document: &dyn Document,
    listener: &dyn EventListener,
) -> Result<RestoredObjects> {
    let notifier = Notifier::new(listener, "Abort");

    if let Err(e) = repository.reset_to_ref("HEAD") {
        notifier.failure(&e);
    }

    let restored = document.reload_from_working_tree(repository.local_directory())?;
    repository.save_checksum()?;
    notifier.message("Local changes discarded");
    Ok(restored)
}
