use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use git2::build::CheckoutBuilder;
use git2::{
    BranchType, ErrorCode, FetchOptions, IndexAddOption, ObjectType, Oid, PushOptions, Repository,
    ResetType, Signature, StatusOptions,
};
use walkdir::WalkDir;

use crate::config::SyncConfig;
use crate::defaults::{CHECKSUM_FILE, DEFAULT_USER_EMAIL, DEFAULT_USER_NAME};
use crate::error::{Error, Result};
use crate::progress::ProgressSink;
use crate::repository::{BranchRef, BranchStatus, MergeOutcome, MergeStatus, RefUpdate, RefUpdateStatus};
use crate::transport::TransportConfig;

/// Open the repository whose working tree is `dir`
pub fn open(dir: &Path) -> Result<Repository> {
    Repository::open(dir).map_err(|e| Error::git("open", e))
}

/// Create a repository in `dir` bound to `url` under `remote_name`
pub fn init_with_remote(dir: &Path, remote_name: &str, url: &str) -> Result<Repository> {
    let repo = Repository::init(dir).map_err(|e| Error::git("init", e))?;
    repo.remote(remote_name, url)
        .map_err(|e| Error::git("remote add", e))?;
    Ok(repo)
}

/// URL of `remote_name`, if the directory is a repository with that remote
pub fn remote_url(dir: &Path, remote_name: &str) -> Option<String> {
    let repo = Repository::open(dir).ok()?;
    let remote = repo.find_remote(remote_name).ok()?;
    remote.url().map(str::to_string)
}

/// Commit identity: configuration first, then git config, then defaults
pub fn signature(repo: &Repository, config: &SyncConfig) -> Result<Signature<'static>> {
    if let (Some(name), Some(email)) = (&config.user_name, &config.user_email) {
        return Ok(Signature::now(name, email)?);
    }
    match repo.signature() {
        Ok(signature) => Ok(signature),
        Err(_) => Ok(Signature::now(DEFAULT_USER_NAME, DEFAULT_USER_EMAIL)?),
    }
}

/// Whether the working tree differs from the last commit
///
/// Untracked files count as changes; ignored files do not.
pub fn has_uncommitted_changes(repo: &Repository) -> Result<bool> {
    let mut options = StatusOptions::new();
    options
        .include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false);
    let statuses = repo
        .statuses(Some(&mut options))
        .map_err(|e| Error::git("status", e))?;
    Ok(!statuses.is_empty())
}

/// Stage every change in the working tree and commit it
///
/// With `amend` set and an existing HEAD, the last commit is rewritten
/// instead.
pub fn commit_all(repo: &Repository, signature: &Signature<'_>, message: &str, amend: bool) -> Result<Oid> {
    let mut index = repo.index().map_err(|e| Error::git("commit", e))?;
    index
        .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
        .map_err(|e| Error::git("commit", e))?;
    index
        .update_all(["*"].iter(), None)
        .map_err(|e| Error::git("commit", e))?;
    index.write().map_err(|e| Error::git("commit", e))?;

    let tree_id = index.write_tree().map_err(|e| Error::git("commit", e))?;
    let tree = repo.find_tree(tree_id)?;
    let head = repo.head().ok().and_then(|head| head.peel_to_commit().ok());

    let oid = match head {
        Some(head) if amend => head.amend(
            Some("HEAD"),
            None,
            Some(signature),
            None,
            Some(message),
            Some(&tree),
        ),
        Some(head) => repo.commit(Some("HEAD"), signature, signature, message, &tree, &[&head]),
        None => repo.commit(Some("HEAD"), signature, signature, message, &tree, &[]),
    }
    .map_err(|e| Error::git("commit", e))?;

    log::debug!("Committed {} ({})", oid, message.lines().next().unwrap_or_default());
    Ok(oid)
}

/// The branch HEAD points at, even before its first commit
pub fn current_branch(repo: &Repository) -> Result<BranchRef> {
    let head = repo
        .find_reference("HEAD")
        .map_err(|e| Error::git("branch status", e))?;
    match head.symbolic_target() {
        Some(target) if target.starts_with("refs/heads/") => Ok(BranchRef::new(target)),
        _ => Err(Error::DetachedHead),
    }
}

/// Remote-tracking ref name for `local`: the configured upstream if any,
/// otherwise the same branch name under `remote_name`
fn tracking_ref_name(repo: &Repository, local: &BranchRef, remote_name: &str) -> String {
    repo.branch_upstream_name(local.full_name())
        .ok()
        .and_then(|name| name.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("refs/remotes/{}/{}", remote_name, local.short_name()))
}

/// Current local branch and its remote-tracking branch, if one exists
pub fn branch_status(repo: &Repository, remote_name: &str) -> Result<BranchStatus> {
    let local = current_branch(repo)?;
    let tracking = tracking_ref_name(repo, &local, remote_name);
    let remote = repo
        .find_reference(&tracking)
        .ok()
        .map(|_| BranchRef::new(tracking));
    Ok(BranchStatus { local, remote })
}

/// Fetch `remote_name`, returning how many remote-tracking refs moved
pub fn fetch(repo: &Repository, remote_name: &str, transport: &TransportConfig) -> Result<usize> {
    let mut remote = repo
        .find_remote(remote_name)
        .map_err(|e| Error::git("fetch", e))?;

    let mut updated = 0usize;
    {
        let mut callbacks = transport.remote_callbacks();
        callbacks.update_tips(|refname, old, new| {
            if refname.starts_with("refs/remotes/") && old != new {
                log::debug!("{}: {} -> {}", refname, old, new);
                updated += 1;
            }
            true
        });

        let mut options = FetchOptions::new();
        options.remote_callbacks(callbacks);
        transport.configure_fetch(&mut options);

        remote
            .fetch::<&str>(&[], Some(&mut options), Some("model-sync: fetch"))
            .map_err(|e| Error::git("fetch", e))?;
    }

    Ok(updated)
}

/// Fetch and merge the upstream branch into the current branch
///
/// A conflicting merge leaves the repository in its merging state, with
/// conflicts recorded in the index, for a conflict handler to take over.
pub fn pull(
    repo: &Repository,
    remote_name: &str,
    transport: &TransportConfig,
    signature: &Signature<'_>,
    progress: &dyn ProgressSink,
) -> Result<MergeOutcome> {
    let local = current_branch(repo)?;

    progress.sub_task("Fetching from remote");
    let tracking_refs_updated = fetch(repo, remote_name, transport)?;
    let local_head = repo.refname_to_id(local.full_name()).ok();

    let tracking = tracking_ref_name(repo, &local, remote_name);
    let upstream = match repo.find_reference(&tracking) {
        Ok(reference) => reference,
        Err(e) if e.code() == ErrorCode::NotFound => {
            log::info!("Remote does not advertise {}", local.full_name());
            return Ok(MergeOutcome {
                status: MergeStatus::RefNotAdvertised,
                tracking_refs_updated,
                local_head,
                remote_head: None,
            });
        }
        Err(e) => return Err(Error::git("pull", e)),
    };

    let annotated = repo
        .reference_to_annotated_commit(&upstream)
        .map_err(|e| Error::git("merge", e))?;
    let remote_head = Some(annotated.id());
    let (analysis, _) = repo
        .merge_analysis(&[&annotated])
        .map_err(|e| Error::git("merge", e))?;

    let outcome = |status: MergeStatus| MergeOutcome {
        status,
        tracking_refs_updated,
        local_head,
        remote_head,
    };

    if analysis.is_up_to_date() {
        return Ok(outcome(MergeStatus::AlreadyUpToDate));
    }

    progress.sub_task("Merging");

    if analysis.is_unborn() || analysis.is_fast_forward() {
        let target = repo.find_commit(annotated.id())?;
        repo.checkout_tree(target.as_object(), Some(CheckoutBuilder::new().safe()))
            .map_err(|e| Error::git("merge", e))?;
        repo.reference(
            local.full_name(),
            target.id(),
            true,
            "model-sync: fast-forward",
        )
        .map_err(|e| Error::git("merge", e))?;
        repo.set_head(local.full_name())
            .map_err(|e| Error::git("merge", e))?;
        return Ok(outcome(MergeStatus::FastForward));
    }

    let mut checkout = CheckoutBuilder::new();
    checkout.allow_conflicts(true).conflict_style_merge(true);
    repo.merge(&[&annotated], None, Some(&mut checkout))
        .map_err(|e| Error::git("merge", e))?;

    let mut index = repo.index().map_err(|e| Error::git("merge", e))?;
    if index.has_conflicts() {
        log::info!("Merge of {} into {} has conflicts", tracking, local.short_name());
        return Ok(outcome(MergeStatus::Conflicting));
    }

    let tree_id = index.write_tree().map_err(|e| Error::git("merge", e))?;
    let tree = repo.find_tree(tree_id)?;
    let ours = repo.head()?.peel_to_commit()?;
    let theirs = repo.find_commit(annotated.id())?;
    let message = merge_message(&tracking, &local);
    repo.commit(Some("HEAD"), signature, signature, &message, &tree, &[&ours, &theirs])
        .map_err(|e| Error::git("merge", e))?;
    repo.cleanup_state().map_err(|e| Error::git("merge", e))?;

    Ok(outcome(MergeStatus::Merged))
}

/// Commit message for merging a remote-tracking branch into a local one
pub fn merge_message(tracking_ref: &str, local: &BranchRef) -> String {
    let remote = BranchRef::new(tracking_ref);
    format!(
        "Merge remote-tracking branch '{}' into {}",
        remote.short_name(),
        local.short_name()
    )
}

/// Push every local branch to `remote_name`
pub fn push_branches(repo: &Repository, remote_name: &str, transport: &TransportConfig) -> Result<Vec<RefUpdate>> {
    let mut remote = repo
        .find_remote(remote_name)
        .map_err(|e| Error::git("push", e))?;

    let mut refspecs = Vec::new();
    let mut up_to_date = HashSet::new();
    for branch in repo.branches(Some(BranchType::Local))? {
        let (branch, _) = branch?;
        let reference = branch.get();
        let (Some(name), Some(target)) = (reference.name(), reference.target()) else {
            continue;
        };
        let short = BranchRef::new(name).short_name().to_string();
        let tracking = format!("refs/remotes/{}/{}", remote_name, short);
        if repo.refname_to_id(&tracking).ok() == Some(target) {
            up_to_date.insert(name.to_string());
        }
        refspecs.push(format!("{}:{}", name, name));
    }

    let reported: RefCell<Vec<(String, Option<String>)>> = RefCell::new(Vec::new());
    {
        let mut callbacks = transport.remote_callbacks();
        callbacks.push_update_reference(|refname, status| {
            reported
                .borrow_mut()
                .push((refname.to_string(), status.map(str::to_string)));
            Ok(())
        });

        let mut options = PushOptions::new();
        options.remote_callbacks(callbacks);
        transport.configure_push(&mut options);

        remote
            .push(refspecs.as_slice(), Some(&mut options))
            .map_err(|e| Error::git("push", e))?;
    }

    let reported = reported.into_inner();
    let updates = refspecs
        .iter()
        .filter_map(|spec| spec.split(':').next())
        .map(|name| {
            let status = match reported.iter().find(|(refname, _)| refname == name) {
                Some((_, Some(message))) => RefUpdateStatus::Rejected(message.clone()),
                _ if up_to_date.contains(name) => RefUpdateStatus::UpToDate,
                _ => RefUpdateStatus::Ok,
            };
            RefUpdate {
                ref_name: name.to_string(),
                status,
            }
        })
        .collect();

    Ok(updates)
}

/// Hard reset the working tree and index to `refname`, dropping untracked files
pub fn reset_hard(repo: &Repository, refname: &str) -> Result<()> {
    let target = repo
        .revparse_single(refname)
        .map_err(|e| Error::git("reset", e))?;
    let mut checkout = CheckoutBuilder::new();
    checkout.force().remove_untracked(true);
    repo.reset(&target, ResetType::Hard, Some(&mut checkout))
        .map_err(|e| Error::git("reset", e))?;
    Ok(())
}

/// Content checksum of everything in the working tree except `.git`
pub fn working_tree_checksum(dir: &Path) -> Result<String> {
    let mut listing = Vec::new();
    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".git");

    for entry in walker {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        let oid = Oid::hash_file(ObjectType::Blob, entry.path())?;
        listing.extend_from_slice(relative.to_string_lossy().as_bytes());
        listing.push(0);
        listing.extend_from_slice(oid.to_string().as_bytes());
        listing.push(b'\n');
    }

    Ok(Oid::hash_object(ObjectType::Blob, &listing)?.to_string())
}

/// Store the working tree checksum inside the repository's git directory
pub fn save_checksum(repo: &Repository) -> Result<()> {
    let workdir = repo.workdir().ok_or_else(|| Error::Disabled {
        message: "repository has no working tree".to_string(),
    })?;
    let checksum = working_tree_checksum(workdir)?;
    fs::write(repo.path().join(CHECKSUM_FILE), &checksum)?;
    log::debug!("Saved checksum {}", checksum);
    Ok(())
}

/// Whether the working tree no longer matches the stored checksum
pub fn checksum_changed(repo: &Repository) -> Result<bool> {
    let workdir = repo.workdir().ok_or_else(|| Error::Disabled {
        message: "repository has no working tree".to_string(),
    })?;
    let stored = match fs::read_to_string(repo.path().join(CHECKSUM_FILE)) {
        Ok(stored) => stored,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e.into()),
    };
    Ok(stored.trim() != working_tree_checksum(workdir)?)
}
