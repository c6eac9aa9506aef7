//! # Model Sync Library
//!
//! This library keeps a model document synchronized with a git repository.
//! It is used by the `model-sync` command-line tool, and can be embedded in
//! any application that owns a document able to write itself to, and read
//! itself back from, a directory of files.
//!
//! ## Quick Example
//!
//! ```no_run
//! use model_sync::config::SyncConfig;
//! use model_sync::document::YamlDocument;
//! use model_sync::process::{EventListener, ProcessEvent, ProcessKind, SyncProcess};
//! use model_sync::conflict::ConflictHandler;
//! use model_sync::repository::GitRepository;
//!
//! struct Printer;
//!
//! impl EventListener for Printer {
//!     fn notify(&self, event: &ProcessEvent) {
//!         println!("{}: {}", event.prefix, event.detail);
//!     }
//!
//!     fn request_conflict_resolution(&self, _handler: &mut dyn ConflictHandler) -> bool {
//!         true
//!     }
//! }
//!
//! let config = SyncConfig::default();
//! let repository = GitRepository::new("/srv/work/model", config);
//! let process = SyncProcess::new(
//!     ProcessKind::Publish,
//!     Some(Box::new(repository)),
//!     Box::new(YamlDocument::new("model.yaml")),
//!     Box::new(Printer),
//! )
//! .with_commit_message("Update customer journeys", false);
//!
//! let outcome = process.run();
//! println!("pull outcome: {:?}", outcome);
//! ```
//!
//! ## Core Concepts
//!
//! - **Documents (`document`)**: The model being synchronized, exported to
//!   and reloaded from the working tree.
//! - **Repository Handle (`repository`, `git`)**: A local working copy bound
//!   to a remote, with commit, pull, push and checksum operations built on
//!   libgit2.
//! - **Transport (`transport`)**: Per-run credentials and connection settings
//!   for SSH, HTTP and local remotes.
//! - **Conflict Handling (`conflict`)**: A session over a conflicting merge
//!   that can resolve paths, finalize the merge or restore the local state.
//! - **Synchronization Process (`process`)**: The orchestrator that runs
//!   export, commit, pull, reload and push, reporting every step to an
//!   event listener.
//!
//! ## Execution Flow
//!
//! A publish run executes the following steps:
//!
//! 1.  **Export**: Write the document into the working tree.
//! 2.  **Commit**: Commit local changes, if any.
//! 3.  **Pull**: Fetch and merge the remote branch, handing conflicts to the
//!     listener, then reload the document.
//! 4.  **Push**: Push all local branches, unless the pull failed or the merge
//!     was cancelled.
//! 5.  **Wrap-up**: Save a checksum of the working tree and release the
//!     transport.

pub mod config;
pub mod conflict;
pub mod defaults;
pub mod document;
pub mod error;
pub mod git;
pub mod output;
pub mod process;
pub mod progress;
pub mod repository;
pub mod transport;
