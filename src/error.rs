//! # Error Handling
//!
//! This module defines the centralized error type for `model-sync`. It uses
//! the `thiserror` library to describe every failure the synchronization
//! workflow can run into, with enough context attached to produce a useful
//! message for the event listener.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum representing all failures raised by the
//!   library. Variants carry contextual fields such as `url`, `operation`,
//!   `path` or `message`.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! - **`Error::root_message`**: Produces the message shown to users. Errors
//!   that merely wrap an engine failure (`GitOperation`) are unwrapped by one
//!   level so the listener sees the underlying cause rather than the wrapper.
//!
//! The synchronization process never lets these errors escape `run()`; they
//! are converted to listener notifications instead.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for model-sync operations
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration file could not be parsed.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// The process cannot run: the repository handle is missing or its local
    /// directory does not exist.
    #[error("Process disabled: {message}")]
    Disabled { message: String },

    /// Writing the document to the working tree failed.
    #[error("Export error: {message}")]
    Export { message: String },

    /// Reading the document back from the working tree failed.
    #[error("Reload error: {message}")]
    Reload { message: String },

    /// A libgit2 call failed while performing a named repository operation.
    #[error("Git {operation} failed: {source}")]
    GitOperation {
        operation: String,
        #[source]
        source: git2::Error,
    },

    /// A bare libgit2 error that was not attributed to an operation.
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// The repository has no remote configured.
    #[error("No remote configured for repository at {}", path.display())]
    NoRemote { path: PathBuf },

    /// The current branch has no remote-tracking counterpart.
    #[error("Branch '{branch}' has no remote-tracking branch")]
    NoRemoteBranch { branch: String },

    /// HEAD does not point at a local branch.
    #[error("HEAD is detached; check out a branch before synchronizing")]
    DetachedHead,

    /// Credentials or identity for a transport could not be produced.
    #[error("Credentials error for {url}: {message}")]
    Credentials { url: String, message: String },

    /// The transport for a remote URL could not be configured.
    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// The operation was cancelled through the progress sink.
    #[error("Operation cancelled: {message}")]
    Cancelled { message: String },

    /// A merge was finalized while conflicts were still unresolved.
    #[error("{count} conflict(s) still unresolved")]
    UnresolvedConflicts { count: usize },

    /// A resolution was requested for a path that is not in conflict.
    #[error("No conflict recorded for '{path}'")]
    UnknownConflict { path: String },

    /// The target directory for a new repository is not usable.
    #[error("Cannot create repository at {}: {message}", path.display())]
    RepositoryExists { path: PathBuf, message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// A mutex or other lock has been poisoned.
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },
}

impl Error {
    /// Shorthand for attributing a libgit2 failure to an operation.
    pub fn git(operation: impl Into<String>, source: git2::Error) -> Self {
        Error::GitOperation {
            operation: operation.into(),
            source,
        }
    }

    /// The message to report to a user.
    ///
    /// Wrapper variants are unwrapped by one level so the message names the
    /// underlying cause. libgit2 errors are reduced to their message text,
    /// without the class and code suffix.
    pub fn root_message(&self) -> String {
        match self {
            Error::GitOperation { source, .. } => source.message().to_string(),
            Error::Git(source) => source.message().to_string(),
            Error::Io(source) => source.to_string(),
            other => other.to_string(),
        }
    }

    /// Whether this error is the distinguishable cancellation failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
