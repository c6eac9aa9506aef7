//! Default values for model-sync configuration.
//!
//! This module provides centralized default values and well-known names used
//! across the library and the CLI, ensuring consistency and avoiding
//! duplication.

use std::path::PathBuf;

/// Name of the remote a repository handle is bound to.
pub const DEFAULT_REMOTE_NAME: &str = "origin";

/// Commit identity used when neither the configuration nor git provides one.
pub const DEFAULT_USER_NAME: &str = "model-sync";

/// Commit email used when neither the configuration nor git provides one.
pub const DEFAULT_USER_EMAIL: &str = "model-sync@localhost";

/// Environment variable holding one extra HTTP header, formatted `name:value`.
pub const ENV_HTTP_HEADER: &str = "MODEL_SYNC_HTTP_HEADER";

/// Environment variable pointing at an alternative configuration file.
pub const ENV_CONFIG: &str = "MODEL_SYNC_CONFIG";

/// Environment variable the CLI reads the HTTP password from.
pub const ENV_PASSWORD: &str = "MODEL_SYNC_PASSWORD";

/// File inside the `.git` directory that stores the export checksum.
pub const CHECKSUM_FILE: &str = "model-sync.checksum";

/// Directory of the working tree that holds exported model objects.
pub const OBJECTS_DIR: &str = "model";

/// Message of the first commit of a repository created from a model.
pub const INITIAL_COMMIT_MESSAGE: &str = "Initial commit";

/// Returns the default configuration file location.
///
/// Uses the platform-appropriate configuration directory:
/// - Linux: `~/.config/model-sync/config.yaml`
/// - macOS: `~/Library/Application Support/model-sync/config.yaml`
/// - Windows: `{FOLDERID_RoamingAppData}\model-sync\config.yaml`
///
/// Falls back to `.model-sync.yaml` in the current directory if the platform
/// configuration directory cannot be determined.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("model-sync").join("config.yaml"))
        .unwrap_or_else(|| PathBuf::from(".model-sync.yaml"))
}
