//! # Configuration
//!
//! This module defines `SyncConfig`, the user-level settings that shape how
//! model-sync talks to git: the commit identity, the remote name, the SSH
//! identity and an optional proxy.
//!
//! The configuration lives in a YAML file (see
//! [`crate::defaults::default_config_path`]). A missing file is not an error;
//! every field has a default. Unknown keys are rejected so that typos do not
//! silently change behavior.
//!
//! ```yaml
//! user_name: Jane Doe
//! user_email: jane@example.com
//! remote_name: origin
//! ssh:
//!   identity_file: ~/.ssh/id_ed25519
//!   passphrase: secret
//! proxy: http://proxy.internal:3128
//! ```

use crate::defaults::DEFAULT_REMOTE_NAME;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// SSH identity settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SshConfig {
    /// Private key used for SSH remotes. When unset the SSH agent is used.
    #[serde(default)]
    pub identity_file: Option<PathBuf>,
    /// Passphrase protecting the private key, if any.
    #[serde(default)]
    pub passphrase: Option<String>,
}

/// Top-level model-sync configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Author name for commits. Falls back to git's `user.name`.
    #[serde(default)]
    pub user_name: Option<String>,
    /// Author email for commits. Falls back to git's `user.email`.
    #[serde(default)]
    pub user_email: Option<String>,
    /// Name of the remote repositories are bound to.
    #[serde(default = "default_remote_name")]
    pub remote_name: String,
    /// SSH identity settings.
    #[serde(default)]
    pub ssh: SshConfig,
    /// Proxy URL applied to fetch and push.
    #[serde(default)]
    pub proxy: Option<String>,
}

fn default_remote_name() -> String {
    DEFAULT_REMOTE_NAME.to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            user_name: None,
            user_email: None,
            remote_name: default_remote_name(),
            ssh: SshConfig::default(),
            proxy: None,
        }
    }
}

/// Parse a configuration from a YAML string
///
/// An empty document yields the default configuration.
pub fn parse(yaml_content: &str) -> Result<SyncConfig> {
    if yaml_content.trim().is_empty() {
        return Ok(SyncConfig::default());
    }

    serde_yaml::from_str::<SyncConfig>(yaml_content).map_err(|e| {
        let message = e.to_string();
        let hint = message.contains("unknown field").then(|| {
            "valid keys are user_name, user_email, remote_name, ssh (identity_file, passphrase) and proxy"
                .to_string()
        });
        Error::ConfigParse { message, hint }
    })
}

/// Load the configuration from a file, returning defaults if it does not exist
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<SyncConfig> {
    let path = path.as_ref();
    if !path.exists() {
        log::debug!("No configuration at {}, using defaults", path.display());
        return Ok(SyncConfig::default());
    }

    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    parse(&content)
}
