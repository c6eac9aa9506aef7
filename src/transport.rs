//! # Transport and Credentials
//!
//! This module turns a remote URL and optional credentials into a
//! [`TransportConfig`]: everything libgit2 needs to authenticate a fetch or a
//! push against that remote.
//!
//! ## Key Components
//!
//! - **`RemoteKind`**: SSH, HTTP(S) or local, recognized from the URL scheme.
//!   scp-style addresses (`git@host:org/repo.git`) are SSH.
//! - **`TransportProvider`**: the capability the synchronization process
//!   consumes. `DefaultTransportProvider` builds configurations from
//!   [`SyncConfig`](crate::config::SyncConfig) settings.
//! - **`TransportScope`**: a scoped acquisition. The provider is released when
//!   the scope is dropped, on every exit path, so proxy or session state never
//!   outlives one synchronization run.
//!
//! HTTP transports may carry one extra request header taken from the
//! `MODEL_SYNC_HTTP_HEADER` environment variable, formatted `name:value`.

use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

use git2::{CertificateCheckStatus, Cred, FetchOptions, FetchPrune, ProxyOptions, PushOptions, RemoteCallbacks};
use regex::Regex;
use std::sync::OnceLock;

use crate::config::SyncConfig;
use crate::defaults::ENV_HTTP_HEADER;
use crate::error::{Error, Result};

/// libgit2 keeps asking for credentials while authentication fails.
const MAX_CREDENTIAL_ATTEMPTS: u32 = 3;

/// Username and password for HTTP remotes
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Whether neither a username nor a password was supplied.
    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Transport family of a remote URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteKind {
    Ssh,
    Http,
    Local,
}

fn scp_like_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._~-]+@[A-Za-z0-9.-]+:").expect("scp-like pattern is valid")
    })
}

/// Classify a remote URL by its scheme
pub fn remote_kind(url: &str) -> Result<RemoteKind> {
    if scp_like_pattern().is_match(url) {
        return Ok(RemoteKind::Ssh);
    }

    match url::Url::parse(url) {
        Ok(parsed) => match parsed.scheme() {
            "ssh" | "git+ssh" | "ssh+git" => Ok(RemoteKind::Ssh),
            "http" | "https" => Ok(RemoteKind::Http),
            "file" => Ok(RemoteKind::Local),
            // Windows drive letters parse as one-letter schemes
            scheme if scheme.len() == 1 => Ok(RemoteKind::Local),
            scheme => Err(Error::Transport {
                url: url.to_string(),
                message: format!("unsupported scheme '{}'", scheme),
            }),
        },
        Err(url::ParseError::RelativeUrlWithoutBase) => Ok(RemoteKind::Local),
        Err(e) => Err(e.into()),
    }
}

/// Whether a URL designates an SSH remote
pub fn is_ssh(url: &str) -> bool {
    matches!(remote_kind(url), Ok(RemoteKind::Ssh))
}

/// Whether a URL designates an HTTP(S) remote
pub fn is_http(url: &str) -> bool {
    matches!(remote_kind(url), Ok(RemoteKind::Http))
}

/// One extra HTTP request header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpHeader {
    pub name: String,
    pub value: String,
}

impl HttpHeader {
    /// Header line as libgit2 expects it.
    pub fn to_header_line(&self) -> String {
        format!("{}: {}", self.name, self.value)
    }
}

/// Parse a `name:value` header setting
///
/// Trailing empty segments are dropped, so `name:value:` is accepted. What
/// remains must be exactly a non-empty name and a non-empty value; anything
/// else is ignored.
pub fn parse_http_header(spec: &str) -> Option<HttpHeader> {
    let mut parts: Vec<&str> = spec.split(':').collect();
    while parts.last().is_some_and(|part| part.is_empty()) {
        parts.pop();
    }
    let [name, value] = parts.as_slice() else {
        return None;
    };

    let (name, value) = (name.trim(), value.trim());
    if name.is_empty() || value.is_empty() {
        return None;
    }

    Some(HttpHeader {
        name: name.to_string(),
        value: value.to_string(),
    })
}

/// Read the extra HTTP header from the environment, if set and well-formed
pub fn http_header_from_env() -> Option<HttpHeader> {
    let spec = std::env::var(ENV_HTTP_HEADER).ok()?;
    let header = parse_http_header(&spec);
    if header.is_none() {
        log::warn!(
            "Ignoring {}: expected 'name:value', got '{}'",
            ENV_HTTP_HEADER,
            spec
        );
    }
    header
}

/// Authenticated transport settings for one remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportConfig {
    /// Key-based SSH. Without an identity file the SSH agent is asked.
    Ssh {
        identity_file: Option<PathBuf>,
        passphrase: Option<String>,
        proxy: Option<String>,
    },
    /// Username/password over HTTP(S).
    Http {
        credentials: Credentials,
        header: Option<HttpHeader>,
        proxy: Option<String>,
    },
    /// Local path or `file://` remote; no authentication.
    Local,
}

impl TransportConfig {
    /// Build libgit2 callbacks that authenticate against this transport.
    ///
    /// Callers may register further callbacks (progress, ref updates) on the
    /// returned value.
    pub fn remote_callbacks(&self) -> RemoteCallbacks<'_> {
        let mut callbacks = RemoteCallbacks::new();
        let mut attempts = 0u32;

        match self {
            TransportConfig::Ssh {
                identity_file,
                passphrase,
                ..
            } => {
                callbacks.credentials(move |_url, username_from_url, allowed| {
                    attempts += 1;
                    if attempts > MAX_CREDENTIAL_ATTEMPTS {
                        return Err(git2::Error::from_str("SSH authentication failed"));
                    }
                    let user = username_from_url.unwrap_or("git");
                    if allowed.is_username() {
                        return Cred::username(user);
                    }
                    match identity_file {
                        Some(key) => Cred::ssh_key(user, None, key, passphrase.as_deref()),
                        None => Cred::ssh_key_from_agent(user),
                    }
                });
                // Host keys are accepted without verification
                callbacks.certificate_check(|_cert, _host| Ok(CertificateCheckStatus::CertificateOk));
            }
            TransportConfig::Http { credentials, .. } => {
                callbacks.credentials(move |_url, _username_from_url, allowed| {
                    attempts += 1;
                    if attempts > MAX_CREDENTIAL_ATTEMPTS || !allowed.is_user_pass_plaintext() {
                        return Err(git2::Error::from_str("HTTP authentication failed"));
                    }
                    Cred::userpass_plaintext(&credentials.username, &credentials.password)
                });
            }
            TransportConfig::Local => {}
        }

        callbacks
    }

    fn proxy(&self) -> Option<&str> {
        match self {
            TransportConfig::Ssh { proxy, .. } | TransportConfig::Http { proxy, .. } => {
                proxy.as_deref()
            }
            TransportConfig::Local => None,
        }
    }

    fn header_lines(&self) -> Vec<String> {
        match self {
            TransportConfig::Http {
                header: Some(header),
                ..
            } => vec![header.to_header_line()],
            _ => Vec::new(),
        }
    }

    /// Apply proxy, headers and pruning to fetch options.
    pub fn configure_fetch(&self, options: &mut FetchOptions<'_>) {
        if let Some(proxy) = self.proxy() {
            let mut proxy_options = ProxyOptions::new();
            proxy_options.url(proxy);
            options.proxy_options(proxy_options);
        }

        let lines = self.header_lines();
        if !lines.is_empty() {
            let headers: Vec<&str> = lines.iter().map(String::as_str).collect();
            options.custom_headers(&headers);
        }

        // Remote branches deleted upstream are removed locally too, whatever
        // the transport; pull relies on it to spot unadvertised branches.
        options.prune(FetchPrune::On);
    }

    /// Apply proxy and headers to push options.
    pub fn configure_push(&self, options: &mut PushOptions<'_>) {
        if let Some(proxy) = self.proxy() {
            let mut proxy_options = ProxyOptions::new();
            proxy_options.url(proxy);
            options.proxy_options(proxy_options);
        }

        let lines = self.header_lines();
        if !lines.is_empty() {
            let headers: Vec<&str> = lines.iter().map(String::as_str).collect();
            options.custom_headers(&headers);
        }
    }
}

/// Produces authenticated transports for remote URLs
pub trait TransportProvider: Send + Sync {
    /// Build a transport for `url`. Credentials are ignored for SSH remotes.
    fn transport_for(&self, url: &str, credentials: Option<&Credentials>) -> Result<TransportConfig>;

    /// Drop any session state taken by `transport_for`.
    fn release(&self) {}
}

/// The default provider, configured from the user's settings.
#[derive(Debug)]
pub struct DefaultTransportProvider {
    identity_file: Option<PathBuf>,
    passphrase: Option<String>,
    proxy: Option<String>,
    active: Mutex<Option<String>>,
}

impl DefaultTransportProvider {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            identity_file: config.ssh.identity_file.clone(),
            passphrase: config.ssh.passphrase.clone(),
            proxy: config.proxy.clone(),
            active: Mutex::new(None),
        }
    }

    /// URL of the session currently held, if any.
    pub fn active_session(&self) -> Option<String> {
        self.active.lock().ok().and_then(|active| active.clone())
    }

    fn begin_session(&self, url: &str) -> Result<()> {
        let mut active = self.active.lock().map_err(|_| Error::LockPoisoned {
            context: "transport session".to_string(),
        })?;
        if let Some(previous) = active.replace(url.to_string()) {
            log::warn!("Transport session for {} was never released", previous);
        }
        Ok(())
    }
}

impl TransportProvider for DefaultTransportProvider {
    fn transport_for(&self, url: &str, credentials: Option<&Credentials>) -> Result<TransportConfig> {
        let config = match remote_kind(url)? {
            RemoteKind::Ssh => {
                if let Some(key) = &self.identity_file {
                    if !key.exists() {
                        return Err(Error::Credentials {
                            url: url.to_string(),
                            message: format!("SSH identity file {} not found", key.display()),
                        });
                    }
                }
                TransportConfig::Ssh {
                    identity_file: self.identity_file.clone(),
                    passphrase: self.passphrase.clone(),
                    proxy: self.proxy.clone(),
                }
            }
            RemoteKind::Http => {
                let credentials = credentials.ok_or_else(|| Error::Credentials {
                    url: url.to_string(),
                    message: "no username or password supplied".to_string(),
                })?;
                let header = http_header_from_env();
                if let Some(header) = &header {
                    log::info!("Adding HTTP header '{}' to requests", header.name);
                }
                TransportConfig::Http {
                    credentials: credentials.clone(),
                    header,
                    proxy: self.proxy.clone(),
                }
            }
            RemoteKind::Local => TransportConfig::Local,
        };

        self.begin_session(url)?;
        Ok(config)
    }

    fn release(&self) {
        if let Ok(mut active) = self.active.lock() {
            if let Some(url) = active.take() {
                log::debug!("Released transport session for {}", url);
            }
        }
    }
}

/// A transport acquired for the duration of one run.
///
/// Dropping the scope releases the provider.
pub struct TransportScope<'a> {
    provider: &'a dyn TransportProvider,
    config: TransportConfig,
}

impl<'a> TransportScope<'a> {
    /// Acquire a transport. The provider is released even when acquisition
    /// fails part-way.
    pub fn acquire(
        provider: &'a dyn TransportProvider,
        url: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Self> {
        match provider.transport_for(url, credentials) {
            Ok(config) => Ok(Self { provider, config }),
            Err(e) => {
                provider.release();
                Err(e)
            }
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

impl Drop for TransportScope<'_> {
    fn drop(&mut self) {
        self.provider.release();
    }
}
