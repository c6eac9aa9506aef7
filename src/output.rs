//! # Output Configuration
//!
//! This module controls how the CLI renders process events: whether colors
//! and emojis are used, and which marker precedes each kind of event.
//!
//! ## Respecting User Preferences
//!
//! The module respects the following environment variables and flags:
//! - `--color=never|always|auto` - CLI flag for color control
//! - `NO_COLOR` - Disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - Disables colors
//! - `CLICOLOR_FORCE=1` - Forces colors even in non-TTY
//! - `TERM=dumb` - Disables colors for dumb terminals
//!
//! ## Usage
//!
//! ```rust
//! use model_sync::output::{event_line, OutputConfig};
//! use model_sync::process::{EventKind, ProcessEvent};
//!
//! let config = OutputConfig::from_env_and_flag("never");
//! let event = ProcessEvent {
//!     kind: EventKind::StartPush,
//!     prefix: "Publish".to_string(),
//!     summary: "Publish".to_string(),
//!     detail: "Publishing to remote".to_string(),
//! };
//! assert_eq!(event_line(&config, &event), "[PUSH] Publishing to remote");
//! ```

use std::env;

use console::style;

use crate::process::{EventKind, ProcessEvent, PullOutcome};

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag.
    ///
    /// `--color=always` forces colors on, overriding `NO_COLOR`, and
    /// `--color=never` forces them off. Any other value detects support from
    /// the environment and the terminal.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    fn detect_color_support() -> bool {
        // The presence of NO_COLOR, even empty, disables colors
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }
        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }
        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }
        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stdout().features().colors_supported()
    }

    /// Create a configuration with colors always enabled.
    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    /// Create a configuration with colors always disabled.
    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Returns the emoji when colors are enabled, the plain text otherwise.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

/// Marker printed before an event of the given kind.
pub fn event_marker(config: &OutputConfig, kind: EventKind) -> &'static str {
    match kind {
        EventKind::LogMessage => emoji(config, "💬", "[INFO]"),
        EventKind::LogError => emoji(config, "❌", "[ERROR]"),
        EventKind::StartCommit | EventKind::EndCommit => emoji(config, "📝", "[COMMIT]"),
        EventKind::StartPull | EventKind::EndPull => emoji(config, "⬇️ ", "[PULL]"),
        EventKind::PullStatus(PullOutcome::Ok) => emoji(config, "✅", "[OK]"),
        EventKind::PullStatus(PullOutcome::UpToDate) => emoji(config, "✅", "[UP-TO-DATE]"),
        EventKind::PullStatus(PullOutcome::MergeCancelled) => emoji(config, "⚠️ ", "[CANCELLED]"),
        EventKind::PullStatus(PullOutcome::Error) => emoji(config, "❌", "[FAILED]"),
        EventKind::StartPush | EventKind::EndPush => emoji(config, "⬆️ ", "[PUSH]"),
    }
}

/// One terminal line describing `event`.
///
/// Pull status events show the outcome name instead of the numeric code.
pub fn event_line(config: &OutputConfig, event: &ProcessEvent) -> String {
    let detail = match event.kind {
        EventKind::PullStatus(outcome) => format!("Refresh finished: {}", outcome),
        _ => event.detail.clone(),
    };
    let marker = event_marker(config, event.kind);
    if config.use_color && event.kind.is_error() {
        format!("{} {}", marker, style(detail).red())
    } else {
        format!("{} {}", marker, detail)
    }
}
