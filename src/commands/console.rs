//! Terminal listener and progress reporting for synchronization runs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::ValueEnum;
use dialoguer::{theme::ColorfulTheme, Confirm, Select};
use indicatif::{ProgressBar, ProgressStyle};
use model_sync::conflict::{ConflictHandler, ResolutionPolicy, Side};
use model_sync::output::{emoji, event_line, OutputConfig};
use model_sync::process::{EventListener, ProcessEvent};
use model_sync::progress::ProgressSink;

/// What to do when a pull runs into conflicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConflictMode {
    /// Ask for each conflicting file
    Ask,
    /// Keep local versions
    Ours,
    /// Take remote versions
    Theirs,
    /// Cancel the merge and keep the local state
    Abandon,
}

impl ConflictMode {
    /// Policy the conflict session is opened with.
    pub fn policy(self) -> ResolutionPolicy {
        match self {
            ConflictMode::Ask => ResolutionPolicy::Interactive,
            ConflictMode::Ours | ConflictMode::Abandon => ResolutionPolicy::Prefer(Side::Ours),
            ConflictMode::Theirs => ResolutionPolicy::Prefer(Side::Theirs),
        }
    }
}

/// Spinner shared by the listener and the progress sink
pub fn spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        bar.set_style(style);
    }
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Prints events and prompts for conflict resolution
pub struct ConsoleListener {
    output: OutputConfig,
    bar: ProgressBar,
    mode: ConflictMode,
    quiet: bool,
    errors: Arc<AtomicUsize>,
}

impl ConsoleListener {
    pub fn new(output: OutputConfig, bar: ProgressBar, mode: ConflictMode, quiet: bool) -> Self {
        Self {
            output,
            bar,
            mode,
            quiet,
            errors: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counter of error events, readable after the listener is handed over.
    pub fn error_count(&self) -> Arc<AtomicUsize> {
        self.errors.clone()
    }

    fn say(&self, line: &str) {
        if self.bar.is_hidden() {
            println!("{}", line);
        } else {
            self.bar.println(line);
        }
    }

    fn ask(&self, handler: &mut dyn ConflictHandler) -> Result<bool> {
        let theme = ColorfulTheme::default();
        let conflicts: Vec<(String, &'static str)> = handler
            .conflicts()
            .iter()
            .map(|c| (c.path.clone(), c.description()))
            .collect();

        println!(
            "{} {} conflicting file(s)",
            emoji(&self.output, "⚠️ ", "[CONFLICT]"),
            conflicts.len()
        );
        for (path, description) in conflicts {
            let choice = Select::with_theme(&theme)
                .with_prompt(format!("{} ({})", path, description))
                .items(&["Keep local version", "Take remote version", "Cancel the merge"])
                .default(0)
                .interact()?;
            match choice {
                0 => handler.resolve(&path, Side::Ours)?,
                1 => handler.resolve(&path, Side::Theirs)?,
                _ => return Ok(false),
            }
        }

        Ok(Confirm::with_theme(&theme)
            .with_prompt("Complete the merge?")
            .default(true)
            .interact()?)
    }
}

impl EventListener for ConsoleListener {
    fn notify(&self, event: &ProcessEvent) {
        if event.kind.is_error() {
            self.errors.fetch_add(1, Ordering::SeqCst);
            let line = event_line(&self.output, event);
            self.bar.suspend(|| eprintln!("{}", line));
            return;
        }
        if !self.quiet {
            self.say(&event_line(&self.output, event));
        }
    }

    fn request_conflict_resolution(&self, handler: &mut dyn ConflictHandler) -> bool {
        let count = handler.conflicts().len();
        match self.mode {
            ConflictMode::Abandon => {
                self.say(&format!("Cancelling merge with {} conflict(s)", count));
                false
            }
            ConflictMode::Ours | ConflictMode::Theirs => {
                self.say(&format!("Resolving {} conflict(s) automatically", count));
                true
            }
            ConflictMode::Ask => self.bar.suspend(|| {
                self.ask(handler).unwrap_or_else(|e| {
                    log::error!("Conflict prompt failed: {:#}", e);
                    false
                })
            }),
        }
    }
}

/// Progress sink drawing sub-task labels on the spinner
pub struct SpinnerProgress {
    bar: ProgressBar,
}

impl SpinnerProgress {
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl ProgressSink for SpinnerProgress {
    fn sub_task(&self, label: &str) {
        log::debug!("{}", label);
        self.bar.set_message(label.to_string());
    }
}
