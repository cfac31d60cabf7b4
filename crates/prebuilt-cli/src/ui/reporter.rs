//! Console implementation of the core `Reporter` trait.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use crossterm::style::Stylize;
use crossterm::tty::IsTty;
use prebuilt_core::{Reporter, Stage};

use super::theme::{Theme, format_size};

/// Writes pipeline progress to stdout.
///
/// Download progress is redrawn in place when stdout is a terminal and
/// suppressed otherwise.
#[derive(Debug)]
pub struct ConsoleReporter {
    theme: Theme,
    quiet: bool,
    interactive: bool,
    progress_open: AtomicBool,
}

impl ConsoleReporter {
    /// Create a reporter. `quiet` hides everything but warnings, errors and
    /// the final result.
    pub fn new(quiet: bool) -> Self {
        Self {
            theme: Theme::default(),
            quiet,
            interactive: io::stdout().is_tty(),
            progress_open: AtomicBool::new(false),
        }
    }

    /// Terminate an in-place progress line before printing anything else.
    fn close_progress(&self) {
        if self.progress_open.swap(false, Ordering::Relaxed) {
            println!();
        }
    }

    fn line(&self, msg: String) {
        self.close_progress();
        println!("{msg}");
    }
}

/// Format download progress (percentage and size)
pub fn format_download_progress(current: u64, total: Option<u64>) -> String {
    match total.filter(|&t| t > 0) {
        Some(total) => {
            let pct = (current.saturating_mul(100) / total).min(100);
            let bar = format_progress_bar(current, total, 24);
            format!("{bar}  {pct:>3}%  {}", format_size(total))
        }
        None => format_size(current),
    }
}

/// Format a progress bar using ▓ (filled) and ░ (empty).
pub fn format_progress_bar(current: u64, total: u64, width: usize) -> String {
    let filled = if total > 0 {
        (((current as f64 / total as f64) * width as f64).round() as usize).min(width)
    } else {
        0
    };
    let empty = width.saturating_sub(filled);
    format!("{}{}", "▓".repeat(filled), "░".repeat(empty))
}

impl Reporter for ConsoleReporter {
    fn section(&self, title: &str) {
        if self.quiet {
            return;
        }
        self.close_progress();
        println!();
        println!("{}", title.bold());
    }

    fn stage(&self, stage: Stage, detail: &str) {
        if self.quiet {
            return;
        }
        self.line(format!(
            "  {} {:<10} {}",
            self.theme.icons.active.with(self.theme.colors.secondary),
            stage.as_str(),
            detail.with(self.theme.colors.secondary)
        ));
    }

    fn downloading(&self, current: u64, total: Option<u64>) {
        if self.quiet || !self.interactive {
            return;
        }
        print!(
            "\r    {}",
            format_download_progress(current, total).with(self.theme.colors.secondary)
        );
        let _ = io::stdout().flush();
        self.progress_open.store(true, Ordering::Relaxed);
    }

    fn retrying(&self, attempt: u32, max_attempts: u32, reason: &str) {
        if self.quiet {
            return;
        }
        self.line(format!(
            "  {} retrying ({attempt}/{max_attempts}): {reason}",
            self.theme.icons.warning.with(self.theme.colors.warning)
        ));
    }

    fn failed(&self, stage: Stage, _reason: &str) {
        self.line(format!(
            "  {} {}",
            self.theme.icons.error.with(self.theme.colors.error),
            format!("{stage} failed").with(self.theme.colors.error).bold()
        ));
    }

    fn info(&self, msg: &str) {
        if self.quiet {
            return;
        }
        self.line(format!("  {} {msg}", self.theme.icons.info));
    }

    fn success(&self, msg: &str) {
        self.line(format!(
            "  {} {}",
            self.theme.icons.success.with(self.theme.colors.success),
            msg.with(self.theme.colors.success)
        ));
    }

    fn warning(&self, msg: &str) {
        self.line(format!(
            "  {} {}",
            self.theme.icons.warning.with(self.theme.colors.warning),
            msg.with(self.theme.colors.warning)
        ));
    }
}
