//! Install command

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use prebuilt_core::install::Installer;
use prebuilt_core::io::fetch::HttpFetcher;
use prebuilt_core::smoke::SmokeOutcome;
use prebuilt_core::{Pipeline, Reporter};
use prebuilt_schema::PlatformKey;

use crate::Settings;
use crate::ui::{ConsoleReporter, format_size};

/// Options for a single install.
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Release to install; `None` selects the catalog default.
    pub version: Option<String>,
    /// Target platform; `None` detects the host.
    pub platform: Option<PlatformKey>,
    /// Download timeout.
    pub timeout: Duration,
}

/// Resolve, fetch, verify and install the executable.
///
/// Succeeds once the executable is in place; a failed smoke test is
/// reported as a warning.
pub async fn install(
    settings: &Settings,
    opts: &InstallOptions,
    dry_run: bool,
    quiet: bool,
) -> Result<()> {
    let file = super::load_catalog(&settings.catalog).await?;
    let release = file.release(opts.version.as_deref())?;

    let platform = match opts.platform {
        Some(platform) => platform,
        None => PlatformKey::detect().context("Cannot install on this host")?,
    };
    tracing::debug!(%platform, version = release.version(), "installing");

    let reporter = Arc::new(ConsoleReporter::new(quiet));
    let installer = Installer::new(&settings.prefix, release.package().binary_name());
    let fetcher = HttpFetcher::new(opts.timeout)?;

    let pipeline = Pipeline::new(
        release,
        platform,
        Arc::new(fetcher),
        installer,
        reporter.clone(),
        settings.tmp_dir(),
    );

    if dry_run {
        let resolved = pipeline.resolve()?;
        let entry = resolved.entry;
        reporter.info(&format!(
            "Would install {} {} ({}) from {}",
            release.package().name,
            release.version(),
            entry.format,
            entry.location
        ));
        reporter.info(&format!("sha256 {}", entry.expected_digest));
        reporter.info(&format!(
            "target {}",
            pipeline.installer().target().display()
        ));
        return Ok(());
    }

    let report = pipeline.run().await?;

    let smoke_stderr = match &report.smoke {
        SmokeOutcome::Failed(failed) => failed.stderr.as_str(),
        SmokeOutcome::Passed { .. } => "",
    };
    if !quiet {
        for line in smoke_stderr.lines().take(5) {
            println!("      {}", line.dark_grey());
        }
    }

    reporter.success(&format!(
        "Installed {} {} to {} ({})",
        report.package,
        report.version,
        report.installed.path.display(),
        format_size(report.installed.size)
    ));
    Ok(())
}
