//! Remove command

use anyhow::Result;
use prebuilt_core::Reporter;
use prebuilt_core::install::{InstallError, Installer};

use crate::Settings;
use crate::ui::ConsoleReporter;

/// Remove the installed executable named by the catalog
pub async fn remove(settings: &Settings, dry_run: bool, quiet: bool) -> Result<()> {
    let file = super::load_catalog(&settings.catalog).await?;
    let package = file.release(None)?.package();
    let installer = Installer::new(&settings.prefix, package.binary_name());
    let reporter = ConsoleReporter::new(quiet);

    if dry_run {
        if installer.is_installed() {
            reporter.info(&format!("Would remove {}", installer.target().display()));
        } else {
            reporter.info(&format!("{} is not installed", installer.target().display()));
        }
        return Ok(());
    }

    match installer.remove() {
        Ok(path) => {
            reporter.success(&format!("Removed {} ({})", package.name, path.display()));
            Ok(())
        }
        Err(e @ InstallError::NotInstalled(_)) => Err(e.into()),
        Err(e) => Err(anyhow::Error::new(e).context(format!("Failed to remove {}", package.name))),
    }
}
