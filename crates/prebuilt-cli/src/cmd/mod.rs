//! Subcommand implementations.

pub mod hash;
pub mod info;
pub mod install;
pub mod remove;

use anyhow::{Context, Result};
use prebuilt_core::catalog::CatalogFile;
use std::path::Path;

/// Load and validate the catalog, naming the file on failure.
pub async fn load_catalog(path: &Path) -> Result<CatalogFile> {
    CatalogFile::load(path)
        .await
        .with_context(|| format!("Invalid catalog {}", path.display()))
}
