//! Hash command

use anyhow::{Context, Result};
use prebuilt_core::io::verify::digest_file;
use std::path::PathBuf;

/// Print the SHA256 of each file in catalog form.
///
/// Uses the same digest routine the installer verifies against.
pub async fn hash(files: &[PathBuf]) -> Result<()> {
    for file in files {
        let digest = digest_file(file)
            .await
            .with_context(|| format!("Failed to hash {}", file.display()))?;
        println!("{digest}  {}", file.display());
    }
    Ok(())
}
