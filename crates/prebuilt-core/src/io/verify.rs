//! Integrity verification.
//!
//! Every fetched artifact is hashed with SHA256 and compared with the
//! catalog digest before anything is extracted or executed. There is no way
//! to skip this step.

use std::io::Read;
use std::path::{Path, PathBuf};

use prebuilt_schema::Sha256Digest;
use sha2::{Digest, Sha256};
use thiserror::Error;

const BLOCK_SIZE: usize = 64 * 1024;

/// Errors raised while verifying an artifact.
#[derive(Error, Debug)]
pub enum IntegrityError {
    /// The computed digest differs from the catalog.
    #[error("Hash mismatch: expected {expected}, got {actual}")]
    Mismatch {
        /// Digest from the catalog.
        expected: Sha256Digest,
        /// Digest of the fetched bytes.
        actual: Sha256Digest,
    },

    /// The artifact could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of comparing a file against an expected digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    /// Digest of the bytes on disk.
    pub computed: Sha256Digest,
    /// Whether it equals the expected digest.
    pub passed: bool,
}

/// SHA256 of a file, read in fixed-size blocks on a blocking thread.
///
/// # Errors
///
/// Returns an IO error if the file cannot be read.
pub async fn digest_file(path: &Path) -> std::io::Result<Sha256Digest> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut file = std::fs::File::open(&path)?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; BLOCK_SIZE];
        loop {
            let count = file.read(&mut buffer)?;
            if count == 0 {
                break;
            }
            hasher.update(&buffer[..count]);
        }
        Ok::<_, std::io::Error>(Sha256Digest::from_hasher(hasher))
    })
    .await
    .map_err(std::io::Error::other)?
}

/// Compare `path` against `expected` without acting on the result.
///
/// # Errors
///
/// Returns [`IntegrityError::Io`] if the file cannot be read.
pub async fn check(path: &Path, expected: &Sha256Digest) -> Result<Verification, IntegrityError> {
    let computed = digest_file(path).await?;
    let passed = &computed == expected;
    Ok(Verification { computed, passed })
}

/// Verify `path` against `expected`, deleting the file on mismatch.
///
/// # Errors
///
/// Returns [`IntegrityError::Mismatch`] when the digests differ. The caller
/// must treat this as fatal.
pub async fn verify(path: &Path, expected: &Sha256Digest) -> Result<Sha256Digest, IntegrityError> {
    let verification = check(path, expected).await?;
    tracing::debug!(
        path = %path.display(),
        computed = %verification.computed,
        expected = %expected,
        passed = verification.passed,
        "verified artifact"
    );

    if verification.passed {
        return Ok(verification.computed);
    }

    let _ = tokio::fs::remove_file(path).await;
    Err(IntegrityError::Mismatch {
        expected: expected.clone(),
        actual: verification.computed,
    })
}
